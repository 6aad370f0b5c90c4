//! `kyc`: terminal console for the KYC back office.

use std::process::ExitCode;

use clap::Parser;
use kyc_console::SessionError;

mod cli;

#[tokio::main]
async fn main() -> ExitCode {
    match cli::Cli::parse().run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(exit_code(&e))
        }
    }
}

fn exit_code(error: &anyhow::Error) -> u8 {
    match error.chain().find_map(|cause| cause.downcast_ref::<SessionError>()) {
        Some(SessionError::NotLoggedIn | SessionError::Expired) => 2,
        Some(SessionError::PermissionDenied(_) | SessionError::RoleRequired(_)) => 3,
        _ => 1,
    }
}
