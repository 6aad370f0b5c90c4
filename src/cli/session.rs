//! Login, logout and the current user.

use kyc_console::services::auth;
use tracing::instrument;

use super::{Context, terminal::Colorize};

/// Log in and store the session token
#[derive(Debug, clap::Parser)]
pub struct Login {
    /// User name (prompted when omitted)
    #[arg(short, long)]
    username: Option<String>,

    /// Read the password from this environment variable instead of prompting
    #[arg(long, value_name = "VAR")]
    password_env: Option<String>,
}

impl Login {
    #[instrument(skip(ctx))]
    pub async fn run(self, ctx: &mut Context) -> anyhow::Result<()> {
        let username = match self.username {
            Some(username) => username,
            None => dialoguer::Input::<String>::new()
                .with_prompt("Username")
                .interact_text()?,
        };
        let password = match self.password_env {
            Some(var) => std::env::var(&var)
                .map_err(|_| anyhow::anyhow!("environment variable {var} is not set"))?,
            None => dialoguer::Password::new().with_prompt("Password").interact()?,
        };

        let session = auth::login(&mut ctx.api, &ctx.store, username.trim(), &password).await?;
        println!(
            "{}",
            format!("Logged in as {} ({})", session.username(), session.role()).success()
        );
        Ok(())
    }
}

#[instrument(skip(ctx))]
pub async fn logout(ctx: &mut Context) -> anyhow::Result<()> {
    let stored = ctx.store.load().unwrap_or_default();
    ctx.api.set_token(stored.token);
    auth::logout(&mut ctx.api, &ctx.store).await?;
    println!("{}", "Logged out".success());
    Ok(())
}

pub async fn whoami(ctx: &mut Context) -> anyhow::Result<()> {
    let session = ctx.session().await?;
    ctx.render(session.user(), |user| {
        println!("User:        {}", user.username);
        println!("Role:        {}", session.role().info());
        if user.permissions.is_empty() {
            println!("Permissions: {}", "none".dim());
        } else {
            println!("Permissions:");
            for permission in &user.permissions {
                println!("  • {permission}");
            }
        }
    })
}

/// Change your password
#[derive(Debug, clap::Parser)]
pub struct Password {}

impl Password {
    #[instrument(skip(ctx))]
    pub async fn run(self, ctx: &mut Context) -> anyhow::Result<()> {
        ctx.session().await?;

        let old = dialoguer::Password::new()
            .with_prompt("Current password")
            .interact()?;
        let new = dialoguer::Password::new()
            .with_prompt("New password")
            .with_confirmation("Repeat new password", "Passwords do not match")
            .interact()?;

        ctx.api.auth().change_password(&old, &new).await?;
        println!("{}", "Password changed".success());
        Ok(())
    }
}
