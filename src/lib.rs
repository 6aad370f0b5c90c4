//! Client library for a KYC compliance back office.
//!
//! All business logic lives in a remote backend reached over JSON/HTTP. This
//! crate provides the authenticated [`http::ApiClient`], one thin wrapper per
//! backend domain in [`services`], the typed records in [`model`], and the
//! few pieces of client-side state the console needs: the persisted
//! [`session`], the screening [`monitor`] and the batch [`pipeline`] stepper.

/// Versioned TOML configuration of the console.
pub mod config;
pub mod error;
pub mod export;
pub mod history;
pub mod http;
pub mod model;
pub mod monitor;
pub mod notify;
pub mod pipeline;
pub mod services;
pub mod session;

pub use config::Config;
pub use error::ApiError;
pub use http::ApiClient;
pub use session::{Permission, Session, SessionError, SessionStore};
