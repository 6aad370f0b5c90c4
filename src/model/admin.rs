use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::time;

/// A console user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Login name.
    pub username: String,
    /// Role name.
    #[serde(default)]
    pub role: Option<String>,
    /// False for disabled accounts.
    #[serde(default)]
    pub active: Option<bool>,
    /// Time of the last successful login.
    #[serde(default, with = "time")]
    pub last_login: Option<NaiveDateTime>,
}

/// Body of `POST /users`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewUser {
    /// Login name.
    pub username: String,
    /// Initial password.
    pub password: String,
    /// Role to grant.
    pub role: String,
    /// Whether the account can log in.
    pub active: bool,
}

/// An entry of the user audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAudit {
    /// Entry id.
    #[serde(rename = "auditID", default)]
    pub audit_id: Option<i64>,
    /// Numeric id of the acting user.
    #[serde(rename = "userID", default)]
    pub user_id: Option<i64>,
    /// Login name of the acting user.
    #[serde(default)]
    pub username: Option<String>,
    /// What was done, e.g. `LOGIN`.
    #[serde(default)]
    pub action: Option<String>,
    /// Free-text details.
    #[serde(default)]
    pub details: Option<String>,
    /// Address the request came from.
    #[serde(default)]
    pub ip_address: Option<String>,
    /// When it happened.
    #[serde(default, with = "time")]
    pub timestamp: Option<NaiveDateTime>,
}

/// Liveness of a backend service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ServiceState {
    /// Running and answering.
    Up,
    /// Stopped.
    Down,
    /// Any state this client does not know.
    #[serde(other)]
    Unknown,
}

/// A backend service the console can start and stop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedService {
    /// Identifier used in service actions.
    pub key: String,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Port the service listens on.
    #[serde(default)]
    pub port: Option<u16>,
    /// Last known state.
    pub status: ServiceState,
}

/// Lifecycle operations accepted by `POST /services/{name}/{action}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ServiceAction {
    /// Start a stopped service.
    Start,
    /// Stop a running service.
    Stop,
    /// Stop then start.
    Restart,
}

impl fmt::Display for ServiceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
        })
    }
}
