//! Persisted credentials and the authenticated session context.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

/// File name of the persisted session inside the state directory.
pub const SESSION_FILE: &str = "session.toml";

/// Fine-grained authorities granted to roles by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    /// Browse the client directory.
    ViewClients,
    /// Browse material changes.
    ViewChanges,
    /// Create and work cases.
    ManageCases,
    /// Run risk evaluations and the risk batch pipeline.
    ManageRisk,
    /// Run screenings and the screening batch pipeline.
    ManageScreening,
    /// Edit client records.
    ManageClients,
    /// Edit role permissions.
    ManagePermissions,
    /// Create users and change roles.
    ManageUsers,
    /// Read the user audit trail.
    ManageAudits,
    /// Edit runtime and material-change configuration.
    ManageConfig,
}

impl Permission {
    /// All known permissions.
    pub const ALL: [Self; 10] = [
        Self::ViewClients,
        Self::ViewChanges,
        Self::ManageCases,
        Self::ManageRisk,
        Self::ManageScreening,
        Self::ManageClients,
        Self::ManagePermissions,
        Self::ManageUsers,
        Self::ManageAudits,
        Self::ManageConfig,
    ];

    /// The backend's name for the permission.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ViewClients => "VIEW_CLIENTS",
            Self::ViewChanges => "VIEW_CHANGES",
            Self::ManageCases => "MANAGE_CASES",
            Self::ManageRisk => "MANAGE_RISK",
            Self::ManageScreening => "MANAGE_SCREENING",
            Self::ManageClients => "MANAGE_CLIENTS",
            Self::ManagePermissions => "MANAGE_PERMISSIONS",
            Self::ManageUsers => "MANAGE_USERS",
            Self::ManageAudits => "MANAGE_AUDITS",
            Self::ManageConfig => "MANAGE_CONFIG",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The user returned by `GET /users/me`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    /// Login name.
    pub username: String,
    /// Role as reported by the backend, possibly prefixed with `ROLE_`.
    #[serde(default)]
    pub role: Option<String>,
    /// Permissions granted to the role.
    #[serde(default)]
    pub permissions: Vec<String>,
}

/// Credentials persisted between invocations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    /// Bearer token issued at login.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Name the user logged in with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// Errors raised by the session store and the session guards.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No token is stored.
    #[error("not logged in; run `kyc login` first")]
    NotLoggedIn,

    /// The backend rejected the stored token, which has been discarded.
    #[error("session expired or invalid; redirected to /login, run `kyc login` again")]
    Expired,

    /// The backend refused the credentials.
    #[error("Invalid username or password")]
    InvalidCredentials,

    /// The session lacks a permission.
    #[error("permission {0} required")]
    PermissionDenied(Permission),

    /// The session does not have the required role.
    #[error("role {0} required")]
    RoleRequired(String),

    /// The session file could not be read or written.
    #[error("failed to access session file {path}: {source}")]
    Io {
        /// Location of the file.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// The session file is corrupt.
    #[error("failed to parse session file {path}: {source}")]
    Parse {
        /// Location of the file.
        path: PathBuf,
        /// TOML decoder error.
        source: toml::de::Error,
    },

    /// The session could not be serialized.
    #[error("failed to serialize session: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Durable key-value storage for the token and username.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    /// A store keeping its file in `state_dir`.
    #[must_use]
    pub fn new(state_dir: &Path) -> Self {
        Self {
            path: state_dir.join(SESSION_FILE),
        }
    }

    /// Location of the session file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the stored session. A missing file is an empty session.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(&self) -> Result<StoredSession, SessionError> {
        if !self.path.exists() {
            return Ok(StoredSession::default());
        }
        let content = std::fs::read_to_string(&self.path).map_err(|source| SessionError::Io {
            path: self.path.clone(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| SessionError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    /// Overwrites the stored session.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, session: &StoredSession) -> Result<(), SessionError> {
        let io = |source| SessionError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(io)?;
        }
        std::fs::write(&self.path, toml::to_string_pretty(session)?).map_err(io)?;
        restrict_permissions(&self.path).map_err(io)?;
        tracing::debug!(path = %self.path.display(), "session saved");
        Ok(())
    }

    /// Removes the stored token and username.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be removed.
    pub fn clear(&self) -> Result<(), SessionError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::debug!(path = %self.path.display(), "session cleared");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(SessionError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

/// The authenticated user, passed explicitly to everything that needs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    user: CurrentUser,
    role: String,
}

impl Session {
    /// Wraps the user returned by the session check.
    #[must_use]
    pub fn new(user: CurrentUser) -> Self {
        let role = user
            .role
            .as_deref()
            .map(normalize_role)
            .unwrap_or_default();
        Self { user, role }
    }

    /// Login name.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.user.username
    }

    /// Role without the `ROLE_` prefix. Empty when the backend sent none.
    #[must_use]
    pub fn role(&self) -> &str {
        &self.role
    }

    /// The user as reported by the backend.
    #[must_use]
    pub const fn user(&self) -> &CurrentUser {
        &self.user
    }

    /// True for the administrator role.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == "ADMIN"
    }

    /// True when the permission was granted or the user is an administrator.
    #[must_use]
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.is_admin() || self.user.permissions.iter().any(|p| p == permission.as_str())
    }

    /// Fails unless [`Session::has_permission`] holds.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::PermissionDenied`].
    pub fn require(&self, permission: Permission) -> Result<(), SessionError> {
        if self.has_permission(permission) {
            Ok(())
        } else {
            tracing::info!(user = self.username(), %permission, "permission missing");
            Err(SessionError::PermissionDenied(permission))
        }
    }

    /// Fails unless the session has exactly this role.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::RoleRequired`].
    pub fn require_role(&self, role: &str) -> Result<(), SessionError> {
        if self.role == normalize_role(role) {
            Ok(())
        } else {
            Err(SessionError::RoleRequired(role.to_string()))
        }
    }
}

/// Strips the `ROLE_` prefix Spring Security puts on authorities.
#[must_use]
pub fn normalize_role(role: &str) -> String {
    role.strip_prefix("ROLE_").unwrap_or(role).to_string()
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    fn user(role: &str, permissions: &[&str]) -> Session {
        Session::new(CurrentUser {
            username: "jdoe".to_string(),
            role: Some(role.to_string()),
            permissions: permissions.iter().map(ToString::to_string).collect(),
        })
    }

    #[test_case("ROLE_ADMIN", &[], Permission::ManageUsers, true; "admin has everything")]
    #[test_case("ADMIN", &[], Permission::ManageConfig, true; "unprefixed admin")]
    #[test_case("ROLE_KYC_ANALYST", &["MANAGE_CASES"], Permission::ManageCases, true; "granted")]
    #[test_case("ROLE_KYC_ANALYST", &["MANAGE_CASES"], Permission::ManageScreening, false; "not granted")]
    fn permission_checks(role: &str, permissions: &[&str], wanted: Permission, expected: bool) {
        let session = user(role, permissions);
        assert_eq!(session.has_permission(wanted), expected);
        assert_eq!(session.require(wanted).is_ok(), expected);
    }

    #[test]
    fn role_is_normalized() {
        let session = user("ROLE_KYC_REVIEWER", &[]);
        assert_eq!(session.role(), "KYC_REVIEWER");
        assert!(session.require_role("KYC_REVIEWER").is_ok());
        assert!(session.require_role("ROLE_KYC_REVIEWER").is_ok());
        assert!(matches!(
            session.require_role("ADMIN"),
            Err(SessionError::RoleRequired(_))
        ));
    }

    #[test]
    fn store_round_trips_and_clears() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SessionStore::new(tmp.path());
        assert_eq!(store.load().unwrap(), StoredSession::default());

        let session = StoredSession {
            token: Some("jwt".to_string()),
            username: Some("jdoe".to_string()),
        };
        store.save(&session).unwrap();
        assert_eq!(store.load().unwrap(), session);

        store.clear().unwrap();
        assert!(!store.path().exists());
        store.clear().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn session_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let store = SessionStore::new(tmp.path());
        store
            .save(&StoredSession {
                token: Some("jwt".to_string()),
                username: None,
            })
            .unwrap();

        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
