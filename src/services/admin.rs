use std::collections::BTreeMap;

use serde::Serialize;
use tracing::instrument;

use crate::{
    error::ApiError,
    http::{ApiClient, ApiResponse, encode},
    model::{ManagedService, NewUser, ServiceAction, User, UserAudit},
};

/// Permissions granted to each role.
pub type RolePermissions = BTreeMap<String, Vec<String>>;

#[derive(Serialize)]
struct RoleChange<'a> {
    role: &'a str,
}

#[derive(Serialize)]
struct PermissionSet<'a> {
    permissions: &'a [String],
}

/// Administration endpoints: users, permissions, runtime configuration,
/// service control and audits.
#[derive(Debug, Clone, Copy)]
pub struct Admin<'a> {
    api: &'a ApiClient,
}

impl<'a> Admin<'a> {
    /// Wraps a client.
    #[must_use]
    pub const fn new(api: &'a ApiClient) -> Self {
        Self { api }
    }

    /// Every user.
    ///
    /// # Errors
    ///
    /// Propagates transport, status and decode errors.
    pub async fn users(&self) -> Result<Vec<User>, ApiError> {
        self.api.get("/users").await
    }

    /// Creates a user.
    ///
    /// # Errors
    ///
    /// Rejects a blank username or password before sending. Propagates
    /// transport and status errors.
    #[instrument(skip(self, user), fields(username = %user.username, role = %user.role))]
    pub async fn create_user(&self, user: &NewUser) -> Result<ApiResponse, ApiError> {
        if user.username.trim().is_empty() || user.password.is_empty() {
            return Err(ApiError::Validation(
                "Username and password are required".to_string(),
            ));
        }
        self.api.post_unit("/users", Some(user)).await
    }

    /// Changes the role of a user.
    ///
    /// # Errors
    ///
    /// Propagates transport and status errors.
    #[instrument(skip(self))]
    pub async fn set_role(&self, username: &str, role: &str) -> Result<ApiResponse, ApiError> {
        self.api
            .put_unit(&format!("/users/{}/role", encode(username)), &RoleChange { role })
            .await
    }

    /// Permissions currently granted to each role.
    ///
    /// # Errors
    ///
    /// Propagates transport, status and decode errors.
    pub async fn permissions(&self) -> Result<RolePermissions, ApiError> {
        self.api.get("/permissions").await
    }

    /// Every permission the backend knows.
    ///
    /// # Errors
    ///
    /// Propagates transport, status and decode errors.
    pub async fn all_permissions(&self) -> Result<Vec<String>, ApiError> {
        self.api.get("/permissions/all").await
    }

    /// Replaces the permissions of a role.
    ///
    /// # Errors
    ///
    /// Propagates transport and status errors.
    #[instrument(skip(self))]
    pub async fn set_role_permissions(
        &self,
        role: &str,
        permissions: &[String],
    ) -> Result<ApiResponse, ApiError> {
        self.api
            .post_unit(
                &format!("/permissions/role/{}", encode(role)),
                Some(&PermissionSet { permissions }),
            )
            .await
    }

    /// The backend's safe-to-expose runtime properties, in backend order.
    ///
    /// # Errors
    ///
    /// Propagates transport, status and decode errors.
    pub async fn runtime_config(&self) -> Result<serde_json::Map<String, serde_json::Value>, ApiError> {
        self.api.get("/admin/config").await
    }

    /// Status of each managed service.
    ///
    /// # Errors
    ///
    /// Propagates transport, status and decode errors.
    pub async fn services(&self) -> Result<Vec<ManagedService>, ApiError> {
        self.api.get("/services").await
    }

    /// Starts, stops or restarts a service.
    ///
    /// # Errors
    ///
    /// Propagates transport and status errors.
    #[instrument(skip(self))]
    pub async fn service_action(&self, key: &str, action: ServiceAction) -> Result<ApiResponse, ApiError> {
        self.api
            .post_empty(&format!("/services/{}/{action}", encode(key)))
            .await
    }

    /// The user audit trail.
    ///
    /// # Errors
    ///
    /// Propagates transport, status and decode errors.
    pub async fn audits(&self) -> Result<Vec<UserAudit>, ApiError> {
        self.api.get("/admin/audits").await
    }
}
