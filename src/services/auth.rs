use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::{
    error::ApiError,
    http::ApiClient,
    session::{CurrentUser, Session, SessionError, SessionStore, StoredSession},
};

/// Reply to `POST /auth/login`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    /// Bearer token for later requests.
    pub access_token: String,
    /// Canonical user name.
    pub username: String,
    /// Role of the user.
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Serialize)]
struct Credentials<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordChange<'a> {
    old_password: &'a str,
    new_password: &'a str,
}

/// Authentication endpoints.
#[derive(Debug, Clone, Copy)]
pub struct Auth<'a> {
    api: &'a ApiClient,
}

impl<'a> Auth<'a> {
    /// Wraps a client.
    #[must_use]
    pub const fn new(api: &'a ApiClient) -> Self {
        Self { api }
    }

    /// Exchanges credentials for a token.
    ///
    /// # Errors
    ///
    /// 401 for unknown users or wrong passwords, 403 for inactive users.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ApiError> {
        self.api
            .post("/auth/login", &Credentials { username, password })
            .await
    }

    /// The user behind the current token.
    ///
    /// # Errors
    ///
    /// 401 when the token is missing, expired or invalid.
    pub async fn me(&self) -> Result<CurrentUser, ApiError> {
        self.api.get("/users/me").await
    }

    /// Tells the backend the session ended.
    ///
    /// # Errors
    ///
    /// Propagates transport and status errors.
    pub async fn logout(&self) -> Result<(), ApiError> {
        self.api.post_empty("/auth/logout").await.map(|_| ())
    }

    /// Changes the current user's password.
    ///
    /// # Errors
    ///
    /// Fails when the old password is wrong or the request is rejected.
    pub async fn change_password(&self, old_password: &str, new_password: &str) -> Result<(), ApiError> {
        self.api
            .post_unit(
                "/users/password",
                Some(&PasswordChange {
                    old_password,
                    new_password,
                }),
            )
            .await
            .map(|_| ())
    }
}

/// Logs in, persists the token and validates it with a session check.
///
/// # Errors
///
/// Any login failure is reported as [`SessionError::InvalidCredentials`].
#[instrument(skip(api, store, password))]
pub async fn login(
    api: &mut ApiClient,
    store: &SessionStore,
    username: &str,
    password: &str,
) -> Result<Session, SessionError> {
    let response = api.auth().login(username, password).await.map_err(|e| {
        tracing::info!(error = %e, "login rejected");
        SessionError::InvalidCredentials
    })?;

    store.save(&StoredSession {
        token: Some(response.access_token.clone()),
        username: Some(response.username),
    })?;
    api.set_token(Some(response.access_token));

    check_session(api, store).await
}

/// Loads the stored token into `api` and validates it.
///
/// # Errors
///
/// See [`check_session`].
pub async fn restore(api: &mut ApiClient, store: &SessionStore) -> Result<Session, SessionError> {
    let stored = store.load()?;
    api.set_token(stored.token);
    check_session(api, store).await
}

/// Validates the token carried by `api` against `GET /users/me`.
///
/// When the check fails for any reason the stored token and username are
/// discarded and the caller must log in again.
///
/// # Errors
///
/// [`SessionError::NotLoggedIn`] without a token, [`SessionError::Expired`]
/// when the check fails.
#[instrument(skip_all)]
pub async fn check_session(api: &ApiClient, store: &SessionStore) -> Result<Session, SessionError> {
    if !api.has_token() {
        return Err(SessionError::NotLoggedIn);
    }

    match api.auth().me().await {
        Ok(user) => {
            tracing::debug!(user = %user.username, "session valid");
            Ok(Session::new(user))
        }
        Err(e) => {
            tracing::warn!(error = %e, "session check failed, discarding stored token");
            store.clear()?;
            Err(SessionError::Expired)
        }
    }
}

/// Ends the session. The local credentials are removed even when the backend
/// cannot be reached.
///
/// # Errors
///
/// Fails only when the session file cannot be removed.
pub async fn logout(api: &mut ApiClient, store: &SessionStore) -> Result<(), SessionError> {
    if api.has_token() {
        if let Err(e) = api.auth().logout().await {
            tracing::info!(error = %e, "backend logout failed");
        }
    }
    store.clear()?;
    api.set_token(None);
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::http::{Method, RawResponse, fake::FakeTransport};

    #[tokio::test]
    async fn expired_token_is_discarded() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SessionStore::new(tmp.path());
        store
            .save(&StoredSession {
                token: Some("stale".into()),
                username: Some("jdoe".into()),
            })
            .unwrap();

        let fake = FakeTransport::new();
        fake.on(Method::Get, "/users/me", RawResponse::text(401, ""));
        let mut api = fake.client();

        let result = restore(&mut api, &store).await;

        assert!(matches!(result, Err(SessionError::Expired)));
        assert_eq!(store.load().unwrap(), StoredSession::default());
        assert_eq!(
            fake.requests()[0].header("Authorization"),
            Some("Bearer stale")
        );
    }

    #[tokio::test]
    async fn missing_token_never_calls_backend() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SessionStore::new(tmp.path());
        let fake = FakeTransport::new();
        let mut api = fake.client();

        let result = restore(&mut api, &store).await;

        assert!(matches!(result, Err(SessionError::NotLoggedIn)));
        assert!(fake.requests().is_empty());
    }

    #[tokio::test]
    async fn login_persists_token_and_loads_user() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SessionStore::new(tmp.path());
        let fake = FakeTransport::new();
        fake.on_json(
            Method::Post,
            "/auth/login",
            json!({"accessToken": "jwt-1", "username": "jdoe", "role": "KYC_ANALYST"}),
        );
        fake.on_json(
            Method::Get,
            "/users/me",
            json!({"username": "jdoe", "role": "ROLE_KYC_ANALYST", "permissions": ["MANAGE_CASES"]}),
        );
        let mut api = ApiClient::new(crate::http::fake::BASE_URL, fake.clone());

        let session = login(&mut api, &store, "jdoe", "secret").await.unwrap();

        assert_eq!(session.role(), "KYC_ANALYST");
        assert_eq!(store.load().unwrap().token.as_deref(), Some("jwt-1"));
        let requests = fake.requests();
        assert_eq!(requests[0].header("Authorization"), None);
        assert_eq!(requests[1].header("Authorization"), Some("Bearer jwt-1"));
    }

    #[tokio::test]
    async fn inactive_user_cannot_log_in() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SessionStore::new(tmp.path());
        let fake = FakeTransport::new();
        fake.on(
            Method::Post,
            "/auth/login",
            RawResponse::json(403, &json!({"error": "User is inactive"})),
        );
        let mut api = ApiClient::new(crate::http::fake::BASE_URL, fake.clone());

        let result = login(&mut api, &store, "old", "pw").await;

        assert!(matches!(result, Err(SessionError::InvalidCredentials)));
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn logout_clears_even_when_backend_is_down() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SessionStore::new(tmp.path());
        store
            .save(&StoredSession {
                token: Some("jwt".into()),
                username: Some("jdoe".into()),
            })
            .unwrap();
        let fake = FakeTransport::new();
        fake.fail(Method::Post, "/auth/logout", "connection refused");
        let mut api = fake.client();

        logout(&mut api, &store).await.unwrap();

        assert!(!api.has_token());
        assert!(!store.path().exists());
    }
}
