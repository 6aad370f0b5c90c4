//! Thin per-domain wrappers over [`ApiClient`].
//!
//! Each wrapper borrows the client and maps one method to one endpoint. The
//! only logic here is request shaping and the few places where a view
//! tolerates a failing secondary fetch.

use crate::{error::ApiError, http::ApiClient};

/// Ad-hoc task endpoints.
pub mod adhoc;
/// User, permission, service and audit endpoints.
pub mod admin;
/// Login, logout and the current user.
pub mod auth;
/// Screening and risk batch pipeline endpoints.
pub mod batches;
/// Case, document and workflow endpoints.
pub mod cases;
/// Material change endpoints.
pub mod changes;
/// Client directory endpoints.
pub mod clients;
/// Case questionnaire endpoints.
pub mod questionnaire;
/// Risk evaluation endpoints.
pub mod risk;
/// Individual screening endpoints.
pub mod screening;

pub use adhoc::AdHocTasks;
pub use admin::Admin;
pub use auth::Auth;
pub use batches::{RiskBatches, ScreeningBatches};
pub use cases::Cases;
pub use changes::Changes;
pub use clients::Clients;
pub use questionnaire::Questionnaires;
pub use risk::Risk;
pub use screening::Screening;

impl ApiClient {
    /// Login, logout and the current user.
    #[must_use]
    pub const fn auth(&self) -> Auth<'_> {
        Auth::new(self)
    }

    /// The client directory.
    #[must_use]
    pub const fn clients(&self) -> Clients<'_> {
        Clients::new(self)
    }

    /// Material changes and their configuration.
    #[must_use]
    pub const fn changes(&self) -> Changes<'_> {
        Changes::new(self)
    }

    /// Cases, documents and workflow tasks.
    #[must_use]
    pub const fn cases(&self) -> Cases<'_> {
        Cases::new(self)
    }

    /// Risk evaluation.
    #[must_use]
    pub const fn risk(&self) -> Risk<'_> {
        Risk::new(self)
    }

    /// Individual screenings.
    #[must_use]
    pub const fn screening(&self) -> Screening<'_> {
        Screening::new(self)
    }

    /// The screening batch pipeline.
    #[must_use]
    pub const fn screening_batches(&self) -> ScreeningBatches<'_> {
        ScreeningBatches::new(self)
    }

    /// The risk batch pipeline.
    #[must_use]
    pub const fn risk_batches(&self) -> RiskBatches<'_> {
        RiskBatches::new(self)
    }

    /// Users, permissions, services and audits.
    #[must_use]
    pub const fn admin(&self) -> Admin<'_> {
        Admin::new(self)
    }

    /// Ad-hoc tasks between users.
    #[must_use]
    pub const fn adhoc(&self) -> AdHocTasks<'_> {
        AdHocTasks::new(self)
    }

    /// Case questionnaires.
    #[must_use]
    pub const fn questionnaires(&self) -> Questionnaires<'_> {
        Questionnaires::new(self)
    }
}

/// Replaces a failed secondary fetch with an empty value, logging why.
pub(crate) fn or_empty<T: Default>(what: &str, result: Result<T, ApiError>) -> T {
    result.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load {what}");
        T::default()
    })
}
