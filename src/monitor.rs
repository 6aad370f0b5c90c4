//! The screening panel of a client and its background status poller.
//!
//! A [`ScreeningMonitor`] holds the panel state for one client. Starting a
//! screening moves it to [`PanelState::InProgress`]; a [`PollTask`] then asks
//! for the status on a fixed interval until every context has finished.

use std::{sync::Arc, time::Duration};

use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};
use tracing::instrument;

use crate::{
    error::ApiError,
    http::ApiClient,
    model::{ContextResult, ContextType, ScreeningLog},
    notify::Notifier,
    session::{Permission, Session, SessionError},
};

/// Default delay between two status requests.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Overall state of the screening panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelState {
    /// No screening was started in this session.
    NotRun,
    /// Waiting on the provider.
    InProgress {
        /// Backend request being polled.
        request_id: String,
    },
    /// Finished with at least one alert.
    Hit,
    /// Finished without alerts.
    NoHit,
}

impl PanelState {
    /// True while the poller has work to do.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        matches!(self, Self::InProgress { .. })
    }

    /// Label shown next to the indicator.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::NotRun => "NOT_RUN",
            Self::InProgress { .. } => "IN_PROGRESS",
            Self::Hit => "HIT",
            Self::NoHit => "NO_HIT",
        }
    }
}

/// Errors raised by the screening panel.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// The user may not run screenings.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A screening is already being polled.
    #[error("screening {0} is already in progress")]
    AlreadyRunning(String),

    /// The backend refused to start the screening.
    #[error("Failed to start screening: {0}")]
    Start(#[source] ApiError),

    /// The poller stopped before the screening finished.
    #[error("screening still running after {0:?}; results will appear in the history")]
    TimedOut(Duration),

    /// The poller was cancelled.
    #[error("status polling was cancelled")]
    Cancelled,

    /// The poll interval must be longer than zero.
    #[error("poll interval must be greater than zero")]
    ZeroInterval,
}

/// What the panel shows at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Overall state.
    pub state: PanelState,
    /// Per-context results.
    pub results: Vec<ContextResult>,
}

/// State machine behind the screening panel of one client.
pub struct ScreeningMonitor {
    api: ApiClient,
    client_id: i64,
    state: PanelState,
    results: Vec<ContextResult>,
    notifier: Arc<dyn Notifier>,
}

impl std::fmt::Debug for ScreeningMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScreeningMonitor")
            .field("client_id", &self.client_id)
            .field("state", &self.state)
            .field("results", &self.results)
            .finish_non_exhaustive()
    }
}

impl ScreeningMonitor {
    /// A panel that has not run yet.
    pub fn new(api: ApiClient, client_id: i64, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            api,
            client_id,
            state: PanelState::NotRun,
            results: Vec::new(),
            notifier,
        }
    }

    /// Current overall state.
    #[must_use]
    pub const fn state(&self) -> &PanelState {
        &self.state
    }

    /// Current per-context results.
    #[must_use]
    pub fn results(&self) -> &[ContextResult] {
        &self.results
    }

    /// The panel as a value.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: self.state.clone(),
            results: self.results.clone(),
        }
    }

    /// Starts a screening.
    ///
    /// On success every panel context shows `IN_PROGRESS`. On failure the
    /// panel returns to [`PanelState::NotRun`] and an error is shown.
    ///
    /// # Errors
    ///
    /// Fails without the screening permission, while a screening is already
    /// running, or when the backend refuses the request.
    #[instrument(skip(self, session), fields(client_id = self.client_id))]
    pub async fn start(&mut self, session: &Session) -> Result<&PanelState, MonitorError> {
        session.require(Permission::ManageScreening)?;
        if let PanelState::InProgress { request_id } = &self.state {
            return Err(MonitorError::AlreadyRunning(request_id.clone()));
        }

        match self.api.screening().initiate(self.client_id).await {
            Ok(started) => {
                tracing::info!(request_id = %started.request_id, "screening initiated");
                self.state = PanelState::InProgress {
                    request_id: started.request_id,
                };
                self.results = ContextType::PANEL
                    .into_iter()
                    .map(ContextResult::pending)
                    .collect();
                self.notifier.info("Screening Initiated");
                Ok(&self.state)
            }
            Err(e) => {
                self.state = PanelState::NotRun;
                let error = MonitorError::Start(e);
                self.notifier.error(&error.to_string());
                Err(error)
            }
        }
    }

    /// Asks for the status once and updates the panel.
    ///
    /// A failed request is logged and leaves the panel unchanged so the next
    /// poll can try again. Does nothing unless a screening is running.
    pub async fn poll_once(&mut self) -> &PanelState {
        let PanelState::InProgress { request_id } = &self.state else {
            return &self.state;
        };

        let status = match self.api.screening().status(request_id).await {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(error = %e, request_id, "failed to check screening status");
                return &self.state;
            }
        };

        let running = status.in_progress();
        let hit = status.any_hit();
        self.results = status.results;

        if running {
            tracing::debug!(request_id, "screening still running");
        } else if hit {
            self.state = PanelState::Hit;
            self.notifier.warning("Screening Completed: Alert Found");
        } else {
            self.state = PanelState::NoHit;
            self.notifier.success("Screening Completed: No Hits");
        }
        &self.state
    }

    /// Past screenings of the client.
    ///
    /// # Errors
    ///
    /// Propagates transport, status and decode errors.
    pub async fn history(&self) -> Result<Vec<ScreeningLog>, ApiError> {
        self.api.screening().history(self.client_id).await
    }
}

/// Background task polling a running screening.
///
/// Dropping the task, or calling [`PollTask::cancel`], stops the polling.
/// The screening itself keeps running on the backend.
#[derive(Debug)]
pub struct PollTask {
    handle: Option<JoinHandle<ScreeningMonitor>>,
    updates: watch::Receiver<Snapshot>,
    timeout: Option<Duration>,
}

impl PollTask {
    /// Starts polling every `interval`. The first request goes out one
    /// interval after the call.
    ///
    /// # Errors
    ///
    /// [`MonitorError::ZeroInterval`] when `interval` is zero.
    pub fn spawn(
        mut monitor: ScreeningMonitor,
        interval: Duration,
        timeout: Option<Duration>,
    ) -> Result<Self, MonitorError> {
        if interval.is_zero() {
            return Err(MonitorError::ZeroInterval);
        }
        let (tx, updates) = watch::channel(monitor.snapshot());
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            while monitor.state().is_running() {
                ticker.tick().await;
                monitor.poll_once().await;
                tx.send_replace(monitor.snapshot());
            }
            monitor
        });

        Ok(Self {
            handle: Some(handle),
            updates,
            timeout,
        })
    }

    /// Receives a snapshot after every poll.
    #[must_use]
    pub fn updates(&self) -> watch::Receiver<Snapshot> {
        self.updates.clone()
    }

    /// Stops polling.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            tracing::debug!("screening poller cancelled");
        }
    }

    /// Waits for the screening to finish and hands the panel back.
    ///
    /// # Errors
    ///
    /// [`MonitorError::TimedOut`] when the timeout elapses first, in which
    /// case polling stops. [`MonitorError::Cancelled`] when the task was
    /// cancelled.
    pub async fn wait(mut self) -> Result<ScreeningMonitor, MonitorError> {
        let Some(mut handle) = self.handle.take() else {
            return Err(MonitorError::Cancelled);
        };

        let joined = match self.timeout {
            Some(limit) => {
                if let Ok(joined) = tokio::time::timeout(limit, &mut handle).await {
                    joined
                } else {
                    handle.abort();
                    return Err(MonitorError::TimedOut(limit));
                }
            }
            None => handle.await,
        };
        joined.map_err(|_| MonitorError::Cancelled)
    }
}

impl Drop for PollTask {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        http::{Method, RawResponse, fake::FakeTransport},
        model::ContextStatus,
        notify::{Level, testing::RecordingNotifier},
        session::CurrentUser,
    };

    fn screener() -> Session {
        Session::new(CurrentUser {
            username: "jdoe".into(),
            role: Some("ROLE_KYC_ANALYST".into()),
            permissions: vec!["MANAGE_SCREENING".into()],
        })
    }

    fn status(statuses: [&str; 4]) -> serde_json::Value {
        json!({
            "requestId": "r-1",
            "results": ["PEP", "ADM", "INT", "SAN"]
                .iter()
                .zip(statuses)
                .map(|(context, status)| json!({"contextType": context, "status": status}))
                .collect::<Vec<_>>(),
        })
    }

    fn monitor(fake: &Arc<FakeTransport>) -> (ScreeningMonitor, Arc<RecordingNotifier>) {
        let notifier = Arc::new(RecordingNotifier::default());
        (
            ScreeningMonitor::new(fake.client(), 5, notifier.clone()),
            notifier,
        )
    }

    #[tokio::test]
    async fn start_marks_every_context_in_progress() {
        let fake = FakeTransport::new();
        fake.on_json(Method::Post, "/screening/initiate/5", json!({"requestId": "r-1"}));
        let (mut monitor, notifier) = monitor(&fake);

        monitor.start(&screener()).await.unwrap();

        assert_eq!(
            monitor.state(),
            &PanelState::InProgress {
                request_id: "r-1".into()
            }
        );
        assert_eq!(monitor.results().len(), 4);
        assert!(monitor
            .results()
            .iter()
            .all(|r| r.status == ContextStatus::InProgress));
        assert_eq!(notifier.last(), Some((Level::Info, "Screening Initiated".into())));
    }

    #[tokio::test]
    async fn failed_start_returns_to_not_run() {
        let fake = FakeTransport::new();
        fake.on(
            Method::Post,
            "/screening/initiate/5",
            RawResponse::json(502, &json!({"message": "Provider unavailable"})),
        );
        let (mut monitor, notifier) = monitor(&fake);

        let error = monitor.start(&screener()).await.unwrap_err();

        assert!(matches!(error, MonitorError::Start(_)));
        assert_eq!(monitor.state(), &PanelState::NotRun);
        assert_eq!(
            notifier.last(),
            Some((
                Level::Error,
                "Failed to start screening: Provider unavailable".into()
            ))
        );
    }

    #[tokio::test]
    async fn start_requires_permission() {
        let fake = FakeTransport::new();
        let (mut monitor, _) = monitor(&fake);
        let viewer = Session::new(CurrentUser {
            username: "viewer".into(),
            role: Some("VIEWER".into()),
            permissions: vec![],
        });

        let error = monitor.start(&viewer).await.unwrap_err();

        assert!(matches!(
            error,
            MonitorError::Session(SessionError::PermissionDenied(Permission::ManageScreening))
        ));
        assert!(fake.requests().is_empty());
    }

    #[tokio::test]
    async fn poll_settles_on_hit() {
        let fake = FakeTransport::new();
        fake.on_json(Method::Post, "/screening/initiate/5", json!({"requestId": "r-1"}));
        fake.on_json(
            Method::Get,
            "/screening/status/r-1",
            status(["NO_HIT", "IN_PROGRESS", "NO_HIT", "NO_HIT"]),
        );
        fake.on_json(
            Method::Get,
            "/screening/status/r-1",
            status(["NO_HIT", "NO_HIT", "NO_HIT", "HIT"]),
        );
        let (mut monitor, notifier) = monitor(&fake);
        monitor.start(&screener()).await.unwrap();

        assert!(monitor.poll_once().await.is_running());
        assert_eq!(monitor.poll_once().await, &PanelState::Hit);
        assert_eq!(
            notifier.last(),
            Some((Level::Warning, "Screening Completed: Alert Found".into()))
        );
    }

    #[tokio::test]
    async fn failed_poll_keeps_waiting() {
        let fake = FakeTransport::new();
        fake.on_json(Method::Post, "/screening/initiate/5", json!({"requestId": "r-1"}));
        fake.fail(Method::Get, "/screening/status/r-1", "connection reset");
        let (mut monitor, _) = monitor(&fake);
        monitor.start(&screener()).await.unwrap();

        assert!(monitor.poll_once().await.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn poller_requests_status_every_interval() {
        let fake = FakeTransport::new();
        fake.on_json(Method::Post, "/screening/initiate/5", json!({"requestId": "r-1"}));
        fake.on_json(
            Method::Get,
            "/screening/status/r-1",
            status(["IN_PROGRESS"; 4]),
        );
        let (mut monitor, _) = monitor(&fake);
        monitor.start(&screener()).await.unwrap();

        let task = PollTask::spawn(monitor, DEFAULT_POLL_INTERVAL, None).unwrap();
        tokio::time::sleep(Duration::from_millis(4_100)).await;
        assert_eq!(fake.count(Method::Get, "/screening/status/r-1"), 2);

        drop(task);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(fake.count(Method::Get, "/screening/status/r-1"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn poller_hands_back_finished_panel() {
        let fake = FakeTransport::new();
        fake.on_json(Method::Post, "/screening/initiate/5", json!({"requestId": "r-1"}));
        fake.on_json(
            Method::Get,
            "/screening/status/r-1",
            status(["IN_PROGRESS"; 4]),
        );
        fake.on_json(
            Method::Get,
            "/screening/status/r-1",
            status(["NO_HIT"; 4]),
        );
        let (mut monitor, notifier) = monitor(&fake);
        monitor.start(&screener()).await.unwrap();

        let monitor = PollTask::spawn(monitor, DEFAULT_POLL_INTERVAL, None)
            .unwrap()
            .wait()
            .await
            .unwrap();

        assert_eq!(monitor.state(), &PanelState::NoHit);
        assert_eq!(
            notifier.last(),
            Some((Level::Success, "Screening Completed: No Hits".into()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn poller_gives_up_after_timeout() {
        let fake = FakeTransport::new();
        fake.on_json(Method::Post, "/screening/initiate/5", json!({"requestId": "r-1"}));
        fake.on_json(
            Method::Get,
            "/screening/status/r-1",
            status(["IN_PROGRESS"; 4]),
        );
        let (mut monitor, _) = monitor(&fake);
        monitor.start(&screener()).await.unwrap();

        let result = PollTask::spawn(monitor, DEFAULT_POLL_INTERVAL, Some(Duration::from_secs(7)))
            .unwrap()
            .wait()
            .await;

        assert!(matches!(result, Err(MonitorError::TimedOut(_))));
        assert_eq!(fake.count(Method::Get, "/screening/status/r-1"), 3);
    }

    #[tokio::test]
    async fn zero_interval_is_refused() {
        let fake = FakeTransport::new();
        fake.on_json(Method::Post, "/screening/initiate/5", json!({"requestId": "r-1"}));
        let (mut monitor, _) = monitor(&fake);
        monitor.start(&screener()).await.unwrap();

        let result = PollTask::spawn(monitor, Duration::ZERO, None);

        assert!(matches!(result, Err(MonitorError::ZeroInterval)));
        assert_eq!(fake.count(Method::Get, "/screening/status/r-1"), 0);
    }
}
