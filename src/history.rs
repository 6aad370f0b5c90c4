//! Combined history of risk and screening batch runs.

use std::{cmp::Ordering, fmt};

use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;

use crate::{error::ApiError, http::ApiClient, model::BatchRun, services::changes::SortDirection};

/// Service that ran a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, clap::ValueEnum)]
pub enum BatchService {
    /// The risk engine.
    Risk,
    /// The screening provider.
    Screening,
}

impl fmt::Display for BatchService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Risk => "Risk",
            Self::Screening => "Screening",
        })
    }
}

/// A batch run tagged with its service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// The run as reported by its service.
    #[serde(flatten)]
    pub run: BatchRun,
    /// Service that ran it.
    pub service: BatchService,
}

/// Column the history is ordered by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum SortKey {
    /// Batch id.
    BatchId,
    /// Batch name.
    BatchName,
    /// Owning service.
    Service,
    /// Run status.
    RunStatus,
    /// Creation time.
    #[default]
    CreatedAt,
    /// Last update time.
    UpdatedAt,
}

/// Filters and ordering applied to the combined history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryFilter {
    /// Services to keep. Empty keeps none.
    pub services: Vec<BatchService>,
    /// Exact run status to keep. `None` keeps all.
    pub status: Option<String>,
    /// Earliest creation date, inclusive.
    pub start: Option<NaiveDate>,
    /// Latest creation date, inclusive of the whole day.
    pub end: Option<NaiveDate>,
    /// Sort column.
    pub sort: SortKey,
    /// Sort direction.
    pub direction: SortDirection,
}

impl Default for HistoryFilter {
    fn default() -> Self {
        Self {
            services: vec![BatchService::Risk, BatchService::Screening],
            status: None,
            start: None,
            end: None,
            sort: SortKey::default(),
            direction: SortDirection::Desc,
        }
    }
}

impl HistoryFilter {
    fn keeps(&self, entry: &HistoryEntry) -> bool {
        if !self.services.contains(&entry.service) {
            return false;
        }
        if let Some(status) = &self.status {
            if entry.run.run_status.as_deref() != Some(status.as_str()) {
                return false;
            }
        }
        if let Some(start) = self.start {
            let from = start.and_time(NaiveTime::MIN);
            if !entry.run.created_at.is_some_and(|created| created >= from) {
                return false;
            }
        }
        if let Some(end) = self.end {
            let until = end.and_time(NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN));
            if !entry.run.created_at.is_some_and(|created| created <= until) {
                return false;
            }
        }
        true
    }

    fn compare(&self, a: &HistoryEntry, b: &HistoryEntry) -> Ordering {
        let ordering = match self.sort {
            SortKey::BatchId => a.run.batch_id.cmp(&b.run.batch_id),
            SortKey::BatchName => a.run.batch_name.cmp(&b.run.batch_name),
            SortKey::Service => a.service.cmp(&b.service),
            SortKey::RunStatus => a.run.run_status.cmp(&b.run.run_status),
            SortKey::CreatedAt => a.run.created_at.cmp(&b.run.created_at),
            SortKey::UpdatedAt => a.run.updated_at.cmp(&b.run.updated_at),
        };
        match self.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }

    /// Filters and sorts `entries`.
    #[must_use]
    pub fn apply(&self, mut entries: Vec<HistoryEntry>) -> Vec<HistoryEntry> {
        entries.retain(|entry| self.keeps(entry));
        entries.sort_by(|a, b| self.compare(a, b));
        entries
    }
}

/// Loads the risk and screening histories together.
///
/// # Errors
///
/// Fails when either history cannot be loaded.
pub async fn load(api: &ApiClient) -> Result<Vec<HistoryEntry>, ApiError> {
    let (risk, screening) = tokio::try_join!(
        api.risk_batches().history(),
        api.screening_batches().history(),
    )?;

    let tag = |service: BatchService| move |run: BatchRun| HistoryEntry { run, service };
    Ok(risk
        .into_iter()
        .map(tag(BatchService::Risk))
        .chain(screening.into_iter().map(tag(BatchService::Screening)))
        .collect())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::http::{Method, fake::FakeTransport};

    fn entry(id: i64, service: BatchService, status: &str, created: &str) -> HistoryEntry {
        HistoryEntry {
            run: serde_json::from_value(json!({
                "batchID": id,
                "runStatus": status,
                "createdAt": created,
            }))
            .unwrap(),
            service,
        }
    }

    fn sample() -> Vec<HistoryEntry> {
        vec![
            entry(1, BatchService::Risk, "COMPLETED", "2024-01-05T10:00:00"),
            entry(2, BatchService::Screening, "FAILED", "2024-01-10T23:30:00"),
            entry(3, BatchService::Screening, "COMPLETED", "2024-01-11T00:00:00"),
        ]
    }

    fn ids(entries: &[HistoryEntry]) -> Vec<i64> {
        entries.iter().map(|e| e.run.batch_id).collect()
    }

    #[test]
    fn defaults_to_newest_first() {
        let entries = HistoryFilter::default().apply(sample());
        assert_eq!(ids(&entries), [3, 2, 1]);
    }

    #[test]
    fn end_date_covers_the_whole_day() {
        let filter = HistoryFilter {
            start: NaiveDate::from_ymd_opt(2024, 1, 6),
            end: NaiveDate::from_ymd_opt(2024, 1, 10),
            ..HistoryFilter::default()
        };
        assert_eq!(ids(&filter.apply(sample())), [2]);
    }

    #[test]
    fn filters_by_service_and_status() {
        let filter = HistoryFilter {
            services: vec![BatchService::Screening],
            status: Some("COMPLETED".into()),
            ..HistoryFilter::default()
        };
        assert_eq!(ids(&filter.apply(sample())), [3]);
    }

    #[test]
    fn sorts_ascending_by_id() {
        let filter = HistoryFilter {
            sort: SortKey::BatchId,
            direction: SortDirection::Asc,
            ..HistoryFilter::default()
        };
        assert_eq!(ids(&filter.apply(sample())), [1, 2, 3]);
    }

    #[tokio::test]
    async fn load_tags_each_service() {
        let fake = FakeTransport::new();
        fake.on_json(Method::Get, "/risk/batch/history", json!([{"batchID": 1}]));
        fake.on_json(
            Method::Get,
            "/screening/batch/history",
            json!([{"batchID": 2}, {"batchID": 3}]),
        );

        let entries = load(&fake.client()).await.unwrap();

        let services: Vec<_> = entries.iter().map(|e| e.service).collect();
        assert_eq!(
            services,
            [BatchService::Risk, BatchService::Screening, BatchService::Screening]
        );
    }
}
