//! Step-by-step driver for the screening and risk batch pipelines.
//!
//! Every step is a single backend call. A step that succeeds moves the
//! pipeline forward; one that fails leaves it where it was so the user can
//! retry.

use std::{fmt, sync::Arc};

use nonempty::NonEmpty;
use sha2::{Digest, Sha256};
use tracing::instrument;

use crate::{
    error::ApiError,
    http::{ApiClient, ApiResponse},
    model::{BatchId, Client},
    notify::Notifier,
    services::batches::BatchFile,
};

/// Which pipeline to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Flow {
    /// XML request files for the screening provider.
    Screening,
    /// JSONL request files for the risk engine.
    Risk,
}

impl Flow {
    /// Step names, starting with client selection.
    #[must_use]
    pub const fn steps(self) -> &'static [&'static str] {
        match self {
            Self::Screening => &[
                "Select Clients",
                "Generate XML",
                "Generate Checksum",
                "Zip Files",
                "Encrypt",
                "Upload to SFTP",
            ],
            Self::Risk => &[
                "Select Clients",
                "Generate JSONL",
                "Zip Files",
                "Generate Control File",
                "Upload to SFTP",
            ],
        }
    }

    /// Index of the final step.
    #[must_use]
    pub const fn last_step(self) -> usize {
        self.steps().len() - 1
    }

    const fn completion(self, step: usize) -> &'static str {
        match (self, step) {
            (Self::Screening, 1) => "XML Generated",
            (Self::Screening, 2) => "Checksum Generated",
            (Self::Screening, 3) | (Self::Risk, 2) => "Files Zipped",
            (Self::Screening, 4) => "File Encrypted",
            (Self::Screening, _) => "Uploaded to SFTP",
            (Self::Risk, 1) => "JSONL Generated",
            (Self::Risk, 3) => "Control File Generated",
            (Self::Risk, _) => "Uploaded to SFTP (Mock/Real)",
        }
    }

    /// Files that can be previewed once generated.
    #[must_use]
    pub const fn files(self) -> &'static [BatchFile] {
        match self {
            Self::Screening => &[BatchFile::Xml, BatchFile::Checksum],
            Self::Risk => &[BatchFile::Jsonl, BatchFile::Control],
        }
    }
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Screening => "screening",
            Self::Risk => "risk",
        })
    }
}

/// Errors raised while driving a pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A batch needs at least one client.
    #[error("Select at least one client")]
    NoClients,

    /// A step was requested before the batch exists.
    #[error("no batch has been created yet")]
    NoBatch,

    /// The step index does not exist in this pipeline.
    #[error("{flow} pipeline has no step {step}")]
    UnknownStep {
        /// Pipeline in use.
        flow: Flow,
        /// Requested step.
        step: usize,
    },

    /// The file type does not belong to this pipeline.
    #[error("{flow} pipeline does not produce {file:?} files")]
    WrongFile {
        /// Pipeline in use.
        flow: Flow,
        /// Requested file.
        file: BatchFile,
    },

    /// The backend call behind a step failed.
    #[error("Step failed: {0}")]
    Step(#[source] ApiError),

    /// Fetching a generated file failed.
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Outcome of comparing the XML with its published checksum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumCheck {
    /// SHA-256 of the XML as fetched.
    pub computed: String,
    /// Digest found in the checksum file.
    pub published: String,
}

impl ChecksumCheck {
    /// True when both digests agree.
    #[must_use]
    pub fn matches(&self) -> bool {
        self.computed.eq_ignore_ascii_case(&self.published)
    }
}

/// Drives one batch through its pipeline.
pub struct Pipeline {
    api: ApiClient,
    notifier: Arc<dyn Notifier>,
    flow: Flow,
    batch: Option<BatchId>,
    step: usize,
    finished: bool,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("flow", &self.flow)
            .field("batch", &self.batch)
            .field("step", &self.step)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// A pipeline waiting for its clients.
    pub fn new(api: ApiClient, notifier: Arc<dyn Notifier>, flow: Flow) -> Self {
        Self {
            api,
            notifier,
            flow,
            batch: None,
            step: 0,
            finished: false,
        }
    }

    /// Picks up an existing batch at `step`.
    ///
    /// # Errors
    ///
    /// Fails when `step` is not a step of `flow` or is the client selection.
    pub fn resume(
        api: ApiClient,
        notifier: Arc<dyn Notifier>,
        flow: Flow,
        batch: BatchId,
        step: usize,
    ) -> Result<Self, PipelineError> {
        if step == 0 || step > flow.last_step() {
            return Err(PipelineError::UnknownStep { flow, step });
        }
        Ok(Self {
            batch: Some(batch),
            step,
            ..Self::new(api, notifier, flow)
        })
    }

    /// The pipeline being driven.
    #[must_use]
    pub const fn flow(&self) -> Flow {
        self.flow
    }

    /// Batch created by the first step.
    #[must_use]
    pub const fn batch(&self) -> Option<&BatchId> {
        self.batch.as_ref()
    }

    /// Index of the step that runs next.
    #[must_use]
    pub const fn current_step(&self) -> usize {
        self.step
    }

    /// True once the final step succeeded.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// Creates the batch from the selected clients.
    ///
    /// # Errors
    ///
    /// [`PipelineError::NoClients`] for an empty selection, otherwise
    /// [`PipelineError::Step`] when the backend refuses.
    #[instrument(skip_all, fields(flow = %self.flow, clients = clients.len()))]
    pub async fn create(&mut self, clients: Vec<Client>) -> Result<&BatchId, PipelineError> {
        let Some(clients) = NonEmpty::from_vec(clients) else {
            self.notifier.warning(&PipelineError::NoClients.to_string());
            return Err(PipelineError::NoClients);
        };

        let created = match self.flow {
            Flow::Screening => self.api.screening_batches().create(&clients).await,
            Flow::Risk => self.api.risk_batches().create(&clients).await,
        };
        let batch = created.map_err(|e| self.failed(e))?;

        tracing::info!(%batch, "batch created");
        self.notifier.success(&format!("Batch {batch} created"));
        self.step = 1;
        self.finished = false;
        Ok(self.batch.insert(batch))
    }

    /// Runs the current step.
    ///
    /// On success the pipeline moves to the next step, except after the last
    /// one where it stays put and reports itself finished.
    ///
    /// # Errors
    ///
    /// [`PipelineError::NoBatch`] before [`Pipeline::create`], otherwise
    /// [`PipelineError::Step`] with the step left unchanged.
    #[instrument(skip(self), fields(flow = %self.flow, step = self.step))]
    pub async fn advance(&mut self) -> Result<usize, PipelineError> {
        let Some(batch) = self.batch.clone() else {
            return Err(PipelineError::NoBatch);
        };
        if self.step == 0 {
            return Err(PipelineError::NoBatch);
        }

        self.run_step(&batch).await.map_err(|e| self.failed(e))?;

        self.notifier.success(self.flow.completion(self.step));
        if self.step < self.flow.last_step() {
            self.step += 1;
        } else {
            self.finished = true;
        }
        Ok(self.step)
    }

    /// Runs the remaining steps, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// The error of the first failing step.
    pub async fn run_to_end(&mut self) -> Result<(), PipelineError> {
        while !self.finished {
            self.advance().await?;
        }
        Ok(())
    }

    async fn run_step(&self, batch: &BatchId) -> Result<ApiResponse, ApiError> {
        match self.flow {
            Flow::Screening => {
                let service = self.api.screening_batches();
                match self.step {
                    1 => service.generate_xml(batch).await,
                    2 => service.generate_checksum(batch).await,
                    3 => service.zip(batch).await,
                    4 => service.encrypt(batch).await,
                    _ => service.upload(batch).await,
                }
            }
            Flow::Risk => {
                let service = self.api.risk_batches();
                match self.step {
                    1 => service.generate_jsonl(batch).await,
                    2 => service.zip(batch).await,
                    3 => service.generate_control(batch).await,
                    _ => service.upload(batch).await,
                }
            }
        }
    }

    fn failed(&self, error: ApiError) -> PipelineError {
        let error = PipelineError::Step(error);
        self.notifier.error(&error.to_string());
        error
    }

    /// Text of a generated file.
    ///
    /// # Errors
    ///
    /// Fails without a batch, for a file of the other pipeline, or when the
    /// fetch fails.
    pub async fn file(&self, file: BatchFile) -> Result<String, PipelineError> {
        let batch = self.batch.as_ref().ok_or(PipelineError::NoBatch)?;
        if !self.flow.files().contains(&file) {
            return Err(PipelineError::WrongFile {
                flow: self.flow,
                file,
            });
        }
        let content = match self.flow {
            Flow::Screening => self.api.screening_batches().file_content(batch, file).await,
            Flow::Risk => self.api.risk_batches().file_content(batch, file).await,
        }?;
        Ok(content)
    }

    /// Recomputes the SHA-256 of the XML and compares it with the checksum
    /// file.
    ///
    /// # Errors
    ///
    /// Fails outside the screening pipeline or when either file cannot be
    /// fetched.
    pub async fn verify_checksum(&self) -> Result<ChecksumCheck, PipelineError> {
        let xml = self.file(BatchFile::Xml).await?;
        let checksum = self.file(BatchFile::Checksum).await?;
        Ok(ChecksumCheck {
            computed: sha256_hex(xml.as_bytes()),
            published: checksum
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .to_string(),
        })
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use test_case::test_case;

    use super::*;
    use crate::{
        http::{Method, RawResponse, fake::FakeTransport},
        notify::{Level, testing::RecordingNotifier},
    };

    fn client(id: i64) -> Client {
        serde_json::from_value(json!({"clientID": id, "firstName": "Ada"})).unwrap()
    }

    fn pipeline(fake: &Arc<FakeTransport>, flow: Flow) -> (Pipeline, Arc<RecordingNotifier>) {
        let notifier = Arc::new(RecordingNotifier::default());
        (Pipeline::new(fake.client(), notifier.clone(), flow), notifier)
    }

    #[tokio::test]
    async fn empty_selection_warns_and_sends_nothing() {
        let fake = FakeTransport::new();
        let (mut pipeline, notifier) = pipeline(&fake, Flow::Screening);

        let error = pipeline.create(Vec::new()).await.unwrap_err();

        assert!(matches!(error, PipelineError::NoClients));
        assert_eq!(
            notifier.last(),
            Some((Level::Warning, "Select at least one client".into()))
        );
        assert!(fake.requests().is_empty());
    }

    #[tokio::test]
    async fn screening_runs_every_step_in_order() {
        let fake = FakeTransport::new();
        fake.on(Method::Post, "/internal/screening/batch/create", RawResponse::text(200, "8"));
        for step in ["generate-xml", "generate-checksum", "zip", "encrypt", "upload"] {
            fake.on(
                Method::Post,
                &format!("/internal/screening/batch/8/{step}"),
                RawResponse::text(200, "done"),
            );
        }
        let (mut pipeline, notifier) = pipeline(&fake, Flow::Screening);

        pipeline.create(vec![client(1), client(2)]).await.unwrap();
        pipeline.run_to_end().await.unwrap();

        assert!(pipeline.is_finished());
        assert_eq!(pipeline.current_step(), Flow::Screening.last_step());
        let messages: Vec<_> = notifier.seen().into_iter().map(|(_, m)| m).collect();
        assert_eq!(
            messages,
            [
                "Batch 8 created",
                "XML Generated",
                "Checksum Generated",
                "Files Zipped",
                "File Encrypted",
                "Uploaded to SFTP",
            ]
        );
    }

    #[tokio::test]
    async fn failed_step_stays_put() {
        let fake = FakeTransport::new();
        fake.on(
            Method::Post,
            "/risk/batch/B1/zip",
            RawResponse::json(500, &json!({"message": "disk full"})),
        );
        let notifier = Arc::new(RecordingNotifier::default());
        let mut pipeline = Pipeline::resume(
            fake.client(),
            notifier.clone(),
            Flow::Risk,
            BatchId("B1".into()),
            2,
        )
        .unwrap();

        let error = pipeline.advance().await.unwrap_err();

        assert_eq!(error.to_string(), "Step failed: disk full");
        assert_eq!(pipeline.current_step(), 2);
        assert!(!pipeline.is_finished());
        assert_eq!(notifier.last(), Some((Level::Error, "Step failed: disk full".into())));
    }

    #[tokio::test]
    async fn run_to_end_stops_at_first_failure() {
        let fake = FakeTransport::new();
        fake.on(Method::Post, "/risk/batch/B1/generate-jsonl", RawResponse::text(200, ""));
        fake.on(Method::Post, "/risk/batch/B1/zip", RawResponse::text(500, ""));
        let (_, notifier) = pipeline(&fake, Flow::Risk);
        let mut pipeline =
            Pipeline::resume(fake.client(), notifier, Flow::Risk, BatchId("B1".into()), 1).unwrap();

        assert!(pipeline.run_to_end().await.is_err());

        assert_eq!(pipeline.current_step(), 2);
        assert_eq!(fake.count(Method::Post, "/risk/batch/B1/generate-control"), 0);
    }

    #[test_case(Flow::Screening, 0; "selection step")]
    #[test_case(Flow::Screening, 6; "past the end")]
    #[test_case(Flow::Risk, 5; "past risk end")]
    fn resume_rejects_unknown_steps(flow: Flow, step: usize) {
        let fake = FakeTransport::new();
        let notifier = Arc::new(RecordingNotifier::default());
        let result = Pipeline::resume(fake.client(), notifier, flow, BatchId("1".into()), step);
        assert!(matches!(result, Err(PipelineError::UnknownStep { .. })));
    }

    #[tokio::test]
    async fn checksum_verification() {
        let xml = "<batch/>";
        let fake = FakeTransport::new();
        fake.on(
            Method::Get,
            "/internal/screening/batch/8/file-content?type=xml",
            RawResponse::text(200, xml),
        );
        fake.on(
            Method::Get,
            "/internal/screening/batch/8/file-content?type=checksum",
            RawResponse::text(200, &format!("{}  batch_8.xml\n", sha256_hex(xml.as_bytes()).to_uppercase())),
        );
        let notifier = Arc::new(RecordingNotifier::default());
        let pipeline =
            Pipeline::resume(fake.client(), notifier, Flow::Screening, BatchId("8".into()), 3)
                .unwrap();

        let check = pipeline.verify_checksum().await.unwrap();

        assert!(check.matches());
    }

    #[tokio::test]
    async fn risk_pipeline_has_no_xml() {
        let fake = FakeTransport::new();
        let notifier = Arc::new(RecordingNotifier::default());
        let pipeline =
            Pipeline::resume(fake.client(), notifier, Flow::Risk, BatchId("B1".into()), 1).unwrap();

        let error = pipeline.file(BatchFile::Xml).await.unwrap_err();

        assert!(matches!(error, PipelineError::WrongFile { .. }));
    }
}
