use nonempty::NonEmpty;
use tracing::instrument;

use crate::{
    error::ApiError,
    http::{ApiClient, ApiResponse},
    model::{BatchId, BatchRun, Client, RiskMapping, ScreeningBatchClient, ScreeningMapping},
};

const SCREENING_BASE: &str = "/internal/screening/batch";
const RISK_BASE: &str = "/risk/batch";

/// Files a pipeline produces and can show back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum BatchFile {
    /// Screening request XML.
    Xml,
    /// SHA-256 checksum of the XML.
    Checksum,
    /// Risk request lines.
    Jsonl,
    /// Risk control file.
    Control,
}

impl BatchFile {
    /// Value of the `type` query parameter.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Xml => "xml",
            Self::Checksum => "checksum",
            Self::Jsonl => "jsonl",
            Self::Control => "control",
        }
    }
}

/// Screening batch pipeline endpoints.
#[derive(Debug, Clone, Copy)]
pub struct ScreeningBatches<'a> {
    api: &'a ApiClient,
}

impl<'a> ScreeningBatches<'a> {
    /// Wraps a client.
    #[must_use]
    pub const fn new(api: &'a ApiClient) -> Self {
        Self { api }
    }

    /// Creates a batch from directory records, flattened to the shape the
    /// screening service expects.
    ///
    /// # Errors
    ///
    /// Propagates transport and status errors, and fails when no id comes
    /// back.
    #[instrument(skip_all, fields(clients = clients.len()))]
    pub async fn create(&self, clients: &NonEmpty<Client>) -> Result<BatchId, ApiError> {
        let body: Vec<ScreeningBatchClient> = clients.iter().cloned().map(Into::into).collect();
        let endpoint = format!("{SCREENING_BASE}/create");
        let response = self.api.post_unit(&endpoint, Some(&body)).await?;
        batch_id(&endpoint, response)
    }

    /// Renders the request XML.
    ///
    /// # Errors
    ///
    /// Propagates transport and status errors.
    pub async fn generate_xml(&self, batch: &BatchId) -> Result<ApiResponse, ApiError> {
        step(self.api, SCREENING_BASE, batch, "generate-xml").await
    }

    /// Writes the XML checksum.
    ///
    /// # Errors
    ///
    /// Propagates transport and status errors.
    pub async fn generate_checksum(&self, batch: &BatchId) -> Result<ApiResponse, ApiError> {
        step(self.api, SCREENING_BASE, batch, "generate-checksum").await
    }

    /// Zips the XML and checksum.
    ///
    /// # Errors
    ///
    /// Propagates transport and status errors.
    pub async fn zip(&self, batch: &BatchId) -> Result<ApiResponse, ApiError> {
        step(self.api, SCREENING_BASE, batch, "zip").await
    }

    /// Encrypts the archive.
    ///
    /// # Errors
    ///
    /// Propagates transport and status errors.
    pub async fn encrypt(&self, batch: &BatchId) -> Result<ApiResponse, ApiError> {
        step(self.api, SCREENING_BASE, batch, "encrypt").await
    }

    /// Uploads the encrypted archive to the provider's SFTP drop.
    ///
    /// # Errors
    ///
    /// Propagates transport and status errors.
    pub async fn upload(&self, batch: &BatchId) -> Result<ApiResponse, ApiError> {
        step(self.api, SCREENING_BASE, batch, "upload").await
    }

    /// Text of a generated file.
    ///
    /// # Errors
    ///
    /// Propagates transport and status errors.
    pub async fn file_content(&self, batch: &BatchId, file: BatchFile) -> Result<String, ApiError> {
        file_content(self.api, SCREENING_BASE, batch, file).await
    }

    /// Previous screening batch runs.
    ///
    /// # Errors
    ///
    /// Propagates transport, status and decode errors.
    pub async fn history(&self) -> Result<Vec<BatchRun>, ApiError> {
        self.api.get("/screening/batch/history").await
    }

    /// Field mapping used to build the XML.
    ///
    /// # Errors
    ///
    /// Propagates transport, status and decode errors.
    pub async fn mapping(&self) -> Result<Vec<ScreeningMapping>, ApiError> {
        self.api.get("/screening/batch/mapping").await
    }

    /// Replaces the whole field mapping.
    ///
    /// # Errors
    ///
    /// Propagates transport and status errors.
    pub async fn save_mapping(&self, mapping: &[ScreeningMapping]) -> Result<ApiResponse, ApiError> {
        self.api
            .post_unit("/screening/batch/mapping", Some(mapping))
            .await
    }

    /// Renders the XML for one client without creating a batch.
    ///
    /// # Errors
    ///
    /// Propagates transport and status errors.
    pub async fn test_generate(&self, client: &Client) -> Result<ApiResponse, ApiError> {
        self.api
            .post_unit("/screening/batch/test-generate", Some(client))
            .await
    }
}

/// Risk batch pipeline endpoints.
#[derive(Debug, Clone, Copy)]
pub struct RiskBatches<'a> {
    api: &'a ApiClient,
}

impl<'a> RiskBatches<'a> {
    /// Wraps a client.
    #[must_use]
    pub const fn new(api: &'a ApiClient) -> Self {
        Self { api }
    }

    /// Creates a batch from directory records as they are.
    ///
    /// # Errors
    ///
    /// Propagates transport and status errors, and fails when no id comes
    /// back.
    #[instrument(skip_all, fields(clients = clients.len()))]
    pub async fn create(&self, clients: &NonEmpty<Client>) -> Result<BatchId, ApiError> {
        let body: Vec<&Client> = clients.iter().collect();
        let endpoint = format!("{RISK_BASE}/create");
        let response = self.api.post_unit(&endpoint, Some(&body)).await?;
        batch_id(&endpoint, response)
    }

    /// Renders the request lines.
    ///
    /// # Errors
    ///
    /// Propagates transport and status errors.
    pub async fn generate_jsonl(&self, batch: &BatchId) -> Result<ApiResponse, ApiError> {
        step(self.api, RISK_BASE, batch, "generate-jsonl").await
    }

    /// Zips the request lines.
    ///
    /// # Errors
    ///
    /// Propagates transport and status errors.
    pub async fn zip(&self, batch: &BatchId) -> Result<ApiResponse, ApiError> {
        step(self.api, RISK_BASE, batch, "zip").await
    }

    /// Writes the control file describing the archive.
    ///
    /// # Errors
    ///
    /// Propagates transport and status errors.
    pub async fn generate_control(&self, batch: &BatchId) -> Result<ApiResponse, ApiError> {
        step(self.api, RISK_BASE, batch, "generate-control").await
    }

    /// Uploads archive and control file.
    ///
    /// # Errors
    ///
    /// Propagates transport and status errors.
    pub async fn upload(&self, batch: &BatchId) -> Result<ApiResponse, ApiError> {
        step(self.api, RISK_BASE, batch, "upload").await
    }

    /// Text of a generated file.
    ///
    /// # Errors
    ///
    /// Propagates transport and status errors.
    pub async fn file_content(&self, batch: &BatchId, file: BatchFile) -> Result<String, ApiError> {
        file_content(self.api, RISK_BASE, batch, file).await
    }

    /// Previous risk batch runs.
    ///
    /// # Errors
    ///
    /// Propagates transport, status and decode errors.
    pub async fn history(&self) -> Result<Vec<BatchRun>, ApiError> {
        self.api.get("/risk/batch/history").await
    }

    /// Field mapping used to build the request lines.
    ///
    /// # Errors
    ///
    /// Propagates transport, status and decode errors.
    pub async fn mapping(&self) -> Result<Vec<RiskMapping>, ApiError> {
        self.api.get("/risk/batch/mapping").await
    }

    /// Saves the entries that map to something. Unconfigured rows are not
    /// sent.
    ///
    /// # Errors
    ///
    /// Propagates transport and status errors.
    pub async fn save_mapping(&self, mapping: &[RiskMapping]) -> Result<ApiResponse, ApiError> {
        let configured: Vec<&RiskMapping> = mapping.iter().filter(|m| m.is_configured()).collect();
        self.api
            .post_unit("/risk/batch/mapping", Some(&configured))
            .await
    }

    /// Renders the request line for one client without creating a batch.
    ///
    /// # Errors
    ///
    /// Propagates transport and status errors.
    pub async fn test_generate(&self, client: &Client) -> Result<ApiResponse, ApiError> {
        self.api
            .post_unit("/risk/batch/test-generate", Some(client))
            .await
    }

    /// Runs the whole risk batch server-side in one call.
    ///
    /// # Errors
    ///
    /// Propagates transport and status errors.
    pub async fn initiate(&self, clients: &NonEmpty<Client>) -> Result<ApiResponse, ApiError> {
        let body: Vec<&Client> = clients.iter().collect();
        self.api
            .post_unit("/risk/batch/initiate", Some(&body))
            .await
    }
}

async fn step(
    api: &ApiClient,
    base: &str,
    batch: &BatchId,
    action: &str,
) -> Result<ApiResponse, ApiError> {
    api.post_empty(&format!("{base}/{}/{action}", crate::http::encode(&batch.0)))
        .await
}

async fn file_content(
    api: &ApiClient,
    base: &str,
    batch: &BatchId,
    file: BatchFile,
) -> Result<String, ApiError> {
    api.get_text(
        &format!("{base}/{}/file-content", crate::http::encode(&batch.0)),
        &[("type", file.as_str().to_string())],
    )
    .await
}

fn batch_id(endpoint: &str, response: ApiResponse) -> Result<BatchId, ApiError> {
    let missing = || ApiError::Decode {
        endpoint: endpoint.to_string(),
        message: "no batch id in response".to_string(),
    };
    match response {
        ApiResponse::Json(value) => serde_json::from_value(value).map_err(|e| ApiError::Decode {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        }),
        ApiResponse::Text(text) if !text.trim().is_empty() => Ok(BatchId::from(text.trim())),
        _ => Err(missing()),
    }
}

#[cfg(test)]
mod tests {
    use nonempty::nonempty;
    use serde_json::json;

    use super::*;
    use crate::http::{Body, Method, RawResponse, fake::FakeTransport};

    fn client() -> Client {
        serde_json::from_value(json!({
            "clientID": 1,
            "firstName": "Ada",
            "citizenship1": "GB",
            "addresses": [{"addressLine1": "1 Main St", "city": "London", "zip": "N1"}],
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn screening_batch_sends_flattened_clients() {
        let fake = FakeTransport::new();
        fake.on(
            Method::Post,
            "/internal/screening/batch/create",
            RawResponse::text(200, "17"),
        );

        let id = fake
            .client()
            .screening_batches()
            .create(&nonempty![client()])
            .await
            .unwrap();

        assert_eq!(id, BatchId("17".into()));
        let Body::Json(body) = &fake.requests()[0].body else {
            panic!("expected JSON body");
        };
        assert_eq!(body[0]["clientID"], 1);
        assert_eq!(body[0]["country"], "GB");
        assert_eq!(body[0]["addressLine1"], "1 Main St");
        assert_eq!(body[0]["province"], "");
    }

    #[tokio::test]
    async fn risk_batch_accepts_json_id() {
        let fake = FakeTransport::new();
        fake.on_json(Method::Post, "/risk/batch/create", json!("RB-2024-01"));

        let id = fake
            .client()
            .risk_batches()
            .create(&nonempty![client()])
            .await
            .unwrap();

        assert_eq!(id.to_string(), "RB-2024-01");
    }

    #[tokio::test]
    async fn empty_create_reply_is_an_error() {
        let fake = FakeTransport::new();
        fake.on(Method::Post, "/risk/batch/create", RawResponse::text(200, ""));

        let error = fake
            .client()
            .risk_batches()
            .create(&nonempty![client()])
            .await
            .unwrap_err();

        assert!(matches!(error, ApiError::Decode { .. }));
    }

    #[tokio::test]
    async fn file_content_passes_type() {
        let fake = FakeTransport::new();
        fake.on(
            Method::Get,
            "/internal/screening/batch/5/file-content?type=checksum",
            RawResponse::text(200, "abc  batch.xml"),
        );

        let text = fake
            .client()
            .screening_batches()
            .file_content(&BatchId("5".into()), BatchFile::Checksum)
            .await
            .unwrap();

        assert_eq!(text, "abc  batch.xml");
    }

    #[tokio::test]
    async fn risk_mapping_skips_unconfigured_rows() {
        let fake = FakeTransport::new();
        fake.on(Method::Post, "/risk/batch/mapping", RawResponse::text(200, ""));
        let mapping: Vec<RiskMapping> = serde_json::from_value(json!([
            {"targetPath": "customer.name", "sourceField": "firstName"},
            {"targetPath": "customer.segment"},
            {"targetPath": "customer.channel", "defaultValue": "BRANCH"},
        ]))
        .unwrap();

        fake.client().risk_batches().save_mapping(&mapping).await.unwrap();

        let Body::Json(body) = &fake.requests()[0].body else {
            panic!("expected JSON body");
        };
        let paths: Vec<_> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["targetPath"].as_str().unwrap())
            .collect();
        assert_eq!(paths, ["customer.name", "customer.channel"]);
    }
}
