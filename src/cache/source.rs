//! Where income records come from
//!
//! HTTP-backed source reads the exported income table; the file source
//! serves local runs.

use crate::error::BotError;
use crate::models::IncomeRecord;
use crate::Result;
use reqwest::Client;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Trait for the external income table
#[async_trait::async_trait]
pub trait ReferenceSource: Send + Sync {
    fn name(&self) -> &'static str;
    async fn fetch_income_records(&self) -> Result<Vec<IncomeRecord>>;
}

/// Reads a JSON array of income rows over HTTP.
pub struct HttpReferenceSource {
    client: Client,
    url: String,
    token: Option<String>,
}

impl HttpReferenceSource {
    pub fn new(url: String, token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self { client, url, token })
    }
}

#[async_trait::async_trait]
impl ReferenceSource for HttpReferenceSource {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn fetch_income_records(&self) -> Result<Vec<IncomeRecord>> {
        let mut request = self.client.get(&self.url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            BotError::ReferenceSource(format!("Income table request failed: {}", e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BotError::ReferenceSource(format!(
                "Income table returned {}: {}",
                status, body
            )));
        }

        let records = response.json::<Vec<IncomeRecord>>().await.map_err(|e| {
            BotError::ReferenceSource(format!("Invalid income table payload: {}", e))
        })?;

        debug!(count = records.len(), "Fetched income rows over HTTP");
        Ok(records)
    }
}

/// Reads the same JSON array from a file on disk.
pub struct FileReferenceSource {
    path: PathBuf,
}

impl FileReferenceSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait::async_trait]
impl ReferenceSource for FileReferenceSource {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn fetch_income_records(&self) -> Result<Vec<IncomeRecord>> {
        let raw = tokio::fs::read_to_string(&self.path).await?;
        let records: Vec<IncomeRecord> = serde_json::from_str(&raw)?;
        Ok(records)
    }
}
