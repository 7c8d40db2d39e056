//! HTTP lead sink: appends the lead row through a JSON endpoint
//! (typically a spreadsheet append hook).

use super::{lead_row, LeadSink};
use crate::error::BotError;
use crate::models::Lead;
use crate::Result;
use chrono::FixedOffset;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::error;

pub struct HttpLeadSink {
    client: Client,
    url: String,
    offset: FixedOffset,
}

impl HttpLeadSink {
    pub fn new(url: String, offset: FixedOffset) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .timeout(Duration::from_secs(20))
            .build()?;

        Ok(Self {
            client,
            url: url.trim_end_matches('/').to_string(),
            offset,
        })
    }
}

#[async_trait::async_trait]
impl LeadSink for HttpLeadSink {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn append_lead(&self, lead: &Lead) -> Result<()> {
        let body = json!({
            "lead_id": lead.lead_id,
            "row": lead_row(lead, self.offset),
            "lead": lead,
        });

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| BotError::LeadSink(format!("Lead append request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            error!(%status, "Lead sink rejected append: {}", text);
            return Err(BotError::LeadSink(format!(
                "Lead sink returned {}: {}",
                status, text
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::tests::serve_stub;
    use crate::leads::tests::sample_lead;
    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::Value;
    use std::sync::{Arc, Mutex};

    /// Append endpoint answering with a fixed status and keeping every body.
    struct AppendStub {
        status: StatusCode,
        bodies: Mutex<Vec<Value>>,
    }

    async fn append(State(stub): State<Arc<AppendStub>>, Json(body): Json<Value>) -> StatusCode {
        stub.bodies.lock().unwrap().push(body);
        stub.status
    }

    async fn sink_with_status(status: StatusCode) -> (Arc<AppendStub>, HttpLeadSink) {
        let stub = Arc::new(AppendStub {
            status,
            bodies: Mutex::new(Vec::new()),
        });
        let app = Router::new()
            .route("/leads", post(append))
            .with_state(stub.clone());
        let base = serve_stub(app).await;

        let offset = FixedOffset::east_opt(4 * 3600).unwrap();
        let sink = HttpLeadSink::new(format!("{}/leads", base), offset).unwrap();
        (stub, sink)
    }

    #[tokio::test]
    async fn test_posts_lead_id_row_and_lead() {
        let (stub, sink) = sink_with_status(StatusCode::OK).await;
        let lead = sample_lead();

        sink.append_lead(&lead).await.unwrap();

        let bodies = stub.bodies.lock().unwrap();
        assert_eq!(bodies.len(), 1);
        let body = &bodies[0];
        assert_eq!(body["lead_id"], lead.lead_id.to_string());

        let row = body["row"].as_array().unwrap();
        assert_eq!(row.len(), 10);
        assert_eq!(row[0], "2026-03-02 02:30:00");
        assert_eq!(row[5], "Казань");
        assert_eq!(row[9], "110 000");

        assert_eq!(body["lead"]["city"], "Казань");
        assert_eq!(body["lead"]["delivery_mode"], "bike");
    }

    #[tokio::test]
    async fn test_client_error_is_reported() {
        let (stub, sink) = sink_with_status(StatusCode::FORBIDDEN).await;

        let result = sink.append_lead(&sample_lead()).await;

        assert!(matches!(result, Err(BotError::LeadSink(_))));
        assert_eq!(stub.bodies.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_server_error_is_reported() {
        let (_stub, sink) = sink_with_status(StatusCode::SERVICE_UNAVAILABLE).await;
        let result = sink.append_lead(&sample_lead()).await;
        assert!(matches!(result, Err(BotError::LeadSink(_))));
    }
}
