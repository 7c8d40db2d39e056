//! Lead sinks
//!
//! A lead is written once, by the guarded submission path. Sinks never
//! retry; a failure is reported back so the user can press submit again.

pub mod http;
pub mod postgres;

pub use http::HttpLeadSink;
pub use postgres::PostgresLeadSink;

use crate::config::BotConfig;
use crate::error::BotError;
use crate::models::Lead;
use crate::Result;
use chrono::FixedOffset;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Trait for the external lead record store
#[async_trait::async_trait]
pub trait LeadSink: Send + Sync {
    fn name(&self) -> &'static str;
    async fn append_lead(&self, lead: &Lead) -> Result<()>;
}

/// Spreadsheet-style row: timestamp, user id, username, age, citizenship,
/// city, delivery, day, month average, month maximum. The age column is
/// kept for the sheet layout and left blank.
pub fn lead_row(lead: &Lead, offset: FixedOffset) -> Vec<Value> {
    let local = lead.created_at.with_timezone(&offset);

    vec![
        json!(local.format("%Y-%m-%d %H:%M:%S").to_string()),
        json!(lead.user_id),
        json!(lead.username.clone().unwrap_or_default()),
        json!(""),
        json!(lead.citizenship.to_string()),
        json!(lead.city),
        json!(lead.delivery_mode.to_string()),
        json!(lead.income.daily_income),
        json!(lead.income.monthly_avg_income),
        json!(lead.income.monthly_max_income),
    ]
}

/// Keeps leads in memory; used for development and tests.
pub struct InMemoryLeadSink {
    leads: Arc<RwLock<Vec<Lead>>>,
}

impl InMemoryLeadSink {
    pub fn new() -> Self {
        Self {
            leads: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn leads(&self) -> Vec<Lead> {
        self.leads.read().await.clone()
    }
}

impl Default for InMemoryLeadSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl LeadSink for InMemoryLeadSink {
    fn name(&self) -> &'static str {
        "in-memory"
    }

    async fn append_lead(&self, lead: &Lead) -> Result<()> {
        self.leads.write().await.push(lead.clone());
        Ok(())
    }
}

/// Pick a sink from configuration: Postgres, then HTTP.
///
/// A configured but unusable database URL is an error rather than a
/// fallback, and so is having no external sink at all: a lead that only
/// lives in memory would be reported to the user as sent.
pub fn build_lead_sink(config: &BotConfig) -> Result<Arc<dyn LeadSink>> {
    if let Some(url) = &config.database_url {
        let sink = PostgresLeadSink::connect_lazy(url)?;
        info!("Lead sink: postgres");
        return Ok(Arc::new(sink));
    }

    if let Some(url) = &config.leads_sink_url {
        info!("Lead sink: http");
        return Ok(Arc::new(HttpLeadSink::new(
            url.clone(),
            config.lead_timestamp_offset,
        )?));
    }

    Err(BotError::Config(
        "no lead sink configured: set DATABASE_URL or LEADS_SINK_URL".to_string(),
    ))
}
