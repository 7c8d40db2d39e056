//! Income table cache
//!
//! Holds the latest successfully loaded snapshot behind an `Arc` that is
//! swapped whole on every refresh. Readers clone the `Arc` and never wait on
//! a fetch; a failed refresh leaves the previous snapshot in place.

pub mod source;

pub use source::{FileReferenceSource, HttpReferenceSource, ReferenceSource};

use crate::error::BotError;
use crate::models::{DeliveryMode, IncomeRecord};
use crate::Result;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info, warn};

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(900);

/// Immutable point-in-time copy of the income table.
#[derive(Debug)]
pub struct IncomeSnapshot {
    records: Vec<IncomeRecord>,
    loaded_at: DateTime<Utc>,
}

impl IncomeSnapshot {
    /// Build a snapshot, keeping the first row for each (city, mode).
    pub fn new(records: Vec<IncomeRecord>) -> Self {
        let mut seen: HashSet<(String, DeliveryMode)> = HashSet::with_capacity(records.len());
        let total = records.len();

        let records: Vec<IncomeRecord> = records
            .into_iter()
            .filter(|r| seen.insert((r.city.clone(), r.delivery_mode)))
            .collect();

        if records.len() < total {
            warn!(
                dropped = total - records.len(),
                "Income table has duplicate (city, delivery) rows; keeping first occurrence"
            );
        }

        Self {
            records,
            loaded_at: Utc::now(),
        }
    }

    pub fn records(&self) -> &[IncomeRecord] {
        &self.records
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn find(&self, city: &str, mode: DeliveryMode) -> Option<&IncomeRecord> {
        self.records
            .iter()
            .find(|r| r.city == city && r.delivery_mode == mode)
    }
}

pub struct IncomeCache {
    source: Arc<dyn ReferenceSource>,
    current: RwLock<Option<Arc<IncomeSnapshot>>>,
    refresh_interval: Duration,
    refresher: OnceCell<JoinHandle<()>>,
}

impl IncomeCache {
    pub fn new(source: Arc<dyn ReferenceSource>, refresh_interval: Duration) -> Self {
        Self {
            source,
            current: RwLock::new(None),
            refresh_interval,
            refresher: OnceCell::new(),
        }
    }

    /// Latest successfully loaded snapshot.
    pub fn current_snapshot(&self) -> Result<Arc<IncomeSnapshot>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| {
                BotError::CacheUnavailable("income table has not loaded yet".to_string())
            })
    }

    pub fn is_loaded(&self) -> bool {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Fetch once and swap the snapshot in. Returns the record count.
    pub async fn refresh(&self) -> Result<usize> {
        let records = self.source.fetch_income_records().await?;
        if records.is_empty() {
            return Err(BotError::ReferenceSource(format!(
                "{} source returned no income records",
                self.source.name()
            )));
        }

        let snapshot = Arc::new(IncomeSnapshot::new(records));
        let count = snapshot.len();

        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(snapshot);

        info!(count, source = self.source.name(), "Income cache updated");
        Ok(count)
    }

    /// Load once, then keep refreshing in the background.
    ///
    /// Safe to call from any number of tasks: the first caller performs
    /// the initial load and spawns the loop, everyone else waits for that
    /// load to finish. The loop stops once the cache is dropped.
    pub async fn start_background_refresh(self: &Arc<Self>) {
        self.refresher
            .get_or_init(|| async {
                if let Err(e) = self.refresh().await {
                    error!(error = %e, "Initial income cache load failed");
                }

                let cache = Arc::downgrade(self);
                let period = self.refresh_interval;

                tokio::spawn(async move {
                    let mut ticker = interval_at(Instant::now() + period, period);
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

                    loop {
                        ticker.tick().await;
                        let Some(cache) = cache.upgrade() else {
                            break;
                        };
                        if let Err(e) = cache.refresh().await {
                            error!(error = %e, "Failed to update income cache");
                        }
                    }
                })
            })
            .await;
    }
}

impl Drop for IncomeCache {
    fn drop(&mut self) {
        if let Some(handle) = self.refresher.get() {
            handle.abort();
        }
    }
}
