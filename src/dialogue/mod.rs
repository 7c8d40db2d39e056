//! Screening dialogue: states, events, screens and the transition table
//!
//! Start → age gate → citizenship → city → delivery mode → income summary
//! → lead submission.

pub mod catalog;
pub mod cities;
pub mod event;
pub mod screen;
pub mod transition;

pub use event::{Event, EventKind, Extra, InfoTopic};
pub use screen::{IncomeSummary, Screen};
pub use transition::{accepts, Effect, Outcome, Rejection, Transition};

use crate::cache::IncomeCache;
use std::sync::Arc;

/// Transition logic plus the read-only data it consults.
pub struct DialogueEngine {
    cache: Arc<IncomeCache>,
    priority_cities: Vec<String>,
}

impl DialogueEngine {
    pub fn new(cache: Arc<IncomeCache>, priority_cities: Vec<String>) -> Self {
        Self {
            cache,
            priority_cities,
        }
    }

    pub fn cache(&self) -> &Arc<IncomeCache> {
        &self.cache
    }
}
