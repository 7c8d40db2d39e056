//! Courier Lead Bot
//!
//! A chat bot that screens would-be couriers:
//! - Walks each user through a fixed dialogue (age, citizenship, city, delivery mode)
//! - Estimates income from a periodically refreshed reference table
//! - Forwards a qualified user's answers to a lead sink exactly once
//! - Serializes every user's events through a per-user session lease
//!
//! FLOW:
//! WEBHOOK → ROUTER (lease) → DIALOGUE ENGINE → LEAD SINK → COMMIT → SCREENS

pub mod api;
pub mod cache;
pub mod config;
pub mod dialogue;
pub mod error;
pub mod leads;
pub mod models;
pub mod router;
pub mod session;

pub use error::Result;

// Re-export common types
pub use models::*;
pub use router::{EventRouter, InboundEvent, Routed};
