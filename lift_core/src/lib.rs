#![forbid(unsafe_code)]

//! Core domain model and business logic for the liftlog training tracker.
//!
//! This crate provides:
//! - Domain types (sets, sessions, records, schedules, documents)
//! - Personal-record analysis and trend detection
//! - Adherence-streak computation
//! - The progress document cache (TTL, single-flight, change notification)
//! - Boundary decoding and file-backed persistence

pub mod types;
pub mod error;
pub mod logging;
pub mod config;
pub mod decode;
pub mod records;
pub mod streak;
pub mod cache;
pub mod store;
pub mod csv_export;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::Config;
pub use records::{analyze_all, detect_new_records, epley_1rm, trend};
pub use streak::{streak, streak_now};
pub use cache::{CacheKey, CachePolicy, Document, FetchOutcome, ProgressCache, ReentryAction};
pub use store::{JsonFileStore, ProgressStore};
