#![forbid(unsafe_code)]

//! Core domain model and business logic for the medication tracker.
//!
//! This crate provides:
//! - Domain types (medications, doses, day entries)
//! - Frequency rules, day status and adherence reports
//! - Namespaced key-value storage (in-memory and file-backed)
//! - The per-user API logic behind the HTTP server
//! - The optimistic client state manager and its remotes
//! - Configuration, logging and CSV export

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod store;
pub mod file_store;
pub mod partition;
pub mod schedule;
pub mod report;
pub mod export;
pub mod remote;
pub mod http_remote;
pub mod tracker;

/// Header carrying the caller-chosen user id. It is trusted as-is.
pub const USER_ID_HEADER: &str = "X-User-ID";

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::Config;
pub use store::{KvStore, MemoryStore};
pub use file_store::FileStore;
pub use partition::UserPartition;
pub use schedule::{should_track, DoseStatus, MedicationDayStatus};
pub use remote::{LocalRemote, Remote};
pub use http_remote::HttpRemote;
pub use tracker::{Tracker, TrackerState};
