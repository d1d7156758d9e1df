//! ojs-metrics - journal analytics for Open Journal Systems
//!
//! Collects editorial, readership and user statistics from the OJS REST API
//! of one or more journals, merges them into a single dashboard snapshot and
//! keeps that snapshot fresh in a background cache.
//!
//! ## Layers
//!
//! 1. **`ojs`**: HTTP client and typed endpoint wrappers
//! 2. **`stats`**: per-journal normalization, journal discovery,
//!    cross-journal aggregation and the refresh cache
//! 3. **`server`**: a small local HTTP server handing out cached snapshots

pub mod config;
pub mod error;
pub mod ojs;
pub mod server;
pub mod stats;

pub use config::Config;
pub use error::{MetricsError, Result};
