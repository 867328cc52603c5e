//! pagesnap - bounded-concurrency screenshot job scheduling.
//!
//! Clients submit capture requests describing a page, a device profile, and
//! an optional element selector. Jobs run on a fixed set of workers that
//! borrow render sessions from a bounded pool; a periodic sweeper reclaims
//! finished jobs and abandoned sessions.
//!
//! The rendering backend is abstracted behind [`engine::RenderEngine`].
//! [`engine::FixtureEngine`] is an in-memory implementation used by tests and
//! dry runs.
//!
//! # High-Level API
//!
//! ```ignore
//! use std::sync::Arc;
//! use pagesnap::engine::FixtureEngine;
//! use pagesnap::job::{validate, RawRequest};
//! use pagesnap::scheduler::{Scheduler, SchedulerConfig};
//!
//! let scheduler = Scheduler::start(Arc::new(FixtureEngine::new()), SchedulerConfig::new(2)).await;
//!
//! let spec = validate(&RawRequest::new("https://example.com"))?;
//! let id = scheduler.submit(spec)?;
//! let snapshot = scheduler.get_status(&id);
//! ```

pub mod config;
pub mod engine;
pub mod job;
pub mod logging;
pub mod pool;
pub mod scheduler;
pub mod selector;
pub mod stats;
pub mod sweeper;

/// Version of the pagesnap library and CLI.
///
/// This is synchronized across all components in the workspace.
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
