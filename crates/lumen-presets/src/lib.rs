//! Preset request scheduling for lumen.
//!
//! Callers stage saves and applies through a [`PresetRequests`] handle; the
//! host loop calls [`PresetScheduler::poll`] once per tick, which services at
//! most one staged request against the record store, the quick-slot cache
//! and the host's live state.
//!
//! # Modules
//!
//! - [`scheduler`] - the tick-driven [`PresetScheduler`] and [`PollOutcome`]
//! - [`engine`] - capture of live state into records, dispatch of records
//!   back to live state, and the chained-preset guard
//! - [`config`] - [`SchedulerConfig`] loaded from TOML
//!
//! # Ordering
//!
//! - A staged save is always serviced before a staged apply.
//! - Each kind holds one request; a newer request replaces an older one.
//! - Presets chained from inside an apply run on a later tick, never
//!   recursively.

/// Scheduler configuration.
pub mod config;

/// Capture and dispatch of preset records.
pub mod engine;

/// Tick-driven request scheduler.
pub mod scheduler;

pub use config::{ConfigError, RamCacheConfig, SchedulerConfig};
pub use scheduler::{PollOutcome, PresetScheduler, SaveTarget};

pub use lumen_core::{ApplyRequest, PresetRequests, RequestError, SaveRequest};
