// ZoneWatch - Irrigation run reconciliation and monitoring
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # ZoneWatch
//!
//! Reconciliation, state-change detection and anomaly baselines for
//! irrigation zone run data.
//!
//! ZoneWatch decides, from noisy controller status text and time-series run
//! history, whether irrigation behaved as expected:
//!
//! - **Status classification**: free-form status text to a closed variant set
//! - **Run matching**: scheduled vs reported runs with confidence scoring
//!   and alert priorities
//! - **Status change detection**: genuine classification transitions only,
//!   idempotent across re-runs
//! - **Usage baselines**: per-zone statistics with z-score anomaly checks
//!
//! Collecting the raw records, sending notifications and persisting to a
//! particular storage engine belong to collaborators; the engine consumes
//! an [`EventStore`] and produces a [`ReconciliationReport`].
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::NaiveDate;
//! use zonewatch::{ActualRun, EngineConfig, MemoryStore, ReconciliationEngine, ScheduledRun};
//!
//! let date = NaiveDate::from_ymd_opt(2025, 8, 22).unwrap();
//! let start = date.and_hms_opt(6, 0, 0).unwrap();
//!
//! let mut store = MemoryStore::new();
//! store.push_scheduled(
//!     ScheduledRun::new(1, "Front Turf", start, 15)
//!         .with_expected_gallons(25.5)
//!         .with_status("Normal watering cycle"),
//! );
//! store.push_actual(ActualRun::new(1, "Front Turf", start, 15).with_gallons(24.8));
//!
//! let mut engine = ReconciliationEngine::new(store, EngineConfig::default()).unwrap();
//! let now = date.and_hms_opt(12, 0, 0).unwrap();
//! let report = engine.reconcile(date, now).unwrap();
//!
//! assert_eq!(report.summary.perfect_matches, 1);
//! assert!(!report.summary.requires_attention());
//! ```
//!
//! ## Modules
//!
//! - [`record`]: scheduled and actual run records, zone kinds
//! - [`status`]: status text classification
//! - [`matcher`]: scheduled vs actual reconciliation
//! - [`change`]: status change detection
//! - [`baseline`]: per-zone usage baselines
//! - [`anomaly`]: usage anomaly checks and flags
//! - [`store`]: event store trait and in-memory implementation
//! - [`engine`]: orchestration and idempotent persistence
//! - [`summary`]: notification-facing report

// Modules
pub mod anomaly;
pub mod baseline;
pub mod change;
pub mod config;
pub mod engine;
pub mod error;
pub mod matcher;
pub mod record;
pub mod status;
pub mod store;
pub mod summary;

// Re-exports for convenient access
pub use anomaly::{AnomalyDetector, AnomalyType, Severity, UsageAnomaly, UsageFlag};
pub use baseline::{RunStats, UsageBaseline};
pub use change::{ChangeDetector, ChangeType, StatusChange};
pub use config::{AnomalyConfig, BaselineConfig, EngineConfig, MatcherConfig};
pub use engine::ReconciliationEngine;
pub use error::{Result, StoreError, ZoneWatchError};
pub use matcher::{AlertPriority, MatchResult, MatchType, RunMatcher};
pub use record::{normalize_zone_name, ActualRun, ScheduledRun, ZoneId, ZoneKind};
pub use status::{classify, StatusVariant};
pub use store::{EventStore, MemoryStore};
pub use summary::{AlertSummary, ReconciliationReport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
