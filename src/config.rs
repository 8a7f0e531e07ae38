// ZoneWatch - Irrigation run reconciliation and monitoring
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Engine configuration.
//!
//! Every threshold the engine consults is an explicit field here; nothing is
//! read from globals. Components take their config section by value at
//! construction.

use serde::{Deserialize, Serialize};

use crate::error::{Result, ZoneWatchError};

/// Master configuration for the reconciliation engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Run matching settings.
    pub matcher: MatcherConfig,

    /// Baseline window settings.
    pub baseline: BaselineConfig,

    /// Anomaly detection thresholds.
    pub anomaly: AnomalyConfig,
}

impl EngineConfig {
    /// Reject configurations the algorithms cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.matcher.time_tolerance_minutes <= 0 {
            return Err(ZoneWatchError::InvalidConfig {
                field: "time_tolerance_minutes",
                reason: "must be positive".to_string(),
            });
        }
        if self.baseline.window_days <= 0 {
            return Err(ZoneWatchError::InvalidConfig {
                field: "window_days",
                reason: "must be positive".to_string(),
            });
        }
        if self.anomaly.too_low_multiplier >= self.anomaly.too_high_multiplier {
            return Err(ZoneWatchError::InvalidConfig {
                field: "too_low_multiplier",
                reason: "must be below too_high_multiplier".to_string(),
            });
        }
        Ok(())
    }
}

/// Run matcher configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatcherConfig {
    /// Maximum start-time difference (minutes) for a scheduled/actual pair
    /// to be considered a match.
    pub time_tolerance_minutes: i64,

    /// Grace period (minutes) after the scheduled start before a run
    /// without a report counts as due.
    pub due_buffer_minutes: i64,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            time_tolerance_minutes: 30,
            due_buffer_minutes: 10,
        }
    }
}

/// Baseline window configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineConfig {
    /// Trailing window length in days.
    pub window_days: i64,

    /// Minimum usable runs before a baseline is defined for a zone.
    pub min_samples: usize,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            window_days: 30,
            min_samples: 7,
        }
    }
}

/// Anomaly detection thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyConfig {
    /// Z-score above which water usage is anomalous.
    pub usage_z_threshold: f64,

    /// Z-score above which a usage anomaly escalates from MEDIUM to HIGH.
    pub usage_z_critical: f64,

    /// Z-score above which runtime is anomalous.
    pub duration_z_threshold: f64,

    /// Z-score above which a runtime anomaly escalates from LOW to MEDIUM.
    pub duration_z_elevated: f64,

    /// Relative gallons-per-minute change above which efficiency is
    /// anomalous.
    pub efficiency_threshold: f64,

    /// Relative change above which an efficiency anomaly escalates from
    /// MEDIUM to HIGH.
    pub efficiency_critical: f64,

    /// Reported usage above this multiple of expected usage is flagged
    /// too high.
    pub too_high_multiplier: f64,

    /// Reported usage below this multiple of expected usage is flagged
    /// too low.
    pub too_low_multiplier: f64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            usage_z_threshold: 2.0,
            usage_z_critical: 3.0,
            duration_z_threshold: 1.5,
            duration_z_elevated: 2.0,
            efficiency_threshold: 0.3,
            efficiency_critical: 0.5,
            too_high_multiplier: 2.0,
            too_low_multiplier: 0.5,
        }
    }
}
