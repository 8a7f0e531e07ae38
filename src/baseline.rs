// ZoneWatch - Irrigation run reconciliation and monitoring
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Usage baseline computation.
//!
//! A baseline summarizes a zone's nominal water usage over a trailing
//! window. It is recomputed wholesale and fully replaces the previous
//! baseline on upsert; per-zone sample counts are small enough that
//! incremental updates are not worth the bookkeeping.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::config::BaselineConfig;
use crate::record::{ActualRun, ZoneId};

/// Statistics for a single tracked quantity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStats {
    pub mean: f64,
    pub std: f64,
    pub count: u64,
    #[serde(skip)]
    sum: f64,
    #[serde(skip)]
    sum_sq: f64,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sample(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.sum_sq += value * value;
        self.recompute();
    }

    fn recompute(&mut self) {
        if self.count == 0 {
            self.mean = 0.0;
            self.std = 0.0;
            return;
        }

        let n = self.count as f64;
        self.mean = self.sum / n;

        if self.count > 1 {
            // Sample variance; clamp against negative rounding residue
            let variance = (self.sum_sq - n * self.mean * self.mean) / (n - 1.0);
            self.std = variance.max(0.0).sqrt();
        } else {
            self.std = 0.0;
        }
    }

    /// A spread is only meaningful with at least two samples.
    pub fn is_valid(&self) -> bool {
        self.count >= 2 && self.std > 0.0
    }
}

/// Statistical usage summary for one zone over a window.
///
/// One current baseline per zone; superseded (not versioned) on recompute.
/// Undefined until the minimum sample count is reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageBaseline {
    /// Zone the baseline describes
    pub zone_id: ZoneId,
    /// Zone display name
    pub zone_name: String,
    /// Mean water usage per run, in gallons
    pub avg_gallons: f64,
    /// Sample standard deviation of gallons
    pub std_gallons: f64,
    /// Mean run duration in minutes
    pub avg_duration_minutes: f64,
    /// Sample standard deviation of duration
    pub std_duration: f64,
    /// Mean of per-run gallons per minute
    pub avg_gpm: f64,
    /// Number of usable runs in the window
    pub sample_count: usize,
    /// First day of the window
    pub window_start: NaiveDate,
    /// Last day of the window
    pub window_end: NaiveDate,
    /// When the baseline was computed
    pub computed_at: NaiveDateTime,
}

impl UsageBaseline {
    /// Compute a zone's baseline from its actual runs over a window.
    ///
    /// Only runs inside the window with reported gallons > 0 and duration
    /// > 0 contribute. Returns `None` when fewer than
    /// `config.min_samples` usable runs exist; anomaly checks are then
    /// skipped for the zone, not errored.
    pub fn compute(
        zone_id: ZoneId,
        zone_name: &str,
        runs: &[ActualRun],
        window_start: NaiveDate,
        window_end: NaiveDate,
        config: &BaselineConfig,
        computed_at: NaiveDateTime,
    ) -> Option<Self> {
        let mut gallons = RunStats::new();
        let mut duration = RunStats::new();
        let mut gpm = RunStats::new();

        for run in runs {
            if run.date < window_start || run.date > window_end {
                continue;
            }
            let Some(volume) = run.gallons else { continue };
            if !volume.is_finite() || volume <= 0.0 || run.duration_minutes == 0 {
                continue;
            }
            let minutes = run.duration_minutes as f64;
            gallons.add_sample(volume);
            duration.add_sample(minutes);
            gpm.add_sample(volume / minutes);
        }

        let sample_count = gallons.count as usize;
        if sample_count < config.min_samples {
            return None;
        }

        Some(Self {
            zone_id,
            zone_name: zone_name.to_string(),
            avg_gallons: gallons.mean,
            std_gallons: gallons.std,
            avg_duration_minutes: duration.mean,
            std_duration: duration.std,
            avg_gpm: gpm.mean,
            sample_count,
            window_start,
            window_end,
            computed_at,
        })
    }
}
