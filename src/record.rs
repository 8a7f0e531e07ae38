//! Run record definitions
//!
//! This module defines the core types shared across the crate:
//! - Scheduled and actual/reported run records
//! - Zone identifiers and the zone kind inferred from a zone's name
//! - Zone name normalization used for matching

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Unique identifier for an irrigation zone
pub type ZoneId = u32;

/// An expected irrigation event for a zone, as captured from the controller.
///
/// Records are immutable once captured; successive scrapes append new
/// records for the same zone and day rather than overwriting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledRun {
    /// Zone this run belongs to
    pub zone_id: ZoneId,
    /// Zone display name (used for matching and priority inference)
    pub zone_name: String,
    /// Calendar date the run is scheduled on
    pub date: NaiveDate,
    /// Scheduled start time (controller-local wall time)
    pub start_time: NaiveDateTime,
    /// Scheduled duration in minutes
    pub duration_minutes: u32,
    /// Expected water volume in gallons, when the controller reports one
    pub expected_gallons: Option<f64>,
    /// Unparsed status text from the controller
    pub raw_status: String,
    /// Controller flagged this run as cancelled due to rainfall
    pub is_rain_cancelled: bool,
    /// When this record was captured
    pub captured_at: NaiveDateTime,
}

impl ScheduledRun {
    /// Create a new scheduled run. The capture timestamp defaults to the
    /// start time until overridden with [`ScheduledRun::with_captured_at`].
    pub fn new(
        zone_id: ZoneId,
        zone_name: impl Into<String>,
        start_time: NaiveDateTime,
        duration_minutes: u32,
    ) -> Self {
        Self {
            zone_id,
            zone_name: zone_name.into(),
            date: start_time.date(),
            start_time,
            duration_minutes,
            expected_gallons: None,
            raw_status: String::new(),
            is_rain_cancelled: false,
            captured_at: start_time,
        }
    }

    /// Set the expected water volume
    pub fn with_expected_gallons(mut self, gallons: f64) -> Self {
        self.expected_gallons = Some(gallons);
        self
    }

    /// Set the raw status text
    pub fn with_status(mut self, raw_status: impl Into<String>) -> Self {
        self.raw_status = raw_status.into();
        self
    }

    /// Mark the run as rain-cancelled
    pub fn rain_cancelled(mut self) -> Self {
        self.is_rain_cancelled = true;
        self
    }

    /// Set the capture timestamp
    pub fn with_captured_at(mut self, captured_at: NaiveDateTime) -> Self {
        self.captured_at = captured_at;
        self
    }

    /// A malformed record is skipped with a diagnostic rather than failing
    /// the whole reconciliation.
    pub fn is_well_formed(&self) -> bool {
        self.duration_minutes > 0 && self.expected_gallons.map_or(true, f64::is_finite)
    }
}

/// An observed irrigation execution event with reported duration, volume
/// and status. Immutable once captured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActualRun {
    /// Zone this run was reported for
    pub zone_id: ZoneId,
    /// Zone display name as reported
    pub zone_name: String,
    /// Calendar date the run was observed on
    pub date: NaiveDate,
    /// Observed start time (controller-local wall time)
    pub start_time: NaiveDateTime,
    /// Observed duration in minutes
    pub duration_minutes: u32,
    /// Reported water volume in gallons; absent when the flow meter did not
    /// report
    pub gallons: Option<f64>,
    /// Unparsed status text from the controller
    pub raw_status: String,
    /// Failure reason derived by the collector, if any
    pub failure_reason: Option<String>,
    /// Reported water efficiency as a percentage of the expected flow
    pub efficiency_percent: Option<f64>,
    /// When this record was captured
    pub captured_at: NaiveDateTime,
}

impl ActualRun {
    /// Create a new actual run. The capture timestamp defaults to the start
    /// time until overridden with [`ActualRun::with_captured_at`].
    pub fn new(
        zone_id: ZoneId,
        zone_name: impl Into<String>,
        start_time: NaiveDateTime,
        duration_minutes: u32,
    ) -> Self {
        Self {
            zone_id,
            zone_name: zone_name.into(),
            date: start_time.date(),
            start_time,
            duration_minutes,
            gallons: None,
            raw_status: String::new(),
            failure_reason: None,
            efficiency_percent: None,
            captured_at: start_time,
        }
    }

    /// Set the reported water volume
    pub fn with_gallons(mut self, gallons: f64) -> Self {
        self.gallons = Some(gallons);
        self
    }

    /// Set the raw status text
    pub fn with_status(mut self, raw_status: impl Into<String>) -> Self {
        self.raw_status = raw_status.into();
        self
    }

    /// Set the derived failure reason
    pub fn with_failure_reason(mut self, reason: impl Into<String>) -> Self {
        self.failure_reason = Some(reason.into());
        self
    }

    /// Set the reported efficiency percentage
    pub fn with_efficiency(mut self, percent: f64) -> Self {
        self.efficiency_percent = Some(percent);
        self
    }

    /// Set the capture timestamp
    pub fn with_captured_at(mut self, captured_at: NaiveDateTime) -> Self {
        self.captured_at = captured_at;
        self
    }

    /// Observed gallons per minute, when both volume and duration are usable
    pub fn gallons_per_minute(&self) -> Option<f64> {
        match self.gallons {
            Some(gallons) if gallons > 0.0 && self.duration_minutes > 0 => {
                Some(gallons / self.duration_minutes as f64)
            }
            _ => None,
        }
    }

    /// A malformed record is skipped with a diagnostic rather than failing
    /// the whole reconciliation.
    pub fn is_well_formed(&self) -> bool {
        self.gallons.map_or(true, f64::is_finite)
            && self.efficiency_percent.map_or(true, f64::is_finite)
    }
}

/// Zone kind inferred from the zone name. Container plantings dry out
/// fastest, so misses there outrank misses on turf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZoneKind {
    /// Planters, beds, pots and baskets
    Container,
    /// Plantings around the pool area
    PoolArea,
    /// Turf and lawn
    Turf,
    /// Anything the name does not identify
    Other,
}

impl ZoneKind {
    /// Infer the kind from a zone's display name
    pub fn from_name(name: &str) -> Self {
        let lower = name.to_lowercase();
        if ["planter", "bed", "pot", "basket"]
            .iter()
            .any(|kind| lower.contains(kind))
        {
            ZoneKind::Container
        } else if lower.contains("pool") {
            ZoneKind::PoolArea
        } else if lower.contains("turf") || lower.contains("lawn") {
            ZoneKind::Turf
        } else {
            ZoneKind::Other
        }
    }
}

/// Normalize a zone name for matching: case-fold and canonicalize the
/// punctuation and ampersand variants the controller is inconsistent about.
pub fn normalize_zone_name(name: &str) -> String {
    let mut normalized = name.trim().to_lowercase();
    for (from, to) in [
        ("pots, baskets & planters", "pots, baskets and planters"),
        ("bed/planters", "bed and planters"),
        ("&", "and"),
    ] {
        normalized = normalized.replace(from, to);
    }
    normalized
}
