// ZoneWatch - Integration Tests
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! End-to-end tests for reconciliation, change detection and anomaly
//! baselines against the in-memory event store.

use chrono::{NaiveDate, NaiveDateTime};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use zonewatch::*;

// ============================================================================
// Helper Functions
// ============================================================================

const NORMAL: &str = "Normal watering cycle. Time: 6:00am Duration: 15 minutes";
const RAIN: &str = "Aborted due to high daily rainfall. Time: 6:00am Duration: 15 minutes";

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 8, d).unwrap()
}

fn at(d: u32, hour: u32, minute: u32) -> NaiveDateTime {
    day(d).and_hms_opt(hour, minute, 0).unwrap()
}

fn engine_with(store: MemoryStore) -> ReconciliationEngine<MemoryStore> {
    ReconciliationEngine::new(store, EngineConfig::default()).unwrap()
}

fn seeded_runs(zone_id: ZoneId, zone_name: &str, days: u32, gallons: f64) -> Vec<ActualRun> {
    // Deterministic jitter so stddev is non-zero but stable across runs
    let mut rng = StdRng::seed_from_u64(0x5EED + zone_id as u64);
    (1..=days)
        .map(|d| {
            let jitter: f64 = rng.gen_range(-1.5..1.5);
            ActualRun::new(zone_id, zone_name, at(d, 6, 0), 10).with_gallons(gallons + jitter)
        })
        .collect()
}

// ============================================================================
// Section 1: Matching Scenarios
// ============================================================================

#[test]
fn test_01_on_time_run_is_a_perfect_match() {
    let mut store = MemoryStore::new();
    store.push_scheduled(
        ScheduledRun::new(1, "Front Turf", at(22, 6, 0), 15)
            .with_expected_gallons(25.5)
            .with_status(NORMAL),
    );
    store.push_actual(ActualRun::new(1, "Front Turf", at(22, 6, 0), 15).with_gallons(24.8));

    let mut engine = engine_with(store);
    let report = engine.reconcile(day(22), at(22, 12, 0)).unwrap();

    assert_eq!(report.matches.len(), 1);
    assert_eq!(report.matches[0].match_type, MatchType::PerfectMatch);
    assert!(report.matches[0].confidence >= 0.9);
    assert_eq!(report.matches[0].alert_priority, AlertPriority::None);
}

#[test]
fn test_02_missed_planter_run_is_high_priority() {
    let mut store = MemoryStore::new();
    store.push_scheduled(
        ScheduledRun::new(3, "Patio Planters", at(22, 7, 0), 20)
            .with_expected_gallons(12.0)
            .with_status(NORMAL),
    );

    let mut engine = engine_with(store);
    // Past 07:10, so the run is due and unreported
    let report = engine.reconcile(day(22), at(22, 7, 30)).unwrap();

    assert_eq!(report.matches[0].match_type, MatchType::MissingRun);
    assert_eq!(report.matches[0].alert_priority, AlertPriority::High);
    assert_eq!(report.summary.expected_gallons_lost, 12.0);
    assert_eq!(report.summary.affected_zones, vec!["Patio Planters"]);
}

#[test]
fn test_03_unscheduled_afternoon_run_is_unexpected() {
    let mut store = MemoryStore::new();
    store.push_actual(ActualRun::new(4, "Side Beds", at(22, 14, 30), 10).with_gallons(8.0));

    let mut engine = engine_with(store);
    let report = engine.reconcile(day(22), at(22, 16, 0)).unwrap();

    assert_eq!(report.matches[0].match_type, MatchType::UnexpectedRun);
    assert_eq!(report.matches[0].alert_priority, AlertPriority::Medium);
    assert!(report.summary.requires_attention());
}

#[test]
fn test_04_rain_cancelled_runs_never_alert() {
    let mut store = MemoryStore::new();
    for zone_id in 1..=3 {
        store.push_scheduled(
            ScheduledRun::new(zone_id, format!("Zone {}", zone_id), at(22, 6, 0), 15)
                .with_expected_gallons(20.0)
                .with_status(RAIN)
                .rain_cancelled(),
        );
    }

    let mut engine = engine_with(store);
    let report = engine.reconcile(day(22), at(22, 12, 0)).unwrap();

    assert_eq!(report.summary.rain_cancelled, 3);
    for result in &report.matches {
        assert_eq!(result.match_type, MatchType::RainCancelled);
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.alert_priority, AlertPriority::None);
    }
    assert!(!report.summary.requires_attention());
}

#[test]
fn test_05_future_runs_are_not_missing() {
    let mut store = MemoryStore::new();
    store.push_scheduled(
        ScheduledRun::new(1, "Front Turf", at(22, 18, 0), 15).with_status(NORMAL),
    );

    let mut engine = engine_with(store);
    let report = engine.reconcile(day(22), at(22, 12, 0)).unwrap();

    assert_eq!(report.matches[0].match_type, MatchType::FutureScheduled);
    assert_eq!(report.summary.missing_runs, 0);
}

#[test]
fn test_06_greedy_matching_is_deterministic() {
    let mut store = MemoryStore::new();
    store.push_scheduled(ScheduledRun::new(1, "Front Turf", at(22, 6, 0), 15).with_status(NORMAL));
    store.push_scheduled(ScheduledRun::new(1, "Front Turf", at(22, 6, 20), 15).with_status(NORMAL));
    store.push_actual(ActualRun::new(1, "Front Turf", at(22, 6, 10), 15).with_gallons(20.0));

    let mut engine = engine_with(store);
    let first = engine.reconcile(day(22), at(22, 12, 0)).unwrap();
    let second = engine.reconcile(day(22), at(22, 12, 0)).unwrap();

    // Same snapshot, same outcome: matches are recomputed, never patched
    assert_eq!(first.matches, second.matches);
    // The earlier scheduled run claimed the actual run
    assert_eq!(first.matches[0].actual_index, Some(0));
    assert_eq!(first.matches[1].match_type, MatchType::MissingRun);
}

// ============================================================================
// Section 2: Status Change Detection
// ============================================================================

#[test]
fn test_07_rainfall_abort_transition_detected() {
    let mut store = MemoryStore::new();
    store.push_scheduled(
        ScheduledRun::new(5, "Front Planters", at(21, 6, 0), 15)
            .with_expected_gallons(25.5)
            .with_status(NORMAL)
            .with_captured_at(at(21, 5, 0)),
    );
    let current = ScheduledRun::new(5, "Front Planters", at(22, 6, 0), 15)
        .with_expected_gallons(25.5)
        .with_status(RAIN)
        .with_captured_at(at(22, 5, 0));
    store.push_scheduled(current.clone());

    let mut engine = engine_with(store);
    let changes = engine.detect_changes(&[current], at(22, 8, 0)).unwrap();

    assert_eq!(changes.len(), 1);
    let change = &changes[0];
    assert_eq!(change.change_type, ChangeType::RainfallAbort);
    assert!(change.irrigation_prevented);
    assert_eq!(change.expected_gallons_lost, 25.5);
    assert_eq!(change.previous_variant, StatusVariant::Normal);
    assert_eq!(change.current_variant, StatusVariant::RainfallAbort);
}

#[test]
fn test_08_identical_text_never_changes() {
    let mut store = MemoryStore::new();
    store.push_scheduled(
        ScheduledRun::new(5, "Front Planters", at(21, 6, 0), 15)
            .with_status(NORMAL)
            .with_captured_at(at(21, 5, 0)),
    );
    let current = ScheduledRun::new(5, "Front Planters", at(22, 6, 0), 15)
        .with_status(NORMAL)
        .with_captured_at(at(22, 5, 0));
    store.push_scheduled(current.clone());

    let mut engine = engine_with(store);
    assert!(engine.detect_changes(&[current], at(22, 8, 0)).unwrap().is_empty());
    assert_eq!(engine.store().status_change_count(), 0);
}

#[test]
fn test_09_rerunning_detection_never_grows_the_log() {
    let mut store = MemoryStore::new();
    store.push_scheduled(
        ScheduledRun::new(5, "Front Planters", at(21, 6, 0), 15)
            .with_status(NORMAL)
            .with_captured_at(at(21, 5, 0)),
    );
    let current = ScheduledRun::new(5, "Front Planters", at(22, 6, 0), 15)
        .with_status(RAIN)
        .with_captured_at(at(22, 5, 0));
    store.push_scheduled(current.clone());

    let mut engine = engine_with(store);
    for pass in 0..3 {
        engine.detect_changes(&[current.clone()], at(22, 8 + pass, 0)).unwrap();
        assert_eq!(engine.store().status_change_count(), 1);
    }
}

#[test]
fn test_10_restoration_detected_after_abort() {
    let mut store = MemoryStore::new();
    store.push_scheduled(
        ScheduledRun::new(5, "Front Planters", at(22, 6, 0), 15)
            .with_status(RAIN)
            .with_captured_at(at(22, 5, 0)),
    );
    let current = ScheduledRun::new(5, "Front Planters", at(23, 6, 0), 15)
        .with_expected_gallons(25.5)
        .with_status(NORMAL)
        .with_captured_at(at(23, 5, 0));
    store.push_scheduled(current.clone());

    let mut engine = engine_with(store);
    let changes = engine.detect_changes(&[current], at(23, 8, 0)).unwrap();

    assert_eq!(changes[0].change_type, ChangeType::NormalRestored);
    assert!(!changes[0].irrigation_prevented);
    assert_eq!(changes[0].expected_gallons_lost, 0.0);
}

// ============================================================================
// Section 3: Baselines and Anomalies
// ============================================================================

#[test]
fn test_11_baseline_builds_over_window() {
    let mut store = MemoryStore::new();
    for run in seeded_runs(1, "Front Turf", 14, 20.0) {
        store.push_actual(run);
    }

    let mut engine = engine_with(store);
    let updated = engine.refresh_baselines(day(30), at(30, 0, 0)).unwrap();
    assert_eq!(updated, 1);

    let baseline = engine.store().baseline(1).unwrap().unwrap();
    assert_eq!(baseline.sample_count, 14);
    assert!((baseline.avg_gallons - 20.0).abs() < 1.5);
    assert!(baseline.std_gallons > 0.0);
}

#[test]
fn test_12_zero_usage_run_yields_single_high_anomaly() {
    let mut store = MemoryStore::new();
    for run in seeded_runs(1, "Front Turf", 14, 20.0) {
        store.push_actual(run);
    }
    store.push_actual(ActualRun::new(1, "Front Turf", at(22, 6, 0), 10).with_gallons(0.0));

    let mut engine = engine_with(store);
    engine.refresh_baselines(day(21), at(21, 0, 0)).unwrap();
    let report = engine.reconcile(day(22), at(22, 12, 0)).unwrap();

    // Exactly one anomaly: zero usage short-circuits the other checks
    assert_eq!(report.anomalies.len(), 1);
    assert_eq!(report.anomalies[0].anomaly_type, AnomalyType::ZeroUsage);
    assert_eq!(report.anomalies[0].severity, Severity::High);
    assert_eq!(report.summary.anomalies_high, 1);
}

#[test]
fn test_13_zero_usage_fires_without_baseline() {
    let mut store = MemoryStore::new();
    store.push_actual(ActualRun::new(9, "New Zone", at(22, 6, 0), 10).with_gallons(0.0));

    let mut engine = engine_with(store);
    let report = engine.reconcile(day(22), at(22, 12, 0)).unwrap();

    assert_eq!(report.anomalies.len(), 1);
    assert_eq!(report.anomalies[0].anomaly_type, AnomalyType::ZeroUsage);
}

#[test]
fn test_14_usage_spike_flagged_against_baseline() {
    let mut store = MemoryStore::new();
    for run in seeded_runs(1, "Front Turf", 14, 20.0) {
        store.push_actual(run);
    }
    // Far above any jittered mean
    store.push_actual(ActualRun::new(1, "Front Turf", at(22, 6, 0), 10).with_gallons(60.0));

    let mut engine = engine_with(store);
    engine.refresh_baselines(day(21), at(21, 0, 0)).unwrap();
    let runs = engine.store().actual_runs(day(22)).unwrap();
    let anomalies = engine.scan_anomalies(&runs, at(22, 12, 0)).unwrap();

    assert!(anomalies
        .iter()
        .any(|a| a.anomaly_type == AnomalyType::HighUsage && a.severity == Severity::High));
}

#[test]
fn test_15_anomaly_scan_is_idempotent_across_reconciles() {
    let mut store = MemoryStore::new();
    store.push_actual(ActualRun::new(1, "Front Turf", at(22, 6, 0), 10).with_gallons(0.0));

    let mut engine = engine_with(store);
    let first = engine.reconcile(day(22), at(22, 12, 0)).unwrap();
    assert_eq!(first.anomalies.len(), 1);

    let second = engine.reconcile(day(22), at(22, 13, 0)).unwrap();
    assert!(second.anomalies.is_empty());
    assert_eq!(engine.store().anomaly_count(), 1);
}

#[test]
fn test_16_stable_zone_produces_no_anomalies() {
    let mut store = MemoryStore::new();
    for run in seeded_runs(1, "Front Turf", 14, 20.0) {
        store.push_actual(run);
    }
    store.push_actual(ActualRun::new(1, "Front Turf", at(22, 6, 0), 10).with_gallons(20.0));

    let mut engine = engine_with(store);
    engine.refresh_baselines(day(21), at(21, 0, 0)).unwrap();
    let report = engine.reconcile(day(22), at(22, 12, 0)).unwrap();

    assert!(report.anomalies.is_empty());
}

// ============================================================================
// Section 4: End-to-End Summary
// ============================================================================

#[test]
fn test_17_mixed_day_summary() {
    let mut store = MemoryStore::new();
    // Perfect match on turf
    store.push_scheduled(
        ScheduledRun::new(1, "Front Turf", at(22, 6, 0), 15)
            .with_expected_gallons(20.0)
            .with_status(NORMAL),
    );
    store.push_actual(ActualRun::new(1, "Front Turf", at(22, 6, 1), 15).with_gallons(19.5));
    // Missing planter run
    store.push_scheduled(
        ScheduledRun::new(2, "Patio Planters", at(22, 7, 0), 20)
            .with_expected_gallons(12.0)
            .with_status(NORMAL),
    );
    // Rain cancellation
    store.push_scheduled(
        ScheduledRun::new(3, "Back Lawn", at(22, 8, 0), 30)
            .with_expected_gallons(35.0)
            .with_status(RAIN)
            .rain_cancelled(),
    );
    // Unexpected run
    store.push_actual(ActualRun::new(4, "Side Beds", at(22, 14, 30), 10).with_gallons(8.0));

    let mut engine = engine_with(store);
    let report = engine.reconcile(day(22), at(22, 16, 0)).unwrap();

    assert_eq!(report.summary.perfect_matches, 1);
    assert_eq!(report.summary.missing_runs, 1);
    assert_eq!(report.summary.rain_cancelled, 1);
    assert_eq!(report.summary.unexpected_runs, 1);
    assert_eq!(report.summary.high_priority, 1);
    assert_eq!(report.summary.medium_priority, 1);
    assert_eq!(report.summary.expected_gallons_lost, 12.0);
    assert_eq!(report.summary.affected_zones, vec!["Patio Planters", "Side Beds"]);
    assert!(report.summary.requires_attention());
}

#[test]
fn test_18_report_serializes_for_notification() {
    let mut store = MemoryStore::new();
    store.push_scheduled(
        ScheduledRun::new(2, "Patio Planters", at(22, 7, 0), 20)
            .with_expected_gallons(12.0)
            .with_status(NORMAL),
    );

    let mut engine = engine_with(store);
    let report = engine.reconcile(day(22), at(22, 12, 0)).unwrap();

    let json = report.to_json().unwrap();
    // Serde serializes the enum variant in Pascal case
    assert!(json.contains("MissingRun"));
    assert!(json.contains("Patio Planters"));

    let parsed: ReconciliationReport = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.summary, report.summary);
}

#[test]
fn test_19_custom_tolerance_widens_matching() {
    let mut store = MemoryStore::new();
    store.push_scheduled(ScheduledRun::new(1, "Front Turf", at(22, 6, 0), 15).with_status(NORMAL));
    store.push_actual(ActualRun::new(1, "Front Turf", at(22, 6, 45), 15).with_gallons(20.0));

    // The 45 minute offset is outside the default tolerance, but a wider
    // tolerance pairs the runs
    let mut config = EngineConfig::default();
    config.matcher.time_tolerance_minutes = 60;
    let mut engine = ReconciliationEngine::new(store, config).unwrap();
    let report = engine.reconcile(day(22), at(22, 12, 0)).unwrap();

    assert_eq!(report.matches[0].match_type, MatchType::TimeVariance);
    assert_eq!(report.summary.missing_runs, 0);
}

#[test]
fn test_20_usage_flags_roll_into_summary() {
    let mut store = MemoryStore::new();
    store.push_scheduled(
        ScheduledRun::new(1, "Front Turf", at(22, 6, 0), 15)
            .with_expected_gallons(20.0)
            .with_status(NORMAL),
    );
    store.push_actual(ActualRun::new(1, "Front Turf", at(22, 6, 0), 15).with_gallons(55.0));

    let mut engine = engine_with(store);
    let report = engine.reconcile(day(22), at(22, 12, 0)).unwrap();

    // 55 gal against 20 expected exceeds the 2.0x multiplier
    assert_eq!(report.summary.flags_too_high, 1);
}
