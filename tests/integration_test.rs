//! Integration tests for the generator pipelines.
//!
//! Tests cover:
//! - From-scratch generation over a mock backtest source, written and re-read
//! - Patch generation ranking, MOB pins and reconciliation against a base table
//! - Overlay calibration output and the zero-forecast fallback
//! - Fatal conditions leave no output file behind
//! - Re-runs produce byte-identical tables

mod common;

use approx::assert_relative_eq;
use common::*;
use methodology::adapters::csv_table_adapter::CsvTableAdapter;
use methodology::cli;
use methodology::domain::calibration::OverlayScope;
use methodology::domain::config::{GeneratorConfig, PatchConfig};
use methodology::domain::error::MethodologyError;
use methodology::domain::from_scratch::{discover_universe, generate};
use methodology::domain::overlap::validate;
use methodology::domain::patch::generate_patch;
use methodology::ports::table_port::TablePort;
use std::fs;
use tempfile::TempDir;

mod from_scratch_pipeline {
    use super::*;

    #[test]
    fn generates_three_tiers_per_metric_for_each_combination() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("from_scratch.csv");
        let source = MockBacktestSource::new().with_table(TABLE, sample_backtest());

        let written = cli::from_scratch_pipeline(
            &source,
            TABLE,
            month(2025, 10),
            &GeneratorConfig::default(),
            &CsvTableAdapter::new(),
            &out,
        )
        .unwrap();
        assert_eq!(written, 3 * 3 * 3);

        let rows = CsvTableAdapter::new().read_rules(&out).unwrap();
        assert_eq!(rows.len(), 27);
        assert!(validate(&rows).is_empty());

        // NON PRIME 202508 sorts first and is recent
        assert_eq!(rows[0].segment, "NON PRIME");
        assert_eq!(rows[0].approach, "DonorCohort");
        assert_eq!(rows[0].param1, "202507");
        assert_eq!((rows[0].mob_start, rows[0].mob_end), (1, 6));

        // NRP-S 202501 is mature
        let nrp: Vec<_> = rows.iter().filter(|r| r.segment == "NRP-S").collect();
        assert_eq!(nrp.len(), 9);
        assert!(nrp.iter().all(|r| r.approach == "StaticCohortAvg"));
        assert_eq!(nrp[2].param1, "12");
    }

    #[test]
    fn unknown_reference_month_is_empty_result() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("from_scratch.csv");
        let source = MockBacktestSource::new().with_table(TABLE, sample_backtest());

        let err = cli::from_scratch_pipeline(
            &source,
            TABLE,
            month(2024, 1),
            &GeneratorConfig::default(),
            &CsvTableAdapter::new(),
            &out,
        )
        .unwrap_err();
        assert!(matches!(err, MethodologyError::EmptyResult { .. }));
        assert!(!out.exists());
    }

    #[test]
    fn unmapped_recent_segment_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("from_scratch.csv");
        let source = MockBacktestSource::new().with_table(TABLE, sample_backtest());
        let mut config = GeneratorConfig::default();
        config.donor_map.remove("NON PRIME");

        let err = cli::from_scratch_pipeline(
            &source,
            TABLE,
            month(2025, 10),
            &config,
            &CsvTableAdapter::new(),
            &out,
        )
        .unwrap_err();
        assert!(matches!(err, MethodologyError::UnmappedSegment { segment } if segment == "NON PRIME"));
        assert!(!out.exists());
    }

    #[test]
    fn missing_table_is_reported() {
        let dir = TempDir::new().unwrap();
        let source = MockBacktestSource::new();
        let err = cli::from_scratch_pipeline(
            &source,
            TABLE,
            month(2025, 10),
            &GeneratorConfig::default(),
            &CsvTableAdapter::new(),
            &dir.path().join("out.csv"),
        )
        .unwrap_err();
        assert!(matches!(err, MethodologyError::TableNotFound { .. }));
    }

    #[test]
    fn rerun_is_byte_identical() {
        let records = sample_backtest();
        let universe = discover_universe(&records, month(2025, 11), OPENING_GBV).unwrap();
        let config = GeneratorConfig::default();
        let adapter = CsvTableAdapter::new();

        let first = adapter.render_rules(&generate(&universe, &config).unwrap()).unwrap();
        let second = adapter.render_rules(&generate(&universe, &config).unwrap()).unwrap();
        assert_eq!(first, second);
    }
}

mod patch_pipeline {
    use super::*;

    #[test]
    fn pins_worst_negative_drivers_for_each_month() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("patch.csv");
        let source = MockBacktestSource::new().with_table(TABLE, sample_backtest());
        let config = PatchConfig {
            top_n: 5,
            ..PatchConfig::default()
        };

        let patch = cli::patch_pipeline(
            &source,
            TABLE,
            &[month(2025, 10), month(2025, 11)],
            &config,
            &CsvTableAdapter::new(),
            &out,
        )
        .unwrap();

        let totals: Vec<f64> = patch.drivers.iter().map(|d| d.total_variance).collect();
        assert_eq!(totals, vec![-900.0, -500.0]);
        assert_eq!(patch.rules.len(), 4);

        let rows = CsvTableAdapter::new().read_rules(&out).unwrap();
        assert_eq!(rows.len(), 4);
        // PRIME 202507: Oct is MOB 4, Nov is MOB 5
        assert_eq!((rows[0].segment.as_str(), rows[0].mob_start, rows[0].mob_end), ("PRIME", 4, 4));
        assert_eq!(rows[0].param1, "0.045000");
        assert_eq!((rows[1].mob_start, rows[1].mob_end), (5, 5));
        assert_eq!(rows[1].approach, "Manual");
        // NRP-S 202501: Oct is MOB 10
        assert_eq!((rows[2].segment.as_str(), rows[2].mob_start), ("NRP-S", 10));
        assert_eq!(rows[2].param1, "0.044000");
    }

    #[test]
    fn top_n_limits_drivers() {
        let records = sample_backtest();
        let config = PatchConfig {
            top_n: 1,
            ..PatchConfig::default()
        };
        let patch = generate_patch(&records, &[month(2025, 10), month(2025, 11)], &config).unwrap();
        assert_eq!(patch.drivers.len(), 1);
        assert_eq!(patch.drivers[0].segment, "PRIME");
        assert_eq!(patch.rules.len(), 2);
    }

    #[test]
    fn patch_conflicts_with_base_table_until_reconciled() {
        let records = sample_backtest();
        let universe = discover_universe(&records, month(2025, 10), OPENING_GBV).unwrap();
        let mut table = generate(&universe, &GeneratorConfig::default()).unwrap();
        let patch = generate_patch(&records, &[month(2025, 10)], &PatchConfig::default()).unwrap();

        assert!(validate(&patch.rules).is_empty());
        table.extend(patch.rules);
        let conflicts = validate(&table);
        // each pin lands inside a tier of the same key
        assert_eq!(conflicts.len(), 2);
        assert!(conflicts.iter().all(|c| c.key.metric == COLL_PRINCIPAL));
    }

    #[test]
    fn missing_observation_leaves_no_file() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("patch.csv");
        let records: Vec<_> = sample_backtest()
            .into_iter()
            .filter(|r| !(r.segment == "PRIME" && r.metric == OPENING_GBV && r.month == month(2025, 11)))
            .collect();
        let source = MockBacktestSource::new().with_table(TABLE, records);

        let err = cli::patch_pipeline(
            &source,
            TABLE,
            &[month(2025, 10), month(2025, 11)],
            &PatchConfig::default(),
            &CsvTableAdapter::new(),
            &out,
        )
        .unwrap_err();
        assert!(matches!(err, MethodologyError::MissingObservation { .. }));
        assert!(!out.exists());
    }

    #[test]
    fn no_drivers_writes_header_only() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("patch.csv");
        let source = MockBacktestSource::new().with_table(TABLE, sample_backtest());

        let patch = cli::patch_pipeline(
            &source,
            TABLE,
            &[month(2024, 1)],
            &PatchConfig::default(),
            &CsvTableAdapter::new(),
            &out,
        )
        .unwrap();
        assert!(patch.rules.is_empty());
        assert_eq!(fs::read_to_string(&out).unwrap().lines().count(), 1);
    }

    #[test]
    fn rerun_is_byte_identical() {
        let records = sample_backtest();
        let months = [month(2025, 10), month(2025, 11)];
        let adapter = CsvTableAdapter::new();
        let render = || {
            let patch = generate_patch(&records, &months, &PatchConfig::default()).unwrap();
            adapter.render_rules(&patch.rules).unwrap()
        };
        assert_eq!(render(), render());
    }
}

mod overlay_pipeline {
    use super::*;

    #[test]
    fn one_multiplier_per_segment() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("overlays.csv");
        let source = MockBacktestSource::new().with_table(TABLE, sample_backtest());

        let overlays = cli::overlay_pipeline(
            &source,
            TABLE,
            COLL_PRINCIPAL,
            month(2025, 10),
            month(2025, 11),
            OverlayScope::Window,
            &CsvTableAdapter::new(),
            &out,
        )
        .unwrap();

        let segments: Vec<&str> = overlays.iter().map(|o| o.segment.as_str()).collect();
        assert_eq!(segments, vec!["NON PRIME", "NRP-S", "PRIME"]);
        assert_relative_eq!(overlays[2].value, 8_900.0 / 9_800.0);

        let text = fs::read_to_string(&out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(
            lines[1],
            "NON PRIME,2025-10-01,2025-11-01,Coll_Principal,Multiply,1.157895,Calibrated from 2025-10..2025-11 backtest Actual/Forecast ratio"
        );
    }

    #[test]
    fn zero_forecast_defaults_to_neutral() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("overlays.csv");
        let records = vec![
            obs("PRIME", "202501", COLL_PRINCIPAL, month(2025, 10), 1000.0, 950.0),
            obs("NON PRIME", "202501", COLL_PRINCIPAL, month(2025, 10), 0.0, 120.0),
        ];
        let source = MockBacktestSource::new().with_table(TABLE, records);

        cli::overlay_pipeline(
            &source,
            TABLE,
            COLL_PRINCIPAL,
            month(2025, 10),
            month(2026, 1),
            OverlayScope::OpenEnded,
            &CsvTableAdapter::new(),
            &out,
        )
        .unwrap();

        let text = fs::read_to_string(&out).unwrap();
        assert!(text.contains("NON PRIME,2025-10-01,,Coll_Principal,Multiply,1.000000,"));
        assert!(text.contains("PRIME,2025-10-01,,Coll_Principal,Multiply,0.950000,"));
    }

    #[test]
    fn empty_window_is_an_error() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("overlays.csv");
        let source = MockBacktestSource::new().with_table(TABLE, sample_backtest());

        let err = cli::overlay_pipeline(
            &source,
            TABLE,
            COLL_PRINCIPAL,
            month(2023, 1),
            month(2023, 6),
            OverlayScope::Window,
            &CsvTableAdapter::new(),
            &out,
        )
        .unwrap_err();
        assert!(matches!(err, MethodologyError::EmptyResult { .. }));
        assert!(!out.exists());
    }
}
