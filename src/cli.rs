//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_backtest_adapter::CsvBacktestAdapter;
use crate::adapters::csv_table_adapter::CsvTableAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::calendar::{cohort_value, format_month, parse_month, parse_months};
use crate::domain::calibration::{overlays_from_totals, segment_totals, OverlayScope};
use crate::domain::config::{
    default_flow_metrics, GeneratorConfig, PatchConfig, DEFAULT_SOURCE_TABLE,
};
use crate::domain::config_validation::{validate_generator_config, validate_patch_config};
use crate::domain::error::MethodologyError;
use crate::domain::from_scratch::{discover_universe, generate};
use crate::domain::overlap::{validate, Conflict};
use crate::domain::overlay::OverlayRecord;
use crate::domain::patch::{generate_patch, Patch};
use crate::domain::record::{COLL_PRINCIPAL, OPENING_GBV};
use crate::domain::rule::RuleRow;
use crate::ports::backtest_port::BacktestSource;
use crate::ports::config_port::ConfigPort;
use crate::ports::table_port::TablePort;

/// Exit status when a rule table has overlapping rules.
pub const EXIT_CONFLICTS: u8 = 4;

#[derive(Parser, Debug)]
#[command(name = "methodology", about = "Cohort rate methodology generator and validator")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check rule tables for overlapping MOB intervals
    Validate {
        #[arg(required = true)]
        tables: Vec<PathBuf>,
        /// Validate all tables together as one rule set
        #[arg(long)]
        merge: bool,
        #[arg(long, default_value_t = 20)]
        max_report: usize,
    },
    /// Generate a regime-based rule set for every live segment/cohort
    FromScratch {
        #[arg(short, long)]
        source: PathBuf,
        /// Reference reporting month (YYYY-MM)
        #[arg(short, long)]
        month: String,
        #[arg(short, long)]
        out: PathBuf,
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long)]
        table: Option<String>,
    },
    /// Pin Manual rates for the worst backtest variance drivers
    Patch {
        #[arg(short, long)]
        source: PathBuf,
        /// Comma-separated target months (YYYY-MM)
        #[arg(long)]
        months: String,
        #[arg(long)]
        top_n: Option<usize>,
        #[arg(long)]
        metric: Option<String>,
        #[arg(short, long)]
        out: PathBuf,
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long)]
        table: Option<String>,
    },
    /// Calibrate segment-level multiplier overlays
    Overlay {
        #[arg(short, long)]
        source: PathBuf,
        #[arg(long)]
        month_start: String,
        #[arg(long)]
        month_end: String,
        #[arg(long)]
        metric: Option<String>,
        /// Leave ForecastMonth_End empty
        #[arg(long)]
        open_ended: bool,
        #[arg(short, long)]
        out: PathBuf,
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long)]
        table: Option<String>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Validate {
            tables,
            merge,
            max_report,
        } => run_validate(&tables, merge, max_report),
        Command::FromScratch {
            source,
            month,
            out,
            config,
            table,
        } => run_from_scratch(&source, &month, &out, config.as_ref(), table.as_deref()),
        Command::Patch {
            source,
            months,
            top_n,
            metric,
            out,
            config,
            table,
        } => run_patch(
            &source,
            &months,
            top_n,
            metric.as_deref(),
            &out,
            config.as_ref(),
            table.as_deref(),
        ),
        Command::Overlay {
            source,
            month_start,
            month_end,
            metric,
            open_ended,
            out,
            config,
            table,
        } => run_overlay(
            &source,
            &month_start,
            &month_end,
            metric.as_deref(),
            open_ended,
            &out,
            config.as_ref(),
            table.as_deref(),
        ),
    }
}

fn fail(err: &MethodologyError) -> ExitCode {
    eprintln!("error: {err}");
    ExitCode::from(err)
}

/// Load the INI file if given; without one every setting takes its default.
pub fn load_config(path: Option<&PathBuf>) -> Result<FileConfigAdapter, ExitCode> {
    let Some(path) = path else {
        return Ok(FileConfigAdapter::empty());
    };
    eprintln!("Loading config from {}", path.display());
    FileConfigAdapter::from_file(path).map_err(|e| {
        fail(&MethodologyError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        })
    })
}

pub fn build_generator_config(adapter: &dyn ConfigPort) -> Result<GeneratorConfig, MethodologyError> {
    validate_generator_config(adapter)?;
    let defaults = GeneratorConfig::default();

    let recent_threshold = match adapter.get_string("generator", "recent_cohort_threshold") {
        Some(s) => cohort_value(s.trim()).map_err(|e| MethodologyError::ConfigInvalid {
            section: "generator".into(),
            key: "recent_cohort_threshold".into(),
            reason: e.to_string(),
        })?,
        None => defaults.recent_threshold,
    };

    let donors = adapter.section_entries("donors");
    let donor_map = if donors.is_empty() {
        defaults.donor_map
    } else {
        donors
            .into_iter()
            .map(|(segment, donor)| (segment.trim().to_string(), donor.trim().to_string()))
            .collect()
    };

    let flow_metrics = match adapter.get_string("generator", "flow_metrics") {
        Some(list) => list.split(',').map(|m| m.trim().to_string()).collect(),
        None => default_flow_metrics(),
    };

    let presence_metric = adapter
        .get_string("generator", "presence_metric")
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| OPENING_GBV.to_string());

    let open_end_mob = adapter.get_int("generator", "open_end_mob", i64::from(defaults.open_end_mob));

    Ok(GeneratorConfig {
        recent_threshold,
        donor_map,
        flow_metrics,
        presence_metric,
        open_end_mob: open_end_mob as u32,
    })
}

pub fn build_patch_config(
    adapter: &dyn ConfigPort,
    metric_override: Option<&str>,
    top_n_override: Option<usize>,
) -> Result<PatchConfig, MethodologyError> {
    validate_patch_config(adapter)?;
    let defaults = PatchConfig::default();

    let metric = metric_override
        .map(str::to_string)
        .or_else(|| adapter.get_string("patch", "metric"))
        .map(|s| s.trim().to_string())
        .unwrap_or(defaults.metric);
    let denominator_metric = adapter
        .get_string("patch", "denominator_metric")
        .map(|s| s.trim().to_string())
        .unwrap_or(defaults.denominator_metric);
    let top_n = match top_n_override {
        Some(n) => n,
        None => adapter.get_int("patch", "top_n", defaults.top_n as i64) as usize,
    };
    if top_n == 0 {
        return Err(MethodologyError::ConfigInvalid {
            section: "patch".into(),
            key: "top_n".into(),
            reason: "top_n must be at least 1".into(),
        });
    }

    Ok(PatchConfig {
        metric,
        denominator_metric,
        top_n,
    })
}

pub fn resolve_table(table_override: Option<&str>, config: &dyn ConfigPort) -> String {
    table_override
        .map(str::to_string)
        .or_else(|| config.get_string("source", "table"))
        .unwrap_or_else(|| DEFAULT_SOURCE_TABLE.to_string())
}

fn parse_month_arg(value: &str, name: &str) -> Result<NaiveDate, ExitCode> {
    parse_month(value).ok_or_else(|| {
        fail(&MethodologyError::ConfigInvalid {
            section: "args".into(),
            key: name.into(),
            reason: format!("invalid month {:?} (expected YYYY-MM)", value),
        })
    })
}

/// Fixed-point amount with comma thousands separators: `-1,234,567.89`.
pub fn format_amount(value: f64, decimals: usize) -> String {
    let text = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match text.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (text.as_str(), None),
    };

    let mut result = String::new();
    if value < 0.0 && text.bytes().any(|b| b.is_ascii_digit() && b != b'0') {
        result.push('-');
    }
    let digits: Vec<char> = int_part.chars().collect();
    for (i, c) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    if let Some(frac) = frac_part {
        result.push('.');
        result.push_str(frac);
    }
    result
}

/// Validation result for one rule table (or the merged set).
#[derive(Debug)]
pub struct ValidationReport {
    pub label: String,
    pub rows: Vec<RuleRow>,
    pub conflicts: Vec<Conflict>,
}

impl ValidationReport {
    pub fn passed(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// `(key) line A [s-e] vs line B [s-e]`; merged reports prefix the file.
    pub fn describe(&self, conflict: &Conflict, merged: bool) -> String {
        let locate = |position: usize| {
            let row = &self.rows[position];
            if merged {
                format!("{}:{}", row.source, row.line)
            } else {
                format!("line {}", row.line)
            }
        };
        format!(
            "{} {} [{}-{}] vs {} [{}-{}]",
            conflict.key,
            locate(conflict.first.position),
            conflict.first.mob_start,
            conflict.first.mob_end,
            locate(conflict.second.position),
            conflict.second.mob_start,
            conflict.second.mob_end,
        )
    }
}

/// Read and validate each table on its own, or all of them as one set.
pub fn validate_tables(
    tables: &dyn TablePort,
    paths: &[PathBuf],
    merge: bool,
) -> Result<Vec<ValidationReport>, MethodologyError> {
    let mut reports = Vec::new();
    let mut merged_rows = Vec::new();

    for path in paths {
        let rows = tables.read_rules(path)?;
        if merge {
            merged_rows.extend(rows);
        } else {
            let conflicts = validate(&rows);
            reports.push(ValidationReport {
                label: path.display().to_string(),
                rows,
                conflicts,
            });
        }
    }

    if merge {
        let conflicts = validate(&merged_rows);
        let label = paths
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(" + ");
        reports.push(ValidationReport {
            label,
            rows: merged_rows,
            conflicts,
        });
    }
    Ok(reports)
}

fn run_validate(paths: &[PathBuf], merge: bool, max_report: usize) -> ExitCode {
    let reports = match validate_tables(&CsvTableAdapter::new(), paths, merge) {
        Ok(r) => r,
        Err(e) => return fail(&e),
    };

    let mut failed = false;
    for report in &reports {
        println!(
            "{}: {} rows, {} overlap(s) within identical Segment/Cohort/Metric keys",
            report.label,
            report.rows.len(),
            report.conflicts.len()
        );
        for conflict in report.conflicts.iter().take(max_report) {
            println!("  {}", report.describe(conflict, merge));
        }
        if report.conflicts.len() > max_report {
            println!("  ...");
        }
        failed |= !report.passed();
    }

    if failed {
        ExitCode::from(EXIT_CONFLICTS)
    } else {
        ExitCode::SUCCESS
    }
}

/// Discover the universe in `month`, generate, and write. Returns rows written.
pub fn from_scratch_pipeline(
    source: &dyn BacktestSource,
    table: &str,
    month: NaiveDate,
    config: &GeneratorConfig,
    tables: &dyn TablePort,
    out: &Path,
) -> Result<usize, MethodologyError> {
    eprintln!("Loading {} for {}", table, format_month(month));
    let records = source.read_table(table, Some(month))?;
    let universe = discover_universe(&records, month, &config.presence_metric)?;
    eprintln!(
        "  {} segment/cohort combinations with {}",
        universe.len(),
        config.presence_metric
    );

    let rules = generate(&universe, config)?;
    tables.write_rules(&rules, out)?;
    eprintln!(
        "Wrote {} with {} rows from {} segment/cohort combinations",
        out.display(),
        rules.len(),
        universe.len()
    );
    Ok(rules.len())
}

fn run_from_scratch(
    source: &Path,
    month: &str,
    out: &Path,
    config_path: Option<&PathBuf>,
    table: Option<&str>,
) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let config = match build_generator_config(&adapter) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };
    let month = match parse_month_arg(month, "month") {
        Ok(m) => m,
        Err(code) => return code,
    };
    let table = resolve_table(table, &adapter);
    let backtest = CsvBacktestAdapter::new(source.to_path_buf());

    match from_scratch_pipeline(&backtest, &table, month, &config, &CsvTableAdapter::new(), out) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => fail(&e),
    }
}

/// Rank drivers over `months`, pin their rates, and write the patch.
pub fn patch_pipeline(
    source: &dyn BacktestSource,
    table: &str,
    months: &[NaiveDate],
    config: &PatchConfig,
    tables: &dyn TablePort,
    out: &Path,
) -> Result<Patch, MethodologyError> {
    eprintln!("Loading {}", table);
    let records = source.read_table(table, None)?;
    let patch = generate_patch(&records, months, config)?;

    if patch.drivers.is_empty() {
        eprintln!(
            "warning: no net-negative {} variance drivers in the selected months",
            config.metric
        );
    }
    tables.write_rules(&patch.rules, out)?;
    eprintln!(
        "Wrote {} with {} rows ({} cohorts x {} month(s))",
        out.display(),
        patch.rules.len(),
        patch.drivers.len(),
        months.len()
    );
    for driver in &patch.drivers {
        println!(
            "  {} {} total variance={}",
            driver.segment,
            driver.cohort,
            format_amount(driver.total_variance, 2)
        );
    }
    Ok(patch)
}

fn run_patch(
    source: &Path,
    months: &str,
    top_n: Option<usize>,
    metric: Option<&str>,
    out: &Path,
    config_path: Option<&PathBuf>,
    table: Option<&str>,
) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let config = match build_patch_config(&adapter, metric, top_n) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };
    let months = match parse_months(months) {
        Ok(m) => m,
        Err(e) => {
            return fail(&MethodologyError::ConfigInvalid {
                section: "args".into(),
                key: "months".into(),
                reason: e.to_string(),
            });
        }
    };
    let table = resolve_table(table, &adapter);
    let backtest = CsvBacktestAdapter::new(source.to_path_buf());

    match patch_pipeline(&backtest, &table, &months, &config, &CsvTableAdapter::new(), out) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => fail(&e),
    }
}

/// Calibrate overlays over `[start, end]` and write them.
///
/// A window with no observations of `metric` is an error: an empty overlay
/// table would silently drop every existing calibration.
#[allow(clippy::too_many_arguments)]
pub fn overlay_pipeline(
    source: &dyn BacktestSource,
    table: &str,
    metric: &str,
    start: NaiveDate,
    end: NaiveDate,
    scope: OverlayScope,
    tables: &dyn TablePort,
    out: &Path,
) -> Result<Vec<OverlayRecord>, MethodologyError> {
    eprintln!("Loading {}", table);
    let records = source.read_table(table, None)?;
    let totals = segment_totals(&records, metric, start, end);
    let overlays = overlays_from_totals(&totals, metric, start, end, scope);
    if overlays.is_empty() {
        return Err(MethodologyError::EmptyResult {
            what: format!(
                "no {} observations between {} and {}",
                metric,
                format_month(start),
                format_month(end)
            ),
        });
    }

    tables.write_overlays(&overlays, out)?;
    eprintln!(
        "Wrote {} with {} segment multipliers",
        out.display(),
        overlays.len()
    );
    for (segment, t) in &totals {
        println!(
            "  {:10} Forecast={} Actual={} Ratio={:.4}",
            segment,
            format_amount(t.forecast, 0),
            format_amount(t.actual, 0),
            t.ratio()
        );
    }
    Ok(overlays)
}

#[allow(clippy::too_many_arguments)]
fn run_overlay(
    source: &Path,
    month_start: &str,
    month_end: &str,
    metric: Option<&str>,
    open_ended: bool,
    out: &Path,
    config_path: Option<&PathBuf>,
    table: Option<&str>,
) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let start = match parse_month_arg(month_start, "month_start") {
        Ok(m) => m,
        Err(code) => return code,
    };
    let end = match parse_month_arg(month_end, "month_end") {
        Ok(m) => m,
        Err(code) => return code,
    };
    if start > end {
        return fail(&MethodologyError::ConfigInvalid {
            section: "args".into(),
            key: "month_start".into(),
            reason: "month_start must not be after month_end".into(),
        });
    }

    let metric = metric
        .map(str::to_string)
        .or_else(|| adapter.get_string("overlay", "metric"))
        .unwrap_or_else(|| COLL_PRINCIPAL.to_string());
    let scope = if open_ended || adapter.get_bool("overlay", "open_ended", false) {
        OverlayScope::OpenEnded
    } else {
        OverlayScope::Window
    };
    let table = resolve_table(table, &adapter);
    let backtest = CsvBacktestAdapter::new(source.to_path_buf());

    match overlay_pipeline(
        &backtest,
        &table,
        &metric,
        start,
        end,
        scope,
        &CsvTableAdapter::new(),
        out,
    ) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => fail(&e),
    }
}
