//! Configuration validation.
//!
//! Validates raw config values before any generator runs, so a bad file
//! fails before any source data is read.

use crate::domain::calendar::parse_cohort;
use crate::domain::config::MIN_OPEN_END_MOB;
use crate::domain::error::MethodologyError;
use crate::ports::config_port::ConfigPort;
use std::collections::HashSet;

pub fn validate_generator_config(config: &dyn ConfigPort) -> Result<(), MethodologyError> {
    validate_recent_threshold(config)?;
    validate_flow_metrics(config)?;
    validate_presence_metric(config)?;
    validate_open_end(config)?;
    validate_donors(config)?;
    Ok(())
}

pub fn validate_patch_config(config: &dyn ConfigPort) -> Result<(), MethodologyError> {
    validate_integer(config, "patch", "top_n")?;
    let top_n = config.get_int("patch", "top_n", 1);
    if top_n < 1 {
        return Err(MethodologyError::ConfigInvalid {
            section: "patch".to_string(),
            key: "top_n".to_string(),
            reason: "top_n must be at least 1".to_string(),
        });
    }
    for key in ["metric", "denominator_metric"] {
        if let Some(value) = config.get_string("patch", key) {
            if value.trim().is_empty() {
                return Err(MethodologyError::ConfigInvalid {
                    section: "patch".to_string(),
                    key: key.to_string(),
                    reason: format!("{} must not be empty", key),
                });
            }
        }
    }
    Ok(())
}

fn validate_recent_threshold(config: &dyn ConfigPort) -> Result<(), MethodologyError> {
    match config.get_string("generator", "recent_cohort_threshold") {
        None => Ok(()),
        Some(s) => parse_cohort(s.trim())
            .map(|_| ())
            .map_err(|_| MethodologyError::ConfigInvalid {
                section: "generator".to_string(),
                key: "recent_cohort_threshold".to_string(),
                reason: format!("invalid cohort code {:?}, expected YYYYMM", s),
            }),
    }
}

fn validate_flow_metrics(config: &dyn ConfigPort) -> Result<(), MethodologyError> {
    let Some(list) = config.get_string("generator", "flow_metrics") else {
        return Ok(());
    };
    let mut seen = HashSet::new();
    for token in list.split(',') {
        let metric = token.trim();
        if metric.is_empty() {
            return Err(MethodologyError::ConfigInvalid {
                section: "generator".to_string(),
                key: "flow_metrics".to_string(),
                reason: "empty metric in list".to_string(),
            });
        }
        if !seen.insert(metric) {
            return Err(MethodologyError::ConfigInvalid {
                section: "generator".to_string(),
                key: "flow_metrics".to_string(),
                reason: format!("duplicate metric {}", metric),
            });
        }
    }
    Ok(())
}

fn validate_presence_metric(config: &dyn ConfigPort) -> Result<(), MethodologyError> {
    match config.get_string("generator", "presence_metric") {
        Some(s) if s.trim().is_empty() => Err(MethodologyError::ConfigInvalid {
            section: "generator".to_string(),
            key: "presence_metric".to_string(),
            reason: "presence_metric must not be empty".to_string(),
        }),
        _ => Ok(()),
    }
}

fn validate_integer(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), MethodologyError> {
    match config.get_string(section, key) {
        Some(s) if s.trim().parse::<i64>().is_err() => Err(MethodologyError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: format!("{:?} is not an integer", s),
        }),
        _ => Ok(()),
    }
}

fn validate_open_end(config: &dyn ConfigPort) -> Result<(), MethodologyError> {
    validate_integer(config, "generator", "open_end_mob")?;
    let value = config.get_int("generator", "open_end_mob", i64::from(MIN_OPEN_END_MOB));
    if value < i64::from(MIN_OPEN_END_MOB) || value > i64::from(u32::MAX) {
        return Err(MethodologyError::ConfigInvalid {
            section: "generator".to_string(),
            key: "open_end_mob".to_string(),
            reason: format!("open_end_mob must be at least {}", MIN_OPEN_END_MOB),
        });
    }
    Ok(())
}

fn validate_donors(config: &dyn ConfigPort) -> Result<(), MethodologyError> {
    for (segment, donor) in config.section_entries("donors") {
        if parse_cohort(donor.trim()).is_err() {
            return Err(MethodologyError::ConfigInvalid {
                section: "donors".to_string(),
                key: segment,
                reason: format!("invalid donor cohort {:?}, expected YYYYMM", donor),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn adapter(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    #[test]
    fn empty_config_is_valid() {
        assert!(validate_generator_config(&FileConfigAdapter::empty()).is_ok());
        assert!(validate_patch_config(&FileConfigAdapter::empty()).is_ok());
    }

    #[test]
    fn full_config_is_valid() {
        let config = adapter(
            r#"
[generator]
recent_cohort_threshold = 202601
flow_metrics = Coll_Principal, Coll_Interest
presence_metric = OpeningGBV
open_end_mob = 600

[donors]
PRIME = 202512
NON PRIME = 202511
"#,
        );
        assert!(validate_generator_config(&config).is_ok());
    }

    #[test]
    fn bad_threshold() {
        let config = adapter("[generator]\nrecent_cohort_threshold = 2025-08\n");
        let err = validate_generator_config(&config).unwrap_err();
        assert!(
            matches!(err, MethodologyError::ConfigInvalid { key, .. } if key == "recent_cohort_threshold")
        );
    }

    #[test]
    fn duplicate_flow_metric() {
        let config = adapter("[generator]\nflow_metrics = Coll_Principal,Coll_Principal\n");
        let err = validate_generator_config(&config).unwrap_err();
        assert!(matches!(err, MethodologyError::ConfigInvalid { key, .. } if key == "flow_metrics"));
    }

    #[test]
    fn empty_flow_metric_token() {
        let config = adapter("[generator]\nflow_metrics = Coll_Principal,,InterestRevenue\n");
        assert!(validate_generator_config(&config).is_err());
    }

    #[test]
    fn open_end_too_small() {
        let config = adapter("[generator]\nopen_end_mob = 36\n");
        let err = validate_generator_config(&config).unwrap_err();
        assert!(matches!(err, MethodologyError::ConfigInvalid { key, .. } if key == "open_end_mob"));
    }

    #[test]
    fn bad_donor_cohort_names_segment() {
        let config = adapter("[donors]\nNRP-M = 2025\n");
        let err = validate_generator_config(&config).unwrap_err();
        assert!(matches!(err, MethodologyError::ConfigInvalid { key, .. } if key == "NRP-M"));
    }

    #[test]
    fn non_integer_values_are_rejected() {
        let err = validate_patch_config(&adapter("[patch]\ntop_n = five\n")).unwrap_err();
        assert!(matches!(err, MethodologyError::ConfigInvalid { key, .. } if key == "top_n"));

        let err = validate_generator_config(&adapter("[generator]\nopen_end_mob = 99.5\n")).unwrap_err();
        assert!(matches!(err, MethodologyError::ConfigInvalid { key, .. } if key == "open_end_mob"));
    }

    #[test]
    fn patch_top_n_must_be_positive() {
        let config = adapter("[patch]\ntop_n = 0\n");
        let err = validate_patch_config(&config).unwrap_err();
        assert!(matches!(err, MethodologyError::ConfigInvalid { key, .. } if key == "top_n"));
    }
}
