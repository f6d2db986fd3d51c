//! Planner configuration.
//!
//! Every option has a default, so a configuration file only names what it
//! changes. Options are validated once, before any graph processing.
//!
//! ```yaml
//! max-unit-size: 10
//! parallelism: 3
//! risk-coverage-floor: 0.6
//! gateway-top-fraction: 0.1
//! effort:
//!   hours-per-point: 4.0
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default cap on modules per non-cyclic conversion unit
pub const DEFAULT_MAX_UNIT_SIZE: usize = 10;

/// Default advisory number of units worked on at once
pub const DEFAULT_PARALLELISM: usize = 3;

/// Default coverage below which shortfall counts as risk
pub const DEFAULT_RISK_COVERAGE_FLOOR: f64 = 0.6;

/// Default share of units flagged as gateways
pub const DEFAULT_GATEWAY_TOP_FRACTION: f64 = 0.10;

/// Minimum gateway list size
pub const DEFAULT_GATEWAY_MIN_COUNT: usize = 3;

/// Unit count above which closure computation is flagged as expensive
pub const DEFAULT_UNIT_WARNING_THRESHOLD: usize = 5_000;

/// Configuration for a planning run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct PlannerConfig {
    /// Maximum modules per non-cyclic unit
    pub max_unit_size: usize,

    /// Advisory packing hint for the plan consumer
    pub parallelism: usize,

    /// Coverage fraction below which shortfall contributes to risk
    pub risk_coverage_floor: f64,

    /// Fraction of units flagged as gateways
    pub gateway_top_fraction: f64,

    /// Lower bound on the gateway list size
    pub gateway_min_count: usize,

    /// Warn when the unit count exceeds this
    pub unit_warning_threshold: usize,

    /// Risk scoring weights and floors
    pub risk: RiskConfig,

    /// Effort model parameters
    pub effort: EffortConfig,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_unit_size: DEFAULT_MAX_UNIT_SIZE,
            parallelism: DEFAULT_PARALLELISM,
            risk_coverage_floor: DEFAULT_RISK_COVERAGE_FLOOR,
            gateway_top_fraction: DEFAULT_GATEWAY_TOP_FRACTION,
            gateway_min_count: DEFAULT_GATEWAY_MIN_COUNT,
            unit_warning_threshold: DEFAULT_UNIT_WARNING_THRESHOLD,
            risk: RiskConfig::default(),
            effort: EffortConfig::default(),
        }
    }
}

/// Weights and thresholds for the risk scorer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct RiskConfig {
    /// Weight of the finding-density component
    pub density_weight: f64,

    /// Weight of the data-sensitivity component
    pub sensitivity_weight: f64,

    /// Weight of the coverage-shortfall component
    pub coverage_weight: f64,

    /// Weighted findings per KLOC at which the density component saturates
    pub density_saturation: f64,

    /// Blocked downstream units at which a unit is at least medium risk
    pub medium_floor_dependents: usize,

    /// Blocked downstream units at which a unit is at least high risk
    pub high_floor_dependents: usize,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            density_weight: 0.5,
            sensitivity_weight: 0.25,
            coverage_weight: 0.25,
            density_saturation: 50.0,
            medium_floor_dependents: 10,
            high_floor_dependents: 25,
        }
    }
}

/// Parameters of the default linear effort model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct EffortConfig {
    /// Fixed cost of touching any unit
    pub base_points: f64,

    /// Lines of code per effort point
    pub loc_per_point: f64,

    /// Effort points per severity-weighted finding
    pub points_per_finding: f64,

    /// Hours per effort point
    pub hours_per_point: f64,
}

impl Default for EffortConfig {
    fn default() -> Self {
        Self {
            base_points: 1.0,
            loc_per_point: 200.0,
            points_per_finding: 0.25,
            hours_per_point: 4.0,
        }
    }
}

impl PlannerConfig {
    /// Load configuration from a YAML file.
    ///
    /// The result is not validated; call [`PlannerConfig::validate`] after
    /// applying any overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid YAML.
    pub fn load(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|source| Error::read_file(path, source))?;
        serde_yaml::from_str(&content).map_err(|source| Error::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Check every option is in range.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` naming the first offending option.
    pub fn validate(&self) -> Result<()> {
        if self.max_unit_size < 1 {
            return Err(Error::Configuration(
                "max-unit-size must be at least 1".to_string(),
            ));
        }
        if self.parallelism < 1 {
            return Err(Error::Configuration(
                "parallelism must be at least 1".to_string(),
            ));
        }
        check_fraction("risk-coverage-floor", self.risk_coverage_floor)?;
        check_fraction("gateway-top-fraction", self.gateway_top_fraction)?;

        let risk = &self.risk;
        for (name, weight) in [
            ("risk.density-weight", risk.density_weight),
            ("risk.sensitivity-weight", risk.sensitivity_weight),
            ("risk.coverage-weight", risk.coverage_weight),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(Error::Configuration(format!(
                    "{name} must be a non-negative number, got {weight}"
                )));
            }
        }
        if risk.density_weight + risk.sensitivity_weight + risk.coverage_weight <= 0.0 {
            return Err(Error::Configuration(
                "at least one risk weight must be positive".to_string(),
            ));
        }
        check_positive("risk.density-saturation", risk.density_saturation)?;
        if risk.high_floor_dependents < risk.medium_floor_dependents {
            return Err(Error::Configuration(format!(
                "risk.high-floor-dependents ({}) cannot be below risk.medium-floor-dependents ({})",
                risk.high_floor_dependents, risk.medium_floor_dependents
            )));
        }

        let effort = &self.effort;
        check_positive("effort.loc-per-point", effort.loc_per_point)?;
        check_positive("effort.hours-per-point", effort.hours_per_point)?;
        if !effort.base_points.is_finite() || effort.base_points < 0.0 {
            return Err(Error::Configuration(
                "effort.base-points must be a non-negative number".to_string(),
            ));
        }
        if !effort.points_per_finding.is_finite() || effort.points_per_finding < 0.0 {
            return Err(Error::Configuration(
                "effort.points-per-finding must be a non-negative number".to_string(),
            ));
        }

        Ok(())
    }
}

fn check_fraction(name: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(Error::Configuration(format!(
            "{name} must be a fraction in [0, 1], got {value}"
        )))
    }
}

fn check_positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(Error::Configuration(format!(
            "{name} must be a positive number, got {value}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn defaults_are_valid() {
        let config = PlannerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_unit_size, 10);
        assert_eq!(config.parallelism, 3);
    }

    #[rstest]
    #[case::zero_unit_size(PlannerConfig { max_unit_size: 0, ..PlannerConfig::default() }, "max-unit-size")]
    #[case::zero_parallelism(PlannerConfig { parallelism: 0, ..PlannerConfig::default() }, "parallelism")]
    #[case::floor_above_one(PlannerConfig { risk_coverage_floor: 1.5, ..PlannerConfig::default() }, "risk-coverage-floor")]
    #[case::negative_fraction(PlannerConfig { gateway_top_fraction: -0.1, ..PlannerConfig::default() }, "gateway-top-fraction")]
    #[case::nan_fraction(PlannerConfig { gateway_top_fraction: f64::NAN, ..PlannerConfig::default() }, "gateway-top-fraction")]
    fn invalid_options_are_rejected(#[case] config: PlannerConfig, #[case] option: &str) {
        let err = config.validate().unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains(option), "{err}");
    }

    #[test]
    fn all_zero_risk_weights_are_rejected() {
        let config = PlannerConfig {
            risk: RiskConfig {
                density_weight: 0.0,
                sensitivity_weight: 0.0,
                coverage_weight: 0.0,
                ..RiskConfig::default()
            },
            ..PlannerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_loc_per_point_is_rejected() {
        let config = PlannerConfig {
            effort: EffortConfig {
                loc_per_point: 0.0,
                ..EffortConfig::default()
            },
            ..PlannerConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("effort.loc-per-point"));
    }

    #[test]
    fn load_fills_missing_fields_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("waveplan.yaml");
        std::fs::write(&path, "max-unit-size: 4\neffort:\n  hours-per-point: 2.5\n").unwrap();

        let config = PlannerConfig::load(&path).unwrap();

        assert_eq!(config.max_unit_size, 4);
        assert_eq!(config.parallelism, DEFAULT_PARALLELISM);
        assert!((config.effort.hours_per_point - 2.5).abs() < f64::EPSILON);
        assert!((config.effort.loc_per_point - 200.0).abs() < f64::EPSILON);
    }

    #[test]
    fn load_names_unreadable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.yaml");

        let err = PlannerConfig::load(&path).unwrap_err();

        assert!(matches!(err, Error::ReadFile { .. }));
        assert!(err.to_string().contains("missing.yaml"));
    }

    #[test]
    fn load_rejects_unknown_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("waveplan.yaml");
        std::fs::write(&path, "max_unit_sise: 4\n").unwrap();

        let err = PlannerConfig::load(&path).unwrap_err();
        assert!(matches!(err, Error::Yaml { .. }));
    }
}
