//! Effort estimation.
//!
//! Unit weight is an effort proxy in abstract points. It drives the critical
//! path and the per-unit estimates in the plan. The model is a trait so a
//! consumer with calibrated data can plug in their own formula.

use crate::config::EffortConfig;
use crate::units::UnitMetrics;

/// Maps unit metrics to an effort weight.
///
/// Implementations must be pure and return a finite, strictly positive
/// weight that does not decrease when lines of code or findings grow.
pub trait EffortModel {
    /// Effort weight of a unit in points.
    fn weight(&self, metrics: &UnitMetrics) -> f64;

    /// Hours implied by a weight.
    fn hours(&self, weight: f64) -> f64;
}

/// Default model: a fixed cost plus terms linear in LOC and weighted findings
#[derive(Debug, Clone, PartialEq)]
pub struct LinearEffort {
    base_points: f64,
    loc_per_point: f64,
    points_per_finding: f64,
    hours_per_point: f64,
}

impl LinearEffort {
    /// Build the model from validated configuration.
    #[must_use]
    pub fn from_config(config: &EffortConfig) -> Self {
        Self {
            base_points: config.base_points,
            loc_per_point: config.loc_per_point,
            points_per_finding: config.points_per_finding,
            hours_per_point: config.hours_per_point,
        }
    }
}

impl Default for LinearEffort {
    fn default() -> Self {
        Self::from_config(&EffortConfig::default())
    }
}

impl EffortModel for LinearEffort {
    #[allow(clippy::cast_precision_loss)]
    fn weight(&self, metrics: &UnitMetrics) -> f64 {
        self.base_points
            + metrics.loc as f64 / self.loc_per_point
            + metrics.findings.weighted() as f64 * self.points_per_finding
    }

    fn hours(&self, weight: f64) -> f64 {
        weight * self.hours_per_point
    }
}

/// Round to a fixed number of decimal places for stable plan output.
#[must_use]
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FindingCounts, Severity};
    use rstest::rstest;

    fn metrics(loc: u64, critical: u64) -> UnitMetrics {
        let mut findings = FindingCounts::new();
        findings.add(Severity::Critical, critical);
        UnitMetrics {
            modules: 1,
            loc,
            findings,
        }
    }

    #[rstest]
    #[case::empty(0, 0, 1.0)]
    #[case::loc_only(400, 0, 3.0)]
    #[case::findings_only(0, 2, 6.0)]
    #[case::both(200, 1, 4.5)]
    fn linear_effort_defaults(#[case] loc: u64, #[case] critical: u64, #[case] expected: f64) {
        let weight = LinearEffort::default().weight(&metrics(loc, critical));
        assert!((weight - expected).abs() < 1e-9, "got {weight}");
    }

    #[test]
    fn weight_grows_with_loc_and_findings() {
        let model = LinearEffort::default();
        let small = model.weight(&metrics(100, 0));
        assert!(model.weight(&metrics(101, 0)) > small);
        assert!(model.weight(&metrics(100, 1)) > small);
    }

    #[test]
    fn hours_follow_configured_rate() {
        let model = LinearEffort::from_config(&EffortConfig {
            hours_per_point: 2.5,
            ..EffortConfig::default()
        });
        assert!((model.hours(4.0) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn round_to_rounds_half_away_from_zero() {
        assert!((round_to(1.25, 1) - 1.3).abs() < 1e-9);
        assert!((round_to(7.04, 1) - 7.0).abs() < 1e-9);
        assert!((round_to(0.12345, 3) - 0.123).abs() < 1e-9);
    }
}
