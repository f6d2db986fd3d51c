//! Risk scoring for conversion units.
//!
//! The score is the weighted mean of three components, each in `[0, 1]`:
//!
//! | Component | Value | Known when |
//! |-----------|-------|------------|
//! | density | highest member finding density over the saturation point, capped at 1 | always |
//! | sensitivity | 1 if any member handles binary protocols, serialization or ambiguous encodings | some member declares tags |
//! | coverage | relative shortfall of LOC-weighted coverage below the floor; 1 for `no-tests` | some member reports coverage or is tagged `no-tests` |
//!
//! Unknown components are left out of the mean together with their weight,
//! so a unit with neither coverage nor tags gets its density score alone.
//! The score maps onto [`RiskLevel`] by quarter, and units that block many
//! others downstream are raised to a floor level.
//!
//! Missing data never lowers risk silently. A unit without coverage or tags
//! is scored on what is known and carries a [`RiskFlag`] saying what was
//! missing.

use crate::config::RiskConfig;
use crate::domain::{ModuleNode, RiskLevel};
use crate::effort::round_to;
use crate::graph::{ModuleGraph, UnitGraph};
use crate::units::ConversionUnit;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Degraded-input marker attached to a unit's risk
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RiskFlag {
    /// No member reports coverage
    UnknownCoverage,

    /// Some members report coverage and some don't
    PartialCoverage,

    /// No member declares risk tags, not even an empty list
    UnknownRiskTags,
}

impl RiskFlag {
    /// Human-readable description used in logs and summaries.
    #[must_use]
    pub fn describe(self) -> &'static str {
        match self {
            Self::UnknownCoverage => "unknown coverage",
            Self::PartialCoverage => "partial coverage",
            Self::UnknownRiskTags => "unknown risk tags",
        }
    }
}

impl fmt::Display for RiskFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownCoverage => write!(f, "unknown-coverage"),
            Self::PartialCoverage => write!(f, "partial-coverage"),
            Self::UnknownRiskTags => write!(f, "unknown-risk-tags"),
        }
    }
}

/// Component values a score was computed from; `None` marks unknown input
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct RiskComponents {
    /// Finding density component
    pub density: f64,

    /// Data sensitivity component
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensitivity: Option<f64>,

    /// Coverage shortfall component
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coverage: Option<f64>,
}

/// Risk of one unit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskAssessment {
    /// Ordinal level after dependents floors
    pub level: RiskLevel,

    /// Weighted score in `[0, 1]`, rounded to three decimals
    pub score: f64,

    /// Inputs to the score
    pub components: RiskComponents,

    /// LOC-weighted coverage of the members that report it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coverage: Option<f64>,

    /// Units directly depending on this one
    pub dependents: usize,

    /// Units transitively blocked by this one; drives the floor level
    pub downstream: usize,

    /// What was missing from the input
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<RiskFlag>,
}

/// Scores units against a configuration.
#[derive(Debug, Clone)]
pub struct RiskScorer<'a> {
    config: &'a RiskConfig,
    coverage_floor: f64,
}

impl<'a> RiskScorer<'a> {
    /// Create a scorer.
    #[must_use]
    pub fn new(config: &'a RiskConfig, coverage_floor: f64) -> Self {
        Self {
            config,
            coverage_floor,
        }
    }

    /// Score every unit; `result[i]` belongs to `units[i]`.
    ///
    /// `closures[i]` is the downstream closure size of `units[i]`.
    #[must_use]
    pub fn score_all(
        &self,
        graph: &ModuleGraph,
        units: &[ConversionUnit],
        unit_graph: &UnitGraph,
        closures: &[usize],
    ) -> Vec<RiskAssessment> {
        let assessments: Vec<_> = unit_graph
            .units()
            .map(|u| {
                let members: Vec<&ModuleNode> =
                    units[u.0].nodes().iter().map(|&n| &graph[n]).collect();
                let assessment =
                    self.score(&members, unit_graph.dependents(u).len(), closures[u.0]);
                for flag in &assessment.flags {
                    tracing::info!(unit = %units[u.0].name, "risk: {}", flag.describe());
                }
                assessment
            })
            .collect();

        tracing::info!(
            units = assessments.len(),
            high = assessments
                .iter()
                .filter(|a| a.level >= RiskLevel::High)
                .count(),
            flagged = assessments.iter().filter(|a| !a.flags.is_empty()).count(),
            "Scored unit risk"
        );

        assessments
    }

    /// Score one unit from its members, its direct dependent count and the
    /// number of units it blocks transitively.
    #[must_use]
    pub fn score(
        &self,
        members: &[&ModuleNode],
        dependents: usize,
        downstream: usize,
    ) -> RiskAssessment {
        let density = members
            .iter()
            .map(|m| m.finding_density())
            .fold(0.0, f64::max);
        let density = (density / self.config.density_saturation).min(1.0);

        let tags_known = members.iter().any(|m| m.risk_tags.is_some());
        let sensitivity = tags_known.then(|| {
            if members.iter().any(|m| m.is_data_sensitive()) {
                1.0
            } else {
                0.0
            }
        });

        let coverage = weighted_coverage(members);
        let shortfall = if members.iter().any(|m| m.has_no_tests()) {
            Some(1.0)
        } else {
            coverage.map(|c| self.shortfall(c))
        };

        let components = RiskComponents {
            density,
            sensitivity,
            coverage: shortfall,
        };
        let score = round_to(self.combine(components), 3);

        // The closure always includes the direct dependents
        let blocked = downstream.max(dependents);
        let mut level = level_for_score(score);
        if blocked >= self.config.high_floor_dependents {
            level = level.max(RiskLevel::High);
        } else if blocked >= self.config.medium_floor_dependents {
            level = level.max(RiskLevel::Medium);
        }

        RiskAssessment {
            level,
            score,
            components,
            coverage: coverage.map(|c| round_to(c, 3)),
            dependents,
            downstream,
            flags: flags_for(members),
        }
    }

    fn shortfall(&self, coverage: f64) -> f64 {
        if coverage < self.coverage_floor {
            (self.coverage_floor - coverage) / self.coverage_floor
        } else {
            0.0
        }
    }

    /// Weighted mean over the known components.
    ///
    /// Zero when no known component carries weight.
    fn combine(&self, c: RiskComponents) -> f64 {
        let known = [
            (self.config.density_weight, Some(c.density)),
            (self.config.sensitivity_weight, c.sensitivity),
            (self.config.coverage_weight, c.coverage),
        ];
        let (weights, sum) = known
            .iter()
            .filter_map(|&(weight, value)| value.map(|v| (weight, weight * v)))
            .fold((0.0, 0.0), |(w, s), (weight, term)| (w + weight, s + term));
        if weights <= 0.0 {
            return 0.0;
        }
        (sum / weights).clamp(0.0, 1.0)
    }
}

/// Map a score onto the ordinal scale.
#[must_use]
pub fn level_for_score(score: f64) -> RiskLevel {
    if score < 0.25 {
        RiskLevel::Low
    } else if score < 0.5 {
        RiskLevel::Medium
    } else if score < 0.75 {
        RiskLevel::High
    } else {
        RiskLevel::Critical
    }
}

/// Coverage averaged over the members that report it, weighted by LOC.
///
/// Falls back to a plain mean when every reporting member has zero lines.
#[allow(clippy::cast_precision_loss)]
fn weighted_coverage(members: &[&ModuleNode]) -> Option<f64> {
    let known: Vec<(f64, u64)> = members
        .iter()
        .filter_map(|m| m.coverage.map(|c| (c, m.loc)))
        .collect();
    if known.is_empty() {
        return None;
    }
    let total_loc: u64 = known.iter().map(|(_, loc)| loc).sum();
    if total_loc == 0 {
        return Some(known.iter().map(|(c, _)| c).sum::<f64>() / known.len() as f64);
    }
    Some(
        known
            .iter()
            .map(|(c, loc)| c * *loc as f64)
            .sum::<f64>()
            / total_loc as f64,
    )
}

fn flags_for(members: &[&ModuleNode]) -> Vec<RiskFlag> {
    let mut flags = Vec::new();
    let with_coverage = members.iter().filter(|m| m.coverage.is_some()).count();
    if with_coverage == 0 {
        flags.push(RiskFlag::UnknownCoverage);
    } else if with_coverage < members.len() {
        flags.push(RiskFlag::PartialCoverage);
    }
    if members.iter().all(|m| m.risk_tags.is_none()) {
        flags.push(RiskFlag::UnknownRiskTags);
    }
    flags
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FindingCounts, ModuleId, RiskTag, Severity};
    use rstest::rstest;

    fn module(loc: u64, coverage: Option<f64>, tags: Option<Vec<RiskTag>>) -> ModuleNode {
        ModuleNode {
            id: ModuleId::new("m.py"),
            loc,
            findings: FindingCounts::new(),
            coverage,
            risk_tags: tags,
            fan_in: 0,
            fan_out: 0,
        }
    }

    fn with_findings(mut node: ModuleNode, severity: Severity, count: u64) -> ModuleNode {
        node.findings.add(severity, count);
        node
    }

    fn score(members: &[ModuleNode], dependents: usize) -> RiskAssessment {
        score_blocking(members, dependents, dependents)
    }

    fn score_blocking(
        members: &[ModuleNode],
        dependents: usize,
        downstream: usize,
    ) -> RiskAssessment {
        let config = RiskConfig::default();
        let refs: Vec<&ModuleNode> = members.iter().collect();
        RiskScorer::new(&config, 0.6).score(&refs, dependents, downstream)
    }

    #[rstest]
    #[case::zero(0.0, RiskLevel::Low)]
    #[case::just_below_medium(0.249, RiskLevel::Low)]
    #[case::medium(0.25, RiskLevel::Medium)]
    #[case::high(0.5, RiskLevel::High)]
    #[case::critical(0.75, RiskLevel::Critical)]
    #[case::max(1.0, RiskLevel::Critical)]
    fn score_thresholds(#[case] score: f64, #[case] expected: RiskLevel) {
        assert_eq!(level_for_score(score), expected);
    }

    #[test]
    fn clean_well_covered_module_is_low() {
        let a = score(&[module(100, Some(0.9), Some(vec![]))], 0);

        assert_eq!(a.level, RiskLevel::Low);
        assert!(a.score.abs() < 1e-9);
        assert!(a.flags.is_empty());
    }

    #[test]
    fn density_saturates_at_one() {
        // 10 critical findings in 100 lines = 1000 weighted per KLOC
        let m = with_findings(module(100, Some(1.0), Some(vec![])), Severity::Critical, 10);
        let a = score(&[m], 0);

        assert!((a.components.density - 1.0).abs() < 1e-9);
        assert!((a.score - 0.5).abs() < 1e-9);
        assert_eq!(a.level, RiskLevel::High);
    }

    #[test]
    fn density_uses_the_worst_member() {
        // 25 weighted per KLOC is half the saturation point
        let hot = with_findings(module(1000, Some(1.0), Some(vec![])), Severity::High, 5);
        let cold = module(1000, Some(1.0), Some(vec![]));
        let a = score(&[cold, hot], 0);

        assert!((a.components.density - 0.5).abs() < 1e-9);
    }

    #[test]
    fn sensitive_tag_sets_sensitivity() {
        let a = score(
            &[module(100, Some(1.0), Some(vec![RiskTag::Serialization]))],
            0,
        );
        assert_eq!(a.components.sensitivity, Some(1.0));
        assert!((a.score - 0.25).abs() < 1e-9);
        assert_eq!(a.level, RiskLevel::Medium);
    }

    #[test]
    fn coverage_shortfall_is_relative_to_floor() {
        let a = score(&[module(100, Some(0.3), Some(vec![]))], 0);
        assert_eq!(a.components.coverage, Some(0.5));
    }

    #[test]
    fn coverage_is_loc_weighted() {
        let a = score(
            &[
                module(300, Some(0.0), Some(vec![])),
                module(100, Some(1.0), Some(vec![])),
            ],
            0,
        );
        assert_eq!(a.coverage, Some(0.25));
    }

    #[test]
    fn no_tests_tag_forces_full_shortfall() {
        let a = score(&[module(100, Some(0.9), Some(vec![RiskTag::NoTests]))], 0);
        assert_eq!(a.components.coverage, Some(1.0));
    }

    #[test]
    fn missing_data_is_flagged_not_hidden() {
        let a = score(&[module(100, None, None)], 0);

        assert_eq!(a.flags, [RiskFlag::UnknownCoverage, RiskFlag::UnknownRiskTags]);
        assert_eq!(a.coverage, None);
        assert_eq!(a.components.coverage, None);
        assert_eq!(a.components.sensitivity, None);
    }

    #[test]
    fn unknown_inputs_leave_density_alone() {
        // 6 high findings in 1000 lines = 30 weighted per KLOC
        let m = with_findings(module(1000, None, None), Severity::High, 6);
        let a = score(&[m], 0);

        assert!((a.score - 0.6).abs() < 1e-9);
        assert_eq!(a.level, RiskLevel::High);
    }

    #[test]
    fn unknown_coverage_is_not_read_as_full_coverage() {
        let tagged = with_findings(module(1000, None, Some(vec![])), Severity::High, 6);
        let a = score(&[tagged], 0);

        // density 0.6 and sensitivity 0, weighted 0.5 and 0.25
        assert!((a.score - 0.4).abs() < 1e-9);
        assert_eq!(a.components.coverage, None);
    }

    #[test]
    fn no_tests_tag_counts_as_known_coverage() {
        let a = score(&[module(100, None, Some(vec![RiskTag::NoTests]))], 0);

        assert_eq!(a.components.coverage, Some(1.0));
        assert!(a.flags.contains(&RiskFlag::UnknownCoverage));
    }

    #[test]
    fn partial_coverage_is_flagged() {
        let a = score(
            &[
                module(100, Some(0.9), Some(vec![])),
                module(100, None, Some(vec![])),
            ],
            0,
        );
        assert_eq!(a.flags, [RiskFlag::PartialCoverage]);
    }

    #[test]
    fn empty_tag_list_is_known() {
        let a = score(&[module(100, Some(0.9), Some(vec![]))], 0);
        assert!(!a.flags.contains(&RiskFlag::UnknownRiskTags));
    }

    #[rstest]
    #[case::few(9, RiskLevel::Low)]
    #[case::medium_floor(15, RiskLevel::Medium)]
    #[case::high_floor(25, RiskLevel::High)]
    fn dependents_raise_the_floor(#[case] dependents: usize, #[case] expected: RiskLevel) {
        let a = score(&[module(100, Some(0.9), Some(vec![]))], dependents);
        assert_eq!(a.level, expected);
        assert_eq!(a.dependents, dependents);
    }

    #[rstest]
    #[case::short_chain(1, 9, RiskLevel::Low)]
    #[case::long_chain(1, 16, RiskLevel::Medium)]
    #[case::very_long_chain(1, 30, RiskLevel::High)]
    fn transitive_dependents_raise_the_floor(
        #[case] dependents: usize,
        #[case] downstream: usize,
        #[case] expected: RiskLevel,
    ) {
        let a = score_blocking(&[module(100, Some(0.9), Some(vec![]))], dependents, downstream);
        assert_eq!(a.level, expected);
        assert_eq!(a.downstream, downstream);
    }

    #[test]
    fn floor_never_lowers_a_level() {
        let m = with_findings(module(100, Some(0.0), Some(vec![])), Severity::Critical, 10);
        let a = score(&[m], 12);
        assert_eq!(a.level, RiskLevel::Critical);
    }

    #[test]
    fn identical_inputs_score_identically() {
        let m = with_findings(module(250, Some(0.4), None), Severity::Medium, 3);
        assert_eq!(score(&[m.clone()], 4), score(&[m], 4));
    }
}
