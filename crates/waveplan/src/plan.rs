//! The conversion plan and the pipeline that produces it.
//!
//! Planning is a pure function of the graph payload and the configuration:
//!
//! ```text
//! GraphInput -> ModuleGraph -> Clustering -> units -> UnitGraph
//!            -> waves -> risk, effort -> critical path, gateways -> ConversionPlan
//! ```
//!
//! The plan carries no timestamps and every list has a fixed order, so the
//! serialized plan is byte-identical across runs on the same input.

use crate::analysis::{self, CriticalPath, Gateway};
use crate::config::PlannerConfig;
use crate::domain::{ModuleId, RiskLevel};
use crate::effort::{EffortModel, LinearEffort, round_to};
use crate::error::Result;
use crate::graph::{Clustering, ModuleGraph, UnitGraph, UnitIndex};
use crate::ingest::GraphInput;
use crate::risk::{RiskAssessment, RiskFlag, RiskScorer};
use crate::schedule::{WaveAssignment, assign_waves};
use crate::units::{ConversionUnit, UnitKind, UnitMetrics, group_units};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::cmp::Reverse;

/// Version of the plan document layout
pub const PLAN_FORMAT_VERSION: u32 = 1;

/// The planning result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionPlan {
    /// Plan document layout version
    pub version: u32,

    /// SHA-256 of the canonical input and configuration
    pub fingerprint: String,

    /// Configuration the plan was built with
    pub config: PlannerConfig,

    /// Headline counts
    pub summary: PlanSummary,

    /// Waves in execution order
    pub waves: Vec<Wave>,

    /// Heaviest dependency chain
    pub critical_path: CriticalPathSummary,

    /// Bottleneck units, most blocking first
    pub gateways: Vec<GatewaySummary>,

    /// Degraded-input markers
    pub annotations: Vec<Annotation>,
}

/// Headline counts of a plan
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanSummary {
    /// Modules in the graph
    pub modules: usize,

    /// Distinct import edges after merging
    pub edges: usize,

    /// Self-imports removed during ingestion
    pub dropped_self_loops: usize,

    /// Conversion units
    pub units: usize,

    /// Units formed from import cycles
    pub cycle_units: usize,

    /// Number of waves
    pub waves: usize,

    /// Units in the largest wave
    pub widest_wave: usize,

    /// Units at high or critical risk
    pub high_risk_units: usize,

    /// Sum of all unit estimates
    pub estimated_hours: f64,
}

/// One scheduling stage
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Wave {
    /// Wave number, starting at 1
    pub number: usize,

    /// Units in the wave, ordered by name
    pub units: Vec<UnitSummary>,

    /// Advisory groups of at most `parallelism` unit names
    pub batches: Vec<Vec<String>>,
}

/// A unit as reported in the plan
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitSummary {
    /// Unit name
    pub name: String,

    /// Cycle or package
    pub kind: UnitKind,

    /// Dominant directory
    pub package: String,

    /// Member module ids
    pub members: Vec<ModuleId>,

    /// Aggregate metrics
    pub metrics: UnitMetrics,

    /// Risk assessment
    pub risk: RiskAssessment,

    /// Effort estimate
    pub effort: EffortEstimate,

    /// Units that must be converted first, by name
    pub prerequisites: Vec<String>,

    /// Units transitively blocked by this one
    pub downstream: usize,
}

/// Effort of a unit
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EffortEstimate {
    /// Effort weight in points
    pub weight: f64,

    /// Estimated hours
    pub hours: f64,
}

/// Critical path as reported in the plan
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CriticalPathSummary {
    /// Unit names, prerequisites first
    pub units: Vec<String>,

    /// Summed effort weight
    pub total_weight: f64,

    /// Minimum duration in hours, whatever the parallelism
    pub estimated_hours: f64,
}

/// A gateway as reported in the plan
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GatewaySummary {
    /// Unit name
    pub unit: String,

    /// Units transitively blocked
    pub closure: usize,

    /// Units directly blocked
    pub dependents: usize,

    /// Wave of the unit
    pub wave: usize,

    /// Whether the unit is on the critical path
    pub on_critical_path: bool,

    /// Why the unit was flagged
    pub rationale: String,
}

/// A degraded-input marker on a unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Annotation {
    /// Unit name
    pub unit: String,

    /// What was missing
    pub flag: RiskFlag,

    /// Log-style message
    pub message: String,
}

impl ConversionPlan {
    /// Look up a unit by name.
    #[must_use]
    pub fn unit(&self, name: &str) -> Option<&UnitSummary> {
        self.waves
            .iter()
            .flat_map(|w| &w.units)
            .find(|u| u.name == name)
    }

    /// Wave number of a unit, by name.
    #[must_use]
    pub fn wave_of(&self, name: &str) -> Option<usize> {
        self.waves
            .iter()
            .find(|w| w.units.iter().any(|u| u.name == name))
            .map(|w| w.number)
    }

    /// Name of the unit containing a module.
    #[must_use]
    pub fn unit_of(&self, module: &str) -> Option<&str> {
        self.waves
            .iter()
            .flat_map(|w| &w.units)
            .find(|u| u.members.iter().any(|m| m.as_str() == module))
            .map(|u| u.name.as_str())
    }

    /// All units in wave order.
    pub fn units(&self) -> impl Iterator<Item = &UnitSummary> {
        self.waves.iter().flat_map(|w| &w.units)
    }
}

/// Runs the planning pipeline.
pub struct Planner {
    config: PlannerConfig,
    effort: Box<dyn EffortModel>,
}

impl std::fmt::Debug for Planner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Planner")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Planner {
    /// Create a planner with the default effort model.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` if the configuration is invalid.
    pub fn new(config: PlannerConfig) -> Result<Self> {
        config.validate()?;
        let effort = Box::new(LinearEffort::from_config(&config.effort));
        Ok(Self { config, effort })
    }

    /// Replace the effort model.
    #[must_use]
    pub fn with_effort_model(mut self, model: impl EffortModel + 'static) -> Self {
        self.effort = Box::new(model);
        self
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Build a plan from a graph payload.
    ///
    /// # Errors
    ///
    /// Returns a graph integrity error for malformed input, or an invariant
    /// violation if the engine breaks one of its own guarantees. No partial
    /// plan is produced in either case.
    pub fn plan(&self, input: GraphInput) -> Result<ConversionPlan> {
        let config = &self.config;
        let graph = ModuleGraph::build(input)?;
        let fingerprint = fingerprint(&graph, config);

        let clustering = Clustering::compute(&graph);
        let units = group_units(&graph, &clustering, config.max_unit_size)?;
        let unit_graph = UnitGraph::build(&graph, &units)?;
        let waves = assign_waves(&unit_graph, &units)?;

        let closures = analysis::downstream_closures(&unit_graph, config.unit_warning_threshold);
        let risks = RiskScorer::new(&config.risk, config.risk_coverage_floor)
            .score_all(&graph, &units, &unit_graph, &closures);
        let weights: Vec<f64> = units.iter().map(|u| self.effort.weight(&u.metrics)).collect();

        let path = analysis::critical_path(&unit_graph, &waves, &units, &weights);
        let gateways = analysis::gateways(
            &closures,
            &units,
            config.gateway_top_fraction,
            config.gateway_min_count,
        );

        let facts = UnitFacts {
            units: &units,
            unit_graph: &unit_graph,
            waves: &waves,
            risks: &risks,
            weights: &weights,
            closures: &closures,
            path: &path,
        };

        let plan = ConversionPlan {
            version: PLAN_FORMAT_VERSION,
            fingerprint,
            config: config.clone(),
            summary: self.summary(&graph, &facts),
            waves: self.waves(&facts),
            critical_path: CriticalPathSummary {
                units: path.units().iter().map(|u| units[u.0].name.clone()).collect(),
                total_weight: round_to(path.total_weight(), 3),
                estimated_hours: round_to(self.effort.hours(path.total_weight()), 1),
            },
            gateways: gateways.iter().map(|g| facts.gateway(g)).collect(),
            annotations: annotations(&units, &risks),
        };

        tracing::info!(
            units = plan.summary.units,
            waves = plan.summary.waves,
            gateways = plan.gateways.len(),
            critical_path = plan.critical_path.units.len(),
            "Built conversion plan"
        );

        Ok(plan)
    }

    fn summary(&self, graph: &ModuleGraph, facts: &UnitFacts<'_>) -> PlanSummary {
        let total_weight: f64 = facts.weights.iter().sum();
        PlanSummary {
            modules: graph.module_count(),
            edges: graph.edge_count(),
            dropped_self_loops: graph.dropped_self_loops(),
            units: facts.units.len(),
            cycle_units: facts
                .units
                .iter()
                .filter(|u| u.kind == UnitKind::Cycle)
                .count(),
            waves: facts.waves.wave_count(),
            widest_wave: facts.waves.widest_wave(),
            high_risk_units: facts
                .risks
                .iter()
                .filter(|r| r.level >= RiskLevel::High)
                .count(),
            estimated_hours: round_to(self.effort.hours(total_weight), 1),
        }
    }

    fn waves(&self, facts: &UnitFacts<'_>) -> Vec<Wave> {
        facts
            .waves
            .waves()
            .into_iter()
            .enumerate()
            .map(|(i, mut members)| {
                let name = |u: &UnitIndex| facts.units[u.0].name.clone();
                members.sort_by_key(name);

                let mut packing = members.clone();
                packing.sort_by(|a, b| facts.packing_key(*a).cmp(&facts.packing_key(*b)));
                let batches: Vec<Vec<String>> = packing
                    .chunks(self.config.parallelism)
                    .map(|chunk| chunk.iter().map(name).collect())
                    .collect();

                Wave {
                    number: i + 1,
                    units: members.iter().map(|&u| self.unit_summary(facts, u)).collect(),
                    batches,
                }
            })
            .collect()
    }

    fn unit_summary(&self, facts: &UnitFacts<'_>, u: UnitIndex) -> UnitSummary {
        let unit = &facts.units[u.0];
        let weight = facts.weights[u.0];
        let mut prerequisites: Vec<String> = facts
            .unit_graph
            .prerequisites(u)
            .into_iter()
            .map(|p| facts.units[p.0].name.clone())
            .collect();
        prerequisites.sort();

        UnitSummary {
            name: unit.name.clone(),
            kind: unit.kind,
            package: unit.package.clone(),
            members: unit.members.clone(),
            metrics: unit.metrics.clone(),
            risk: facts.risks[u.0].clone(),
            effort: EffortEstimate {
                weight: round_to(weight, 3),
                hours: round_to(self.effort.hours(weight), 1),
            },
            prerequisites,
            downstream: facts.closures[u.0],
        }
    }
}

/// Per-unit results gathered for plan assembly.
struct UnitFacts<'a> {
    units: &'a [ConversionUnit],
    unit_graph: &'a UnitGraph,
    waves: &'a WaveAssignment,
    risks: &'a [RiskAssessment],
    weights: &'a [f64],
    closures: &'a [usize],
    path: &'a CriticalPath,
}

/// Sort key for batch packing: critical path first, then riskier, then more
/// blocking, then by name.
type PackingKey<'a> = (bool, Reverse<RiskLevel>, Reverse<u64>, Reverse<usize>, &'a str);

impl UnitFacts<'_> {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn packing_key(&self, u: UnitIndex) -> PackingKey<'_> {
        let risk = &self.risks[u.0];
        (
            !self.path.contains(u),
            Reverse(risk.level),
            // Scores are rounded to three decimals, so this is exact
            Reverse((risk.score * 1000.0).round() as u64),
            Reverse(self.closures[u.0]),
            self.units[u.0].name.as_str(),
        )
    }

    fn gateway(&self, gateway: &Gateway) -> GatewaySummary {
        let u = gateway.unit;
        let dependents = self.unit_graph.dependents(u).len();
        let wave = self.waves.wave_of(u);
        let on_critical_path = self.path.contains(u);

        let mut rationale = format!(
            "blocks {} downstream unit{} ({} directly); converted in wave {}",
            gateway.closure,
            if gateway.closure == 1 { "" } else { "s" },
            dependents,
            wave
        );
        if on_critical_path {
            rationale.push_str("; on the critical path");
        }

        GatewaySummary {
            unit: self.units[u.0].name.clone(),
            closure: gateway.closure,
            dependents,
            wave,
            on_critical_path,
            rationale,
        }
    }
}

fn annotations(units: &[ConversionUnit], risks: &[RiskAssessment]) -> Vec<Annotation> {
    let mut out: Vec<Annotation> = units
        .iter()
        .zip(risks)
        .flat_map(|(unit, risk)| {
            risk.flags.iter().map(|&flag| Annotation {
                unit: unit.name.clone(),
                flag,
                message: format!("risk: {}", flag.describe()),
            })
        })
        .collect();
    out.sort_by(|a, b| a.unit.cmp(&b.unit).then(a.flag.cmp(&b.flag)));
    out
}

/// SHA-256 over the canonical graph (modules and edges in id order) and the
/// configuration, as lowercase hex.
fn fingerprint(graph: &ModuleGraph, config: &PlannerConfig) -> String {
    let mut hasher = Sha256::new();
    for module in graph.modules() {
        hasher.update(
            format!(
                "module|{}|{}|{:?}|{:?}|{:?}\n",
                module.id, module.loc, module.findings, module.coverage, module.risk_tags
            )
            .as_bytes(),
        );
    }
    for edge in graph.edges() {
        hasher.update(format!("edge|{}|{}|{}\n", edge.from, edge.to, edge.weight).as_bytes());
    }
    hasher.update(format!("config|{config:?}\n").as_bytes());
    format!("{:x}", hasher.finalize())
}
