//! Wave scheduling.
//!
//! Units are layered by longest path: a unit's wave is one more than the
//! highest wave among its prerequisites, and units without prerequisites
//! land in wave 1. This is the unique minimal-depth layering of the DAG.
//!
//! The traversal is Kahn's algorithm with the ready set ordered by unit name,
//! so the topological order it produces is also deterministic.

use crate::error::{InvariantViolation, Result};
use crate::graph::{UnitGraph, UnitIndex};
use crate::units::ConversionUnit;
use std::collections::BTreeSet;

/// Wave number of every unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaveAssignment {
    waves: Vec<usize>,
    order: Vec<UnitIndex>,
    wave_count: usize,
}

/// Assign every unit to a wave.
///
/// # Errors
///
/// Returns an [`InvariantViolation`] if the unit graph turns out to be cyclic
/// or the assignment breaks the ordering postcondition.
pub fn assign_waves(graph: &UnitGraph, units: &[ConversionUnit]) -> Result<WaveAssignment> {
    let count = graph.unit_count();
    let mut remaining: Vec<usize> = graph
        .units()
        .map(|u| graph.prerequisites(u).len())
        .collect();
    let mut waves = vec![0usize; count];

    let mut ready: BTreeSet<(&str, UnitIndex)> = graph
        .units()
        .filter(|u| remaining[u.0] == 0)
        .map(|u| (units[u.0].name.as_str(), u))
        .collect();
    let mut order = Vec::with_capacity(count);

    while let Some((_, unit)) = ready.pop_first() {
        let wave = graph
            .prerequisites(unit)
            .into_iter()
            .map(|p| waves[p.0])
            .max()
            .map_or(1, |w| w + 1);
        waves[unit.0] = wave;
        order.push(unit);

        for dependent in graph.dependents(unit) {
            remaining[dependent.0] -= 1;
            if remaining[dependent.0] == 0 {
                ready.insert((units[dependent.0].name.as_str(), dependent));
            }
        }
    }

    if order.len() != count {
        let mut stuck: Vec<String> = graph
            .units()
            .filter(|u| remaining[u.0] > 0)
            .map(|u| units[u.0].name.clone())
            .collect();
        stuck.sort();
        return Err(InvariantViolation::CyclicCondensation { units: stuck }.into());
    }

    let assignment = WaveAssignment {
        wave_count: waves.iter().copied().max().unwrap_or(0),
        waves,
        order,
    };
    assignment.validate(graph, units)?;

    tracing::info!(
        units = count,
        waves = assignment.wave_count,
        widest = assignment.widest_wave(),
        "Assigned waves"
    );

    Ok(assignment)
}

impl WaveAssignment {
    /// Check that every unit comes strictly after all of its prerequisites.
    ///
    /// # Errors
    ///
    /// Returns [`InvariantViolation::WaveOrder`] for the first offending edge.
    pub fn validate(&self, graph: &UnitGraph, units: &[ConversionUnit]) -> Result<()> {
        for (prerequisite, dependent, _) in graph.edges() {
            let (before, after) = (self.waves[prerequisite.0], self.waves[dependent.0]);
            if before >= after {
                return Err(InvariantViolation::WaveOrder {
                    prerequisite: units[prerequisite.0].name.clone(),
                    prerequisite_wave: before,
                    dependent: units[dependent.0].name.clone(),
                    dependent_wave: after,
                }
                .into());
            }
        }
        Ok(())
    }

    /// Wave of a unit, starting at 1.
    #[must_use]
    pub fn wave_of(&self, unit: UnitIndex) -> usize {
        self.waves[unit.0]
    }

    /// Number of waves.
    #[must_use]
    pub fn wave_count(&self) -> usize {
        self.wave_count
    }

    /// Units in a deterministic topological order (prerequisites first).
    #[must_use]
    pub fn topological_order(&self) -> &[UnitIndex] {
        &self.order
    }

    /// Units grouped by wave; `result[0]` is wave 1.
    ///
    /// Within a wave units keep their topological order, which is name order
    /// for units that became ready together.
    #[must_use]
    pub fn waves(&self) -> Vec<Vec<UnitIndex>> {
        let mut grouped = vec![Vec::new(); self.wave_count];
        for &unit in &self.order {
            grouped[self.waves[unit.0] - 1].push(unit);
        }
        grouped
    }

    /// Size of the largest wave.
    #[must_use]
    pub fn widest_wave(&self) -> usize {
        self.waves().iter().map(Vec::len).max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Clustering, ModuleGraph};
    use crate::ingest::{EdgeInput, GraphInput, ModuleInput};
    use crate::units::group_units;

    fn schedule(modules: &[&str], edges: &[(&str, &str)]) -> (Vec<ConversionUnit>, WaveAssignment) {
        let graph = ModuleGraph::build(GraphInput {
            modules: modules.iter().map(|m| ModuleInput::new(*m, 10)).collect(),
            edges: edges.iter().map(|(f, t)| EdgeInput::new(*f, *t)).collect(),
        })
        .unwrap();
        let clustering = Clustering::compute(&graph);
        let units = group_units(&graph, &clustering, 10).unwrap();
        let unit_graph = UnitGraph::build(&graph, &units).unwrap();
        let waves = assign_waves(&unit_graph, &units).unwrap();
        (units, waves)
    }

    fn wave_named(units: &[ConversionUnit], waves: &WaveAssignment, name: &str) -> usize {
        let index = units.iter().position(|u| u.name == name).unwrap();
        waves.wave_of(UnitIndex(index))
    }

    #[test]
    fn chain_gets_consecutive_waves() {
        // c imports b imports a
        let (units, waves) = schedule(
            &["a/m.py", "b/m.py", "c/m.py"],
            &[("c/m.py", "b/m.py"), ("b/m.py", "a/m.py")],
        );

        assert_eq!(wave_named(&units, &waves, "a"), 1);
        assert_eq!(wave_named(&units, &waves, "b"), 2);
        assert_eq!(wave_named(&units, &waves, "c"), 3);
        assert_eq!(waves.wave_count(), 3);
    }

    #[test]
    fn wave_is_one_past_the_deepest_prerequisite() {
        // d imports a (wave 1) and c (wave 3)
        let (units, waves) = schedule(
            &["a/m.py", "b/m.py", "c/m.py", "d/m.py"],
            &[
                ("b/m.py", "a/m.py"),
                ("c/m.py", "b/m.py"),
                ("d/m.py", "a/m.py"),
                ("d/m.py", "c/m.py"),
            ],
        );

        assert_eq!(wave_named(&units, &waves, "d"), 4);
    }

    #[test]
    fn independent_units_share_wave_one_in_name_order() {
        let (units, waves) = schedule(&["z/m.py", "a/m.py", "m/m.py"], &[]);

        let grouped = waves.waves();
        assert_eq!(grouped.len(), 1);
        let names: Vec<_> = grouped[0].iter().map(|u| units[u.0].name.as_str()).collect();
        assert_eq!(names, ["a", "m", "z"]);
        assert_eq!(waves.widest_wave(), 3);
    }

    #[test]
    fn topological_order_puts_prerequisites_first() {
        let (units, waves) = schedule(
            &["a/m.py", "b/m.py", "c/m.py"],
            &[("a/m.py", "c/m.py"), ("b/m.py", "c/m.py")],
        );

        let names: Vec<_> = waves
            .topological_order()
            .iter()
            .map(|u| units[u.0].name.as_str())
            .collect();
        assert_eq!(names, ["c", "a", "b"]);
    }

    #[test]
    fn empty_graph_has_no_waves() {
        let (_, waves) = schedule(&[], &[]);
        assert_eq!(waves.wave_count(), 0);
        assert!(waves.waves().is_empty());
    }
}
