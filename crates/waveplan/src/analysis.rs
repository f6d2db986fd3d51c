//! Critical path and gateway analysis.
//!
//! Both are read-only passes over the unit graph after waves are assigned.
//!
//! | Analysis | Algorithm |
//! |----------|-----------|
//! | Critical path | Node-weighted longest path, DP over topological order |
//! | Downstream closure | DFS from every unit |
//! | Gateways | Rank by closure size, then name |

use crate::graph::{UnitGraph, UnitIndex};
use crate::schedule::WaveAssignment;
use crate::units::ConversionUnit;
use std::cmp::Ordering;

/// The heaviest dependency chain through the unit graph.
#[derive(Debug, Clone, PartialEq)]
pub struct CriticalPath {
    units: Vec<UnitIndex>,
    total_weight: f64,
}

impl CriticalPath {
    /// Units on the path, prerequisites first.
    #[must_use]
    pub fn units(&self) -> &[UnitIndex] {
        &self.units
    }

    /// Sum of unit weights along the path.
    #[must_use]
    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }

    /// Returns `true` if the unit lies on the path.
    #[must_use]
    pub fn contains(&self, unit: UnitIndex) -> bool {
        self.units.contains(&unit)
    }
}

/// Find the critical path.
///
/// `weights[i]` is the effort weight of `units[i]`. Among chains of equal
/// weight the one ending at the smallest unit name wins, and each step
/// prefers the prerequisite with the smallest name.
#[must_use]
pub fn critical_path(
    graph: &UnitGraph,
    waves: &WaveAssignment,
    units: &[ConversionUnit],
    weights: &[f64],
) -> CriticalPath {
    let name = |u: UnitIndex| units[u.0].name.as_str();
    // Heavier first, then smaller name
    let better = |a: (f64, UnitIndex), b: (f64, UnitIndex)| match a.0.total_cmp(&b.0) {
        Ordering::Equal => name(a.1) < name(b.1),
        ordering => ordering == Ordering::Greater,
    };

    let mut best = vec![0.0f64; graph.unit_count()];
    let mut via: Vec<Option<UnitIndex>> = vec![None; graph.unit_count()];

    for &unit in waves.topological_order() {
        let mut chosen: Option<UnitIndex> = None;
        for prerequisite in graph.prerequisites(unit) {
            let candidate = (best[prerequisite.0], prerequisite);
            if chosen.is_none_or(|c| better(candidate, (best[c.0], c))) {
                chosen = Some(prerequisite);
            }
        }
        best[unit.0] = weights[unit.0] + chosen.map_or(0.0, |c| best[c.0]);
        via[unit.0] = chosen;
    }

    let mut end: Option<UnitIndex> = None;
    for unit in graph.units() {
        if end.is_none_or(|e| better((best[unit.0], unit), (best[e.0], e))) {
            end = Some(unit);
        }
    }

    let Some(end) = end else {
        return CriticalPath {
            units: Vec::new(),
            total_weight: 0.0,
        };
    };

    let mut path = vec![end];
    let mut cursor = end;
    while let Some(previous) = via[cursor.0] {
        path.push(previous);
        cursor = previous;
    }
    path.reverse();

    tracing::info!(
        length = path.len(),
        weight = best[end.0],
        from = name(path[0]),
        to = name(end),
        "Found critical path"
    );

    CriticalPath {
        units: path,
        total_weight: best[end.0],
    }
}

/// Downstream closure size of every unit.
///
/// One DFS per unit, quadratic in the worst case; a warning is logged when
/// the unit count is above `warn_above`.
#[must_use]
pub fn downstream_closures(graph: &UnitGraph, warn_above: usize) -> Vec<usize> {
    if graph.unit_count() > warn_above {
        tracing::warn!(
            units = graph.unit_count(),
            threshold = warn_above,
            "Unit count above threshold; closure computation may be slow"
        );
    }
    graph.units().map(|u| graph.downstream_count(u)).collect()
}

/// A unit flagged as a migration bottleneck
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gateway {
    /// The flagged unit
    pub unit: UnitIndex,

    /// Number of units transitively blocked by it
    pub closure: usize,
}

/// Number of gateways to report for `unit_count` units.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn gateway_quota(unit_count: usize, fraction: f64, min_count: usize) -> usize {
    let by_fraction = (fraction * unit_count as f64).ceil() as usize;
    by_fraction.max(min_count)
}

/// Rank units by downstream closure and keep the top of the list.
///
/// Units that block nothing are never gateways, so the list can be shorter
/// than the quota.
#[must_use]
pub fn gateways(
    closures: &[usize],
    units: &[ConversionUnit],
    fraction: f64,
    min_count: usize,
) -> Vec<Gateway> {
    let mut ranked: Vec<Gateway> = closures
        .iter()
        .enumerate()
        .filter(|&(_, &closure)| closure > 0)
        .map(|(i, &closure)| Gateway {
            unit: UnitIndex(i),
            closure,
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.closure
            .cmp(&a.closure)
            .then_with(|| units[a.unit.0].name.cmp(&units[b.unit.0].name))
    });
    ranked.truncate(gateway_quota(units.len(), fraction, min_count));

    tracing::info!(gateways = ranked.len(), "Ranked gateway units");
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Clustering, ModuleGraph};
    use crate::ingest::{EdgeInput, GraphInput, ModuleInput};
    use crate::schedule::assign_waves;
    use crate::units::group_units;
    use rstest::rstest;

    struct Fixture {
        units: Vec<ConversionUnit>,
        graph: UnitGraph,
        waves: WaveAssignment,
    }

    /// One module per directory, so every module is its own unit named after it.
    fn fixture(names: &[&str], imports: &[(&str, &str)]) -> Fixture {
        let path = |n: &str| format!("{n}/m.py");
        let graph = ModuleGraph::build(GraphInput {
            modules: names.iter().map(|n| ModuleInput::new(path(n), 10)).collect(),
            edges: imports
                .iter()
                .map(|(f, t)| EdgeInput::new(path(f), path(t)))
                .collect(),
        })
        .unwrap();
        let clustering = Clustering::compute(&graph);
        let units = group_units(&graph, &clustering, 10).unwrap();
        let unit_graph = UnitGraph::build(&graph, &units).unwrap();
        let waves = assign_waves(&unit_graph, &units).unwrap();
        Fixture {
            units,
            graph: unit_graph,
            waves,
        }
    }

    impl Fixture {
        fn weights(&self, of: &[(&str, f64)]) -> Vec<f64> {
            self.units
                .iter()
                .map(|u| {
                    of.iter()
                        .find(|(n, _)| *n == u.name)
                        .map_or(1.0, |(_, w)| *w)
                })
                .collect()
        }

        fn names(&self, path: &[UnitIndex]) -> Vec<&str> {
            path.iter().map(|u| self.units[u.0].name.as_str()).collect()
        }
    }

    #[test]
    fn chain_is_the_critical_path() {
        let f = fixture(&["a", "b", "c"], &[("b", "a"), ("c", "b")]);
        let path = critical_path(&f.graph, &f.waves, &f.units, &f.weights(&[]));

        assert_eq!(f.names(path.units()), ["a", "b", "c"]);
        assert!((path.total_weight() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn heavier_branch_wins_over_longer_one() {
        // a <- b <- c (weight 3) versus a <- d (weight 10)
        let f = fixture(&["a", "b", "c", "d"], &[("b", "a"), ("c", "b"), ("d", "a")]);
        let path = critical_path(&f.graph, &f.waves, &f.units, &f.weights(&[("d", 10.0)]));

        assert_eq!(f.names(path.units()), ["a", "d"]);
        assert!((path.total_weight() - 11.0).abs() < 1e-9);
    }

    #[test]
    fn ties_prefer_smaller_names() {
        let f = fixture(&["x", "y", "z"], &[("z", "x"), ("z", "y")]);
        let path = critical_path(&f.graph, &f.waves, &f.units, &f.weights(&[]));

        assert_eq!(f.names(path.units()), ["x", "z"]);
    }

    #[test]
    fn isolated_heaviest_unit_is_a_path_of_one() {
        let f = fixture(&["a", "b"], &[]);
        let path = critical_path(&f.graph, &f.waves, &f.units, &f.weights(&[("b", 2.0)]));

        assert_eq!(f.names(path.units()), ["b"]);
        assert!(path.contains(UnitIndex(1)));
    }

    #[test]
    fn empty_graph_has_empty_path() {
        let f = fixture(&[], &[]);
        let path = critical_path(&f.graph, &f.waves, &f.units, &[]);

        assert!(path.units().is_empty());
        assert!(path.total_weight().abs() < 1e-9);
    }

    #[rstest]
    #[case::min_count_dominates(10, 0.1, 3)]
    #[case::fraction_dominates(100, 0.1, 10)]
    #[case::rounds_up(31, 0.1, 4)]
    #[case::zero_fraction(50, 0.0, 3)]
    fn gateway_quota_cases(#[case] units: usize, #[case] fraction: f64, #[case] expected: usize) {
        assert_eq!(gateway_quota(units, fraction, 3), expected);
    }

    #[test]
    fn gateways_rank_by_closure_then_name() {
        // hub blocks b, c, d; b blocks c; e blocks f
        let f = fixture(
            &["hub", "b", "c", "d", "e", "f"],
            &[("b", "hub"), ("c", "hub"), ("d", "hub"), ("c", "b"), ("f", "e")],
        );
        let closures = downstream_closures(&f.graph, 5_000);
        let flagged = gateways(&closures, &f.units, 0.1, 3);

        let names: Vec<_> = flagged.iter().map(|g| f.units[g.unit.0].name.as_str()).collect();
        assert_eq!(names, ["hub", "b", "e"]);
        assert_eq!(flagged[0].closure, 3);
    }

    #[test]
    fn units_blocking_nothing_are_never_gateways() {
        let f = fixture(&["a", "b", "c"], &[("b", "a")]);
        let closures = downstream_closures(&f.graph, 5_000);
        let flagged = gateways(&closures, &f.units, 1.0, 3);

        assert_eq!(flagged.len(), 1);
        assert_eq!(f.units[flagged[0].unit.0].name, "a");
    }
}
