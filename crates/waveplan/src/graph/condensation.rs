//! Condensation of the module graph onto conversion units.
//!
//! Edges point in migration order: `X -> Y` means some module in `Y` imports
//! some module in `X`, so `X` has to be converted first. Parallel module
//! edges between the same pair of units collapse into one edge whose weight
//! is the summed import count.

use super::ModuleGraph;
use crate::error::{InvariantViolation, Result};
use crate::units::ConversionUnit;
use petgraph::Direction;
use petgraph::algo::{is_cyclic_directed, tarjan_scc};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::BTreeMap;

/// Position of a unit in the unit list
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnitIndex(pub usize);

impl UnitIndex {
    fn node(self) -> NodeIndex {
        NodeIndex::new(self.0)
    }
}

/// Acyclic dependency graph over conversion units
#[derive(Debug, Clone)]
pub struct UnitGraph {
    graph: DiGraph<UnitIndex, u32>,
}

impl UnitGraph {
    /// Project module edges onto units.
    ///
    /// # Errors
    ///
    /// Returns [`InvariantViolation::CyclicCondensation`] if the projected
    /// graph has a cycle, naming the units involved.
    pub fn build(modules: &ModuleGraph, units: &[ConversionUnit]) -> Result<Self> {
        let mut unit_of = vec![UnitIndex(0); modules.module_count()];
        for (position, unit) in units.iter().enumerate() {
            for node in unit.nodes() {
                unit_of[node.index()] = UnitIndex(position);
            }
        }

        let mut merged: BTreeMap<(UnitIndex, UnitIndex), u32> = BTreeMap::new();
        for edge in modules.inner().edge_references() {
            let importer = unit_of[edge.source().index()];
            let imported = unit_of[edge.target().index()];
            if importer != imported {
                let weight = merged.entry((imported, importer)).or_insert(0);
                *weight = weight.saturating_add(*edge.weight());
            }
        }

        let mut graph = DiGraph::with_capacity(units.len(), merged.len());
        for position in 0..units.len() {
            graph.add_node(UnitIndex(position));
        }
        for ((prerequisite, dependent), weight) in merged {
            graph.add_edge(prerequisite.node(), dependent.node(), weight);
        }

        if is_cyclic_directed(&graph) {
            let mut names: Vec<String> = tarjan_scc(&graph)
                .into_iter()
                .find(|scc| scc.len() > 1)
                .unwrap_or_default()
                .into_iter()
                .map(|n| units[n.index()].name.clone())
                .collect();
            names.sort();
            tracing::error!(units = ?names, "Condensation graph is cyclic");
            return Err(InvariantViolation::CyclicCondensation { units: names }.into());
        }

        tracing::debug!(
            units = graph.node_count(),
            edges = graph.edge_count(),
            "Built unit condensation graph"
        );

        Ok(Self { graph })
    }

    /// Number of units.
    #[must_use]
    pub fn unit_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of unit dependencies.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Iterate over all unit indices in order.
    pub fn units(&self) -> impl Iterator<Item = UnitIndex> + use<> {
        (0..self.graph.node_count()).map(UnitIndex)
    }

    /// Units that must be converted before `unit`, ascending.
    #[must_use]
    pub fn prerequisites(&self, unit: UnitIndex) -> Vec<UnitIndex> {
        self.neighbors(unit, Direction::Incoming)
    }

    /// Units that directly depend on `unit`, ascending.
    #[must_use]
    pub fn dependents(&self, unit: UnitIndex) -> Vec<UnitIndex> {
        self.neighbors(unit, Direction::Outgoing)
    }

    fn neighbors(&self, unit: UnitIndex, direction: Direction) -> Vec<UnitIndex> {
        let mut out: Vec<UnitIndex> = self
            .graph
            .neighbors_directed(unit.node(), direction)
            .map(|n| self.graph[n])
            .collect();
        out.sort();
        out
    }

    /// All dependencies as `(prerequisite, dependent, imports)`, ascending.
    #[must_use]
    pub fn edges(&self) -> Vec<(UnitIndex, UnitIndex, u32)> {
        let mut edges: Vec<_> = self
            .graph
            .edge_references()
            .map(|e| (self.graph[e.source()], self.graph[e.target()], *e.weight()))
            .collect();
        edges.sort();
        edges
    }

    /// Number of units transitively depending on `unit` (its downstream closure).
    #[must_use]
    pub fn downstream_count(&self, unit: UnitIndex) -> usize {
        let mut dfs = petgraph::visit::Dfs::new(&self.graph, unit.node());
        let mut reached = 0;
        while dfs.next(&self.graph).is_some() {
            reached += 1;
        }
        // The start node itself is always visited
        reached - 1
    }
}
