//! Module and unit dependency graphs.
//!
//! ## Design
//!
//! - The module graph is a petgraph `DiGraph` whose edges point from the
//!   importing module to the imported one, weighted by import count
//! - Nodes are inserted in ascending id order and edges in ascending
//!   (source, target) order, so node indices are stable for a given input
//! - Cluster detection and the unit condensation graph live in submodules
//!
//! ## Operations
//!
//! | Operation | Algorithm |
//! |-----------|-----------|
//! | Cluster detection | Tarjan's SCC algorithm |
//! | Cluster layering | Longest-path layering over the cluster DAG |
//! | Unit condensation | Edge projection + cycle check |

mod clusters;
mod condensation;

pub use clusters::{ClusterId, Clustering};
pub use condensation::{UnitGraph, UnitIndex};

use crate::domain::{DependencyEdge, FindingCounts, ModuleId, ModuleNode};
use crate::error::{GraphIntegrityError, Result};
use crate::ingest::GraphInput;
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::{BTreeMap, HashMap};

/// Dependency graph over modules.
///
/// Built once per planning run and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct ModuleGraph {
    graph: DiGraph<ModuleNode, u32>,
    index: HashMap<ModuleId, NodeIndex>,
    dropped_self_loops: usize,
}

impl ModuleGraph {
    /// Validate a payload and build the graph.
    ///
    /// Parallel edges are merged by summing their import counts and self-loops
    /// are dropped.
    ///
    /// # Errors
    ///
    /// Returns a [`GraphIntegrityError`] for empty or duplicate ids, coverage
    /// outside [0, 1], or an edge naming an unknown module.
    pub fn build(input: GraphInput) -> Result<Self> {
        let mut nodes: BTreeMap<ModuleId, ModuleNode> = BTreeMap::new();

        for (position, module) in input.modules.into_iter().enumerate() {
            let id = module.id.trim();
            if id.is_empty() {
                return Err(GraphIntegrityError::EmptyModuleId { index: position }.into());
            }
            let id = ModuleId::new(id);

            if let Some(coverage) = module.coverage
                && !(0.0..=1.0).contains(&coverage)
            {
                return Err(GraphIntegrityError::InvalidCoverage {
                    module: id.to_string(),
                    coverage,
                }
                .into());
            }

            let mut findings = FindingCounts::new();
            for finding in &module.findings {
                findings.add(finding.severity, finding.count);
            }

            let risk_tags = module.risk_tags.map(|mut tags| {
                tags.sort();
                tags.dedup();
                tags
            });

            let node = ModuleNode {
                id: id.clone(),
                loc: module.loc,
                findings,
                coverage: module.coverage,
                risk_tags,
                fan_in: 0,
                fan_out: 0,
            };
            if nodes.insert(id.clone(), node).is_some() {
                return Err(GraphIntegrityError::DuplicateModule { id: id.0 }.into());
            }
        }

        let mut graph = DiGraph::with_capacity(nodes.len(), input.edges.len());
        let mut index = HashMap::with_capacity(nodes.len());
        for (id, node) in nodes {
            let idx = graph.add_node(node);
            index.insert(id, idx);
        }

        let mut merged: BTreeMap<(NodeIndex, NodeIndex), u32> = BTreeMap::new();
        let mut dropped_self_loops = 0;
        for edge in input.edges {
            let from = edge.from.trim();
            let to = edge.to.trim();
            let lookup = |name: &str| {
                index.get(name).copied().ok_or_else(|| {
                    GraphIntegrityError::UnknownModule {
                        from: from.to_string(),
                        to: to.to_string(),
                        missing: name.to_string(),
                    }
                })
            };
            let source = lookup(from)?;
            let target = lookup(to)?;

            if source == target {
                tracing::debug!(module = from, "Dropping self-import");
                dropped_self_loops += 1;
                continue;
            }

            // An edge always carries at least one import
            let weight = merged.entry((source, target)).or_insert(0);
            *weight = weight.saturating_add(edge.imports.max(1));
        }

        for ((source, target), weight) in merged {
            graph.add_edge(source, target, weight);
        }

        for idx in graph.node_indices().collect::<Vec<_>>() {
            let fan_out = graph.neighbors_directed(idx, Direction::Outgoing).count();
            let fan_in = graph.neighbors_directed(idx, Direction::Incoming).count();
            let node = &mut graph[idx];
            node.fan_out = fan_out;
            node.fan_in = fan_in;
        }

        let module_graph = Self {
            graph,
            index,
            dropped_self_loops,
        };
        module_graph.check_no_self_loops()?;

        tracing::info!(
            modules = module_graph.module_count(),
            edges = module_graph.edge_count(),
            dropped_self_loops,
            "Built module graph"
        );

        Ok(module_graph)
    }

    fn check_no_self_loops(&self) -> Result<()> {
        if let Some(edge) = self
            .graph
            .edge_references()
            .find(|e| e.source() == e.target())
        {
            return Err(GraphIntegrityError::SelfLoop {
                module: self.graph[edge.source()].id.to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Number of modules.
    #[must_use]
    pub fn module_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of distinct (merged) import edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Number of self-imports dropped during construction.
    #[must_use]
    pub fn dropped_self_loops(&self) -> usize {
        self.dropped_self_loops
    }

    /// Look up a module's node index.
    #[must_use]
    pub fn index_of(&self, id: &ModuleId) -> Option<NodeIndex> {
        self.index.get(id).copied()
    }

    /// Look up a module by id.
    #[must_use]
    pub fn module(&self, id: &ModuleId) -> Option<&ModuleNode> {
        self.index_of(id).map(|idx| &self.graph[idx])
    }

    /// Iterate over modules in ascending id order.
    pub fn modules(&self) -> impl Iterator<Item = &ModuleNode> {
        self.graph.node_weights()
    }

    /// Iterate over merged edges in ascending (importer, imported) order.
    pub fn edges(&self) -> impl Iterator<Item = DependencyEdge> + '_ {
        self.graph.edge_references().map(|e| DependencyEdge {
            from: self.graph[e.source()].id.clone(),
            to: self.graph[e.target()].id.clone(),
            weight: *e.weight(),
        })
    }

    /// Underlying petgraph graph.
    #[must_use]
    pub fn inner(&self) -> &DiGraph<ModuleNode, u32> {
        &self.graph
    }
}

impl std::ops::Index<NodeIndex> for ModuleGraph {
    type Output = ModuleNode;

    fn index(&self, idx: NodeIndex) -> &ModuleNode {
        &self.graph[idx]
    }
}
