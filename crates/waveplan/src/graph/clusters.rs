//! Cycle collapsing.
//!
//! Modules that import each other (directly or through a chain) cannot be
//! migrated one at a time. Tarjan's algorithm finds the maximal sets of
//! mutually reachable modules in a single linear pass; each set becomes one
//! cluster. Modules outside any cycle are singleton clusters.

use super::ModuleGraph;
use crate::domain::ModuleId;
use petgraph::Direction;
use petgraph::algo::tarjan_scc;
use petgraph::graph::NodeIndex;

/// Index of a cluster within a [`Clustering`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClusterId(pub usize);

/// Partition of the module set into strongly connected components.
///
/// Clusters are numbered in ascending order of their smallest member id, and
/// members within a cluster are in ascending id order.
#[derive(Debug, Clone)]
pub struct Clustering {
    members: Vec<Vec<NodeIndex>>,
    cluster_of: Vec<ClusterId>,
    layers: Vec<usize>,
}

impl Clustering {
    /// Find the clusters of a module graph.
    #[must_use]
    pub fn compute(graph: &ModuleGraph) -> Self {
        let g = graph.inner();

        // Postorder over import edges: a component only imports components
        // that were emitted before it.
        let sccs = tarjan_scc(g);

        let mut component_of = vec![0usize; g.node_count()];
        for (component, scc) in sccs.iter().enumerate() {
            for node in scc {
                component_of[node.index()] = component;
            }
        }

        // Longest-path layer in migration order: imported components first.
        let mut component_layer = vec![0usize; sccs.len()];
        for (component, scc) in sccs.iter().enumerate() {
            let mut layer = 1;
            for &node in scc {
                for imported in g.neighbors_directed(node, Direction::Outgoing) {
                    let other = component_of[imported.index()];
                    if other != component {
                        debug_assert!(other < component, "tarjan_scc order is not a postorder");
                        layer = layer.max(component_layer[other] + 1);
                    }
                }
            }
            component_layer[component] = layer;
        }

        let mut components: Vec<(Vec<NodeIndex>, usize)> = sccs
            .into_iter()
            .zip(component_layer)
            .map(|(mut scc, layer)| {
                scc.sort();
                (scc, layer)
            })
            .collect();
        // Node indices follow module id order, so the first member is the smallest id
        components.sort_by_key(|(scc, _)| scc[0]);

        let mut cluster_of = vec![ClusterId(0); g.node_count()];
        let mut members = Vec::with_capacity(components.len());
        let mut layers = Vec::with_capacity(components.len());
        for (id, (scc, layer)) in components.into_iter().enumerate() {
            for node in &scc {
                cluster_of[node.index()] = ClusterId(id);
            }
            if scc.len() > 1 {
                tracing::debug!(
                    cluster = id,
                    size = scc.len(),
                    first = %graph[scc[0]].id,
                    "Collapsed import cycle"
                );
            }
            members.push(scc);
            layers.push(layer);
        }

        let clustering = Self {
            members,
            cluster_of,
            layers,
        };
        tracing::info!(
            clusters = clustering.cluster_count(),
            cyclic = clustering.cyclic_count(),
            "Collapsed import cycles"
        );
        clustering
    }

    /// Number of clusters (cyclic and singleton).
    #[must_use]
    pub fn cluster_count(&self) -> usize {
        self.members.len()
    }

    /// Number of clusters with two or more members.
    #[must_use]
    pub fn cyclic_count(&self) -> usize {
        self.members.iter().filter(|m| m.len() > 1).count()
    }

    /// Iterate over cluster ids in order.
    pub fn ids(&self) -> impl Iterator<Item = ClusterId> + use<> {
        (0..self.members.len()).map(ClusterId)
    }

    /// Cluster containing a module.
    #[must_use]
    pub fn cluster_of(&self, node: NodeIndex) -> ClusterId {
        self.cluster_of[node.index()]
    }

    /// Members of a cluster, in ascending id order.
    #[must_use]
    pub fn members(&self, cluster: ClusterId) -> &[NodeIndex] {
        &self.members[cluster.0]
    }

    /// Returns `true` if the cluster is an import cycle (two or more modules).
    #[must_use]
    pub fn is_cyclic(&self, cluster: ClusterId) -> bool {
        self.members[cluster.0].len() > 1
    }

    /// Topological layer of a cluster in migration order, starting at 1.
    ///
    /// Every import edge between distinct clusters goes from a higher layer
    /// (importer) to a strictly lower one (imported).
    #[must_use]
    pub fn layer(&self, cluster: ClusterId) -> usize {
        self.layers[cluster.0]
    }

    /// Member ids of a cluster, for diagnostics.
    #[must_use]
    pub fn member_ids(&self, graph: &ModuleGraph, cluster: ClusterId) -> Vec<ModuleId> {
        self.members(cluster)
            .iter()
            .map(|&n| graph[n].id.clone())
            .collect()
    }
}
