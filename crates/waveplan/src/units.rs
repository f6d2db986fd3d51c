//! Conversion units and the grouper that forms them.
//!
//! A conversion unit is the scheduling atom. Import cycles always become one
//! unit each, whatever their size. Every other module is grouped with its
//! directory siblings, up to `max_unit_size` modules per unit.
//!
//! # Algorithm
//!
//! 1. Each cyclic cluster becomes one `Cycle` unit.
//! 2. Singleton clusters are bucketed by directory. Undersized buckets are
//!    folded into their parent directory, deepest level first: siblings are
//!    taken smallest first while the parent stays within `max_unit_size`,
//!    and a fold needs at least two contributors (the parent's own modules
//!    count as one). Top-level directories never fold into the root.
//!    Buckets are then processed deepest directory first, ties broken by
//!    path.
//! 3. Inside a bucket, modules are put in dependency-first DFS order over the
//!    bucket's own import edges, so modules that import each other sit next
//!    to each other. The ordered list is cut into chunks of at most
//!    `max_unit_size`.
//! 4. Directory grouping can create a cycle between units even though no
//!    module cycle exists (`a/x -> b/y -> a/z`). Any `Package` unit caught in
//!    a unit-level cycle is split by cluster layer. Layers strictly decrease
//!    along every import edge, so the split units cannot form a cycle.
//! 5. Units are named after their directory; names shared by several units
//!    get `-1`, `-2`, ... suffixes in creation order.

use crate::domain::{FindingCounts, ModuleId};
use crate::error::{InvariantViolation, Result};
use crate::graph::{Clustering, ModuleGraph};
use petgraph::Direction;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;

/// Name given to units of top-level modules
pub const ROOT_PACKAGE_NAME: &str = "root";

/// How a unit was formed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    /// A strongly connected component of two or more modules
    Cycle,

    /// Acyclic modules grouped by directory
    Package,
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cycle => write!(f, "cycle"),
            Self::Package => write!(f, "package"),
        }
    }
}

/// Aggregate size and finding metrics of a unit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitMetrics {
    /// Number of member modules
    pub modules: usize,

    /// Total lines of code
    pub loc: u64,

    /// Total findings by severity
    pub findings: FindingCounts,
}

/// A group of modules migrated together
#[derive(Debug, Clone)]
pub struct ConversionUnit {
    /// Unique, deterministic name
    pub name: String,

    /// Whether the unit is an import cycle or a directory group
    pub kind: UnitKind,

    /// Dominant directory of the members
    pub package: String,

    /// Member modules, in affinity order
    pub members: Vec<ModuleId>,

    /// Aggregate metrics
    pub metrics: UnitMetrics,

    nodes: Vec<NodeIndex>,
}

impl ConversionUnit {
    /// Module graph indices of the members.
    #[must_use]
    pub fn nodes(&self) -> &[NodeIndex] {
        &self.nodes
    }
}

#[cfg(test)]
impl ConversionUnit {
    /// Build a unit directly, bypassing the grouper.
    pub(crate) fn from_nodes(graph: &ModuleGraph, name: &str, nodes: Vec<NodeIndex>) -> Self {
        let mut metrics = UnitMetrics {
            modules: nodes.len(),
            ..UnitMetrics::default()
        };
        for &node in &nodes {
            metrics.loc += graph[node].loc;
            metrics.findings.merge(&graph[node].findings);
        }
        Self {
            name: name.to_string(),
            kind: UnitKind::Package,
            package: name.to_string(),
            members: nodes.iter().map(|&n| graph[n].id.clone()).collect(),
            metrics,
            nodes,
        }
    }
}

/// A unit before naming.
#[derive(Debug, Clone)]
struct Draft {
    kind: UnitKind,
    package: String,
    nodes: Vec<NodeIndex>,
}

/// Group clusters into conversion units.
///
/// # Errors
///
/// Returns [`InvariantViolation::Partition`] if a module ends up in zero or
/// several units.
pub fn group_units(
    graph: &ModuleGraph,
    clustering: &Clustering,
    max_unit_size: usize,
) -> Result<Vec<ConversionUnit>> {
    let max_unit_size = max_unit_size.max(1);
    let mut drafts = Vec::new();

    let mut buckets: BTreeMap<&str, Vec<NodeIndex>> = BTreeMap::new();
    for cluster in clustering.ids() {
        let members = clustering.members(cluster);
        if clustering.is_cyclic(cluster) {
            drafts.push(Draft {
                kind: UnitKind::Cycle,
                package: dominant_directory(graph, members),
                nodes: members.to_vec(),
            });
        } else {
            let node = members[0];
            buckets
                .entry(graph[node].id.directory())
                .or_default()
                .push(node);
        }
    }

    let buckets = merge_by_prefix(buckets, max_unit_size);

    let mut directories: Vec<&str> = buckets.keys().copied().collect();
    directories.sort_by(|a, b| depth(b).cmp(&depth(a)).then(a.cmp(b)));

    for dir in directories {
        let ordered = affinity_order(graph, &buckets[dir]);
        for chunk in ordered.chunks(max_unit_size) {
            drafts.push(Draft {
                kind: UnitKind::Package,
                package: dir.to_string(),
                nodes: chunk.to_vec(),
            });
        }
    }

    let drafts = repair_unit_cycles(graph, clustering, drafts);
    let units = name_units(graph, drafts);
    check_partition(graph, &units)?;

    tracing::info!(
        units = units.len(),
        cycle_units = units.iter().filter(|u| u.kind == UnitKind::Cycle).count(),
        max_unit_size,
        "Grouped conversion units"
    );

    Ok(units)
}

fn depth(dir: &str) -> usize {
    if dir.is_empty() {
        0
    } else {
        dir.split('/').count()
    }
}

/// Fold undersized sibling buckets into their parent directory.
///
/// Works one depth level at a time from the deepest up to depth 2, so a
/// parent filled by its children can itself fold one level higher.
fn merge_by_prefix(
    mut buckets: BTreeMap<&str, Vec<NodeIndex>>,
    max_unit_size: usize,
) -> BTreeMap<&str, Vec<NodeIndex>> {
    let deepest = buckets.keys().map(|dir| depth(dir)).max().unwrap_or(0);

    for level in (2..=deepest).rev() {
        let mut families: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for &dir in buckets.keys().filter(|dir| depth(dir) == level) {
            if let Some((parent, _)) = dir.rsplit_once('/') {
                families.entry(parent).or_default().push(dir);
            }
        }

        for (parent, mut children) in families {
            let own = buckets.get(parent).map_or(0, Vec::len);
            if own >= max_unit_size {
                continue;
            }
            children.sort_by_key(|dir| (buckets[dir].len(), *dir));

            let mut size = own;
            let mut taken = Vec::new();
            for child in children {
                let len = buckets[child].len();
                if size + len > max_unit_size {
                    break;
                }
                size += len;
                taken.push(child);
            }
            if taken.len() + usize::from(own > 0) < 2 {
                continue;
            }

            let mut merged = buckets.remove(parent).unwrap_or_default();
            for child in &taken {
                merged.extend(buckets.remove(child).unwrap_or_default());
            }
            merged.sort();
            tracing::debug!(
                parent,
                children = ?taken,
                modules = merged.len(),
                "Folded small directories into their parent"
            );
            buckets.insert(parent, merged);
        }
    }

    buckets
}

/// Longest common directory of the members, or the most common directory
/// when they share none.
fn dominant_directory(graph: &ModuleGraph, members: &[NodeIndex]) -> String {
    let dirs: Vec<&str> = members.iter().map(|&n| graph[n].id.directory()).collect();

    let mut common: Vec<&str> = dirs[0].split('/').filter(|s| !s.is_empty()).collect();
    for dir in &dirs[1..] {
        let shared = common
            .iter()
            .zip(dir.split('/'))
            .take_while(|(a, b)| **a == *b)
            .count();
        common.truncate(shared);
    }
    if !common.is_empty() {
        return common.join("/");
    }

    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for dir in dirs {
        *counts.entry(dir).or_insert(0) += 1;
    }
    // max_by_key keeps the last maximum; iterate in reverse for the smallest path
    counts
        .into_iter()
        .rev()
        .max_by_key(|(_, count)| *count)
        .map(|(dir, _)| dir.to_string())
        .unwrap_or_default()
}

/// Dependency-first DFS order over imports inside the bucket.
///
/// Roots are visited in id order and children in id order, so the result is
/// deterministic and every module comes after the bucket modules it imports.
fn affinity_order(graph: &ModuleGraph, bucket: &[NodeIndex]) -> Vec<NodeIndex> {
    let g = graph.inner();
    let in_bucket: HashSet<NodeIndex> = bucket.iter().copied().collect();
    let children = |node: NodeIndex| {
        let mut imported: Vec<NodeIndex> = g
            .neighbors_directed(node, Direction::Outgoing)
            .filter(|n| in_bucket.contains(n))
            .collect();
        imported.sort();
        imported
    };

    let mut visited: HashSet<NodeIndex> = HashSet::with_capacity(bucket.len());
    let mut order = Vec::with_capacity(bucket.len());

    for &root in bucket {
        if !visited.insert(root) {
            continue;
        }
        let mut stack = vec![(root, children(root), 0usize)];
        while let Some((node, kids, next)) = stack.last_mut() {
            if let Some(&child) = kids.get(*next) {
                *next += 1;
                if visited.insert(child) {
                    let grandchildren = children(child);
                    stack.push((child, grandchildren, 0));
                }
            } else {
                order.push(*node);
                stack.pop();
            }
        }
    }

    order
}

/// Split package units that sit on a unit-level cycle until none remain.
fn repair_unit_cycles(
    graph: &ModuleGraph,
    clustering: &Clustering,
    mut drafts: Vec<Draft>,
) -> Vec<Draft> {
    let layer_of = |node: NodeIndex| clustering.layer(clustering.cluster_of(node));

    loop {
        let offenders = drafts_on_cycles(graph, &drafts);
        let splittable: BTreeSet<usize> = offenders
            .into_iter()
            .filter(|&d| {
                let draft = &drafts[d];
                draft.kind == UnitKind::Package
                    && draft
                        .nodes
                        .iter()
                        .map(|&n| layer_of(n))
                        .collect::<BTreeSet<_>>()
                        .len()
                        > 1
            })
            .collect();

        if splittable.is_empty() {
            // Either acyclic, or a cycle the layer split cannot break; the
            // condensation check reports the latter.
            return drafts;
        }

        let mut repaired = Vec::with_capacity(drafts.len() + splittable.len());
        for (position, draft) in drafts.into_iter().enumerate() {
            if !splittable.contains(&position) {
                repaired.push(draft);
                continue;
            }
            let mut by_layer: BTreeMap<usize, Vec<NodeIndex>> = BTreeMap::new();
            for &node in &draft.nodes {
                by_layer.entry(layer_of(node)).or_default().push(node);
            }
            tracing::info!(
                package = %draft.package,
                modules = draft.nodes.len(),
                parts = by_layer.len(),
                "Split package unit to break a unit-level cycle"
            );
            for nodes in by_layer.into_values() {
                repaired.push(Draft {
                    kind: UnitKind::Package,
                    package: draft.package.clone(),
                    nodes,
                });
            }
        }
        drafts = repaired;
    }
}

/// Indices of drafts that belong to a unit-level strongly connected component.
fn drafts_on_cycles(graph: &ModuleGraph, drafts: &[Draft]) -> Vec<usize> {
    let mut unit_of = vec![0usize; graph.module_count()];
    for (d, draft) in drafts.iter().enumerate() {
        for node in &draft.nodes {
            unit_of[node.index()] = d;
        }
    }

    let mut unit_graph: DiGraph<usize, ()> = DiGraph::with_capacity(drafts.len(), 0);
    let unit_nodes: Vec<NodeIndex> = (0..drafts.len()).map(|d| unit_graph.add_node(d)).collect();
    let mut seen = HashSet::new();
    for edge in graph.inner().edge_references() {
        let from = unit_of[edge.source().index()];
        let to = unit_of[edge.target().index()];
        if from != to && seen.insert((from, to)) {
            unit_graph.add_edge(unit_nodes[from], unit_nodes[to], ());
        }
    }

    tarjan_scc(&unit_graph)
        .into_iter()
        .filter(|scc| scc.len() > 1)
        .flatten()
        .map(|n| unit_graph[n])
        .collect()
}

fn name_units(graph: &ModuleGraph, drafts: Vec<Draft>) -> Vec<ConversionUnit> {
    let base_name = |package: &str| {
        if package.is_empty() {
            ROOT_PACKAGE_NAME.to_string()
        } else {
            package.to_string()
        }
    };

    let mut totals: HashMap<String, usize> = HashMap::new();
    for draft in &drafts {
        *totals.entry(base_name(&draft.package)).or_insert(0) += 1;
    }

    let mut used: HashSet<String> = HashSet::with_capacity(drafts.len());
    let mut next_suffix: HashMap<String, usize> = HashMap::new();
    let mut units = Vec::with_capacity(drafts.len());

    for draft in drafts {
        let base = base_name(&draft.package);
        let name = if totals[&base] == 1 && !used.contains(&base) {
            base
        } else {
            let suffix = next_suffix.entry(base.clone()).or_insert(1);
            loop {
                let candidate = format!("{base}-{suffix}");
                *suffix += 1;
                if !used.contains(&candidate) && !totals.contains_key(&candidate) {
                    break candidate;
                }
            }
        };
        used.insert(name.clone());

        let mut metrics = UnitMetrics {
            modules: draft.nodes.len(),
            ..UnitMetrics::default()
        };
        for &node in &draft.nodes {
            let module = &graph[node];
            metrics.loc += module.loc;
            metrics.findings.merge(&module.findings);
        }

        units.push(ConversionUnit {
            name,
            kind: draft.kind,
            package: draft.package,
            members: draft.nodes.iter().map(|&n| graph[n].id.clone()).collect(),
            metrics,
            nodes: draft.nodes,
        });
    }

    units
}

fn check_partition(graph: &ModuleGraph, units: &[ConversionUnit]) -> Result<()> {
    let mut claims = vec![0usize; graph.module_count()];
    for unit in units {
        for node in unit.nodes() {
            claims[node.index()] += 1;
        }
    }
    if let Some((index, &count)) = claims.iter().enumerate().find(|(_, c)| **c != 1) {
        return Err(InvariantViolation::Partition {
            module: graph[NodeIndex::new(index)].id.to_string(),
            count,
        }
        .into());
    }
    Ok(())
}
