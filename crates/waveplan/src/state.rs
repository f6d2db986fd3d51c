//! Read-only access to the external migration state store.
//!
//! The state store belongs to whoever tracks conversion progress. The planner
//! only reads risk attributes from it, through [`RiskAttributeSource`], and
//! never writes back.
//!
//! # State file format
//!
//! ```json
//! {
//!   "modules": {
//!     "pkg/codec.py": { "coverage": 0.4, "risk_tags": ["binary-protocol"], "phase": "pending" }
//!   }
//! }
//! ```

use crate::domain::{ModuleId, RiskTag};
use crate::error::{Error, Result};
use crate::ingest::GraphInput;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;

/// Conversion progress of a module, as tracked externally
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    /// Not started
    Pending,

    /// Being converted
    InProgress,

    /// Converted, not yet verified
    Converted,

    /// Converted and verified
    Verified,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "in-progress"),
            Self::Converted => write!(f, "converted"),
            Self::Verified => write!(f, "verified"),
        }
    }
}

/// Risk attributes known for one module
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RiskAttributes {
    /// Test coverage fraction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coverage: Option<f64>,

    /// Risk tags
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_tags: Option<Vec<RiskTag>>,

    /// Progress phase; counted and shown, never used for planning
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
}

/// Source of per-module risk attributes.
pub trait RiskAttributeSource {
    /// Attributes for a module, if the source knows it.
    fn attributes(&self, id: &ModuleId) -> Option<&RiskAttributes>;

    /// Every module id the source has attributes for, ascending.
    fn module_ids(&self) -> Vec<&ModuleId>;
}

/// State store backed by a JSON file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StateFile {
    #[serde(default)]
    modules: BTreeMap<ModuleId, RiskAttributes>,
}

impl StateFile {
    /// Read a state file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|source| Error::read_file(path, source))?;
        let state: Self = serde_json::from_str(&content).map_err(|source| Error::Json {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(
            path = %path.display(),
            modules = state.modules.len(),
            "Loaded prior state"
        );
        Ok(state)
    }
}

impl From<BTreeMap<ModuleId, RiskAttributes>> for StateFile {
    fn from(modules: BTreeMap<ModuleId, RiskAttributes>) -> Self {
        Self { modules }
    }
}

impl RiskAttributeSource for StateFile {
    fn attributes(&self, id: &ModuleId) -> Option<&RiskAttributes> {
        self.modules.get(id)
    }

    fn module_ids(&self) -> Vec<&ModuleId> {
        self.modules.keys().collect()
    }
}

/// Outcome of an enrichment pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichmentStats {
    /// Modules whose attributes were updated
    pub applied: usize,

    /// Source entries with no matching module
    pub skipped: usize,

    /// Reported progress phase of the matched modules
    pub phases: BTreeMap<Phase, usize>,
}

/// Copy coverage and risk tags from `source` onto the matching input modules.
///
/// Values from the source replace values in the payload; attributes the
/// source leaves out are kept. Entries for unknown modules are skipped with
/// a warning, since the state store may lag behind the analyzed graph.
pub fn enrich(input: &mut GraphInput, source: &dyn RiskAttributeSource) -> EnrichmentStats {
    let positions: HashMap<String, usize> = input
        .modules
        .iter()
        .enumerate()
        .map(|(i, m)| (m.id.trim().to_string(), i))
        .collect();

    let mut stats = EnrichmentStats::default();
    for id in source.module_ids() {
        let Some(&position) = positions.get(id.as_str()) else {
            tracing::warn!(module = %id, "State entry has no matching module; skipping");
            stats.skipped += 1;
            continue;
        };
        let Some(attributes) = source.attributes(id) else {
            continue;
        };

        let module = &mut input.modules[position];
        if let Some(coverage) = attributes.coverage {
            module.coverage = Some(coverage);
        }
        if let Some(tags) = &attributes.risk_tags {
            module.risk_tags = Some(tags.clone());
        }
        if let Some(phase) = attributes.phase {
            *stats.phases.entry(phase).or_insert(0) += 1;
        }
        stats.applied += 1;
    }

    tracing::info!(
        applied = stats.applied,
        skipped = stats.skipped,
        phases = ?stats.phases,
        "Enriched modules from prior state"
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::ModuleInput;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn state(entries: &[(&str, RiskAttributes)]) -> StateFile {
        entries
            .iter()
            .map(|(id, attrs)| (ModuleId::from(*id), attrs.clone()))
            .collect::<BTreeMap<_, _>>()
            .into()
    }

    #[test]
    fn enrich_overrides_known_attributes() {
        let mut input = GraphInput {
            modules: vec![ModuleInput {
                coverage: Some(0.9),
                ..ModuleInput::new("pkg/a.py", 10)
            }],
            edges: vec![],
        };
        let source = state(&[(
            "pkg/a.py",
            RiskAttributes {
                coverage: Some(0.2),
                risk_tags: Some(vec![RiskTag::Serialization]),
                phase: Some(Phase::Pending),
            },
        )]);

        let stats = enrich(&mut input, &source);

        assert_eq!(stats.applied, 1);
        assert_eq!(stats.skipped, 0);
        assert_eq!(stats.phases, BTreeMap::from([(Phase::Pending, 1)]));
        assert_eq!(input.modules[0].coverage, Some(0.2));
        assert_eq!(input.modules[0].risk_tags, Some(vec![RiskTag::Serialization]));
    }

    #[test]
    fn enrich_keeps_attributes_the_source_omits() {
        let mut input = GraphInput {
            modules: vec![ModuleInput {
                coverage: Some(0.9),
                ..ModuleInput::new("a.py", 10)
            }],
            edges: vec![],
        };
        let source = state(&[(
            "a.py",
            RiskAttributes {
                risk_tags: Some(vec![]),
                ..RiskAttributes::default()
            },
        )]);

        enrich(&mut input, &source);

        assert_eq!(input.modules[0].coverage, Some(0.9));
        assert_eq!(input.modules[0].risk_tags, Some(vec![]));
    }

    #[test]
    fn enrich_counts_phases_of_matched_modules() {
        let mut input = GraphInput {
            modules: vec![
                ModuleInput::new("a.py", 10),
                ModuleInput::new("b.py", 10),
                ModuleInput::new("c.py", 10),
            ],
            edges: vec![],
        };
        let phase = |phase| RiskAttributes {
            phase: Some(phase),
            ..RiskAttributes::default()
        };
        let source = state(&[
            ("a.py", phase(Phase::Converted)),
            ("b.py", phase(Phase::Converted)),
            ("c.py", RiskAttributes::default()),
            ("gone.py", phase(Phase::Verified)),
        ]);

        let stats = enrich(&mut input, &source);

        assert_eq!(stats.applied, 3);
        assert_eq!(stats.phases, BTreeMap::from([(Phase::Converted, 2)]));
        assert_eq!(Phase::InProgress.to_string(), "in-progress");
    }

    #[test]
    fn enrich_skips_unknown_modules() {
        let mut input = GraphInput {
            modules: vec![ModuleInput::new("a.py", 10)],
            edges: vec![],
        };
        let source = state(&[("gone.py", RiskAttributes::default())]);

        let stats = enrich(&mut input, &source);

        assert_eq!(stats, EnrichmentStats {
            applied: 0,
            skipped: 1,
            phases: BTreeMap::new(),
        });
        assert_eq!(input.modules[0], ModuleInput::new("a.py", 10));
    }

    #[test]
    fn load_reads_state_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"modules": {{"x.py": {{"coverage": 0.5, "risk_tags": ["no-tests"], "phase": "in-progress"}}}}}}"#
        )
        .unwrap();

        let loaded = StateFile::load(file.path()).unwrap();
        let attrs = loaded.attributes(&ModuleId::from("x.py")).unwrap();

        assert_eq!(attrs.coverage, Some(0.5));
        assert_eq!(attrs.risk_tags, Some(vec![RiskTag::NoTests]));
        assert_eq!(attrs.phase, Some(Phase::InProgress));
    }

    #[test]
    fn load_rejects_unknown_phase() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"modules": {{"x.py": {{"phase": "abandoned"}}}}}}"#).unwrap();

        let err = StateFile::load(file.path()).unwrap_err();
        assert!(matches!(err, Error::Json { .. }));
    }
}
