//! Input payloads produced by the external codebase analyzer.
//!
//! A payload is a JSON document listing modules and import edges. Several
//! payloads (one per analyzed source root, say) can be merged before the
//! module graph is built. See [`input_schema`] for the machine-readable shape.

use crate::domain::{RiskTag, Severity};
use crate::error::{Error, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A dependency graph payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct GraphInput {
    /// Modules (nodes)
    #[serde(default)]
    pub modules: Vec<ModuleInput>,

    /// Import relationships (edges)
    #[serde(default)]
    pub edges: Vec<EdgeInput>,
}

/// One module as reported by the analyzer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ModuleInput {
    /// Stable path identifier
    pub id: String,

    /// Lines of code
    #[serde(default)]
    pub loc: u64,

    /// Finding counts by severity
    #[serde(default)]
    pub findings: Vec<FindingInput>,

    /// Test coverage fraction in [0, 1]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coverage: Option<f64>,

    /// Risk tags; omit when unknown, `[]` when known to have none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_tags: Option<Vec<RiskTag>>,
}

impl ModuleInput {
    /// A module with only an id and line count.
    pub fn new(id: impl Into<String>, loc: u64) -> Self {
        Self {
            id: id.into(),
            loc,
            findings: Vec::new(),
            coverage: None,
            risk_tags: None,
        }
    }
}

/// A severity-tagged finding count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct FindingInput {
    /// Finding severity
    pub severity: Severity,

    /// Number of findings
    pub count: u64,
}

/// "`from` imports `to`"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct EdgeInput {
    /// Importing module id
    pub from: String,

    /// Imported module id
    pub to: String,

    /// Number of distinct import statements
    #[serde(default = "default_imports")]
    pub imports: u32,
}

impl EdgeInput {
    /// A single-import edge.
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            imports: 1,
        }
    }
}

fn default_imports() -> u32 {
    1
}

impl GraphInput {
    /// Read a payload from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or does not match the schema.
    pub fn load(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|source| Error::read_file(path, source))?;
        let input: Self = serde_json::from_str(&content).map_err(|source| Error::Json {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(
            path = %path.display(),
            modules = input.modules.len(),
            edges = input.edges.len(),
            "Loaded graph payload"
        );
        Ok(input)
    }

    /// Read and merge several payloads, in the order given.
    ///
    /// # Errors
    ///
    /// Returns the first load error.
    pub fn load_all<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let inputs = paths
            .iter()
            .map(|p| Self::load(p.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::merge(inputs))
    }

    /// Concatenate payloads.
    ///
    /// Duplicate module ids are kept so graph construction can report them.
    #[must_use]
    pub fn merge(inputs: impl IntoIterator<Item = GraphInput>) -> Self {
        let mut merged = Self::default();
        for input in inputs {
            merged.modules.extend(input.modules);
            merged.edges.extend(input.edges);
        }
        merged
    }
}

/// JSON Schema describing [`GraphInput`].
#[must_use]
pub fn input_schema() -> schemars::Schema {
    schemars::schema_for!(GraphInput)
}
