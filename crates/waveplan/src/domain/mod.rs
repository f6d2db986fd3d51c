//! Domain types for conversion planning.
//!
//! This module contains the closed vocabularies (severity, risk tags, risk
//! levels) and the module-level records the rest of the engine works on.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

/// Stable identifier for a module (its path)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ModuleId(pub String);

impl ModuleId {
    /// Create a new module ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the ID as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Directory portion of the path, or `""` for top-level modules.
    #[must_use]
    pub fn directory(&self) -> &str {
        self.0.rsplit_once('/').map_or("", |(dir, _)| dir)
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Borrow<str> for ModuleId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ModuleId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ModuleId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Severity of a migration-relevant finding
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Will break at runtime after conversion
    Critical,

    /// Likely to break, needs manual attention
    High,

    /// Behavior change possible
    Medium,

    /// Cosmetic or mechanical
    Low,
}

impl Severity {
    /// Weight of one finding of this severity in density calculations.
    #[must_use]
    pub fn weight(self) -> u64 {
        match self {
            Self::Critical => 10,
            Self::High => 5,
            Self::Medium => 2,
            Self::Low => 1,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Critical => write!(f, "critical"),
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
        }
    }
}

/// Externally supplied risk attribute of a module
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "kebab-case")]
pub enum RiskTag {
    /// Reads or writes a binary wire format
    BinaryProtocol,

    /// Serializes or deserializes persisted data
    Serialization,

    /// Mixes text and bytes without an explicit encoding
    EncodingAmbiguity,

    /// Has no tests at all
    NoTests,
}

impl RiskTag {
    /// Returns `true` for tags that mark data-sensitive code.
    #[must_use]
    pub fn is_data_sensitive(self) -> bool {
        match self {
            Self::BinaryProtocol | Self::Serialization | Self::EncodingAmbiguity => true,
            Self::NoTests => false,
        }
    }
}

impl fmt::Display for RiskTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BinaryProtocol => write!(f, "binary-protocol"),
            Self::Serialization => write!(f, "serialization"),
            Self::EncodingAmbiguity => write!(f, "encoding-ambiguity"),
            Self::NoTests => write!(f, "no-tests"),
        }
    }
}

/// Ordinal risk scale for conversion units
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    /// Routine conversion
    Low,

    /// Needs review
    Medium,

    /// Needs a dedicated reviewer and extra testing
    High,

    /// Needs a plan of its own
    Critical,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Finding counts keyed by severity.
///
/// Stored as a `BTreeMap` so serialized output has a fixed key order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FindingCounts(BTreeMap<Severity, u64>);

impl FindingCounts {
    /// Create an empty set of counts
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `count` findings of `severity`.
    pub fn add(&mut self, severity: Severity, count: u64) {
        if count > 0 {
            *self.0.entry(severity).or_insert(0) += count;
        }
    }

    /// Number of findings of `severity`.
    #[must_use]
    pub fn get(&self, severity: Severity) -> u64 {
        self.0.get(&severity).copied().unwrap_or(0)
    }

    /// Total number of findings regardless of severity.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.0.values().sum()
    }

    /// Severity-weighted finding total.
    #[must_use]
    pub fn weighted(&self) -> u64 {
        self.0.iter().map(|(sev, count)| sev.weight() * count).sum()
    }

    /// Merge another set of counts into this one.
    pub fn merge(&mut self, other: &FindingCounts) {
        for (sev, count) in &other.0 {
            self.add(*sev, *count);
        }
    }
}

/// One source module, as ingested
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleNode {
    /// Stable identifier (path)
    pub id: ModuleId,

    /// Lines of code
    pub loc: u64,

    /// Migration-relevant findings by severity
    pub findings: FindingCounts,

    /// Test coverage fraction, if known
    pub coverage: Option<f64>,

    /// Externally supplied risk tags; `None` means nobody said
    pub risk_tags: Option<Vec<RiskTag>>,

    /// Number of distinct modules importing this one
    pub fan_in: usize,

    /// Number of distinct modules this one imports
    pub fan_out: usize,
}

impl ModuleNode {
    /// Severity-weighted findings per thousand lines.
    ///
    /// Zero-line modules are treated as one line long.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn finding_density(&self) -> f64 {
        self.findings.weighted() as f64 * 1000.0 / self.loc.max(1) as f64
    }

    /// Returns `true` if any tag marks this module as data-sensitive.
    #[must_use]
    pub fn is_data_sensitive(&self) -> bool {
        self.risk_tags
            .as_deref()
            .is_some_and(|tags| tags.iter().any(|t| t.is_data_sensitive()))
    }

    /// Returns `true` if the module is tagged as having no tests.
    #[must_use]
    pub fn has_no_tests(&self) -> bool {
        self.risk_tags
            .as_deref()
            .is_some_and(|tags| tags.contains(&RiskTag::NoTests))
    }
}

/// Directed relation "`from` imports `to`"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyEdge {
    /// Importing module
    pub from: ModuleId,

    /// Imported module
    pub to: ModuleId,

    /// Number of distinct import statements
    pub weight: u32,
}
