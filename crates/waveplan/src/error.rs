//! Error types for waveplan operations.
//!
//! Every fatal condition halts planning before a plan is emitted:
//!
//! - **`GraphIntegrityError`**: the input graph is malformed (user can fix)
//! - **Configuration**: an option is out of range (user can fix)
//! - **`InvariantViolation`**: the engine broke one of its own guarantees (we need to fix)
//! - **I/O and parse errors**: reading inputs or writing the plan failed
//!
//! Missing coverage or risk tags are *not* errors. They are recorded as
//! annotations on the plan (see [`crate::risk::RiskFlag`]).

use std::path::PathBuf;
use thiserror::Error;

/// Result type for waveplan operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for waveplan operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The dependency graph is malformed
    #[error("graph integrity error: {0}")]
    GraphIntegrity(#[from] GraphIntegrityError),

    /// Invalid configuration or arguments
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An engine invariant was violated
    #[error("invariant violation (engine defect): {0}")]
    InvariantViolation(#[from] InvariantViolation),

    /// File system operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An input file could not be read
    #[error("failed to read {}: {source}", path.display())]
    ReadFile {
        /// File being read
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// A JSON document could not be read or written
    #[error("invalid JSON in {}: {source}", path.display())]
    Json {
        /// File being processed
        path: PathBuf,
        /// Underlying parse error
        source: serde_json::Error,
    },

    /// A YAML configuration file could not be parsed
    #[error("invalid YAML in {}: {source}", path.display())]
    Yaml {
        /// File being processed
        path: PathBuf,
        /// Underlying parse error
        source: serde_yaml::Error,
    },
}

impl Error {
    /// Wrap an I/O error with the path that was being read.
    #[must_use]
    pub fn read_file(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::ReadFile {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Process exit code for this error.
    ///
    /// | Code | Meaning |
    /// |------|---------|
    /// | 1 | I/O or parse failure |
    /// | 2 | graph integrity |
    /// | 3 | configuration |
    /// | 4 | invariant violation |
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Io(_) | Self::ReadFile { .. } | Self::Json { .. } | Self::Yaml { .. } => 1,
            Self::GraphIntegrity(_) => 2,
            Self::Configuration(_) => 3,
            Self::InvariantViolation(_) => 4,
        }
    }

    /// Returns `true` if the error was caused by bad input rather than an engine defect.
    #[must_use]
    pub fn is_input_error(&self) -> bool {
        !matches!(self, Self::InvariantViolation(_))
    }
}

/// Ways an input graph can be malformed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphIntegrityError {
    /// An edge names a module that is not in the node set
    #[error("edge {from} -> {to} references unknown module '{missing}'")]
    UnknownModule {
        /// Edge source
        from: String,
        /// Edge target
        to: String,
        /// The endpoint that does not exist
        missing: String,
    },

    /// A self-loop survived pre-processing
    #[error("self-loop on module '{module}' survived pre-processing")]
    SelfLoop {
        /// Module with the self-loop
        module: String,
    },

    /// Two modules share an identifier
    #[error("module id '{id}' appears more than once")]
    DuplicateModule {
        /// The colliding identifier
        id: String,
    },

    /// A module has a blank identifier
    #[error("module at position {index} has an empty id")]
    EmptyModuleId {
        /// Position of the module in its payload
        index: usize,
    },

    /// Coverage fraction outside [0, 1]
    #[error("module '{module}' has coverage {coverage}, expected a fraction in [0, 1]")]
    InvalidCoverage {
        /// Offending module
        module: String,
        /// The rejected value
        coverage: f64,
    },
}

/// A broken engine guarantee. Seeing one of these means a bug in waveplan,
/// not bad input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    /// The unit condensation graph contains a cycle
    #[error("condensation graph is cyclic; units in cycle: {}", units.join(", "))]
    CyclicCondensation {
        /// Names of the units forming the strongly connected component
        units: Vec<String>,
    },

    /// A unit is not scheduled strictly after one of its prerequisites
    #[error(
        "unit '{dependent}' (wave {dependent_wave}) is not after prerequisite '{prerequisite}' (wave {prerequisite_wave})"
    )]
    WaveOrder {
        /// Unit that must be migrated first
        prerequisite: String,
        /// Wave of the prerequisite
        prerequisite_wave: usize,
        /// Unit that depends on it
        dependent: String,
        /// Wave of the dependent
        dependent_wave: usize,
    },

    /// A module is missing from, or duplicated across, conversion units
    #[error("module '{module}' is assigned to {count} conversion units, expected exactly 1")]
    Partition {
        /// Offending module
        module: String,
        /// How many units claim it
        count: usize,
    },
}
