//! Error types for profile compilation

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while compiling the vehicle profile tree
#[derive(Error, Debug)]
pub enum CompileError {
    /// IO error on a specific file
    #[error("IO error on {path}: {source}")]
    Io {
        /// The file or directory involved
        path: PathBuf,
        /// Source error
        source: std::io::Error,
    },

    /// JSON syntax or structure error in a mandatory file
    #[error("JSON error in {path}: {source}")]
    Json {
        /// The offending file
        path: PathBuf,
        /// Source error
        source: serde_json::Error,
    },

    /// The parameter library does not have the expected shape
    #[error("Invalid parameter library {path}: {reason}")]
    ParameterLibrary {
        /// Path to the library file
        path: PathBuf,
        /// The reason for the error
        reason: String,
    },

    /// A fragment has no usable `pids` table or an otherwise unusable shape
    #[error("Invalid profile fragment {path}: {reason}")]
    InvalidFragment {
        /// The offending fragment
        path: PathBuf,
        /// The reason for the error
        reason: String,
    },

    /// A fragment referenced through `extends` could not be used
    #[error("Malformed ancestor {ancestor} of {leaf}: {reason}")]
    MalformedAncestor {
        /// The fragment being resolved
        leaf: PathBuf,
        /// The ancestor that failed
        ancestor: PathBuf,
        /// The reason for the error
        reason: String,
    },

    /// An expression names a parameter missing from the parameter library
    #[error("Unknown parameter '{parameter}' in {fragment}")]
    UnknownParameter {
        /// The fragment the parameter came from
        fragment: PathBuf,
        /// The parameter name
        parameter: String,
    },

    /// An extends chain refers back to one of its own members
    #[error("Cyclic inheritance detected: {chain}")]
    CyclicInheritance {
        /// The chain that was walked, ending at the repeated fragment
        chain: String,
    },

    /// An extends chain is longer than allowed
    #[error("Inheritance depth exceeded for {leaf}: {depth} levels (max: {max_depth})")]
    InheritanceDepthExceeded {
        /// The fragment being resolved
        leaf: PathBuf,
        /// The depth reached
        depth: usize,
        /// Maximum allowed depth
        max_depth: usize,
    },

    /// Zero or several files matched a generated document location
    #[error("Unable to determine document target for '{pattern}' under {root}: {found} candidates")]
    DocumentTarget {
        /// The pattern that was searched
        pattern: String,
        /// The docs root that was searched
        root: PathBuf,
        /// The number of matching files
        found: usize,
    },

    /// A configured pattern is not a valid regular expression
    #[error("Invalid pattern '{pattern}': {source}")]
    Pattern {
        /// The pattern text
        pattern: String,
        /// Source error
        source: regex::Error,
    },

    /// The JSON schema could not be compiled
    #[error("Schema compilation error in {path}: {reason}")]
    SchemaCompilation {
        /// Path to the schema file
        path: PathBuf,
        /// The reason for the error
        reason: String,
    },

    /// The enum path inside the schema crosses a non-object value
    #[error("Cannot set '{enum_path}' in {path}: '{segment}' is not an object")]
    SchemaPath {
        /// Path to the schema file
        path: PathBuf,
        /// The full dotted path
        enum_path: String,
        /// The segment that could not be traversed
        segment: String,
    },

    /// One or more fragments failed schema validation
    #[error("Schema validation failed for {} fragment(s)", failures.len())]
    SchemaValidation {
        /// Every failing fragment with its messages
        failures: Vec<ValidationFailure>,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A fan-out task panicked or was cancelled
    #[error("Task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl CompileError {
    /// Check if this error only affects the fragment it was raised for
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::InvalidFragment { .. } => true,
            Self::Io { .. }
            | Self::Json { .. }
            | Self::ParameterLibrary { .. }
            | Self::MalformedAncestor { .. }
            | Self::UnknownParameter { .. }
            | Self::CyclicInheritance { .. }
            | Self::InheritanceDepthExceeded { .. }
            | Self::DocumentTarget { .. }
            | Self::Pattern { .. }
            | Self::SchemaCompilation { .. }
            | Self::SchemaPath { .. }
            | Self::SchemaValidation { .. }
            | Self::Config(_)
            | Self::Join(_) => false,
        }
    }

    /// Check if this error comes from walking an extends chain
    pub fn is_inheritance_error(&self) -> bool {
        matches!(
            self,
            Self::CyclicInheritance { .. }
                | Self::InheritanceDepthExceeded { .. }
                | Self::MalformedAncestor { .. }
        )
    }

    /// Create an IO error
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a JSON error
    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }

    /// Create an invalid fragment error
    pub fn invalid_fragment(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidFragment {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a parameter library error
    pub fn parameter_library(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ParameterLibrary {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Schema violations collected for a single raw fragment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    /// The fragment that failed
    pub path: PathBuf,
    /// Validator messages, in validator order
    pub errors: Vec<String>,
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.path.display())?;
        for error in &self.errors {
            writeln!(f, "  - {error}")?;
        }
        Ok(())
    }
}
