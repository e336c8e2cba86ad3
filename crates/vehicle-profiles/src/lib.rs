//! Vehicle profile compiler
//!
//! Turns a directory tree of hand-written vehicle profile fragments into one
//! canonical artifact consumed by firmware, plus two generated Markdown
//! documents:
//! - Single-parent inheritance through `extends`, with per-parameter overrides
//!   and empty-expression disables
//! - Parameter enrichment from a shared parameter library
//! - Per-folder vehicle notes
//! - JSON schema enum synchronization and aggregated fragment validation
//! - Deterministic, idempotent output written atomically
//!
//! # Architecture
//!
//! - [`params`]: the parameter library
//! - [`fragment`]: fragment data model and parsing
//! - [`storage`]: fragment discovery, loading and atomic writes
//! - [`resolver`]: extends chain walking and PID table merging
//! - [`enrich`]: parameter enrichment and compiled profile types
//! - [`note`]: note file lookup
//! - [`schema`]: schema enum sync and validation
//! - [`emit`]: artifact and document rendering
//! - [`compiler`]: the build pipeline tying the above together
//! - [`config`]: build configuration
//! - [`error`]: error types
//!
//! # Error Recovery
//!
//! A fragment without a usable `pids` table is logged and skipped. Every
//! other error fails the build. Compilation and rendering finish before the
//! first write, and each file is replaced atomically. Schema validation runs
//! alongside output generation, so a validation failure may follow a
//! successful write.
//!
//! # Example
//!
//! ```ignore
//! use vehicle_profiles::prelude::*;
//!
//! # async fn example() -> vehicle_profiles::Result<()> {
//! let compiler = ProfileCompiler::new(BuildConfig::for_root("."))?;
//! let summary = compiler.build().await?;
//! println!("{} profiles", summary.profiles);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod compiler;
pub mod config;
pub mod emit;
pub mod enrich;
pub mod error;
pub mod fragment;
pub mod note;
pub mod params;
pub mod prelude;
pub mod resolver;
pub mod schema;
pub mod storage;

pub use compiler::{BuildSummary, CheckReport, ProfileCompiler};
pub use config::{BuildConfig, DocsConfig};
pub use emit::{Artifact, RenderedOutputs};
pub use enrich::{EnrichedParameter, ResolvedPid, ResolvedProfile};
pub use error::{CompileError, ValidationFailure};
pub use fragment::{PidEntry, ProfileFragment};
pub use params::{ParameterDefinition, ParameterLibrary};
pub use storage::{FileStorage, FragmentSource, MemorySource};

/// Result type for compiler operations
pub type Result<T> = std::result::Result<T, CompileError>;
