//! Convenience re-exports for common types

pub use crate::compiler::{BuildSummary, CheckReport, ProfileCompiler};
pub use crate::config::{BuildConfig, DocsConfig};
pub use crate::emit::{Artifact, RenderedFile, RenderedOutputs};
pub use crate::enrich::{EnrichedParameter, ResolvedPid, ResolvedProfile};
pub use crate::error::{CompileError, ValidationFailure};
pub use crate::fragment::{GENERIC_CAR_MODEL, PidEntry, ProfileFragment};
pub use crate::params::{ParameterDefinition, ParameterLibrary};
pub use crate::resolver::{InheritanceResolver, ParameterOrigins, Resolution};
pub use crate::storage::{FileStorage, FragmentSource, MemorySource};
