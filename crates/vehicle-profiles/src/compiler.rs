//! Build pipeline
//!
//! [`ProfileCompiler`] wires the components together. Per-fragment work fans
//! out over a bounded [`JoinSet`]; every task returns its own result and the
//! results are aggregated after the join, so no task touches shared mutable
//! state.

use crate::config::BuildConfig;
use crate::emit::{
    Artifact, PARAMETERS_TEMPLATE, RenderedFile, RenderedOutputs, VEHICLES_TEMPLATE,
    load_template, locate_document, locate_parameters_document, parameter_rows, render_document,
    vehicle_rows,
};
use crate::enrich::{ResolvedProfile, enrich_profile};
use crate::error::{CompileError, ValidationFailure};
use crate::note::{NoteResolver, parenthesize};
use crate::params::ParameterLibrary;
use crate::resolver::InheritanceResolver;
use crate::schema::{SchemaValidator, schema_is_current, sync_schema};
use crate::storage::{FileStorage, FragmentSource, read_optional, write_atomic};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tokio::task::JoinSet;
use tracing::{Instrument, debug, error, info, warn};

/// Outcome of a successful [`ProfileCompiler::build`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSummary {
    /// Profiles in the artifact
    pub profiles: usize,
    /// Profiles listed in the vehicles document
    pub documented: usize,
    /// Whether the schema enumeration was rewritten
    pub schema_updated: bool,
    /// Files written, artifact first
    pub written: Vec<PathBuf>,
}

/// Outcome of [`ProfileCompiler::check`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckReport {
    /// Outputs whose on-disk content differs from a fresh build
    pub stale: Vec<PathBuf>,
}

impl CheckReport {
    /// True when nothing would change on rebuild
    pub fn is_current(&self) -> bool {
        self.stale.is_empty()
    }
}

/// Everything a fragment task needs, shared read-only between tasks
struct FragmentContext {
    storage: FileStorage,
    notes: NoteResolver,
    library: Arc<ParameterLibrary>,
    max_depth: usize,
}

impl FragmentContext {
    async fn compile_fragment(&self, key: &Path) -> Result<ResolvedProfile, CompileError> {
        let leaf = self.storage.load(key).await?;
        let resolution = InheritanceResolver::new(&self.storage, self.max_depth)
            .resolve(key, leaf)
            .await?;

        let mut profile = enrich_profile(
            key,
            resolution.profile,
            &self.library,
            &resolution.origins,
        )?;
        profile.note = match profile.note.take().filter(|note| !note.trim().is_empty()) {
            Some(note) => Some(parenthesize(&note)),
            None => self.notes.resolve(key, &profile.car_model).await?,
        };
        Ok(profile)
    }

    async fn compile_or_skip(&self, key: &Path) -> Result<Option<ResolvedProfile>, CompileError> {
        match self.compile_fragment(key).await {
            Ok(profile) => Ok(Some(profile)),
            Err(e) if e.is_recoverable() => {
                warn!(path = ?key, error = %e, "Skipping profile fragment");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

/// Compiles the fragment tree into the artifact and documents
pub struct ProfileCompiler {
    config: BuildConfig,
    storage: FileStorage,
    notes: NoteResolver,
    library: OnceCell<Arc<ParameterLibrary>>,
}

impl ProfileCompiler {
    /// Create a compiler for `config`
    pub fn new(config: BuildConfig) -> Result<Self, CompileError> {
        config.check()?;
        let storage = FileStorage::new(&config.profiles_dir);
        let notes = NoteResolver::new(&config.profiles_dir, config.note_file.clone());
        Ok(Self {
            config,
            storage,
            notes,
            library: OnceCell::new(),
        })
    }

    /// The configuration this compiler was built with
    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Load the parameter library once; later calls share the same instance
    pub async fn parameter_library(&self) -> Result<Arc<ParameterLibrary>, CompileError> {
        self.library
            .get_or_try_init(|| async {
                let library = ParameterLibrary::load(&self.config.params_path).await?;
                info!(path = ?self.config.params_path, parameters = library.len(), "Loaded parameter library");
                Ok::<_, CompileError>(Arc::new(library))
            })
            .await
            .map(Arc::clone)
    }

    /// Resolve, enrich and sort every fragment; writes nothing
    pub async fn compile(&self) -> Result<Artifact, CompileError> {
        let library = self.parameter_library().await?;
        let keys = self.storage.list_fragment_keys().await?;
        info!(fragments = keys.len(), "Compiling profile fragments");

        let context = Arc::new(FragmentContext {
            storage: self.storage.clone(),
            notes: self.notes.clone(),
            library,
            max_depth: self.config.max_inheritance_depth,
        });

        let results = fan_out(keys, self.config.max_concurrency, |key| {
            let context = Arc::clone(&context);
            async move { context.compile_or_skip(&key).await }
        })
        .await?;

        let cars: Vec<ResolvedProfile> = results.into_iter().flatten().collect();
        info!(profiles = cars.len(), "Compiled profiles");
        Ok(Artifact::new(cars))
    }

    /// Render the artifact and both documents in memory
    pub async fn render(&self, artifact: &Artifact) -> Result<RenderedOutputs, CompileError> {
        let library = self.parameter_library().await?;
        let docs = &self.config.docs;

        let vehicles_path = locate_document(&docs.root, &docs.vehicles_pattern)?;
        let parameters_path = locate_parameters_document(docs, &vehicles_path)?;
        debug!(vehicles = ?vehicles_path, parameters = ?parameters_path, "Resolved document targets");

        let vehicles_template =
            load_template(docs.vehicles_template.as_deref(), VEHICLES_TEMPLATE).await?;
        let parameters_template =
            load_template(docs.parameters_template.as_deref(), PARAMETERS_TEMPLATE).await?;

        let artifact_json = artifact
            .to_json(self.config.pretty)
            .map_err(|e| CompileError::json(&self.config.artifact_path, e))?;

        Ok(RenderedOutputs {
            artifact: RenderedFile {
                path: self.config.artifact_path.clone(),
                content: artifact_json,
            },
            vehicles: RenderedFile {
                path: vehicles_path,
                content: render_document(&vehicles_template, &vehicle_rows(artifact)),
            },
            parameters: RenderedFile {
                path: parameters_path,
                content: render_document(&parameters_template, &parameter_rows(&library)),
            },
        })
    }

    /// Write every rendered output atomically
    pub async fn emit(&self, outputs: &RenderedOutputs) -> Result<Vec<PathBuf>, CompileError> {
        let mut written = Vec::new();
        for file in outputs.files() {
            write_atomic(&file.path, &file.content).await?;
            info!(path = ?file.path, bytes = file.content.len(), "Wrote output");
            written.push(file.path.clone());
        }
        Ok(written)
    }

    /// Bring the schema's parameter enumeration in line with the library
    pub async fn sync_schema(&self) -> Result<bool, CompileError> {
        let library = self.parameter_library().await?;
        sync_schema(&self.config.schema_path, &self.config.schema_enum_path, &library).await
    }

    /// Validate every raw fragment against the schema
    ///
    /// Every failing fragment is reported, not only the first.
    pub async fn validate(&self) -> Result<usize, CompileError> {
        let validator = Arc::new(SchemaValidator::load(&self.config.schema_path).await?);
        let keys = self.storage.list_fragment_keys().await?;
        let count = keys.len();

        let storage = self.storage.clone();
        let results = fan_out(keys, self.config.max_concurrency, |key| {
            let validator = Arc::clone(&validator);
            let storage = storage.clone();
            async move {
                let text = storage.read_to_string(&key).await?;
                Ok::<_, CompileError>(validator.check_text(&storage.path_of(&key), &text))
            }
        })
        .await?;

        let mut failures: Vec<ValidationFailure> = results.into_iter().flatten().collect();
        if failures.is_empty() {
            info!(fragments = count, "All profile fragments are valid");
            return Ok(count);
        }

        failures.sort_by(|a, b| a.path.cmp(&b.path));
        for failure in &failures {
            error!(path = ?failure.path, errors = failure.errors.len(), "Schema validation failed");
        }
        Err(CompileError::SchemaValidation { failures })
    }

    /// Compile and emit the outputs while syncing and validating the schema
    pub async fn build(&self) -> Result<BuildSummary, CompileError> {
        let outputs = async {
            let artifact = self.compile().await?;
            let rendered = self.render(&artifact).await?;
            let written = self.emit(&rendered).await?;
            Ok::<_, CompileError>((artifact.cars.len(), artifact.documented().count(), written))
        };
        let schema = async {
            let updated = self.sync_schema().await?;
            self.validate().await?;
            Ok::<_, CompileError>(updated)
        };

        match tokio::join!(outputs, schema) {
            (Ok((profiles, documented, written)), Ok(schema_updated)) => Ok(BuildSummary {
                profiles,
                documented,
                schema_updated,
                written,
            }),
            (Err(e), Ok(_)) | (Ok(_), Err(e)) => Err(e),
            (Err(outputs_error), Err(schema_error)) => {
                error!(error = %outputs_error, "Output generation failed");
                Err(schema_error)
            }
        }
    }

    /// Report outputs a build would change, without writing anything
    pub async fn check(&self) -> Result<CheckReport, CompileError> {
        let artifact = self.compile().await?;
        let rendered = self.render(&artifact).await?;

        let mut report = CheckReport::default();
        for file in rendered.files() {
            let current = read_optional(&file.path).await?;
            if current.as_deref() != Some(file.content.as_str()) {
                debug!(path = ?file.path, "Output is out of date");
                report.stale.push(file.path.clone());
            }
        }

        let library = self.parameter_library().await?;
        if !schema_is_current(&self.config.schema_path, &self.config.schema_enum_path, &library)
            .await?
        {
            report.stale.push(self.config.schema_path.clone());
        }
        Ok(report)
    }
}

/// Run `task` for every key with at most `limit` tasks in flight
///
/// The first error aborts the remaining tasks.
async fn fan_out<T, F, Fut>(keys: Vec<PathBuf>, limit: usize, task: F) -> Result<Vec<T>, CompileError>
where
    T: Send + 'static,
    F: Fn(PathBuf) -> Fut,
    Fut: Future<Output = Result<T, CompileError>> + Send + 'static,
{
    let mut tasks = JoinSet::new();
    let mut results = Vec::with_capacity(keys.len());

    for key in keys {
        if tasks.len() >= limit {
            if let Some(joined) = tasks.join_next().await {
                results.push(joined??);
            }
        }
        tasks.spawn(task(key).in_current_span());
    }
    while let Some(joined) = tasks.join_next().await {
        results.push(joined??);
    }

    Ok(results)
}
