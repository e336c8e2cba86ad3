//! Fragment storage: discovery, loading and atomic writes

use crate::error::CompileError;
use crate::fragment::ProfileFragment;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use tokio::fs as async_fs;
use tracing::debug;
use walkdir::WalkDir;

/// Anything the resolver can load fragments from
///
/// Keys are paths relative to the profiles directory, as written in
/// `extends` references.
#[async_trait]
pub trait FragmentSource: Send + Sync {
    /// Load and parse the fragment stored under `key`
    async fn load(&self, key: &Path) -> Result<ProfileFragment, CompileError>;
}

/// Lexically normalize a relative fragment key
///
/// Drops `.` components and folds `..` into the preceding component so that
/// `a/../b.json` and `./b.json` name the same fragment.
pub fn normalize_key(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            Component::ParentDir => {
                normalized.pop();
            }
            Component::Normal(part) => normalized.push(part),
        }
    }
    normalized
}

/// File-based fragment storage rooted at the profiles directory
#[derive(Debug, Clone)]
pub struct FileStorage {
    base_dir: PathBuf,
    extension: String,
}

impl FileStorage {
    /// Create storage rooted at `base_dir`
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            extension: "json".to_string(),
        }
    }

    /// Get the base directory
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Absolute location of a fragment key
    pub fn path_of(&self, key: &Path) -> PathBuf {
        self.base_dir.join(normalize_key(key))
    }

    /// Key of a file below the base directory
    pub fn key_of(&self, path: &Path) -> PathBuf {
        normalize_key(path.strip_prefix(&self.base_dir).unwrap_or(path))
    }

    /// List every fragment key under the base directory, sorted
    ///
    /// The directory walk runs on the blocking pool.
    pub async fn list_fragment_keys(&self) -> Result<Vec<PathBuf>, CompileError> {
        let storage = self.clone();
        tokio::task::spawn_blocking(move || storage.walk_fragment_keys()).await?
    }

    fn walk_fragment_keys(&self) -> Result<Vec<PathBuf>, CompileError> {
        let mut keys = Vec::new();
        for entry in WalkDir::new(&self.base_dir).follow_links(true) {
            let entry = entry.map_err(|e| {
                let path = e.path().map_or_else(|| self.base_dir.clone(), Path::to_path_buf);
                CompileError::io(path, e.into())
            })?;
            if entry.file_type().is_file()
                && entry.path().extension().and_then(|s| s.to_str()) == Some(self.extension.as_str())
            {
                keys.push(self.key_of(entry.path()));
            }
        }
        keys.sort();
        debug!(base_dir = ?self.base_dir, count = keys.len(), "Discovered profile fragments");
        Ok(keys)
    }

    /// Read a fragment file as text
    pub async fn read_to_string(&self, key: &Path) -> Result<String, CompileError> {
        let path = self.path_of(key);
        async_fs::read_to_string(&path)
            .await
            .map_err(|e| CompileError::io(path, e))
    }
}

#[async_trait]
impl FragmentSource for FileStorage {
    async fn load(&self, key: &Path) -> Result<ProfileFragment, CompileError> {
        let text = self.read_to_string(key).await?;
        ProfileFragment::from_json(key, &text)
    }
}

/// In-memory fragment source
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    fragments: HashMap<PathBuf, ProfileFragment>,
}

impl MemorySource {
    /// Create an empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a fragment under `key`
    pub fn insert(&mut self, key: impl AsRef<Path>, fragment: ProfileFragment) {
        self.fragments.insert(normalize_key(key.as_ref()), fragment);
    }

    /// Builder-style [`MemorySource::insert`]
    pub fn with(mut self, key: impl AsRef<Path>, fragment: ProfileFragment) -> Self {
        self.insert(key, fragment);
        self
    }
}

#[async_trait]
impl FragmentSource for MemorySource {
    async fn load(&self, key: &Path) -> Result<ProfileFragment, CompileError> {
        self.fragments.get(&normalize_key(key)).cloned().ok_or_else(|| {
            CompileError::io(
                key,
                std::io::Error::new(std::io::ErrorKind::NotFound, "fragment not found"),
            )
        })
    }
}

/// Write content to a file atomically
///
/// Writes a sibling temporary file first and renames it over the target, so
/// an interrupted build never leaves a half-written output behind.
pub async fn write_atomic(path: &Path, content: &str) -> Result<(), CompileError> {
    debug!(path = ?path, "Writing file atomically");

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        async_fs::create_dir_all(parent)
            .await
            .map_err(|e| CompileError::io(parent, e))?;
    }

    let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    async_fs::write(&temp_path, content)
        .await
        .map_err(|e| CompileError::io(&temp_path, e))?;
    async_fs::rename(&temp_path, path)
        .await
        .map_err(|e| CompileError::io(path, e))?;

    Ok(())
}

/// Read a file that may legitimately be absent
pub async fn read_optional(path: &Path) -> Result<Option<String>, CompileError> {
    match async_fs::read_to_string(path).await {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(CompileError::io(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn normalize_key_folds_dots() {
        assert_eq!(normalize_key(Path::new("./ev/../base.json")), PathBuf::from("base.json"));
        assert_eq!(normalize_key(Path::new("ev/kona.json")), PathBuf::from("ev/kona.json"));
    }

    #[tokio::test]
    async fn lists_json_files_recursively() -> TestResult {
        let temp_dir = TempDir::new()?;
        std::fs::create_dir_all(temp_dir.path().join("hyundai"))?;
        std::fs::write(temp_dir.path().join("generic.json"), "{}")?;
        std::fs::write(temp_dir.path().join("hyundai/kona.json"), "{}")?;
        std::fs::write(temp_dir.path().join("hyundai/note.md"), "text")?;

        let storage = FileStorage::new(temp_dir.path());
        let keys = storage.list_fragment_keys().await?;

        assert_eq!(
            keys,
            vec![PathBuf::from("generic.json"), PathBuf::from("hyundai/kona.json")]
        );
        Ok(())
    }

    #[tokio::test(flavor = "current_thread")]
    async fn missing_base_dir_is_io_error() -> TestResult {
        let temp_dir = TempDir::new()?;
        let storage = FileStorage::new(temp_dir.path().join("absent"));

        match storage.list_fragment_keys().await {
            Err(CompileError::Io { path, .. }) => {
                assert_eq!(path, temp_dir.path().join("absent"));
                Ok(())
            }
            other => Err(format!("expected io error, got {other:?}").into()),
        }
    }

    #[tokio::test]
    async fn loads_by_relative_key() -> TestResult {
        let temp_dir = TempDir::new()?;
        std::fs::write(
            temp_dir.path().join("generic.json"),
            r#"{"car_model": "AAA: Generic", "pids": []}"#,
        )?;

        let storage = FileStorage::new(temp_dir.path());
        let fragment = storage.load(Path::new("./generic.json")).await?;
        assert_eq!(fragment.car_model, "AAA: Generic");
        Ok(())
    }

    #[tokio::test]
    async fn missing_fragment_is_io_error() -> TestResult {
        let temp_dir = TempDir::new()?;
        let storage = FileStorage::new(temp_dir.path());
        let result = storage.load(Path::new("nope.json")).await;
        assert!(matches!(result, Err(CompileError::Io { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn atomic_write_creates_parents_and_leaves_no_temp() -> TestResult {
        let temp_dir = TempDir::new()?;
        let target = temp_dir.path().join("out/vehicle_profiles.json");

        write_atomic(&target, r#"{"cars":[]}"#).await?;

        assert_eq!(std::fs::read_to_string(&target)?, r#"{"cars":[]}"#);
        assert!(!temp_dir.path().join("out/vehicle_profiles.json.tmp").exists());
        Ok(())
    }

    #[tokio::test]
    async fn read_optional_tolerates_absence() -> TestResult {
        let temp_dir = TempDir::new()?;
        assert!(read_optional(&temp_dir.path().join("note.md")).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn memory_source_normalizes_keys() -> TestResult {
        let source = MemorySource::new().with(
            "ev/../generic.json",
            ProfileFragment {
                car_model: "AAA: Generic".to_string(),
                ..Default::default()
            },
        );
        let fragment = source.load(Path::new("generic.json")).await?;
        assert_eq!(fragment.car_model, "AAA: Generic");
        Ok(())
    }
}
