//! Recipe descriptors and their byte sources.

use std::fmt;
use std::io::{BufReader, Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Provides a fresh byte stream over a recipe document.
pub trait RecipeSource: Send + Sync + fmt::Debug {
    /// Open the document for reading.
    fn open(&self) -> std::io::Result<Box<dyn Read + Send>>;
}

/// Recipe stored in a file on disk.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecipeSource for FileSource {
    fn open(&self) -> std::io::Result<Box<dyn Read + Send>> {
        let file = std::fs::File::open(&self.path)?;
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Recipe held in memory.
#[derive(Clone)]
pub struct InlineSource {
    bytes: Arc<[u8]>,
}

impl InlineSource {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        let bytes: Vec<u8> = bytes.into();
        Self {
            bytes: Arc::from(bytes),
        }
    }
}

impl fmt::Debug for InlineSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InlineSource")
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl RecipeSource for InlineSource {
    fn open(&self) -> std::io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(Cursor::new(self.bytes.clone())))
    }
}

/// Identifies a recipe to execute.
///
/// Immutable once built; nested recipes get their own descriptor.
#[derive(Debug, Clone)]
pub struct RecipeDescriptor {
    /// Display name used in logs.
    pub name: String,

    /// Directory that relative references inside the recipe resolve against.
    pub base_path: PathBuf,

    /// Whether each step must run in a freshly created scope.
    pub require_new_scope: bool,

    source: Arc<dyn RecipeSource>,
}

impl RecipeDescriptor {
    /// Create a descriptor over any source.
    pub fn new(
        name: impl Into<String>,
        base_path: impl Into<PathBuf>,
        source: Arc<dyn RecipeSource>,
    ) -> Self {
        Self {
            name: name.into(),
            base_path: base_path.into(),
            require_new_scope: false,
            source,
        }
    }

    /// Describe a recipe file. The base path is the file's directory.
    pub fn from_file(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        let base_path = path.parent().map(Path::to_path_buf).unwrap_or_default();

        Self::new(name, base_path, Arc::new(FileSource::new(path)))
    }

    /// Describe an in-memory recipe.
    pub fn inline(name: impl Into<String>, json: impl Into<Vec<u8>>) -> Self {
        Self::new(name, PathBuf::new(), Arc::new(InlineSource::new(json)))
    }

    /// Set the base path.
    pub fn with_base_path(mut self, base_path: impl Into<PathBuf>) -> Self {
        self.base_path = base_path.into();
        self
    }

    /// Require an isolated scope for every step.
    pub fn with_new_scope(mut self, require_new_scope: bool) -> Self {
        self.require_new_scope = require_new_scope;
        self
    }

    /// Open the underlying document.
    pub fn open(&self) -> std::io::Result<Box<dyn Read + Send>> {
        self.source.open()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_descriptor() {
        let descriptor = RecipeDescriptor::inline("blog", r#"{"steps":[]}"#);
        assert_eq!(descriptor.name, "blog");
        assert!(!descriptor.require_new_scope);

        let mut text = String::new();
        descriptor.open().unwrap().read_to_string(&mut text).unwrap();
        assert_eq!(text, r#"{"steps":[]}"#);

        // Each open starts from the beginning.
        let mut again = String::new();
        descriptor.open().unwrap().read_to_string(&mut again).unwrap();
        assert_eq!(again, text);
    }

    #[test]
    fn test_file_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("setup.recipe.json");
        std::fs::write(&path, "{}").unwrap();

        let descriptor = RecipeDescriptor::from_file(&path).with_new_scope(true);
        assert_eq!(descriptor.name, "setup.recipe");
        assert_eq!(descriptor.base_path, dir.path());
        assert!(descriptor.require_new_scope);

        let mut text = String::new();
        descriptor.open().unwrap().read_to_string(&mut text).unwrap();
        assert_eq!(text, "{}");
    }

    #[test]
    fn test_missing_file() {
        let descriptor = RecipeDescriptor::from_file("/nonexistent/recipe.json");
        assert!(descriptor.open().is_err());
    }
}
