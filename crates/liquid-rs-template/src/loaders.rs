//! Template source loaders.
//!
//! `include` and `extends` resolve template names through a
//! [`SourceLoader`]. Three implementations ship with the crate: a
//! filesystem loader, an in-memory map, and a closure-backed loader for
//! virtual sources.

use std::collections::HashMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use liquid_rs_core::{LiquidError, LiquidResult};
use tracing::debug;

/// Reads template source by name.
pub trait SourceLoader: Send + Sync {
    /// Returns the source of template `name`.
    ///
    /// # Errors
    ///
    /// Returns `TemplateDoesNotExist` if there is no such template.
    fn read(&self, name: &str) -> LiquidResult<String>;
}

/// Loads templates from one or more directories, first match wins.
///
/// Names without an extension get the configured default extension, so
/// `{% include 'header' %}` can find `header.liquid`.
#[derive(Debug, Clone)]
pub struct FileSystemLoader {
    dirs: Vec<PathBuf>,
    extension: Option<String>,
}

impl FileSystemLoader {
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self {
            dirs,
            extension: None,
        }
    }

    /// Sets the extension appended to names that have none.
    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        let extension = extension.into();
        self.extension = Some(extension.trim_start_matches('.').to_string());
        self
    }

    /// Maps a template name to a relative path, refusing anything that
    /// could escape the search directories.
    fn relative_path(&self, name: &str) -> LiquidResult<PathBuf> {
        let path = Path::new(name);
        let escapes = path
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if name.is_empty() || escapes {
            return Err(LiquidError::TemplateDoesNotExist(format!(
                "Illegal template name '{name}'"
            )));
        }
        match &self.extension {
            Some(ext) if path.extension().is_none() => Ok(path.with_extension(ext)),
            _ => Ok(path.to_path_buf()),
        }
    }
}

impl SourceLoader for FileSystemLoader {
    fn read(&self, name: &str) -> LiquidResult<String> {
        let relative = self.relative_path(name)?;
        for dir in &self.dirs {
            let path = dir.join(&relative);
            if path.is_file() {
                debug!(template = name, path = %path.display(), "loading template from disk");
                return std::fs::read_to_string(&path).map_err(|e| {
                    LiquidError::TemplateDoesNotExist(format!(
                        "Error reading template '{}': {e}",
                        path.display()
                    ))
                });
            }
        }

        Err(LiquidError::TemplateDoesNotExist(format!(
            "Template '{name}' not found in directories: {:?}",
            self.dirs
        )))
    }
}

/// Holds template sources in memory. Sources can be replaced through a
/// shared reference, which makes it handy for tests and for templates
/// stored outside the filesystem.
#[derive(Debug, Default)]
pub struct StringLoader {
    templates: RwLock<HashMap<String, String>>,
}

impl StringLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(templates: HashMap<String, String>) -> Self {
        Self {
            templates: RwLock::new(templates),
        }
    }

    /// Adds or replaces a template.
    pub fn add(&self, name: impl Into<String>, source: impl Into<String>) {
        self.templates
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), source.into());
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for StringLoader {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_map(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl SourceLoader for StringLoader {
    fn read(&self, name: &str) -> LiquidResult<String> {
        self.templates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| {
                LiquidError::TemplateDoesNotExist(format!("Template '{name}' not found"))
            })
    }
}

/// Produces sources from a closure.
pub struct FnLoader<F> {
    func: F,
}

impl<F> FnLoader<F>
where
    F: Fn(&str) -> LiquidResult<String> + Send + Sync,
{
    pub const fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> SourceLoader for FnLoader<F>
where
    F: Fn(&str) -> LiquidResult<String> + Send + Sync,
{
    fn read(&self, name: &str) -> LiquidResult<String> {
        (self.func)(name)
    }
}

impl<F> fmt::Debug for FnLoader<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnLoader").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_loader_basic() {
        let loader = StringLoader::new();
        loader.add("hello", "Hello {{ name }}!");
        assert_eq!(loader.read("hello").unwrap(), "Hello {{ name }}!");
    }

    #[test]
    fn test_string_loader_not_found() {
        let err = StringLoader::new().read("missing").unwrap_err();
        assert!(matches!(err, LiquidError::TemplateDoesNotExist(_)));
    }

    #[test]
    fn test_string_loader_overwrite() {
        let loader: StringLoader = [("x", "version 1")].into_iter().collect();
        assert_eq!(loader.read("x").unwrap(), "version 1");
        loader.add("x", "version 2");
        assert_eq!(loader.read("x").unwrap(), "version 2");
    }

    #[test]
    fn test_fn_loader() {
        let loader = FnLoader::new(|name: &str| match name {
            "foo" => Ok("Contents of foo".to_string()),
            other => Err(LiquidError::TemplateDoesNotExist(other.to_string())),
        });
        assert_eq!(loader.read("foo").unwrap(), "Contents of foo");
        assert!(loader.read("bar").is_err());
    }

    #[test]
    fn test_filesystem_loader_with_extension() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("partial.liquid"), "from disk").unwrap();

        let loader = FileSystemLoader::new(vec![dir.path().to_path_buf()]).with_extension(".liquid");
        assert_eq!(loader.read("partial").unwrap(), "from disk");
        assert_eq!(loader.read("partial.liquid").unwrap(), "from disk");
    }

    #[test]
    fn test_filesystem_loader_search_order() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        std::fs::write(second.path().join("a.html"), "second").unwrap();
        std::fs::write(first.path().join("b.html"), "first-b").unwrap();
        std::fs::write(second.path().join("b.html"), "second-b").unwrap();

        let loader = FileSystemLoader::new(vec![
            first.path().to_path_buf(),
            second.path().to_path_buf(),
        ]);
        assert_eq!(loader.read("a.html").unwrap(), "second");
        assert_eq!(loader.read("b.html").unwrap(), "first-b");
        assert!(loader.read("c.html").is_err());
    }

    #[test]
    fn test_filesystem_loader_rejects_traversal() {
        let loader = FileSystemLoader::new(vec![PathBuf::from("/tmp")]);
        assert!(loader.read("../etc/passwd").is_err());
        assert!(loader.read("/etc/passwd").is_err());
        assert!(loader.read("").is_err());
    }
}
