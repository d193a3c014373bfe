//! Parsed-document cache.
//!
//! Documents are keyed by a content hash of the source they were parsed
//! from. A hit is only trusted after [`Document::has_volatile_dependencies`]
//! says the document and everything it pulled in are still current; the
//! engine re-parses and overwrites otherwise.
//!
//! The cache handle is owned by the embedder and handed to the
//! [`Engine`](crate::engine::Engine); there is no process-wide instance.

use std::collections::HashMap;
use std::fmt::{self, Write as _};
use std::sync::{Arc, PoisonError, RwLock};

use sha2::{Digest, Sha256};
use tracing::warn;

use crate::loaders::SourceLoader;
use crate::parser::Document;

/// Storage for parsed documents.
///
/// Implementations must serialize concurrent access to a key so a reader
/// never sees a half-written entry.
pub trait DocumentCache: Send + Sync {
    fn exists(&self, key: &str) -> bool;

    /// Returns the stored document, or `None` on a miss.
    fn read(&self, key: &str) -> Option<Arc<Document>>;

    /// Stores a document. Returns `false` if the entry was not stored.
    fn write(&self, key: &str, document: Arc<Document>) -> bool;

    /// Drops every entry.
    fn flush(&self) -> bool;
}

/// Hashes template source into a cache key: the first 128 bits of its
/// SHA-256 digest, hex encoded.
///
/// ```
/// use liquid_rs_template::cache::content_hash;
///
/// assert_eq!(content_hash("a").len(), 32);
/// assert_eq!(content_hash("a"), content_hash("a"));
/// assert_ne!(content_hash("a"), content_hash("b"));
/// ```
pub fn content_hash(source: &str) -> String {
    let digest = Sha256::digest(source.as_bytes());
    digest[..16].iter().fold(String::with_capacity(32), |mut out, byte| {
        let _ = write!(out, "{byte:02x}");
        out
    })
}

/// An in-process [`DocumentCache`] behind a read/write lock.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Arc<Document>>>,
    max_entries: Option<usize>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a cache that stops accepting new keys once it holds
    /// `max_entries` documents. Existing keys can still be overwritten.
    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_entries: Some(max_entries),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DocumentCache for MemoryCache {
    fn exists(&self, key: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    fn read(&self, key: &str) -> Option<Arc<Document>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn write(&self, key: &str, document: Arc<Document>) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(max) = self.max_entries {
            if entries.len() >= max && !entries.contains_key(key) {
                return false;
            }
        }
        entries.insert(key.to_string(), document);
        true
    }

    fn flush(&self) -> bool {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        true
    }
}

impl fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryCache")
            .field("entries", &self.len())
            .field("max_entries", &self.max_entries)
            .finish()
    }
}

/// A template pulled in by `include` or `extends`, with what is needed to
/// tell whether it has changed since it was parsed.
pub struct TemplateDependency {
    name: String,
    hash: String,
    document: Arc<Document>,
    loader: Arc<dyn SourceLoader>,
    cache: Option<Arc<dyn DocumentCache>>,
}

impl TemplateDependency {
    pub fn new(
        name: impl Into<String>,
        hash: impl Into<String>,
        document: Arc<Document>,
        loader: Arc<dyn SourceLoader>,
        cache: Option<Arc<dyn DocumentCache>>,
    ) -> Self {
        Self {
            name: name.into(),
            hash: hash.into(),
            document,
            loader,
            cache,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Hash of the source the document was parsed from.
    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Whether a cached document holding this dependency must be re-parsed.
    ///
    /// True if the dependency is itself volatile, if there is no cache to
    /// vouch for it, if its source can no longer be read or hashes
    /// differently, or if the cache dropped the entry it was stored under.
    pub fn is_volatile(&self) -> bool {
        if self.document.has_volatile_dependencies() {
            return true;
        }
        let Some(cache) = &self.cache else {
            return true;
        };
        let source = match self.loader.read(&self.name) {
            Ok(source) => source,
            Err(err) => {
                warn!(template = %self.name, error = %err, "dependency unreadable during cache check");
                return true;
            }
        };
        content_hash(&source) != self.hash || !cache.exists(&self.hash)
    }
}

impl fmt::Debug for TemplateDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateDependency")
            .field("name", &self.name)
            .field("hash", &self.hash)
            .field("document", &self.document)
            .field("cached", &self.cache.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loaders::StringLoader;
    use crate::parser::NodeList;

    fn doc() -> Arc<Document> {
        Arc::new(Document::new(NodeList::new()))
    }

    #[test]
    fn test_content_hash_is_128_bit_hex() {
        let hash = content_hash("hello");
        assert_eq!(hash.len(), 32);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        // SHA-256("hello") = 2cf24dba5fb0a30e26e83b2ac5b9e29e...
        assert_eq!(hash, "2cf24dba5fb0a30e26e83b2ac5b9e29e");
    }

    #[test]
    fn test_memory_cache_roundtrip() {
        let cache = MemoryCache::new();
        assert!(!cache.exists("k"));
        assert!(cache.read("k").is_none());
        assert!(cache.write("k", doc()));
        assert!(cache.exists("k"));
        assert!(cache.read("k").is_some());
        assert!(cache.flush());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_memory_cache_capacity() {
        let cache = MemoryCache::with_capacity(1);
        assert!(cache.write("a", doc()));
        assert!(!cache.write("b", doc()));
        assert!(cache.write("a", doc()));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_dependency_volatility() {
        let loader = Arc::new(StringLoader::new());
        loader.add("inner", "v1");
        let cache: Arc<dyn DocumentCache> = Arc::new(MemoryCache::new());
        let hash = content_hash("v1");
        cache.write(&hash, doc());

        let dep = TemplateDependency::new("inner", hash.clone(), doc(), loader.clone(), Some(Arc::clone(&cache)));
        assert!(!dep.is_volatile());

        loader.add("inner", "v2");
        assert!(dep.is_volatile());

        loader.add("inner", "v1");
        cache.flush();
        assert!(dep.is_volatile());
    }

    #[test]
    fn test_dependency_without_cache_is_volatile() {
        let loader = Arc::new(StringLoader::new());
        loader.add("inner", "v1");
        let dep = TemplateDependency::new("inner", content_hash("v1"), doc(), loader, None);
        assert!(dep.is_volatile());
    }

    #[test]
    fn test_missing_dependency_is_volatile() {
        let loader = Arc::new(StringLoader::new());
        let cache: Arc<dyn DocumentCache> = Arc::new(MemoryCache::new());
        let dep = TemplateDependency::new("gone", "abc", doc(), loader, Some(cache));
        assert!(dep.is_volatile());
    }
}
