//! The document cache.
//!
//! Holds the editor-authoritative text of every open file. The version is
//! a monotonic per-file counter; stale diagnostics and replies are
//! discarded by comparing against it. Reads copy contents out before the
//! lock drops.

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

/// One tracked document.
#[derive(Debug, Clone)]
pub struct Document {
    /// Absolute path (the store key).
    pub path: String,
    /// Monotonic editor version.
    pub version: i64,
    /// Full text.
    pub text: String,
}

/// Thread-safe `(path, version, text)` store.
#[derive(Debug, Default)]
pub struct DocCache {
    docs: Mutex<FxHashMap<String, Document>>,
}

impl DocCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open or replace a document.
    pub fn open(&self, path: impl Into<String>, version: i64, text: impl Into<String>) {
        let path = path.into();
        let doc = Document { path: path.clone(), version, text: text.into() };
        self.docs.lock().insert(path, doc);
    }

    /// Update an open document; ignored for unknown paths or regressing
    /// versions.
    pub fn update(&self, path: &str, version: i64, text: impl Into<String>) -> bool {
        let mut docs = self.docs.lock();
        match docs.get_mut(path) {
            Some(doc) if version >= doc.version => {
                doc.version = version;
                doc.text = text.into();
                true
            }
            _ => false,
        }
    }

    /// Close a document.
    pub fn close(&self, path: &str) -> bool {
        self.docs.lock().remove(path).is_some()
    }

    /// Snapshot one document.
    pub fn get(&self, path: &str) -> Option<Document> {
        self.docs.lock().get(path).cloned()
    }

    /// Current version of a document.
    pub fn version(&self, path: &str) -> Option<i64> {
        self.docs.lock().get(path).map(|d| d.version)
    }

    /// Snapshot every open document.
    pub fn all(&self) -> Vec<Document> {
        self.docs.lock().values().cloned().collect()
    }

    /// True when `path` is open.
    pub fn is_open(&self, path: &str) -> bool {
        self.docs.lock().contains_key(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cangjie_testkit::must_some;

    #[test]
    fn lifecycle() {
        let cache = DocCache::new();
        cache.open("/p/a.cj", 1, "v1");
        assert!(cache.is_open("/p/a.cj"));
        assert!(cache.update("/p/a.cj", 2, "v2"));
        assert_eq!(must_some(cache.get("/p/a.cj")).text, "v2");
        assert!(cache.close("/p/a.cj"));
        assert!(!cache.is_open("/p/a.cj"));
    }

    #[test]
    fn version_never_regresses() {
        let cache = DocCache::new();
        cache.open("/p/a.cj", 5, "v5");
        assert!(!cache.update("/p/a.cj", 4, "v4"));
        assert_eq!(must_some(cache.get("/p/a.cj")).text, "v5");
    }

    #[test]
    fn update_unknown_path_is_rejected() {
        let cache = DocCache::new();
        assert!(!cache.update("/p/missing.cj", 1, "x"));
    }
}
