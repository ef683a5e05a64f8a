//! The on-disk cache.
//!
//! Layout under the project root:
//!
//! ```text
//! <project>/.cache/astdata/<pkg>.<digest>.ast
//! <project>/.cache/index/<pkg>.<digest>.idx
//! ```
//!
//! Each package has at most one live file per directory. Writes go to a
//! temp file and replace atomically; readers see the previous file or the
//! new one, never partial bytes. IO failures degrade to "no cache" and the
//! owning package rebuilds.

use crate::shard::{AST_MAGIC, IndexShard, decode_shard, encode_shard};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Cache-layer errors. Callers mostly log these and fall back to rebuild.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Filesystem failure while touching a shard.
    #[error("cache io failure on {path}: {source}")]
    Io {
        /// Shard path involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// Package names may contain `/`; shard file names flatten them to `.`.
fn flatten_pkg(pkg: &str) -> String {
    pkg.replace('/', ".")
}

/// Split `<pkg>.<digest>.<ext>` back into `(pkg, digest)`.
fn split_shard_name(file_name: &str) -> Option<(String, String)> {
    let stem = file_name.rsplit_once('.')?.0;
    let (pkg, digest) = stem.rsplit_once('.')?;
    if pkg.is_empty() || digest.is_empty() {
        return None;
    }
    Some((pkg.to_string(), digest.to_string()))
}

fn merge_shard_name(pkg: &str, digest: &str, ext: &str) -> String {
    format!("{}.{digest}.{ext}", flatten_pkg(pkg))
}

/// Content-addressed shard store for one project.
pub struct CacheManager {
    astdata_dir: PathBuf,
    index_dir: PathBuf,
    /// pkg -> digest of the live shard pair.
    id_map: Mutex<FxHashMap<String, String>>,
    /// When set, `store_*` are no-ops (the `--test` flag).
    test_mode: bool,
}

impl CacheManager {
    /// Open (and create, if needed) the cache under `project_root`.
    pub fn new(project_root: &Path, test_mode: bool) -> Self {
        let cache_root = project_root.join(".cache");
        let manager = Self {
            astdata_dir: cache_root.join("astdata"),
            index_dir: cache_root.join("index"),
            id_map: Mutex::new(FxHashMap::default()),
            test_mode,
        };
        manager.init_dirs();
        manager
    }

    fn init_dirs(&self) {
        for dir in [&self.astdata_dir, &self.index_dir] {
            if let Err(e) = fs::create_dir_all(dir) {
                tracing::warn!(dir = %dir.display(), error = %e, "cannot create cache dir");
                return;
            }
        }
        // One startup scan builds the pkg -> digest map.
        let mut map = self.id_map.lock();
        if let Ok(entries) = fs::read_dir(&self.astdata_dir) {
            for entry in entries.flatten() {
                let name = entry.file_name();
                let Some(name) = name.to_str() else {
                    continue;
                };
                if !name.ends_with(".ast") {
                    continue;
                }
                if let Some((pkg, digest)) = split_shard_name(name) {
                    map.insert(pkg, digest);
                }
            }
        }
    }

    /// The digest currently recorded for `pkg`, if any.
    pub fn recorded_digest(&self, pkg: &str) -> Option<String> {
        self.id_map.lock().get(&flatten_pkg(pkg)).cloned()
    }

    /// Staleness check per the content-addressing contract: no recorded
    /// entry means stale; a matching digest is fresh; a mismatch deletes
    /// the old shard pair and reports stale.
    pub fn is_stale(&self, pkg: &str, digest: &str) -> bool {
        let key = flatten_pkg(pkg);
        let recorded = self.id_map.lock().get(&key).cloned();
        match recorded {
            None => true,
            Some(old) if old == digest => false,
            Some(old) => {
                self.remove_shards(&key, &old);
                self.id_map.lock().remove(&key);
                true
            }
        }
    }

    fn remove_shards(&self, pkg: &str, digest: &str) {
        let ast = self.astdata_dir.join(merge_shard_name(pkg, digest, "ast"));
        let idx = self.index_dir.join(merge_shard_name(pkg, digest, "idx"));
        for path in [ast, idx] {
            if path.exists() {
                if let Err(e) = fs::remove_file(&path) {
                    tracing::warn!(path = %path.display(), error = %e, "stale shard not removed");
                }
            }
        }
    }

    /// Load the AST shard payload recorded for `pkg`. Corrupt frames are
    /// deleted and reported as absent.
    pub fn load_ast(&self, pkg: &str) -> Option<Vec<u8>> {
        let key = flatten_pkg(pkg);
        let digest = self.id_map.lock().get(&key).cloned()?;
        let path = self.astdata_dir.join(merge_shard_name(&key, &digest, "ast"));
        let bytes = fs::read(&path).ok()?;
        match decode_shard(AST_MAGIC, &bytes) {
            Some(payload) => Some(payload),
            None => {
                tracing::warn!(path = %path.display(), "ast shard failed verification");
                let _ = fs::remove_file(&path);
                None
            }
        }
    }

    /// Store the AST shard for `pkg` at `digest`, replacing any stale pair.
    pub fn store_ast(&self, pkg: &str, digest: &str, payload: &[u8]) -> Result<(), IndexError> {
        if digest.is_empty() || self.test_mode {
            return Ok(());
        }
        let key = flatten_pkg(pkg);
        if let Some(old) = self.id_map.lock().get(&key).cloned() {
            if old != digest {
                self.remove_shards(&key, &old);
            }
        }
        let path = self.astdata_dir.join(merge_shard_name(&key, digest, "ast"));
        self.write_atomic(&path, &encode_shard(AST_MAGIC, payload))?;
        self.id_map.lock().insert(key, digest.to_string());
        Ok(())
    }

    /// Load the index shard for `pkg` at `digest`. A verifier failure
    /// deletes the file and reports absence.
    pub fn load_index(&self, pkg: &str, digest: &str) -> Option<IndexShard> {
        let key = flatten_pkg(pkg);
        let path = self.index_dir.join(merge_shard_name(&key, digest, "idx"));
        let bytes = fs::read(&path).ok()?;
        match IndexShard::from_bytes(&bytes) {
            Some(shard) => Some(shard),
            None => {
                tracing::warn!(path = %path.display(), "index shard failed verification");
                let _ = fs::remove_file(&path);
                None
            }
        }
    }

    /// Store the index shard for `pkg` at `digest`.
    pub fn store_index(&self, pkg: &str, digest: &str, shard: &IndexShard) -> Result<(), IndexError> {
        if digest.is_empty() || self.test_mode {
            return Ok(());
        }
        let key = flatten_pkg(pkg);
        if let Some(old) = self.id_map.lock().get(&key).cloned() {
            if old != digest {
                let idx = self.index_dir.join(merge_shard_name(&key, &old, "idx"));
                if idx.exists() {
                    let _ = fs::remove_file(&idx);
                }
            }
        }
        let Some(bytes) = shard.to_bytes() else {
            return Ok(());
        };
        let path = self.index_dir.join(merge_shard_name(&key, digest, "idx"));
        self.write_atomic(&path, &bytes)
    }

    /// Write-to-temp then rename, so readers never observe partial bytes.
    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<(), IndexError> {
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, bytes)
            .map_err(|source| IndexError::Io { path: tmp.clone(), source })?;
        fs::rename(&tmp, path).map_err(|source| IndexError::Io { path: path.to_path_buf(), source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::{Symbol, SymbolId};
    use cangjie_testkit::{must, must_some};

    fn shard() -> IndexShard {
        IndexShard {
            symbols: vec![Symbol { id: SymbolId(7), name: "seven".to_string(), ..Symbol::default() }],
            ..IndexShard::default()
        }
    }

    #[test]
    fn fresh_project_is_stale() {
        let dir = must(tempfile::tempdir());
        let cache = CacheManager::new(dir.path(), false);
        assert!(cache.is_stale("demo.core", "abc"));
    }

    #[test]
    fn store_then_reload_across_instances() {
        let dir = must(tempfile::tempdir());
        {
            let cache = CacheManager::new(dir.path(), false);
            must(cache.store_ast("demo.core", "abc", b"ast-bytes"));
            must(cache.store_index("demo.core", "abc", &shard()));
        }
        // New instance re-scans the directory, as a restarted server would.
        let cache = CacheManager::new(dir.path(), false);
        assert!(!cache.is_stale("demo.core", "abc"));
        assert_eq!(must_some(cache.load_ast("demo.core")), b"ast-bytes".to_vec());
        let loaded = must_some(cache.load_index("demo.core", "abc"));
        assert_eq!(loaded.symbols[0].name, "seven");
    }

    #[test]
    fn digest_mismatch_deletes_old_pair() {
        let dir = must(tempfile::tempdir());
        let cache = CacheManager::new(dir.path(), false);
        must(cache.store_ast("demo.core", "old", b"v1"));
        must(cache.store_index("demo.core", "old", &shard()));
        assert!(cache.is_stale("demo.core", "new"));
        // The old files are gone and nothing loads.
        assert!(cache.load_ast("demo.core").is_none());
        assert!(cache.load_index("demo.core", "old").is_none());
        // Staleness reports true exactly once per change, then the shard
        // re-emits and it turns false.
        must(cache.store_ast("demo.core", "new", b"v2"));
        assert!(!cache.is_stale("demo.core", "new"));
    }

    #[test]
    fn corrupt_index_shard_is_deleted() {
        let dir = must(tempfile::tempdir());
        let cache = CacheManager::new(dir.path(), false);
        must(cache.store_index("demo.core", "abc", &shard()));
        let path = dir.path().join(".cache/index/demo.core.abc.idx");
        must(fs::write(&path, b"garbage"));
        assert!(cache.load_index("demo.core", "abc").is_none());
        assert!(!path.exists(), "corrupt shard must be deleted");
    }

    #[test]
    fn test_mode_stores_nothing() {
        let dir = must(tempfile::tempdir());
        let cache = CacheManager::new(dir.path(), true);
        must(cache.store_ast("demo.core", "abc", b"bytes"));
        assert!(cache.load_ast("demo.core").is_none());
    }

    #[test]
    fn slash_in_package_name_is_flattened() {
        let dir = must(tempfile::tempdir());
        let cache = CacheManager::new(dir.path(), false);
        must(cache.store_ast("demo/sub", "abc", b"x"));
        assert!(!cache.is_stale("demo/sub", "abc"));
        assert!(dir.path().join(".cache/astdata/demo.sub.abc.ast").exists());
    }
}
