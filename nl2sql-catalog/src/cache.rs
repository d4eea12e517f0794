//! Process-wide catalog cache (spec §4.1, §5). Loaded once per process
//! and shared by every tool call; not thread-safe across sessions any
//! more than a single `RwLock` ever is — see spec §5 "Shared-resource
//! policy" and the same constraint documented on
//! `nl2sql-retrieval`'s turn cache.

use crate::Catalog;
use nl2sql_core::Nl2SqlResult;
use once_cell::sync::Lazy;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

struct CacheEntry {
    root: PathBuf,
    catalog: Arc<Catalog>,
}

static CACHE: Lazy<RwLock<Option<CacheEntry>>> = Lazy::new(|| RwLock::new(None));

/// Load the catalog at `root`, reusing the cached copy if the process
/// already loaded this exact root. Re-loads if a different root is
/// requested (e.g. tests pointing at distinct fixture trees).
pub fn load_cached(root: &Path) -> Nl2SqlResult<Arc<Catalog>> {
    if let Some(entry) = CACHE.read().unwrap().as_ref() {
        if entry.root == root {
            return Ok(Arc::clone(&entry.catalog));
        }
    }

    let catalog = Arc::new(crate::loader::load_catalog(root)?);
    *CACHE.write().unwrap() = Some(CacheEntry {
        root: root.to_path_buf(),
        catalog: Arc::clone(&catalog),
    });
    Ok(catalog)
}

/// Invalidate the process cache. Tests that load several fixture trees
/// across cases must call this between them, since `load_cached`
/// otherwise assumes the catalog root never changes for the process's
/// lifetime.
pub fn clear_cache() {
    *CACHE.write().unwrap() = None;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn fixture_root() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("gold")).unwrap();
        fs::write(
            dir.path().join("gold/_dataset.yaml"),
            "name: gold_omx\nlayer: gold\n",
        )
        .unwrap();
        dir
    }

    #[test]
    fn second_load_of_same_root_is_cached() {
        clear_cache();
        let dir = fixture_root();
        let a = load_cached(dir.path()).unwrap();
        let b = load_cached(dir.path()).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn clear_cache_forces_reload() {
        clear_cache();
        let dir = fixture_root();
        let a = load_cached(dir.path()).unwrap();
        clear_cache();
        let b = load_cached(dir.path()).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }
}
