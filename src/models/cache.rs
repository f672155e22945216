//! Process-wide cache of loaded resources keyed by file path.

use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};

/// Loads each resource at most once per process.
///
/// The map lock is only held to fetch or insert the per-path cell. Loading
/// happens through the cell, so concurrent callers for the same path wait on a
/// single load while loads of other paths proceed. A failed load leaves the
/// cell empty and the next caller retries.
pub struct ResourceCache<T> {
    kind: &'static str,
    entries: Mutex<HashMap<PathBuf, Arc<OnceCell<T>>>>,
}

impl<T: Clone> ResourceCache<T> {
    /// Creates an empty cache; `kind` names the resource in log messages.
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the cached value for `path`, loading it with `loader` on first use.
    pub fn get_or_try_load<E, F>(&self, path: &Path, loader: F) -> Result<T, E>
    where
        F: FnOnce(&Path) -> Result<T, E>,
    {
        let cell = {
            let mut entries = self
                .entries
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            Arc::clone(entries.entry(path.to_path_buf()).or_default())
        };

        if let Some(value) = cell.get() {
            debug!(kind = self.kind, path = %path.display(), "cache hit");
            return Ok(value.clone());
        }

        cell.get_or_try_init(|| {
            info!(kind = self.kind, path = %path.display(), "loading");
            loader(path)
        })
        .cloned()
    }

    /// Whether a value for `path` has been loaded.
    pub fn contains(&self, path: &Path) -> bool {
        let entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        entries.get(path).is_some_and(|cell| cell.get().is_some())
    }

    /// Drops every cached value. Handles already returned stay valid.
    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl<T> std::fmt::Debug for ResourceCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let len = self
            .entries
            .lock()
            .map(|entries| entries.len())
            .unwrap_or_default();
        f.debug_struct("ResourceCache")
            .field("kind", &self.kind)
            .field("entries", &len)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_loads_once_per_path() {
        let cache = ResourceCache::<Arc<String>>::new("test");
        let calls = AtomicUsize::new(0);
        let load = |p: &Path| -> Result<Arc<String>, String> {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(p.display().to_string()))
        };

        let a = cache.get_or_try_load(Path::new("a"), load).unwrap();
        let again = cache.get_or_try_load(Path::new("a"), load).unwrap();
        let b = cache.get_or_try_load(Path::new("b"), load).unwrap();

        assert!(Arc::ptr_eq(&a, &again));
        assert_eq!(b.as_str(), "b");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(cache.contains(Path::new("a")));
    }

    #[test]
    fn test_concurrent_callers_share_one_load() {
        let cache = ResourceCache::<Arc<u32>>::new("test");
        let calls = AtomicUsize::new(0);

        let results: Vec<Arc<u32>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    scope.spawn(|| {
                        cache
                            .get_or_try_load(Path::new("shared"), |_| {
                                calls.fetch_add(1, Ordering::SeqCst);
                                std::thread::sleep(std::time::Duration::from_millis(20));
                                Ok::<_, String>(Arc::new(7))
                            })
                            .unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[test]
    fn test_failed_load_is_retried() {
        let cache = ResourceCache::<u32>::new("test");
        let path = Path::new("flaky");

        let first = cache.get_or_try_load(path, |_| Err::<u32, _>("unavailable"));
        assert_eq!(first, Err("unavailable"));
        assert!(!cache.contains(path));

        let second = cache.get_or_try_load(path, |_| Ok::<_, &str>(3));
        assert_eq!(second, Ok(3));
    }
}
