//! Session-owned morph target cache.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use morphkit_core::Result;

use super::MorphTarget;

type Slot = Arc<Mutex<Option<Arc<MorphTarget>>>>;

/// Parsed targets keyed by path.
///
/// Each key has its own slot lock, so a parse runs outside the map lock and
/// concurrent requests for the same uncached key load it once. A failed load
/// leaves no entry behind, so the next caller retries from scratch.
#[derive(Debug, Default)]
pub struct TargetCache {
    slots: Mutex<HashMap<String, Slot>>,
}

impl TargetCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn slot(&self, key: &str) -> Slot {
        Arc::clone(self.map().entry(key.to_string()).or_default())
    }

    /// Returns the cached target for `key`, if loaded.
    pub fn get(&self, key: &str) -> Option<Arc<MorphTarget>> {
        let slot = self.map().get(key).cloned()?;
        let guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
        guard.clone()
    }

    /// Returns the cached target for `key`, running `load` first if there is none.
    ///
    /// Callers racing on the same key block until the first load finishes.
    pub fn get_or_try_insert_with<F>(&self, key: &str, load: F) -> Result<Arc<MorphTarget>>
    where
        F: FnOnce() -> Result<MorphTarget>,
    {
        let slot = self.slot(key);
        let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(target) = guard.as_ref() {
            return Ok(Arc::clone(target));
        }
        match load() {
            Ok(target) => {
                let target = Arc::new(target);
                *guard = Some(Arc::clone(&target));
                Ok(target)
            }
            Err(e) => {
                drop(guard);
                self.discard_empty(key, &slot);
                Err(e)
            }
        }
    }

    /// Drops the map entry for `key` if it is still `slot`, still empty, and
    /// nobody else is waiting on it.
    fn discard_empty(&self, key: &str, slot: &Slot) {
        let mut map = self.map();
        let Some(entry) = map.get(key) else {
            return;
        };
        // One reference in the map, one held by the caller
        if !Arc::ptr_eq(entry, slot) || Arc::strong_count(entry) > 2 {
            return;
        }
        let empty = entry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none();
        if empty {
            map.remove(key);
        }
    }

    /// Stores `target` under its key, replacing any previous entry.
    pub fn insert(&self, target: MorphTarget) -> Arc<MorphTarget> {
        let target = Arc::new(target);
        let slot = self.slot(target.key());
        *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&target));
        target
    }

    /// Removes and returns the target cached under `key`.
    pub fn remove(&self, key: &str) -> Option<Arc<MorphTarget>> {
        let slot = self.map().remove(key)?;
        let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
        guard.take()
    }

    /// Returns true if a target is cached under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Returns the keys of all cached targets, sorted.
    pub fn keys(&self) -> Vec<String> {
        let slots: Vec<(String, Slot)> = self
            .map()
            .iter()
            .map(|(k, s)| (k.clone(), Arc::clone(s)))
            .collect();
        let mut keys: Vec<String> = slots
            .into_iter()
            .filter(|(_, s)| s.lock().unwrap_or_else(PoisonError::into_inner).is_some())
            .map(|(k, _)| k)
            .collect();
        keys.sort();
        keys
    }

    /// Returns the number of cached targets.
    pub fn len(&self) -> usize {
        self.keys().len()
    }

    /// Returns true if no target is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every cached target.
    pub fn clear(&self) {
        self.map().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use morphkit_core::MorphError;

    use crate::target::tests::grid;
    use crate::target::TargetOrigin;

    #[test]
    fn test_cache_returns_same_instance() {
        let mesh = grid(2);
        let cache = TargetCache::new();
        let a = cache
            .get_or_try_insert_with("k", || MorphTarget::parse(&mesh, "k", "0 1 0 0"))
            .unwrap();
        let b = cache
            .get_or_try_insert_with("k", || panic!("loaded twice"))
            .unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
        assert!(cache.contains("k"));
    }

    #[test]
    fn test_failed_load_does_not_poison() {
        let mesh = grid(2);
        let cache = TargetCache::new();
        let err = cache
            .get_or_try_insert_with("k", || Err(MorphError::TargetNotFound("k".into())))
            .unwrap_err();
        assert!(matches!(err, MorphError::TargetNotFound(_)));
        assert!(!cache.contains("k"));
        assert!(cache.is_empty());

        let target = cache
            .get_or_try_insert_with("k", || MorphTarget::parse(&mesh, "k", "1 0 1 0"))
            .unwrap();
        assert_eq!(target.vertices(), &[1]);
    }

    #[test]
    fn test_failed_loads_leave_no_entries() {
        let cache = TargetCache::new();
        for i in 0..100 {
            let key = format!("missing-{i}.target");
            let result = cache.get_or_try_insert_with(&key, || {
                Err(MorphError::TargetNotFound(key.clone()))
            });
            assert!(result.is_err());
        }
        assert!(cache.is_empty());
        assert_eq!(cache.map().len(), 0);

        let mesh = grid(2);
        cache
            .get_or_try_insert_with("present", || MorphTarget::parse(&mesh, "present", "0 0 0 1"))
            .unwrap();
        assert_eq!(cache.map().len(), 1);
    }

    #[test]
    fn test_concurrent_single_load() {
        let cache = TargetCache::new();
        let loads = AtomicUsize::new(0);
        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    let target = cache
                        .get_or_try_insert_with("shared", || {
                            loads.fetch_add(1, Ordering::SeqCst);
                            std::thread::sleep(std::time::Duration::from_millis(10));
                            // Meshes are not Sync; each loader builds its own.
                            MorphTarget::parse(&grid(3), "shared", "4 0 0 1")
                        })
                        .unwrap();
                    assert_eq!(target.vertices(), &[4]);
                });
            }
        });
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_insert_remove_clear() {
        let mesh = grid(2);
        let cache = TargetCache::new();
        cache.insert(MorphTarget::from_deltas(
            &mesh,
            "b",
            [(0, glam::Vec3::X)],
            TargetOrigin::Registered,
        ));
        cache.insert(MorphTarget::from_deltas(
            &mesh,
            "a",
            [(1, glam::Vec3::X)],
            TargetOrigin::Registered,
        ));
        assert_eq!(cache.keys(), vec!["a".to_string(), "b".to_string()]);
        assert!(cache.remove("a").is_some());
        assert!(cache.remove("a").is_none());
        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.get("b").is_none());
    }
}
