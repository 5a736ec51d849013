//! Lazily-materialized member maps.
//!
//! A register node knows the names of its members from its manifest long
//! before it needs their contents. The production record has millions of
//! e-prints, so members are only constructed when dereferenced.

use std::collections::{BTreeMap, BTreeSet};

/// An index-keyed map whose values are built on first access.
#[derive(Debug)]
pub struct LazyMap<K: Ord + Clone, V> {
    known: BTreeSet<K>,
    loaded: BTreeMap<K, V>,
}

impl<K: Ord + Clone, V> LazyMap<K, V> {
    /// A map that knows about `keys` but has loaded none of them.
    pub fn new(keys: impl IntoIterator<Item = K>) -> Self {
        LazyMap {
            known: keys.into_iter().collect(),
            loaded: BTreeMap::new(),
        }
    }

    /// Whether `key` is a member (loaded or not).
    pub fn contains(&self, key: &K) -> bool {
        self.known.contains(key) || self.loaded.contains_key(key)
    }

    /// Get a member, materializing it with `load` on first access.
    ///
    /// The loader runs even for names that were not previously known; use
    /// [`contains`](Self::contains) first when membership matters.
    pub fn get_mut_or_load<E>(
        &mut self,
        key: &K,
        load: impl FnOnce(&K) -> Result<V, E>,
    ) -> Result<&mut V, E> {
        if !self.loaded.contains_key(key) {
            let value = load(key)?;
            self.known.insert(key.clone());
            self.loaded.insert(key.clone(), value);
        }
        Ok(self.loaded.get_mut(key).expect("just loaded"))
    }

    /// Insert an already-materialized member.
    pub fn insert(&mut self, key: K, value: V) {
        self.known.insert(key.clone());
        self.loaded.insert(key, value);
    }

    /// Mutable access to a member that has already been materialized.
    pub fn get_loaded_mut(&mut self, key: &K) -> Option<&mut V> {
        self.loaded.get_mut(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn loads_on_first_access_only() {
        let mut map: LazyMap<u32, String> = LazyMap::new([1, 2, 3]);
        assert!(map.contains(&2));
        assert!(map.get_loaded_mut(&2).is_none());

        let loads = Cell::new(0u32);
        let v = map
            .get_mut_or_load(&2, |k| {
                loads.set(loads.get() + 1);
                Ok::<_, ()>(format!("member {k}"))
            })
            .unwrap();
        assert_eq!(v, "member 2");

        // Second access does not call the loader.
        map.get_mut_or_load(&2, |_| {
            loads.set(loads.get() + 1);
            Ok::<_, ()>("again".to_string())
        })
        .unwrap();
        assert_eq!(loads.get(), 1);
    }

    #[test]
    fn loader_errors_propagate_and_do_not_poison() {
        let mut map: LazyMap<u32, String> = LazyMap::new([1]);
        let err = map.get_mut_or_load(&1, |_| Err::<String, _>("nope"));
        assert!(err.is_err());
        assert!(map.get_loaded_mut(&1).is_none());
        let ok = map.get_mut_or_load(&1, |_| Ok::<_, ()>("fine".to_string()));
        assert!(ok.is_ok());
    }

    #[test]
    fn unknown_keys_become_known_on_load() {
        let mut map: LazyMap<u32, u32> = LazyMap::new([]);
        assert!(!map.contains(&9));
        map.get_mut_or_load(&9, |_| Ok::<_, ()>(81)).unwrap();
        assert!(map.contains(&9));
        // Already materialized: the loader is not consulted again.
        assert_eq!(*map.get_mut_or_load(&9, |_| Ok::<_, ()>(0)).unwrap(), 81);
    }
}
