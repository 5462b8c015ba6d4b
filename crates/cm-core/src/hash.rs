//! Fast hash map and hash set type aliases.
//!
//! The manifest partitions and the content reference cache index entries by
//! [`ContentId`](crate::ContentId) and [`ContentLocation`](crate::ContentLocation).
//! Neither key is attacker controlled, so the engine uses the Fx hash from
//! `rustc-hash` instead of the DoS-resistant std hasher.
//!
//! # Examples
//!
//! ```
//! use cm_core::{FxHashMap, FxHashSet, fx_hash_map, fx_hash_set};
//!
//! let mut by_name: FxHashMap<String, usize> = fx_hash_map();
//! by_name.insert("Finance".to_owned(), 1);
//!
//! let seen: FxHashSet<&str> = fx_hash_set();
//! assert!(seen.is_empty());
//! ```

/// A [`HashMap`](std::collections::HashMap) using the Fx hash algorithm.
pub type FxHashMap<K, V> = rustc_hash::FxHashMap<K, V>;

/// A [`HashSet`](std::collections::HashSet) using the Fx hash algorithm.
pub type FxHashSet<V> = rustc_hash::FxHashSet<V>;

/// The hasher used by [`FxHashMap`] and [`FxHashSet`].
pub type FxBuildHasher = rustc_hash::FxBuildHasher;

/// Creates a new empty [`FxHashMap`].
#[inline]
#[must_use]
pub fn fx_hash_map<K, V>() -> FxHashMap<K, V> {
    FxHashMap::default()
}

/// Creates a new empty [`FxHashSet`].
#[inline]
#[must_use]
pub fn fx_hash_set<V>() -> FxHashSet<V> {
    FxHashSet::default()
}

/// Creates a new [`FxHashMap`] able to hold `capacity` entries without
/// reallocating.
///
/// Manifests use this to size their partition table for every known content
/// type up front.
///
/// # Examples
///
/// ```
/// use cm_core::hash::fx_hash_map_with_capacity;
///
/// let map: cm_core::FxHashMap<u64, u64> = fx_hash_map_with_capacity(64);
/// assert!(map.capacity() >= 64);
/// ```
#[inline]
#[must_use]
pub fn fx_hash_map_with_capacity<K, V>(capacity: usize) -> FxHashMap<K, V> {
    FxHashMap::with_capacity_and_hasher(capacity, FxBuildHasher::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fx_hash_map_operations() {
        let mut map: FxHashMap<&str, i32> = fx_hash_map();
        map.insert("users", 1);
        map.insert("groups", 2);
        assert_eq!(map.get("users"), Some(&1));
        assert_eq!(map.get("projects"), None);
    }

    #[test]
    fn test_fx_hash_set_operations() {
        let mut set: FxHashSet<&str> = fx_hash_set();
        set.insert("users");
        assert!(set.contains("users"));
        assert!(!set.contains("groups"));
    }

    #[test]
    fn test_fx_hash_map_with_capacity() {
        let map: FxHashMap<String, i32> = fx_hash_map_with_capacity(100);
        assert!(map.capacity() >= 100);
    }
}
