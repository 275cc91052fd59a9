//! Hashed mapping from a byte-key, a string key, or an opaque identity
//! handle to a value (§4.3).
//!
//! Backed by `hashbrown::HashMap` with a per-instance `BuildHasher` seeded
//! from [`crate::random::next_instance_secret`] and hashed with
//! SipHash-2-4, matching the spec's "keyed by a 16-byte per-instance
//! secret chosen at construction from a process-global CSPRNG". Iteration
//! order is therefore unspecified but stable across non-mutating
//! observers, exactly as `hashbrown`/`std` already guarantee for a fixed
//! table.

use std::hash::{BuildHasher, Hash};

use hashbrown::HashMap;
use siphasher::sip::SipHasher24;

/// A key flavor accepted by [`KeyMap`]: an opaque identity handle, a
/// nul-terminated string, or a fixed-width byte blob (§4.3).
pub trait KeyLike: Hash + Eq + Clone {}
impl<T: Hash + Eq + Clone> KeyLike for T {}

/// `BuildHasher` producing SipHash-2-4 hashers seeded by a fixed
/// per-instance 16-byte secret.
#[derive(Clone)]
pub struct SipBuildHasher {
    k0: u64,
    k1: u64,
}

impl SipBuildHasher {
    fn from_secret(secret: [u8; 16]) -> Self {
        Self {
            k0: u64::from_le_bytes(secret[0..8].try_into().unwrap()),
            k1: u64::from_le_bytes(secret[8..16].try_into().unwrap()),
        }
    }
}

impl BuildHasher for SipBuildHasher {
    type Hasher = SipHasher24;

    fn build_hasher(&self) -> SipHasher24 {
        SipHasher24::new_with_keys(self.k0, self.k1)
    }
}

/// Hashed mapping from any [`KeyLike`] key to a value, separate-chained
/// and doubling when `items > 2 * buckets` (delegated to `hashbrown`,
/// which implements the same open-addressing growth policy the spec
/// describes in observable terms).
pub struct KeyMap<K: KeyLike, V> {
    inner: HashMap<K, V, SipBuildHasher>,
}

impl<K: KeyLike, V> Default for KeyMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: KeyLike, V> KeyMap<K, V> {
    pub fn new() -> Self {
        Self {
            inner: HashMap::with_hasher(SipBuildHasher::from_secret(
                crate::random::next_instance_secret(),
            )),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: HashMap::with_capacity_and_hasher(
                capacity,
                SipBuildHasher::from_secret(crate::random::next_instance_secret()),
            ),
        }
    }

    /// Inserts `value` under `key`. Returns `true` if this replaced an
    /// existing entry, `false` if it was a new insertion (§4.3:
    /// "Insert returns 0/1 distinguishing replacement from new-insertion").
    pub fn insert(&mut self, key: K, value: V) -> bool {
        self.inner.insert(key, value).is_some()
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.inner.get(key)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.inner.get_mut(key)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.inner.contains_key(key)
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.inner.remove(key)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.inner.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.inner.keys()
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.inner.values()
    }

    pub fn entry(&mut self, key: K) -> hashbrown::hash_map::Entry<'_, K, V, SipBuildHasher> {
        self.inner.entry(key)
    }
}

/// A fixed-width byte blob key, used by [`crate::mesh::indexed::IndexedMesh`]
/// to intern vertex records byte-exactly (§4.1, §3).
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct BytesKey(pub Vec<u8>);

impl BytesKey {
    pub fn from_floats(floats: &[f32]) -> Self {
        let mut bytes = Vec::with_capacity(floats.len() * 4);
        for f in floats {
            bytes.extend_from_slice(&f.to_bits().to_le_bytes());
        }
        BytesKey(bytes)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn insert_replace_distinguished() {
        let mut map: KeyMap<BytesKey, u32> = KeyMap::new();
        let key = BytesKey::from_floats(&[1.0, 2.0, 3.0]);
        assert!(!map.insert(key.clone(), 0));
        assert!(map.insert(key.clone(), 1));
        assert_eq!(*map.get(&key).unwrap(), 1);
    }

    #[test]
    fn distinct_instances_still_agree_on_equality() {
        let key = BytesKey::from_floats(&[1.0, 2.0, 3.0]);
        let mut a: KeyMap<BytesKey, u32> = KeyMap::new();
        let mut b: KeyMap<BytesKey, u32> = KeyMap::new();
        a.insert(key.clone(), 7);
        b.insert(key.clone(), 7);
        assert_eq!(*a.get(&key).unwrap(), *b.get(&key).unwrap());
    }
}
