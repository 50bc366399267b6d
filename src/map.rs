use core::borrow::Borrow;
use core::fmt::Debug;
use core::hash::BuildHasher;
use core::hash::Hash;
use core::iter::FusedIterator;
use core::marker::PhantomData;
use core::ops::Index;

use crate::DefaultHashBuilder;
use crate::alloc_mode::AllocMode;
use crate::node::NodePtr;
use crate::region::Region;
#[cfg(any(test, feature = "stats"))]
use crate::table::ChainHistogram;
#[cfg(any(test, feature = "stats"))]
use crate::table::DebugStats;
use crate::table::RawIter;
use crate::table::RawTable;
use crate::value::RegionValue;

/// Type used by every count-reporting method of [`Map`].
///
/// Entry counts are stored as `u32` internally; the public interface always
/// widens them to the platform's native size type.
pub type SizeType = usize;

/// A separately chained hash map that allocates either from the global heap
/// or from a shared [`Region`].
///
/// The allocation mode is picked at construction and fixed for the lifetime
/// of the map. In heap mode every node and bucket array is freed
/// individually. In region mode nodes stay in the region until it is reset
/// or dropped, while bucket arrays abandoned by growth are handed back to the
/// region so sibling maps can reuse them.
///
/// Nodes never move: growing the map relinks them into a larger bucket array.
///
/// # Examples
///
/// ```rust
/// use region_map::{Map, Region};
///
/// let region = Region::new();
/// let mut map: Map<u32, String> = Map::new_in(&region);
/// map.insert(1, "one".to_string());
/// *map.get_or_insert_default(2) += "two";
///
/// assert_eq!(map.len(), 2);
/// assert_eq!(map.find(&2).map(String::as_str), Some("two"));
/// assert!(region.space_used() > 0);
/// ```
pub struct Map<'r, K, V, S = DefaultHashBuilder> {
    table: RawTable<'r, K, V>,
    hash_builder: S,
}

#[inline]
fn make_hash<Q, S>(hash_builder: &S, key: &Q) -> u64
where
    Q: Hash + ?Sized,
    S: BuildHasher,
{
    hash_builder.hash_one(key)
}

impl<K, V, S> Debug for Map<'_, K, V, S>
where
    K: Debug,
    V: Debug,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut map = f.debug_map();
        for (k, v) in self.iter() {
            map.entry(k, v);
        }
        map.finish()
    }
}

impl<'r, K, V, S> Map<'r, K, V, S>
where
    S: BuildHasher + Default,
{
    /// Creates an empty heap-mode map.
    ///
    /// No memory is allocated until the first insert.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use region_map::Map;
    ///
    /// let map: Map<i32, String> = Map::new();
    /// assert!(map.is_empty());
    /// assert_eq!(map.bucket_count(), 0);
    /// ```
    pub fn new() -> Self {
        Self::with_hasher_in(S::default(), AllocMode::Heap)
    }

    /// Creates an empty heap-mode map able to hold `capacity` entries without
    /// growing.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher_in(capacity, S::default(), AllocMode::Heap)
    }

    /// Creates an empty map allocating from `region`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use region_map::{AllocMode, Map, Region};
    ///
    /// let region = Region::new();
    /// let map: Map<i32, i32> = Map::new_in(&region);
    /// assert_eq!(map.mode(), AllocMode::Region(&region));
    /// assert_eq!(region.space_used(), 0);
    /// ```
    pub fn new_in(region: &'r Region) -> Self {
        Self::with_hasher_in(S::default(), AllocMode::Region(region))
    }

    /// Creates an empty map allocating through `mode`.
    pub fn with_mode(mode: AllocMode<'r>) -> Self {
        Self::with_hasher_in(S::default(), mode)
    }
}

impl<'r, K, V, S> Map<'r, K, V, S> {
    /// Creates an empty heap-mode map using `hash_builder` to hash keys.
    pub fn with_hasher(hash_builder: S) -> Self {
        Self::with_hasher_in(hash_builder, AllocMode::Heap)
    }

    /// Creates an empty map hashing with `hash_builder` and allocating
    /// through `mode`.
    pub fn with_hasher_in(hash_builder: S, mode: AllocMode<'r>) -> Self {
        Self {
            table: RawTable::new_in(mode),
            hash_builder,
        }
    }

    /// Creates an empty heap-mode map with room for `capacity` entries.
    pub fn with_capacity_and_hasher(capacity: usize, hash_builder: S) -> Self {
        Self::with_capacity_and_hasher_in(capacity, hash_builder, AllocMode::Heap)
    }

    /// Creates an empty map with room for `capacity` entries, hashing with
    /// `hash_builder` and allocating through `mode`.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` exceeds the map's ceiling of 1_610_612_736
    /// entries.
    pub fn with_capacity_and_hasher_in(
        capacity: usize,
        hash_builder: S,
        mode: AllocMode<'r>,
    ) -> Self {
        Self {
            table: RawTable::with_capacity_in(capacity, mode),
            hash_builder,
        }
    }

    /// Returns the number of entries in the map.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use region_map::Map;
    ///
    /// let mut map: Map<i32, &str> = Map::new();
    /// assert_eq!(map.len(), 0);
    /// map.insert(1, "a");
    /// assert_eq!(map.len(), 1);
    /// ```
    #[inline]
    pub fn len(&self) -> SizeType {
        self.table.len()
    }

    /// Returns the number of entries in the map. Same as [`len`](Self::len).
    #[inline]
    pub fn size(&self) -> SizeType {
        self.table.len()
    }

    /// Returns `true` if the map contains no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.table.len() == 0
    }

    /// Returns the number of entries the map can hold before its next
    /// growth.
    ///
    /// Tables with fewer than 16 buckets may fill every bucket; larger ones
    /// grow past three quarters of their bucket count.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use region_map::Map;
    ///
    /// let mut map: Map<i32, i32> = Map::new();
    /// assert_eq!(map.capacity(), 0);
    /// map.insert(1, 1);
    /// assert_eq!(map.capacity(), 2);
    /// ```
    #[inline]
    pub fn capacity(&self) -> SizeType {
        self.table.threshold()
    }

    /// Returns the number of buckets, zero if the map never allocated.
    #[inline]
    pub fn bucket_count(&self) -> SizeType {
        self.table.bucket_count()
    }

    /// Returns the allocation mode fixed at construction.
    #[inline]
    pub fn mode(&self) -> AllocMode<'r> {
        self.table.mode()
    }

    /// Returns the region this map allocates from, if any.
    #[inline]
    pub fn region(&self) -> Option<&'r Region> {
        self.table.mode().region()
    }

    /// Returns a reference to the map's hasher builder.
    #[inline]
    pub fn hasher(&self) -> &S {
        &self.hash_builder
    }

    /// Drops every entry. The bucket array is kept for reuse.
    ///
    /// In region mode the node memory stays in the region.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use region_map::Map;
    ///
    /// let mut map: Map<i32, i32> = (0..10).map(|i| (i, i)).collect();
    /// let buckets = map.bucket_count();
    /// map.clear();
    /// assert!(map.is_empty());
    /// assert_eq!(map.bucket_count(), buckets);
    /// ```
    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// Returns an iterator over the entries in bucket order.
    ///
    /// The order is unspecified but stable for a given bucket count and
    /// insertion history. The iterator can be cloned to restart it.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            inner: self.table.iter(),
        }
    }

    /// Returns an iterator over the entries with mutable values.
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut {
            inner: self.table.iter(),
            _marker: PhantomData,
        }
    }

    /// Returns an iterator over the keys.
    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { inner: self.iter() }
    }

    /// Returns an iterator over the values.
    pub fn values(&self) -> Values<'_, K, V> {
        Values { inner: self.iter() }
    }

    /// Returns an iterator over mutable references to the values.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use region_map::Map;
    ///
    /// let mut map: Map<&str, i32> = [("a", 1), ("b", 2)].into_iter().collect();
    /// for value in map.values_mut() {
    ///     *value *= 10;
    /// }
    /// assert_eq!(map["a"], 10);
    /// assert_eq!(map["b"], 20);
    /// ```
    pub fn values_mut(&mut self) -> ValuesMut<'_, K, V> {
        ValuesMut {
            inner: self.iter_mut(),
        }
    }

    /// Returns debug statistics about chain lengths and memory use.
    ///
    /// Only available in tests or with the `stats` feature.
    #[cfg(any(test, feature = "stats"))]
    pub fn debug_stats(&self) -> DebugStats {
        self.table.debug_stats()
    }

    /// Returns the number of buckets per chain length.
    ///
    /// Only available in tests or with the `stats` feature.
    #[cfg(any(test, feature = "stats"))]
    pub fn chain_histogram(&self) -> ChainHistogram {
        self.table.chain_histogram()
    }
}

impl<'r, K, V, S> Map<'r, K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    /// Grows the map so `additional` more entries fit without another
    /// growth.
    ///
    /// # Panics
    ///
    /// Panics if the total would exceed 1_610_612_736 entries.
    pub fn reserve(&mut self, additional: usize) {
        self.table
            .reserve(additional, |k| make_hash(&self.hash_builder, k));
    }

    /// Inserts a key-value pair, returning the previous value if the key was
    /// present. The stored key is kept in that case.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use region_map::Map;
    ///
    /// let mut map: Map<i32, &str> = Map::new();
    /// assert_eq!(map.insert(37, "a"), None);
    /// assert_eq!(map.insert(37, "b"), Some("a"));
    /// assert_eq!(map.get(&37), Some(&"b"));
    /// ```
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        match self.entry(key) {
            Entry::Occupied(mut entry) => Some(entry.insert(value)),
            Entry::Vacant(entry) => {
                entry.insert(value);
                None
            }
        }
    }

    /// Returns a reference to the value stored for `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = make_hash(&self.hash_builder, key);
        self.table
            .find(hash, |k| key.eq(k.borrow()))
            // SAFETY: The node is live while `self` is borrowed.
            .map(|node| unsafe { node.value() })
    }

    /// Returns a reference to the value stored for `key`. Same as
    /// [`get`](Self::get).
    #[inline]
    pub fn find<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get(key)
    }

    /// Returns the stored key and its value.
    pub fn get_key_value<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = make_hash(&self.hash_builder, key);
        self.table
            .find(hash, |k| key.eq(k.borrow()))
            // SAFETY: The node is live while `self` is borrowed.
            .map(|node| unsafe { (node.key(), node.value()) })
    }

    /// Returns a mutable reference to the value stored for `key`.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = make_hash(&self.hash_builder, key);
        self.table
            .find(hash, |k| key.eq(k.borrow()))
            // SAFETY: The node is live and exclusively borrowed through
            // `self`.
            .map(|node| unsafe { node.value_mut() })
    }

    /// Returns `true` if the map holds an entry for `key`.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get(key).is_some()
    }

    /// Removes the entry for `key` and returns its value.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.remove_entry(key).map(|(_, v)| v)
    }

    /// Removes the entry for `key` and returns the stored key and value.
    pub fn remove_entry<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = make_hash(&self.hash_builder, key);
        self.table.remove(hash, |k| key.eq(k.borrow()))
    }

    /// Removes the entry for `key`, returning `true` if there was one.
    ///
    /// In region mode the node's memory is not reclaimed until the region is.
    pub fn erase<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.remove_entry(key).is_some()
    }

    /// Gets the entry for `key` for in-place manipulation.
    pub fn entry(&mut self, key: K) -> Entry<'_, 'r, K, V, S> {
        let hash = make_hash(&self.hash_builder, &key);
        match self.table.find(hash, |k| *k == key) {
            Some(node) => Entry::Occupied(OccupiedEntry {
                map: self,
                hash,
                node,
            }),
            None => Entry::Vacant(VacantEntry {
                map: self,
                hash,
                key,
            }),
        }
    }

    /// Returns the value for `key`, inserting the one built by `make` if the
    /// key is absent. `make` receives the map's allocation mode.
    pub fn get_or_insert_with<F>(&mut self, key: K, make: F) -> &mut V
    where
        F: FnOnce(AllocMode<'r>) -> V,
    {
        let mode = self.mode();
        match self.entry(key) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(make(mode)),
        }
    }

    /// Returns the value for `key`, inserting a default value bound to the
    /// map's allocation mode if the key is absent.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use region_map::Map;
    ///
    /// let mut counts: Map<&str, u32> = Map::new();
    /// for word in ["a", "b", "a"] {
    ///     *counts.get_or_insert_default(word) += 1;
    /// }
    /// assert_eq!(counts["a"], 2);
    /// assert_eq!(counts["b"], 1);
    /// ```
    pub fn get_or_insert_default(&mut self, key: K) -> &mut V
    where
        V: RegionValue<'r>,
    {
        self.get_or_insert_with(key, V::default_in)
    }

    /// Copies every entry of `self` into a new map allocating through
    /// `mode`.
    ///
    /// The copy shares no storage with `self`, whatever the two modes are.
    /// Values are copied with [`RegionValue::clone_in`], so nested maps are
    /// rebound to `mode` as well.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use region_map::{AllocMode, Map, Region};
    ///
    /// let mut source: Map<i32, i32> = Map::new();
    /// source.insert(1, 2);
    /// source.insert(2, 3);
    ///
    /// let region = Region::new();
    /// let mut copy = source.clone_in(AllocMode::Region(&region));
    /// assert_eq!(copy.len(), 2);
    /// assert_eq!(copy[&1], 2);
    ///
    /// *copy.get_mut(&1).unwrap() = 10;
    /// assert_eq!(source[&1], 2);
    /// ```
    pub fn clone_in<'m>(&self, mode: AllocMode<'m>) -> Map<'m, K, V, S>
    where
        K: Clone,
        V: RegionValue<'m>,
        S: Clone,
    {
        let hash_builder = self.hash_builder.clone();
        let table = self.table.clone_in(
            mode,
            |k, v, mode| (k.clone(), v.clone_in(mode)),
            |k| make_hash(&hash_builder, k),
        );
        Map {
            table,
            hash_builder,
        }
    }

    /// Copies every entry of `other` into `self`, overwriting values of keys
    /// present in both. Copied values are bound to this map's mode.
    pub fn merge_from<S2>(&mut self, other: &Map<'_, K, V, S2>)
    where
        K: Clone,
        V: RegionValue<'r>,
    {
        let mode = self.mode();
        self.reserve(other.len());
        for (key, value) in other.iter() {
            match self.entry(key.clone()) {
                Entry::Occupied(mut entry) => {
                    entry.insert(value.clone_in(mode));
                }
                Entry::Vacant(entry) => {
                    entry.insert(value.clone_in(mode));
                }
            }
        }
    }
}

impl<K, V, S> Default for Map<'_, K, V, S>
where
    S: Default,
{
    fn default() -> Self {
        Self::with_hasher_in(S::default(), AllocMode::Heap)
    }
}

impl<K, V, S> Clone for Map<'_, K, V, S>
where
    K: Hash + Eq + Clone,
    V: Clone,
    S: BuildHasher + Clone,
{
    /// Copies the map into the same allocation mode.
    fn clone(&self) -> Self {
        let hash_builder = self.hash_builder.clone();
        let table = self.table.clone_in(
            self.mode(),
            |k, v, _| (k.clone(), v.clone()),
            |k| make_hash(&hash_builder, k),
        );
        Self {
            table,
            hash_builder,
        }
    }
}

impl<K, V, S> PartialEq for Map<'_, K, V, S>
where
    K: Hash + Eq,
    V: PartialEq,
    S: BuildHasher,
{
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(key, value)| other.get(key).is_some_and(|v| *value == *v))
    }
}

impl<K, V, S> Eq for Map<'_, K, V, S>
where
    K: Hash + Eq,
    V: Eq,
    S: BuildHasher,
{
}

impl<K, Q, V, S> Index<&Q> for Map<'_, K, V, S>
where
    K: Hash + Eq + Borrow<Q>,
    Q: Hash + Eq + ?Sized,
    S: BuildHasher,
{
    type Output = V;

    /// # Panics
    ///
    /// Panics if the key is not present.
    fn index(&self, key: &Q) -> &V {
        self.get(key).expect("no entry found for key")
    }
}

impl<K, V, S> Extend<(K, V)> for Map<'_, K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        let iter = iter.into_iter();
        let reserve = if self.is_empty() {
            iter.size_hint().0
        } else {
            iter.size_hint().0.div_ceil(2)
        };
        self.reserve(reserve);
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<K, V, S> FromIterator<(K, V)> for Map<'_, K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher + Default,
{
    /// Collects into a heap-mode map.
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut map = Self::with_hasher(S::default());
        map.extend(iter);
        map
    }
}

impl<'a, K, V, S> IntoIterator for &'a Map<'_, K, V, S> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, K, V, S> IntoIterator for &'a mut Map<'_, K, V, S> {
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

/// A view into a single entry in the map, which may either be vacant or
/// occupied.
///
/// This enum is constructed from the [`entry`] method on [`Map`].
///
/// [`entry`]: Map::entry
pub enum Entry<'a, 'r, K, V, S> {
    /// A vacant entry.
    Vacant(VacantEntry<'a, 'r, K, V, S>),
    /// An occupied entry.
    Occupied(OccupiedEntry<'a, 'r, K, V, S>),
}

impl<'a, 'r, K, V, S> Entry<'a, 'r, K, V, S>
where
    S: BuildHasher,
    K: Hash,
{
    /// Inserts `default` if the entry is vacant and returns a mutable
    /// reference to the value.
    pub fn or_insert(self, default: V) -> &'a mut V {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(default),
        }
    }

    /// Inserts the value computed by `default` if the entry is vacant and
    /// returns a mutable reference to the value.
    pub fn or_insert_with<F>(self, default: F) -> &'a mut V
    where
        F: FnOnce() -> V,
    {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(default()),
        }
    }

    /// Inserts a default value bound to the map's allocation mode if the
    /// entry is vacant and returns a mutable reference to the value.
    pub fn or_default(self) -> &'a mut V
    where
        V: RegionValue<'r>,
    {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let value = V::default_in(entry.map.mode());
                entry.insert(value)
            }
        }
    }
}

impl<'a, 'r, K, V, S> Entry<'a, 'r, K, V, S> {
    /// Provides in-place mutable access to an occupied entry before any
    /// potential inserts.
    pub fn and_modify<F>(self, f: F) -> Self
    where
        F: FnOnce(&mut V),
    {
        match self {
            Entry::Occupied(mut entry) => {
                f(entry.get_mut());
                Entry::Occupied(entry)
            }
            Entry::Vacant(entry) => Entry::Vacant(entry),
        }
    }

    /// Returns a reference to this entry's key.
    pub fn key(&self) -> &K {
        match self {
            Entry::Occupied(entry) => entry.key(),
            Entry::Vacant(entry) => entry.key(),
        }
    }
}

/// A view into a vacant entry in the map.
pub struct VacantEntry<'a, 'r, K, V, S> {
    map: &'a mut Map<'r, K, V, S>,
    hash: u64,
    key: K,
}

impl<'a, K, V, S> VacantEntry<'a, '_, K, V, S> {
    /// Gets a reference to the key that would be used when inserting a value.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Take ownership of the key.
    pub fn into_key(self) -> K {
        self.key
    }

    /// Inserts the value into the map and returns a mutable reference to it.
    ///
    /// The map grows first if the new entry would cross its threshold.
    pub fn insert(self, value: V) -> &'a mut V
    where
        K: Hash,
        S: BuildHasher,
    {
        let Map {
            table,
            hash_builder,
        } = self.map;
        let node = table.insert_unique(self.hash, self.key, value, |k| {
            make_hash(&*hash_builder, k)
        });
        // SAFETY: The node is live and the map stays exclusively borrowed for
        // `'a`.
        unsafe { node.value_mut() }
    }
}

/// A view into an occupied entry in the map.
pub struct OccupiedEntry<'a, 'r, K, V, S> {
    map: &'a mut Map<'r, K, V, S>,
    hash: u64,
    node: NodePtr<K, V>,
}

impl<'a, K, V, S> OccupiedEntry<'a, '_, K, V, S> {
    /// Gets a reference to the key in the entry.
    pub fn key(&self) -> &K {
        // SAFETY: The node is live while the map is borrowed.
        unsafe { self.node.key() }
    }

    /// Gets a reference to the value in the entry.
    pub fn get(&self) -> &V {
        // SAFETY: The node is live while the map is borrowed.
        unsafe { self.node.value() }
    }

    /// Gets a mutable reference to the value in the entry.
    pub fn get_mut(&mut self) -> &mut V {
        // SAFETY: The node is live and the map is exclusively borrowed.
        unsafe { self.node.value_mut() }
    }

    /// Converts the entry into a mutable reference to the value.
    pub fn into_mut(self) -> &'a mut V {
        // SAFETY: The node is live and the map stays exclusively borrowed for
        // `'a`.
        unsafe { self.node.value_mut() }
    }

    /// Inserts a value into the entry and returns the old value.
    pub fn insert(&mut self, value: V) -> V {
        core::mem::replace(self.get_mut(), value)
    }

    /// Removes the entry from the map and returns the value.
    pub fn remove(self) -> V {
        self.remove_entry().1
    }

    /// Removes the entry from the map and returns the key and value.
    pub fn remove_entry(self) -> (K, V) {
        self.map.table.remove_node(self.hash, self.node)
    }
}

/// An iterator over the entries of a [`Map`].
pub struct Iter<'a, K, V> {
    inner: RawIter<'a, K, V>,
}

impl<K, V> Clone for Iter<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        // SAFETY: Nodes are live while the map is borrowed for `'a`.
        self.inner
            .next()
            .map(|node| unsafe { (node.key(), node.value()) })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

impl<K, V> FusedIterator for Iter<'_, K, V> {}

/// An iterator over the entries of a [`Map`] with mutable values.
pub struct IterMut<'a, K, V> {
    inner: RawIter<'a, K, V>,
    _marker: PhantomData<&'a mut V>,
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);

    fn next(&mut self) -> Option<Self::Item> {
        // SAFETY: Nodes are live while the map is exclusively borrowed for
        // `'a`, and every node is yielded once.
        self.inner.next().map(|node| unsafe { node.pair_mut() })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for IterMut<'_, K, V> {}

impl<K, V> FusedIterator for IterMut<'_, K, V> {}

/// An iterator over the keys of a [`Map`].
pub struct Keys<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, _)| k)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Keys<'_, K, V> {}

/// An iterator over the values of a [`Map`].
pub struct Values<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Values<'_, K, V> {}

/// An iterator over mutable references to the values of a [`Map`].
pub struct ValuesMut<'a, K, V> {
    inner: IterMut<'a, K, V>,
}

impl<'a, K, V> Iterator for ValuesMut<'a, K, V> {
    type Item = &'a mut V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for ValuesMut<'_, K, V> {}

#[cfg(test)]
mod tests {
    use alloc::rc::Rc;
    use alloc::string::String;
    use alloc::string::ToString;
    use alloc::vec;
    use alloc::vec::Vec;
    use core::hash::BuildHasher;
    use core::hash::Hasher;

    use rand::TryRngCore;
    use rand::rngs::OsRng;
    use siphasher::sip::SipHasher;

    use super::*;
    use crate::growth::threshold;
    use crate::node::NodeLayout;
    use crate::region::RegionOptions;

    #[derive(Clone)]
    struct SipHashBuilder {
        k1: u64,
        k2: u64,
    }

    impl BuildHasher for SipHashBuilder {
        type Hasher = SipHasher;

        fn build_hasher(&self) -> Self::Hasher {
            SipHasher::new_with_keys(self.k1, self.k2)
        }
    }

    impl Default for SipHashBuilder {
        fn default() -> Self {
            let mut rng = OsRng;
            Self {
                k1: rng.try_next_u64().unwrap_or(0),
                k2: rng.try_next_u64().unwrap_or(0),
            }
        }
    }

    /// Sends every key to the same bucket.
    #[derive(Clone, Default)]
    struct ConstantHashBuilder;

    struct ConstantHasher;

    impl Hasher for ConstantHasher {
        fn finish(&self) -> u64 {
            0
        }

        fn write(&mut self, _: &[u8]) {}
    }

    impl BuildHasher for ConstantHashBuilder {
        type Hasher = ConstantHasher;

        fn build_hasher(&self) -> Self::Hasher {
            ConstantHasher
        }
    }

    type SipMap<'r, K, V> = Map<'r, K, V, SipHashBuilder>;

    #[repr(align(64))]
    #[derive(Clone, Default, PartialEq, Debug)]
    struct Aligned64(u64);

    impl<'r> RegionValue<'r> for Aligned64 {
        fn default_in(_: AllocMode<'r>) -> Self {
            Self::default()
        }

        fn clone_in(&self, _: AllocMode<'r>) -> Self {
            self.clone()
        }
    }

    #[repr(align(8))]
    #[derive(Clone, Default, PartialEq, Debug)]
    struct Aligned8(u8);

    fn addr<T>(value: &T) -> usize {
        core::ptr::from_ref(value) as usize
    }

    #[test]
    fn test_new_and_with_hasher() {
        let map: SipMap<'_, i32, String> = Map::new();
        assert!(map.is_empty());
        assert_eq!(map.len(), 0);
        assert_eq!(map.bucket_count(), 0);
        assert_eq!(map.mode(), AllocMode::Heap);
        assert!(map.region().is_none());

        let map2 = Map::<i32, String, _>::with_hasher(SipHashBuilder::default());
        assert!(map2.is_empty());
    }

    #[test]
    fn test_with_capacity() {
        let map: SipMap<'_, i32, String> = Map::with_capacity(100);
        assert!(map.capacity() >= 100);
        assert!(map.is_empty());

        let region = Region::new();
        let map2 = Map::<i32, String, _>::with_capacity_and_hasher_in(
            200,
            SipHashBuilder::default(),
            AllocMode::Region(&region),
        );
        assert!(map2.capacity() >= 200);
        assert_eq!(region.space_used(), map2.bucket_count() * size_of::<usize>());
    }

    #[test]
    fn test_insert_and_get() {
        let mut map = Map::with_hasher(SipHashBuilder::default());

        assert_eq!(map.insert(1, "hello".to_string()), None);
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&1), Some(&"hello".to_string()));
        assert_eq!(map.get(&2), None);

        assert_eq!(
            map.insert(1, "world".to_string()),
            Some("hello".to_string())
        );
        assert_eq!(map.len(), 1);
        assert_eq!(map.find(&1), Some(&"world".to_string()));
        assert_eq!(map.get_key_value(&1), Some((&1, &"world".to_string())));
    }

    #[test]
    fn test_borrowed_lookup() {
        let region = Region::new();
        let mut map: SipMap<'_, String, u32> = Map::new_in(&region);
        map.insert("alpha".to_string(), 1);
        map.insert("beta".to_string(), 2);

        assert_eq!(map.get("alpha"), Some(&1));
        assert_eq!(map["beta"], 2);
        assert!(map.contains_key("beta"));
        assert!(!map.contains_key("gamma"));
        assert!(map.erase("alpha"));
        assert!(!map.erase("alpha"));
    }

    #[test]
    fn test_get_mut() {
        let mut map = Map::with_hasher(SipHashBuilder::default());
        map.insert(1, "hello".to_string());

        if let Some(value) = map.get_mut(&1) {
            value.push_str(" world");
        }

        assert_eq!(map.get(&1), Some(&"hello world".to_string()));
        assert_eq!(map.get_mut(&2), None);
    }

    #[test]
    fn test_remove() {
        let region = Region::new();
        for mode in [AllocMode::Heap, AllocMode::Region(&region)] {
            let mut map = Map::with_hasher_in(SipHashBuilder::default(), mode);
            map.insert(1, "hello".to_string());
            map.insert(2, "world".to_string());

            assert_eq!(map.remove(&1), Some("hello".to_string()));
            assert_eq!(map.len(), 1);
            assert!(!map.contains_key(&1));
            assert!(map.contains_key(&2));
            assert_eq!(map.remove(&1), None);
            assert_eq!(map.remove_entry(&2), Some((2, "world".to_string())));
            assert!(map.is_empty());
        }
    }

    #[test]
    fn test_size_matches_inserted_minus_erased() {
        let region = Region::new();
        for mode in [AllocMode::Heap, AllocMode::Region(&region)] {
            let mut map: SipMap<'_, u32, u32> = Map::with_mode(mode);
            for i in 0..2000 {
                map.insert(i % 1500, i);
            }
            assert_eq!(map.size(), 1500);
            for i in (0..1500).step_by(3) {
                assert!(map.erase(&i));
            }
            assert_eq!(map.size(), 1000);
            for i in 0..1500 {
                assert_eq!(map.contains_key(&i), i % 3 != 0, "key {i}");
            }
        }
    }

    #[test]
    fn test_size_type_is_native_width() {
        let mut map: SipMap<'_, u8, u8> = Map::new();
        map.insert(1, 1);

        let size: usize = map.size();
        assert_eq!(size, 1);
        assert_eq!(size_of::<SizeType>(), size_of::<usize>());
        assert_eq!(size_of_val(&map.len()), size_of::<usize>());
        assert_eq!(size_of_val(&map.bucket_count()), size_of::<usize>());
        assert_eq!(size_of_val(&map.capacity()), size_of::<usize>());
    }

    #[test]
    fn test_load_factor() {
        let mut map: SipMap<'_, u32, u32> = Map::new();
        for i in 0..10_000 {
            map.insert(i, i);
            assert!(map.len() <= threshold(map.bucket_count()));
            if map.bucket_count() >= 16 {
                assert!(map.len() * 4 <= map.bucket_count() * 3);
            }
        }
        assert_eq!(map.bucket_count(), 16384);
        assert_eq!(map.capacity(), 12288);
    }

    #[test]
    fn test_colliding_keys() {
        let mut map: Map<'_, u32, u32, ConstantHashBuilder> = Map::new();
        for i in 0..100 {
            map.insert(i, i * 2);
        }
        for i in 0..100 {
            assert_eq!(map[&i], i * 2);
        }
        assert_eq!(map.debug_stats().longest_chain, 100);
        assert_eq!(map.chain_histogram().bins[ChainHistogram::BINS - 1], 1);

        for i in (0..100).rev() {
            assert_eq!(map.remove(&i), Some(i * 2));
        }
        assert!(map.is_empty());
    }

    #[test]
    fn test_clear() {
        let region = Region::new();
        let mut map = Map::with_hasher_in(SipHashBuilder::default(), AllocMode::Region(&region));
        map.insert(1, "hello".to_string());
        map.insert(2, "world".to_string());

        let buckets = map.bucket_count();
        map.clear();
        assert!(map.is_empty());
        assert_eq!(map.bucket_count(), buckets);
        assert!(!map.contains_key(&1));
        assert_eq!(map.iter().count(), 0);

        map.insert(3, "again".to_string());
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_reserve() {
        let mut map = Map::<i32, String, _>::with_hasher(SipHashBuilder::default());
        let initial_capacity = map.capacity();

        map.reserve(1000);
        assert!(map.capacity() >= initial_capacity + 1000);
        let buckets = map.bucket_count();
        for i in 0..1000 {
            map.insert(i, i.to_string());
        }
        assert_eq!(map.bucket_count(), buckets);
    }

    #[test]
    fn test_entry_api() {
        let mut map = Map::with_hasher(SipHashBuilder::default());

        let value = map.entry(1).or_insert("hello".to_string());
        assert_eq!(value, &"hello".to_string());
        assert_eq!(map.len(), 1);

        let value = map.entry(1).or_insert("world".to_string());
        assert_eq!(value, &"hello".to_string());
        assert_eq!(map.len(), 1);

        map.entry(2).or_insert_with(|| "computed".to_string());
        assert_eq!(map.get(&2), Some(&"computed".to_string()));

        map.entry(1)
            .and_modify(|v| v.push_str(" world"))
            .or_insert("default".to_string());
        assert_eq!(map.get(&1), Some(&"hello world".to_string()));

        assert_eq!(map.entry(3).key(), &3);
    }

    #[test]
    fn test_entry_or_default() {
        let mut map: SipMap<'_, i32, Vec<i32>> = Map::new();

        map.entry(1).or_default().push(42);
        assert_eq!(map.get(&1), Some(&vec![42]));

        map.entry(1).or_default().push(24);
        assert_eq!(map.get(&1), Some(&vec![42, 24]));
    }

    #[test]
    fn test_occupied_entry() {
        let mut map = Map::with_hasher(SipHashBuilder::default());
        map.insert(1, "hello".to_string());

        match map.entry(1) {
            Entry::Occupied(mut entry) => {
                assert_eq!(entry.key(), &1);
                assert_eq!(entry.get(), &"hello".to_string());

                *entry.get_mut() = "world".to_string();
                assert_eq!(entry.get(), &"world".to_string());

                let old_value = entry.insert("new".to_string());
                assert_eq!(old_value, "world".to_string());
                assert_eq!(entry.get(), &"new".to_string());

                let (key, value) = entry.remove_entry();
                assert_eq!(key, 1);
                assert_eq!(value, "new".to_string());
            }
            Entry::Vacant(_) => panic!("Expected occupied entry"),
        }

        assert!(map.is_empty());
    }

    #[test]
    fn test_vacant_entry() {
        let mut map = Map::with_hasher(SipHashBuilder::default());

        match map.entry(1) {
            Entry::Vacant(entry) => {
                assert_eq!(entry.key(), &1);

                let value = entry.insert("hello".to_string());
                assert_eq!(value, &"hello".to_string());
            }
            Entry::Occupied(_) => panic!("Expected vacant entry"),
        }

        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&1), Some(&"hello".to_string()));

        match map.entry(2) {
            Entry::Vacant(entry) => assert_eq!(entry.into_key(), 2),
            Entry::Occupied(_) => panic!("Expected vacant entry"),
        }
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_iterators() {
        let mut map: SipMap<'_, u32, u32> = (0..100).map(|i| (i, i * 10)).collect();

        let iter = map.iter();
        assert_eq!(iter.len(), 100);
        let first: Vec<_> = iter.clone().collect();
        let again: Vec<_> = iter.collect();
        assert_eq!(first, again);

        let mut keys: Vec<u32> = map.keys().copied().collect();
        keys.sort_unstable();
        assert_eq!(keys, (0..100).collect::<Vec<_>>());

        let sum: u32 = map.values().sum();
        assert_eq!(sum, (0..100u32).map(|i| i * 10).sum::<u32>());

        for (k, v) in map.iter_mut() {
            *v += k;
        }
        for v in &mut map {
            *v.1 += 1;
        }
        for value in map.values_mut() {
            *value *= 2;
        }
        for (k, v) in &map {
            assert_eq!(*v, (k * 11 + 1) * 2);
        }
    }

    #[test]
    fn test_get_or_insert_default() {
        let region = Region::new();
        let mut map: SipMap<'_, u32, String> = Map::new_in(&region);

        map.get_or_insert_default(1).push_str("one");
        map.get_or_insert_default(1).push('!');
        assert_eq!(map[&1], "one!");
        assert_eq!(map.get_or_insert_default(2), "");
        assert_eq!(map.len(), 2);

        let value = map.get_or_insert_with(3, |mode| {
            assert_eq!(mode, AllocMode::Region(&region));
            "three".to_string()
        });
        assert_eq!(value, "three");
    }

    #[test]
    fn test_nested_maps_inherit_the_mode() {
        let region = Region::new();
        let mut outer: SipMap<'_, u32, SipMap<'_, u32, u32>> = Map::new_in(&region);

        let inner = outer.get_or_insert_default(1);
        assert_eq!(inner.mode(), AllocMode::Region(&region));
        inner.insert(10, 100);

        let inner = outer.entry(2).or_default();
        assert_eq!(inner.mode(), AllocMode::Region(&region));

        let mut heap: SipMap<'_, u32, SipMap<'_, u32, u32>> = Map::new();
        assert_eq!(heap.get_or_insert_default(1).mode(), AllocMode::Heap);
    }

    #[test]
    fn test_copy_heap_into_region() {
        let mut source: SipMap<'_, i32, i32> = Map::new();
        source.insert(1, 2);
        source.insert(2, 3);

        let region = Region::new();
        let mut copy = source.clone_in(AllocMode::Region(&region));
        assert_eq!(copy.size(), 2);
        assert_eq!(copy.find(&1), Some(&2));
        assert_eq!(copy.find(&2), Some(&3));
        assert_eq!(copy.mode(), AllocMode::Region(&region));

        *copy.get_mut(&1).unwrap() = 5;
        assert_eq!(source.find(&1), Some(&2));
        assert_eq!(copy.find(&1), Some(&5));
    }

    #[test]
    fn test_copy_between_every_mode_pair() {
        let a = Region::new();
        let b = Region::new();
        let modes = [AllocMode::Heap, AllocMode::Region(&a), AllocMode::Region(&b)];

        for from in modes {
            let mut source: SipMap<'_, u32, String> = Map::with_mode(from);
            for i in 0..200 {
                source.insert(i, i.to_string());
            }

            for to in modes {
                let mut copy = source.clone_in(to);
                assert_eq!(copy.mode(), to);
                assert_eq!(copy, source);

                for (key, value) in copy.iter() {
                    let original = source.get(key).unwrap();
                    assert!(!core::ptr::eq(original, value));
                }

                copy.get_mut(&7).unwrap().push('x');
                copy.erase(&8);
                assert_eq!(source[&7], "7");
                assert_eq!(source[&8], "8");
                assert_ne!(copy, source);
            }
        }
    }

    #[test]
    fn test_copy_rebinds_nested_maps() {
        let region = Region::new();
        let mut source: SipMap<'_, u32, SipMap<'_, u32, String>> = Map::new();
        source
            .get_or_insert_default(1)
            .insert(2, "nested".to_string());

        let copy = source.clone_in(AllocMode::Region(&region));
        let inner = &copy[&1];
        assert_eq!(inner.mode(), AllocMode::Region(&region));
        assert_eq!(inner[&2], "nested");
        assert_eq!(source[&1].mode(), AllocMode::Heap);
    }

    #[test]
    fn test_clone_keeps_the_mode() {
        let region = Region::new();
        let mut map: SipMap<'_, u32, u32> = Map::new_in(&region);
        map.extend((0..50).map(|i| (i, i)));

        let clone = map.clone();
        assert_eq!(clone.mode(), AllocMode::Region(&region));
        assert_eq!(clone, map);
    }

    #[test]
    fn test_merge_from() {
        let region = Region::new();
        let mut target: SipMap<'_, u32, String> = Map::new_in(&region);
        target.insert(1, "old".to_string());
        target.insert(2, "kept".to_string());

        let mut other: SipMap<'_, u32, String> = Map::new();
        other.insert(1, "new".to_string());
        other.insert(3, "added".to_string());

        target.merge_from(&other);
        assert_eq!(target.len(), 3);
        assert_eq!(target[&1], "new");
        assert_eq!(target[&2], "kept");
        assert_eq!(target[&3], "added");
        assert_eq!(other.len(), 2);
    }

    #[test]
    fn test_aligned_values() {
        let region = Region::new();
        for mode in [AllocMode::Heap, AllocMode::Region(&region)] {
            let mut map: SipMap<'_, u8, Aligned64> = Map::with_mode(mode);
            for i in 0..100u8 {
                let value = map.get_or_insert_default(i);
                assert_eq!(addr(value) % 64, 0);
                value.0 = u64::from(i);
            }
            for (_, value) in map.iter() {
                assert_eq!(addr(value) % 64, 0);
            }

            let copy = map.clone_in(mode);
            for (key, value) in copy.iter() {
                assert_eq!(value.0, u64::from(*key));
                assert_eq!(addr(value) % 64, 0);
            }

            let mut small: SipMap<'_, u8, Aligned8> = Map::with_mode(mode);
            for i in 0..100u8 {
                small.insert(i, Aligned8(i));
            }
            for (key, value) in small.iter() {
                assert_eq!(value.0, *key);
                assert_eq!(addr(value) % 8, 0);
            }
        }
    }

    #[test]
    fn test_natural_growth_reuses_region_blocks() {
        const MAPS: usize = 100;
        const ENTRIES: i32 = 1000;

        let region = Region::new();
        let mut maps = Vec::with_capacity(MAPS);
        for _ in 0..MAPS {
            let mut map: SipMap<'_, i32, i32> = Map::new_in(&region);
            for i in 0..ENTRIES {
                map.insert(i, i);
            }
            maps.push(map);
        }

        let bucket_bytes = maps[0].bucket_count() * size_of::<usize>();
        let node_bytes = NodeLayout::of::<i32, i32>().layout.size();
        let expected = MAPS * (bucket_bytes + ENTRIES as usize * node_bytes);
        let used = region.space_used();

        assert!(used >= expected, "{used} < {expected}");
        assert!(
            used as f64 <= expected as f64 * 1.02,
            "{used} exceeds {expected} by more than 2%"
        );
        assert!(region.debug_stats().reused_blocks > 0);
    }

    #[test]
    fn test_region_drop_recycles_bucket_arrays() {
        let region = Region::new();
        {
            let mut map: SipMap<'_, u32, u32> = Map::new_in(&region);
            map.extend((0..100).map(|i| (i, i)));
        }
        let used = region.space_used();

        let mut map: SipMap<'_, u32, u32> = Map::new_in(&region);
        map.extend((0..100).map(|i| (i, i)));
        let node_bytes = NodeLayout::of::<u32, u32>().layout.size();
        assert_eq!(region.space_used() - used, 100 * node_bytes);
    }

    #[test]
    fn test_heap_destructors_run() {
        let tracker = Rc::new(());
        let region = Region::with_options(RegionOptions::default());
        for mode in [AllocMode::Heap, AllocMode::Region(&region)] {
            let mut map: SipMap<'_, u32, Rc<()>> = Map::with_mode(mode);
            for i in 0..100 {
                map.insert(i, tracker.clone());
            }
            map.insert(0, tracker.clone());
            assert_eq!(Rc::strong_count(&tracker), 101);
            map.remove(&1);
            assert_eq!(Rc::strong_count(&tracker), 100);
            drop(map);
            assert_eq!(Rc::strong_count(&tracker), 1);
        }
    }

    #[test]
    fn test_debug_format() {
        let mut map: SipMap<'_, u32, &str> = Map::new();
        map.insert(1, "one");
        assert_eq!(alloc::format!("{map:?}"), r#"{1: "one"}"#);
    }

    #[test]
    fn test_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SipMap<'static, u32, String>>();
        assert_send_sync::<Region>();
        assert_send_sync::<Iter<'static, u32, String>>();
        assert_send_sync::<Keys<'static, u32, String>>();
        assert_send_sync::<Values<'static, u32, String>>();
    }

    #[test]
    fn test_iterators_cross_threads() {
        let map: SipMap<'_, u32, u32> = (0..100).map(|i| (i, i * 2)).collect();
        let mut iter = map.iter();
        let skipped = iter.next().map_or(0, |(_, v)| u64::from(*v));
        let sum = std::thread::scope(|scope| {
            scope
                .spawn(move || iter.map(|(_, v)| u64::from(*v)).sum::<u64>())
                .join()
                .unwrap()
        });
        let total: u64 = (0..100u64).map(|i| i * 2).sum();
        assert_eq!(sum + skipped, total);
    }

    #[test]
    fn test_maps_share_a_region_across_threads() {
        let region = Region::new();
        std::thread::scope(|scope| {
            for t in 0..4u32 {
                let region = &region;
                scope.spawn(move || {
                    let mut map: SipMap<'_, u32, u32> = Map::new_in(region);
                    for i in 0..1000 {
                        map.insert(i, i + t);
                    }
                    for i in 0..1000 {
                        assert_eq!(map[&i], i + t);
                    }
                });
            }
        });
        let node_bytes = NodeLayout::of::<u32, u32>().layout.size();
        assert!(region.space_used() >= 4 * 1000 * node_bytes);
    }
}
