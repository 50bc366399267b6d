//! Separately chained bucket array underlying [`Map`](crate::Map).
//!
//! The table stores nodes allocated through its [`AllocMode`] and links them
//! into power-of-two sized bucket arrays. Like the map built on top of it,
//! the table is driven by caller-provided hashes and equality predicates;
//! growth additionally needs a closure that rehashes a stored key.

use alloc::vec::Vec;
use core::alloc::Layout;
use core::fmt::Debug;
use core::iter::FusedIterator;
use core::marker::PhantomData;
use core::ptr::NonNull;

use crate::alloc_mode::AllocMode;
use crate::growth;
use crate::node::NodeHeader;
#[cfg(any(test, feature = "stats"))]
use crate::node::NodeLayout;
use crate::node::NodePtr;

type Bucket = Option<NonNull<NodeHeader>>;

/// Largest number of entries a table can hold: the growth threshold of the
/// largest bucket array, 1_610_612_736. Entry counts are stored as `u32`;
/// converting them to `usize` is always lossless.
pub const MAX_LEN: usize = growth::threshold(growth::MAX_TABLE_SIZE);

const _: () = assert!(usize::BITS >= u32::BITS);
const _: () = assert!(MAX_LEN <= u32::MAX as usize);

#[inline]
fn check_len(required: usize) {
    assert!(
        required <= MAX_LEN,
        "map size {required} exceeds the ceiling of {MAX_LEN} entries"
    );
}

struct EmptyTable([Bucket; 1]);

// SAFETY: The empty table is never written to.
unsafe impl Sync for EmptyTable {}

/// Bucket array shared by every table that has never grown. Read-only.
static GLOBAL_EMPTY_TABLE: EmptyTable = EmptyTable([None]);

#[inline]
fn global_empty_table() -> NonNull<Bucket> {
    NonNull::from(&GLOBAL_EMPTY_TABLE.0).cast()
}

#[inline]
fn bucket_array_layout(buckets: usize) -> Layout {
    Layout::array::<Bucket>(buckets).expect("allocation size overflow")
}

/// Debug statistics for table analysis.
///
/// Only available in tests or with the `stats` feature.
#[cfg(any(test, feature = "stats"))]
#[derive(Debug, Clone)]
pub struct DebugStats {
    /// Number of entries currently in the table
    pub len: usize,
    /// Number of buckets, zero for the shared empty table
    pub bucket_count: usize,
    /// Number of entries allowed before the next growth
    pub threshold: usize,
    /// Buckets holding at least one entry
    pub occupied_buckets: usize,
    /// Length of the longest chain
    pub longest_chain: usize,
    /// Load factor (len / bucket_count)
    pub load_factor: f64,
    /// Bytes used by the bucket array
    pub bucket_bytes: usize,
    /// Bytes used by all nodes
    pub node_bytes: usize,
    /// Whether memory comes from a region
    pub region_bound: bool,
}

#[cfg(any(test, feature = "stats"))]
impl DebugStats {
    /// Pretty-print the debug statistics.
    #[cfg(feature = "std")]
    pub fn print(&self) {
        println!("=== Map Debug Statistics ===");
        println!(
            "Population: {}/{} buckets ({:.2}% load factor, grows past {})",
            self.len,
            self.bucket_count,
            self.load_factor * 100.0,
            self.threshold
        );
        println!(
            "Buckets: {} occupied, longest chain {}",
            self.occupied_buckets, self.longest_chain
        );
        println!(
            "Memory: {} bytes of buckets, {} bytes of nodes ({})",
            self.bucket_bytes,
            self.node_bytes,
            if self.region_bound { "region" } else { "heap" }
        );
    }
}

/// Number of buckets per chain length. The last bin counts every chain of
/// [`ChainHistogram::BINS`] - 1 nodes or more.
#[cfg(any(test, feature = "stats"))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainHistogram {
    /// `bins[n]` is the number of buckets whose chain has `n` nodes.
    pub bins: Vec<usize>,
}

#[cfg(any(test, feature = "stats"))]
impl ChainHistogram {
    /// Number of bins, including the open-ended last one.
    pub const BINS: usize = 9;

    /// Pretty-prints the histogram horizontally using stdout.
    #[cfg(feature = "std")]
    pub fn print(&self) {
        let max = self.bins.iter().copied().max().unwrap_or(0);
        if max == 0 {
            println!("chain histogram: empty");
            return;
        }

        let max_bar = 60usize;
        println!("chain histogram ({} buckets):", self.bins.iter().sum::<usize>());
        for (len, &count) in self.bins.iter().enumerate() {
            let label = if len + 1 == Self::BINS {
                alloc::format!("{len}+")
            } else {
                alloc::format!("{len:>2}")
            };
            let bar = "█".repeat((count * max_bar).div_ceil(max));
            println!("{label} | {bar} ({count})");
        }
    }
}

pub(crate) struct RawTable<'r, K, V> {
    buckets: NonNull<Bucket>,
    num_buckets: u32,
    num_elements: u32,
    mode: AllocMode<'r>,
    _marker: PhantomData<(K, V)>,
}

// SAFETY: The table owns its nodes like a `Box<(K, V)>` would; the mode is a
// shared reference to a `Sync` region.
unsafe impl<K: Send, V: Send> Send for RawTable<'_, K, V> {}
// SAFETY: Shared access only hands out shared references to keys and values.
unsafe impl<K: Sync, V: Sync> Sync for RawTable<'_, K, V> {}

impl<K, V> Drop for RawTable<'_, K, V> {
    fn drop(&mut self) {
        if self.needs_node_drop() {
            self.drop_nodes();
        }
        if self.num_buckets != 0 {
            let layout = bucket_array_layout(self.bucket_count());
            // SAFETY: A non-empty bucket array was allocated through our mode
            // with this layout, and is not used again.
            unsafe { self.mode.release_array(self.buckets.cast(), layout) };
        }
    }
}

impl<'r, K, V> RawTable<'r, K, V> {
    /// Creates an empty table sharing the global empty bucket array.
    pub(crate) fn new_in(mode: AllocMode<'r>) -> Self {
        Self {
            buckets: global_empty_table(),
            num_buckets: 0,
            num_elements: 0,
            mode,
            _marker: PhantomData,
        }
    }

    pub(crate) fn with_capacity_in(capacity: usize, mode: AllocMode<'r>) -> Self {
        check_len(capacity);
        let mut table = Self::new_in(mode);
        let buckets = growth::capacity_for(capacity);
        if buckets != 0 {
            // Nothing to rehash yet.
            table.resize(buckets, |_| unreachable!("empty table has no keys"));
        }
        table
    }

    #[inline]
    pub(crate) fn mode(&self) -> AllocMode<'r> {
        self.mode
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.num_elements as usize
    }

    #[inline]
    pub(crate) fn bucket_count(&self) -> usize {
        self.num_buckets as usize
    }

    #[inline]
    pub(crate) fn threshold(&self) -> usize {
        growth::threshold(self.bucket_count())
    }

    #[inline]
    fn buckets(&self) -> &[Bucket] {
        // SAFETY: `buckets` points to `num_buckets` initialized buckets; the
        // empty table has zero of them.
        unsafe { core::slice::from_raw_parts(self.buckets.as_ptr(), self.bucket_count()) }
    }

    #[inline]
    fn bucket_slot(&self, hash: u64) -> *mut Bucket {
        debug_assert!(self.num_buckets != 0);
        let index = (hash as usize) & (self.bucket_count() - 1);
        // SAFETY: The mask keeps the index within the bucket array.
        unsafe { self.buckets.as_ptr().add(index) }
    }

    pub(crate) fn find(&self, hash: u64, eq: impl Fn(&K) -> bool) -> Option<NodePtr<K, V>> {
        if self.num_elements == 0 {
            return None;
        }

        // SAFETY: The slot is in bounds, and every linked node is live.
        unsafe {
            let mut cursor = *self.bucket_slot(hash);
            while let Some(header) = cursor {
                let node = NodePtr::from_header(header);
                if eq(node.key()) {
                    return Some(node);
                }
                cursor = node.next();
            }
        }

        None
    }

    /// Grows the bucket array if `additional` more entries would cross the
    /// current threshold.
    pub(crate) fn reserve(&mut self, additional: usize, hasher: impl Fn(&K) -> u64) {
        let required = self
            .len()
            .checked_add(additional)
            .expect("capacity overflow");
        check_len(required);

        if required > self.threshold() {
            let buckets = growth::next_capacity(self.bucket_count(), required);
            self.resize(buckets, hasher);
        }
    }

    /// Links a new node for a key known to be absent. Growth happens first,
    /// so the node lands in the final bucket array.
    pub(crate) fn insert_unique(
        &mut self,
        hash: u64,
        key: K,
        value: V,
        hasher: impl Fn(&K) -> u64,
    ) -> NodePtr<K, V> {
        self.reserve(1, hasher);

        let node = NodePtr::allocate(self.mode, key, value);
        // SAFETY: The slot is in bounds and the node is fresh.
        unsafe { self.link(hash, node) };
        self.num_elements += 1;
        node
    }

    /// # Safety
    ///
    /// The bucket array must be non-empty and `node` must be live and
    /// unlinked.
    #[inline]
    unsafe fn link(&mut self, hash: u64, node: NodePtr<K, V>) {
        let slot = self.bucket_slot(hash);
        // SAFETY: Caller guarantees the slot is valid and the node unlinked.
        unsafe {
            node.set_next(*slot);
            *slot = Some(node.header());
        }
    }

    /// Unlinks the first node matching `eq` from the chain of `hash`.
    fn unlink(&mut self, hash: u64, eq: impl Fn(NodePtr<K, V>) -> bool) -> Option<NodePtr<K, V>> {
        if self.num_elements == 0 {
            return None;
        }

        // SAFETY: The slot is in bounds and every link points to a live node.
        unsafe {
            let mut link = self.bucket_slot(hash);
            while let Some(header) = *link {
                let node = NodePtr::from_header(header);
                if eq(node) {
                    *link = node.next();
                    self.num_elements -= 1;
                    return Some(node);
                }
                link = node.next_link();
            }
        }

        None
    }

    pub(crate) fn remove(&mut self, hash: u64, eq: impl Fn(&K) -> bool) -> Option<(K, V)> {
        // SAFETY: Unlinked nodes are live and owned by our mode.
        self.unlink(hash, |node| eq(unsafe { node.key() }))
            .map(|node| unsafe { node.into_parts(self.mode) })
    }

    /// Removes a node previously returned by [`find`](Self::find).
    pub(crate) fn remove_node(&mut self, hash: u64, target: NodePtr<K, V>) -> (K, V) {
        let node = self
            .unlink(hash, |node| node == target)
            .expect("node is linked in the chain of its hash");
        // SAFETY: The node was just unlinked and is owned by our mode.
        unsafe { node.into_parts(self.mode) }
    }

    /// Drops every entry, keeping the bucket array.
    pub(crate) fn clear(&mut self) {
        self.drop_nodes();
    }

    /// Region nodes are reclaimed with the region, so they only need a
    /// visit when a key or value has a destructor.
    #[inline]
    fn needs_node_drop(&self) -> bool {
        !self.mode.is_region() || core::mem::needs_drop::<K>() || core::mem::needs_drop::<V>()
    }

    /// Detaches every chain into one list, then destroys its nodes. The table
    /// is empty even if a destructor panics.
    fn drop_nodes(&mut self) {
        if self.num_elements == 0 {
            return;
        }
        self.num_elements = 0;

        if !self.needs_node_drop() {
            // SAFETY: The bucket array is non-empty; an all-zero bucket is
            // `None`.
            unsafe { core::ptr::write_bytes(self.buckets.as_ptr(), 0, self.bucket_count()) };
            return;
        }

        let mut detached: Bucket = None;
        for index in 0..self.bucket_count() {
            // SAFETY: `index` is within the non-empty bucket array and every
            // linked node is live.
            unsafe {
                let slot = self.buckets.as_ptr().add(index);
                while let Some(header) = *slot {
                    let node = NodePtr::<K, V>::from_header(header);
                    *slot = node.next();
                    node.set_next(detached);
                    detached = Some(header);
                }
            }
        }

        let mut list = DetachedList::<K, V> {
            head: detached,
            mode: self.mode,
            _marker: PhantomData,
        };
        list.destroy_all();
    }

    /// Moves every node into a new bucket array of `new_buckets` entries.
    ///
    /// Nodes are relinked, never copied: their addresses are stable. The old
    /// array goes back through the mode's release path.
    #[cold]
    #[inline(never)]
    fn resize(&mut self, new_buckets: usize, hasher: impl Fn(&K) -> u64) {
        debug_assert!(new_buckets.is_power_of_two());
        debug_assert!(new_buckets > self.bucket_count());

        let new_layout = bucket_array_layout(new_buckets);
        let new_array = self.mode.allocate_array(new_layout).cast::<Bucket>();
        // SAFETY: `new_array` holds `new_buckets` buckets; an all-zero bucket
        // is `None`.
        unsafe { core::ptr::write_bytes(new_array.as_ptr(), 0, new_buckets) };

        let old_array = core::mem::replace(&mut self.buckets, new_array);
        let old_buckets = core::mem::replace(&mut self.num_buckets, new_buckets as u32);

        let mut guard = RehashGuard {
            table: self,
            old_array,
            old_buckets: old_buckets as usize,
            done: false,
        };

        for index in 0..guard.old_buckets {
            // SAFETY: `index` is within the old array; every linked node is
            // live. The chain head is only advanced after the node's hash is
            // known, so an unwinding hasher leaves every node reachable.
            unsafe {
                let slot = guard.old_array.as_ptr().add(index);
                while let Some(header) = *slot {
                    let node = NodePtr::<K, V>::from_header(header);
                    let hash = hasher(node.key());
                    *slot = node.next();
                    guard.table.link(hash, node);
                }
            }
        }

        guard.done = true;
    }

    /// Copies every entry into a new table bound to `mode`, sized for the
    /// current length.
    pub(crate) fn clone_in<'m>(
        &self,
        mode: AllocMode<'m>,
        clone_entry: impl Fn(&K, &V, AllocMode<'m>) -> (K, V),
        hasher: impl Fn(&K) -> u64,
    ) -> RawTable<'m, K, V> {
        let mut table = RawTable::with_capacity_in(self.len(), mode);
        for node in self.iter() {
            // SAFETY: Iterated nodes are live while `self` is borrowed.
            let (key, value) = unsafe { clone_entry(node.key(), node.value(), mode) };
            let hash = hasher(&key);
            table.insert_unique(hash, key, value, &hasher);
        }
        table
    }

    pub(crate) fn iter(&self) -> RawIter<'_, K, V> {
        RawIter {
            buckets: self.buckets(),
            next_bucket: 0,
            current: None,
            remaining: self.len(),
            _marker: PhantomData,
        }
    }

    /// Returns chain-length and memory statistics for debugging.
    #[cfg(any(test, feature = "stats"))]
    pub(crate) fn debug_stats(&self) -> DebugStats {
        let mut occupied_buckets = 0;
        let mut longest_chain = 0;
        for &head in self.buckets() {
            let len = chain_len::<K, V>(head);
            if len > 0 {
                occupied_buckets += 1;
            }
            longest_chain = longest_chain.max(len);
        }

        DebugStats {
            len: self.len(),
            bucket_count: self.bucket_count(),
            threshold: self.threshold(),
            occupied_buckets,
            longest_chain,
            load_factor: if self.num_buckets == 0 {
                0.0
            } else {
                self.len() as f64 / self.bucket_count() as f64
            },
            bucket_bytes: if self.num_buckets == 0 {
                0
            } else {
                bucket_array_layout(self.bucket_count()).size()
            },
            node_bytes: self.len() * NodeLayout::of::<K, V>().layout.size(),
            region_bound: self.mode.is_region(),
        }
    }

    #[cfg(any(test, feature = "stats"))]
    pub(crate) fn chain_histogram(&self) -> ChainHistogram {
        let mut bins = alloc::vec![0usize; ChainHistogram::BINS];
        for &head in self.buckets() {
            let len = chain_len::<K, V>(head);
            bins[len.min(ChainHistogram::BINS - 1)] += 1;
        }
        ChainHistogram { bins }
    }
}

#[cfg(any(test, feature = "stats"))]
fn chain_len<K, V>(mut cursor: Bucket) -> usize {
    let mut len = 0;
    while let Some(header) = cursor {
        len += 1;
        // SAFETY: Linked nodes are live.
        cursor = unsafe { NodePtr::<K, V>::from_header(header).next() };
    }
    len
}

impl<K, V> Debug for RawTable<'_, K, V>
where
    K: Debug,
    V: Debug,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RawTable")
            .field(
                "chains",
                &self
                    .buckets()
                    .iter()
                    .map(|&head| {
                        let mut chain = Vec::new();
                        let mut cursor = head;
                        while let Some(header) = cursor {
                            let node = NodePtr::<K, V>::from_header(header);
                            // SAFETY: Linked nodes are live while `self` is
                            // borrowed.
                            unsafe {
                                chain.push((node.key(), node.value()));
                                cursor = node.next();
                            }
                        }
                        chain
                    })
                    .collect::<Vec<_>>(),
            )
            .field("len", &self.len())
            .field("mode", &self.mode)
            .finish()
    }
}

/// Completes or rolls back a resize. If the hasher unwinds, every node still
/// reachable from either array is destroyed and the table is reset to the
/// shared empty array.
struct RehashGuard<'t, 'r, K, V> {
    table: &'t mut RawTable<'r, K, V>,
    old_array: NonNull<Bucket>,
    old_buckets: usize,
    done: bool,
}

impl<K, V> Drop for RehashGuard<'_, '_, K, V> {
    fn drop(&mut self) {
        let mode = self.table.mode;

        if !self.done {
            // Fold what is left of the old chains into the new array's first
            // bucket so one pass destroys everything.
            // SAFETY: Both arrays are valid and their nodes live; the new
            // array is non-empty.
            unsafe {
                let first = self.table.buckets.as_ptr();
                for index in 0..self.old_buckets {
                    let slot = self.old_array.as_ptr().add(index);
                    while let Some(header) = *slot {
                        let node = NodePtr::<K, V>::from_header(header);
                        *slot = node.next();
                        node.set_next(*first);
                        *first = Some(header);
                    }
                }
            }
            self.table.drop_nodes();

            let layout = bucket_array_layout(self.table.bucket_count());
            // SAFETY: The new array was allocated through `mode` with this
            // layout and is abandoned below.
            unsafe { mode.release_array(self.table.buckets.cast(), layout) };
            self.table.buckets = global_empty_table();
            self.table.num_buckets = 0;
        }

        if self.old_buckets != 0 {
            let layout = bucket_array_layout(self.old_buckets);
            // SAFETY: The old array was allocated through `mode` with this
            // layout and no longer holds any node.
            unsafe { mode.release_array(self.old_array.cast(), layout) };
        }
    }
}

/// Singly linked list of nodes taken out of a table. Whatever is still on
/// the list when it is dropped gets destroyed, so a panicking destructor
/// does not leak the nodes after it.
struct DetachedList<'m, K, V> {
    head: Bucket,
    mode: AllocMode<'m>,
    _marker: PhantomData<(K, V)>,
}

impl<K, V> DetachedList<'_, K, V> {
    fn destroy_all(&mut self) {
        while let Some(header) = self.head {
            let node = NodePtr::<K, V>::from_header(header);
            // SAFETY: Listed nodes are live, unlinked from any table, and
            // owned by `mode`. The head moves past the node before it is
            // destroyed.
            unsafe {
                self.head = node.next();
                node.destroy(self.mode);
            }
        }
    }
}

impl<K, V> Drop for DetachedList<'_, K, V> {
    fn drop(&mut self) {
        self.destroy_all();
    }
}

/// Iterator over the nodes of a [`RawTable`] in bucket order.
pub(crate) struct RawIter<'a, K, V> {
    buckets: &'a [Bucket],
    next_bucket: usize,
    current: Bucket,
    remaining: usize,
    _marker: PhantomData<&'a (K, V)>,
}

impl<K, V> Clone for RawIter<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            buckets: self.buckets,
            next_bucket: self.next_bucket,
            current: self.current,
            remaining: self.remaining,
            _marker: PhantomData,
        }
    }
}

impl<K, V> Iterator for RawIter<'_, K, V> {
    type Item = NodePtr<K, V>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(header) = self.current {
                let node = NodePtr::from_header(header);
                // SAFETY: Linked nodes are live while the table is borrowed.
                self.current = unsafe { node.next() };
                self.remaining -= 1;
                return Some(node);
            }

            if self.remaining == 0 {
                return None;
            }

            self.current = self.buckets[self.next_bucket];
            self.next_bucket += 1;
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

// SAFETY: The iterator only hands out shared access to nodes, like
// `&RawTable` does.
unsafe impl<K: Sync, V: Sync> Send for RawIter<'_, K, V> {}
// SAFETY: As above.
unsafe impl<K: Sync, V: Sync> Sync for RawIter<'_, K, V> {}

impl<K, V> ExactSizeIterator for RawIter<'_, K, V> {}

impl<K, V> FusedIterator for RawIter<'_, K, V> {}
