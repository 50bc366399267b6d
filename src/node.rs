use core::alloc::Layout;
use core::marker::PhantomData;
use core::ptr::NonNull;

use crate::alloc_mode::AllocMode;

/// Link header at the start of every node allocation.
#[repr(C)]
pub(crate) struct NodeHeader {
    pub(crate) next: Option<NonNull<NodeHeader>>,
}

/// Byte layout of a node holding a `K` and a `V`.
///
/// The header comes first, then the key and the value, each padded to its
/// own alignment. The total size is padded to the overall alignment so nodes
/// carved back to back in a region stay aligned.
#[derive(Debug, Clone, Copy)]
pub(crate) struct NodeLayout {
    pub(crate) layout: Layout,
    pub(crate) key_offset: usize,
    pub(crate) value_offset: usize,
}

impl NodeLayout {
    #[inline]
    pub(crate) fn of<K, V>() -> Self {
        let (layout, key_offset) = Layout::new::<NodeHeader>()
            .extend(Layout::new::<K>())
            .expect("allocation size overflow");
        let (layout, value_offset) = layout
            .extend(Layout::new::<V>())
            .expect("allocation size overflow");

        NodeLayout {
            layout: layout.pad_to_align(),
            key_offset,
            value_offset,
        }
    }
}

/// Untyped-header handle to a node owned by a table.
///
/// The handle does not own the node: the table decides when it is destroyed
/// and through which [`AllocMode`].
pub(crate) struct NodePtr<K, V> {
    header: NonNull<NodeHeader>,
    _marker: PhantomData<(K, V)>,
}

impl<K, V> Clone for NodePtr<K, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K, V> Copy for NodePtr<K, V> {}

impl<K, V> PartialEq for NodePtr<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.header == other.header
    }
}

impl<K, V> NodePtr<K, V> {
    /// Allocates a node through `mode` and moves `key` and `value` into it.
    pub(crate) fn allocate(mode: AllocMode<'_>, key: K, value: V) -> Self {
        let layout = NodeLayout::of::<K, V>();
        let raw = mode.allocate(layout.layout);

        // SAFETY: `raw` is a fresh allocation of `layout.layout`; the offsets
        // were computed from the same layout and are aligned for their field.
        unsafe {
            raw.cast::<NodeHeader>().write(NodeHeader { next: None });
            raw.add(layout.key_offset).cast::<K>().write(key);
            raw.add(layout.value_offset).cast::<V>().write(value);
        }

        NodePtr {
            header: raw.cast(),
            _marker: PhantomData,
        }
    }

    #[inline]
    pub(crate) fn from_header(header: NonNull<NodeHeader>) -> Self {
        NodePtr {
            header,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub(crate) fn header(self) -> NonNull<NodeHeader> {
        self.header
    }

    /// # Safety
    ///
    /// The node must be live.
    #[inline]
    pub(crate) unsafe fn next(self) -> Option<NonNull<NodeHeader>> {
        // SAFETY: Caller guarantees the node is live.
        unsafe { (*self.header.as_ptr()).next }
    }

    /// Pointer to the node's link field, for in-place unlinking.
    #[inline]
    pub(crate) fn next_link(self) -> *mut Option<NonNull<NodeHeader>> {
        // SAFETY: Only computes a field address; nothing is read.
        unsafe { &raw mut (*self.header.as_ptr()).next }
    }

    /// # Safety
    ///
    /// The node must be live and not aliased mutably.
    #[inline]
    pub(crate) unsafe fn set_next(self, next: Option<NonNull<NodeHeader>>) {
        // SAFETY: Caller guarantees exclusive access to a live node.
        unsafe { (*self.header.as_ptr()).next = next };
    }

    #[inline]
    fn key_ptr(self) -> *mut K {
        let offset = NodeLayout::of::<K, V>().key_offset;
        // SAFETY: The offset lies within the node allocation.
        unsafe { self.header.cast::<u8>().add(offset).cast::<K>().as_ptr() }
    }

    #[inline]
    pub(crate) fn value_ptr(self) -> *mut V {
        let offset = NodeLayout::of::<K, V>().value_offset;
        // SAFETY: The offset lies within the node allocation.
        unsafe { self.header.cast::<u8>().add(offset).cast::<V>().as_ptr() }
    }

    /// # Safety
    ///
    /// The node must stay live for `'a`.
    #[inline]
    pub(crate) unsafe fn key<'a>(self) -> &'a K {
        // SAFETY: Caller guarantees the node outlives `'a`.
        unsafe { &*self.key_ptr() }
    }

    /// # Safety
    ///
    /// The node must stay live for `'a`.
    #[inline]
    pub(crate) unsafe fn value<'a>(self) -> &'a V {
        // SAFETY: Caller guarantees the node outlives `'a`.
        unsafe { &*self.value_ptr() }
    }

    /// # Safety
    ///
    /// The node must stay live for `'a` and the value must not be aliased.
    #[inline]
    pub(crate) unsafe fn value_mut<'a>(self) -> &'a mut V {
        // SAFETY: Caller guarantees liveness and exclusive access.
        unsafe { &mut *self.value_ptr() }
    }

    /// # Safety
    ///
    /// The node must stay live for `'a` and the value must not be aliased.
    #[inline]
    pub(crate) unsafe fn pair_mut<'a>(self) -> (&'a K, &'a mut V) {
        // SAFETY: Key and value are disjoint fields; caller guarantees
        // liveness and exclusive access to the value.
        unsafe { (&*self.key_ptr(), &mut *self.value_ptr()) }
    }

    /// Drops the key and value in place and releases the node through `mode`.
    ///
    /// # Safety
    ///
    /// The node must be live, unlinked, and allocated through `mode`. It must
    /// not be used afterwards.
    pub(crate) unsafe fn destroy(self, mode: AllocMode<'_>) {
        // SAFETY: Caller guarantees the node is live and owned by `mode`. The
        // memory is released even if a destructor panics.
        unsafe {
            let _release = ReleaseOnDrop::<K, V> { node: self, mode };
            let _value = DropInPlace(self.value_ptr());
            core::ptr::drop_in_place(self.key_ptr());
        }
    }

    /// Moves the key and value out and releases the node through `mode`.
    ///
    /// # Safety
    ///
    /// Same requirements as [`destroy`](Self::destroy).
    pub(crate) unsafe fn into_parts(self, mode: AllocMode<'_>) -> (K, V) {
        // SAFETY: Caller guarantees the node is live and owned by `mode`;
        // both fields are read exactly once before the memory is released.
        unsafe {
            let key = self.key_ptr().read();
            let value = self.value_ptr().read();
            mode.release(self.header.cast(), NodeLayout::of::<K, V>().layout);
            (key, value)
        }
    }
}

/// Drops the pointee when it goes out of scope, also while unwinding.
struct DropInPlace<T>(*mut T);

impl<T> Drop for DropInPlace<T> {
    fn drop(&mut self) {
        // SAFETY: Constructed only by `destroy` over a live field that is
        // dropped nowhere else.
        unsafe { core::ptr::drop_in_place(self.0) };
    }
}

struct ReleaseOnDrop<'r, K, V> {
    node: NodePtr<K, V>,
    mode: AllocMode<'r>,
}

impl<K, V> Drop for ReleaseOnDrop<'_, K, V> {
    fn drop(&mut self) {
        // SAFETY: Constructed only by `destroy`, whose caller owns the node.
        unsafe {
            self.mode
                .release(self.node.header.cast(), NodeLayout::of::<K, V>().layout)
        };
    }
}
