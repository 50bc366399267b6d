use alloc::alloc::handle_alloc_error;
use core::alloc::Layout;
use core::fmt::Debug;
use core::ptr::NonNull;

use crate::region::Region;

/// Where a map obtains its node and bucket-array memory.
///
/// The mode is chosen when a map is constructed and never changes afterwards.
/// All allocation decisions of the table go through the methods below, so the
/// growth and rehash logic never has to branch on the mode itself.
#[derive(Clone, Copy, Default)]
pub enum AllocMode<'r> {
    /// Every block is obtained from and returned to the global allocator.
    #[default]
    Heap,
    /// Blocks are carved from a shared region and reclaimed only when the
    /// region is torn down. Abandoned bucket arrays are offered back to the
    /// region for reuse.
    Region(&'r Region),
}

impl Debug for AllocMode<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            AllocMode::Heap => f.write_str("Heap"),
            AllocMode::Region(region) => f
                .debug_tuple("Region")
                .field(&(*region as *const Region))
                .finish(),
        }
    }
}

impl PartialEq for AllocMode<'_> {
    /// Two modes are equal when both are heap modes or both are bound to the
    /// same region instance.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (AllocMode::Heap, AllocMode::Heap) => true,
            (AllocMode::Region(a), AllocMode::Region(b)) => core::ptr::eq(*a, *b),
            _ => false,
        }
    }
}

impl Eq for AllocMode<'_> {}

impl<'r> From<&'r Region> for AllocMode<'r> {
    fn from(region: &'r Region) -> Self {
        AllocMode::Region(region)
    }
}

impl<'r> From<Option<&'r Region>> for AllocMode<'r> {
    fn from(region: Option<&'r Region>) -> Self {
        region.map_or(AllocMode::Heap, AllocMode::Region)
    }
}

impl<'r> AllocMode<'r> {
    /// Returns the bound region, or `None` in heap mode.
    #[inline]
    pub fn region(self) -> Option<&'r Region> {
        match self {
            AllocMode::Heap => None,
            AllocMode::Region(region) => Some(region),
        }
    }

    /// Returns `true` if memory comes from a region.
    #[inline]
    pub fn is_region(self) -> bool {
        matches!(self, AllocMode::Region(_))
    }

    /// Allocates a block for a single node.
    ///
    /// `layout` must have a non-zero size.
    #[inline]
    pub(crate) fn allocate(self, layout: Layout) -> NonNull<u8> {
        debug_assert!(layout.size() != 0);
        match self {
            AllocMode::Heap => heap_allocate(layout),
            AllocMode::Region(region) => region.allocate(layout),
        }
    }

    /// Releases a block obtained from [`allocate`](Self::allocate).
    ///
    /// A no-op in region mode: node memory is reclaimed with the region.
    ///
    /// # Safety
    ///
    /// `ptr` must come from `allocate` on this mode with the same `layout`,
    /// and must not be used afterwards.
    #[inline]
    pub(crate) unsafe fn release(self, ptr: NonNull<u8>, layout: Layout) {
        match self {
            // SAFETY: Caller guarantees `ptr` came from `heap_allocate` with
            // this layout.
            AllocMode::Heap => unsafe { alloc::alloc::dealloc(ptr.as_ptr(), layout) },
            AllocMode::Region(_) => {}
        }
    }

    /// Allocates a bucket array, preferring a recycled block in region mode.
    ///
    /// `layout` must have a non-zero size.
    #[inline]
    pub(crate) fn allocate_array(self, layout: Layout) -> NonNull<u8> {
        debug_assert!(layout.size() != 0);
        match self {
            AllocMode::Heap => heap_allocate(layout),
            AllocMode::Region(region) => region
                .try_reuse(layout)
                .unwrap_or_else(|| region.allocate(layout)),
        }
    }

    /// Releases a bucket array obtained from
    /// [`allocate_array`](Self::allocate_array).
    ///
    /// Frees it in heap mode; offers it to the region's recycling pool in
    /// region mode.
    ///
    /// # Safety
    ///
    /// `ptr` must come from `allocate_array` on this mode with the same
    /// `layout`, and must not be used afterwards.
    #[inline]
    pub(crate) unsafe fn release_array(self, ptr: NonNull<u8>, layout: Layout) {
        match self {
            // SAFETY: Caller guarantees `ptr` came from `heap_allocate` with
            // this layout.
            AllocMode::Heap => unsafe { alloc::alloc::dealloc(ptr.as_ptr(), layout) },
            // SAFETY: Caller guarantees `ptr` came from this region and is
            // abandoned.
            AllocMode::Region(region) => unsafe { region.recycle(ptr, layout) },
        }
    }
}

#[inline]
fn heap_allocate(layout: Layout) -> NonNull<u8> {
    // SAFETY: Callers only pass layouts with a non-zero size.
    let raw = unsafe { alloc::alloc::alloc(layout) };
    match NonNull::new(raw) {
        Some(ptr) => ptr,
        None => handle_alloc_error(layout),
    }
}
