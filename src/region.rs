use alloc::alloc::handle_alloc_error;
use alloc::vec::Vec;
use core::alloc::Layout;
use core::fmt::Debug;
use core::ptr::NonNull;

use crate::sync::Lock;

/// One free list per power-of-two size class.
const FREE_LIST_CLASSES: usize = usize::BITS as usize;

/// Blocks smaller than this are never cached.
const MIN_RECYCLE_SIZE: usize = 16;

/// Every cached block is at least this aligned, so reuse is only offered for
/// layouts that need no more than this.
const RECYCLE_ALIGN: usize = align_of::<FreeBlock>();

/// Alignment of every chunk obtained from the global allocator.
const CHUNK_ALIGN: usize = 16;

/// Construction options for a [`Region`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionOptions {
    /// Size in bytes of the first chunk carved from the global allocator.
    pub initial_block_size: usize,
    /// Chunk sizes double after every chunk until they reach this size.
    pub max_block_size: usize,
}

impl Default for RegionOptions {
    fn default() -> Self {
        Self {
            initial_block_size: 256,
            max_block_size: 32 * 1024,
        }
    }
}

/// Intrusive free-list link written into a recycled block.
struct FreeBlock {
    next: Option<NonNull<FreeBlock>>,
}

struct Chunk {
    ptr: NonNull<u8>,
    layout: Layout,
}

struct RegionState {
    chunks: Vec<Chunk>,

    head: NonNull<u8>,
    pos: usize,
    end: usize,
    next_block_size: usize,

    space_used: usize,
    space_allocated: usize,

    free_lists: [Option<NonNull<FreeBlock>>; FREE_LIST_CLASSES],
    recycled_blocks: usize,
    reused_blocks: usize,
    cached_bytes: usize,
}

// SAFETY: The raw pointers refer to chunks owned by the state itself, and
// every access goes through the region's lock.
unsafe impl Send for RegionState {}

impl RegionState {
    fn new(options: &RegionOptions) -> Self {
        Self {
            chunks: Vec::new(),
            head: NonNull::dangling(),
            pos: 0,
            end: 0,
            next_block_size: options.initial_block_size,
            space_used: 0,
            space_allocated: 0,
            free_lists: [None; FREE_LIST_CLASSES],
            recycled_blocks: 0,
            reused_blocks: 0,
            cached_bytes: 0,
        }
    }

    fn bump(&mut self, layout: Layout, options: &RegionOptions) -> NonNull<u8> {
        if let Some(ptr) = self.bump_in_current(layout) {
            return ptr;
        }
        self.grow(layout, options)
    }

    #[inline]
    fn bump_in_current(&mut self, layout: Layout) -> Option<NonNull<u8>> {
        // SAFETY: `pos <= end`, and `end` is the length of the current chunk
        // (or zero when there is none), so the offset stays in bounds.
        let pad = unsafe { self.head.as_ptr().add(self.pos) }.align_offset(layout.align());
        let start = self.pos.checked_add(pad)?;
        let end = start.checked_add(layout.size())?;
        if end > self.end {
            return None;
        }

        self.space_used += end - self.pos;
        self.pos = end;
        // SAFETY: `start < end <= self.end`, inside the current chunk.
        Some(unsafe { self.head.add(start) })
    }

    #[cold]
    fn grow(&mut self, layout: Layout, options: &RegionOptions) -> NonNull<u8> {
        let needed = layout
            .size()
            .checked_add(layout.align())
            .expect("allocation size overflow");
        let block_size = self.next_block_size;

        if needed > block_size {
            // Oversized requests get a chunk of their own so the tail of the
            // current chunk stays usable.
            let chunk_layout = layout
                .align_to(CHUNK_ALIGN)
                .expect("allocation size overflow");
            let ptr = self.push_chunk(chunk_layout);
            self.space_used += layout.size();
            return ptr;
        }

        let chunk_layout =
            Layout::from_size_align(block_size, CHUNK_ALIGN).expect("allocation size overflow");
        self.head = self.push_chunk(chunk_layout);
        self.pos = 0;
        self.end = block_size;
        self.next_block_size = block_size
            .saturating_mul(2)
            .min(options.max_block_size)
            .max(block_size);

        self.bump_in_current(layout)
            .expect("fresh chunk is large enough for the request")
    }

    fn push_chunk(&mut self, layout: Layout) -> NonNull<u8> {
        // SAFETY: Every chunk layout has a non-zero size.
        let raw = unsafe { alloc::alloc::alloc(layout) };
        let Some(ptr) = NonNull::new(raw) else {
            handle_alloc_error(layout);
        };
        self.chunks.push(Chunk { ptr, layout });
        self.space_allocated += layout.size();
        ptr
    }

    /// # Safety
    ///
    /// `block` must be valid for writes of `1 << class` bytes, aligned for
    /// `FreeBlock`, and unused by anyone else until popped again.
    unsafe fn push(&mut self, block: NonNull<FreeBlock>, class: usize) {
        // SAFETY: Caller guarantees the block is writable and aligned.
        unsafe {
            block.as_ptr().write(FreeBlock {
                next: self.free_lists[class],
            });
        }
        self.free_lists[class] = Some(block);
        self.recycled_blocks += 1;
        self.cached_bytes += 1 << class;
    }

    fn pop(&mut self, class: usize) -> Option<NonNull<u8>> {
        let block = self.free_lists[class]?;
        // SAFETY: Blocks on a free list hold an initialized link written by
        // `push`.
        self.free_lists[class] = unsafe { (*block.as_ptr()).next };
        self.reused_blocks += 1;
        self.cached_bytes -= 1 << class;
        Some(block.cast())
    }

    fn release_chunks(&mut self) {
        for chunk in self.chunks.drain(..) {
            // SAFETY: Each chunk was allocated by `push_chunk` with this layout.
            unsafe { alloc::alloc::dealloc(chunk.ptr.as_ptr(), chunk.layout) };
        }
    }
}

/// A growable memory region whose allocations are all freed at once.
///
/// Many maps can be bound to the same region, from any number of threads.
/// Memory handed out by [`allocate`] is never returned individually; it goes
/// back to the global allocator when the region is dropped or [`reset`].
///
/// Blocks that their user no longer needs can be offered back through
/// [`recycle`]. They are kept on per-size-class free lists and handed out
/// again by [`try_reuse`], which is how growing maps avoid paying for every
/// bucket array they ever abandoned.
///
/// [`allocate`]: Region::allocate
/// [`reset`]: Region::reset
/// [`recycle`]: Region::recycle
/// [`try_reuse`]: Region::try_reuse
///
/// # Examples
///
/// ```rust
/// use region_map::Map;
/// use region_map::Region;
///
/// let region = Region::new();
/// let mut map: Map<'_, u32, u32> = Map::new_in(&region);
/// map.insert(1, 2);
/// assert!(region.space_used() > 0);
/// ```
pub struct Region {
    state: Lock<RegionState>,
    options: RegionOptions,
}

impl Debug for Region {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.state.with(|state| {
            f.debug_struct("Region")
                .field("space_used", &state.space_used)
                .field("space_allocated", &state.space_allocated)
                .field("chunks", &state.chunks.len())
                .field("cached_bytes", &state.cached_bytes)
                .finish()
        })
    }
}

impl Default for Region {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Region {
    fn drop(&mut self) {
        self.state.get_mut().release_chunks();
    }
}

impl Region {
    /// Creates an empty region. No memory is obtained until the first
    /// allocation.
    pub fn new() -> Self {
        Self::with_options(RegionOptions::default())
    }

    /// Creates an empty region with explicit chunk sizing.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use region_map::Region;
    /// use region_map::RegionOptions;
    ///
    /// let region = Region::with_options(RegionOptions {
    ///     initial_block_size: 4096,
    ///     max_block_size: 1 << 20,
    /// });
    /// assert_eq!(region.space_allocated(), 0);
    /// ```
    pub fn with_options(options: RegionOptions) -> Self {
        let initial_block_size = options.initial_block_size.max(MIN_RECYCLE_SIZE);
        let options = RegionOptions {
            initial_block_size,
            max_block_size: options.max_block_size.max(initial_block_size),
        };
        Self {
            state: Lock::new(RegionState::new(&options)),
            options,
        }
    }

    /// Returns the options this region was built with.
    pub fn options(&self) -> RegionOptions {
        self.options
    }

    /// Allocates a block satisfying `layout`.
    ///
    /// The block stays valid until the region is dropped or reset. Allocation
    /// failure of the underlying global allocator is fatal.
    pub fn allocate(&self, layout: Layout) -> NonNull<u8> {
        if layout.size() == 0 {
            // SAFETY: A layout's alignment is never zero.
            return unsafe {
                NonNull::new_unchecked(core::ptr::without_provenance_mut(layout.align()))
            };
        }
        self.state.with(|state| state.bump(layout, &self.options))
    }

    /// Pops a previously recycled block able to hold `layout`, if one is
    /// cached.
    ///
    /// The returned block is at least `layout.size()` bytes (rounded up to
    /// the next power of two) and pointer aligned. Layouts needing a larger
    /// alignment, or fewer than 16 bytes, are never served from the cache.
    pub fn try_reuse(&self, layout: Layout) -> Option<NonNull<u8>> {
        if layout.align() > RECYCLE_ALIGN || layout.size() < MIN_RECYCLE_SIZE {
            return None;
        }
        let class = layout.size().checked_next_power_of_two()?.trailing_zeros() as usize;
        self.state.with(|state| state.pop(class))
    }

    /// Offers a block back to the region for later reuse.
    ///
    /// This is best effort: blocks smaller than 16 bytes or not pointer
    /// aligned are ignored. A block is cached under the largest power of two
    /// not exceeding its size.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by [`allocate`] or [`try_reuse`] on this
    /// region with a size of at least `layout.size()`, and must not be used
    /// again by the caller.
    ///
    /// [`allocate`]: Region::allocate
    /// [`try_reuse`]: Region::try_reuse
    pub unsafe fn recycle(&self, ptr: NonNull<u8>, layout: Layout) {
        let block = ptr.cast::<FreeBlock>();
        if layout.size() < MIN_RECYCLE_SIZE || !block.as_ptr().is_aligned() {
            return;
        }
        let class = (usize::BITS - 1 - layout.size().leading_zeros()) as usize;
        // SAFETY: Caller guarantees the block belongs to this region and is
        // no longer in use; size and alignment were checked above.
        self.state.with(|state| unsafe { state.push(block, class) });
    }

    /// Bytes handed out by [`allocate`](Region::allocate), including alignment
    /// padding. Unused chunk tails are not counted.
    pub fn space_used(&self) -> usize {
        self.state.with(|state| state.space_used)
    }

    /// Bytes obtained from the global allocator.
    pub fn space_allocated(&self) -> usize {
        self.state.with(|state| state.space_allocated)
    }

    /// Frees every chunk at once and returns the region to its initial state.
    ///
    /// Requires exclusive access, so no map can still be bound to it.
    pub fn reset(&mut self) {
        let state = self.state.get_mut();
        state.release_chunks();
        *state = RegionState::new(&self.options);
    }

    /// Returns allocation and recycling counters for debugging.
    ///
    /// Only available in tests or with the `stats` feature.
    #[cfg(any(test, feature = "stats"))]
    pub fn debug_stats(&self) -> RegionStats {
        self.state.with(|state| RegionStats {
            space_used: state.space_used,
            space_allocated: state.space_allocated,
            chunks: state.chunks.len(),
            recycled_blocks: state.recycled_blocks,
            reused_blocks: state.reused_blocks,
            cached_bytes: state.cached_bytes,
        })
    }
}

/// Allocation and recycling counters of a [`Region`].
#[cfg(any(test, feature = "stats"))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionStats {
    /// Bytes handed out, including alignment padding.
    pub space_used: usize,
    /// Bytes obtained from the global allocator.
    pub space_allocated: usize,
    /// Number of chunks currently owned.
    pub chunks: usize,
    /// Blocks offered back through `recycle` and accepted.
    pub recycled_blocks: usize,
    /// Blocks handed out again by `try_reuse`.
    pub reused_blocks: usize,
    /// Bytes currently sitting on the free lists.
    pub cached_bytes: usize,
}

#[cfg(any(test, feature = "stats"))]
impl RegionStats {
    /// Pretty-print the region statistics.
    #[cfg(feature = "std")]
    pub fn print(&self) {
        println!("=== Region Statistics ===");
        println!(
            "Used: {} bytes of {} allocated in {} chunks ({:.2}% utilization)",
            self.space_used,
            self.space_allocated,
            self.chunks,
            if self.space_allocated == 0 {
                0.0
            } else {
                self.space_used as f64 / self.space_allocated as f64 * 100.0
            }
        );
        println!(
            "Recycling: {} blocks returned, {} reused, {} bytes cached",
            self.recycled_blocks, self.reused_blocks, self.cached_bytes
        );
    }
}
