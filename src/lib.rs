#![warn(missing_docs)]
#![doc = include_str!("../README.md")]
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;
#[cfg(all(test, not(feature = "std")))]
extern crate std;

mod alloc_mode;
mod growth;
mod node;
mod sync;
mod table;
mod value;

/// A chained hash map bound to the heap or to a [`Region`].
///
/// This module provides [`Map`] together with its entry API and iterators.
pub mod map;

/// A chunked bump allocator with per-size-class block recycling, shared by
/// many maps.
pub mod region;

pub use alloc_mode::AllocMode;
pub use growth::threshold;
pub use map::Entry;
pub use map::Map;
pub use map::SizeType;
pub use region::Region;
pub use region::RegionOptions;
#[cfg(any(test, feature = "stats"))]
pub use region::RegionStats;
#[cfg(any(test, feature = "stats"))]
pub use table::ChainHistogram;
#[cfg(any(test, feature = "stats"))]
pub use table::DebugStats;
pub use value::RegionValue;

cfg_if::cfg_if! {
    if #[cfg(feature = "foldhash")] {
        /// Hasher builder used when a [`Map`] is created without one.
        pub type DefaultHashBuilder = foldhash::fast::RandomState;
    } else if #[cfg(feature = "std")] {
        /// Hasher builder used when a [`Map`] is created without one.
        pub type DefaultHashBuilder = std::hash::RandomState;
    } else {
        /// Placeholder hasher for builds with neither `foldhash` nor `std`.
        ///
        /// It cannot be constructed, so maps must be given a hasher with
        /// [`Map::with_hasher_in`] and friends.
        pub enum DefaultHashBuilder {}
    }
}
