use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use core::hash::BuildHasher;
use core::hash::Hash;

use crate::alloc_mode::AllocMode;
use crate::map::Map;

/// A value that can be constructed or copied into a given [`AllocMode`].
///
/// Maps use this trait whenever they create values on their own: default
/// values inserted by [`Map::get_or_insert_default`] and copies made by
/// [`Map::clone_in`] are built through it, so a value that itself allocates
/// ends up bound to the same region as the map holding it.
///
/// Plain values ignore the mode. A nested [`Map`] adopts it:
///
/// ```rust
/// use region_map::{AllocMode, Map, Region};
///
/// let region = Region::new();
/// let mut outer: Map<u32, Map<u32, u32>> = Map::new_in(&region);
/// let inner = outer.get_or_insert_default(7);
/// assert_eq!(inner.mode(), AllocMode::Region(&region));
/// ```
pub trait RegionValue<'r>: Sized {
    /// Creates the default value for a map allocating through `mode`.
    fn default_in(mode: AllocMode<'r>) -> Self;

    /// Copies `self` for a map allocating through `mode`.
    fn clone_in(&self, mode: AllocMode<'r>) -> Self;
}

macro_rules! impl_region_value_by_clone {
    ($($ty:ty),* $(,)?) => {
        $(
            impl<'r> RegionValue<'r> for $ty {
                #[inline]
                fn default_in(_: AllocMode<'r>) -> Self {
                    Default::default()
                }

                #[inline]
                fn clone_in(&self, _: AllocMode<'r>) -> Self {
                    self.clone()
                }
            }
        )*
    };
}

impl_region_value_by_clone!(
    (),
    bool,
    char,
    u8,
    u16,
    u32,
    u64,
    u128,
    usize,
    i8,
    i16,
    i32,
    i64,
    i128,
    isize,
    f32,
    f64,
    String,
);

impl<'r, T: Clone> RegionValue<'r> for Vec<T> {
    fn default_in(_: AllocMode<'r>) -> Self {
        Vec::new()
    }

    fn clone_in(&self, _: AllocMode<'r>) -> Self {
        self.clone()
    }
}

impl<'r, T: Clone> RegionValue<'r> for Option<T> {
    fn default_in(_: AllocMode<'r>) -> Self {
        None
    }

    fn clone_in(&self, _: AllocMode<'r>) -> Self {
        self.clone()
    }
}

impl<'r, T: RegionValue<'r>> RegionValue<'r> for Box<T> {
    fn default_in(mode: AllocMode<'r>) -> Self {
        Box::new(T::default_in(mode))
    }

    fn clone_in(&self, mode: AllocMode<'r>) -> Self {
        Box::new((**self).clone_in(mode))
    }
}

impl<'r, K, V, S> RegionValue<'r> for Map<'r, K, V, S>
where
    K: Hash + Eq + Clone,
    V: RegionValue<'r>,
    S: BuildHasher + Default + Clone,
{
    fn default_in(mode: AllocMode<'r>) -> Self {
        Map::with_hasher_in(S::default(), mode)
    }

    fn clone_in(&self, mode: AllocMode<'r>) -> Self {
        Map::clone_in(self, mode)
    }
}
