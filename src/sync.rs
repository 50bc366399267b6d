//! The lock guarding a region's chunk list and recycling pools.

cfg_if::cfg_if! {
    if #[cfg(feature = "std")] {
        use std::sync::Mutex;
        use std::sync::PoisonError;

        pub(crate) struct Lock<T> {
            inner: Mutex<T>,
        }

        impl<T> Lock<T> {
            pub(crate) const fn new(value: T) -> Self {
                Self { inner: Mutex::new(value) }
            }

            #[inline]
            pub(crate) fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
                // A panic while holding the lock leaves the pools in a
                // consistent state, so poisoning is ignored.
                let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
                f(&mut guard)
            }

            #[inline]
            pub(crate) fn get_mut(&mut self) -> &mut T {
                self.inner.get_mut().unwrap_or_else(PoisonError::into_inner)
            }
        }
    } else {
        use core::cell::UnsafeCell;
        use core::hint::spin_loop;
        use core::sync::atomic::AtomicBool;
        use core::sync::atomic::Ordering;

        /// Test-and-test-and-set spin lock for `no_std` builds.
        pub(crate) struct Lock<T> {
            locked: AtomicBool,
            value: UnsafeCell<T>,
        }

        // SAFETY: Access to `value` is serialized by `locked`.
        unsafe impl<T: Send> Sync for Lock<T> {}
        // SAFETY: The lock owns its value.
        unsafe impl<T: Send> Send for Lock<T> {}

        struct Release<'a>(&'a AtomicBool);

        impl Drop for Release<'_> {
            fn drop(&mut self) {
                self.0.store(false, Ordering::Release);
            }
        }

        impl<T> Lock<T> {
            pub(crate) const fn new(value: T) -> Self {
                Self {
                    locked: AtomicBool::new(false),
                    value: UnsafeCell::new(value),
                }
            }

            #[inline]
            pub(crate) fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
                while self
                    .locked
                    .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
                    .is_err()
                {
                    while self.locked.load(Ordering::Relaxed) {
                        spin_loop();
                    }
                }
                let _release = Release(&self.locked);
                // SAFETY: We hold the lock until `_release` is dropped.
                f(unsafe { &mut *self.value.get() })
            }

            #[inline]
            pub(crate) fn get_mut(&mut self) -> &mut T {
                self.value.get_mut()
            }
        }
    }
}
