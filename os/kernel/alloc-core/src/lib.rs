//! A segregated free-list dynamic memory allocator.
//!
//! ```text
//!                    ┌─────────────────────────────────────┐
//!                    │          Heap<P: HeapProvider>       │
//!                    │  segregated bins · wilderness tail   │
//!                    └───────────────┬───────────────────────┘
//!                                    │ grow(n) / lo() / hi()
//!                    ┌───────────────▼───────────────────────┐
//!                    │             HeapProvider               │
//!                    │  (out of scope: sbrk, arena, mmap...)  │
//!                    └─────────────────────────────────────────┘
//! ```
//!
//! [`Heap`] implements placement, splitting, and boundary-tag coalescing over
//! a byte range it never owns outright — it only ever asks its
//! [`HeapProvider`] to grow that range. Sixteen segregated bins index free
//! blocks by adjusted size; the five smallest are exact-size bins with O(1)
//! placement, the rest are best-fit-scanned ranges. The single free block
//! beyond the last real block (the "wilderness") is never bin-resident and
//! absorbs every heap growth.
//!
//! [`LockedHeap`] wraps a [`Heap`] in a [`kernel_sync::SpinLock`] so it can be
//! declared `#[global_allocator]`; the lock only serializes entry, it adds no
//! per-core or lock-free fast path of its own.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod bins;
mod block;
mod check;
mod coalesce;
mod error;
mod freelist;
mod global;
mod heap;
mod place;
mod provider;
mod raw;
mod search;

pub use error::{HeapInitError, ProviderError};
pub use global::LockedHeap;
pub use heap::Heap;
pub use provider::HeapProvider;

#[cfg(any(test, doctest))]
pub mod test_support {
    //! A host-mode [`HeapProvider`] backed by a growable `Vec<u8>`, used by
    //! this crate's own unit and integration tests in place of a real
    //! address-space source.

    use crate::error::ProviderError;
    use crate::provider::HeapProvider;

    pub struct VecProvider {
        storage: std::vec::Vec<u8>,
        base: usize,
        used: usize,
    }

    impl VecProvider {
        pub fn new(capacity: usize) -> Self {
            let mut storage = std::vec::Vec::with_capacity(capacity);
            storage.resize(capacity, 0);
            let base = storage.as_mut_ptr() as usize;
            Self { storage, base, used: 0 }
        }
    }

    impl HeapProvider for VecProvider {
        fn lo(&self) -> usize {
            self.base
        }

        fn hi(&self) -> usize {
            self.base + self.used.saturating_sub(1)
        }

        fn grow(&mut self, n_bytes: usize) -> Result<usize, ProviderError> {
            if self.used + n_bytes > self.storage.len() {
                return Err(ProviderError::Exhausted);
            }
            let addr = self.base + self.used;
            self.used += n_bytes;
            Ok(addr)
        }
    }
}
