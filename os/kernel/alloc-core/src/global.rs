//! A [`core::alloc::GlobalAlloc`] adapter over a locked [`Heap`].
//!
//! The lock only serializes entry into the engine; it introduces no
//! concurrency-aware algorithm of its own (no per-core bins, no lock-free
//! fast path). That tradeoff is deliberate: multi-threaded scalability is out
//! of scope here, and a single spinlock is the simplest thing that makes a
//! single-threaded placement engine safe to declare `#[global_allocator]`.

use crate::heap::Heap;
use crate::provider::HeapProvider;
use core::alloc::{GlobalAlloc, Layout};
use kernel_sync::SpinLock;

/// Wraps a [`Heap<P>`] behind a spinlock so it can back `#[global_allocator]`.
pub struct LockedHeap<P: HeapProvider>(SpinLock<Heap<P>>);

impl<P: HeapProvider> LockedHeap<P> {
    /// Wraps an uninitialized heap. Call [`LockedHeap::init`] before the
    /// first allocation reaches it.
    pub const fn new(provider: P) -> Self {
        Self(SpinLock::new(Heap::new(provider)))
    }

    /// Initializes the underlying heap. Must be called exactly once, before
    /// any allocation is requested through this instance.
    ///
    /// # Errors
    /// Propagates [`crate::error::HeapInitError`] from [`Heap::initialize`].
    pub fn init(&self) -> Result<(), crate::error::HeapInitError> {
        self.0.with_lock(Heap::initialize)
    }
}

unsafe impl<P: HeapProvider> GlobalAlloc for LockedHeap<P> {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        self.0
            .with_lock(|heap| heap.allocate(layout.size()))
            .map_or(core::ptr::null_mut(), |p| p.as_ptr())
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
        self.0.with_lock(|heap| heap.release(core::ptr::NonNull::new(ptr)));
    }

    unsafe fn realloc(&self, ptr: *mut u8, _layout: Layout, new_size: usize) -> *mut u8 {
        self.0
            .with_lock(|heap| heap.reallocate(core::ptr::NonNull::new(ptr), new_size))
            .map_or(core::ptr::null_mut(), |p| p.as_ptr())
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        self.0
            .with_lock(|heap| heap.zeroed_allocate(1, layout.size()))
            .map_or(core::ptr::null_mut(), |p| p.as_ptr())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::VecProvider;

    #[test]
    fn global_alloc_roundtrip() {
        let heap = LockedHeap::new(VecProvider::new(1 << 16));
        heap.init().unwrap();
        let layout = Layout::from_size_align(64, 8).unwrap();
        unsafe {
            let ptr = heap.alloc(layout);
            assert!(!ptr.is_null());
            core::ptr::write_bytes(ptr, 0x7a, 64);
            heap.dealloc(ptr, layout);
        }
    }
}
