//! Error types surfaced by the crate's public API.
//!
//! Steady-state allocation failure is not an error in the [`thiserror`] sense —
//! [`crate::Heap::allocate`] returns `None` on exhaustion, mirroring
//! [`core::alloc::GlobalAlloc`]'s null-pointer convention. `thiserror` is reserved
//! for conditions that prevent the allocator from reaching a usable state at all.

/// Failure to bring a [`crate::Heap`] into a usable state.
#[derive(Debug, thiserror::Error)]
pub enum HeapInitError {
    /// The backing [`crate::HeapProvider`] could not supply the initial chunk of
    /// memory the allocator needs to lay down its prologue, epilogue, and first
    /// wilderness block.
    #[error("heap provider could not supply the initial chunk of memory")]
    ProviderExhausted(#[from] ProviderError),

    /// [`crate::Heap::initialize`] was called on a heap that is already initialized.
    #[error("heap is already initialized")]
    AlreadyInitialized,
}

/// Failure reported by a [`crate::HeapProvider`] when asked to extend the heap.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The provider has no more memory to hand out.
    #[error("heap provider has no more memory to grow into")]
    Exhausted,
}
