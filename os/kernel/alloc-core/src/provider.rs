//! The seam between the placement engine and whatever supplies it memory.
//!
//! A [`HeapProvider`] is this crate's analogue of `sbrk`: it owns a contiguous
//! region of address space and can be asked to extend it. Everything below this
//! trait — page tables, a bootloader memory map, a `Vec<u8>` arena in a test — is
//! out of scope for the engine itself.

use crate::error::ProviderError;

/// Supplies and grows the contiguous address range a [`crate::Heap`] manages.
///
/// Implementors need not support shrinking; the allocator never calls back to
/// release address space once it has been granted.
pub trait HeapProvider {
    /// The first valid address currently managed by the provider.
    ///
    /// This value must not change across the lifetime of the provider once
    /// [`HeapProvider::grow`] has been called at least once.
    fn lo(&self) -> usize;

    /// The last valid address currently managed by the provider (inclusive).
    ///
    /// Before the first successful [`HeapProvider::grow`] call this may be
    /// less than [`HeapProvider::lo`], signaling an empty region.
    fn hi(&self) -> usize;

    /// Extends the managed region by at least `n_bytes`, returning the address
    /// immediately following the previous [`HeapProvider::hi`].
    ///
    /// Implementations may round `n_bytes` up (to a page size, for instance) but
    /// must never grow by less than requested.
    fn grow(&mut self, n_bytes: usize) -> Result<usize, ProviderError>;
}
