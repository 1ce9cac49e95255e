//! Whole-heap invariant checker.
//!
//! Walks every block from the first past the prologue to the epilogue,
//! verifying header/footer agreement (size, `LARGE`, and `PALLOC`), the
//! no-two-adjacent-free-blocks invariant, and `PALLOC` consistency with the
//! predecessor's real state, tallying free blocks as it goes. Then walks
//! every bin verifying each member is actually free and sits in the bin its
//! size maps to, tallying bin membership. Invariant 8 — every free block is
//! either bin-resident or the wilderness — is checked last by comparing the
//! two tallies: `free_count_on_heap_walk == Σ bin_counts + 1`. Callers gate
//! this behind `debug_assert!` — it is a full linear+bin walk and not
//! something steady-state allocation should pay for in release builds.

use crate::bins;
use crate::block;
use crate::heap::Heap;
use crate::provider::HeapProvider;

/// Runs every check; returns `true` iff the heap is internally consistent.
/// Logs the first violation found via [`log::error!`] before returning `false`.
pub(crate) fn check<P: HeapProvider>(heap: &Heap<P>) -> bool {
    let Some(free_count) = check_linear_walk(heap) else {
        return false;
    };
    let Some(bin_count) = check_bins(heap) else {
        return false;
    };
    if free_count != bin_count + 1 {
        log::error!(
            "free block count mismatch: heap walk counted {free_count} free blocks, bins hold {bin_count} plus the wilderness"
        );
        return false;
    }
    true
}

/// Walks the heap from the first real block to the epilogue. Returns the
/// number of free blocks encountered (including the wilderness), or `None`
/// on the first invariant violation.
fn check_linear_walk<P: HeapProvider>(heap: &Heap<P>) -> Option<usize> {
    let mut addr = heap.first_block();
    let mut prev_was_free = false;
    let mut free_count = 0usize;

    while addr < heap.heap_end {
        let size = block::size(addr);
        if size == 0 && addr + 2 != heap.heap_end {
            log::error!("zero-size block at {addr:#x} is not the epilogue");
            return None;
        }

        let large = block::is_large(addr);
        let alloc = block::is_alloc(addr);

        if block::has_footer(large, alloc) {
            let footer_addr = addr + size - 2;
            let footer_word = unsafe { crate::raw::read_u16(footer_addr) };
            let footer_large = footer_word & block::LARGE != 0;
            let footer_palloc = footer_word & block::PALLOC != 0;
            if footer_large != large
                || block::size(addr) != footer_size(footer_addr, footer_large)
                || footer_palloc != block::is_prev_alloc(addr)
            {
                log::error!("header/footer mismatch at {addr:#x}");
                return None;
            }
        }

        if !alloc && prev_was_free {
            log::error!("two adjacent free blocks at/before {addr:#x}: coalescing invariant violated");
            return None;
        }

        if block::is_prev_alloc(addr) == prev_was_free && addr != heap.first_block() {
            log::error!("PALLOC mismatch at {addr:#x}: recorded {}, actual predecessor free = {prev_was_free}", block::is_prev_alloc(addr));
            return None;
        }

        if !alloc {
            free_count += 1;
        }

        prev_was_free = !alloc;
        if size == 0 {
            break;
        }
        addr = block::next_block(addr);
    }

    Some(free_count)
}

fn footer_size(footer_addr: usize, large: bool) -> usize {
    if large {
        (unsafe { crate::raw::read_u32(footer_addr - 4) } & !0b111) as usize
    } else {
        (unsafe { crate::raw::read_u16(footer_addr) } & !0b111) as usize
    }
}

/// Walks every bin, verifying membership and link integrity. Returns the
/// total number of bin-resident free blocks, or `None` on the first
/// violation.
fn check_bins<P: HeapProvider>(heap: &Heap<P>) -> Option<usize> {
    let mut total = 0usize;
    for bin_idx in 0..bins::NUM_BINS {
        let mut off = heap.bins[bin_idx];
        let mut newer = 0u32;
        while off != 0 {
            let addr = heap.addr_of(off);
            if block::is_alloc(addr) {
                log::error!("bin {bin_idx} contains allocated block at {addr:#x}");
                return None;
            }
            if bins::index_of(block::size(addr)) != bin_idx {
                log::error!("block at {addr:#x} sits in bin {bin_idx} but maps to a different one");
                return None;
            }
            if block::next_free(addr) != newer {
                log::error!("broken next_free link at {addr:#x}");
                return None;
            }
            newer = off;
            off = block::prev_free(addr);
            total += 1;
        }
    }
    Some(total)
}

#[cfg(test)]
mod tests {
    use crate::heap::Heap;
    use crate::test_support::VecProvider;

    #[test]
    fn fresh_heap_has_one_free_block_and_no_bins() {
        let mut heap = Heap::new(VecProvider::new(1 << 16));
        heap.initialize().unwrap();
        assert!(heap.check(false));
        assert!(heap.bins.iter().all(|&off| off == 0));
    }

    #[test]
    fn check_passes_after_interleaved_alloc_and_free() {
        let mut heap = Heap::new(VecProvider::new(1 << 16));
        heap.initialize().unwrap();
        let a = heap.allocate(24).unwrap();
        let b = heap.allocate(32).unwrap();
        let c = heap.allocate(24).unwrap();
        heap.release(Some(b));
        assert!(heap.check(true));
        heap.release(Some(a));
        heap.release(Some(c));
        assert!(heap.check(true));
    }
}
