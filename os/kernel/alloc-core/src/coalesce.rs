//! Boundary-tag coalescing.
//!
//! Called with the header of a block that was just marked free. Merges it
//! with a free successor and/or a free predecessor, unlinking either from its
//! bin first (unless that neighbor is the wilderness, which is never in a
//! bin). Returns the header of the resulting (possibly larger) free block.
//!
//! The wilderness is never removed from a bin here because it was never
//! inserted into one; the caller ([`crate::heap::Heap::release`]) is
//! responsible for deciding whether the merged result becomes the new
//! wilderness (its end touches the epilogue) or needs inserting into a bin.

use crate::block;
use crate::freelist;
use crate::heap::Heap;
use crate::provider::HeapProvider;

pub(crate) fn coalesce<P: HeapProvider>(heap: &mut Heap<P>, freed: usize) -> usize {
    let mut result = freed;

    let next = block::next_block(result);
    if next < heap.heap_end && !block::is_alloc(next) {
        let next_off = heap.offset_of(next);
        if next_off != heap.wilderness {
            let idx = crate::bins::index_of(block::size(next));
            freelist::remove(heap, idx, next);
        }
        let merged_size = block::size(result) + block::size(next);
        let large = merged_size >= block::LARGE_THRESHOLD;
        let palloc = block::is_prev_alloc(result);
        block::write_header(result, merged_size, large, palloc, false);
        block::write_footer(result, merged_size, large, palloc, false);
    }

    if !block::is_prev_alloc(result) {
        let prev = block::prev_block(result);
        let prev_off = heap.offset_of(prev);
        if prev_off != heap.wilderness {
            let idx = crate::bins::index_of(block::size(prev));
            freelist::remove(heap, idx, prev);
        }
        let merged_size = block::size(prev) + block::size(result);
        let large = merged_size >= block::LARGE_THRESHOLD;
        let palloc = block::is_prev_alloc(prev);
        block::write_header(prev, merged_size, large, palloc, false);
        block::write_footer(prev, merged_size, large, palloc, false);
        result = prev;
    }

    let after = block::next_block(result);
    if after < heap.heap_end {
        block::set_prev_alloc(after, false);
    }

    result
}

#[cfg(test)]
mod tests {
    use crate::heap::Heap;
    use crate::test_support::VecProvider;

    #[test]
    fn freeing_adjacent_blocks_merges_them() {
        let mut heap = Heap::new(VecProvider::new(1 << 16));
        heap.initialize().unwrap();
        let a = heap.allocate(64).unwrap();
        let b = heap.allocate(64).unwrap();
        let c = heap.allocate(64).unwrap();
        let before = heap.wilderness_size();
        heap.release(Some(a));
        heap.release(Some(b));
        heap.release(Some(c));
        // Three adjacent frees immediately below the wilderness should all
        // coalesce back into it rather than sitting in bins.
        assert!(heap.wilderness_size() > before);
    }
}
