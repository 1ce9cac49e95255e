//! Splitting a chosen host block to satisfy a request.
//!
//! Given a host block (from a bin, or the wilderness) and the adjusted size
//! the caller needs, either splits off a free remainder or consumes the host
//! whole. The host's own predecessor-allocated bit never changes here — only
//! its own `ALLOC` bit and, where relevant, its successor's `PALLOC` bit.

use crate::block;
use crate::freelist;
use crate::heap::Heap;
use crate::provider::HeapProvider;

/// Places an allocation of `asize` bytes into `host`, splitting off a free
/// remainder when it would be at least [`block::MINSIZE`] bytes. `was_wilderness`
/// tells us whether `host` was the wilderness (never in a bin, and always
/// updates `heap.wilderness` rather than a bin on split).
///
/// Returns the header address of the now-allocated block.
pub(crate) fn place<P: HeapProvider>(heap: &mut Heap<P>, host: usize, asize: usize, was_wilderness: bool) -> usize {
    let csize = block::size(host);
    let prev_alloc = block::is_prev_alloc(host);
    let remainder = csize - asize;

    if remainder >= block::MINSIZE {
        let large = asize >= block::LARGE_THRESHOLD;
        block::write_header(host, asize, large, prev_alloc, true);
        if block::has_footer(large, true) {
            block::write_footer(host, asize, large, prev_alloc, true);
        }

        let tail = host + asize;
        let tail_large = remainder >= block::LARGE_THRESHOLD;
        block::write_header(tail, remainder, tail_large, true, false);
        block::write_footer(tail, remainder, tail_large, true, false);

        let after_tail = block::next_block(tail);
        if after_tail < heap.heap_end {
            block::set_prev_alloc(after_tail, false);
        }

        if was_wilderness {
            heap.wilderness = heap.offset_of(tail);
        } else {
            let idx = crate::bins::index_of(remainder);
            freelist::insert(heap, idx, tail);
        }

        host
    } else {
        debug_assert!(!was_wilderness, "search must never hand out the wilderness without split room");
        let large = csize >= block::LARGE_THRESHOLD;
        block::write_header(host, csize, large, prev_alloc, true);
        if block::has_footer(large, true) {
            block::write_footer(host, csize, large, prev_alloc, true);
        }

        let after = block::next_block(host);
        if after < heap.heap_end {
            block::set_prev_alloc(after, true);
        }

        host
    }
}
