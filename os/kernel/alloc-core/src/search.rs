//! Locating a host block for a requested adjusted size.
//!
//! Starting from the bin that would hold `asize`, scans upward through bins
//! until a fit is found. The first five (exact-size) bins return their head
//! immediately — every member is already the right size, no scan needed.
//! Later bins hold a range of sizes, so the whole bin is walked for the
//! tightest fit (minimum slack), continuing to the next bin only if nothing
//! in this one qualifies. If no bin has anything, the wilderness is offered
//! as a last resort, but only if it has enough slack left over after the
//! allocation to remain a legal (>= MINSIZE) free block.

use crate::bins;
use crate::block;
use crate::freelist;
use crate::heap::Heap;
use crate::provider::HeapProvider;

/// Result of a successful search: the chosen host's header address, and
/// whether that host was the wilderness.
pub(crate) type Fit = (usize, bool);

pub(crate) fn find_fit<P: HeapProvider>(heap: &mut Heap<P>, asize: usize) -> Option<Fit> {
    let start = bins::index_of(asize);

    for bin_idx in start..bins::NUM_BINS {
        let head_off = heap.bins[bin_idx];
        if head_off == 0 {
            continue;
        }
        let head_addr = heap.addr_of(head_off);

        if bin_idx < bins::EXACT_BINS {
            if block::size(head_addr) >= asize {
                freelist::remove(heap, bin_idx, head_addr);
                return Some((head_addr, false));
            }
            continue;
        }

        let mut best: Option<usize> = None;
        let mut best_slack = usize::MAX;
        let mut cur = head_addr;
        loop {
            let sz = block::size(cur);
            if sz >= asize {
                let slack = sz - asize;
                if slack < best_slack {
                    best_slack = slack;
                    best = Some(cur);
                    if slack == 0 {
                        break;
                    }
                }
            }
            let prev_off = block::prev_free(cur);
            if prev_off == 0 {
                break;
            }
            cur = heap.addr_of(prev_off);
        }

        if let Some(host) = best {
            freelist::remove(heap, bin_idx, host);
            return Some((host, false));
        }
    }

    if heap.wilderness != 0 {
        let w_addr = heap.addr_of(heap.wilderness);
        if block::size(w_addr) >= asize + block::MINSIZE {
            return Some((w_addr, true));
        }
    }

    None
}
