//! On-heap block encoding: header/footer words, flag bits, and neighbor
//! navigation.
//!
//! A block is identified throughout this crate by the address of its header —
//! never by a payload pointer. The two payload-facing conversions
//! ([`exposed_pointer`] / [`header_from_exposed`]) live at the edges of the
//! engine, in [`crate::heap`].
//!
//! Header word layout (bits 15..3 size, bit 2 `LARGE`, bit 1 `PALLOC`, bit 0
//! `ALLOC`): a small block's size occupies those same bits directly, since every
//! size is a multiple of 8 and the low 3 bits are reserved for flags. A header
//! whose size field reads as [`LARGE_SENTINEL`] (65528) means the size does not
//! fit in 13 bits; the true size is a 32-bit word immediately following.
//!
//! Large blocks extend the header by 4 bytes (the true size) and mirror the
//! header word 4 bytes further in. The mirror exists so that
//! [`crate::heap::Heap::release`] can always learn whether a block is large by
//! reading 2 bytes before the pointer the caller handed back, regardless of
//! whether that block was small or large.

use crate::raw;

pub(crate) const ALLOC: u16 = 0b001;
pub(crate) const PALLOC: u16 = 0b010;
pub(crate) const LARGE: u16 = 0b100;
const FLAG_MASK: u16 = 0b111;

/// Size field value that means "too big to represent here; see the extension word".
pub(crate) const LARGE_SENTINEL: u16 = 0xFFF8;

/// Smallest legal block size, large enough to hold a header, a footer, and a
/// free-list `prev_free`/`next_free` pair.
pub(crate) const MINSIZE: usize = 16;

/// Adjusted-size threshold at and above which a block is encoded as large.
pub(crate) const LARGE_THRESHOLD: usize = 65536;

const SMALL_HEADER_LEN: usize = 2;
const LARGE_HEADER_LEN: usize = 8; // 2-byte header + 4-byte extension + 2-byte mirror
const FOOTER_LEN: usize = 2;
const FOOTER_EXT_LEN: usize = 4;

/// Header length in bytes for a block encoded with (or without) the `LARGE` bit.
fn header_len(large: bool) -> usize {
    if large { LARGE_HEADER_LEN } else { SMALL_HEADER_LEN }
}

/// Reads the raw 2-byte header word at `header`.
pub(crate) fn header_word(header: usize) -> u16 {
    unsafe { raw::read_u16(header) }
}

pub(crate) fn is_large(header: usize) -> bool {
    header_word(header) & LARGE != 0
}

pub(crate) fn is_alloc(header: usize) -> bool {
    header_word(header) & ALLOC != 0
}

pub(crate) fn is_prev_alloc(header: usize) -> bool {
    header_word(header) & PALLOC != 0
}

/// Decodes a block's full size in bytes, following the extension word for
/// large blocks.
pub(crate) fn size(header: usize) -> usize {
    let word = header_word(header);
    if word & LARGE != 0 {
        (unsafe { raw::read_u32(header + 2) } & !0b111) as usize
    } else {
        (word & !FLAG_MASK) as usize
    }
}

/// Whether a block of this size/alloc combination carries a footer at all.
///
/// Allocated small blocks omit the footer outright; the bytes that would hold
/// one belong to the next block's header instead. Every other combination
/// (free, or large-and-allocated) carries one.
pub(crate) fn has_footer(large: bool, alloc: bool) -> bool {
    large || !alloc
}

/// Writes a block's header word (and, for large blocks, its extension and
/// mirror words). Does not touch the footer; see [`write_footer`].
pub(crate) fn write_header(header: usize, size: usize, large: bool, palloc: bool, alloc: bool) {
    let mut flags = 0u16;
    if alloc {
        flags |= ALLOC;
    }
    if palloc {
        flags |= PALLOC;
    }
    if large {
        flags |= LARGE;
        unsafe {
            raw::write_u16(header, LARGE_SENTINEL | flags);
            raw::write_u32(header + 2, size as u32);
            if alloc {
                raw::write_u16(header + 6, LARGE_SENTINEL | flags);
            }
        }
    } else {
        debug_assert_ne!(size as u16, LARGE_SENTINEL, "small size must never alias the large sentinel");
        unsafe { raw::write_u16(header, (size as u16) | flags) }
    }
}

/// Writes a block's footer, mirroring its header. Caller must have already
/// checked [`has_footer`].
pub(crate) fn write_footer(header: usize, size: usize, large: bool, palloc: bool, alloc: bool) {
    let mut flags = 0u16;
    if alloc {
        flags |= ALLOC;
    }
    if palloc {
        flags |= PALLOC;
    }
    if large {
        flags |= LARGE;
    }
    let footer = header + size - FOOTER_LEN;
    if large {
        let ext = footer - FOOTER_EXT_LEN;
        unsafe {
            raw::write_u32(ext, size as u32);
            raw::write_u16(footer, LARGE_SENTINEL | flags);
        }
    } else {
        unsafe { raw::write_u16(footer, (size as u16) | flags) }
    }
}

/// Flips a block's `PALLOC` bit in place, keeping its mirror word (if
/// allocated and large) and its footer (if it has one) in sync.
pub(crate) fn set_prev_alloc(header: usize, prev_alloc: bool) {
    let word = header_word(header);
    let new_word = if prev_alloc { word | PALLOC } else { word & !PALLOC };
    unsafe { raw::write_u16(header, new_word) };

    let large = word & LARGE != 0;
    let alloc = word & ALLOC != 0;
    if large && alloc {
        unsafe { raw::write_u16(header + 6, new_word) };
    }
    if has_footer(large, alloc) {
        let footer = header + size(header) - FOOTER_LEN;
        let footer_word = unsafe { raw::read_u16(footer) };
        let new_footer_word = if prev_alloc { footer_word | PALLOC } else { footer_word & !PALLOC };
        unsafe { raw::write_u16(footer, new_footer_word) };
    }
}

/// Address of the header immediately following this block.
pub(crate) fn next_block(header: usize) -> usize {
    header + size(header)
}

/// Address of the header immediately preceding this block.
///
/// Only valid to call when `is_prev_alloc(header)` is `false`: the predecessor
/// must be free (and therefore carry a footer we can read its size from).
pub(crate) fn prev_block(header: usize) -> usize {
    let footer = header - FOOTER_LEN;
    let word = unsafe { raw::read_u16(footer) };
    let prev_size = if word & LARGE != 0 {
        (unsafe { raw::read_u32(footer - FOOTER_EXT_LEN) } & !0b111) as usize
    } else {
        (word & !FLAG_MASK) as usize
    };
    header - prev_size
}

/// Address of the externally-exposed pointer handed back to callers of
/// `allocate`/`zeroed_allocate`.
pub(crate) fn exposed_pointer(header: usize, large: bool) -> usize {
    header + header_len(large)
}

/// Recovers a block's header address from a previously-exposed pointer.
pub(crate) fn header_from_exposed(ptr: usize, large: bool) -> usize {
    ptr - header_len(large)
}

/// Address of a free block's `prev_free` field (points toward older entries).
pub(crate) fn prev_free_addr(header: usize, large: bool) -> usize {
    header + if large { 6 } else { 2 }
}

/// Address of a free block's `next_free` field (points toward newer entries,
/// i.e. toward the bin head).
pub(crate) fn next_free_addr(header: usize, large: bool) -> usize {
    header + if large { 10 } else { 6 }
}

pub(crate) fn prev_free(header: usize) -> u32 {
    unsafe { raw::read_u32(prev_free_addr(header, is_large(header))) }
}

pub(crate) fn next_free(header: usize) -> u32 {
    unsafe { raw::read_u32(next_free_addr(header, is_large(header))) }
}

pub(crate) fn set_prev_free(header: usize, offset: u32) {
    unsafe { raw::write_u32(prev_free_addr(header, is_large(header)), offset) }
}

pub(crate) fn set_next_free(header: usize, offset: u32) {
    unsafe { raw::write_u32(next_free_addr(header, is_large(header)), offset) }
}

/// Writes a zero-size, permanently-allocated sentinel (the prologue or
/// epilogue). `with_footer` additionally writes the small footer mirror, used
/// for the prologue only: the epilogue has nothing to navigate backward from
/// it, so it never needs one.
pub(crate) fn write_sentinel(header: usize, palloc: bool, with_footer: bool) {
    write_header(header, 0, false, palloc, true);
    if with_footer {
        write_footer(header, 0, false, palloc, true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_header_roundtrip() {
        let mut buf = [0u8; 64];
        let addr = buf.as_mut_ptr() as usize;
        write_header(addr, 32, false, true, false);
        write_footer(addr, 32, false, true, false);
        assert_eq!(size(addr), 32);
        assert!(!is_large(addr));
        assert!(!is_alloc(addr));
        assert!(is_prev_alloc(addr));
    }

    #[test]
    fn large_header_roundtrip() {
        let mut buf = [0u8; 128];
        let addr = buf.as_mut_ptr() as usize;
        write_header(addr, 70000, true, false, true);
        assert_eq!(size(addr), 70000);
        assert!(is_large(addr));
        assert!(is_alloc(addr));
        assert!(!is_prev_alloc(addr));
        // mirror word at header+6 must match the real header for the
        // release() "peek 2 bytes before the pointer" trick to work.
        let exposed = exposed_pointer(addr, true);
        let probe = unsafe { raw::read_u16(exposed - 2) };
        assert_ne!(probe & LARGE, 0);
    }

    #[test]
    fn small_allocated_block_has_no_footer() {
        assert!(!has_footer(false, true));
        assert!(has_footer(false, false));
        assert!(has_footer(true, true));
        assert!(has_footer(true, false));
    }

    #[test]
    fn set_prev_alloc_updates_footer() {
        let mut buf = [0u8; 64];
        let addr = buf.as_mut_ptr() as usize;
        write_header(addr, 32, false, false, false);
        write_footer(addr, 32, false, false, false);
        set_prev_alloc(addr, true);
        assert!(is_prev_alloc(addr));
        let footer = addr + 32 - FOOTER_LEN;
        let word = unsafe { raw::read_u16(footer) };
        assert_ne!(word & PALLOC, 0);
    }
}
