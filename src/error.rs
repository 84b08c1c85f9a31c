// SPDX-License-Identifier: MIT OR Apache-2.0

//! The core's error taxonomy. A plain hand-written enum, in the same style
//! as `xous_kernel::Error` as consumed throughout the teacher's `mem.rs`
//! (`Error::OutOfMemory`, `Error::BadAddress`, `Error::MemoryInUse`, ...)
//! rather than a `thiserror`-derived type.

use std::fmt;

/// Every failure mode the core can surface. Every variant here is a caller
/// bug, a resource-exhaustion condition, or a planned-overlap rejection;
/// none of them leave the mutated structure in a partially-updated state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagingError {
    /// `alloc` was asked for a zero or negative size.
    InvalidSize,
    /// A symbol-region id was out of range or referred to an unallocated slot.
    InvalidRegion,
    /// A VMA id did not resolve to an existing VMA.
    InvalidVMA,
    /// A read or write offset fell outside the allocated region.
    AccessViolation,
    /// A planned VMA growth would overlap another VMA.
    Overlap,
    /// A physical-frame store's free-frame list was empty.
    OutOfFrames,
    /// The active swap device's free-frame list was empty.
    OutOfSwap,
    /// `find_victim_page` could not locate any frame to evict.
    NoVictim,
    /// No RAM and no swap capacity remained to satisfy a request.
    OutOfMemory,
}

impl fmt::Display for PagingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            PagingError::InvalidSize => "invalid allocation size",
            PagingError::InvalidRegion => "invalid or unallocated symbol region",
            PagingError::InvalidVMA => "unknown VMA id",
            PagingError::AccessViolation => "access outside allocated region",
            PagingError::Overlap => "planned VMA growth overlaps another VMA",
            PagingError::OutOfFrames => "no free frames in physical store",
            PagingError::OutOfSwap => "no free frames in active swap device",
            PagingError::NoVictim => "no victim page available for eviction",
            PagingError::OutOfMemory => "out of memory",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for PagingError {}

/// Legacy status-word ABI expected by the (out-of-scope) CPU dispatch loop:
/// `0` on success, `-1` on any [`PagingError`]. Every externally-consumed
/// entry point (`pgalloc`, `pgfree_data`, `pgread`, `pgwrite`, ...) ends with
/// this conversion; internal code always propagates the typed `Result`.
pub fn status_word<T>(result: Result<T, PagingError>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(_) => -1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_word_maps_ok_and_err() {
        assert_eq!(status_word(Ok(())), 0);
        assert_eq!(status_word::<()>(Err(PagingError::OutOfMemory)), -1);
    }

    #[test]
    fn every_variant_has_a_display_message() {
        let variants = [
            PagingError::InvalidSize,
            PagingError::InvalidRegion,
            PagingError::InvalidVMA,
            PagingError::AccessViolation,
            PagingError::Overlap,
            PagingError::OutOfFrames,
            PagingError::OutOfSwap,
            PagingError::NoVictim,
            PagingError::OutOfMemory,
        ];
        for v in variants {
            assert!(!v.to_string().is_empty());
        }
    }
}
