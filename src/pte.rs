// SPDX-License-Identifier: MIT OR Apache-2.0

//! Page-table entry codec. Pure bit-level encode/decode of a 32-bit
//! entry; carries no behavior of its own (the paging engine in
//! [`crate::paging`] is where the state machine lives).

use bitflags::bitflags;

use crate::config::PAGING_ADDR_FPN_HIBIT;

bitflags! {
    /// The two tag bits of a PTE. `PRESENT` and `SWAPPED` are mutually
    /// exclusive; an all-zero entry (neither flag set) is *unmapped*.
    struct Flags: u32 {
        const PRESENT = 1 << 31;
        const SWAPPED = 1 << 30;
    }
}

/// Width, in bits, of the frame-number field shared by the present and
/// swapped encodings (bits `0..PAGING_ADDR_FPN_HIBIT`).
const FPN_BITS: u32 = PAGING_ADDR_FPN_HIBIT;
const FPN_MASK: u32 = (1 << FPN_BITS) - 1;

/// Width of the swap-device-id field, packed directly above the frame
/// number and below the two tag bits (bits `FPN_BITS..30`).
const SWAP_DEV_BITS: u32 = 30 - FPN_BITS;
const SWAP_DEV_MASK: u32 = (1 << SWAP_DEV_BITS) - 1;

/// A raw 32-bit page-table entry. Thin newtype so `Pte` and a bare `u32`
/// virtual address are never confused at a call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pte(pub u32);

/// The decoded meaning of a [`Pte`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PteState {
    /// No virtual page has ever been mapped to this page number.
    Unmapped,
    /// The page is resident in RAM at frame `fpn`.
    Present { fpn: u32 },
    /// The page has been swapped out to device `device` at swap frame `fpn`.
    Swapped { device: u32, fpn: u32 },
}

impl Pte {
    pub const fn unmapped() -> Self {
        Pte(0)
    }

    pub fn present(fpn: u32) -> Self {
        debug_assert!(fpn <= FPN_MASK, "frame number {} exceeds {} bits", fpn, FPN_BITS);
        Pte(Flags::PRESENT.bits() | (fpn & FPN_MASK))
    }

    pub fn swapped(device: u32, fpn: u32) -> Self {
        debug_assert!(fpn <= FPN_MASK, "swap frame number {} exceeds {} bits", fpn, FPN_BITS);
        debug_assert!(device <= SWAP_DEV_MASK, "swap device id {} exceeds {} bits", device, SWAP_DEV_BITS);
        Pte(Flags::SWAPPED.bits() | ((device & SWAP_DEV_MASK) << FPN_BITS) | (fpn & FPN_MASK))
    }

    pub fn decode(self) -> PteState {
        let flags = Flags::from_bits_truncate(self.0);
        if flags.contains(Flags::PRESENT) {
            PteState::Present { fpn: self.0 & FPN_MASK }
        } else if flags.contains(Flags::SWAPPED) {
            PteState::Swapped {
                device: (self.0 >> FPN_BITS) & SWAP_DEV_MASK,
                fpn: self.0 & FPN_MASK,
            }
        } else {
            PteState::Unmapped
        }
    }

    pub fn is_present(self) -> bool {
        matches!(self.decode(), PteState::Present { .. })
    }

    pub fn is_swapped(self) -> bool {
        matches!(self.decode(), PteState::Swapped { .. })
    }

    pub fn is_unmapped(self) -> bool {
        matches!(self.decode(), PteState::Unmapped)
    }
}
