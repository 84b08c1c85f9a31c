// SPDX-License-Identifier: MIT OR Apache-2.0

//! Physical frame store. Both RAM and each swap device are instances of
//! this same type; the only difference is which handle a
//! [`crate::pcb::Pcb`] keeps around.
//!
//! Grounded on the free/used-frame bookkeeping in the teacher's
//! `kernel/src/mem.rs` (`MemoryManager`, `MemoryRangeExtra`) and
//! `kernel/src/swap.rs` (`SwapAlloc`), reimplemented as owned collections
//! instead of the source's hand-rolled linked lists.

use std::collections::VecDeque;

use crate::config::PAGING_PAGESZ;
use crate::error::PagingError;
use crate::pcb::Pid;

/// One page number within an owning address space, as recorded on a used
/// frame so it can be found again during victim selection or teardown.
pub type PageNumber = u32;

/// An entry in a store's used-frame list: `(fpn, owner, pte_id)`. `owner`
/// doubles as the "mapping pcb" field in the original `framephy_struct`
/// since this design keeps exactly one MM per PCB -- see DESIGN.md.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsedFrame {
    pub fpn: u32,
    pub owner: Pid,
    pub pte_id: PageNumber,
}

/// A byte-addressable frame store with a free/used-frame split. An instance
/// backs RAM; a separate instance backs each swap device.
#[derive(Debug, Clone)]
pub struct Memphy {
    storage: Vec<u8>,
    frame_count: u32,
    free_frames: Vec<u32>,
    /// Front = most recently brought in, back = oldest.
    used_frames: VecDeque<UsedFrame>,
}

impl Memphy {
    /// Creates a store of `frame_count` frames, all initially free.
    pub fn new(frame_count: u32) -> Self {
        let maxsz = (frame_count as usize) * (PAGING_PAGESZ as usize);
        Memphy {
            storage: vec![0u8; maxsz],
            frame_count,
            free_frames: (0..frame_count).rev().collect(),
            used_frames: VecDeque::new(),
        }
    }

    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    pub fn free_frame_count(&self) -> usize {
        self.free_frames.len()
    }

    pub fn maxsz(&self) -> usize {
        self.storage.len()
    }

    /// Pops one frame number off the free-frame list.
    pub fn get_freefp(&mut self) -> Result<u32, PagingError> {
        self.free_frames.pop().ok_or(PagingError::OutOfFrames)
    }

    /// Returns a frame to the free-frame list. The caller guarantees `fpn`
    /// is not currently tracked in either list.
    pub fn put_freefp(&mut self, fpn: u32) {
        debug_assert!(!self.used_frames.iter().any(|u| u.fpn == fpn));
        debug_assert!(!self.free_frames.contains(&fpn));
        self.free_frames.push(fpn);
    }

    /// Records a frame as holding live data for `(owner, pte_id)`. Inserted
    /// at the front: front is "newest" throughout this crate.
    pub fn note_used(&mut self, fpn: u32, owner: Pid, pte_id: PageNumber) {
        self.used_frames.push_front(UsedFrame { fpn, owner, pte_id });
    }

    /// Removes and returns the used-frame entry for `fpn`, if tracked.
    pub fn take_used_by_fpn(&mut self, fpn: u32) -> Option<UsedFrame> {
        let idx = self.used_frames.iter().position(|u| u.fpn == fpn)?;
        self.used_frames.remove(idx)
    }

    /// Removes and returns the oldest used-frame entry (the tail), for FIFO
    /// victim selection (`find_victim_page`).
    pub fn take_oldest_used(&mut self) -> Option<UsedFrame> {
        self.used_frames.pop_back()
    }

    pub fn used_frame(&self, fpn: u32) -> Option<&UsedFrame> {
        self.used_frames.iter().find(|u| u.fpn == fpn)
    }

    pub fn used_frames(&self) -> impl Iterator<Item = &UsedFrame> {
        self.used_frames.iter()
    }

    fn phys_offset(&self, phyaddr: usize) -> Result<usize, PagingError> {
        if phyaddr >= self.storage.len() {
            Err(PagingError::AccessViolation)
        } else {
            Ok(phyaddr)
        }
    }

    pub fn read(&self, phyaddr: usize) -> Result<u8, PagingError> {
        let off = self.phys_offset(phyaddr)?;
        Ok(self.storage[off])
    }

    pub fn write(&mut self, phyaddr: usize, value: u8) -> Result<(), PagingError> {
        let off = self.phys_offset(phyaddr)?;
        self.storage[off] = value;
        Ok(())
    }

    /// Byte offset of frame `fpn`'s first byte: `fpn << PAGING_ADDR_FPN_LOBIT`.
    pub fn frame_base(fpn: u32) -> usize {
        (fpn as usize) << crate::config::PAGING_ADDR_FPN_LOBIT
    }

    /// Copies one page's worth of bytes from frame `src_fpn` of `src` into
    /// frame `dst_fpn` of `dst`. `src` is logically unchanged; `dst`'s frame
    /// is fully overwritten.
    pub fn swap_copy_page(
        src: &Memphy,
        src_fpn: u32,
        dst: &mut Memphy,
        dst_fpn: u32,
    ) -> Result<(), PagingError> {
        let page = PAGING_PAGESZ as usize;
        let src_base = Memphy::frame_base(src_fpn);
        let dst_base = Memphy::frame_base(dst_fpn);
        if src_base + page > src.storage.len() || dst_base + page > dst.storage.len() {
            return Err(PagingError::AccessViolation);
        }
        dst.storage[dst_base..dst_base + page].copy_from_slice(&src.storage[src_base..src_base + page]);
        Ok(())
    }

    /// Human-readable dump of every live frame's contents, for the
    /// `MEMPHYS_DUMP` trace; gated by the caller via
    /// [`crate::trace::Tracer::dump_memphy_enabled`].
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for used in self.used_frames.iter() {
            let base = Memphy::frame_base(used.fpn);
            let page = PAGING_PAGESZ as usize;
            out.push_str(&format!(
                "frame {:04x} (owner pid={} pgn={}): {:02x?}\n",
                used.fpn,
                used.owner.0,
                used.pte_id,
                &self.storage[base..base + page]
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_store_has_all_frames_free() {
        let mut m = Memphy::new(4);
        for _ in 0..4 {
            m.get_freefp().unwrap();
        }
        assert_eq!(m.get_freefp(), Err(PagingError::OutOfFrames));
    }

    #[test]
    fn put_freefp_makes_frame_available_again() {
        let mut m = Memphy::new(1);
        let fpn = m.get_freefp().unwrap();
        assert_eq!(m.get_freefp(), Err(PagingError::OutOfFrames));
        m.put_freefp(fpn);
        assert_eq!(m.get_freefp(), Ok(fpn));
    }

    #[test]
    fn read_write_round_trips() {
        let mut m = Memphy::new(1);
        m.write(10, 0x42).unwrap();
        assert_eq!(m.read(10), Ok(0x42));
    }

    #[test]
    fn out_of_range_access_is_an_access_violation() {
        let m = Memphy::new(1);
        assert_eq!(m.read(PAGING_PAGESZ as usize), Err(PagingError::AccessViolation));
    }

    #[test]
    fn swap_copy_page_overwrites_destination_only() {
        let mut src = Memphy::new(1);
        let mut dst = Memphy::new(1);
        src.write(0, 0xAA).unwrap();
        dst.write(0, 0x00).unwrap();
        Memphy::swap_copy_page(&src, 0, &mut dst, 0).unwrap();
        assert_eq!(dst.read(0), Ok(0xAA));
        assert_eq!(src.read(0), Ok(0xAA));
    }

    #[test]
    fn used_frame_fifo_orientation_head_is_newest() {
        let mut m = Memphy::new(3);
        m.note_used(0, Pid(1), 0);
        m.note_used(1, Pid(1), 1);
        m.note_used(2, Pid(1), 2);
        assert_eq!(m.take_oldest_used().unwrap().fpn, 0);
        assert_eq!(m.take_oldest_used().unwrap().fpn, 1);
        assert_eq!(m.take_oldest_used().unwrap().fpn, 2);
        assert!(m.take_oldest_used().is_none());
    }

    #[test]
    fn take_used_by_fpn_removes_the_matching_entry_only() {
        let mut m = Memphy::new(3);
        m.note_used(0, Pid(1), 0);
        m.note_used(1, Pid(1), 1);
        let taken = m.take_used_by_fpn(0).unwrap();
        assert_eq!(taken.fpn, 0);
        assert!(m.used_frame(0).is_none());
        assert!(m.used_frame(1).is_some());
    }
}
