// SPDX-License-Identifier: MIT OR Apache-2.0

//! Address-space manager. Owns the page directory, the VMA list, each
//! VMA's free-region list, and the symbol-region table.
//!
//! Grounded on `original_source/submit/include/os-mm.h`'s `mm_struct` /
//! `vm_area_struct` / `vm_rg_struct`, reimplemented with owned `Vec`s
//! instead of the source's hand-managed singly linked lists, and on the
//! teacher's convention (`kernel/src/processtable.rs`) of a plain struct
//! with `pub` fields read directly by sibling modules rather than hidden
//! behind getters for every field.

use std::collections::VecDeque;

use crate::config::{self, PAGING_MAX_PGN, PAGING_MAX_SYMTBL_SZ, PAGING_PAGESZ};
use crate::error::PagingError;
use crate::memphy::PageNumber;
use crate::pte::Pte;

/// `[rg_start, rg_end)` free byte range within one VMA's `[vm_start, sbrk)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeRegion {
    pub rg_start: u32,
    pub rg_end: u32,
}

/// One slot of the symbol-region table. `is_alloc = false` means the slot
/// is free and its range is the default `(0, 0)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SymRegion {
    pub rg_start: u32,
    pub rg_end: u32,
    pub is_alloc: bool,
}

/// A virtual memory area: a contiguous `[vm_start, vm_end)` slice of one
/// address space with its own break cursor and free-region list.
#[derive(Debug, Clone)]
pub struct Vma {
    pub vm_id: u32,
    pub vm_start: u32,
    pub vm_end: u32,
    pub sbrk: u32,
    pub free_regions: Vec<FreeRegion>,
}

/// One address space: page directory, VMAs, symbol table, and the
/// page-bring-in FIFO.
#[derive(Debug)]
pub struct Mm {
    pgd: Vec<Pte>,
    vmas: Vec<Vma>,
    symtbl: [SymRegion; PAGING_MAX_SYMTBL_SZ],
    fifo_pgn: VecDeque<PageNumber>,
}

impl Mm {
    /// A freshly created address space: one VMA (id 0) collapsed to a
    /// point (`vm_start = sbrk = vm_end = 0`), an all-unmapped page
    /// directory, and an empty symbol table.
    pub fn new() -> Self {
        Mm {
            pgd: vec![Pte::unmapped(); PAGING_MAX_PGN],
            vmas: vec![Vma { vm_id: 0, vm_start: 0, vm_end: 0, sbrk: 0, free_regions: Vec::new() }],
            symtbl: [SymRegion::default(); PAGING_MAX_SYMTBL_SZ],
            fifo_pgn: VecDeque::new(),
        }
    }

    pub fn vma(&self, vmaid: u32) -> Option<&Vma> {
        self.vmas.iter().find(|v| v.vm_id == vmaid)
    }

    pub fn vma_mut(&mut self, vmaid: u32) -> Option<&mut Vma> {
        self.vmas.iter_mut().find(|v| v.vm_id == vmaid)
    }

    pub fn vma_ids(&self) -> Vec<u32> {
        self.vmas.iter().map(|v| v.vm_id).collect()
    }

    /// Adds a new, non-overlapping VMA. Returns [`PagingError::Overlap`] if
    /// `[vm_start, vm_end)` collides with an existing one.
    pub fn add_vma(&mut self, vm_id: u32, vm_start: u32, vm_end: u32) -> Result<(), PagingError> {
        for v in &self.vmas {
            let overlap = (v.vm_start >= vm_start && v.vm_end <= vm_end)
                || (v.vm_start <= vm_start && v.vm_end >= vm_end)
                || (v.vm_start <= vm_start && vm_start < v.vm_end)
                || (v.vm_start < vm_end && vm_end <= v.vm_end);
            if overlap {
                return Err(PagingError::Overlap);
            }
        }
        self.vmas.push(Vma { vm_id, vm_start, vm_end, sbrk: vm_start, free_regions: Vec::new() });
        Ok(())
    }

    pub fn pte(&self, pgn: PageNumber) -> Pte {
        self.pgd[pgn as usize]
    }

    pub fn set_pte(&mut self, pgn: PageNumber, pte: Pte) {
        self.pgd[pgn as usize] = pte;
    }

    /// Records `pgn` as freshly brought into RAM, enlisted at the tail of
    /// the owning process's bring-in FIFO.
    pub fn enlist_fifo_pgn(&mut self, pgn: PageNumber) {
        self.fifo_pgn.push_back(pgn);
    }

    pub fn fifo_pgn(&self) -> impl Iterator<Item = &PageNumber> {
        self.fifo_pgn.iter()
    }

    /// Looks up a symbol-region slot. The source rejects with
    /// `rgid > PAGING_MAX_SYMTBL_SZ`, off by one; this crate rejects with
    /// `>=`.
    pub fn symrg(&self, rgid: usize) -> Result<&SymRegion, PagingError> {
        if rgid >= PAGING_MAX_SYMTBL_SZ {
            return Err(PagingError::InvalidRegion);
        }
        Ok(&self.symtbl[rgid])
    }

    fn symrg_mut(&mut self, rgid: usize) -> Result<&mut SymRegion, PagingError> {
        if rgid >= PAGING_MAX_SYMTBL_SZ {
            return Err(PagingError::InvalidRegion);
        }
        Ok(&mut self.symtbl[rgid])
    }

    /// Writes `(rg_start, rg_end, is_alloc = true)` into symbol slot `rgid`.
    pub fn set_symrg(&mut self, rgid: usize, rg_start: u32, rg_end: u32) -> Result<(), PagingError> {
        let slot = self.symrg_mut(rgid)?;
        slot.rg_start = rg_start;
        slot.rg_end = rg_end;
        slot.is_alloc = true;
        Ok(())
    }

    /// `free(pcb, vmaid, rgid)`: clears the symbol slot and prepends its
    /// range onto `vmaid`'s free-region list.
    pub fn free(&mut self, vmaid: u32, rgid: usize) -> Result<(), PagingError> {
        let (start, end) = {
            let slot = self.symrg(rgid)?;
            if !slot.is_alloc || slot.rg_start == slot.rg_end {
                return Err(PagingError::InvalidRegion);
            }
            (slot.rg_start, slot.rg_end)
        };
        let vma = self.vma_mut(vmaid).ok_or(PagingError::InvalidVMA)?;
        vma.free_regions.insert(0, FreeRegion { rg_start: start, rg_end: end });
        let slot = self.symrg_mut(rgid).unwrap();
        slot.rg_start = 0;
        slot.rg_end = 0;
        slot.is_alloc = false;
        Ok(())
    }

    /// First-fit scan of `vmaid`'s free-region list for `size` bytes
    /// (already page-aligned by the caller). On a hit, splits the chosen
    /// region (or drops it if fully consumed) and returns the carved range.
    /// Returns `None` on a clean miss -- this is not a [`PagingError`], the
    /// caller falls back to growing the VMA.
    pub fn get_free_vmrg_area(&mut self, vmaid: u32, aligned_size: u32) -> Option<(u32, u32)> {
        let vma = self.vma_mut(vmaid)?;
        let idx = vma.free_regions.iter().position(|r| r.rg_start + aligned_size <= r.rg_end)?;
        let region = vma.free_regions[idx];
        let new_start = region.rg_start;
        let new_end = region.rg_start + aligned_size;
        if new_end < region.rg_end {
            vma.free_regions[idx].rg_start = new_end;
        } else {
            vma.free_regions.remove(idx);
        }
        Some((new_start, new_end))
    }

    /// Liveness-optimised victim search (`find_victim_page`): scans
    /// `vmaid`'s free-region list for a page that is still *present*
    /// in the page directory despite its virtual range having been freed
    /// (possible because [`Mm::free`] never touches the page directory).
    /// On a hit, isolates that single page by splitting the region around
    /// it and returns `(page_addr, pgn)`; the caller is responsible for
    /// reclaiming the underlying frame.
    pub fn find_online_page_in_free_regions(&mut self, vmaid: u32) -> Option<(u32, PageNumber)> {
        let page = PAGING_PAGESZ;
        let region_count = self.vma(vmaid)?.free_regions.len();
        for idx in 0..region_count {
            let region = self.vma(vmaid)?.free_regions[idx];
            let mut pg_addr = region.rg_start;
            while pg_addr + page <= region.rg_end {
                let pgn = pg_addr / page;
                if self.pte(pgn).is_present() {
                    let left = FreeRegion { rg_start: region.rg_start, rg_end: pg_addr };
                    let right = FreeRegion { rg_start: pg_addr + page, rg_end: region.rg_end };
                    let mut replacement = Vec::new();
                    if left.rg_start < left.rg_end {
                        replacement.push(left);
                    }
                    if right.rg_start < right.rg_end {
                        replacement.push(right);
                    }
                    let vma = self.vma_mut(vmaid).unwrap();
                    vma.free_regions.splice(idx..idx + 1, replacement);
                    return Some((pg_addr, pgn));
                }
                pg_addr += page;
            }
        }
        None
    }

    /// `validate_overlap_vm_area(vmaid, start, end)`. Symmetric under
    /// swapping the target with any other VMA, since none of the four
    /// conditions distinguish which side is "target".
    pub fn validate_overlap_vm_area(&self, vmaid: u32, start: u32, end: u32) -> Result<(), PagingError> {
        if start > end {
            return Err(PagingError::Overlap);
        }
        for vma in &self.vmas {
            if vma.vm_id == vmaid {
                continue;
            }
            let (vs, ve) = (vma.vm_start, vma.vm_end);
            let overlap =
                (vs >= start && ve <= end) || (vs <= start && ve >= end) || (vs <= start && start < ve) || (vs < end && end <= ve);
            if overlap {
                return Err(PagingError::Overlap);
            }
        }
        Ok(())
    }

    /// `inc_vma_limit(vmaid, inc_sz)`, the VMA-bookkeeping half only:
    /// validates the candidate growth, then advances `vm_end`/`sbrk` by
    /// `inc_sz` exactly as given. The caller is responsible for rounding
    /// `inc_sz` up to a page multiple first if page-aligned growth is
    /// wanted. Returns `(old_sbrk, new_sbrk, npage)`; mapping `npage` fresh
    /// RAM pages is the caller's job (it requires the physical-frame
    /// store, which `Mm` does not hold -- see `System::alloc` in
    /// `paging.rs`).
    pub fn inc_vma_limit(&mut self, vmaid: u32, inc_sz: u32) -> Result<(u32, u32, u32), PagingError> {
        let aligned = config::page_align(inc_sz);
        let npage = aligned / PAGING_PAGESZ;
        let old_sbrk = self.vma(vmaid).ok_or(PagingError::InvalidVMA)?.sbrk;
        let candidate_end = old_sbrk + inc_sz;
        self.validate_overlap_vm_area(vmaid, old_sbrk, candidate_end)?;
        let vma = self.vma_mut(vmaid).unwrap();
        vma.vm_end += inc_sz;
        vma.sbrk += inc_sz;
        Ok((old_sbrk, old_sbrk + inc_sz, npage))
    }
}

impl Default for Mm {
    fn default() -> Self {
        Mm::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_mm_has_one_collapsed_vma() {
        let mm = Mm::new();
        let vma = mm.vma(0).unwrap();
        assert_eq!((vma.vm_start, vma.vm_end, vma.sbrk), (0, 0, 0));
    }

    #[test]
    fn symrg_rejects_at_the_boundary_with_ge_not_gt() {
        let mm = Mm::new();
        assert!(mm.symrg(PAGING_MAX_SYMTBL_SZ - 1).is_ok());
        assert_eq!(mm.symrg(PAGING_MAX_SYMTBL_SZ), Err(PagingError::InvalidRegion));
    }

    #[test]
    fn inc_vma_limit_advances_sbrk_and_vm_end() {
        let mut mm = Mm::new();
        let (old_sbrk, new_sbrk, npage) = mm.inc_vma_limit(0, 100).unwrap();
        assert_eq!(old_sbrk, 0);
        assert_eq!(new_sbrk, 100);
        assert_eq!(npage, 1);
        let vma = mm.vma(0).unwrap();
        assert_eq!(vma.sbrk, 100);
        assert_eq!(vma.vm_end, 100);
    }

    #[test]
    fn inc_vma_limit_rejects_overlap_with_sibling_vma() {
        let mut mm = Mm::new();
        mm.add_vma(1, 512, 2048).unwrap();
        mm.vma_mut(0).unwrap().vm_end = 1024;
        mm.vma_mut(0).unwrap().sbrk = 1024;
        let before = mm.vma(0).unwrap().clone_for_test();
        assert_eq!(mm.inc_vma_limit(0, 600), Err(PagingError::Overlap));
        assert_eq!(mm.vma(0).unwrap().clone_for_test(), before);
    }

    #[test]
    fn free_then_realloc_reuses_region_and_empties_free_list() {
        let mut mm = Mm::new();
        let (_, _, _) = mm.inc_vma_limit(0, 100).unwrap();
        mm.set_symrg(0, 0, 256).unwrap();
        mm.free(0, 0).unwrap();
        assert_eq!(mm.vma(0).unwrap().free_regions.len(), 1);
        let got = mm.get_free_vmrg_area(0, config::page_align(50)).unwrap();
        assert_eq!(got, (0, 256));
        assert!(mm.vma(0).unwrap().free_regions.is_empty());
    }

    #[test]
    fn get_free_vmrg_area_splits_partial_region() {
        let mut mm = Mm::new();
        mm.vma_mut(0).unwrap().free_regions.push(FreeRegion { rg_start: 0, rg_end: 512 });
        let got = mm.get_free_vmrg_area(0, 256).unwrap();
        assert_eq!(got, (0, 256));
        let remaining = mm.vma(0).unwrap().free_regions[0];
        assert_eq!((remaining.rg_start, remaining.rg_end), (256, 512));
    }

    #[test]
    fn validate_overlap_is_symmetric() {
        let mut mm = Mm::new();
        mm.add_vma(1, 512, 2048).unwrap();
        let a = mm.validate_overlap_vm_area(0, 0, 1024);
        let b = mm.validate_overlap_vm_area(1, 0, 1024);
        assert_eq!(a.is_err(), b.is_err());
    }

    #[test]
    fn find_online_page_in_free_regions_isolates_single_page() {
        let mut mm = Mm::new();
        mm.inc_vma_limit(0, PAGING_PAGESZ * 2).unwrap();
        mm.set_pte(0, Pte::present(5));
        mm.set_pte(1, Pte::present(6));
        mm.vma_mut(0).unwrap().free_regions.push(FreeRegion { rg_start: 0, rg_end: PAGING_PAGESZ * 2 });
        let (addr, pgn) = mm.find_online_page_in_free_regions(0).unwrap();
        assert_eq!(addr, 0);
        assert_eq!(pgn, 0);
        let regions = &mm.vma(0).unwrap().free_regions;
        assert_eq!(regions.len(), 1);
        assert_eq!((regions[0].rg_start, regions[0].rg_end), (PAGING_PAGESZ, PAGING_PAGESZ * 2));
    }

    impl Vma {
        fn clone_for_test(&self) -> (u32, u32, u32) {
            (self.vm_start, self.vm_end, self.sbrk)
        }
    }
}
