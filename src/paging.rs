// SPDX-License-Identifier: MIT OR Apache-2.0

//! The paging engine: page-fault handling, victim selection,
//! byte-granular read/write, and process teardown, plus the four
//! externally-consumed entry points (`pgalloc`, `pgfree_data`, `pgread`,
//! `pgwrite`) that convert the crate's typed [`PagingError`] into the
//! legacy `i32` status word expected outside this crate.
//!
//! Grounded on `original_source/submit/src/mm-vm.c` (`pg_getpage`,
//! `find_victim_page`, `pg_getval`/`pg_setval`, `__read`/`__write`,
//! `pgread`/`pgwrite`, `free_pcb_memph`), with three source bugs corrected:
//! the returned frame number is always recomputed from the *new* PTE after
//! a swap-in, victim search walks a structurally-enforced FIFO order, and
//! `free_pcb_memph` returns a present page's frame to RAM and a swapped
//! page's frame to its swap device, not the reverse.

use crate::config::{self, PAGING_MAX_PGN};
use crate::error::PagingError;
use crate::memphy::{Memphy, PageNumber};
use crate::pcb::Pid;
use crate::pte::{Pte, PteState};
use crate::system::{System, VmState};
use crate::{klog_info, klog_trace};

impl System {
    /// `pgalloc` / `__alloc`. Tries the VMA's free-region list first; on a
    /// miss, grows the VMA and maps fresh RAM (spilling to the process's
    /// active swap device if RAM is exhausted) for the new pages, then
    /// records the result in symbol slot `rgid`.
    pub fn alloc(&self, pid: Pid, vmaid: u32, rgid: usize, size: u32) -> Result<(u32, u32), PagingError> {
        if size == 0 {
            return Err(PagingError::InvalidSize);
        }
        let mut guard = self.vm.lock().unwrap();
        let vm = &mut *guard;
        let pcb_idx = vm.index_of(pid).ok_or(PagingError::InvalidVMA)?;

        let aligned = config::page_align(size);
        if let Some((start, end)) = vm.processes[pcb_idx].mm.get_free_vmrg_area(vmaid, aligned) {
            vm.processes[pcb_idx].mm.set_symrg(rgid, start, end)?;
            return Ok((start, end));
        }

        let (old_sbrk, new_sbrk, npage) = vm.processes[pcb_idx].mm.inc_vma_limit(vmaid, aligned)?;
        let base_pgn = old_sbrk / config::PAGING_PAGESZ;
        for i in 0..npage {
            let pgn = base_pgn + i;
            if let Ok(fpn) = vm.ram.get_freefp() {
                vm.ram.note_used(fpn, pid, pgn);
                vm.processes[pcb_idx].mm.set_pte(pgn, Pte::present(fpn));
                vm.processes[pcb_idx].mm.enlist_fifo_pgn(pgn);
            } else {
                let device = vm.processes[pcb_idx].active_swap;
                let swap_fpn = vm.swap[device].get_freefp().map_err(|_| PagingError::OutOfMemory)?;
                vm.swap[device].note_used(swap_fpn, pid, pgn);
                vm.processes[pcb_idx].mm.set_pte(pgn, Pte::swapped(device as u32, swap_fpn));
            }
        }
        vm.processes[pcb_idx].mm.set_symrg(rgid, old_sbrk, new_sbrk)?;
        Ok((old_sbrk, new_sbrk))
    }

    /// `pgfree_data` / `__free`. Only returns the region to the
    /// free-region list; the pages it covers stay mapped until a later
    /// allocation's victim search reclaims them.
    pub fn free_data(&self, pid: Pid, vmaid: u32, rgid: usize) -> Result<(), PagingError> {
        let mut guard = self.vm.lock().unwrap();
        let vm = &mut *guard;
        let pcb_idx = vm.index_of(pid).ok_or(PagingError::InvalidVMA)?;
        vm.processes[pcb_idx].mm.free(vmaid, rgid)
    }

    /// `pg_getpage`: guarantees `pgn` is present in RAM, swapping it in
    /// (evicting a victim if necessary) if it is not, and returns its RAM
    /// frame number.
    fn ensure_present(vm: &mut VmState, pid: Pid, pgn: PageNumber) -> Result<u32, PagingError> {
        let pcb_idx = vm.index_of(pid).ok_or(PagingError::InvalidVMA)?;
        match vm.processes[pcb_idx].mm.pte(pgn).decode() {
            PteState::Present { fpn } => Ok(fpn),
            PteState::Unmapped => Err(PagingError::AccessViolation),
            PteState::Swapped { device, fpn: swp_fpn } => {
                let new_fpn = match vm.ram.get_freefp() {
                    Ok(fpn) => fpn,
                    Err(_) => Self::evict_one(vm, pid)?,
                };
                Memphy::swap_copy_page(&vm.swap[device as usize], swp_fpn, &mut vm.ram, new_fpn)?;
                vm.swap[device as usize].put_freefp(swp_fpn);
                vm.ram.note_used(new_fpn, pid, pgn);
                let new_pte = Pte::present(new_fpn);
                vm.processes[pcb_idx].mm.set_pte(pgn, new_pte);
                // Recompute from `new_pte`, never reuse the stale
                // pre-swap `fpn` captured above.
                match new_pte.decode() {
                    PteState::Present { fpn } => Ok(fpn),
                    _ => unreachable!("just constructed as Present"),
                }
            }
        }
    }

    /// `find_victim_page`: first tries every VMA of the faulting process
    /// for a page that is present despite its virtual range having been
    /// freed (the liveness optimization), then falls back to the
    /// system-wide FIFO tail of RAM's used-frame list.
    fn evict_one(vm: &mut VmState, faulting: Pid) -> Result<u32, PagingError> {
        if let Some(pcb_idx) = vm.index_of(faulting) {
            let vma_ids = vm.processes[pcb_idx].mm.vma_ids();
            for vmaid in vma_ids {
                if let Some((_, victim_pgn)) = vm.processes[pcb_idx].mm.find_online_page_in_free_regions(vmaid) {
                    if let PteState::Present { fpn } = vm.processes[pcb_idx].mm.pte(victim_pgn).decode() {
                        Self::swap_out_victim(vm, faulting, victim_pgn, fpn)?;
                        return Ok(fpn);
                    }
                }
            }
        }
        let used = vm.ram.take_oldest_used().ok_or(PagingError::NoVictim)?;
        Self::swap_out_victim(vm, used.owner, used.pte_id, used.fpn)?;
        Ok(used.fpn)
    }

    /// Writes `fpn`'s contents out to `owner`'s active swap device and
    /// marks `owner`'s `pgn` swapped. Tolerates `fpn` already being absent
    /// from RAM's used-frame list (the FIFO-fallback caller already
    /// removed it via `take_oldest_used`).
    fn swap_out_victim(vm: &mut VmState, owner: Pid, pgn: PageNumber, fpn: u32) -> Result<(), PagingError> {
        let owner_idx = vm.index_of(owner).ok_or(PagingError::InvalidVMA)?;
        let device = vm.processes[owner_idx].active_swap;
        let swap_fpn = vm.swap[device].get_freefp().map_err(|_| PagingError::OutOfSwap)?;
        Memphy::swap_copy_page(&vm.ram, fpn, &mut vm.swap[device], swap_fpn)?;
        vm.swap[device].note_used(swap_fpn, owner, pgn);
        vm.processes[owner_idx].mm.set_pte(pgn, Pte::swapped(device as u32, swap_fpn));
        vm.ram.take_used_by_fpn(fpn);
        Ok(())
    }

    /// `pg_getval` / `__read`: reads one byte at virtual address `addr`
    /// in `pid`'s address space.
    pub fn read_byte(&self, pid: Pid, addr: u32) -> Result<u8, PagingError> {
        let mut guard = self.vm.lock().unwrap();
        let vm = &mut *guard;
        let (pgn, off) = config::translate(addr);
        let fpn = Self::ensure_present(vm, pid, pgn)?;
        let value = vm.ram.read(Memphy::frame_base(fpn) + off as usize)?;
        if self.tracer.iodump_enabled() {
            klog_trace!(self.tracer, "read pid={} addr={:#x} value={:#x}", pid, addr, value);
        }
        if self.tracer.dump_memphy_enabled() {
            klog_trace!(self.tracer, "{}", vm.ram.dump());
        }
        Ok(value)
    }

    /// `pg_setval` / `__write`: writes one byte at virtual address `addr`
    /// in `pid`'s address space.
    pub fn write_byte(&self, pid: Pid, addr: u32, value: u8) -> Result<(), PagingError> {
        let mut guard = self.vm.lock().unwrap();
        let vm = &mut *guard;
        let (pgn, off) = config::translate(addr);
        let fpn = Self::ensure_present(vm, pid, pgn)?;
        vm.ram.write(Memphy::frame_base(fpn) + off as usize, value)?;
        if self.tracer.iodump_enabled() {
            klog_trace!(self.tracer, "write pid={} addr={:#x} value={:#x}", pid, addr, value);
        }
        if self.tracer.dump_memphy_enabled() {
            klog_trace!(self.tracer, "{}", vm.ram.dump());
        }
        Ok(())
    }

    /// `free_pcb_memph`, corrected sense: every present page's frame
    /// returns to RAM, every swapped page's frame returns to its swap
    /// device, and the whole page directory is reset to unmapped.
    pub fn free_pcb_memph(&self, pid: Pid) -> Result<(), PagingError> {
        let mut guard = self.vm.lock().unwrap();
        let vm = &mut *guard;
        let pcb_idx = vm.index_of(pid).ok_or(PagingError::InvalidVMA)?;
        for pgn in 0..PAGING_MAX_PGN as u32 {
            match vm.processes[pcb_idx].mm.pte(pgn).decode() {
                PteState::Present { fpn } => {
                    vm.ram.take_used_by_fpn(fpn);
                    vm.ram.put_freefp(fpn);
                }
                PteState::Swapped { device, fpn } => {
                    vm.swap[device as usize].take_used_by_fpn(fpn);
                    vm.swap[device as usize].put_freefp(fpn);
                }
                PteState::Unmapped => continue,
            }
            vm.processes[pcb_idx].mm.set_pte(pgn, Pte::unmapped());
        }
        klog_info!("pid {} torn down, frames reclaimed", pid);
        Ok(())
    }

    /// External entry point: allocates into symbol slot `rgid` of VMA 0,
    /// returning a legacy status word.
    pub fn pgalloc(&self, pid: Pid, rgid: usize, size: u32) -> i32 {
        crate::error::status_word(self.alloc(pid, 0, rgid, size).map(|_| ()))
    }

    /// External entry point: frees symbol slot `rgid` of VMA 0.
    pub fn pgfree_data(&self, pid: Pid, rgid: usize) -> i32 {
        crate::error::status_word(self.free_data(pid, 0, rgid))
    }

    /// External entry point: reads one byte, writing it through
    /// `destination` on success.
    pub fn pgread(&self, pid: Pid, addr: u32, destination: &mut u8) -> i32 {
        match self.read_byte(pid, addr) {
            Ok(value) => {
                *destination = value;
                0
            }
            Err(_) => -1,
        }
    }

    /// External entry point: writes one byte.
    pub fn pgwrite(&self, pid: Pid, addr: u32, value: u8) -> i32 {
        crate::error::status_word(self.write_byte(pid, addr, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SchedulerMode, PAGING_PAGESZ};
    use crate::pcb::Priority;
    use crate::trace::Tracer;

    fn system(ram_frames: u32, swap_frames: u32) -> System {
        System::new(ram_frames, swap_frames, 1, SchedulerMode::Mlq, Tracer::silent())
    }

    #[test]
    fn alloc_then_write_then_read_round_trips() {
        let sys = system(4, 4);
        sys.spawn(Pid(1), Priority::new(0).unwrap(), 0);
        let (start, _) = sys.alloc(Pid(1), 0, 0, 10).unwrap();
        sys.write_byte(Pid(1), start, 0x7a).unwrap();
        assert_eq!(sys.read_byte(Pid(1), start), Ok(0x7a));
    }

    #[test]
    fn alloc_spills_to_swap_when_ram_is_exhausted() {
        let sys = system(1, 2);
        sys.spawn(Pid(1), Priority::new(0).unwrap(), 0);
        let (start, _) = sys.alloc(Pid(1), 0, 0, PAGING_PAGESZ).unwrap();
        let (second, _) = sys.alloc(Pid(1), 0, 1, PAGING_PAGESZ).unwrap();
        assert_ne!(start, second);
        sys.write_byte(Pid(1), second, 0xcc).unwrap();
        assert_eq!(sys.read_byte(Pid(1), second), Ok(0xcc));
    }

    #[test]
    fn read_of_unmapped_address_is_an_access_violation() {
        let sys = system(4, 4);
        sys.spawn(Pid(1), Priority::new(0).unwrap(), 0);
        assert_eq!(sys.read_byte(Pid(1), 0), Err(PagingError::AccessViolation));
    }

    #[test]
    fn victim_search_prefers_a_freed_but_still_resident_page() {
        // ram=2 frames (both end up occupied and present), swap=3 frames
        // (room for a still-live page plus the evicted one).
        let sys = system(2, 3);
        sys.spawn(Pid(1), Priority::new(0).unwrap(), 0);
        let (a_start, _) = sys.alloc(Pid(1), 0, 0, PAGING_PAGESZ).unwrap();
        sys.write_byte(Pid(1), a_start, 0x11).unwrap();
        sys.alloc(Pid(1), 0, 1, PAGING_PAGESZ).unwrap();
        sys.pgfree_data(Pid(1), 0);
        assert_eq!(sys.ram_free_frames(), 0);

        // Two pages, too large to fit in A's single-page freed range, so
        // this forces a VMA growth that spills straight to swap (RAM is
        // full). Both pages of C start out Swapped.
        let (c_start, _) = sys.alloc(Pid(1), 0, 2, PAGING_PAGESZ * 2).unwrap();

        // Writing to C faults it in. RAM is still full, so eviction must
        // reclaim A's freed-but-resident frame instead of failing.
        sys.write_byte(Pid(1), c_start, 0x33).unwrap();
        assert_eq!(sys.read_byte(Pid(1), c_start), Ok(0x33));
    }

    #[test]
    fn free_pcb_memph_returns_every_frame() {
        let sys = system(2, 2);
        sys.spawn(Pid(1), Priority::new(0).unwrap(), 0);
        sys.alloc(Pid(1), 0, 0, PAGING_PAGESZ).unwrap();
        sys.alloc(Pid(1), 0, 1, PAGING_PAGESZ).unwrap();
        assert_eq!(sys.ram_free_frames(), 0);
        sys.free_pcb_memph(Pid(1)).unwrap();
        assert_eq!(sys.ram_free_frames(), 2);
    }

    #[test]
    fn out_of_ram_and_swap_is_out_of_memory() {
        let sys = system(1, 1);
        sys.spawn(Pid(1), Priority::new(0).unwrap(), 0);
        sys.alloc(Pid(1), 0, 0, PAGING_PAGESZ).unwrap();
        sys.alloc(Pid(1), 0, 1, PAGING_PAGESZ).unwrap();
        assert_eq!(sys.alloc(Pid(1), 0, 2, PAGING_PAGESZ), Err(PagingError::OutOfMemory));
    }
}
