// SPDX-License-Identifier: MIT OR Apache-2.0

//! The top-level simulator object: owns RAM, the swap devices, and the
//! process table, each reachable only through one of two explicit locks.
//! There is no hidden global state anywhere in this crate -- every piece
//! of mutable state lives on a `System` value the embedder constructs and
//! holds, the same way the teacher's `arch/hosted/process.rs` keeps its
//! process table behind a `thread_local` `Mutex` rather than a bare
//! `static mut`.

use std::sync::Mutex;

use crate::config::SchedulerMode;
use crate::memphy::Memphy;
use crate::pcb::{Pcb, Pid, Priority};
use crate::sched::Scheduler;
use crate::trace::Tracer;

/// Everything the paging engine touches, behind a single lock (`vm_lock`).
/// Grouped into one struct so `System::alloc` and friends can take
/// disjoint-field borrows of `ram`/`swap`/`processes` at once.
#[derive(Debug)]
pub(crate) struct VmState {
    pub(crate) ram: Memphy,
    pub(crate) swap: Vec<Memphy>,
    pub(crate) processes: Vec<Pcb>,
}

impl VmState {
    pub(crate) fn index_of(&self, pid: Pid) -> Option<usize> {
        self.processes.iter().position(|p| p.id == pid)
    }
}

/// The simulator. Construct one per simulated machine; every PCB it knows
/// about is registered through [`System::spawn`].
#[derive(Debug)]
pub struct System {
    pub(crate) vm: Mutex<VmState>,
    pub(crate) scheduler: Mutex<Scheduler>,
    pub(crate) tracer: Tracer,
}

impl System {
    /// `ram_frames` sizes the single RAM store; `swap_devices` stores of
    /// `swap_frames` frames each back up to [`crate::config::PAGING_MAX_MMSWP`]
    /// swap handles.
    pub fn new(ram_frames: u32, swap_frames: u32, swap_devices: usize, mode: SchedulerMode, tracer: Tracer) -> Self {
        System {
            vm: Mutex::new(VmState {
                ram: Memphy::new(ram_frames),
                swap: (0..swap_devices).map(|_| Memphy::new(swap_frames)).collect(),
                processes: Vec::new(),
            }),
            scheduler: Mutex::new(Scheduler::new(mode)),
            tracer,
        }
    }

    pub fn tracer(&self) -> &Tracer {
        &self.tracer
    }

    /// Creates a PCB with a fresh, empty address space, registers it in
    /// the process table, and enqueues it on the scheduler's ready queue.
    pub fn spawn(&self, id: Pid, priority: Priority, active_swap: usize) {
        self.vm.lock().unwrap().processes.push(Pcb::new(id, priority, active_swap));
        self.scheduler.lock().unwrap().add_proc(id, priority);
    }

    pub fn ram_free_frames(&self) -> usize {
        self.vm.lock().unwrap().ram.free_frame_count()
    }

    /// The owner recorded against `fpn` in RAM's used-frame list, if any.
    pub fn ram_used_owner(&self, fpn: u32) -> Option<Pid> {
        self.vm.lock().unwrap().ram.used_frame(fpn).map(|u| u.owner)
    }

    /// Runs `f` against the PCB identified by `pid` while `vm_lock` is
    /// held, for read-only inspection (tests, diagnostics).
    pub fn with_pcb<R>(&self, pid: Pid, f: impl FnOnce(&Pcb) -> R) -> Option<R> {
        let guard = self.vm.lock().unwrap();
        guard.index_of(pid).map(|idx| f(&guard.processes[idx]))
    }

    /// Picks the next process to run, per `queue_lock`.
    pub fn next_ready(&self) -> Option<Pid> {
        self.scheduler.lock().unwrap().get_proc()
    }

    /// Re-enqueues a process that yielded without finishing.
    pub fn yield_proc(&self, pid: Pid, priority: Priority) {
        self.scheduler.lock().unwrap().put_proc(pid, priority);
    }

    /// Tears down a finished process: reclaims its frames, drops its PCB,
    /// and credits its priority level's quota back via
    /// `Scheduler::finish_proc`.
    pub fn finish_proc(&self, pid: Pid) -> Result<(), crate::error::PagingError> {
        self.free_pcb_memph(pid)?;
        let priority = {
            let mut vm = self.vm.lock().unwrap();
            let idx = vm.index_of(pid);
            idx.map(|idx| vm.processes.remove(idx).priority)
        };
        if let Some(priority) = priority {
            self.scheduler.lock().unwrap().finish_proc(priority);
        }
        Ok(())
    }
}
