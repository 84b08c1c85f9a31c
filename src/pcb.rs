// SPDX-License-Identifier: MIT OR Apache-2.0

//! The process control block.
//!
//! Grounded on `kernel/src/processtable.rs`'s `Process` (id, lifecycle
//! state, owned memory mapping) and the small-integer `PID` newtype used
//! throughout the teacher (`xous_kernel::PID`), rather than a raw pointer.

use std::fmt;

use crate::config::MAX_PRIO;
use crate::mm::Mm;

/// Process identifier. A small `Copy` newtype, mirroring `xous_kernel::PID`,
/// used both to name a process and (per DESIGN.md) to name the MM it owns
/// when a used-frame entry records an `owner`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pid(pub u32);

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A process's priority level: `0` is highest, strictly less than
/// [`MAX_PRIO`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Priority(pub usize);

impl Priority {
    pub fn new(level: usize) -> Option<Self> {
        if level < MAX_PRIO {
            Some(Priority(level))
        } else {
            None
        }
    }
}

/// The process control block. Owns its address space; refers to the
/// system's RAM store and to one of the (up to [`crate::config::PAGING_MAX_MMSWP`])
/// swap devices by index rather than by pointer.
#[derive(Debug)]
pub struct Pcb {
    pub id: Pid,
    pub priority: Priority,
    pub mm: Mm,
    /// Index into the owning [`crate::system::System`]'s swap device list.
    pub active_swap: usize,
}

impl Pcb {
    pub fn new(id: Pid, priority: Priority, active_swap: usize) -> Self {
        Pcb { id, priority, mm: Mm::new(), active_swap }
    }
}
