// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ready-queue scheduler. Two runtime modes replace the source's
//! `#ifdef MLQ_SCHED`: [`SchedulerMode::Mlq`], a fixed array of
//! `MAX_PRIO` priority queues each with its own CPU quota, and
//! [`SchedulerMode::Fcfs`], a single first-come-first-served queue.
//!
//! Grounded on `original_source/submit/src/sched.c` (`mlq_ready_queue`,
//! `get_mlq_proc`/`put_mlq_proc`/`add_mlq_proc`/`finish_mlq_proc`,
//! `init_scheduler`'s `cpuRemainder = MAX_PRIO - i`) and `src/queue.c`
//! (`enqueue`/`dequeue`, including the "Full Queue!" non-fatal overflow
//! behavior). The raw `queue_t` array-plus-size is reimplemented as a
//! `VecDeque<Pid>` per level.

use std::collections::VecDeque;

use crate::config::{SchedulerMode, MAX_PRIO, MAX_QUEUE_SIZE};
use crate::klog_info;
use crate::pcb::{Pid, Priority};

/// The ready-queue scheduler. Mutation of any queue happens only through
/// this struct's methods; the lock around it lives on
/// [`crate::system::System`], which wraps a `Scheduler` in a `Mutex`.
#[derive(Debug)]
pub struct Scheduler {
    mode: SchedulerMode,
    mlq: Vec<VecDeque<Pid>>,
    cpu_remainder: Vec<u32>,
    fcfs: VecDeque<Pid>,
}

impl Scheduler {
    pub fn new(mode: SchedulerMode) -> Self {
        Scheduler {
            mode,
            mlq: (0..MAX_PRIO).map(|_| VecDeque::new()).collect(),
            cpu_remainder: (0..MAX_PRIO).map(|i| (MAX_PRIO - i) as u32).collect(),
            fcfs: VecDeque::new(),
        }
    }

    pub fn mode(&self) -> SchedulerMode {
        self.mode
    }

    /// `add_mlq_proc` / FCFS `enqueue`. A full queue drops the new
    /// process and logs, it does not error -- matching `queue.c`'s
    /// `printf("Full Queue!\n")` on overflow. Does not touch any quota.
    pub fn add_proc(&mut self, pid: Pid, priority: Priority) {
        match self.mode {
            SchedulerMode::Mlq => {
                let q = &mut self.mlq[priority.0];
                if q.len() >= MAX_QUEUE_SIZE {
                    klog_info!("ready queue full at priority {}, dropping pid {}", priority.0, pid);
                    return;
                }
                q.push_back(pid);
            }
            SchedulerMode::Fcfs => {
                if self.fcfs.len() >= MAX_QUEUE_SIZE {
                    klog_info!("ready queue full, dropping pid {}", pid);
                    return;
                }
                self.fcfs.push_back(pid);
            }
        }
    }

    /// Re-enqueues a process that yielded the CPU before finishing (its
    /// time slice ran out, or it blocked and became runnable again) and
    /// credits its priority level one unit of quota back, mirroring
    /// `put_mlq_proc`'s `cpuRemainder++`.
    pub fn put_proc(&mut self, pid: Pid, priority: Priority) {
        if self.mode == SchedulerMode::Mlq {
            self.cpu_remainder[priority.0] += 1;
        }
        self.add_proc(pid, priority);
    }

    /// A process has finished and releases its PCB; its priority level's
    /// quota is credited back (`finish_mlq_proc`'s `cpuRemainder++`) but
    /// nothing is re-enqueued.
    pub fn finish_proc(&mut self, priority: Priority) {
        if self.mode == SchedulerMode::Mlq {
            self.cpu_remainder[priority.0] += 1;
        }
    }

    /// `get_mlq_proc` / FCFS `dequeue`: picks the next process to run, or
    /// `None` if no queue currently has both a waiting process and quota
    /// left to spend on it.
    pub fn get_proc(&mut self) -> Option<Pid> {
        match self.mode {
            SchedulerMode::Fcfs => self.fcfs.pop_front(),
            SchedulerMode::Mlq => self.get_mlq_proc(),
        }
    }

    /// Scans levels from highest priority (0) down on every call; there is
    /// no persisted cursor and no quota replenishment here -- only
    /// `put_proc`/`finish_proc` replenish a level's quota.
    fn get_mlq_proc(&mut self) -> Option<Pid> {
        for level in 0..MAX_PRIO {
            if self.cpu_remainder[level] > 0 {
                if let Some(pid) = self.mlq[level].pop_front() {
                    self.cpu_remainder[level] -= 1;
                    return Some(pid);
                }
            }
        }
        None
    }

    pub fn queue_empty(&self) -> bool {
        match self.mode {
            SchedulerMode::Fcfs => self.fcfs.is_empty(),
            SchedulerMode::Mlq => self.mlq.iter().all(VecDeque::is_empty),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fcfs_is_first_in_first_out() {
        let mut s = Scheduler::new(SchedulerMode::Fcfs);
        s.add_proc(Pid(1), Priority::new(0).unwrap());
        s.add_proc(Pid(2), Priority::new(0).unwrap());
        assert_eq!(s.get_proc(), Some(Pid(1)));
        assert_eq!(s.get_proc(), Some(Pid(2)));
        assert_eq!(s.get_proc(), None);
    }

    #[test]
    fn fcfs_drops_beyond_capacity() {
        let mut s = Scheduler::new(SchedulerMode::Fcfs);
        for i in 0..MAX_QUEUE_SIZE as u32 + 2 {
            s.add_proc(Pid(i), Priority::new(0).unwrap());
        }
        let mut drained = 0;
        while s.get_proc().is_some() {
            drained += 1;
        }
        assert_eq!(drained, MAX_QUEUE_SIZE);
    }

    #[test]
    fn mlq_services_highest_priority_first() {
        let mut s = Scheduler::new(SchedulerMode::Mlq);
        s.add_proc(Pid(1), Priority::new(5).unwrap());
        s.add_proc(Pid(2), Priority::new(0).unwrap());
        assert_eq!(s.get_proc(), Some(Pid(2)));
    }

    #[test]
    fn mlq_get_returns_none_once_quota_exhausted_until_put_or_finish_replenishes() {
        // The lowest priority level starts with a quota of 1, so a second
        // queued process at that level is not returned until something
        // credits the quota back.
        let mut s = Scheduler::new(SchedulerMode::Mlq);
        let last = Priority::new(MAX_PRIO - 1).unwrap();
        s.add_proc(Pid(1), last);
        s.add_proc(Pid(2), last);
        assert_eq!(s.get_proc(), Some(Pid(1)));
        assert_eq!(s.get_proc(), None);
        assert_eq!(s.get_proc(), None);
        s.put_proc(Pid(1), last);
        assert_eq!(s.get_proc(), Some(Pid(2)));
    }

    #[test]
    fn finish_proc_replenishes_quota_without_requeueing() {
        let mut s = Scheduler::new(SchedulerMode::Mlq);
        let last = Priority::new(MAX_PRIO - 1).unwrap();
        s.add_proc(Pid(1), last);
        assert_eq!(s.get_proc(), Some(Pid(1)));
        assert_eq!(s.get_proc(), None);
        s.finish_proc(last);
        // Quota is back, but nobody is queued at this level anymore.
        assert_eq!(s.get_proc(), None);
    }

    #[test]
    fn empty_scheduler_reports_empty_and_yields_nothing() {
        let mut s = Scheduler::new(SchedulerMode::Mlq);
        assert!(s.queue_empty());
        assert_eq!(s.get_proc(), None);
    }
}
