use crate::completion::{Completion, SpinWaitQueue, WaitQueue};
use crate::pid::PidAllocator;
use crate::process::Process;
use crate::status::ExitStatus;
use crate::{Pid, ProcessError};
use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::ops::RangeInclusive;
use spin::{Mutex, MutexGuard};

struct TableInner<W> {
    processes: BTreeMap<Pid, Process<W>>,
    pids: PidAllocator,
}

/// Registry of every live or not-yet-reaped process.
///
/// One lock covers PID allocation, record insertion, the exit-status write,
/// the state transition and orphan reclamation. The only step taken without
/// it is releasing a completion.
pub struct ProcessTable<W = SpinWaitQueue> {
    inner: Mutex<TableInner<W>>,
}

/// Exclusive access to the process table for the length of one logical operation.
pub struct ProcessTableGuard<'a, W> {
    inner: MutexGuard<'a, TableInner<W>>,
}

impl<W: WaitQueue> ProcessTable<W> {
    pub fn new() -> Self {
        Self::from_allocator(PidAllocator::default())
    }

    /// A table whose PIDs come from `range` instead of the configured limits.
    pub fn with_pid_range(range: RangeInclusive<Pid>) -> Self {
        Self::from_allocator(PidAllocator::new(range))
    }

    fn from_allocator(pids: PidAllocator) -> Self {
        Self {
            inner: Mutex::new(TableInner {
                processes: BTreeMap::new(),
                pids,
            }),
        }
    }

    pub fn lock(&self) -> ProcessTableGuard<'_, W> {
        ProcessTableGuard {
            inner: self.inner.lock(),
        }
    }

    /// Record that `pid` exited with `status` and wake its parent.
    ///
    /// The status write, the state transition and orphan handling happen under
    /// the lock; the completion is released after the lock is dropped.
    pub fn exit(&self, pid: Pid, status: ExitStatus) {
        let completion = self.lock().mark_exited(pid, status);
        completion.complete();
    }

    /// Block until child `pid` of `parent` has exited.
    ///
    /// The record stays in the table until [`Awaited::reap`]. Only one waiter
    /// may hold a child at a time.
    pub fn wait(&self, parent: Pid, pid: Pid) -> Result<Awaited<'_, W>, ProcessError> {
        let completion = {
            let table = self.lock();
            let process = table.lookup(pid).ok_or(ProcessError::NoSuchProcess)?;
            if process.get_parent() != Some(parent) {
                return Err(ProcessError::NotMyChild);
            }
            if !process.completion().attach_waiter() {
                warn!(
                    "[process] process {} is already being waited for, refusing {}",
                    pid, parent
                );
                return Err(ProcessError::NoSuchProcess);
            }
            process.completion().clone()
        };

        if !completion.is_completed() {
            debug!("[process] {} blocks on child {}", parent, pid);
        }
        completion.wait();

        // The attached waiter is the only one allowed to remove an exited
        // record whose parent is alive, so the record is still here.
        let status = self
            .lock()
            .lookup(pid)
            .and_then(Process::get_exit_status)
            .unwrap_or_else(|| panic!("[process] child {} vanished while awaited", pid));
        Ok(Awaited {
            table: self,
            parent,
            pid,
            status,
            reaped: false,
        })
    }
}

/// An exited child held by its parent's wait.
///
/// Dropping it without [`Awaited::reap`] leaves the record in place and frees
/// the waiter slot, so the parent can wait for the child again.
pub struct Awaited<'a, W: WaitQueue> {
    table: &'a ProcessTable<W>,
    parent: Pid,
    pid: Pid,
    status: ExitStatus,
    reaped: bool,
}

impl<W: WaitQueue> Awaited<'_, W> {
    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn status(&self) -> ExitStatus {
        self.status
    }

    /// Remove the child's record and free its PID.
    pub fn reap(mut self) -> ExitStatus {
        self.reaped = true;
        if self.table.lock().remove(self.pid).is_none() {
            panic!("[process] child {} vanished while awaited", self.pid);
        }
        info!(
            "[process] {} reaped child {}: {:?}",
            self.parent, self.pid, self.status
        );
        self.status
    }
}

impl<W: WaitQueue> Drop for Awaited<'_, W> {
    fn drop(&mut self) {
        if self.reaped {
            return;
        }
        debug!("[process] {} leaves child {} unreaped", self.parent, self.pid);
        if let Some(process) = self.table.lock().lookup(self.pid) {
            process.completion().detach_waiter();
        }
    }
}

impl<W: WaitQueue> Default for ProcessTable<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: WaitQueue> ProcessTableGuard<'_, W> {
    /// Reserve a PID. It stays reserved until [`Self::remove`],
    /// [`Self::discard`] or [`Self::release_pid`].
    pub fn allocate_pid(&mut self) -> Result<Pid, ProcessError> {
        self.inner.pids.alloc()
    }

    /// Give back a reserved PID that never got a record.
    pub fn release_pid(&mut self, pid: Pid) {
        assert!(
            !self.inner.processes.contains_key(&pid),
            "[process] releasing pid {} that still has a record",
            pid
        );
        self.inner.pids.release(pid);
    }

    /// Add a RUNNING record for a PID obtained from [`Self::allocate_pid`].
    pub fn insert(&mut self, pid: Pid, parent: Option<Pid>) -> &Process<W> {
        assert!(
            self.inner.pids.is_allocated(pid),
            "[process] pid {} was not allocated",
            pid
        );
        if self.inner.processes.contains_key(&pid) {
            panic!("[process] process with id {} already exists", pid);
        }
        self.inner
            .processes
            .entry(pid)
            .or_insert_with(|| Process::new(pid, parent))
    }

    /// Absent means no such process, or already reaped.
    pub fn lookup(&self, pid: Pid) -> Option<&Process<W>> {
        self.inner.processes.get(&pid)
    }

    /// Delete an EXITED record and free its PID.
    pub fn remove(&mut self, pid: Pid) -> Option<Process<W>> {
        let process = self.inner.processes.remove(&pid)?;
        assert!(
            process.is_exited(),
            "[process] process {} is not exited",
            pid
        );
        self.inner.pids.release(pid);
        Some(process)
    }

    /// Undo an [`Self::insert`] for a process whose execution context never ran.
    pub fn discard(&mut self, pid: Pid) {
        if self.inner.processes.remove(&pid).is_some() {
            warn!("[process] discarding unstarted process {}", pid);
        }
        self.inner.pids.release(pid);
    }

    pub fn children_of(&self, pid: Pid) -> Vec<Pid> {
        self.inner
            .processes
            .values()
            .filter(|process| process.get_parent() == Some(pid))
            .map(Process::get_pid)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.processes.is_empty()
    }

    /// Finalize `pid` and handle its children. Returns the completion to
    /// release once the lock is dropped.
    ///
    /// Exited children are reclaimed now since no one is left to reap them;
    /// running children become parentless and reclaim themselves at exit.
    /// The exiting record is reclaimed at once if it has no parent.
    pub fn mark_exited(&mut self, pid: Pid, status: ExitStatus) -> Arc<Completion<W>> {
        let TableInner { processes, pids } = &mut *self.inner;
        let process = processes
            .get_mut(&pid)
            .unwrap_or_else(|| panic!("[process] exiting process {} has no record", pid));
        process.set_exited(status);
        let completion = process.completion().clone();
        let parentless = process.get_parent().is_none();

        let children: Vec<Pid> = processes
            .values()
            .filter(|child| child.get_parent() == Some(pid))
            .map(Process::get_pid)
            .collect();
        for child in children {
            let Some(record) = processes.get_mut(&child) else {
                continue;
            };
            if record.is_exited() {
                debug!("[process] reclaiming exited orphan {}", child);
                processes.remove(&child);
                pids.release(child);
            } else {
                debug!("[process] {} is now parentless", child);
                record.set_parent(None);
            }
        }

        if parentless {
            debug!("[process] parentless process {} releases itself", pid);
            processes.remove(&pid);
            pids.release(pid);
        }
        completion
    }
}
