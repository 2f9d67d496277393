use crate::completion::{Completion, WaitQueue};
use crate::status::ExitStatus;
use crate::Pid;
use alloc::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Running,
    /// Terminal. Carries the status the process exited with.
    Exited(ExitStatus),
}

/// The record the process table keeps for one process.
///
/// Records live inside the table and are only reachable through a
/// [`ProcessTableGuard`](crate::ProcessTableGuard), so every read-modify-write
/// happens under the table lock.
pub struct Process<W> {
    pid: Pid,
    parent: Option<Pid>,
    state: ProcessState,
    completion: Arc<Completion<W>>,
}

impl<W: WaitQueue> Process<W> {
    pub(crate) fn new(pid: Pid, parent: Option<Pid>) -> Self {
        Self {
            pid,
            parent,
            state: ProcessState::Running,
            completion: Arc::new(Completion::new()),
        }
    }

    pub fn get_pid(&self) -> Pid {
        self.pid
    }

    /// `None` for the first process and for orphans.
    pub fn get_parent(&self) -> Option<Pid> {
        self.parent
    }

    pub fn get_state(&self) -> ProcessState {
        self.state
    }

    pub fn is_exited(&self) -> bool {
        matches!(self.state, ProcessState::Exited(_))
    }

    pub fn get_exit_status(&self) -> Option<ExitStatus> {
        match self.state {
            ProcessState::Exited(status) => Some(status),
            ProcessState::Running => None,
        }
    }

    pub fn completion(&self) -> &Arc<Completion<W>> {
        &self.completion
    }

    pub(crate) fn set_parent(&mut self, parent: Option<Pid>) {
        self.parent = parent;
    }

    pub(crate) fn set_exited(&mut self, status: ExitStatus) {
        assert!(
            !self.is_exited(),
            "[process] process {} is already exited",
            self.pid
        );
        self.state = ProcessState::Exited(status);
    }
}
