//! Process bookkeeping for the lifecycle syscalls.
//! Keeps one record per live or not-yet-reaped process in a [`ProcessTable`],
//! guarded by a single lock. A parent waits on a child through the child's
//! [`Completion`], which is released only after the exit status is written.
//! Processes have no groups or sessions, and only the direct parent may reap a child.
#![no_std]

extern crate alloc;
#[macro_use]
extern crate log;

pub mod completion;
pub mod config;
pub mod pid;
pub mod process;
pub mod status;
pub mod table;

pub use completion::{Completion, SpinWaitQueue, WaitQueue};
pub use process::{Process, ProcessState};
pub use status::ExitStatus;
pub use table::{Awaited, ProcessTable, ProcessTableGuard};

use axerrno::LinuxError;

/// Type alias for process ID.
/// OS/161 uses `pid_t`, a 32-bit signed integer; valid PIDs are always positive.
pub type Pid = u32;

/// Errors raised by the process table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessError {
    /// Every PID in the identity space is in use.
    PidExhausted,
    /// No record for the PID, or it has already been reaped.
    NoSuchProcess,
    /// The caller is not the recorded parent of the target.
    NotMyChild,
}

impl From<ProcessError> for LinuxError {
    fn from(err: ProcessError) -> Self {
        match err {
            ProcessError::PidExhausted => LinuxError::EAGAIN,
            ProcessError::NoSuchProcess => LinuxError::ESRCH,
            ProcessError::NotMyChild => LinuxError::ECHILD,
        }
    }
}
