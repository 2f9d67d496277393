//! Identity space limits.

use crate::Pid;

/// Smallest PID handed out to a user process. PID 1 belongs to the kernel.
pub const PID_MIN: Pid = 2;

/// Largest PID handed out to a user process.
pub const PID_MAX: Pid = 32767;
