use crate::imp::task::sys_exit_impl;
use axerrno::LinuxResult;
use core::ffi::c_int;
use procyon_core::task::{Platform, TaskExt};

/// Never returns: the calling execution context is gone afterwards.
pub fn sys_exit<P: Platform>(curr: &TaskExt<P>, status: c_int) -> LinuxResult<isize> {
    debug!("[syscall] <= sys_exit(status = {})", status);
    sys_exit_impl(curr, status)
}
