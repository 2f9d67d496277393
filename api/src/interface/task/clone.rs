use crate::imp::task::sys_fork_impl;
use axerrno::LinuxResult;
use procyon_core::task::{Platform, TaskExt};
use syscall_trace::syscall_trace;

#[syscall_trace]
pub fn sys_fork<P: Platform>(curr: &TaskExt<P>, tf: &P::TrapFrame) -> LinuxResult<isize> {
    sys_fork_impl(curr, tf).map(|pid| pid as _)
}
