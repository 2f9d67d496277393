use axerrno::LinuxResult;
use procyon_core::task::{Platform, TaskExt};
use syscall_trace::syscall_trace;

#[syscall_trace]
pub fn sys_getpid<P: Platform>(curr: &TaskExt<P>) -> LinuxResult<isize> {
    Ok(curr.pid() as _)
}

#[syscall_trace]
pub fn sys_getppid<P: Platform>(curr: &TaskExt<P>) -> LinuxResult<isize> {
    let processes = curr.kernel().processes().lock();
    Ok(match processes.lookup(curr.pid()).and_then(|p| p.get_parent()) {
        Some(parent) => parent as _,
        None => 0,
    })
}
