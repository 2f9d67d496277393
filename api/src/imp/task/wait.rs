use crate::ptr::UserOutPtr;
use axerrno::{LinuxError, LinuxResult};
use procyon_core::task::{Platform, TaskExt};
use procyon_process::{ExitStatus, Pid};
use syscall_trace::syscall_trace;

/// Block until child `pid` exits, store its wait status at `status` unless it
/// is null, then reap it.
///
/// Only the direct parent may wait. If the status cannot be stored the child
/// is left unreaped and can be waited for again. There is no way to interrupt
/// the wait.
pub fn sys_waitpid_impl<P: Platform>(
    curr: &TaskExt<P>,
    pid: i32,
    status: UserOutPtr<i32>,
) -> LinuxResult<ExitStatus> {
    // waiting for any child or for a process group is not supported
    let pid = Pid::try_from(pid).map_err(|_| LinuxError::ESRCH)?;
    let child = curr.kernel().processes().wait(curr.pid(), pid)?;

    if !status.is_null() {
        let mut addr_space = curr.process_data().addr_space();
        let addr_space = addr_space.as_mut().ok_or(LinuxError::EFAULT)?;
        status
            .write(addr_space, child.status().to_wait_status())
            .inspect_err(|err| {
                warn!(
                    "[waitpid] process {} cannot store status of {}: {:?}",
                    curr.pid(),
                    pid,
                    err
                )
            })?;
    }

    let exit_status = child.reap();
    info!(
        "[waitpid] process {} collected child {}: {:?}",
        curr.pid(),
        pid,
        exit_status
    );
    Ok(exit_status)
}

#[syscall_trace]
pub fn sys_waitpid<P: Platform>(
    curr: &TaskExt<P>,
    pid: i32,
    status: UserOutPtr<i32>,
    options: i32,
) -> LinuxResult<isize> {
    if options != 0 {
        warn!("[waitpid] unsupported options {:#x}", options);
        return Err(LinuxError::EINVAL);
    }
    sys_waitpid_impl(curr, pid, status)?;
    Ok(pid as _)
}
