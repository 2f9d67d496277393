use alloc::sync::Arc;
use axerrno::{LinuxError, LinuxResult};
use procyon_core::process::ProcessData;
use procyon_core::task::{Platform, TaskExt, UserContext};
use procyon_process::Pid;

/// Duplicate the calling process.
///
/// Returns the child's PID to the caller; the child resumes from a copy of
/// `tf` with a return value of 0. Either the address space, the record and the
/// execution context all come into existence, or none of them does.
pub fn sys_fork_impl<P: Platform>(curr: &TaskExt<P>, tf: &P::TrapFrame) -> LinuxResult<Pid> {
    let kernel = curr.kernel();
    let processes = kernel.processes();

    let pid = processes.lock().allocate_pid().map_err(|err| {
        warn!("[fork] process {} cannot fork: {:?}", curr.pid(), err);
        LinuxError::from(err)
    })?;

    // clone the address space
    let addr_space = match curr.process_data().clone_addr_space() {
        Ok(addr_space) => addr_space,
        Err(err) => {
            warn!("[fork] failed to copy address space of {}: {:?}", curr.pid(), err);
            processes.lock().release_pid(pid);
            return Err(err);
        }
    };

    // duplicate trap frame
    let mut new_uctx = tf.clone();
    // set return value of the child
    new_uctx.set_retval(0);

    processes.lock().insert(pid, Some(curr.pid()));

    let command_line = curr.process_data().command_line.lock().clone();
    let process_data = ProcessData::new(command_line, addr_space);
    let task = TaskExt::new(pid, Arc::new(process_data), kernel.clone());

    // spawn the task
    if let Err(err) = kernel.platform().spawn_user_task(task, new_uctx) {
        warn!("[fork] failed to spawn process {}: {:?}", pid, err);
        processes.lock().discard(pid);
        return Err(err.into());
    }

    info!(
        "[fork] process {} forked child {}, resuming at {:#x}",
        curr.pid(),
        pid,
        tf.ip()
    );
    Ok(pid)
}
