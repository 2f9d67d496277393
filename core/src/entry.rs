use crate::kernel::Kernel;
use crate::mm::load_user_app;
use crate::process::ProcessData;
use crate::task::{Platform, TaskExt, UserContext};
use alloc::string::String;
use alloc::sync::Arc;
use axerrno::{LinuxError, LinuxResult};
use procyon_process::Pid;

/// Start the first user process, running `args[0]` with `args` as its argv.
///
/// The process has no parent, so its record is reclaimed as soon as it exits.
pub fn run_user_app<P: Platform>(kernel: &Arc<Kernel<P>>, args: &[String]) -> LinuxResult<Pid> {
    let path = args.first().ok_or(LinuxError::EINVAL)?;
    let platform = kernel.platform();

    // create user address space
    // to hold executable file and other data
    let mut exe = platform.open_executable(path)?;
    let mut uspace = platform.new_user_aspace()?;
    let entry = load_user_app(platform, &mut uspace, &mut exe, args)?;

    let pid = {
        let mut processes = kernel.processes().lock();
        let pid = processes.allocate_pid()?;
        processes.insert(pid, None);
        pid
    };

    let process_data = ProcessData::new(args.to_vec(), uspace);
    let task = TaskExt::new(pid, Arc::new(process_data), kernel.clone());
    let uctx = P::TrapFrame::from_entry(&entry);
    if let Err(err) = platform.spawn_user_task(task, uctx) {
        error!("[task manager] failed to spawn {}: {:?}", path, err);
        kernel.processes().lock().discard(pid);
        return Err(err.into());
    }

    info!(
        "[task manager] process {} running {}: entry={:#x}, ustack={:#x}",
        pid,
        path,
        entry.entry.as_usize(),
        entry.sp.as_usize()
    );
    Ok(pid)
}
