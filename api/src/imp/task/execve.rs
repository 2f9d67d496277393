use alloc::string::String;
use alloc::vec::Vec;
use axerrno::{LinuxError, LinuxResult};
use procyon_core::mm::load_user_app;
use procyon_core::task::{Platform, TaskExt, UserEntry};

/// Replace the calling process's image with the program at `path`.
///
/// `path` and `args` must already be in kernel memory. On success the old
/// address space has been destroyed and the caller must transfer control to
/// the returned entry. On failure the old address space is active again and
/// untouched.
pub fn sys_execv_impl<P: Platform>(
    curr: &TaskExt<P>,
    path: String,
    args: Vec<String>,
) -> LinuxResult<UserEntry> {
    debug!("[execv] process {}: path = {:?}, args = {:?}", curr.pid(), path, args);
    let platform = curr.kernel().platform();
    let process_data = curr.process_data();

    let mut exe = platform.open_executable(&path).map_err(|err| {
        warn!("[execv] cannot open {}: {:?}", path, err);
        err
    })?;

    let mut new_space = platform.new_user_aspace().map_err(LinuxError::from)?;
    platform.activate(&new_space);

    // load executable binary
    let entry = match load_user_app(platform, &mut new_space, &mut exe, &args) {
        Ok(entry) => entry,
        Err(err) => {
            error!("[execv] failed to load {}: {:?}", path, err);
            if let Some(old_space) = process_data.addr_space().as_ref() {
                platform.activate(old_space);
            }
            return Err(err);
        }
    };

    // the new image is complete, the old one can go
    let old_space = process_data.replace_addr_space(new_space);
    drop(old_space);
    *process_data.command_line.lock() = args;

    info!(
        "[execv] process {} now runs {}: entry={:#x}, sp={:#x}, argc={}",
        curr.pid(),
        path,
        entry.entry.as_usize(),
        entry.sp.as_usize(),
        entry.argc
    );
    Ok(entry)
}
