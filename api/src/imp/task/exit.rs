use procyon_core::task::{Platform, TaskExt};
use procyon_process::ExitStatus;

/// Finalize the calling process: record its exit status, wake its parent
/// and destroy its address space.
///
/// This is everything `_exit` does short of giving up the execution context.
pub fn exit_current_process<P: Platform>(curr: &TaskExt<P>, exit_code: i32) {
    info!(
        "[exit] process {} exiting with code {}",
        curr.pid(),
        exit_code
    );
    let kernel = curr.kernel();
    kernel
        .processes()
        .exit(curr.pid(), ExitStatus::Exited(exit_code));

    // clear the address space before destroying it, so nothing reactivates
    // a half-destroyed one
    kernel.platform().deactivate();
    let addr_space = curr.process_data().take_addr_space();
    drop(addr_space);
}

pub fn sys_exit_impl<P: Platform>(curr: &TaskExt<P>, exit_code: i32) -> ! {
    exit_current_process(curr, exit_code);
    curr.kernel().platform().exit_current(exit_code)
}
