use axerrno::{LinuxError, LinuxResult};
use num_enum::TryFromPrimitive;
use procyon_api::imp::task::*;
use procyon_api::interface::task::*;
use procyon_core::task::{Platform, TaskExt, UserContext};

/// OS/161 system call numbers handled here.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(usize)]
pub enum Sysno {
    fork = 0,
    vfork = 1,
    execv = 2,
    _exit = 3,
    waitpid = 4,
    getpid = 5,
    getppid = 6,
}

/// Run syscall `syscall_num` for the current task. Returns the value to hand
/// back to user space: the result on success, `-errno` on failure.
///
/// `_exit` and a successful `execv` do not return.
pub fn handle_syscall<P: Platform>(
    curr: &TaskExt<P>,
    tf: &P::TrapFrame,
    syscall_num: usize,
) -> isize {
    let sysno = Sysno::try_from(syscall_num).ok();
    trace!("[syscall] <{:?}> begin", sysno);
    let result: LinuxResult<isize> = match sysno {
        Some(Sysno::fork) => sys_fork(curr, tf),
        Some(Sysno::execv) => sys_execv(curr, tf.arg0().into(), tf.arg1().into()),
        Some(Sysno::_exit) => sys_exit(curr, tf.arg0() as _),
        Some(Sysno::waitpid) => sys_waitpid(
            curr,
            tf.arg0() as _,
            tf.arg1().into(),
            tf.arg2() as _,
        ),
        Some(Sysno::getpid) => sys_getpid(curr),
        Some(Sysno::getppid) => sys_getppid(curr),
        Some(Sysno::vfork) | None => stub_unimplemented(syscall_num),
    };
    let ans = result.unwrap_or_else(|err| -err.code() as _);
    trace!("[syscall] <{:?}> return {}", sysno, ans);
    ans
}

fn stub_unimplemented(syscall_num: usize) -> LinuxResult<isize> {
    warn!("Unimplemented syscall: {}, ENOSYS", syscall_num);
    Err(LinuxError::ENOSYS)
}
