use crate::imp::task::sys_execv_impl;
use crate::ptr::{UserInPtr, UserWord};
use alloc::string::String;
use alloc::vec::Vec;
use axerrno::{LinuxError, LinuxResult};
use core::ffi::c_char;
use procyon_core::config::{ARG_MAX, NARG_MAX, PATH_MAX};
use procyon_core::mm::AddrSpace;
use procyon_core::task::{Platform, TaskExt};
use syscall_trace::syscall_trace;

fn get_string_array<A: AddrSpace>(aspace: &A, array: UserInPtr<UserWord>) -> LinuxResult<Vec<String>> {
    let string_ptrs = array.get_as_null_terminated(aspace, NARG_MAX)?;
    string_ptrs
        .into_iter()
        .map(|ptr| {
            UserInPtr::<c_char>::from(ptr.as_usize())
                .get_as_str(aspace, ARG_MAX + 1)
                .map_err(|err| match err {
                    LinuxError::ENAMETOOLONG => LinuxError::E2BIG,
                    err => err,
                })
        })
        .collect()
}

/// Never returns on success.
#[syscall_trace]
pub fn sys_execv<P: Platform>(
    curr: &TaskExt<P>,
    path: UserInPtr<c_char>,
    argv: UserInPtr<UserWord>,
) -> LinuxResult<isize> {
    // user memory is unreachable once the new address space is active,
    // so copy everything in first
    let (path, args) = {
        let addr_space = curr.process_data().addr_space();
        let addr_space = addr_space.as_ref().ok_or(LinuxError::EFAULT)?;
        let path = path.get_as_str(addr_space, PATH_MAX)?;
        let args = get_string_array(addr_space, argv)?;
        (path, args)
    };

    let entry = sys_execv_impl(curr, path, args)?;
    curr.kernel().platform().enter_user(entry)
}
