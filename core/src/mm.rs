//! User address spaces, copies between user and kernel memory, and the
//! initial stack of a new program.

use crate::config::{ARG_MAX, STACK_ALIGN, USER_PTR_SIZE, USER_SPACE_TOP};
use crate::task::{Platform, UserEntry};
use alloc::string::String;
use alloc::vec::Vec;
use axerrno::{AxResult, LinuxError, LinuxResult};
use memory_addr::{VirtAddr, align_down};

/// A user address space. Dropping it unmaps and frees everything it holds.
pub trait AddrSpace: Send + Sized + 'static {
    /// Deep copy. The copy shares no writable page with `self`.
    fn clone_or_err(&self) -> AxResult<Self>;

    /// Map the user stack region. Returns the initial stack pointer.
    fn define_stack(&mut self) -> AxResult<VirtAddr>;

    /// Read mapped memory starting at `start`.
    fn read(&self, start: VirtAddr, buf: &mut [u8]) -> AxResult;

    /// Write mapped memory starting at `start`.
    fn write(&mut self, start: VirtAddr, buf: &[u8]) -> AxResult;
}

fn check_user_region(start: VirtAddr, len: usize) -> LinuxResult {
    let start = start.as_usize();
    if start == 0 {
        return Err(LinuxError::EFAULT);
    }
    match start.checked_add(len) {
        Some(end) if end <= USER_SPACE_TOP => Ok(()),
        _ => Err(LinuxError::EFAULT),
    }
}

pub fn copy_in<A: AddrSpace>(aspace: &A, src: VirtAddr, buf: &mut [u8]) -> LinuxResult {
    check_user_region(src, buf.len())?;
    aspace.read(src, buf).map_err(|_| LinuxError::EFAULT)
}

pub fn copy_out<A: AddrSpace>(aspace: &mut A, dst: VirtAddr, buf: &[u8]) -> LinuxResult {
    check_user_region(dst, buf.len())?;
    aspace.write(dst, buf).map_err(|_| LinuxError::EFAULT)
}

/// Copy a NUL-terminated string of at most `max_len` bytes, terminator included.
pub fn copy_in_string<A: AddrSpace>(aspace: &A, src: VirtAddr, max_len: usize) -> LinuxResult<String> {
    let mut bytes = Vec::new();
    for offset in 0..max_len {
        let mut byte = [0u8];
        copy_in(aspace, src + offset, &mut byte)?;
        if byte[0] == 0 {
            return String::from_utf8(bytes).map_err(|_| LinuxError::EINVAL);
        }
        bytes.push(byte[0]);
    }
    Err(LinuxError::ENAMETOOLONG)
}

/// Write `s` and its terminator. Returns the number of bytes written.
pub fn copy_out_string<A: AddrSpace>(
    aspace: &mut A,
    dst: VirtAddr,
    s: &str,
    max_len: usize,
) -> LinuxResult<usize> {
    let len = s.len() + 1;
    if len > max_len {
        return Err(LinuxError::ENAMETOOLONG);
    }
    copy_out(aspace, dst, s.as_bytes())?;
    copy_out(aspace, dst + s.len(), &[0])?;
    Ok(len)
}

/// Convert a user address to the 32-bit form stored in user memory.
pub fn to_user_word(addr: VirtAddr) -> LinuxResult<u32> {
    u32::try_from(addr.as_usize()).map_err(|_| LinuxError::EFAULT)
}

/// Lay out `args` below `stack_top`:
///
/// ```text
///   stack_top -> +-----------------+
///                | "args[n-1]\0"   |
///                | ...             |
///                | "args[0]\0"     |
///                +-----------------+ <- aligned down to 8
///                | (padding)       |
///                | NULL            |
///                | &args[n-1]      |
///                | ...             |
///   sp, argv  -> | &args[0]        |  8-byte aligned
///                +-----------------+
/// ```
///
/// Returns `(sp, argv)`, which are equal.
pub fn build_user_stack<A: AddrSpace>(
    aspace: &mut A,
    stack_top: VirtAddr,
    args: &[String],
) -> LinuxResult<(VirtAddr, VirtAddr)> {
    let mut sp = stack_top.as_usize();
    let mut arg_addrs = Vec::with_capacity(args.len() + 1);
    for arg in args.iter().rev() {
        sp = sp.checked_sub(arg.len() + 1).ok_or(LinuxError::ENOMEM)?;
        copy_out_string(aspace, sp.into(), arg, ARG_MAX + 1)?;
        arg_addrs.push(to_user_word(sp.into())?);
    }
    arg_addrs.reverse();
    arg_addrs.push(0);

    sp = align_down(sp, STACK_ALIGN);
    let table_size = arg_addrs.len() * USER_PTR_SIZE;
    sp = sp.checked_sub(table_size).ok_or(LinuxError::ENOMEM)?;
    sp = align_down(sp, STACK_ALIGN);

    let argv = VirtAddr::from(sp);
    for (index, addr) in arg_addrs.iter().enumerate().rev() {
        debug_assert!(memory_addr::is_aligned(sp + index * USER_PTR_SIZE, USER_PTR_SIZE));
        copy_out(aspace, argv + index * USER_PTR_SIZE, &addr.to_ne_bytes())?;
    }
    Ok((argv, argv))
}

/// Load an opened program into `aspace` and set up its stack with `args`.
pub fn load_user_app<P: Platform>(
    platform: &P,
    aspace: &mut P::AddrSpace,
    exe: &mut P::Executable,
    args: &[String],
) -> LinuxResult<UserEntry> {
    let entry = platform.load_executable(aspace, exe)?;
    let stack_top = aspace.define_stack()?;
    let (sp, argv) = build_user_stack(aspace, stack_top, args)?;
    debug!(
        "[mm] loaded program: entry={:#x}, sp={:#x}, argc={}",
        entry.as_usize(),
        sp.as_usize(),
        args.len()
    );
    Ok(UserEntry {
        entry,
        sp,
        argc: args.len(),
        argv,
    })
}
