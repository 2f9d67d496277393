//! Typed user-space addresses for syscall signatures.
//!
//! The wrappers only carry an address. Every access goes through the copy
//! routines in [`procyon_core::mm`], which validate the range and turn a
//! failed access into `EFAULT`.

use alloc::string::String;
use alloc::vec::Vec;
use axerrno::{LinuxError, LinuxResult};
use core::ffi::c_char;
use core::fmt;
use core::marker::PhantomData;
use memory_addr::VirtAddr;
use procyon_core::config::USER_PTR_SIZE;
use procyon_core::mm::{AddrSpace, copy_in, copy_in_string, copy_out};

/// A pointer as stored in user memory: user programs use 32-bit pointers.
pub type UserWord = u32;

/// Displays a user address for syscall tracing.
pub struct PtrTrace(VirtAddr);

impl fmt::Display for PtrTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.as_usize() == 0 {
            f.write_str("null")
        } else {
            write!(f, "{:#x}", self.0.as_usize())
        }
    }
}

macro_rules! def_user_ptr {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        pub struct $name<T> {
            address: VirtAddr,
            _marker: PhantomData<T>,
        }

        impl<T> $name<T> {
            pub fn address(&self) -> VirtAddr {
                self.address
            }

            pub fn is_null(&self) -> bool {
                self.address.as_usize() == 0
            }

            pub fn fmt_trace(&self) -> PtrTrace {
                PtrTrace(self.address)
            }
        }

        impl<T> From<usize> for $name<T> {
            fn from(address: usize) -> Self {
                Self {
                    address: VirtAddr::from(address),
                    _marker: PhantomData,
                }
            }
        }

        impl<T> Clone for $name<T> {
            fn clone(&self) -> Self {
                *self
            }
        }

        impl<T> Copy for $name<T> {}

        impl<T> fmt::Debug for $name<T> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.fmt_trace())
            }
        }
    };
}

def_user_ptr!(
    /// User memory the kernel reads from.
    UserInPtr
);
def_user_ptr!(
    /// User memory the kernel writes to.
    UserOutPtr
);

impl UserInPtr<c_char> {
    /// Copy in a NUL-terminated string of at most `max_len` bytes, terminator included.
    pub fn get_as_str<A: AddrSpace>(&self, aspace: &A, max_len: usize) -> LinuxResult<String> {
        copy_in_string(aspace, self.address, max_len)
    }
}

impl UserInPtr<UserWord> {
    /// Copy in a NULL-terminated array of user pointers.
    ///
    /// Fails with `E2BIG` if there are more than `max_len` entries before the terminator.
    pub fn get_as_null_terminated<A: AddrSpace>(
        &self,
        aspace: &A,
        max_len: usize,
    ) -> LinuxResult<Vec<VirtAddr>> {
        let mut ptrs = Vec::new();
        loop {
            let mut word = [0u8; USER_PTR_SIZE];
            copy_in(aspace, self.address + ptrs.len() * USER_PTR_SIZE, &mut word)?;
            let ptr = UserWord::from_ne_bytes(word);
            if ptr == 0 {
                return Ok(ptrs);
            }
            if ptrs.len() == max_len {
                return Err(LinuxError::E2BIG);
            }
            ptrs.push(VirtAddr::from(ptr as usize));
        }
    }
}

impl UserOutPtr<i32> {
    pub fn write<A: AddrSpace>(&self, aspace: &mut A, value: i32) -> LinuxResult {
        copy_out(aspace, self.address, &value.to_ne_bytes())
    }
}
