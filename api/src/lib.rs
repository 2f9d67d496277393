//! The process-lifecycle syscalls: `fork`, `execv`, `_exit`, `waitpid`,
//! `getpid` and `getppid`.
#![no_std]

extern crate alloc;
#[macro_use]
extern crate log;

pub mod imp;
pub mod interface;
pub mod ptr;
