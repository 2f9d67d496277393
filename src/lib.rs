#![no_std]
#![doc = include_str!("../README.md")]

#[macro_use]
extern crate log;

mod syscall;

pub use syscall::{Sysno, handle_syscall};
