//! Per-process kernel state and the contracts the lifecycle syscalls rely on:
//! address spaces, user contexts, executable loading and user-memory copies.
#![no_std]

extern crate alloc;
#[macro_use]
extern crate log;

pub mod config;
pub mod entry;
pub mod kernel;
pub mod mm;
pub mod process;
pub mod task;
