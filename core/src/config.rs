//! Platform constants for the user-space layout and `execv` limits.

/// First address above user space.
pub const USER_SPACE_TOP: usize = 0x8000_0000;

/// The user stack grows down from here.
pub const USER_STACK_TOP: usize = USER_SPACE_TOP;

/// Size of the stack region `define_stack` maps.
pub const USER_STACK_SIZE: usize = 0x2_0000;

/// Longest single `execv` argument in bytes, terminator excluded.
pub const ARG_MAX: usize = 1024;

/// Most arguments `execv` accepts.
pub const NARG_MAX: usize = 64;

/// Longest program path, terminator included.
pub const PATH_MAX: usize = 1024;

/// Width of a user pointer. User programs run with 32-bit pointers.
pub const USER_PTR_SIZE: usize = core::mem::size_of::<u32>();

/// Alignment of the stack pointer handed to a new program.
pub const STACK_ALIGN: usize = 8;
