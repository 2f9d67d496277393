use crate::kernel::Kernel;
use crate::mm::AddrSpace;
use crate::process::ProcessData;
use alloc::sync::Arc;
use axerrno::{AxResult, LinuxResult};
use memory_addr::VirtAddr;
use procyon_process::{Pid, WaitQueue};

/// Where a freshly loaded program starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserEntry {
    /// Program entry point.
    pub entry: VirtAddr,
    /// Initial stack pointer, 8-byte aligned. Equal to `argv`.
    pub sp: VirtAddr,
    pub argc: usize,
    /// User address of the argument pointer array.
    pub argv: VirtAddr,
}

/// The register snapshot taken when a user thread traps into the kernel.
pub trait UserContext: Clone + Send + 'static {
    /// Context that starts a program at `entry` with `argc` and `argv` in the
    /// first two argument registers.
    fn from_entry(entry: &UserEntry) -> Self;

    fn arg0(&self) -> usize;
    fn arg1(&self) -> usize;
    fn arg2(&self) -> usize;

    fn ip(&self) -> usize;
    fn sp(&self) -> usize;

    /// Set the value the interrupted syscall returns.
    fn set_retval(&mut self, value: usize);
}

/// Services the lifecycle syscalls consume from the rest of the kernel.
pub trait Platform: Send + Sync + Sized + 'static {
    type AddrSpace: AddrSpace;
    type TrapFrame: UserContext;
    type WaitQueue: WaitQueue;
    /// An opened program file.
    type Executable;

    /// Create an empty user address space.
    fn new_user_aspace(&self) -> AxResult<Self::AddrSpace>;

    /// Make `aspace` the one the current CPU translates through.
    fn activate(&self, aspace: &Self::AddrSpace);

    /// Stop translating through the current user address space.
    fn deactivate(&self);

    fn open_executable(&self, path: &str) -> LinuxResult<Self::Executable>;

    /// Map the program image into `aspace`. Returns the entry point.
    fn load_executable(
        &self,
        aspace: &mut Self::AddrSpace,
        exe: &mut Self::Executable,
    ) -> LinuxResult<VirtAddr>;

    /// Schedule a new execution context for `task`, resuming user mode from
    /// `uctx`. A forked context resumes just past the trapping syscall.
    fn spawn_user_task(&self, task: TaskExt<Self>, uctx: Self::TrapFrame) -> AxResult;

    /// Drop to user mode at a new program. The current kernel stack is abandoned.
    fn enter_user(&self, entry: UserEntry) -> !;

    /// Detach the current execution context and never schedule it again.
    fn exit_current(&self, exit_code: i32) -> !;
}

/// Task extended data for the lifecycle syscalls.
pub struct TaskExt<P: Platform> {
    pid: Pid,
    process_data: Arc<ProcessData<P>>,
    kernel: Arc<Kernel<P>>,
}

impl<P: Platform> TaskExt<P> {
    pub fn new(pid: Pid, process_data: Arc<ProcessData<P>>, kernel: Arc<Kernel<P>>) -> Self {
        Self {
            pid,
            process_data,
            kernel,
        }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn process_data(&self) -> &Arc<ProcessData<P>> {
        &self.process_data
    }

    pub fn kernel(&self) -> &Arc<Kernel<P>> {
        &self.kernel
    }
}

impl<P: Platform> Drop for TaskExt<P> {
    fn drop(&mut self) {
        trace!("TaskExt of process {} drop.", self.pid);
    }
}
