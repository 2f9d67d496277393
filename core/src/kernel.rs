use crate::task::Platform;
use core::ops::RangeInclusive;
use procyon_process::{Pid, ProcessTable};

/// The process-lifecycle service: the process table plus the platform it runs on.
pub struct Kernel<P: Platform> {
    platform: P,
    processes: ProcessTable<P::WaitQueue>,
}

impl<P: Platform> Kernel<P> {
    pub fn new(platform: P) -> Self {
        Self {
            platform,
            processes: ProcessTable::new(),
        }
    }

    /// Like [`Kernel::new`] with PIDs drawn from `pids`.
    pub fn with_pid_range(platform: P, pids: RangeInclusive<Pid>) -> Self {
        Self {
            platform,
            processes: ProcessTable::with_pid_range(pids),
        }
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn processes(&self) -> &ProcessTable<P::WaitQueue> {
        &self.processes
    }
}
