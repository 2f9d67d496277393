use crate::config::{PID_MAX, PID_MIN};
use crate::{Pid, ProcessError};
use alloc::collections::BTreeSet;
use core::ops::RangeInclusive;

/// Hands out PIDs from a bounded range.
///
/// Allocation is next-fit: the search starts after the last PID handed out
/// and wraps around, so a released PID is not reused right away.
pub struct PidAllocator {
    range: RangeInclusive<Pid>,
    next: Pid,
    in_use: BTreeSet<Pid>,
}

impl PidAllocator {
    pub fn new(range: RangeInclusive<Pid>) -> Self {
        assert!(
            !range.is_empty() && *range.start() > 0,
            "[process] invalid pid range {:?}",
            range
        );
        Self {
            next: *range.start(),
            range,
            in_use: BTreeSet::new(),
        }
    }

    pub fn alloc(&mut self) -> Result<Pid, ProcessError> {
        let (start, end) = (*self.range.start(), *self.range.end());
        let capacity = (end - start) as usize + 1;
        if self.in_use.len() >= capacity {
            return Err(ProcessError::PidExhausted);
        }
        let mut pid = self.next;
        while self.in_use.contains(&pid) {
            pid = if pid == end { start } else { pid + 1 };
        }
        self.in_use.insert(pid);
        self.next = if pid == end { start } else { pid + 1 };
        Ok(pid)
    }

    /// Return a PID to the pool. Releasing a free PID is a no-op.
    pub fn release(&mut self, pid: Pid) {
        self.in_use.remove(&pid);
    }

    pub fn is_allocated(&self, pid: Pid) -> bool {
        self.in_use.contains(&pid)
    }

    pub fn allocated(&self) -> usize {
        self.in_use.len()
    }
}

impl Default for PidAllocator {
    fn default() -> Self {
        Self::new(PID_MIN..=PID_MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_pid_min() {
        let mut pids = PidAllocator::default();
        assert_eq!(pids.alloc(), Ok(PID_MIN));
        assert_eq!(pids.alloc(), Ok(PID_MIN + 1));
    }

    #[test]
    fn released_pid_is_not_reused_immediately() {
        let mut pids = PidAllocator::new(2..=5);
        let first = pids.alloc().unwrap();
        pids.release(first);
        assert_ne!(pids.alloc().unwrap(), first);
    }

    #[test]
    fn exhaustion_and_wraparound() {
        let mut pids = PidAllocator::new(2..=4);
        assert_eq!(pids.alloc(), Ok(2));
        assert_eq!(pids.alloc(), Ok(3));
        assert_eq!(pids.alloc(), Ok(4));
        assert_eq!(pids.alloc(), Err(ProcessError::PidExhausted));

        pids.release(3);
        assert_eq!(pids.alloc(), Ok(3));
        assert!(pids.is_allocated(3));
        assert_eq!(pids.allocated(), 3);
    }
}
