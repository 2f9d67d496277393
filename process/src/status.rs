/// How a process ended, as reported to its parent.
///
/// On the wire this is the OS/161 wait status: the low two bits carry the
/// tag and the remaining bits carry the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// The process called `_exit` with this code.
    Exited(i32),
    /// The process was terminated by this signal.
    Signaled(i32),
}

const WAIT_TAG_MASK: i32 = 0b11;
const WAIT_EXITED: i32 = 0;
const WAIT_SIGNALED: i32 = 1;

impl ExitStatus {
    /// Encode as the integer written to `waitpid`'s status pointer.
    pub const fn to_wait_status(self) -> i32 {
        match self {
            ExitStatus::Exited(code) => code.wrapping_shl(2) | WAIT_EXITED,
            ExitStatus::Signaled(sig) => sig.wrapping_shl(2) | WAIT_SIGNALED,
        }
    }

    /// Decode a wait status. Returns `None` for tags this kernel never produces
    /// (core dumps and stops).
    pub const fn from_wait_status(status: i32) -> Option<Self> {
        let value = status >> 2;
        match status & WAIT_TAG_MASK {
            WAIT_EXITED => Some(ExitStatus::Exited(value)),
            WAIT_SIGNALED => Some(ExitStatus::Signaled(value)),
            _ => None,
        }
    }

    pub const fn is_exited(&self) -> bool {
        matches!(self, ExitStatus::Exited(_))
    }

    /// The `_exit` code, if the process exited normally.
    pub const fn exit_code(&self) -> Option<i32> {
        match self {
            ExitStatus::Exited(code) => Some(*code),
            ExitStatus::Signaled(_) => None,
        }
    }
}
