use crate::mm::AddrSpace;
use crate::task::Platform;
use alloc::string::String;
use alloc::vec::Vec;
use axerrno::{LinuxError, LinuxResult};
use spin::{Mutex, MutexGuard};

pub struct ProcessData<P: Platform> {
    /// The command line arguments
    pub command_line: Mutex<Vec<String>>,
    /// The virtual memory address space. `None` once the process has exited.
    addr_space: Mutex<Option<P::AddrSpace>>,
}

impl<P: Platform> ProcessData<P> {
    pub fn new(command_line: Vec<String>, addr_space: P::AddrSpace) -> Self {
        Self {
            command_line: Mutex::new(command_line),
            addr_space: Mutex::new(Some(addr_space)),
        }
    }

    pub fn addr_space(&self) -> MutexGuard<'_, Option<P::AddrSpace>> {
        self.addr_space.lock()
    }

    /// Duplicate the address space for a child.
    pub fn clone_addr_space(&self) -> LinuxResult<P::AddrSpace> {
        let addr_space = self.addr_space.lock();
        let addr_space = addr_space.as_ref().ok_or(LinuxError::EFAULT)?;
        Ok(addr_space.clone_or_err()?)
    }

    /// Install `new` and hand back the previous address space.
    pub fn replace_addr_space(&self, new: P::AddrSpace) -> Option<P::AddrSpace> {
        self.addr_space.lock().replace(new)
    }

    pub fn take_addr_space(&self) -> Option<P::AddrSpace> {
        self.addr_space.lock().take()
    }
}
