//! A host-side [`Platform`] for testing the lifecycle syscalls: sparse paged
//! address spaces, an in-memory program store, spawned contexts captured for
//! inspection, and panic payloads standing in for the transfers that never
//! return.

use axerrno::{AxError, AxResult, LinuxError, LinuxResult};
use memory_addr::VirtAddr;
use procyon_core::config::{USER_STACK_SIZE, USER_STACK_TOP};
use procyon_core::entry::run_user_app;
use procyon_core::kernel::Kernel;
use procyon_core::mm::AddrSpace;
use procyon_core::task::{Platform, TaskExt, UserContext, UserEntry};
use procyon_process::{Pid, WaitQueue};
use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};

pub const PAGE_SIZE: usize = 0x1000;
/// Where programs are loaded.
pub const TEXT_BASE: usize = 0x40_0000;
/// Scratch pages tests use to stage syscall arguments.
pub const SCRATCH_BASE: usize = 0x1000_0000;
pub const SCRATCH_SIZE: usize = 40 * PAGE_SIZE;

static NEXT_ASPACE_ID: AtomicU64 = AtomicU64::new(1);

pub struct MockAddrSpace {
    id: u64,
    pages: BTreeMap<usize, Box<[u8; PAGE_SIZE]>>,
    fail_clone: Arc<AtomicBool>,
}

impl MockAddrSpace {
    fn new(fail_clone: Arc<AtomicBool>) -> Self {
        Self {
            id: NEXT_ASPACE_ID.fetch_add(1, Ordering::Relaxed),
            pages: BTreeMap::new(),
            fail_clone,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn map(&mut self, start: usize, size: usize) {
        let first = start / PAGE_SIZE * PAGE_SIZE;
        for page in (first..start + size).step_by(PAGE_SIZE) {
            self.pages
                .entry(page)
                .or_insert_with(|| Box::new([0; PAGE_SIZE]));
        }
    }

    pub fn is_mapped(&self, addr: usize) -> bool {
        self.pages.contains_key(&(addr / PAGE_SIZE * PAGE_SIZE))
    }

    fn for_each_chunk(
        &self,
        start: VirtAddr,
        len: usize,
        mut f: impl FnMut(usize, usize, usize, usize),
    ) -> AxResult {
        let mut addr = start.as_usize();
        let mut done = 0;
        while done < len {
            let page = addr / PAGE_SIZE * PAGE_SIZE;
            if !self.pages.contains_key(&page) {
                return Err(AxError::BadAddress);
            }
            let offset = addr - page;
            let chunk = (PAGE_SIZE - offset).min(len - done);
            f(page, offset, done, chunk);
            addr += chunk;
            done += chunk;
        }
        Ok(())
    }
}

impl AddrSpace for MockAddrSpace {
    fn clone_or_err(&self) -> AxResult<Self> {
        if self.fail_clone.load(Ordering::Acquire) {
            return Err(AxError::NoMemory);
        }
        Ok(Self {
            id: NEXT_ASPACE_ID.fetch_add(1, Ordering::Relaxed),
            pages: self.pages.clone(),
            fail_clone: self.fail_clone.clone(),
        })
    }

    fn define_stack(&mut self) -> AxResult<VirtAddr> {
        self.map(USER_STACK_TOP - USER_STACK_SIZE, USER_STACK_SIZE);
        Ok(USER_STACK_TOP.into())
    }

    fn read(&self, start: VirtAddr, buf: &mut [u8]) -> AxResult {
        let mut chunks = Vec::new();
        self.for_each_chunk(start, buf.len(), |page, offset, done, chunk| {
            chunks.push((page, offset, done, chunk))
        })?;
        for (page, offset, done, chunk) in chunks {
            buf[done..done + chunk].copy_from_slice(&self.pages[&page][offset..offset + chunk]);
        }
        Ok(())
    }

    fn write(&mut self, start: VirtAddr, buf: &[u8]) -> AxResult {
        let mut chunks = Vec::new();
        self.for_each_chunk(start, buf.len(), |page, offset, done, chunk| {
            chunks.push((page, offset, done, chunk))
        })?;
        for (page, offset, done, chunk) in chunks {
            let page = self.pages.get_mut(&page).expect("chunk page is mapped");
            page[offset..offset + chunk].copy_from_slice(&buf[done..done + chunk]);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MockTrapFrame {
    pub args: [usize; 4],
    pub ip: usize,
    pub sp: usize,
    pub retval: usize,
}

impl UserContext for MockTrapFrame {
    fn from_entry(entry: &UserEntry) -> Self {
        Self {
            args: [entry.argc, entry.argv.as_usize(), 0, 0],
            ip: entry.entry.as_usize(),
            sp: entry.sp.as_usize(),
            retval: 0,
        }
    }

    fn arg0(&self) -> usize {
        self.args[0]
    }

    fn arg1(&self) -> usize {
        self.args[1]
    }

    fn arg2(&self) -> usize {
        self.args[2]
    }

    fn ip(&self) -> usize {
        self.ip
    }

    fn sp(&self) -> usize {
        self.sp
    }

    fn set_retval(&mut self, value: usize) {
        self.retval = value;
    }
}

#[derive(Default)]
pub struct CondvarWaitQueue {
    lock: Mutex<()>,
    cond: Condvar,
}

impl WaitQueue for CondvarWaitQueue {
    fn wait_until<F: Fn() -> bool>(&self, condition: F) {
        let mut guard = self.lock.lock().unwrap();
        while !condition() {
            guard = self.cond.wait(guard).unwrap();
        }
    }

    fn notify_all(&self) {
        let _guard = self.lock.lock().unwrap();
        self.cond.notify_all();
    }
}

#[derive(Clone)]
pub struct MockProgram {
    pub entry: usize,
    pub image: Vec<u8>,
    /// `false` makes the loader reject the image.
    pub valid: bool,
}

pub struct MockExecutable(MockProgram);

/// Payload of the panic `enter_user` raises.
#[derive(Debug)]
pub struct EnteredUser(pub UserEntry);

/// Payload of the panic `exit_current` raises.
#[derive(Debug)]
pub struct ContextExited(pub i32);

pub struct MockPlatform {
    programs: Mutex<BTreeMap<String, MockProgram>>,
    fail_clone: Arc<AtomicBool>,
    fail_aspace: AtomicBool,
    fail_spawn: AtomicBool,
    active: Mutex<Option<u64>>,
    spawned: Mutex<Vec<(TaskExt<MockPlatform>, MockTrapFrame)>>,
}

impl MockPlatform {
    pub fn new() -> Self {
        let platform = Self {
            programs: Mutex::new(BTreeMap::new()),
            fail_clone: Arc::new(AtomicBool::new(false)),
            fail_aspace: AtomicBool::new(false),
            fail_spawn: AtomicBool::new(false),
            active: Mutex::new(None),
            spawned: Mutex::new(Vec::new()),
        };
        platform.install("/bin/init", 0x40_0100, true);
        platform.install("/bin/prog", 0x40_0200, true);
        platform.install("/bin/corrupt", 0, false);
        platform
    }

    pub fn install(&self, path: &str, entry: usize, valid: bool) {
        self.programs.lock().unwrap().insert(
            path.to_string(),
            MockProgram {
                entry,
                image: path.as_bytes().to_vec(),
                valid,
            },
        );
    }

    pub fn set_fail_clone(&self, fail: bool) {
        self.fail_clone.store(fail, Ordering::Release);
    }

    /// Make `new_user_aspace` run out of memory.
    pub fn set_fail_aspace(&self, fail: bool) {
        self.fail_aspace.store(fail, Ordering::Release);
    }

    pub fn set_fail_spawn(&self, fail: bool) {
        self.fail_spawn.store(fail, Ordering::Release);
    }

    pub fn active_aspace(&self) -> Option<u64> {
        *self.active.lock().unwrap()
    }

    /// Take the most recently spawned context.
    pub fn pop_spawned(&self) -> Option<(TaskExt<MockPlatform>, MockTrapFrame)> {
        self.spawned.lock().unwrap().pop()
    }

    pub fn spawned_count(&self) -> usize {
        self.spawned.lock().unwrap().len()
    }
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl Platform for MockPlatform {
    type AddrSpace = MockAddrSpace;
    type TrapFrame = MockTrapFrame;
    type WaitQueue = CondvarWaitQueue;
    type Executable = MockExecutable;

    fn new_user_aspace(&self) -> AxResult<MockAddrSpace> {
        if self.fail_aspace.load(Ordering::Acquire) {
            return Err(AxError::NoMemory);
        }
        Ok(MockAddrSpace::new(self.fail_clone.clone()))
    }

    fn activate(&self, aspace: &MockAddrSpace) {
        *self.active.lock().unwrap() = Some(aspace.id());
    }

    fn deactivate(&self) {
        *self.active.lock().unwrap() = None;
    }

    fn open_executable(&self, path: &str) -> LinuxResult<MockExecutable> {
        self.programs
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .map(MockExecutable)
            .ok_or(LinuxError::ENOENT)
    }

    fn load_executable(
        &self,
        aspace: &mut MockAddrSpace,
        exe: &mut MockExecutable,
    ) -> LinuxResult<VirtAddr> {
        if !exe.0.valid {
            return Err(LinuxError::ENOEXEC);
        }
        aspace.map(TEXT_BASE, exe.0.image.len().max(1));
        aspace.write(TEXT_BASE.into(), &exe.0.image)?;
        Ok(exe.0.entry.into())
    }

    fn spawn_user_task(&self, task: TaskExt<Self>, uctx: MockTrapFrame) -> AxResult {
        if self.fail_spawn.load(Ordering::Acquire) {
            return Err(AxError::NoMemory);
        }
        self.spawned.lock().unwrap().push((task, uctx));
        Ok(())
    }

    fn enter_user(&self, entry: UserEntry) -> ! {
        std::panic::panic_any(EnteredUser(entry))
    }

    fn exit_current(&self, exit_code: i32) -> ! {
        std::panic::panic_any(ContextExited(exit_code))
    }
}

pub type MockTask = TaskExt<MockPlatform>;

/// Boot a kernel and return the init process with scratch memory mapped.
pub fn boot() -> (Arc<Kernel<MockPlatform>>, MockTask, MockTrapFrame) {
    boot_kernel(Kernel::new(MockPlatform::new()))
}

pub fn boot_kernel(
    kernel: Kernel<MockPlatform>,
) -> (Arc<Kernel<MockPlatform>>, MockTask, MockTrapFrame) {
    let kernel = Arc::new(kernel);
    let pid = run_user_app(&kernel, &["/bin/init".to_string()]).expect("init starts");
    let (init, tf) = take_spawned(&kernel, pid);
    init.process_data()
        .addr_space()
        .as_mut()
        .unwrap()
        .map(SCRATCH_BASE, SCRATCH_SIZE);
    (kernel, init, tf)
}

/// Take the context spawned for `pid`, which must be the latest one.
pub fn take_spawned(kernel: &Kernel<MockPlatform>, pid: Pid) -> (MockTask, MockTrapFrame) {
    let (task, tf) = kernel.platform().pop_spawned().expect("a context was spawned");
    assert_eq!(task.pid(), pid);
    (task, tf)
}

/// Overwrite one entry of a pointer array staged by [`stage_argv`].
pub fn set_argv_entry(task: &MockTask, argv: usize, index: usize, ptr: usize) {
    write_user(task, argv + index * 4, &(ptr as u32).to_ne_bytes());
}

pub fn write_user(task: &MockTask, addr: usize, bytes: &[u8]) {
    task.process_data()
        .addr_space()
        .as_mut()
        .unwrap()
        .write(addr.into(), bytes)
        .unwrap();
}

pub fn read_user(task: &MockTask, addr: usize, len: usize) -> Vec<u8> {
    let mut buf = vec![0; len];
    task.process_data()
        .addr_space()
        .as_ref()
        .unwrap()
        .read(addr.into(), &mut buf)
        .unwrap();
    buf
}

pub fn read_user_word(task: &MockTask, addr: usize) -> u32 {
    u32::from_ne_bytes(read_user(task, addr, 4).try_into().unwrap())
}

pub fn read_user_cstr(task: &MockTask, addr: usize) -> String {
    let mut bytes = Vec::new();
    for offset in 0.. {
        let byte = read_user(task, addr + offset, 1)[0];
        if byte == 0 {
            break;
        }
        bytes.push(byte);
    }
    String::from_utf8(bytes).unwrap()
}

/// Stage `args` as C strings plus a NULL-terminated pointer array in scratch
/// memory. Returns `(path_ptr, argv_ptr)`; the path is `args[0]`.
pub fn stage_argv(task: &MockTask, args: &[&str]) -> (usize, usize) {
    let argv = SCRATCH_BASE;
    let mut cursor = SCRATCH_BASE + (args.len() + 1) * 4;
    let mut ptrs = Vec::new();
    for arg in args {
        write_user(task, cursor, arg.as_bytes());
        write_user(task, cursor + arg.len(), &[0]);
        ptrs.push(cursor as u32);
        cursor += arg.len() + 1;
    }
    ptrs.push(0);
    for (index, ptr) in ptrs.iter().enumerate() {
        write_user(task, argv + index * 4, &ptr.to_ne_bytes());
    }
    (ptrs[0] as usize, argv)
}

/// Run `f`, which must diverge through the mock, and return the panic payload.
pub fn expect_diverge<T: 'static, R>(f: impl FnOnce() -> R) -> T {
    let payload = match catch_unwind(AssertUnwindSafe(f)) {
        Ok(_) => panic!("call returned instead of diverging"),
        Err(payload) => payload,
    };
    *payload
        .downcast::<T>()
        .unwrap_or_else(|_| panic!("diverged with an unexpected payload"))
}
