use core::hint::spin_loop;
use core::sync::atomic::{AtomicBool, Ordering};

/// Scheduler hook used to block a waiter.
///
/// The kernel backs this with its task wait queue; early boot code and tests
/// can use [`SpinWaitQueue`].
pub trait WaitQueue: Default + Send + Sync {
    /// Block the current thread of control until `condition` returns `true`.
    fn wait_until<F: Fn() -> bool>(&self, condition: F);

    /// Wake every thread blocked in [`WaitQueue::wait_until`].
    fn notify_all(&self);
}

/// Busy-waiting queue for contexts without a scheduler.
#[derive(Default)]
pub struct SpinWaitQueue;

impl WaitQueue for SpinWaitQueue {
    fn wait_until<F: Fn() -> bool>(&self, condition: F) {
        while !condition() {
            spin_loop();
        }
    }

    fn notify_all(&self) {}
}

/// One-shot event a parent blocks on until its child has exited.
///
/// Created together with the child's record and dropped with it. Only one
/// waiter may ever attach.
pub struct Completion<W> {
    done: AtomicBool,
    waiter_attached: AtomicBool,
    wq: W,
}

impl<W: WaitQueue> Completion<W> {
    pub fn new() -> Self {
        Self {
            done: AtomicBool::new(false),
            waiter_attached: AtomicBool::new(false),
            wq: W::default(),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    /// Claim the single waiter slot. Returns `false` if someone else holds it.
    pub fn attach_waiter(&self) -> bool {
        self.waiter_attached
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Give the waiter slot back, for a waiter that gives up after waking.
    pub fn detach_waiter(&self) {
        self.waiter_attached.store(false, Ordering::Release);
    }

    /// Block until [`Completion::complete`] has been called.
    pub fn wait(&self) {
        self.wq.wait_until(|| self.is_completed());
    }

    /// Release the waiter. Calling it twice is a bug in the caller.
    pub fn complete(&self) {
        let was_done = self.done.swap(true, Ordering::AcqRel);
        assert!(!was_done, "[process] completion released twice");
        self.wq.notify_all();
    }
}

impl<W: WaitQueue> Default for Completion<W> {
    fn default() -> Self {
        Self::new()
    }
}
