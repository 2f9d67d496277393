use axerrno::LinuxError;
use procyon_api::imp::task::*;
use procyon_api::interface::task::*;
use procyon_core::kernel::Kernel;
use procyon_core::task::Platform;
use procyon_mock::*;
use procyon_process::{ExitStatus, Pid};
use std::collections::BTreeSet;
use std::thread;
use std::time::Duration;

/// Fork `parent` and return the child's task and trap frame.
fn fork(parent: &MockTask, tf: &MockTrapFrame) -> (Pid, MockTask, MockTrapFrame) {
    let pid = sys_fork_impl(parent, tf).expect("fork succeeds");
    let (child, child_tf) = take_spawned(parent.kernel(), pid);
    (pid, child, child_tf)
}

#[test]
fn fork_returns_child_pid_to_parent_and_zero_to_child() {
    let (_kernel, init, mut tf) = boot();
    tf.ip = 0x40_1234;
    tf.retval = 99;

    let (pid, child, child_tf) = fork(&init, &tf);
    assert!(pid > 0);
    assert_ne!(pid, init.pid());
    assert_eq!(child_tf.retval, 0);
    assert_eq!(child_tf.ip, tf.ip);
    assert_eq!(child_tf.sp, tf.sp);

    assert_eq!(sys_getpid(&child), Ok(pid as isize));
    assert_eq!(sys_getppid(&child), Ok(init.pid() as isize));
    assert_eq!(sys_getppid(&init), Ok(0));
}

#[test]
fn child_memory_is_an_independent_copy() {
    let (_kernel, init, tf) = boot();
    write_user(&init, SCRATCH_BASE, b"parent");

    let (_, child, _) = fork(&init, &tf);
    assert_eq!(read_user(&child, SCRATCH_BASE, 6), b"parent");

    write_user(&child, SCRATCH_BASE, b"child!");
    assert_eq!(read_user(&init, SCRATCH_BASE, 6), b"parent");
    assert_eq!(
        *child.process_data().command_line.lock(),
        vec!["/bin/init".to_string()]
    );
}

#[test]
fn waitpid_returns_the_exact_exit_code() {
    let (_kernel, init, tf) = boot();
    let (pid, child, _) = fork(&init, &tf);

    exit_current_process(&child, 42);
    assert_eq!(
        sys_waitpid(&init, pid as i32, SCRATCH_BASE.into(), 0),
        Ok(pid as isize)
    );
    let status = read_user_word(&init, SCRATCH_BASE) as i32;
    assert_eq!(status, ExitStatus::Exited(42).to_wait_status());
    assert_eq!(
        ExitStatus::from_wait_status(status),
        Some(ExitStatus::Exited(42))
    );
}

#[test]
fn waitpid_blocks_until_the_child_exits() {
    let (_kernel, init, tf) = boot();
    let (pid, child, _) = fork(&init, &tf);

    thread::scope(|s| {
        s.spawn(|| {
            thread::sleep(Duration::from_millis(50));
            exit_current_process(&child, 7);
        });
        assert_eq!(
            sys_waitpid_impl(&init, pid as i32, 0.into()),
            Ok(ExitStatus::Exited(7))
        );
    });
}

#[test]
fn only_the_direct_parent_may_wait() {
    let (_kernel, init, tf) = boot();
    let (a, first, first_tf) = fork(&init, &tf);
    let (_, second, _) = fork(&init, &tf);
    let (grandchild, _, _) = fork(&first, &first_tf);

    assert_eq!(sys_waitpid(&second, a as i32, 0.into(), 0), Err(LinuxError::ECHILD));
    assert_eq!(
        sys_waitpid(&init, grandchild as i32, 0.into(), 0),
        Err(LinuxError::ECHILD)
    );
}

#[test]
fn reaped_child_cannot_be_waited_again() {
    let (_kernel, init, tf) = boot();
    let (pid, child, _) = fork(&init, &tf);
    exit_current_process(&child, 0);

    assert_eq!(sys_waitpid(&init, pid as i32, 0.into(), 0), Ok(pid as isize));
    assert_eq!(sys_waitpid(&init, pid as i32, 0.into(), 0), Err(LinuxError::ESRCH));
}

#[test]
fn waitpid_rejects_options_without_reaping() {
    let (_kernel, init, tf) = boot();
    let (pid, child, _) = fork(&init, &tf);
    exit_current_process(&child, 5);

    assert_eq!(
        sys_waitpid(&init, pid as i32, SCRATCH_BASE.into(), 1),
        Err(LinuxError::EINVAL)
    );
    assert_eq!(
        sys_waitpid(&init, pid as i32, SCRATCH_BASE.into(), 0x4000),
        Err(LinuxError::EINVAL)
    );
    assert_eq!(
        sys_waitpid_impl(&init, pid as i32, 0.into()),
        Ok(ExitStatus::Exited(5))
    );
}

#[test]
fn waitpid_on_unknown_pids_fails() {
    let (_kernel, init, _) = boot();
    assert_eq!(sys_waitpid(&init, 999, 0.into(), 0), Err(LinuxError::ESRCH));
    assert_eq!(sys_waitpid(&init, 0, 0.into(), 0), Err(LinuxError::ESRCH));
    assert_eq!(sys_waitpid(&init, -1, 0.into(), 0), Err(LinuxError::ESRCH));
}

#[test]
fn waitpid_with_bad_status_pointer_leaves_the_child_unreaped() {
    let (kernel, init, tf) = boot();
    let (pid, child, _) = fork(&init, &tf);
    exit_current_process(&child, 1);

    assert_eq!(
        sys_waitpid(&init, pid as i32, 0x2000_0000.into(), 0),
        Err(LinuxError::EFAULT)
    );
    assert!(kernel.processes().lock().lookup(pid).unwrap().is_exited());

    assert_eq!(
        sys_waitpid(&init, pid as i32, SCRATCH_BASE.into(), 0),
        Ok(pid as isize)
    );
    assert_eq!(
        read_user_word(&init, SCRATCH_BASE) as i32,
        ExitStatus::Exited(1).to_wait_status()
    );
    assert!(kernel.processes().lock().lookup(pid).is_none());
}

#[test]
fn exit_never_returns_and_tears_down_the_address_space() {
    let (kernel, init, tf) = boot();
    let (pid, child, _) = fork(&init, &tf);

    let ContextExited(code) = expect_diverge(|| sys_exit(&child, 3));
    assert_eq!(code, 3);
    assert!(child.process_data().addr_space().is_none());
    assert_eq!(kernel.platform().active_aspace(), None);
    assert!(kernel.processes().lock().lookup(pid).unwrap().is_exited());
    assert_eq!(
        sys_waitpid_impl(&init, pid as i32, 0.into()),
        Ok(ExitStatus::Exited(3))
    );
}

#[test]
fn parent_exit_reclaims_exited_children_and_orphans_running_ones() {
    let (kernel, init, tf) = boot();
    let (parent_pid, parent, parent_tf) = fork(&init, &tf);
    let (zombie_pid, zombie, _) = fork(&parent, &parent_tf);
    let (running_pid, running, _) = fork(&parent, &parent_tf);

    exit_current_process(&zombie, 1);
    exit_current_process(&parent, 0);
    assert!(kernel.processes().lock().lookup(zombie_pid).is_none());
    assert_eq!(sys_getppid(&running), Ok(0));
    assert_eq!(
        sys_waitpid(&init, running_pid as i32, 0.into(), 0),
        Err(LinuxError::ECHILD)
    );

    // the orphan keeps running and can still exit
    exit_current_process(&running, 2);
    assert!(kernel.processes().lock().lookup(running_pid).is_none());

    assert_eq!(

        sys_waitpid_impl(&init, parent_pid as i32, 0.into()),

        Ok(ExitStatus::Exited(0))

    );
}

#[test]
fn parentless_init_reclaims_itself() {
    let (kernel, init, _) = boot();
    exit_current_process(&init, 0);
    assert!(kernel.processes().lock().is_empty());
}

#[test]
fn fork_failures_leave_nothing_behind() {
    let (kernel, init, tf) = boot();
    let before = kernel.processes().lock().len();

    kernel.platform().set_fail_clone(true);
    assert_eq!(sys_fork(&init, &tf), Err(LinuxError::ENOMEM));
    kernel.platform().set_fail_clone(false);

    kernel.platform().set_fail_spawn(true);
    assert_eq!(sys_fork(&init, &tf), Err(LinuxError::ENOMEM));
    kernel.platform().set_fail_spawn(false);

    assert_eq!(kernel.processes().lock().len(), before);
    assert_eq!(kernel.platform().spawned_count(), 0);
    assert!(kernel.processes().lock().children_of(init.pid()).is_empty());

    let (pid, _, _) = fork(&init, &tf);
    assert_eq!(kernel.processes().lock().children_of(init.pid()), vec![pid]);
}

#[test]
fn fork_fails_when_the_process_table_is_full() {
    let (kernel, init, tf) = boot_kernel(Kernel::with_pid_range(MockPlatform::new(), 2..=3));
    assert_eq!(init.pid(), 2);
    let (pid, _, _) = fork(&init, &tf);
    assert_eq!(pid, 3);
    assert_eq!(sys_fork(&init, &tf), Err(LinuxError::EAGAIN));
    assert_eq!(kernel.platform().spawned_count(), 0);
}

#[test]
fn concurrent_forks_allocate_disjoint_pids() {
    let (kernel, init, tf) = boot();
    let (_, a, a_tf) = fork(&init, &tf);
    let (_, b, b_tf) = fork(&init, &tf);

    const FORKS: usize = 32;
    let (from_a, from_b) = thread::scope(|s| {
        let ta = s.spawn(|| {
            (0..FORKS)
                .map(|_| sys_fork_impl(&a, &a_tf).unwrap())
                .collect::<Vec<_>>()
        });
        let tb = s.spawn(|| {
            (0..FORKS)
                .map(|_| sys_fork_impl(&b, &b_tf).unwrap())
                .collect::<Vec<_>>()
        });
        (ta.join().unwrap(), tb.join().unwrap())
    });

    let all: BTreeSet<_> = from_a.iter().chain(from_b.iter()).copied().collect();
    assert_eq!(all.len(), 2 * FORKS);
    assert!(!all.contains(&a.pid()) && !all.contains(&b.pid()));
    assert_eq!(kernel.processes().lock().children_of(a.pid()).len(), FORKS);
    assert_eq!(kernel.platform().spawned_count(), 2 * FORKS);
}

#[test]
fn execv_replaces_the_image_and_builds_argv() {
    let (kernel, init, _) = boot();
    let old_space = init.process_data().addr_space().as_ref().unwrap().id();
    let (path, argv) = stage_argv(&init, &["/bin/prog", "a", "bb"]);

    let EnteredUser(entry) = expect_diverge(|| sys_execv(&init, path.into(), argv.into()));
    assert_eq!(entry.entry.as_usize(), 0x40_0200);
    assert_eq!(entry.argc, 3);
    assert_eq!(entry.sp, entry.argv);
    assert_eq!(entry.sp.as_usize() % 8, 0);

    let argv = entry.argv.as_usize();
    for (index, expected) in ["/bin/prog", "a", "bb"].iter().enumerate() {
        let ptr = read_user_word(&init, argv + index * 4) as usize;
        assert_eq!(read_user_cstr(&init, ptr), *expected);
    }
    assert_eq!(read_user_word(&init, argv + 12), 0);

    let addr_space = init.process_data().addr_space();
    let new_space = addr_space.as_ref().unwrap();
    assert_ne!(new_space.id(), old_space);
    assert!(!new_space.is_mapped(SCRATCH_BASE));
    assert_eq!(kernel.platform().active_aspace(), Some(new_space.id()));
    drop(addr_space);
    assert_eq!(
        *init.process_data().command_line.lock(),
        vec!["/bin/prog".to_string(), "a".to_string(), "bb".to_string()]
    );
}

#[test]
fn execv_with_65_arguments_is_too_big() {
    let (_kernel, init, _) = boot();
    let old_space = init.process_data().addr_space().as_ref().unwrap().id();
    let mut args = vec!["/bin/prog"];
    args.extend(std::iter::repeat_n("x", 64));
    let (path, argv) = stage_argv(&init, &args);

    assert_eq!(
        sys_execv(&init, path.into(), argv.into()),
        Err(LinuxError::E2BIG)
    );
    assert_eq!(init.process_data().addr_space().as_ref().unwrap().id(), old_space);
    assert_eq!(
        *init.process_data().command_line.lock(),
        vec!["/bin/init".to_string()]
    );
}

#[test]
fn execv_with_64_arguments_is_accepted() {
    let (_kernel, init, _) = boot();
    let mut args = vec!["/bin/prog"];
    args.extend(std::iter::repeat_n("x", 63));
    let (path, argv) = stage_argv(&init, &args);

    let EnteredUser(entry) = expect_diverge(|| sys_execv(&init, path.into(), argv.into()));
    assert_eq!(entry.argc, 64);
}

#[test]
fn execv_accepts_an_argument_of_exactly_1024_bytes() {
    let (_kernel, init, _) = boot();
    let longest = "y".repeat(1024);
    let (path, argv) = stage_argv(&init, &["/bin/prog", &longest]);

    let EnteredUser(entry) = expect_diverge(|| sys_execv(&init, path.into(), argv.into()));
    assert_eq!(entry.argc, 2);
    let ptr = read_user_word(&init, entry.argv.as_usize() + 4) as usize;
    assert_eq!(read_user_cstr(&init, ptr), longest);
}

#[test]
fn execv_with_a_1025_byte_argument_is_too_big() {
    let (_kernel, init, _) = boot();
    let long = "y".repeat(1025);
    let (path, argv) = stage_argv(&init, &["/bin/prog", &long]);
    assert_eq!(
        sys_execv(&init, path.into(), argv.into()),
        Err(LinuxError::E2BIG)
    );
}

#[test]
fn execv_fits_the_largest_argument_vector() {
    let (_kernel, init, _) = boot();
    let longest = "z".repeat(1024);
    let args = vec![longest.as_str(); 64];
    let (_, argv) = stage_argv(&init, &args);
    let path = SCRATCH_BASE + 0x2_0000;
    write_user(&init, path, b"/bin/prog\0");

    let EnteredUser(entry) = expect_diverge(|| sys_execv(&init, path.into(), argv.into()));
    assert_eq!(entry.argc, 64);
    assert_eq!(entry.sp.as_usize() % 8, 0);
}

#[test]
fn execv_out_of_memory_keeps_the_old_image() {
    let (kernel, init, _) = boot();
    write_user(&init, SCRATCH_BASE + 0x3000, b"still here");
    let old_space = init.process_data().addr_space().as_ref().unwrap().id();
    kernel
        .platform()
        .activate(init.process_data().addr_space().as_ref().unwrap());

    let (path, argv) = stage_argv(&init, &["/bin/prog", "a"]);
    kernel.platform().set_fail_aspace(true);
    assert_eq!(
        sys_execv(&init, path.into(), argv.into()),
        Err(LinuxError::ENOMEM)
    );
    kernel.platform().set_fail_aspace(false);

    assert_eq!(kernel.platform().active_aspace(), Some(old_space));
    assert_eq!(init.process_data().addr_space().as_ref().unwrap().id(), old_space);
    assert_eq!(read_user(&init, SCRATCH_BASE + 0x3000, 10), b"still here");
    assert_eq!(
        *init.process_data().command_line.lock(),
        vec!["/bin/init".to_string()]
    );
}

#[test]
fn execv_with_a_bad_argument_pointer_faults() {
    let (kernel, init, _) = boot();
    let old_space = init.process_data().addr_space().as_ref().unwrap().id();
    let (path, argv) = stage_argv(&init, &["/bin/prog", "a", "bb"]);
    set_argv_entry(&init, argv, 1, 0x2000_0000);

    assert_eq!(
        sys_execv(&init, path.into(), argv.into()),
        Err(LinuxError::EFAULT)
    );
    assert_eq!(kernel.platform().active_aspace(), None);
    assert_eq!(init.process_data().addr_space().as_ref().unwrap().id(), old_space);
    assert_eq!(
        *init.process_data().command_line.lock(),
        vec!["/bin/init".to_string()]
    );
}

#[test]
fn execv_failures_keep_the_old_image() {
    let (kernel, init, _) = boot();
    write_user(&init, SCRATCH_BASE + 0x3000, b"still here");
    let old_space = init.process_data().addr_space().as_ref().unwrap().id();

    let (path, argv) = stage_argv(&init, &["/bin/missing"]);
    assert_eq!(
        sys_execv(&init, path.into(), argv.into()),
        Err(LinuxError::ENOENT)
    );

    let (path, argv) = stage_argv(&init, &["/bin/corrupt"]);
    assert_eq!(
        sys_execv(&init, path.into(), argv.into()),
        Err(LinuxError::ENOEXEC)
    );
    assert_eq!(kernel.platform().active_aspace(), Some(old_space));

    assert_eq!(init.process_data().addr_space().as_ref().unwrap().id(), old_space);
    assert_eq!(read_user(&init, SCRATCH_BASE + 0x3000, 10), b"still here");
}

#[test]
fn execv_with_bad_pointers_faults() {
    let (_kernel, init, _) = boot();
    let (path, argv) = stage_argv(&init, &["/bin/prog"]);
    assert_eq!(sys_execv(&init, 0.into(), argv.into()), Err(LinuxError::EFAULT));
    assert_eq!(sys_execv(&init, path.into(), 0.into()), Err(LinuxError::EFAULT));
    assert_eq!(
        sys_execv(&init, 0x2000_0000.into(), argv.into()),
        Err(LinuxError::EFAULT)
    );
}

#[test]
fn forked_child_can_exec_independently() {
    let (_kernel, init, tf) = boot();
    let (pid, child, _) = fork(&init, &tf);
    let (path, argv) = stage_argv(&child, &["/bin/prog", "child"]);

    let EnteredUser(entry) = expect_diverge(|| sys_execv(&child, path.into(), argv.into()));
    assert_eq!(entry.argc, 2);
    // the parent image is untouched
    assert_eq!(read_user_cstr(&init, SCRATCH_BASE + 12), "");

    exit_current_process(&child, 9);
    assert_eq!(
        sys_waitpid_impl(&init, pid as i32, 0.into()),
        Ok(ExitStatus::Exited(9))
    );
}
