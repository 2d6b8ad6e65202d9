//! Task tree behaviour: terminal states, parents waiting for children,
//! cancellation and error propagation, outcome observers.

use parking_lot::Mutex;
use proptest::prelude::*;
use sagasync::effect::{cancel, delay_ticks, fork_with, join, put, take};
use sagasync::saga::{self, Step};
use sagasync::test_utils::{TestStore, init_test_logging, run_until};
use sagasync::{
    CancelKind, Error, ErrorKind, ReturnData, SagaFn, SagaMiddleware, SchedulerConfig, TaskHandle,
    TaskState, Value,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

type Mw = SagaMiddleware<u32, u32>;

fn middleware(config: SchedulerConfig) -> Mw {
    let store = Arc::new(TestStore::new(0_u32, |s: &u32, a: &u32| s + a));
    SagaMiddleware::<u32, u32>::new(store, config).expect("config")
}

fn waits_forever() -> SagaFn<u32, u32> {
    saga::saga_fn(|_: &[Value]| saga::once(take(|_: &u32| false)))
}

fn sleeps(ticks: usize) -> SagaFn<u32, u32> {
    saga::saga_fn(move |_: &[Value]| saga::from_iter([delay_ticks(ticks)]))
}

fn terminal_flags(task: &TaskHandle) -> [bool; 3] {
    [task.is_completed(), task.is_canceled(), task.is_error()]
}

#[test]
fn parent_completes_on_the_step_after_its_last_child() {
    init_test_logging();
    sagasync::test_phase!("parent_completes_on_the_step_after_its_last_child");
    let mut mw = middleware(SchedulerConfig::default());
    let child = ReturnData::new();
    let parent = mw
        .run(saga::once(fork_with(sleeps(3), Vec::new(), child.clone())))
        .expect("run");
    mw.tick();
    mw.tick();
    let child = child.get().expect("child handle");

    while !child.is_terminal() {
        assert!(!parent.is_completed(), "parent completed with a live child");
        mw.tick();
    }
    assert!(child.is_completed());
    if !parent.is_completed() {
        mw.tick();
    }
    assert!(parent.is_completed());
    sagasync::test_complete!("parent_completes_on_the_step_after_its_last_child");
}

#[test]
fn cancelling_a_parent_cancels_its_subtree() {
    init_test_logging();
    let mut mw = middleware(SchedulerConfig::default());
    let child = ReturnData::new();
    let grandchild = ReturnData::new();
    let gc_cell = grandchild.clone();
    let middle = saga::saga_fn(move |_: &[Value]| {
        saga::from_iter([
            fork_with(waits_forever(), Vec::new(), gc_cell.clone()).into(),
            take(|_: &u32| false).into(),
        ])
    });
    let root = mw
        .run(saga::from_iter([
            fork_with(middle, Vec::new(), child.clone()).into(),
            take(|_: &u32| false).into(),
        ]))
        .expect("run");
    for _ in 0..4 {
        mw.tick();
    }
    let child = child.get().expect("child");
    let grandchild = grandchild.get().expect("grandchild");
    assert_eq!(mw.stats().live_tasks, 3);

    assert!(root.cancel());
    run_until(&mut mw, 5, SagaMiddleware::is_idle);
    for task in [&root, &child, &grandchild] {
        assert!(task.is_canceled(), "{task:?} not canceled");
    }
    assert_eq!(child.cancel_reason().map(|r| r.kind()), Some(CancelKind::ParentCancelled));
    assert_eq!(root.cancel_reason().map(|r| r.kind()), Some(CancelKind::User));
}

#[test]
fn cancel_effect_targets_a_sibling() {
    init_test_logging();
    let mut mw = middleware(SchedulerConfig::default());
    let victim = mw.run(saga::once(take(|_: &u32| false))).expect("run");
    let killer = mw.run(saga::once(cancel(victim.clone()))).expect("run");
    mw.tick();
    mw.tick();
    assert!(killer.is_completed());
    assert!(victim.is_cancel_requested());
    mw.tick();
    assert!(victim.is_canceled());
}

#[test]
fn root_error_cancels_live_children() {
    init_test_logging();
    let mut mw = middleware(SchedulerConfig::default());
    let child = ReturnData::new();
    let root = mw
        .run(saga::from_try_iter([
            Ok(fork_with(waits_forever(), Vec::new(), child.clone()).into()),
            Err(Error::saga("root gave up")),
        ]))
        .expect("run");
    mw.tick();
    mw.tick();
    assert!(root.is_error());
    let child = child.get().expect("child");
    assert!(child.is_cancel_requested());
    assert_eq!(child.cancel_reason().map(|r| r.kind()), Some(CancelKind::ParentErrored));
    mw.tick();
    assert!(child.is_canceled());
    assert!(mw.is_idle());
}

#[test]
fn child_error_leaves_parent_running_and_join_does_not_raise() {
    init_test_logging();
    let mut mw = middleware(SchedulerConfig::default());
    let failing = saga::saga_fn(|_: &[Value]| {
        saga::from_fn(|| Step::<u32, u32>::Faulted(Error::saga("child failed")))
    });
    let child = ReturnData::new();
    let joined = child.clone();
    let mut stage = 0;
    let parent = mw
        .run(saga::from_fn(move || {
            stage += 1;
            match stage {
                1 => Step::effect(fork_with(failing.clone(), Vec::new(), child.clone())),
                2 => Step::effect(join(child.get().unwrap_or_else(TaskHandle::detached))),
                3 => Step::effect(put(1)),
                _ => Step::Done,
            }
        }))
        .expect("run");
    run_until(&mut mw, 10, SagaMiddleware::is_idle);
    let child = joined.get().expect("child");
    assert!(child.is_error());
    assert_eq!(child.error().map(|e| e.kind()), Some(ErrorKind::Saga));
    assert!(parent.is_completed(), "join on an errored task resumes normally");
}

#[test]
fn observers_fire_once_with_the_outcome() {
    init_test_logging();
    let mut mw = middleware(SchedulerConfig::default());
    let completed = Arc::new(AtomicUsize::new(0));
    let errors = Arc::new(Mutex::new(Vec::new()));

    let ok = mw.run(saga::once(put(1))).expect("run");
    let counter = Arc::clone(&completed);
    ok.on_completed(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let bad = mw
        .run(saga::from_fn(|| Step::<u32, u32>::Faulted(Error::saga("nope"))))
        .expect("run");
    let sink = Arc::clone(&errors);
    bad.on_error(move |err| sink.lock().push(err.kind()));

    run_until(&mut mw, 5, SagaMiddleware::is_idle);
    let late = Arc::clone(&completed);
    ok.on_completed(move || {
        late.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(completed.load(Ordering::SeqCst), 2, "late observers fire immediately");
    assert_eq!(*errors.lock(), vec![ErrorKind::Saga]);
}

#[test]
fn live_task_limit_fails_the_forking_task() {
    init_test_logging();
    let mut mw = middleware(SchedulerConfig::default().with_max_live_tasks(Some(2)));
    let root = mw
        .run(saga::from_iter([
            fork_with(waits_forever(), Vec::new(), ReturnData::new()).into(),
            fork_with(waits_forever(), Vec::new(), ReturnData::new()).into(),
        ]))
        .expect("run");
    mw.tick();
    mw.tick();
    assert_eq!(root.error().map(|e| e.kind()), Some(ErrorKind::CapacityExceeded));
    run_until(&mut mw, 5, SagaMiddleware::is_idle);
}

#[derive(Debug, Clone)]
enum Op {
    Cancel,
    Fail,
    Tick,
    Resolve,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![Just(Op::Cancel), Just(Op::Fail), Just(Op::Tick), Just(Op::Resolve)]
}

proptest! {
    #[test]
    fn terminal_outcome_never_changes(ops in proptest::collection::vec(op(), 1..24)) {
        let mut mw = middleware(SchedulerConfig::default());
        let task = mw.run(saga::once(take(|a: &u32| *a == 1))).expect("run");
        mw.tick();
        let mut settled: Option<TaskState> = None;
        for op in ops {
            match op {
                Op::Cancel => { task.cancel(); }
                Op::Fail => { task.set_error(Error::saga("injected")); }
                Op::Tick => mw.tick(),
                Op::Resolve => { mw.dispatch(1); }
            }
            let flags = terminal_flags(&task);
            prop_assert!(flags.iter().filter(|f| **f).count() <= 1);
            if let Some(state) = settled {
                prop_assert_eq!(task.state(), state);
            } else if task.is_terminal() {
                settled = Some(task.state());
            }
        }
    }
}
