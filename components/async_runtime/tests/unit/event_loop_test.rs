//! Unit tests for the event loop

use super::common::{calls, init_test_logging, recorder, tagger};
use async_runtime::{EventLoop, MicroTask, RuntimeConfig, RuntimeError, Task};
use core_types::Value;
use std::cell::RefCell;
use std::rc::Rc;

#[test]
fn new_event_loop_has_empty_queues() {
    let event_loop = EventLoop::new();
    assert!(event_loop.is_task_queue_empty());
    assert!(event_loop.is_microtask_queue_empty());
    assert_eq!(event_loop.pending_background(), 0);
}

#[test]
fn tasks_run_in_fifo_order() {
    let event_loop = EventLoop::new();
    let log = Rc::new(RefCell::new(Vec::new()));
    for n in 0..3 {
        let log = log.clone();
        event_loop.enqueue_task(Task::new(move || {
            log.borrow_mut().push(n);
            Ok(())
        }));
    }
    event_loop.run_until_done().unwrap();
    assert_eq!(*log.borrow(), vec![0, 1, 2]);
}

#[test]
fn process_one_cycle_runs_one_task_then_reactions() {
    init_test_logging();
    let event_loop = EventLoop::new();
    let seen = calls();
    let promise = event_loop.new_promise();
    event_loop.then(&promise, Some(tagger(&seen, "reaction")), None).unwrap();

    let (el, p) = (event_loop.clone(), promise.clone());
    event_loop.enqueue_task(Task::new(move || el.resolve(&p, Value::Null)));
    let later = seen.clone();
    event_loop.enqueue_task(Task::new(move || {
        later.borrow_mut().push(Value::from("second task"));
        Ok(())
    }));

    event_loop.process_one_cycle().unwrap();
    assert_eq!(*seen.borrow(), vec![Value::from("reaction")]);
    assert!(!event_loop.is_task_queue_empty());

    event_loop.process_one_cycle().unwrap();
    assert_eq!(seen.borrow().len(), 2);
}

#[test]
fn reactions_queued_by_reactions_run_in_same_checkpoint() {
    let event_loop = EventLoop::new();
    let seen = calls();
    let promise = event_loop.promise_resolve(Value::Smi(0)).unwrap();
    let a = event_loop.then(&promise, None, None).unwrap();
    let b = event_loop.then(&a, None, None).unwrap();
    event_loop.then(&b, Some(recorder(&seen)), None).unwrap();

    event_loop.perform_checkpoint().unwrap();
    assert_eq!(*seen.borrow(), vec![Value::Smi(0)]);
    assert!(event_loop.is_microtask_queue_empty());
}

#[test]
fn task_error_propagates() {
    let event_loop = EventLoop::new();
    event_loop.enqueue_task(Task::new(|| Err(RuntimeError::Task("bad task".into()))));
    let err = event_loop.run_until_done().unwrap_err();
    assert_eq!(err.to_string(), "task failed: bad task");
}

#[test]
fn checkpoint_collects_dropped_promises() {
    let event_loop = EventLoop::new();
    let kept = event_loop.new_promise();
    let derived = event_loop.then(&kept, None, None).unwrap();
    drop(derived);
    drop(event_loop.new_promise());

    event_loop.perform_checkpoint().unwrap();
    // The pending reaction still owns the derived promise.
    assert_eq!(event_loop.live_promises(), 2);

    drop(kept);
    event_loop.perform_checkpoint().unwrap();
    assert_eq!(event_loop.live_promises(), 0);
}

#[test]
fn collection_can_be_left_to_the_host() {
    let config = RuntimeConfig {
        collect_at_checkpoint: false,
        ..RuntimeConfig::default()
    };
    let event_loop = EventLoop::with_config(config);
    drop(event_loop.new_promise());

    event_loop.perform_checkpoint().unwrap();
    assert_eq!(event_loop.live_promises(), 1);
    assert_eq!(event_loop.collect_garbage(), 1);
}

#[test]
fn microtask_enqueued_from_task_runs_before_next_task() {
    let event_loop = EventLoop::new();
    let seen = calls();
    let (el, first) = (event_loop.clone(), seen.clone());
    event_loop.enqueue_task(Task::new(move || {
        let inner = first.clone();
        el.enqueue_microtask(MicroTask::new(move || {
            inner.borrow_mut().push(Value::from("microtask"));
            Ok(())
        }));
        Ok(())
    }));
    let second = seen.clone();
    event_loop.enqueue_task(Task::new(move || {
        second.borrow_mut().push(Value::from("task 2"));
        Ok(())
    }));

    event_loop.run_until_done().unwrap();
    assert_eq!(*seen.borrow(), vec![Value::from("microtask"), Value::from("task 2")]);
}

#[test]
fn dropping_the_loop_with_queued_work_frees_it() {
    let event_loop = EventLoop::new();
    let weak = event_loop.downgrade();
    let promise = event_loop.promise_resolve(Value::Smi(1)).unwrap();
    event_loop.then(&promise, None, None).unwrap();

    drop(promise);
    drop(event_loop);
    assert!(weak.upgrade().is_none());
}
