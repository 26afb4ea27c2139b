//! Unit tests for the background task bridge

use super::common::{calls, init_test_logging, logged_loop, recorder};
use async_runtime::{EventLoop, Outcome, PromiseState, RuntimeConfig};
use core_types::{ErrorKind, Function, Value};
use crossbeam::channel;
use std::thread;
use std::time::Duration;

#[test]
fn successful_work_fulfills() {
    init_test_logging();
    let event_loop = EventLoop::new();
    let promise = event_loop
        .spawn_blocking(|| Outcome::Success(String::from("computed")))
        .unwrap();
    assert_eq!(event_loop.pending_background(), 1);

    event_loop.run_until_done().unwrap();
    assert_eq!(event_loop.state(&promise).unwrap(), PromiseState::Fulfilled);
    assert_eq!(event_loop.result(&promise).unwrap(), Some(Value::from("computed")));
    assert_eq!(event_loop.pending_background(), 0);
}

#[test]
fn failed_work_rejects_with_payload() {
    let (event_loop, log) = logged_loop();
    let promise = event_loop
        .spawn_blocking(|| Outcome::<i32>::failure(404))
        .unwrap();

    event_loop.run_until_done().unwrap();
    assert_eq!(event_loop.state(&promise).unwrap(), PromiseState::Rejected);
    assert_eq!(event_loop.result(&promise).unwrap(), Some(Value::Smi(404)));
    assert_eq!(log.unhandled(), vec![Value::Smi(404)]);
}

#[test]
fn success_carrying_failure_description_still_fulfills() {
    let event_loop = EventLoop::new();
    let promise = event_loop
        .spawn_blocking(|| Outcome::Success("error: not really"))
        .unwrap();
    event_loop.run_until_done().unwrap();
    assert_eq!(event_loop.state(&promise).unwrap(), PromiseState::Fulfilled);
}

#[test]
fn panicking_worker_rejects_with_internal_error() {
    let event_loop = EventLoop::new();
    let promise = event_loop
        .spawn_blocking(|| -> Outcome<i32> { panic!("worker crashed") })
        .unwrap();

    event_loop.run_until_done().unwrap();
    let reason = event_loop.result(&promise).unwrap().unwrap();
    let error = reason.as_error().unwrap();
    assert_eq!(error.kind, ErrorKind::InternalError);
    assert_eq!(error.message, "background work was abandoned before settling");
}

#[test]
fn reactions_run_after_background_settlement() {
    let event_loop = EventLoop::new();
    let seen = calls();
    let promise = event_loop
        .spawn_blocking(|| {
            thread::sleep(Duration::from_millis(20));
            Outcome::Success(7)
        })
        .unwrap();
    event_loop.then(&promise, Some(recorder(&seen)), None).unwrap();

    event_loop.run_until_done().unwrap();
    assert_eq!(*seen.borrow(), vec![Value::Smi(7)]);
}

#[test]
fn completer_settles_from_another_thread() {
    let event_loop = EventLoop::new();
    let (promise, completer) = event_loop.completer();
    assert_eq!(completer.promise_id(), promise.id());

    thread::spawn(move || completer.reject("remote failure"))
        .join()
        .unwrap();
    assert_eq!(event_loop.state(&promise).unwrap(), PromiseState::Pending);

    event_loop.perform_checkpoint().unwrap();
    assert_eq!(event_loop.result(&promise).unwrap(), Some(Value::from("remote failure")));
}

#[test]
fn many_workers_all_settle() {
    let event_loop = EventLoop::new();
    let promises: Vec<_> = (0..8)
        .map(|n| event_loop.spawn_blocking(move || Outcome::Success(n * n)).unwrap())
        .collect();

    event_loop.run_until_done().unwrap();
    for (n, promise) in promises.iter().enumerate() {
        let n = n as i32;
        assert_eq!(event_loop.result(promise).unwrap(), Some(Value::Smi(n * n)));
    }
}

#[test]
fn background_promise_survives_dropped_handle() {
    let event_loop = EventLoop::new();
    let seen = calls();
    let promise = event_loop
        .spawn_blocking(|| Outcome::Success(true))
        .unwrap();
    event_loop.then(&promise, Some(recorder(&seen)), None).unwrap();
    drop(promise);

    event_loop.perform_checkpoint().unwrap();
    event_loop.run_until_done().unwrap();
    assert_eq!(*seen.borrow(), vec![Value::Boolean(true)]);
}

#[test]
fn worker_threads_use_configured_name() {
    let config = RuntimeConfig {
        worker_thread_name: "promise-io".to_string(),
        ..RuntimeConfig::default()
    };
    let event_loop = EventLoop::with_config(config);
    let promise = event_loop
        .spawn_blocking(|| Outcome::Success(thread::current().name().unwrap_or("").to_string()))
        .unwrap();

    event_loop.run_until_done().unwrap();
    assert_eq!(event_loop.result(&promise).unwrap(), Some(Value::from("promise-io")));
}

#[test]
fn held_completer_does_not_block_run_until_done() {
    let event_loop = EventLoop::new();
    let (promise, completer) = event_loop.completer();

    event_loop.run_until_done().unwrap();
    assert_eq!(event_loop.state(&promise).unwrap(), PromiseState::Pending);
    assert_eq!(event_loop.pending_background(), 1);

    completer.fulfill(3);
    event_loop.run_until_done().unwrap();
    assert_eq!(event_loop.result(&promise).unwrap(), Some(Value::Smi(3)));
}

#[test]
fn completer_stuck_in_unreachable_reaction_does_not_block() {
    let event_loop = EventLoop::new();
    let (promise, completer) = event_loop.completer();
    let slot = std::cell::RefCell::new(Some(completer));
    let handler = Function::new("finish", move |_, _| {
        if let Some(completer) = slot.borrow_mut().take() {
            completer.fulfill(true);
        }
        Ok(Value::Undefined)
    });
    let never = event_loop.new_promise();
    event_loop.then(&never, Some(handler.into()), None).unwrap();

    event_loop.run_until_done().unwrap();
    assert_eq!(event_loop.state(&promise).unwrap(), PromiseState::Pending);
}

#[test]
fn run_until_idle_does_not_wait_for_workers() {
    let event_loop = EventLoop::new();
    let (go, wait) = channel::bounded::<()>(0);
    let promise = event_loop
        .spawn_blocking(move || {
            let _ = wait.recv();
            Outcome::Success(1)
        })
        .unwrap();

    event_loop.run_until_idle().unwrap();
    assert_eq!(event_loop.state(&promise).unwrap(), PromiseState::Pending);
    assert_eq!(event_loop.pending_workers(), 1);

    go.send(()).unwrap();
    event_loop.run_until_done().unwrap();
    assert_eq!(event_loop.result(&promise).unwrap(), Some(Value::Smi(1)));
    assert_eq!(event_loop.pending_workers(), 0);
}
