//! Property tests for settlement and reaction ordering

use super::common::{calls, tagger};
use async_runtime::{EventLoop, PromiseState};
use core_types::Value;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Resolve(i32),
    Reject(i32),
    Drain,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        any::<i32>().prop_map(Op::Resolve),
        any::<i32>().prop_map(Op::Reject),
        Just(Op::Drain),
    ]
}

proptest! {
    #[test]
    fn state_changes_at_most_once(ops in prop::collection::vec(op(), 1..20)) {
        let event_loop = EventLoop::new();
        let promise = event_loop.new_promise();
        let mut first: Option<(PromiseState, i32)> = None;
        let mut observed = vec![PromiseState::Pending];

        for op in ops {
            match op {
                Op::Resolve(n) => {
                    event_loop.resolve(&promise, Value::Smi(n)).unwrap();
                    first.get_or_insert((PromiseState::Fulfilled, n));
                }
                Op::Reject(n) => {
                    event_loop.reject(&promise, Value::Smi(n)).unwrap();
                    first.get_or_insert((PromiseState::Rejected, n));
                }
                Op::Drain => event_loop.run_all_microtasks().unwrap(),
            }
            let state = event_loop.state(&promise).unwrap();
            if observed.last() != Some(&state) {
                observed.push(state);
            }
        }

        prop_assert!(observed.len() <= 2);
        if let Some((state, n)) = first {
            prop_assert_eq!(event_loop.state(&promise).unwrap(), state);
            prop_assert_eq!(event_loop.result(&promise).unwrap(), Some(Value::Smi(n)));
        }
    }

    #[test]
    fn reactions_run_in_registration_order(count in 1usize..16, settle_first in any::<bool>()) {
        let event_loop = EventLoop::new();
        let seen = calls();
        let promise = event_loop.new_promise();
        if settle_first {
            event_loop.resolve(&promise, Value::Null).unwrap();
        }
        for n in 0..count {
            event_loop
                .then(&promise, Some(tagger(&seen, &n.to_string())), None)
                .unwrap();
        }
        prop_assert!(seen.borrow().is_empty());
        event_loop.resolve(&promise, Value::Null).unwrap();
        event_loop.run_all_microtasks().unwrap();

        let expected: Vec<Value> = (0..count).map(|n| Value::from(n.to_string())).collect();
        prop_assert_eq!(seen.borrow().clone(), expected);
    }
}
