//! End-to-end dispatch tests: queues, executor, rate limiting, fault
//! isolation, and accounting, driven from a single thread for determinism.

use cmd_fabric::{
    fabric, monotonic_nanos, CallbackEnvelope, Command, DropReason, FabricConfig, HandlerResult,
    Outcome, Value, ValueMap, NO_CALLBACK,
};

fn command(kind: &str, payload: Value, agent: &str, callback_id: u64) -> Command {
    Command {
        kind: kind.to_string(),
        payload,
        agent_id: agent.to_string(),
        submitted_at: monotonic_nanos(),
        callback_id,
    }
}

fn msg_payload(msg: &str) -> Value {
    let mut map = ValueMap::new();
    map.insert("msg".to_string(), Value::from(msg));
    Value::Map(map)
}

fn collect_envelopes(callbacks: &cmd_fabric::CallbackConsumer) -> Vec<CallbackEnvelope> {
    let mut out = Vec::new();
    callbacks.drain(usize::MAX, |envelope| out.push(envelope));
    out
}

/// An echo handler that reflects `payload.msg` back as `reply`.
fn register_echo(handle: &cmd_fabric::ExecutorHandle) {
    handle.register_fn("echo", |payload| {
        let mut data = ValueMap::new();
        let msg = payload.get("msg").cloned().unwrap_or(Value::Null);
        data.insert("reply".to_string(), msg);
        HandlerResult::success(data)
    });
}

#[test]
fn test_happy_path() {
    let (mut executor, endpoint) = fabric(&FabricConfig::default());
    register_echo(&endpoint.handle);

    endpoint
        .commands
        .push(command("echo", msg_payload("hi"), "A", 1))
        .unwrap();

    assert_eq!(executor.run_once(monotonic_nanos(), 64), 1);

    let envelopes = collect_envelopes(&endpoint.callbacks);
    assert_eq!(envelopes.len(), 1);
    assert_eq!(envelopes[0].callback_id, 1);
    match &envelopes[0].outcome {
        Outcome::Success(data) => assert_eq!(data["reply"], Value::from("hi")),
        other => panic!("expected success, got {other:?}"),
    }

    let snap = endpoint.handle.snapshot();
    assert_eq!(snap.agent("A").submitted, 1);
    assert_eq!(snap.agent("A").executed, 1);
    assert_eq!(snap.kind("echo").executed, 1);
}

#[test]
fn test_unknown_command() {
    let (mut executor, endpoint) = fabric(&FabricConfig::default());

    endpoint
        .commands
        .push(command("nope", Value::Null, "A", 1))
        .unwrap();

    executor.run_once(monotonic_nanos(), 64);

    let envelopes = collect_envelopes(&endpoint.callbacks);
    assert_eq!(envelopes.len(), 1);
    assert_eq!(
        envelopes[0].outcome,
        Outcome::Dropped(DropReason::NoHandler)
    );
    assert_eq!(envelopes[0].outcome.error_text(), Some("no handler"));

    let snap = endpoint.handle.snapshot();
    assert_eq!(snap.agent("A").unhandled, 1);
    assert_eq!(snap.agent("A").executed, 0);
}

#[test]
fn test_rate_limit_denies_beyond_burst() {
    let config = FabricConfig::default().with_rate_limit(2);
    let (mut executor, endpoint) = fabric(&config);
    register_echo(&endpoint.handle);

    for i in 0..5 {
        endpoint
            .commands
            .push(command("echo", msg_payload("x"), "A", i + 1))
            .unwrap();
    }

    // One pass, one clock reading: the bucket holds exactly the burst.
    executor.run_once(monotonic_nanos(), 64);

    let envelopes = collect_envelopes(&endpoint.callbacks);
    assert_eq!(envelopes.len(), 5);

    let successes = envelopes
        .iter()
        .filter(|e| matches!(e.outcome, Outcome::Success(_)))
        .count();
    let limited = envelopes
        .iter()
        .filter(|e| e.outcome == Outcome::Dropped(DropReason::RateLimited))
        .count();
    assert_eq!(successes, 2);
    assert_eq!(limited, 3);

    // The first two in submission order are the ones that got through.
    assert!(matches!(envelopes[0].outcome, Outcome::Success(_)));
    assert!(matches!(envelopes[1].outcome, Outcome::Success(_)));

    let snap = endpoint.handle.snapshot();
    assert_eq!(snap.agent("A").rate_limited, 3);
    assert_eq!(snap.agent("A").executed, 2);
}

#[test]
fn test_handler_panic_is_isolated() {
    let (mut executor, endpoint) = fabric(&FabricConfig::default());
    register_echo(&endpoint.handle);
    endpoint
        .handle
        .register_fn("boom", |_payload| panic!("kaboom"));

    endpoint
        .commands
        .push(command("boom", Value::Null, "A", 1))
        .unwrap();
    executor.run_once(monotonic_nanos(), 64);

    let envelopes = collect_envelopes(&endpoint.callbacks);
    assert_eq!(envelopes.len(), 1);
    match &envelopes[0].outcome {
        Outcome::Dropped(DropReason::Panic(message)) => assert!(!message.is_empty()),
        other => panic!("expected panic drop, got {other:?}"),
    }

    let snap = endpoint.handle.snapshot();
    assert_eq!(snap.agent("A").failed, 1);
    assert_eq!(snap.kind("boom").failed, 1);

    // The executor is still alive and dispatching.
    endpoint
        .commands
        .push(command("echo", msg_payload("still here"), "A", 2))
        .unwrap();
    executor.run_once(monotonic_nanos(), 64);
    let envelopes = collect_envelopes(&endpoint.callbacks);
    assert!(matches!(envelopes[0].outcome, Outcome::Success(_)));
}

#[test]
fn test_handler_error_keeps_message_and_counts_failed() {
    let (mut executor, endpoint) = fabric(&FabricConfig::default());
    endpoint
        .handle
        .register_fn("reject", |_payload| HandlerResult::error("not today"));

    endpoint
        .commands
        .push(command("reject", Value::Null, "A", 1))
        .unwrap();
    executor.run_once(monotonic_nanos(), 64);

    let envelopes = collect_envelopes(&endpoint.callbacks);
    assert_eq!(envelopes[0].outcome, Outcome::Error("not today".to_string()));

    let snap = endpoint.handle.snapshot();
    assert_eq!(snap.agent("A").failed, 1);
    assert_eq!(snap.agent("A").executed, 0);
    assert_eq!(snap.kind("reject").failed, 1);
}

#[test]
fn test_command_queue_full_at_capacity_one() {
    let config = FabricConfig::default().with_command_queue_capacity(1);
    let (_executor, endpoint) = fabric(&config);

    endpoint
        .commands
        .push(command("echo", Value::Null, "A", 1))
        .unwrap();

    let rejected = endpoint
        .commands
        .push(command("echo", Value::Null, "A", 2))
        .unwrap_err();
    assert_eq!(rejected.0.callback_id, 2);
}

#[test]
fn test_hot_replace_takes_effect_next_pass() {
    let (mut executor, endpoint) = fabric(&FabricConfig::default());

    let version = |tag: &'static str| {
        move |_payload: &Value| {
            let mut data = ValueMap::new();
            data.insert("version".to_string(), Value::from(tag));
            HandlerResult::success(data)
        }
    };

    endpoint.handle.register_fn("get", version("v1"));
    endpoint
        .commands
        .push(command("get", Value::Null, "A", 1))
        .unwrap();
    executor.run_once(monotonic_nanos(), 64);

    endpoint.handle.register_fn("get", version("v2"));
    endpoint
        .commands
        .push(command("get", Value::Null, "A", 2))
        .unwrap();
    executor.run_once(monotonic_nanos(), 64);

    let envelopes = collect_envelopes(&endpoint.callbacks);
    let versions: Vec<_> = envelopes
        .iter()
        .map(|e| match &e.outcome {
            Outcome::Success(data) => data["version"].clone(),
            other => panic!("expected success, got {other:?}"),
        })
        .collect();
    assert_eq!(versions, vec![Value::from("v1"), Value::from("v2")]);
}

#[test]
fn test_register_idempotence_last_wins() {
    let (mut executor, endpoint) = fabric(&FabricConfig::default());

    endpoint
        .handle
        .register_fn("t", |_payload| HandlerResult::error("h1"));
    endpoint
        .handle
        .register_fn("t", |_payload| HandlerResult::error("h2"));

    endpoint
        .commands
        .push(command("t", Value::Null, "A", 1))
        .unwrap();
    executor.run_once(monotonic_nanos(), 64);

    let envelopes = collect_envelopes(&endpoint.callbacks);
    assert_eq!(envelopes[0].outcome, Outcome::Error("h2".to_string()));
}

#[test]
fn test_no_callback_produces_no_envelope() {
    let (mut executor, endpoint) = fabric(&FabricConfig::default());
    register_echo(&endpoint.handle);

    endpoint
        .commands
        .push(command("echo", msg_payload("quiet"), "A", NO_CALLBACK))
        .unwrap();
    assert_eq!(executor.run_once(monotonic_nanos(), 64), 1);

    assert!(collect_envelopes(&endpoint.callbacks).is_empty());

    let snap = endpoint.handle.snapshot();
    assert_eq!(snap.agent("A").executed, 1);
}

#[test]
fn test_zero_rate_limit_disables_denials() {
    let config = FabricConfig::default().with_rate_limit(0);
    let (mut executor, endpoint) = fabric(&config);
    register_echo(&endpoint.handle);

    for i in 0..200 {
        endpoint
            .commands
            .push(command("echo", msg_payload("x"), "A", i + 1))
            .unwrap();
    }
    executor.run_once(monotonic_nanos(), usize::MAX);

    let snap = endpoint.handle.snapshot();
    assert_eq!(snap.agent("A").rate_limited, 0);
    assert_eq!(snap.agent("A").executed, 200);
}

#[test]
fn test_budget_bounds_a_pass() {
    let (mut executor, endpoint) = fabric(&FabricConfig::default());
    register_echo(&endpoint.handle);

    for i in 0..10 {
        endpoint
            .commands
            .push(command("echo", msg_payload("x"), "A", i + 1))
            .unwrap();
    }

    assert_eq!(executor.run_once(monotonic_nanos(), 4), 4);
    assert_eq!(endpoint.commands.len(), 6);
    assert_eq!(executor.run_once(monotonic_nanos(), usize::MAX), 6);
}

#[test]
fn test_callback_router_overflow_counts_failed() {
    let config = FabricConfig::default().with_callback_queue_capacity(1);
    let (mut executor, endpoint) = fabric(&config);
    register_echo(&endpoint.handle);

    endpoint
        .commands
        .push(command("echo", msg_payload("a"), "A", 1))
        .unwrap();
    endpoint
        .commands
        .push(command("echo", msg_payload("b"), "A", 2))
        .unwrap();

    // Both dispatch in one pass; the second envelope finds the router full.
    assert_eq!(executor.run_once(monotonic_nanos(), 64), 2);

    let envelopes = collect_envelopes(&endpoint.callbacks);
    assert_eq!(envelopes.len(), 1);
    assert_eq!(envelopes[0].callback_id, 1);

    let snap = endpoint.handle.snapshot();
    assert_eq!(snap.agent("A").executed, 2);
    // The lost envelope is charged to the agent as a failure.
    assert_eq!(snap.agent("A").failed, 1);
}

#[test]
fn test_accounting_identity_per_agent() {
    let config = FabricConfig::default().with_rate_limit(4);
    let (mut executor, endpoint) = fabric(&config);
    register_echo(&endpoint.handle);
    endpoint
        .handle
        .register_fn("boom", |_payload| panic!("x"));

    // Mix of outcomes: executed, rate-limited, unhandled, failed.
    for i in 0..3 {
        endpoint
            .commands
            .push(command("echo", msg_payload("x"), "A", i + 1))
            .unwrap();
    }
    endpoint
        .commands
        .push(command("boom", Value::Null, "A", 10))
        .unwrap();
    endpoint
        .commands
        .push(command("missing", Value::Null, "A", 11))
        .unwrap();
    endpoint
        .commands
        .push(command("echo", msg_payload("x"), "A", 12))
        .unwrap();

    executor.run_once(monotonic_nanos(), usize::MAX);

    let snap = endpoint.handle.snapshot();
    let a = snap.agent("A");
    assert_eq!(
        a.submitted,
        a.executed + a.failed + a.rate_limited + a.unhandled
    );
    assert_eq!(a.submitted, 6);
    assert_eq!(a.executed, 3);
    assert_eq!(a.failed, 1);
    assert_eq!(a.unhandled, 1);
    assert_eq!(a.rate_limited, 1);
}

#[test]
fn test_ordering_is_fifo_per_agent() {
    let (mut executor, endpoint) = fabric(&FabricConfig::default());
    register_echo(&endpoint.handle);

    for i in 0..20 {
        endpoint
            .commands
            .push(command("echo", msg_payload(&format!("m{i}")), "A", i + 1))
            .unwrap();
    }
    executor.run_once(monotonic_nanos(), usize::MAX);

    let envelopes = collect_envelopes(&endpoint.callbacks);
    let ids: Vec<_> = envelopes.iter().map(|e| e.callback_id).collect();
    assert_eq!(ids, (1..=20).collect::<Vec<_>>());
}
