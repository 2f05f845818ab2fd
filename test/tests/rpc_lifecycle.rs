use std::{io, time::Duration};

use ripple_shared::{
    Bindable, RdCall, RdEndpoint, RdError, RdTask, RdTaskResult, RpcError, RpcTimeouts,
};
use ripple_test::{assert_task_kind, init_logging, TestProtocols};

fn bound_pair(protocols: &TestProtocols, id: i64) -> (RdCall<i32, String>, RdEndpoint<i32, String>) {
    let call = RdCall::<i32, String>::new();
    let endpoint = RdEndpoint::<i32, String>::new();
    protocols.client.bind_static(&call, "describe", id).unwrap();
    protocols.server.bind_static(&endpoint, "describe", id).unwrap();
    (call, endpoint)
}

#[test]
fn call_completes_with_handler_response() {
    init_logging();
    let protocols = TestProtocols::new();
    let (call, endpoint) = bound_pair(&protocols, 20);
    endpoint.set(|value: i32| Ok::<_, io::Error>(format!("#{}", value)));

    let task = call.start(7).unwrap();
    assert!(!task.is_completed());
    assert_eq!(call.pending_count(), 1);

    protocols.exchange();
    assert_eq!(task.result(), Some(RdTaskResult::Success("#7".to_string())));
    assert_eq!(call.pending_count(), 0);
    assert_eq!(endpoint.pending_count(), 0);
}

#[test]
fn handler_error_becomes_fault() {
    init_logging();
    let protocols = TestProtocols::new();
    let (call, endpoint) = bound_pair(&protocols, 21);
    endpoint.set(|value: i32| {
        if value < 0 {
            Err(io::Error::new(io::ErrorKind::InvalidInput, "negative input"))
        } else {
            Ok(value.to_string())
        }
    });

    let task = call.start(-1).unwrap();
    protocols.exchange();

    assert_task_kind!(task, "Fault");
    match task.result() {
        Some(RdTaskResult::Fault(fault)) => {
            assert_eq!(fault.message, "negative input");
            assert!(fault.type_name.contains("io::error::Error"));
        }
        other => panic!("expected a fault, got {:?}", other),
    }
}

#[test]
fn panicking_handler_becomes_fault() {
    init_logging();
    let protocols = TestProtocols::new();
    let (call, endpoint) = bound_pair(&protocols, 22);
    endpoint.set_task_handler(|_, _| panic!("handler exploded"));

    let task = call.start(1).unwrap();
    protocols.exchange();

    match task.result() {
        Some(RdTaskResult::Fault(fault)) => {
            assert_eq!(fault.type_name, "panic");
            assert_eq!(fault.message, "handler exploded");
        }
        other => panic!("expected a fault, got {:?}", other),
    }
}

#[test]
fn missing_handler_becomes_fault() {
    init_logging();
    let protocols = TestProtocols::new();
    let (call, _endpoint) = bound_pair(&protocols, 23);

    let task = call.start(1).unwrap();
    protocols.exchange();

    assert_task_kind!(task, "Fault");
}

#[test]
fn unbinding_endpoint_cancels_pending_request() {
    init_logging();
    let protocols = TestProtocols::new();
    let (call, endpoint) = bound_pair(&protocols, 24);

    // never completes on its own
    endpoint.set_task_handler(|_, _| RdTask::new());

    let task = call.start(3).unwrap();
    protocols.exchange();
    assert!(!task.is_completed());
    assert_eq!(endpoint.pending_count(), 1);

    assert!(endpoint.unbind());
    protocols.exchange();

    assert_eq!(task.result(), Some(RdTaskResult::Cancelled));
    assert_eq!(endpoint.pending_count(), 0);
}

#[test]
fn deferred_response_is_sent_when_task_completes() {
    init_logging();
    let protocols = TestProtocols::new();
    let (call, endpoint) = bound_pair(&protocols, 25);

    let answer = RdTask::new();
    let handed_out = answer.clone();
    endpoint.set_task_handler(move |_, _| handed_out.clone());

    let task = call.start(4).unwrap();
    protocols.exchange();
    assert!(!task.is_completed());

    answer.set_if_empty(RdTaskResult::Success("later".to_string()));
    protocols.exchange();

    assert_eq!(task.result(), Some(RdTaskResult::Success("later".to_string())));
}

#[test]
fn unbinding_call_cancels_its_tasks() {
    init_logging();
    let protocols = TestProtocols::new();
    let (call, _endpoint) = bound_pair(&protocols, 26);

    let task = call.start(5).unwrap();
    assert!(call.unbind());

    assert_eq!(task.result(), Some(RdTaskResult::Cancelled));
}

#[test]
fn start_on_unbound_call_fails() {
    init_logging();
    let call = RdCall::<i32, String>::new();

    match call.start(1) {
        Err(RdError::Rpc(RpcError::NotBound { .. })) => {}
        other => panic!("expected NotBound, got {:?}", other.map(|task| task.result())),
    }
}

#[test]
fn sync_times_out_without_response() {
    init_logging();
    let protocols = TestProtocols::new();
    let (call, endpoint) = bound_pair(&protocols, 27);
    endpoint.set(|value: i32| Ok::<_, io::Error>(value.to_string()));

    // nothing pumps the server while the client blocks
    let timeouts = RpcTimeouts::new(Duration::from_millis(10), Duration::from_millis(40));
    match call.sync(1, timeouts) {
        Err(RdError::Rpc(RpcError::Timeout { millis, .. })) => assert!(millis >= 10),
        other => panic!("expected a timeout, got {:?}", other),
    }
    assert_eq!(call.pending_count(), 0);
}
