//! End-to-end scenario 5 (spec §8): in single-binding SSE 1:1 mode, a
//! child crash is observed and carries the exit code the whole bridge
//! process would exit with. We don't actually call `process::exit` in a
//! test process; this asserts the two halves of that behavior
//! (exit-code capture, and when the coupling applies) independently.

use mcpbridge::child::Child;
use mcpbridge::orchestrator::couples_process_lifetime_to_child;
use std::time::Duration;

#[tokio::test]
async fn killed_child_exit_code_is_observable() {
    let child = Child::spawn("exit 7").expect("spawn exit 7");
    let mut exit_rx = child.exit_receiver();
    tokio::time::timeout(Duration::from_secs(5), exit_rx.changed()).await.unwrap().unwrap();
    let info = exit_rx.borrow().expect("exit info present");
    assert_eq!(info.process_exit_code(), 7);
}

#[tokio::test]
async fn unknown_exit_code_falls_back_to_one() {
    let child = Child::spawn("sleep 60").expect("spawn sleep");
    child.kill().await;
    let mut exit_rx = child.exit_receiver();
    tokio::time::timeout(Duration::from_secs(5), exit_rx.changed()).await.unwrap().unwrap();
    let info = exit_rx.borrow().expect("exit info present");
    // Killed by a signal rather than exiting normally: no `code`, so the
    // process-wide fallback of 1 applies.
    if info.code.is_none() {
        assert_eq!(info.process_exit_code(), 1);
    }
}

#[test]
fn coupling_only_applies_to_single_binding_sse_mode() {
    use mcpbridge::cli::OutputTransport;
    assert!(couples_process_lifetime_to_child(1, OutputTransport::Sse));
    assert!(!couples_process_lifetime_to_child(2, OutputTransport::Sse));
    assert!(!couples_process_lifetime_to_child(1, OutputTransport::StreamableHttp));
}
