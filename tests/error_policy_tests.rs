//! # Error Policy Tests
//!
//! Retry decisions for failed passes: terminal validation errors, Fibonacci
//! backoff for dependency failures, and reset after success.

mod common;

use common::{credential, key, Harness};
use kube_runtime::controller::Action;
use sql_credential_controller::backend::BackendError;
use sql_credential_controller::controller::reconciler::validation::ValidationError;
use sql_credential_controller::controller::reconciler::{reconcile, ReconcilerError};
use sql_credential_controller::runtime::error_policy::handle_reconciliation_error;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::fmt::MakeWriter;

/// Log sink shared between the subscriber and the test
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn text(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).expect("utf-8 logs")
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn backend_down() -> ReconcilerError {
    ReconcilerError::Backend(BackendError::UnsupportedDriver("mocked".to_string()))
}

#[test]
fn test_validation_errors_wait_for_spec_change() {
    let harness = Harness::new();
    let action = handle_reconciliation_error(
        Arc::new(credential("test", 0)),
        &ReconcilerError::Validation(ValidationError::Revision(0)),
        harness.reconciler.clone(),
    );
    assert_eq!(action, Action::await_change());
}

#[test]
fn test_dependency_errors_back_off_per_resource() {
    let harness = Harness::new();
    let failing = Arc::new(credential("test", 1));

    let delays: Vec<Action> = (0..4)
        .map(|_| {
            handle_reconciliation_error(failing.clone(), &backend_down(), harness.reconciler.clone())
        })
        .collect();
    assert_eq!(
        delays,
        vec![
            Action::requeue(Duration::from_secs(60)),
            Action::requeue(Duration::from_secs(60)),
            Action::requeue(Duration::from_secs(120)),
            Action::requeue(Duration::from_secs(180)),
        ]
    );

    let other = handle_reconciliation_error(
        Arc::new(credential("other", 1)),
        &backend_down(),
        harness.reconciler.clone(),
    );
    assert_eq!(other, Action::requeue(Duration::from_secs(60)));
}

#[test]
fn test_timeouts_are_retried() {
    let harness = Harness::new();
    let action = handle_reconciliation_error(
        Arc::new(credential("test", 1)),
        &ReconcilerError::Timeout(Duration::from_secs(60)),
        harness.reconciler.clone(),
    );
    assert_eq!(action, Action::requeue(Duration::from_secs(60)));
}

#[tokio::test]
async fn test_failed_pass_is_logged_once_at_error_level() {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let harness = Harness::new();
    harness.store.put_credential(credential("test", 1));
    harness.backend().failing_creates = 1;
    let resource = Arc::new(credential("test", 1));

    let error = reconcile(resource.clone(), harness.reconciler.clone())
        .await
        .expect_err("user creation fails");
    handle_reconciliation_error(resource, &error, harness.reconciler.clone());

    let output = logs.text();
    let error_lines = output.lines().filter(|line| line.contains(" ERROR ")).count();
    assert_eq!(error_lines, 1, "{output}");
}

#[tokio::test]
async fn test_successful_pass_resets_backoff() {
    let harness = Harness::new();
    harness.store.put_credential(credential("test", 1));
    let failing = Arc::new(credential("test", 1));

    for _ in 0..3 {
        handle_reconciliation_error(failing.clone(), &backend_down(), harness.reconciler.clone());
    }
    assert_eq!(
        harness.reconciler.next_backoff(&key("test")),
        Duration::from_secs(180)
    );

    reconcile(failing.clone(), harness.reconciler.clone())
        .await
        .expect("pass succeeds");

    let action = handle_reconciliation_error(failing, &backend_down(), harness.reconciler.clone());
    assert_eq!(action, Action::requeue(Duration::from_secs(60)));
    assert_eq!(
        harness.reconciler.next_backoff(&key("test")),
        Duration::from_secs(60),
        "sequence restarts from the minimum"
    );
}
