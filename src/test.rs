//! This provides testing functionality for building tests.
//!
//! **Feature:** `test` (*disabled by default*)
//!
//! If the crate has been compiled with the test support feature this module
//! becomes available and provides a scripted in-memory collector.
//!
//! # Example usage
//!
//! ```
//! use monitor_probe::protocol::Record;
//! use monitor_probe::test::TestTransport;
//! use monitor_probe::Transport;
//!
//! let transport = TestTransport::new();
//! transport.respond_with(vec![("session", "S1")].into_iter().collect());
//!
//! let response = transport.send_record(&Record::new()).unwrap();
//! assert_eq!(response.get("session"), Some("S1"));
//! assert_eq!(transport.request_count(), 1);
//! ```

use std::collections::VecDeque;
use std::net::TcpListener;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use crate::error::PushError;
use crate::protocol::Record;
use crate::transport::Transport;

/// Answers pushes from a script instead of a collector.
///
/// Every request is recorded. Responses are handed out in the order they
/// were scripted; once the script runs dry every push gets an empty record.
///
/// # Examples
///
/// ```
/// use monitor_probe::test::TestTransport;
/// use monitor_probe::ProbeOptions;
/// use std::sync::Arc;
///
/// let transport = TestTransport::new();
/// let _options = ProbeOptions {
///     endpoint: Some("http://127.0.0.1:1/push".into()),
///     transport: Some(Arc::new(transport.clone())),
///     ..ProbeOptions::default()
/// };
/// ```
pub struct TestTransport {
    script: Mutex<VecDeque<Result<Record, PushError>>>,
    requests: Mutex<Vec<Record>>,
    signal: Condvar,
}

impl TestTransport {
    /// Creates a new test transport.
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> Arc<TestTransport> {
        Arc::new(TestTransport {
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(vec![]),
            signal: Condvar::new(),
        })
    }

    /// Queues a response record.
    pub fn respond_with(&self, response: Record) {
        self.script.lock().unwrap().push_back(Ok(response));
    }

    /// Queues a failure.
    pub fn fail_with(&self, err: PushError) {
        self.script.lock().unwrap().push_back(Err(err));
    }

    /// Returns the number of pushes seen so far.
    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Fetches and clears the recorded requests.
    pub fn fetch_and_clear_requests(&self) -> Vec<Record> {
        let mut guard = self.requests.lock().unwrap();
        std::mem::take(&mut *guard)
    }

    /// Blocks until at least `count` pushes were seen or `timeout` passed.
    ///
    /// Returns the number of pushes seen.
    pub fn wait_for_requests(&self, count: usize, timeout: Duration) -> usize {
        let guard = self.requests.lock().unwrap();
        let (guard, _) = self
            .signal
            .wait_timeout_while(guard, timeout, |requests| requests.len() < count)
            .unwrap();
        guard.len()
    }
}

impl Transport for TestTransport {
    fn send_record(&self, request: &Record) -> Result<Record, PushError> {
        self.requests.lock().unwrap().push(request.clone());
        self.signal.notify_all();
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Record::new()))
    }
}

/// Binds a local listener to stand in for the collector's address.
///
/// The probe connects to its endpoint once to learn its local address. The
/// listener only has to stay alive; nothing ever reads from it.
pub fn local_endpoint() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let endpoint = format!("http://{}/push", listener.local_addr().unwrap());
    (listener, endpoint)
}
