//! Scripted transport for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::client::{BackendRequest, Endpoint, Transport, TransportError, TransportResult};

/// Records every request and answers from scripted queues.
///
/// Per-endpoint queues are consulted first, then the shared queue. An
/// exhausted script answers with `TransportError::Unreachable`.
#[derive(Default)]
pub struct MockTransport {
    shared: Mutex<VecDeque<TransportResult<String>>>,
    per_endpoint: Mutex<HashMap<Endpoint, VecDeque<TransportResult<String>>>>,
    requests: Mutex<Vec<BackendRequest>>,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_ok(&self, body: &str) {
        self.shared.lock().push_back(Ok(body.to_string()));
    }

    pub fn push_err(&self, error: TransportError) {
        self.shared.lock().push_back(Err(error));
    }

    pub fn push_for(&self, endpoint: Endpoint, response: TransportResult<String>) {
        self.per_endpoint
            .lock()
            .entry(endpoint)
            .or_default()
            .push_back(response);
    }

    /// Hold every response until the returned `Notify` is signalled.
    pub fn hold_responses(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock() = Some(Arc::clone(&gate));
        gate
    }

    pub fn requests(&self) -> Vec<BackendRequest> {
        self.requests.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn calls_to(&self, endpoint: Endpoint) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.endpoint == endpoint)
            .count()
    }

    fn next_response(&self, endpoint: Endpoint) -> TransportResult<String> {
        if let Some(queue) = self.per_endpoint.lock().get_mut(&endpoint) {
            if let Some(response) = queue.pop_front() {
                return response;
            }
        }
        self.shared
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::unreachable("no scripted response")))
    }
}

impl Transport for MockTransport {
    fn send(&self, request: BackendRequest) -> BoxFuture<'_, TransportResult<String>> {
        let endpoint = request.endpoint;
        self.requests.lock().push(request);
        let gate = self.gate.lock().clone();
        Box::pin(async move {
            if let Some(gate) = gate {
                gate.notified().await;
            }
            self.next_response(endpoint)
        })
    }
}
