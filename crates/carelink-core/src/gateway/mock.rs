//! Scripted transport for tests and offline demos.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Notify;

use super::{OutboundRequest, Transport};
use crate::error::TransportFailure;

struct Scripted {
    outcome: Result<Value, TransportFailure>,
    gate: Option<Arc<Notify>>,
}

/// Transport that replays scripted outcomes in order and records every request.
///
/// When the script runs out, calls fail as if no response arrived.
#[derive(Default)]
pub struct MockTransport {
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<OutboundRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_response(&self, body: Value) {
        self.push(Ok(body), None);
    }

    pub fn push_failure(&self, failure: TransportFailure) {
        self.push(Err(failure), None);
    }

    /// Queue a response that is only delivered after `gate` is notified.
    pub fn push_gated_response(&self, body: Value, gate: Arc<Notify>) {
        self.push(Ok(body), Some(gate));
    }

    /// All requests sent so far, in order.
    pub fn requests(&self) -> Vec<OutboundRequest> {
        lock(&self.requests).clone()
    }

    pub fn last_request(&self) -> Option<OutboundRequest> {
        lock(&self.requests).last().cloned()
    }

    /// Scripted outcomes not yet consumed.
    pub fn remaining(&self) -> usize {
        lock(&self.script).len()
    }

    fn push(&self, outcome: Result<Value, TransportFailure>, gate: Option<Arc<Notify>>) {
        lock(&self.script).push_back(Scripted { outcome, gate });
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: OutboundRequest) -> Result<Value, TransportFailure> {
        lock(&self.requests).push(request);
        let next = lock(&self.script).pop_front();

        match next {
            Some(Scripted { outcome, gate }) => {
                if let Some(gate) = gate {
                    gate.notified().await;
                }
                outcome
            }
            None => Err(TransportFailure::NoResponse {
                reason: "no scripted response".into(),
            }),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
