// Test doubles for the console API and renderer
use crate::application::console_api::{ConsoleApi, Resource};
use crate::application::renderer::ConsoleRenderer;
use crate::domain::console::Payload;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

enum Reply {
    Ready(anyhow::Result<Payload>),
    Gated(oneshot::Receiver<anyhow::Result<Payload>>),
    Hang,
}

/// Scripted console API. Replies are queued per resource; once a queue is
/// empty the fallback payload is served, or the request hangs.
#[derive(Default)]
pub struct FakeConsoleApi {
    replies: Mutex<HashMap<Resource, VecDeque<Reply>>>,
    fallback: Mutex<HashMap<Resource, Payload>>,
    calls: Mutex<Vec<(Resource, u64)>>,
    abandoned: AtomicUsize,
}

impl FakeConsoleApi {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, resource: Resource, reply: Reply) {
        self.replies
            .lock()
            .unwrap()
            .entry(resource)
            .or_default()
            .push_back(reply);
    }

    pub fn push_payload(&self, resource: Resource, payload: Payload) {
        self.push(resource, Reply::Ready(Ok(payload)));
    }

    pub fn push_failure(&self, resource: Resource, message: &'static str) {
        self.push(resource, Reply::Ready(Err(anyhow::anyhow!(message))));
    }

    pub fn push_hang(&self, resource: Resource) {
        self.push(resource, Reply::Hang);
    }

    pub fn push_gate(&self, resource: Resource) -> oneshot::Sender<anyhow::Result<Payload>> {
        let (tx, rx) = oneshot::channel();
        self.push(resource, Reply::Gated(rx));
        tx
    }

    pub fn set_fallback(&self, resource: Resource, payload: Payload) {
        self.fallback.lock().unwrap().insert(resource, payload);
    }

    pub fn calls(&self) -> Vec<(Resource, u64)> {
        self.calls.lock().unwrap().clone()
    }

    /// Requests dropped before they produced a reply.
    pub fn abandoned(&self) -> usize {
        self.abandoned.load(Ordering::SeqCst)
    }

    fn next_reply(&self, resource: Resource) -> Reply {
        let queued = self
            .replies
            .lock()
            .unwrap()
            .get_mut(&resource)
            .and_then(|queue| queue.pop_front());
        queued.unwrap_or_else(|| match self.fallback.lock().unwrap().get(&resource) {
            Some(payload) => Reply::Ready(Ok(payload.clone())),
            None => Reply::Hang,
        })
    }
}

struct InFlight<'a> {
    abandoned: &'a AtomicUsize,
    done: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.done {
            self.abandoned.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl ConsoleApi for FakeConsoleApi {
    async fn fetch(&self, resource: Resource, console_id: u64) -> anyhow::Result<Payload> {
        self.calls.lock().unwrap().push((resource, console_id));
        let reply = self.next_reply(resource);

        let mut in_flight = InFlight {
            abandoned: &self.abandoned,
            done: false,
        };
        let result = match reply {
            Reply::Ready(result) => result,
            Reply::Gated(rx) => match rx.await {
                Ok(result) => result,
                Err(_) => Err(anyhow::anyhow!("gate closed")),
            },
            Reply::Hang => std::future::pending().await,
        };
        in_flight.done = true;
        result
    }
}

/// Renderer that records every item list it receives.
#[derive(Clone, Default)]
pub struct RecordingRenderer {
    pub renders: Arc<Mutex<Vec<Vec<Value>>>>,
}

impl ConsoleRenderer for RecordingRenderer {
    fn update_elements(&mut self, items: &[Value]) {
        self.renders.lock().unwrap().push(items.to_vec());
    }
}
