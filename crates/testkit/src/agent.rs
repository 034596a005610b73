use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use oxrdf::NamedNode;

use kleio_core::{AgentClient, KleioError, KleioResult};

/// Scripted agent: queued responses are returned in order, every call is
/// counted and the last inputs are recorded for assertions.
#[derive(Default)]
pub struct StubAgent {
    responses: Mutex<Vec<Vec<NamedNode>>>,
    last_inputs: Mutex<Vec<NamedNode>>,
    calls: AtomicUsize,
    failing: AtomicBool,
}

impl StubAgent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_response(&self, outputs: Vec<NamedNode>) {
        self.responses.lock().expect("responses mutex").push(outputs);
    }

    /// Make every further call fail with an agent error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_inputs(&self) -> Vec<NamedNode> {
        self.last_inputs.lock().expect("inputs mutex").clone()
    }
}

#[async_trait]
impl AgentClient for StubAgent {
    async fn call(&self, url: &str, inputs: &[NamedNode]) -> KleioResult<Vec<NamedNode>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_inputs.lock().expect("inputs mutex") = inputs.to_vec();
        if self.failing.load(Ordering::SeqCst) {
            return Err(KleioError::agent(format!("injected failure calling {url}")));
        }
        let mut responses = self.responses.lock().expect("responses mutex");
        if responses.is_empty() {
            Ok(Vec::new())
        } else {
            Ok(responses.remove(0))
        }
    }
}
