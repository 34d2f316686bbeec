use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::contract::{RenderError, RenderRequest, Renderer};

/// Pre-programmed outcomes for deterministic testing without a node process.
pub enum MockOutcome {
    Ok,
    /// Fail with the given diagnostics.
    Fail(String),
    /// Time out as if the child were killed.
    Timeout(Duration),
    /// Wait a duration, then yield the inner outcome.
    Delay(Duration, Box<MockOutcome>),
}

/// Mock renderer that records every request and replays outcomes in sequence.
/// Once outcomes run out, further calls succeed.
pub struct MockRenderer {
    outcomes: Mutex<Vec<MockOutcome>>,
    requests: Mutex<Vec<RenderRequest>>,
}

impl MockRenderer {
    pub fn new(outcomes: Vec<MockOutcome>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A renderer that always succeeds.
    pub fn succeeding() -> Self {
        Self::new(Vec::new())
    }

    /// A renderer whose first call fails with the given diagnostics.
    pub fn failing(diagnostics: impl Into<String>) -> Self {
        Self::new(vec![MockOutcome::Fail(diagnostics.into())])
    }

    /// Requests seen so far, in call order.
    pub fn requests(&self) -> Vec<RenderRequest> {
        self.requests.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl Renderer for MockRenderer {
    async fn render(&self, request: &RenderRequest) -> Result<(), RenderError> {
        self.requests.lock().push(request.clone());

        let mut outcome = {
            let mut outcomes = self.outcomes.lock();
            if outcomes.is_empty() {
                return Ok(());
            }
            outcomes.remove(0)
        };

        loop {
            match outcome {
                MockOutcome::Ok => return Ok(()),
                MockOutcome::Fail(diagnostics) => {
                    return Err(RenderError::Failed { diagnostics })
                }
                MockOutcome::Timeout(duration) => {
                    return Err(RenderError::Timeout(duration))
                }
                MockOutcome::Delay(duration, inner) => {
                    tokio::time::sleep(duration).await;
                    outcome = *inner;
                }
            }
        }
    }
}
