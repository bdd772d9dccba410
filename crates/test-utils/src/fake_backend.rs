use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tsrun::build::{BuildBackend, BuildEvent, BuildFailure};
use tsrun::engine::RuntimeEvent;
use tsrun::errors::Result;
use tsrun::types::CycleId;

/// A scripted build backend that:
/// - records which cycles were submitted
/// - answers each submission with the next scripted batch of `BuildEvent`s
///   (the last batch repeats once the script runs out).
pub struct FakeBuildBackend {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    script: VecDeque<Vec<BuildEvent>>,
    last: Vec<BuildEvent>,
    delay: Duration,
    submitted: Arc<Mutex<Vec<CycleId>>>,
}

impl FakeBuildBackend {
    pub fn new(runtime_tx: mpsc::Sender<RuntimeEvent>) -> Self {
        Self {
            runtime_tx,
            script: VecDeque::new(),
            last: vec![succeeded()],
            delay: Duration::ZERO,
            submitted: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Events answering the next submission, in order.
    pub fn then(mut self, events: Vec<BuildEvent>) -> Self {
        self.script.push_back(events);
        self
    }

    /// Wait before delivering each batch.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Shared record of submitted cycles.
    pub fn submitted(&self) -> Arc<Mutex<Vec<CycleId>>> {
        Arc::clone(&self.submitted)
    }
}

impl BuildBackend for FakeBuildBackend {
    fn submit(
        &mut self,
        cycle: CycleId,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        self.submitted.lock().unwrap().push(cycle);

        let events = match self.script.pop_front() {
            Some(events) => {
                self.last = events.clone();
                events
            }
            None => self.last.clone(),
        };
        let tx = self.runtime_tx.clone();
        let delay = self.delay;

        Box::pin(async move {
            // Deliver from a separate task: the runtime is the receiver.
            tokio::spawn(async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                for event in events {
                    if tx.send(RuntimeEvent::Build { cycle, event }).await.is_err() {
                        return;
                    }
                }
            });
            Ok(())
        })
    }
}

/// A successful compilation.
pub fn succeeded() -> BuildEvent {
    BuildEvent::Succeeded {
        elapsed_ms: 5,
        output: String::new(),
    }
}

/// A compilation failure carrying `message` as diagnostics.
pub fn failed(message: &str) -> BuildEvent {
    BuildEvent::Failed(BuildFailure::diagnostics(message, Some(5)))
}

/// A type check completion.
pub fn type_checked(diagnostics: Option<&str>) -> BuildEvent {
    BuildEvent::TypeCheckCompleted {
        elapsed_ms: 7,
        diagnostics: diagnostics.map(str::to_string),
    }
}
