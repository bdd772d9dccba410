// src/build/backend.rs

//! Pluggable build backend abstraction.
//!
//! The runtime talks to a `BuildBackend` instead of spawning compilers
//! itself. This makes it easy to swap in a scripted backend in tests while
//! keeping the production implementation in [`CommandBuildBackend`].

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::build::runner::{run_compile, run_type_check};
use crate::config::BuildConfig;
use crate::engine::RuntimeEvent;
use crate::errors::Result;
use crate::types::CycleId;

/// Trait abstracting how a cycle's build is carried out.
///
/// Implementations must report results as `RuntimeEvent::Build` tagged with
/// the submitted cycle id: exactly one `Succeeded`/`Failed`, plus one
/// `TypeCheckCompleted` when type checking is enabled.
pub trait BuildBackend: Send {
    /// Start building `cycle`. Returns once the work is launched, not when
    /// it completes.
    fn submit(
        &mut self,
        cycle: CycleId,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Abandon any in-flight work. Called when the session ends.
    fn cancel(&mut self) {}
}

/// Internal handle for one in-flight compiler or type checker.
struct InFlight {
    cancel: Option<oneshot::Sender<()>>,
    handle: tokio::task::JoinHandle<()>,
}

/// Production backend: runs the configured compiler and type checker as
/// child processes.
///
/// There is never more than one in-flight build: submitting a new cycle
/// cancels (kills) the compiler and type checker of the previous one, which
/// then report nothing.
pub struct CommandBuildBackend {
    config: Arc<BuildConfig>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    in_flight: Vec<InFlight>,
}

impl CommandBuildBackend {
    pub fn new(config: Arc<BuildConfig>, runtime_tx: mpsc::Sender<RuntimeEvent>) -> Self {
        Self {
            config,
            runtime_tx,
            in_flight: Vec::new(),
        }
    }

    fn cancel_in_flight(&mut self) {
        for mut job in self.in_flight.drain(..) {
            if job.handle.is_finished() {
                continue;
            }
            if let Some(cancel) = job.cancel.take() {
                if cancel.send(()).is_err() {
                    debug!("build job finished while cancelling");
                }
            }
        }
    }

    fn launch<F, Fut>(&mut self, cycle: CycleId, job: F)
    where
        F: FnOnce(
            Arc<BuildConfig>,
            CycleId,
            mpsc::Sender<RuntimeEvent>,
            oneshot::Receiver<()>,
        ) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
        let fut = job(
            Arc::clone(&self.config),
            cycle,
            self.runtime_tx.clone(),
            cancel_rx,
        );
        let handle = tokio::spawn(fut);
        self.in_flight.push(InFlight {
            cancel: Some(cancel_tx),
            handle,
        });
    }
}

impl BuildBackend for CommandBuildBackend {
    fn submit(
        &mut self,
        cycle: CycleId,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            self.cancel_in_flight();

            self.launch(cycle, run_compile);
            if self.config.check_types {
                self.launch(cycle, run_type_check);
            }

            debug!(cycle, jobs = self.in_flight.len(), "build submitted");
            Ok(())
        })
    }

    fn cancel(&mut self) {
        self.cancel_in_flight();
    }
}
