// src/build/invoker.rs

//! Submission of a build session.

use tokio::sync::mpsc;
use tracing::info;

use crate::config::BuildConfig;
use crate::engine::{RuntimeEvent, TriggerReason};
use crate::errors::{Error, Result};
use crate::watch::{WatcherHandle, spawn_watcher};

/// How the build is submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
    /// Exactly one cycle.
    Once,
    /// One cycle now and one per debounced batch of source changes.
    Watch,
}

/// Keeps a submission alive. Dropping it stops file watching.
#[derive(Debug)]
pub struct Submission {
    mode: BuildMode,
    _watcher: Option<WatcherHandle>,
}

impl Submission {
    pub fn mode(&self) -> BuildMode {
        self.mode
    }
}

/// Request the first cycle and, in watch mode, start the file watcher that
/// requests the following ones.
pub async fn submit(
    mode: BuildMode,
    config: &BuildConfig,
    runtime_tx: &mpsc::Sender<RuntimeEvent>,
) -> Result<Submission> {
    let watcher = match mode {
        BuildMode::Once => None,
        BuildMode::Watch => Some(spawn_watcher(
            &config.watch,
            vec![config.output_dir.clone()],
            runtime_tx.clone(),
        )?),
    };

    info!(?mode, entry = %config.entry.display(), "submitting build");

    runtime_tx
        .send(RuntimeEvent::BuildRequested {
            reason: TriggerReason::Initial,
        })
        .await
        .map_err(Error::from)?;

    Ok(Submission {
        mode,
        _watcher: watcher,
    })
}
