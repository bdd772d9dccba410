// src/watch/watcher.rs

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::WatchSettings;
use crate::engine::{RuntimeEvent, TriggerReason};
use crate::watch::patterns::IgnoreSet;

/// Handle for the filesystem watcher.
///
/// This exists mainly so the underlying `RecommendedWatcher` is kept alive for
/// as long as needed. Dropping this handle will stop file watching.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

/// Spawn a filesystem watcher that observes `settings.root` recursively and
/// sends one `RuntimeEvent::BuildRequested` per burst of relevant changes.
///
/// - `skip_dirs` are never reported (the build output lives there).
/// - A burst ends once no relevant event arrived for `settings.debounce`.
pub fn spawn_watcher(
    settings: &WatchSettings,
    skip_dirs: Vec<PathBuf>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) -> Result<WatcherHandle> {
    // Canonicalize once so we have a stable base path.
    let root = settings
        .root
        .canonicalize()
        .unwrap_or_else(|_| settings.root.clone());
    // notify reports canonical paths; compare skipped dirs the same way.
    let skip_dirs = skip_dirs
        .into_iter()
        .map(|dir| dir.canonicalize().unwrap_or(dir))
        .collect();
    let ignore = IgnoreSet::new(root.clone(), &settings.ignore, skip_dirs)?;

    // Channel from the blocking notify callback into the async world.
    let (event_tx, event_rx) = mpsc::unbounded_channel::<Event>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if let Err(err) = event_tx.send(event) {
                    // We can't log via tracing here easily, so fallback to stderr.
                    eprintln!("tsrun: failed to forward notify event: {err}");
                }
            }
            Err(err) => {
                eprintln!("tsrun: file watch error: {err}");
            }
        },
        Config::default(),
    )?;

    watcher.watch(&root, RecursiveMode::Recursive)?;

    info!("file watcher started on {:?}", root);

    tokio::spawn(forward_changes(event_rx, ignore, settings.debounce, runtime_tx));

    Ok(WatcherHandle { _inner: watcher })
}

/// Paths of `event` that should trigger a rebuild.
fn relevant_paths(event: Event, ignore: &IgnoreSet) -> Vec<PathBuf> {
    if matches!(event.kind, EventKind::Access(_)) {
        return Vec::new();
    }
    event
        .paths
        .into_iter()
        .filter(|path| !ignore.is_ignored(path))
        .collect()
}

async fn forward_changes(
    mut event_rx: mpsc::UnboundedReceiver<Event>,
    ignore: IgnoreSet,
    debounce: Duration,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) {
    while let Some(event) = event_rx.recv().await {
        let mut changed = relevant_paths(event, &ignore);
        if changed.is_empty() {
            continue;
        }

        // Keep collecting until the burst settles.
        loop {
            match tokio::time::timeout(debounce, event_rx.recv()).await {
                Ok(Some(event)) => changed.extend(relevant_paths(event, &ignore)),
                Ok(None) | Err(_) => break,
            }
        }

        changed.sort();
        changed.dedup();
        debug!(?changed, "source change detected");

        let request = RuntimeEvent::BuildRequested {
            reason: TriggerReason::FileWatch { paths: changed },
        };
        if runtime_tx.send(request).await.is_err() {
            break;
        }
    }
    debug!("watcher event loop finished");
}
