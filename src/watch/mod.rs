// src/watch/mod.rs

//! File watching for watch sessions.
//!
//! This module is responsible for:
//! - Compiling the `ignore` glob patterns.
//! - Wiring up a cross-platform filesystem watcher (`notify`).
//! - Coalescing bursts of file events into one build request.
//!
//! It does **not** know anything about cycles; it only turns filesystem
//! changes into `RuntimeEvent::BuildRequested`.

pub mod patterns;
pub mod watcher;

pub use patterns::IgnoreSet;
pub use watcher::{WatcherHandle, spawn_watcher};
