// src/watch/patterns.rs

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};

/// Decides which changed paths are irrelevant to the build.
///
/// A path is ignored when it:
/// - lies under one of the skipped directories (the build output),
/// - cannot be expressed relative to the watch root, or
/// - matches one of the ignore globs (evaluated on the `/`-separated path
///   relative to the root, e.g. `"src/main.ts"`).
#[derive(Clone)]
pub struct IgnoreSet {
    root: PathBuf,
    globs: GlobSet,
    skip_dirs: Vec<PathBuf>,
}

impl fmt::Debug for IgnoreSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IgnoreSet")
            .field("root", &self.root)
            .field("skip_dirs", &self.skip_dirs)
            .finish_non_exhaustive()
    }
}

impl IgnoreSet {
    pub fn new(
        root: impl Into<PathBuf>,
        patterns: &[String],
        skip_dirs: Vec<PathBuf>,
    ) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pat in patterns {
            let glob = Glob::new(pat).with_context(|| format!("invalid ignore pattern: {pat}"))?;
            builder.add(glob);
        }

        Ok(Self {
            root: root.into(),
            globs: builder.build()?,
            skip_dirs,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_ignored(&self, path: &Path) -> bool {
        if self.skip_dirs.iter().any(|dir| path.starts_with(dir)) {
            return true;
        }
        match relative_to(&self.root, path) {
            Some(rel) => self.globs.is_match(rel.as_str()),
            None => true,
        }
    }
}

/// `path` relative to `root`, with forward slashes.
///
/// Falls back to comparing canonical forms, since notify may report paths
/// through a different prefix than the one we watched (symlinked temp dirs
/// on macOS).
pub fn relative_to(root: &Path, path: &Path) -> Option<String> {
    let to_slashes = |p: &Path| p.to_string_lossy().replace('\\', "/");

    if let Ok(rel) = path.strip_prefix(root) {
        return Some(to_slashes(rel));
    }

    let root = root.canonicalize().ok()?;
    let path = path.canonicalize().ok()?;
    path.strip_prefix(&root).ok().map(to_slashes)
}
