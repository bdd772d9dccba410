// src/config/loader.rs

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::config::model::{OverrideFile, ProjectConfig, RawOverrideFile};
use crate::errors::{Result, TsrunError};

/// Override file looked up in the working directory when none is requested.
pub const DEFAULT_OVERRIDE_FILE: &str = "tsrun.toml";

/// Load the TypeScript project configuration.
///
/// Any read or parse failure is reported as a [`TsrunError::ConfigError`]
/// naming the path exactly as the caller gave it.
pub fn load_project_config(path: impl AsRef<Path>) -> Result<ProjectConfig> {
    let path = path.as_ref();
    let invalid = || {
        TsrunError::ConfigError(format!(
            "Unable to find a valid configuration JSON for typescript at '{}'",
            path.display()
        ))
    };

    let contents = fs::read_to_string(path).map_err(|err| {
        debug!(path = %path.display(), error = %err, "reading project configuration failed");
        invalid()
    })?;

    serde_json::from_str(&contents).map_err(|err| {
        debug!(path = %path.display(), error = %err, "parsing project configuration failed");
        invalid()
    })
}

/// Load and validate an override file from a concrete path.
pub fn load_override_from_path(path: impl AsRef<Path>) -> Result<OverrideFile> {
    let contents = fs::read_to_string(path.as_ref())?;
    let raw: RawOverrideFile = toml::from_str(&contents)?;
    OverrideFile::try_from(raw)
}

/// Locate and load the override file.
///
/// - An explicitly requested file must exist.
/// - Without a request, [`DEFAULT_OVERRIDE_FILE`] in `cwd` is used when it
///   exists and silently skipped otherwise.
pub fn load_override(explicit: Option<&Path>, cwd: &Path) -> Result<Option<OverrideFile>> {
    match explicit {
        Some(path) => {
            let path = cwd.join(path);
            if !path.is_file() {
                return Err(TsrunError::ConfigError(format!(
                    "override configuration '{}' does not exist",
                    path.display()
                )));
            }
            debug!(path = %path.display(), "loading requested override file");
            load_override_from_path(&path).map(Some)
        }
        None => {
            let path = cwd.join(DEFAULT_OVERRIDE_FILE);
            if path.is_file() {
                debug!(path = %path.display(), "loading default override file");
                load_override_from_path(&path).map(Some)
            } else {
                debug!(path = %path.display(), "no default override file; skipping");
                Ok(None)
            }
        }
    }
}
