// src/config/resolve.rs

//! Turn [`CompileOptions`] into a [`BuildConfig`].

use std::fs;
use std::path::{Component, MAIN_SEPARATOR, Path, PathBuf};

use anyhow::Context;
use tracing::{debug, warn};

use crate::build::command::{default_compiler, default_type_checker};
use crate::config::loader::{load_override, load_project_config};
use crate::config::model::{
    BuildConfig, CompileOptions, DEFAULT_DEBOUNCE, DEFAULT_IGNORE, WatchSettings,
};
use crate::errors::{Result, TsrunError};

/// Artifact name used when the output is a directory.
pub const DEFAULT_OUTPUT_FILE: &str = "index.js";

/// Resolve options against the current working directory.
pub fn resolve(options: &CompileOptions) -> Result<BuildConfig> {
    let cwd = std::env::current_dir()?;
    resolve_with_cwd(options, &cwd)
}

/// Resolve options against an explicit working directory.
///
/// Fails with a configuration error, before anything is compiled, when the
/// project configuration is unusable, the entry is missing, or an explicitly
/// requested override file does not exist.
pub fn resolve_with_cwd(options: &CompileOptions, cwd: &Path) -> Result<BuildConfig> {
    let project = normalize(&cwd.join(&options.project));
    let project_config = load_project_config(&project).map_err(|err| {
        match err {
            // Name the path the way the caller spelled it.
            TsrunError::ConfigError(_) => TsrunError::ConfigError(format!(
                "Unable to find a valid configuration JSON for typescript at '{}'",
                options.project.display()
            )),
            other => other,
        }
    })?;

    if options.entry.trim().is_empty() {
        return Err(TsrunError::ConfigError(
            "'entry' parameter is required".to_string(),
        ));
    }

    let (output_dir, output_file) = match &options.output {
        Some(output) => split_output(cwd, output)?,
        None => split_output(cwd, &temporary_output()?)?,
    };

    let use_aliases = project_config.needs_aliasing();
    let use_externals = options.output.is_some();

    let config = BuildConfig {
        entry: normalize(&cwd.join(&options.entry)),
        output_dir,
        output_file,
        dev: options.dev,
        check_types: options.check_types,
        use_aliases,
        use_externals,
        watch: WatchSettings {
            root: project
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| cwd.to_path_buf()),
            ignore: DEFAULT_IGNORE.iter().map(|s| s.to_string()).collect(),
            debounce: DEFAULT_DEBOUNCE,
        },
        project,
        plugins: Vec::new(),
        compiler: default_compiler(options.dev, use_externals, use_aliases),
        type_checker: default_type_checker(),
        runtime: "node".to_string(),
        mode_variable: "NODE_ENV".to_string(),
        env: Default::default(),
    };

    let config = match load_override(options.override_config.as_deref(), cwd)? {
        Some(overrides) => overrides.apply(config),
        None => config,
    };

    debug!(
        entry = %config.entry.display(),
        artifact = %config.artifact_path().display(),
        use_aliases = config.use_aliases,
        check_types = config.check_types,
        "resolved build configuration"
    );

    Ok(config)
}

/// Create the output directory (and parents) if needed.
pub fn prepare_output_dir(config: &BuildConfig) -> Result<()> {
    fs::create_dir_all(&config.output_dir)
        .with_context(|| format!("creating output directory {:?}", config.output_dir))?;
    Ok(())
}

/// Split an output location into an absolute directory and a file name.
fn split_output(cwd: &Path, output: &Path) -> Result<(PathBuf, String)> {
    let raw = output.as_os_str().to_string_lossy();
    let absolute = normalize(&cwd.join(output));

    if raw.ends_with('/') || raw.ends_with(MAIN_SEPARATOR) {
        return Ok((absolute, DEFAULT_OUTPUT_FILE.to_string()));
    }

    match (absolute.parent(), absolute.file_name()) {
        (Some(dir), Some(file)) => Ok((dir.to_path_buf(), file.to_string_lossy().into_owned())),
        _ => Err(TsrunError::ConfigError(format!(
            "output '{}' does not name a file",
            output.display()
        ))),
    }
}

/// Delete the artifact (and its source map) compiled into a temporary file.
pub fn remove_temporary_output(config: &BuildConfig) {
    let artifact = config.artifact_path();
    let mut source_map = artifact.clone().into_os_string();
    source_map.push(".map");

    for path in [artifact, PathBuf::from(source_map)] {
        match fs::remove_file(&path) {
            Ok(()) => debug!(path = %path.display(), "removed temporary output"),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                warn!(path = %path.display(), error = %err, "could not remove temporary output");
            }
        }
    }
}

/// Drop `.` and `..` components without touching the filesystem, so paths
/// compare equal to the ones the file watcher reports.
pub fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match normalized.components().next_back() {
                Some(Component::Normal(_)) => {
                    normalized.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => normalized.push(component),
            },
            other => normalized.push(other),
        }
    }
    normalized
}

/// Allocate a uniquely named file to compile into when no output was given.
///
/// The file outlives this call; [`remove_temporary_output`] deletes it once
/// the session ended.
fn temporary_output() -> Result<PathBuf> {
    let file = tempfile::Builder::new()
        .prefix("tsrun-")
        .suffix(".js")
        .tempfile()?;
    let path = file.into_temp_path().keep().map_err(|err| err.error)?;
    Ok(path)
}
