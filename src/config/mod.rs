// src/config/mod.rs

//! Configuration loading and resolution for tsrun.
//!
//! Responsibilities:
//! - Define the caller-facing options and the resolved build model (`model.rs`).
//! - Load the project JSON and the optional TOML override file (`loader.rs`).
//! - Validate the override file (`validate.rs`).
//! - Turn options into an immutable [`BuildConfig`] (`resolve.rs`).

pub mod loader;
pub mod model;
pub mod resolve;
pub mod validate;

pub use loader::{
    DEFAULT_OVERRIDE_FILE, load_override, load_override_from_path, load_project_config,
};
pub use model::{
    BuildConfig, BuildSection, CommandTemplate, CompileOptions, CompilerOptions, OverrideFile,
    ProjectConfig, RawOverrideFile, WatchSection, WatchSettings,
};
pub use resolve::{
    DEFAULT_OUTPUT_FILE, normalize, prepare_output_dir, remove_temporary_output, resolve,
    resolve_with_cwd,
};
