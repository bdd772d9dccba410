// src/config/model.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::types::{OutputLevel, TeardownPolicy};

/// Everything the caller asks for, before any path is resolved.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Entry point handed to the compiler.
    pub entry: String,
    /// Output file, or directory when it ends with a separator. `None`
    /// compiles to a temporary file and always runs it.
    pub output: Option<PathBuf>,
    /// TypeScript project configuration (`tsconfig.json`).
    pub project: PathBuf,
    /// Explicitly requested override file. Must exist when set.
    pub override_config: Option<PathBuf>,
    pub dev: bool,
    pub check_types: bool,
    pub watch: bool,
    /// Run the compiled artifact after each successful build.
    pub run: bool,
    pub run_args: Vec<String>,
    /// Auxiliary command spawned next to the artifact.
    pub exec: Option<String>,
    pub verbose: bool,
    pub output_level: OutputLevel,
    pub teardown: TeardownPolicy,
}

impl CompileOptions {
    pub fn new(entry: impl Into<String>) -> Self {
        Self {
            entry: entry.into(),
            ..Self::default()
        }
    }
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            entry: String::new(),
            output: None,
            project: PathBuf::from("tsconfig.json"),
            override_config: None,
            dev: true,
            check_types: false,
            watch: false,
            run: false,
            run_args: Vec::new(),
            exec: None,
            verbose: false,
            output_level: OutputLevel::Normal,
            teardown: TeardownPolicy::OnCompileStart,
        }
    }
}

/// The subset of `tsconfig.json` that tsrun cares about.
///
/// ```json
/// {
///   "compilerOptions": {
///     "baseUrl": ".",
///     "paths": { "@app/*": ["src/*"] }
///   }
/// }
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ProjectConfig {
    #[serde(default, rename = "compilerOptions")]
    pub compiler_options: Option<CompilerOptions>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CompilerOptions {
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default)]
    pub paths: BTreeMap<String, Vec<String>>,
}

impl ProjectConfig {
    /// Whether module resolution has to honour the project's path mapping.
    pub fn needs_aliasing(&self) -> bool {
        self.compiler_options
            .as_ref()
            .is_some_and(|opts| opts.base_url.is_some() || !opts.paths.is_empty())
    }
}

/// A program plus an argument template.
///
/// Arguments may contain `{entry}`, `{outfile}`, `{outdir}`, `{project}` and
/// `{mode}` placeholders; see [`crate::build::command`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandTemplate {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

/// File-watching behaviour of a watch session.
#[derive(Debug, Clone)]
pub struct WatchSettings {
    /// Directory watched recursively.
    pub root: PathBuf,
    /// Glob patterns, relative to `root`, whose changes never trigger a build.
    pub ignore: Vec<String>,
    /// Quiet period used to coalesce a burst of file events into one build.
    pub debounce: Duration,
}

pub const DEFAULT_IGNORE: [&str; 2] = ["**/node_modules/**", "**/.git/**"];
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

/// Fully resolved, immutable build configuration.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Absolute entry point.
    pub entry: PathBuf,
    /// Absolute output directory.
    pub output_dir: PathBuf,
    pub output_file: String,
    pub dev: bool,
    /// Type checking runs as a second, decoupled completion signal.
    pub check_types: bool,
    /// Derived from `baseUrl` / `paths` in the project configuration.
    pub use_aliases: bool,
    /// Dependencies stay external when the caller chose the output location.
    pub use_externals: bool,
    /// Absolute path of the project configuration.
    pub project: PathBuf,
    /// Post-build plugin hooks, run through the platform shell.
    pub plugins: Vec<String>,
    pub compiler: CommandTemplate,
    pub type_checker: CommandTemplate,
    /// Program used to execute the artifact.
    pub runtime: String,
    /// Environment variable carrying `development` / `production`.
    pub mode_variable: String,
    /// Extra environment for every child process.
    pub env: BTreeMap<String, String>,
    pub watch: WatchSettings,
}

impl BuildConfig {
    pub fn artifact_path(&self) -> PathBuf {
        self.output_dir.join(&self.output_file)
    }

    pub fn mode_value(&self) -> &'static str {
        if self.dev { "development" } else { "production" }
    }

    /// Full environment overlay for spawned children; the mode variable wins
    /// over anything from the override file.
    pub fn child_env(&self) -> Vec<(String, String)> {
        let mut env: Vec<(String, String)> = self
            .env
            .iter()
            .filter(|(key, _)| **key != self.mode_variable)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        env.push((self.mode_variable.clone(), self.mode_value().to_string()));
        env
    }

    pub fn is_inside_output(&self, path: &Path) -> bool {
        path.starts_with(&self.output_dir)
    }
}

/// Top-level override file as read from TOML.
///
/// ```toml
/// [build]
/// compiler = "esbuild"
/// compiler_args = ["{entry}", "--bundle", "--platform=node", "--outfile={outfile}"]
/// type_checker = "tsc"
/// runtime = "node"
/// plugins = ["cp -r static {outdir}"]
///
/// [build.env]
/// PORT = "3000"
///
/// [watch]
/// ignore = ["**/*.log"]
/// debounce_ms = 200
/// ```
///
/// All sections are optional.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawOverrideFile {
    #[serde(default)]
    pub build: BuildSection,

    #[serde(default)]
    pub watch: WatchSection,
}

/// `[build]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct BuildSection {
    /// Replaces the compiler program. Keeps the default arguments unless
    /// `compiler_args` is also given.
    #[serde(default)]
    pub compiler: Option<String>,

    #[serde(default)]
    pub compiler_args: Option<Vec<String>>,

    #[serde(default)]
    pub type_checker: Option<String>,

    #[serde(default)]
    pub type_checker_args: Option<Vec<String>>,

    #[serde(default)]
    pub runtime: Option<String>,

    #[serde(default)]
    pub mode_variable: Option<String>,

    /// Extra post-build hooks, appended in order.
    #[serde(default)]
    pub plugins: Vec<String>,

    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// `[watch]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct WatchSection {
    /// Extra ignore globs, appended to the defaults.
    #[serde(default)]
    pub ignore: Vec<String>,

    #[serde(default)]
    pub debounce_ms: Option<u64>,
}

/// Validated override file. Only obtainable through `TryFrom<RawOverrideFile>`.
#[derive(Debug, Clone)]
pub struct OverrideFile {
    build: BuildSection,
    watch: WatchSection,
}

impl OverrideFile {
    pub(crate) fn new_unchecked(build: BuildSection, watch: WatchSection) -> Self {
        Self { build, watch }
    }

    pub fn build_section(&self) -> &BuildSection {
        &self.build
    }

    pub fn watch_section(&self) -> &WatchSection {
        &self.watch
    }

    /// Transform a computed configuration with the overrides.
    pub fn apply(&self, mut config: BuildConfig) -> BuildConfig {
        let build = &self.build;

        if let Some(program) = &build.compiler {
            config.compiler.program = program.clone();
        }
        if let Some(args) = &build.compiler_args {
            config.compiler.args = args.clone();
        }
        if let Some(program) = &build.type_checker {
            config.type_checker.program = program.clone();
        }
        if let Some(args) = &build.type_checker_args {
            config.type_checker.args = args.clone();
        }
        if let Some(runtime) = &build.runtime {
            config.runtime = runtime.clone();
        }
        if let Some(var) = &build.mode_variable {
            config.mode_variable = var.clone();
        }
        config.plugins.extend(build.plugins.iter().cloned());
        config
            .env
            .extend(build.env.iter().map(|(k, v)| (k.clone(), v.clone())));

        config.watch.ignore.extend(self.watch.ignore.iter().cloned());
        if let Some(ms) = self.watch.debounce_ms {
            config.watch.debounce = Duration::from_millis(ms);
        }

        config
    }
}
