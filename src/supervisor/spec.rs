// src/supervisor/spec.rs

//! What to spawn for each role.

use std::fmt;
use std::process::Stdio;

use tokio::process::Child;

use crate::config::{BuildConfig, CompileOptions};
use crate::types::Role;

/// Where a child's stdout/stderr go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdioPolicy {
    /// Shared with the orchestrating process.
    Inherit,
    /// Discarded.
    Ignore,
    /// Piped, for a custom run hook to consume.
    Piped,
}

impl StdioPolicy {
    pub(crate) fn to_stdio(self) -> Stdio {
        match self {
            StdioPolicy::Inherit => Stdio::inherit(),
            StdioPolicy::Ignore => Stdio::null(),
            StdioPolicy::Piped => Stdio::piped(),
        }
    }
}

/// A fully described child process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    pub role: Role,
    pub program: String,
    pub args: Vec<String>,
    /// Added on top of the inherited environment.
    pub env: Vec<(String, String)>,
    pub stdio: StdioPolicy,
}

impl ProcessSpec {
    /// `<runtime> <artifact> <run_args...>`.
    pub fn run(config: &BuildConfig, run_args: &[String], stdio: StdioPolicy) -> Self {
        let mut args = vec![config.artifact_path().display().to_string()];
        args.extend(run_args.iter().cloned());
        Self {
            role: Role::Run,
            program: config.runtime.clone(),
            args,
            env: config.child_env(),
            stdio,
        }
    }

    /// The exec command, split on whitespace. `None` for a blank command.
    pub fn exec(config: &BuildConfig, command: &str, stdio: StdioPolicy) -> Option<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            role: Role::Exec,
            program,
            args: parts.collect(),
            env: config.child_env(),
            stdio,
        })
    }
}

/// Callback that wires up a freshly spawned run process (e.g. takes its
/// piped stdout).
pub type RunCallback = Box<dyn FnMut(&mut Child) + Send>;

/// The run parameter: off, spawn-and-inherit, or custom wiring.
pub enum RunHook {
    Disabled,
    Inherit,
    Custom(RunCallback),
}

impl fmt::Debug for RunHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunHook::Disabled => f.write_str("Disabled"),
            RunHook::Inherit => f.write_str("Inherit"),
            RunHook::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// The processes a successful cycle spawns, fixed for the whole session.
pub struct SpawnPlan {
    run: Option<ProcessSpec>,
    exec: Option<ProcessSpec>,
    callback: Option<RunCallback>,
}

impl fmt::Debug for SpawnPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpawnPlan")
            .field("run", &self.run)
            .field("exec", &self.exec)
            .field("custom_run_hook", &self.callback.is_some())
            .finish()
    }
}

impl SpawnPlan {
    /// The artifact runs when asked to, when a custom hook is given, or when
    /// there is no explicit output (compile-and-run).
    pub fn new(config: &BuildConfig, options: &CompileOptions, hook: RunHook) -> Self {
        let hook = match hook {
            RunHook::Disabled if options.run || options.output.is_none() => RunHook::Inherit,
            other => other,
        };
        let level = options.output_level;

        let (run, callback) = match hook {
            RunHook::Disabled => (None, None),
            RunHook::Inherit => {
                let stdio = if level.is_silent() {
                    StdioPolicy::Ignore
                } else {
                    StdioPolicy::Inherit
                };
                (Some(ProcessSpec::run(config, &options.run_args, stdio)), None)
            }
            RunHook::Custom(callback) => (
                Some(ProcessSpec::run(config, &options.run_args, StdioPolicy::Piped)),
                Some(callback),
            ),
        };

        let exec = options.exec.as_deref().and_then(|command| {
            let stdio = if level.is_quiet() {
                StdioPolicy::Ignore
            } else {
                StdioPolicy::Inherit
            };
            ProcessSpec::exec(config, command, stdio)
        });

        Self { run, exec, callback }
    }

    pub fn has_run(&self) -> bool {
        self.run.is_some()
    }

    pub fn has_exec(&self) -> bool {
        self.exec.is_some()
    }

    pub fn spec(&self, role: Role) -> Option<&ProcessSpec> {
        match role {
            Role::Run => self.run.as_ref(),
            Role::Exec => self.exec.as_ref(),
        }
    }

    /// The custom wiring for `role`, if any. Only the run role has one.
    pub fn callback_mut(&mut self, role: Role) -> Option<&mut RunCallback> {
        match role {
            Role::Run => self.callback.as_mut(),
            Role::Exec => None,
        }
    }
}
