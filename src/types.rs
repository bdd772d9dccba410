use std::fmt;
use std::process::ExitStatus;

/// Monotonic identifier of a build cycle. `0` means "no cycle started yet".
pub type CycleId = u64;

/// Logical purpose of a supervised child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    /// The compiled artifact itself.
    Run,
    /// The auxiliary `--exec` command.
    Exec,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Run => f.write_str("run"),
            Role::Exec => f.write_str("exec"),
        }
    }
}

/// How much the status reporter prints.
///
/// - `Normal`: status lines and diagnostics.
/// - `Quiet`: diagnostics only.
/// - `Silent`: nothing, and the run process output is discarded too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputLevel {
    #[default]
    Normal,
    Quiet,
    Silent,
}

impl OutputLevel {
    pub fn from_flags(quiet: bool, silent: bool) -> Self {
        if silent {
            OutputLevel::Silent
        } else if quiet {
            OutputLevel::Quiet
        } else {
            OutputLevel::Normal
        }
    }

    /// Silent implies quiet.
    pub fn is_quiet(self) -> bool {
        !matches!(self, OutputLevel::Normal)
    }

    pub fn is_silent(self) -> bool {
        matches!(self, OutputLevel::Silent)
    }
}

/// What happens to the previous build's processes when a rebuild starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TeardownPolicy {
    /// Tear everything down as soon as a new compile attempt starts.
    #[default]
    OnCompileStart,
    /// Keep the last good processes alive through failed rebuilds and only
    /// replace them when the next build succeeds.
    KeepUntilSuccess,
}

/// How a supervised process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitOutcome {
    Success,
    Failed(i32),
    /// Terminated by a signal (no exit code).
    Signalled,
    /// The OS refused to start the process.
    SpawnFailed(String),
}

impl ExitOutcome {
    pub fn from_status(status: ExitStatus) -> Self {
        if status.success() {
            return ExitOutcome::Success;
        }
        match status.code() {
            Some(code) => ExitOutcome::Failed(code),
            None => ExitOutcome::Signalled,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExitOutcome::Success)
    }
}

impl fmt::Display for ExitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitOutcome::Success => f.write_str("exited successfully"),
            ExitOutcome::Failed(code) => write!(f, "exited with code {code}"),
            ExitOutcome::Signalled => f.write_str("was terminated by a signal"),
            ExitOutcome::SpawnFailed(reason) => write!(f, "could not be started: {reason}"),
        }
    }
}
