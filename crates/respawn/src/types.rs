use std::fmt;
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;

/// What to run and what to watch. Fixed for the lifetime of the program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchTarget {
	pub runner: String,
	pub script: PathBuf,
}

impl WatchTarget {
	pub fn new(runner: impl Into<String>, script: impl Into<PathBuf>) -> Self {
		Self {
			runner: runner.into(),
			script: script.into(),
		}
	}

	/// Parent directory of the script, `.` for a bare file name.
	pub fn watch_dir(&self) -> &Path {
		match self.script.parent() {
			Some(dir) if !dir.as_os_str().is_empty() => dir,
			_ => Path::new("."),
		}
	}
}

/// How a run ended. Produced once per child by its exit waiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitOutcome {
	pub success: bool,
	pub code: Option<i32>,
	pub signal: Option<i32>,
}

impl ExitOutcome {
	/// Outcome recorded when waiting on the child itself failed.
	pub fn wait_failed() -> Self {
		Self {
			success: false,
			code: None,
			signal: None,
		}
	}

	pub fn is_abnormal(&self) -> bool {
		!self.success
	}
}

impl From<ExitStatus> for ExitOutcome {
	fn from(status: ExitStatus) -> Self {
		Self {
			success: status.success(),
			code: status.code(),
			signal: status.signal(),
		}
	}
}

impl fmt::Display for ExitOutcome {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match (self.code, self.signal) {
			(Some(code), _) => write!(f, "exit status {}", code),
			(None, Some(sig)) => match nix::sys::signal::Signal::try_from(sig) {
				Ok(signal) => write!(f, "signal: {}", signal.as_str()),
				Err(_) => write!(f, "signal: {}", sig),
			},
			(None, None) => write!(f, "wait failed"),
		}
	}
}

/// Why the watcher asked for a restart. Both reasons restart identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartReason {
	Changed,
	Crashed,
}

impl RestartReason {
	pub fn from_crashed(crashed: bool) -> Self {
		if crashed {
			RestartReason::Crashed
		} else {
			RestartReason::Changed
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Launch {
	Initial,
	Restart(RestartReason),
}

impl Launch {
	pub fn is_restart(&self) -> bool {
		matches!(self, Launch::Restart(_))
	}
}
