use std::fmt;
use std::path::PathBuf;

use crate::process::SpawnError;

/// Setup failures. Each one ends the program.
#[derive(Debug)]
pub enum Error {
	/// The platform notifier could not be created.
	Notify(notify::Error),
	/// The script's directory could not be registered with the notifier.
	Watch { dir: PathBuf, source: notify::Error },
	/// The runner could not be started.
	Spawn(SpawnError),
	/// The watcher task panicked or was cancelled.
	Task(tokio::task::JoinError),
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Error::Notify(e) => write!(f, "cannot start file watcher: {}", e),
			Error::Watch { dir, source } => write!(f, "cannot watch {}: {}", dir.display(), source),
			Error::Spawn(e) => write!(f, "{}", e),
			Error::Task(e) => write!(f, "watcher task failed: {}", e),
		}
	}
}

impl std::error::Error for Error {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		match self {
			Error::Notify(e) => Some(e),
			Error::Watch { source, .. } => Some(source),
			Error::Spawn(e) => Some(e),
			Error::Task(e) => Some(e),
		}
	}
}

impl From<SpawnError> for Error {
	fn from(e: SpawnError) -> Self {
		Error::Spawn(e)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::error::Error as _;

	#[tokio::test]
	async fn task_failure_keeps_its_cause() {
		let joined = tokio::spawn(async {
			panic!("boom");
		})
		.await;
		let err = Error::Task(joined.unwrap_err());
		assert!(err.to_string().starts_with("watcher task failed:"));
		assert!(err.source().is_some());
	}
}
