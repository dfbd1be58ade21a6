use std::fmt;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use tokio::process::{Child, Command};
use tokio::sync::watch;

use crate::types::{ExitOutcome, WatchTarget};

/// The OS refused to start the runner.
#[derive(Debug)]
pub struct SpawnError {
	pub runner: String,
	pub script: PathBuf,
	pub source: io::Error,
}

impl fmt::Display for SpawnError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"failed to spawn {} {}: {}",
			self.runner,
			self.script.display(),
			self.source
		)
	}
}

impl std::error::Error for SpawnError {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		Some(&self.source)
	}
}

/// One invocation of `runner script`, running as the leader of its own
/// process group.
#[derive(Debug)]
pub struct ProcessHandle {
	pid: u32,
	pgid: Pid,
	outcome: watch::Receiver<Option<ExitOutcome>>,
}

/// Owns the child so the exit can be awaited off the restart path.
#[derive(Debug)]
pub struct ExitWaiter {
	child: Child,
	pid: u32,
	tx: watch::Sender<Option<ExitOutcome>>,
}

impl ProcessHandle {
	pub fn spawn(target: &WatchTarget) -> Result<(ProcessHandle, ExitWaiter), SpawnError> {
		let spawn_err = |source: io::Error| SpawnError {
			runner: target.runner.clone(),
			script: target.script.clone(),
			source,
		};

		let child = Command::new(&target.runner)
			.arg(&target.script)
			.stdout(Stdio::inherit())
			.stderr(Stdio::inherit())
			.process_group(0)
			.spawn()
			.map_err(spawn_err)?;

		let pid = child
			.id()
			.ok_or_else(|| spawn_err(io::Error::other("child exited before its pid was read")))?;

		tracing::debug!("spawned {} {} (pid {})", target.runner, target.script.display(), pid);

		let (tx, rx) = watch::channel(None);
		let handle = ProcessHandle {
			pid,
			// process_group(0) makes the child its own group leader
			pgid: Pid::from_raw(pid as i32),
			outcome: rx,
		};
		Ok((handle, ExitWaiter { child, pid, tx }))
	}

	pub fn pid(&self) -> u32 {
		self.pid
	}

	pub fn pgid(&self) -> i32 {
		self.pgid.as_raw()
	}

	/// The exit outcome, once the waiter has observed it.
	pub fn outcome(&self) -> Option<ExitOutcome> {
		*self.outcome.borrow()
	}

	pub fn is_running(&self) -> bool {
		self.outcome().is_none()
	}

	/// Interrupt the whole group, then wait out `grace` regardless of
	/// whether anything actually exited.
	pub async fn terminate_group(&self, grace: Duration) {
		self.interrupt_group();
		tokio::time::sleep(grace).await;
	}

	/// Interrupt the group and return as soon as the leader has exited or
	/// `grace` has elapsed.
	pub async fn terminate_within(&self, grace: Duration) -> Option<ExitOutcome> {
		self.interrupt_group();
		let mut outcome = self.outcome.clone();
		let exited = tokio::time::timeout(grace, outcome.wait_for(|o| o.is_some())).await;
		match exited {
			Ok(Ok(o)) => *o,
			_ => None,
		}
	}

	fn interrupt_group(&self) {
		// The leader may be gone while grandchildren still hold the group,
		// so signal even when the outcome is already known.
		match killpg(self.pgid, Signal::SIGINT) {
			Ok(()) => tracing::debug!("sent SIGINT to process group {}", self.pgid),
			Err(e) => tracing::debug!("SIGINT to process group {} failed: {}", self.pgid, e),
		}
	}
}

impl ExitWaiter {
	pub fn pid(&self) -> u32 {
		self.pid
	}

	/// Wait for the child and publish the outcome to its handle.
	pub async fn await_exit(mut self) -> ExitOutcome {
		let outcome = match self.child.wait().await {
			Ok(status) => ExitOutcome::from(status),
			Err(e) => {
				tracing::debug!("wait on pid {} failed: {}", self.pid, e);
				ExitOutcome::wait_failed()
			}
		};
		let _ = self.tx.send(Some(outcome));
		outcome
	}
}
