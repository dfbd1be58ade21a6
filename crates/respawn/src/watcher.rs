use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use notify::event::ModifyKind;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::error::Error;
use crate::output::{Severity, StatusSink};
use crate::process::SpawnError;
use crate::types::RestartReason;

/// Writes closer together than this collapse into one restart.
pub const QUIET_PERIOD: Duration = Duration::from_millis(100);

pub type RawEvent = notify::Result<notify::Event>;

/// Something the watcher can restart once the quiet period has passed.
pub trait Restart: Send + Sync {
	fn is_crashed(&self) -> bool;

	fn restart(&self, reason: RestartReason) -> impl Future<Output = Result<(), SpawnError>> + Send;
}

/// Only content writes count. Metadata, create, remove, rename and access
/// events never schedule a restart.
pub fn is_write(kind: &EventKind) -> bool {
	matches!(
		kind,
		EventKind::Modify(ModifyKind::Data(_)) | EventKind::Modify(ModifyKind::Any)
	)
}

pub fn notice(reason: RestartReason) -> (Severity, &'static str) {
	match reason {
		RestartReason::Crashed => (
			Severity::Crash,
			"Script was crashed. Restarting due to changes...",
		),
		RestartReason::Changed => (Severity::Success, "Changes detected. Restarting script..."),
	}
}

/// Register a non-recursive watch on `dir`, forwarding every raw result into
/// `tx`. The returned watcher must be kept alive for events to flow.
pub fn start_notifier(
	dir: &Path,
	tx: mpsc::UnboundedSender<RawEvent>,
) -> Result<RecommendedWatcher, Error> {
	let mut watcher = notify::recommended_watcher(move |res: RawEvent| {
		let _ = tx.send(res);
	})
	.map_err(Error::Notify)?;

	watcher
		.watch(dir, RecursiveMode::NonRecursive)
		.map_err(|source| Error::Watch {
			dir: dir.to_path_buf(),
			source,
		})?;

	tracing::debug!("watching {}", dir.display());
	Ok(watcher)
}

/// Coalesces bursts of write events into single restarts.
///
/// Holds at most one pending deadline. Each qualifying event pushes it to
/// `now + QUIET_PERIOD`; when it passes, the target is restarted inline, so
/// events arriving during a restart wait in the channel until it returns.
pub struct DebouncedWatcher<R> {
	target: Arc<R>,
	sink: Arc<dyn StatusSink>,
}

impl<R: Restart> DebouncedWatcher<R> {
	pub fn new(target: Arc<R>, sink: Arc<dyn StatusSink>) -> Self {
		Self { target, sink }
	}

	/// Drain `events` until the stream closes (`Ok`) or a restart fails to
	/// spawn (`Err`).
	pub async fn run(self, mut events: mpsc::UnboundedReceiver<RawEvent>) -> Result<(), SpawnError> {
		let mut deadline: Option<Instant> = None;

		loop {
			tokio::select! {
				biased;

				event = events.recv() => match event {
					Some(Ok(event)) => {
						if is_write(&event.kind) {
							tracing::debug!("write: {:?}", event.paths);
							deadline = Some(Instant::now() + QUIET_PERIOD);
						}
					}
					Some(Err(e)) => {
						tracing::warn!("watch error: {}", e);
						self.sink.emit(Severity::Error, &format!("Error: {}", e));
					}
					None => return Ok(()),
				},
				_ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
					deadline = None;
					self.fire().await?;
				}
			}
		}
	}

	async fn fire(&self) -> Result<(), SpawnError> {
		let reason = RestartReason::from_crashed(self.target.is_crashed());
		let (severity, line) = notice(reason);
		self.sink.emit(severity, line);
		self.target.restart(reason).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::output::Recorder;
	use notify::event::{AccessKind, CreateKind, DataChange, MetadataKind, RemoveKind, RenameMode};
	use notify::Event;
	use std::sync::atomic::{AtomicBool, Ordering};
	use std::sync::Mutex;

	#[derive(Default)]
	struct FakeTarget {
		crashed: AtomicBool,
		fail: bool,
		fired: Mutex<Vec<(Instant, RestartReason)>>,
	}

	impl FakeTarget {
		fn fired(&self) -> Vec<(Instant, RestartReason)> {
			self.fired.lock().unwrap().clone()
		}
	}

	impl Restart for FakeTarget {
		fn is_crashed(&self) -> bool {
			self.crashed.load(Ordering::SeqCst)
		}

		fn restart(&self, reason: RestartReason) -> impl Future<Output = Result<(), SpawnError>> + Send {
			async move {
				if self.fail {
					return Err(SpawnError {
						runner: "missing-runner".into(),
						script: "app.sh".into(),
						source: std::io::Error::from(std::io::ErrorKind::NotFound),
					});
				}
				self.fired.lock().unwrap().push((Instant::now(), reason));
				self.crashed.store(false, Ordering::SeqCst);
				Ok(())
			}
		}
	}

	fn write_event() -> RawEvent {
		Ok(Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
			.add_path("/tmp/w/app.sh".into()))
	}

	type Running = (
		Arc<FakeTarget>,
		Recorder,
		mpsc::UnboundedSender<RawEvent>,
		tokio::task::JoinHandle<Result<(), SpawnError>>,
	);

	fn start(target: FakeTarget) -> Running {
		let target = Arc::new(target);
		let rec = Recorder::new();
		let (tx, rx) = mpsc::unbounded_channel();
		let watcher = DebouncedWatcher::new(Arc::clone(&target), Arc::new(rec.clone()));
		let handle = tokio::spawn(watcher.run(rx));
		(target, rec, tx, handle)
	}

	#[test]
	fn classifies_write_events() {
		assert!(is_write(&EventKind::Modify(ModifyKind::Data(DataChange::Any))));
		assert!(is_write(&EventKind::Modify(ModifyKind::Any)));
		assert!(!is_write(&EventKind::Modify(ModifyKind::Metadata(MetadataKind::Any))));
		assert!(!is_write(&EventKind::Modify(ModifyKind::Name(RenameMode::Any))));
		assert!(!is_write(&EventKind::Create(CreateKind::File)));
		assert!(!is_write(&EventKind::Remove(RemoveKind::File)));
		assert!(!is_write(&EventKind::Access(AccessKind::Any)));
	}

	#[tokio::test(start_paused = true)]
	async fn burst_collapses_into_one_restart() {
		let (target, _rec, tx, _handle) = start(FakeTarget::default());
		let t0 = Instant::now();

		tx.send(write_event()).unwrap();
		tokio::time::sleep(Duration::from_millis(50)).await;
		tx.send(write_event()).unwrap();
		tokio::time::sleep(Duration::from_millis(500)).await;

		let fired = target.fired();
		assert_eq!(fired.len(), 1);
		let at = fired[0].0 - t0;
		assert!(at >= Duration::from_millis(150), "fired at {:?}", at);
		assert!(at < Duration::from_millis(200), "fired at {:?}", at);
	}

	#[tokio::test(start_paused = true)]
	async fn separate_bursts_restart_separately() {
		let (target, _rec, tx, _handle) = start(FakeTarget::default());

		tx.send(write_event()).unwrap();
		tokio::time::sleep(Duration::from_millis(300)).await;
		tx.send(write_event()).unwrap();
		tokio::time::sleep(Duration::from_millis(300)).await;

		assert_eq!(target.fired().len(), 2);
	}

	#[tokio::test(start_paused = true)]
	async fn non_write_events_are_ignored() {
		let (target, rec, tx, _handle) = start(FakeTarget::default());

		for kind in [
			EventKind::Modify(ModifyKind::Metadata(MetadataKind::Permissions)),
			EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
			EventKind::Create(CreateKind::File),
			EventKind::Remove(RemoveKind::File),
			EventKind::Access(AccessKind::Any),
		] {
			tx.send(Ok(Event::new(kind))).unwrap();
		}
		tokio::time::sleep(Duration::from_secs(1)).await;

		assert!(target.fired().is_empty());
		assert!(rec.snapshot().is_empty());
	}

	#[tokio::test(start_paused = true)]
	async fn crashed_target_gets_crash_notice() {
		let fake = FakeTarget::default();
		fake.crashed.store(true, Ordering::SeqCst);
		let (target, rec, tx, _handle) = start(fake);

		tx.send(write_event()).unwrap();
		tokio::time::sleep(Duration::from_millis(200)).await;

		assert_eq!(target.fired()[0].1, RestartReason::Crashed);
		assert!(rec.contains(Severity::Crash, "was crashed"));

		tx.send(write_event()).unwrap();
		tokio::time::sleep(Duration::from_millis(200)).await;

		assert_eq!(target.fired()[1].1, RestartReason::Changed);
		assert!(rec.contains(Severity::Success, "Changes detected"));
	}

	#[tokio::test(start_paused = true)]
	async fn stream_errors_do_not_stop_the_loop() {
		let (target, rec, tx, handle) = start(FakeTarget::default());

		tx.send(Err(notify::Error::generic("queue overflow"))).unwrap();
		tx.send(write_event()).unwrap();
		tokio::time::sleep(Duration::from_millis(200)).await;

		assert!(rec.contains(Severity::Error, "queue overflow"));
		assert_eq!(target.fired().len(), 1);
		assert!(!handle.is_finished());
	}

	#[tokio::test(start_paused = true)]
	async fn closed_stream_ends_the_loop() {
		let (_target, _rec, tx, handle) = start(FakeTarget::default());
		drop(tx);
		assert!(handle.await.unwrap().is_ok());
	}

	#[tokio::test(start_paused = true)]
	async fn spawn_failure_is_returned() {
		let fake = FakeTarget {
			fail: true,
			..Default::default()
		};
		let (_target, _rec, tx, handle) = start(fake);

		tx.send(write_event()).unwrap();
		let err = handle.await.unwrap().unwrap_err();
		assert_eq!(err.runner, "missing-runner");
	}
}
