//! # respawn
//!
//! Restart a script's runner every time the script changes.
//!
//! Writes in the script's directory are debounced into a single restart.
//! Each run lives in its own process group, so a restart interrupts
//! everything the runner started. A run that crashes is not retried: the
//! supervisor waits for the next change instead.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use respawn::{DebouncedWatcher, Launch, Supervisor, Terminal, WatchTarget};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), respawn::Error> {
//! let target = WatchTarget::new("bash", "/tmp/w/app.sh");
//! let sink = Arc::new(Terminal::new(true));
//! let sup = Supervisor::new(target.clone(), sink.clone());
//!
//! let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
//! let _notifier = respawn::watcher::start_notifier(target.watch_dir(), tx)?;
//! sup.start_or_restart(Launch::Initial).await?;
//!
//! DebouncedWatcher::new(sup, sink).run(rx).await?;
//! # Ok(())
//! # }
//! ```

pub mod crash;
pub mod error;
pub mod output;
pub mod process;
pub mod supervisor;
pub mod types;
pub mod watcher;

pub use crash::{CrashState, RunId};
pub use error::Error;
pub use output::{Recorder, Severity, StatusSink, Terminal};
pub use process::{ExitWaiter, ProcessHandle, SpawnError};
pub use supervisor::{Supervisor, GRACE_WINDOW};
pub use types::*;
pub use watcher::{DebouncedWatcher, Restart, QUIET_PERIOD};
