mod cli;

use std::sync::Arc;

use clap::Parser;
use owo_colors::OwoColorize;
use respawn::{DebouncedWatcher, Launch, SpawnError, StatusSink, Supervisor, Terminal, WatchTarget};

use cli::Cli;

fn main() {
	let cli = Cli::parse();

	tracing_subscriber::fmt()
		.with_max_level(cli.log_level())
		.with_writer(std::io::stderr)
		.with_target(false)
		.init();

	let runtime = match tokio::runtime::Runtime::new() {
		Ok(rt) => rt,
		Err(e) => fail(&format!("cannot start runtime: {}", e)),
	};

	if let Err(e) = runtime.block_on(run(cli)) {
		fail(&e.to_string());
	}
}

fn fail(message: &str) -> ! {
	eprintln!("{} {}", "error:".red().bold(), message);
	std::process::exit(1);
}

async fn run(cli: Cli) -> Result<(), respawn::Error> {
	if !cli.ignored.is_empty() {
		tracing::debug!("ignoring extra arguments: {:?}", cli.ignored);
	}
	let target = WatchTarget::new(cli.runner.clone(), cli.script.clone());
	let sink: Arc<dyn StatusSink> = Arc::new(Terminal::new(cli.color()));
	let supervisor = Supervisor::new(target.clone(), Arc::clone(&sink));

	let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
	// dropping the notifier stops the event stream
	let _notifier = respawn::watcher::start_notifier(target.watch_dir(), tx)?;
	supervisor.start_or_restart(Launch::Initial).await?;

	let mut actor = tokio::spawn(DebouncedWatcher::new(Arc::clone(&supervisor), sink).run(rx));

	let finished = tokio::select! {
		joined = &mut actor => Some(joined),
		_ = shutdown_signal() => None,
	};

	let result = match finished {
		Some(joined) => watcher_result(joined),
		None => {
			tracing::info!("shutting down");
			// a pending debounce must not fire while the child is being stopped
			actor.abort();
			let _ = actor.await;
			Ok(())
		}
	};

	supervisor.shutdown().await;
	result
}

fn watcher_result(
	joined: Result<Result<(), SpawnError>, tokio::task::JoinError>,
) -> Result<(), respawn::Error> {
	match joined {
		Ok(Ok(())) => {
			tracing::warn!("watch stream closed");
			Ok(())
		}
		Ok(Err(e)) => Err(respawn::Error::Spawn(e)),
		Err(e) => Err(respawn::Error::Task(e)),
	}
}

async fn shutdown_signal() {
	use tokio::signal::unix::{signal, SignalKind};

	let mut term = match signal(SignalKind::terminate()) {
		Ok(s) => s,
		Err(e) => {
			tracing::warn!("cannot listen for SIGTERM: {}", e);
			let _ = tokio::signal::ctrl_c().await;
			return;
		}
	};

	tokio::select! {
		_ = tokio::signal::ctrl_c() => {},
		_ = term.recv() => {},
	}
}
