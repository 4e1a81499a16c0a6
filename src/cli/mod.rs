//! # CLI Module
//!
//! Command-line interface for the event dispatcher.
//!
//! ## Usage
//! ```bash
//! # Queue an event
//! event-dispatch emit user.registered --payload '{"username":"john"}'
//!
//! # Process events until Ctrl-C
//! event-dispatch run --workers 4 --poll-interval-ms 500
//!
//! # Inspect the queue
//! event-dispatch status
//! event-dispatch list --status failed --output json
//!
//! # Retry failed events
//! event-dispatch requeue
//! ```

mod handlers;

use clap::{Parser, Subcommand, ValueEnum};
use console::{style, Term};
use event_dispatcher::core::store::{Event, EventStatus, EventStore, SqliteEventStore, StoreStats};
use event_dispatcher::core::{CancellationToken, Dispatcher, EventEmitter, HandlerRegistry};
use event_dispatcher::error::{DispatchError, Result};
use event_dispatcher::monitor::{DispatchNotice, DispatchSummary, MonitorChannel, Outcome};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Event Dispatcher - durable background jobs on SQLite
#[derive(Parser, Debug)]
#[command(name = "event-dispatch")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Event database path
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Queue a new event
    Emit {
        /// Event name, e.g. user.registered
        name: String,

        /// JSON payload
        #[arg(short, long, default_value = "{}")]
        payload: String,
    },

    /// Process queued events until interrupted
    Run {
        /// Number of worker threads
        #[arg(short, long, default_value = "4")]
        workers: usize,

        /// Milliseconds between claim attempts
        #[arg(long, default_value = "1000")]
        poll_interval_ms: u64,

        /// Maximum events claimed per poll
        #[arg(long, default_value = "10")]
        batch_size: usize,

        /// Stop after this many seconds instead of waiting for Ctrl-C
        #[arg(long)]
        for_secs: Option<u64>,
    },

    /// Show event counts per status
    Status {
        /// Output format
        #[arg(short, long, default_value = "pretty")]
        output: OutputFormat,
    },

    /// List events, oldest first
    List {
        /// Only show events in this status
        #[arg(short, long)]
        status: Option<StatusFilter>,

        /// Maximum number of events
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// Output format
        #[arg(short, long, default_value = "pretty")]
        output: OutputFormat,
    },

    /// Move failed events back to pending
    Requeue {
        /// Reset events stuck in processing instead. Only use this while
        /// no dispatcher is running.
        #[arg(long)]
        stuck: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StatusFilter {
    Pending,
    Processing,
    Done,
    Failed,
}

impl From<StatusFilter> for EventStatus {
    fn from(filter: StatusFilter) -> Self {
        match filter {
            StatusFilter::Pending => EventStatus::Pending,
            StatusFilter::Processing => EventStatus::Processing,
            StatusFilter::Done => EventStatus::Done,
            StatusFilter::Failed => EventStatus::Failed,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable output with colors
    Pretty,
    /// JSON output for scripting
    Json,
}

/// Run the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    event_dispatcher::init_tracing(if cli.verbose { "debug" } else { "warn" });

    let db_path = cli.db.unwrap_or_else(default_db_path);
    let store = Arc::new(SqliteEventStore::open(&db_path)?);

    match cli.command {
        Commands::Emit { name, payload } => run_emit(store, &name, &payload),
        Commands::Run {
            workers,
            poll_interval_ms,
            batch_size,
            for_secs,
        } => run_dispatcher(
            store,
            workers,
            Duration::from_millis(poll_interval_ms),
            batch_size,
            for_secs.map(Duration::from_secs),
        ),
        Commands::Status { output } => run_status(store.as_ref(), output),
        Commands::List {
            status,
            limit,
            output,
        } => run_list(store.as_ref(), status.map(Into::into), limit, output),
        Commands::Requeue { stuck } => run_requeue(store.as_ref(), stuck),
    }
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("event-dispatcher")
        .join("events.db")
}

fn run_emit(store: Arc<SqliteEventStore>, name: &str, payload: &str) -> Result<()> {
    let value: serde_json::Value = serde_json::from_str(payload)
        .map_err(|e| DispatchError::Input(format!("payload is not valid JSON: {}", e)))?;

    let id = EventEmitter::new(store).emit(name, &value)?;

    println!("{}", id);
    Ok(())
}

fn run_dispatcher(
    store: Arc<SqliteEventStore>,
    workers: usize,
    poll_interval: Duration,
    batch_size: usize,
    run_for: Option<Duration>,
) -> Result<()> {
    let term = Term::stderr();

    let mut registry = HandlerRegistry::new();
    handlers::register_builtin(&mut registry)?;

    let (sender, receiver) = MonitorChannel::new();
    let db_path = store.path().to_path_buf();

    let dispatcher = Dispatcher::builder(store, registry)
        .workers(workers)
        .poll_interval(poll_interval)
        .batch_size(batch_size)
        .monitor(sender)
        .build()?;

    term.write_line(&format!(
        "{} {} with {} workers, handlers: {}",
        style("Dispatching").bold().cyan(),
        db_path.display(),
        workers,
        dispatcher.registry().names().join(", ")
    ))
    .ok();

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone())?;

    if let Some(run_for) = run_for {
        let timer = cancel.clone();
        thread::spawn(move || {
            if !timer.wait_timeout(run_for) {
                timer.cancel();
            }
        });
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {elapsed} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(120));

    let spinner_clone = spinner.clone();

    // Handle notices in a separate thread
    let notice_thread = thread::spawn(move || {
        let mut done = 0usize;
        let mut failed = 0usize;

        for notice in receiver.iter() {
            match notice {
                DispatchNotice::Completed { outcome, name, .. } => {
                    match outcome {
                        Outcome::Done => done += 1,
                        Outcome::Failed { error } => {
                            failed += 1;
                            spinner_clone.println(format!(
                                "{} {}: {}",
                                style("✗").red(),
                                name,
                                error
                            ));
                        }
                    }
                    spinner_clone.set_message(format!("{} done, {} failed", done, failed));
                }
                DispatchNotice::ClaimFailed { message } => {
                    spinner_clone.set_message(format!("claim failed: {}", message));
                }
                DispatchNotice::WriteBackFailed { event_id, message } => {
                    spinner_clone.println(format!(
                        "{} could not store result for {}: {}",
                        style("!").yellow(),
                        event_id,
                        message
                    ));
                }
                DispatchNotice::Draining => {
                    spinner_clone.set_message("draining...");
                }
                DispatchNotice::Stopped { .. } => {
                    spinner_clone.finish_and_clear();
                }
                _ => {}
            }
        }
    });

    let summary = dispatcher.run(&cancel);

    // Drop the dispatcher's sender so the notice thread finishes
    drop(dispatcher);
    notice_thread.join().ok();

    print_summary(&term, &summary);
    Ok(())
}

/// Cancel `cancel` when the process receives Ctrl-C
fn cancel_on_ctrl_c(cancel: CancellationToken) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| DispatchError::Runtime(e.to_string()))?;

    thread::spawn(move || {
        runtime.block_on(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupt received, shutting down");
                cancel.cancel();
            }
        });
    });

    Ok(())
}

fn print_summary(term: &Term, summary: &DispatchSummary) {
    term.write_line(&format!(
        "{} Dispatcher stopped after {:.1}s",
        style("✓").green().bold(),
        summary.duration_ms as f64 / 1000.0
    ))
    .ok();
    term.write_line(&format!("  {} claimed", style(summary.claimed).cyan())).ok();
    term.write_line(&format!("  {} done", style(summary.done).green())).ok();
    term.write_line(&format!("  {} failed", style(summary.failed).red())).ok();

    if summary.claim_errors > 0 {
        term.write_line(&format!(
            "  {} failed claims",
            style(summary.claim_errors).yellow()
        ))
        .ok();
    }

    if summary.write_failures > 0 {
        term.write_line(&format!(
            "  {} results not stored, run `event-dispatch requeue --stuck` once stopped",
            style(summary.write_failures).yellow()
        ))
        .ok();
    }
}

fn run_status(store: &dyn EventStore, output: OutputFormat) -> Result<()> {
    let stats = store.stats()?;

    match output {
        OutputFormat::Pretty => print_pretty_stats(&stats),
        OutputFormat::Json => print_json(&serde_json::json!(stats))?,
    }

    Ok(())
}

fn print_pretty_stats(stats: &StoreStats) {
    println!("{:<12}{}", style("pending").bold(), stats.pending);
    println!("{:<12}{}", style("processing").bold(), stats.processing);
    println!("{:<12}{}", style("done").bold(), stats.done);
    println!("{:<12}{}", style("failed").bold(), stats.failed);
    println!("{:<12}{}", style("total").dim(), stats.total());
}

fn run_list(
    store: &dyn EventStore,
    status: Option<EventStatus>,
    limit: usize,
    output: OutputFormat,
) -> Result<()> {
    let events = store.list(status, limit)?;

    match output {
        OutputFormat::Pretty => print_pretty_events(&events),
        OutputFormat::Json => {
            let rows: Vec<_> = events.iter().map(event_json).collect();
            print_json(&serde_json::Value::Array(rows))?;
        }
    }

    Ok(())
}

fn print_pretty_events(events: &[Event]) {
    if events.is_empty() {
        println!("{}", style("No events").dim());
        return;
    }

    for event in events {
        let status = match event.status {
            EventStatus::Pending => style(event.status.as_str()).yellow(),
            EventStatus::Processing => style(event.status.as_str()).cyan(),
            EventStatus::Done => style(event.status.as_str()).green(),
            EventStatus::Failed => style(event.status.as_str()).red(),
        };

        println!(
            "{}  {:<10}  {}  {}",
            style(event.id).dim(),
            status,
            event.created_at.format("%Y-%m-%d %H:%M:%S"),
            event.name
        );

        if event.status.is_terminal() {
            if let Some(at) = event.processed_at {
                println!("    {} {}", style("finished").dim(), at.format("%Y-%m-%d %H:%M:%S"));
            }
        }

        if let Some(error) = &event.error {
            println!("    {}", style(error).red());
        }
    }
}

/// JSON view of an event with the payload decoded where possible
fn event_json(event: &Event) -> serde_json::Value {
    let payload = serde_json::from_slice::<serde_json::Value>(&event.payload).unwrap_or_else(|_| {
        serde_json::Value::String(String::from_utf8_lossy(&event.payload).into_owned())
    });

    serde_json::json!({
        "id": event.id,
        "name": event.name,
        "status": event.status,
        "payload": payload,
        "error": event.error,
        "created_at": event.created_at,
        "processed_at": event.processed_at,
    })
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| DispatchError::Runtime(format!("failed to render JSON: {}", e)))?;
    println!("{}", text);
    Ok(())
}

fn run_requeue(store: &dyn EventStore, stuck: bool) -> Result<()> {
    let (count, from) = if stuck {
        (store.reset_processing()?, "processing")
    } else {
        (store.requeue_failed()?, "failed")
    };

    println!(
        "{} {} {} event(s) moved back to pending",
        style("↺").cyan(),
        count,
        from
    );
    Ok(())
}
