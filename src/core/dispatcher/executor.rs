//! Dispatcher configuration, construction and the run loop.

use super::cancel::CancellationToken;
use super::worker::Completion;
use crate::core::registry::HandlerRegistry;
use crate::core::store::{Event, EventStore};
use crate::error::ConfigError;
use crate::monitor::{null_sender, DispatchNotice, DispatchSummary, MonitorSender};
use crossbeam_channel::bounded;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, ScopedJoinHandle};
use std::time::{Duration, Instant};

/// Configuration for the dispatcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Time between claim attempts
    pub poll_interval: Duration,
    /// Number of worker threads
    pub workers: usize,
    /// Maximum events claimed per poll
    pub batch_size: usize,
    /// Capacity of the poller -> workers queue
    pub job_queue_capacity: usize,
    /// Capacity of the workers -> writer queue
    pub result_queue_capacity: usize,
    /// Extra attempts for a failed terminal write
    pub write_retries: u32,
    /// Delay before the first write retry, doubled each attempt
    pub write_retry_backoff: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            workers: 4,
            batch_size: 10,
            job_queue_capacity: 100,
            result_queue_capacity: 100,
            write_retries: 3,
            write_retry_backoff: Duration::from_millis(50),
        }
    }
}

impl DispatcherConfig {
    /// Reject values the run loop cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::ZeroPollInterval);
        }
        if self.job_queue_capacity == 0 {
            return Err(ConfigError::ZeroCapacity { queue: "Job" });
        }
        if self.result_queue_capacity == 0 {
            return Err(ConfigError::ZeroCapacity { queue: "Result" });
        }
        Ok(())
    }
}

/// Builder for dispatcher configuration
pub struct DispatcherBuilder {
    config: DispatcherConfig,
    store: Arc<dyn EventStore>,
    registry: HandlerRegistry,
    monitor: Option<MonitorSender>,
}

impl DispatcherBuilder {
    fn new(store: Arc<dyn EventStore>, registry: HandlerRegistry) -> Self {
        Self {
            config: DispatcherConfig::default(),
            store,
            registry,
            monitor: None,
        }
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the poll interval
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Set the number of workers
    pub fn workers(mut self, workers: usize) -> Self {
        self.config.workers = workers;
        self
    }

    /// Set the claim batch size
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.config.batch_size = batch_size;
        self
    }

    /// Set the job queue capacity
    pub fn job_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.job_queue_capacity = capacity;
        self
    }

    /// Set the result queue capacity
    pub fn result_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.result_queue_capacity = capacity;
        self
    }

    /// Set write-back retry count and initial backoff
    pub fn write_retries(mut self, retries: u32, backoff: Duration) -> Self {
        self.config.write_retries = retries;
        self.config.write_retry_backoff = backoff;
        self
    }

    /// Send progress notices to `sender`
    pub fn monitor(mut self, sender: MonitorSender) -> Self {
        self.monitor = Some(sender);
        self
    }

    /// Build the dispatcher
    pub fn build(self) -> Result<Dispatcher, ConfigError> {
        self.config.validate()?;

        Ok(Dispatcher {
            config: self.config,
            store: self.store,
            registry: Arc::new(self.registry),
            monitor: self.monitor.unwrap_or_else(null_sender),
        })
    }
}

/// Counters shared by the dispatcher threads during one run
#[derive(Default)]
pub(super) struct RunStats {
    pub claimed: AtomicUsize,
    pub done: AtomicUsize,
    pub failed: AtomicUsize,
    pub claim_errors: AtomicUsize,
    pub write_failures: AtomicUsize,
}

impl RunStats {
    fn summary(&self, duration: Duration) -> DispatchSummary {
        DispatchSummary {
            claimed: self.claimed.load(Ordering::SeqCst),
            done: self.done.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            claim_errors: self.claim_errors.load(Ordering::SeqCst),
            write_failures: self.write_failures.load(Ordering::SeqCst),
            duration_ms: duration.as_millis() as u64,
        }
    }
}

/// Polls the store, fans events out to workers and writes results back
pub struct Dispatcher {
    pub(super) config: DispatcherConfig,
    pub(super) store: Arc<dyn EventStore>,
    pub(super) registry: Arc<HandlerRegistry>,
    pub(super) monitor: MonitorSender,
}

impl Dispatcher {
    /// Create a new dispatcher builder
    pub fn builder(store: Arc<dyn EventStore>, registry: HandlerRegistry) -> DispatcherBuilder {
        DispatcherBuilder::new(store, registry)
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Run until `cancel` fires, then drain and return
    ///
    /// Shutdown order:
    /// 1. the poller stops claiming and drops the only job sender
    /// 2. workers finish every queued job, then exit
    /// 3. the last worker to exit drops the last result sender
    /// 4. the writer stores every queued result, then exits
    ///
    /// Every event claimed before cancellation gets a terminal write
    /// attempt before this returns.
    pub fn run(&self, cancel: &CancellationToken) -> DispatchSummary {
        let start_time = Instant::now();
        let stats = RunStats::default();

        let (job_tx, job_rx) = bounded::<Event>(self.config.job_queue_capacity);
        let (result_tx, result_rx) = bounded::<Completion>(self.config.result_queue_capacity);

        tracing::info!(
            workers = self.config.workers,
            batch_size = self.config.batch_size,
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            handlers = self.registry.len(),
            "dispatcher starting"
        );
        self.monitor.send(DispatchNotice::Started {
            workers: self.config.workers,
        });

        thread::scope(|s| {
            let poller = s.spawn(|| self.poll_loop(job_tx, cancel, &stats));

            let workers: Vec<_> = (0..self.config.workers)
                .map(|index| {
                    let jobs = job_rx.clone();
                    let results = result_tx.clone();
                    s.spawn(move || self.worker_loop(index, jobs, results, cancel))
                })
                .collect();

            // Only the worker threads may hold these from here on
            drop(job_rx);
            drop(result_tx);

            let writer = s.spawn(|| self.writer_loop(result_rx, &stats));

            join(poller, "poller");
            tracing::info!("dispatcher draining");
            self.monitor.send(DispatchNotice::Draining);

            for worker in workers {
                join(worker, "worker");
            }

            join(writer, "writer");
        });

        let summary = stats.summary(start_time.elapsed());
        tracing::info!(
            claimed = summary.claimed,
            done = summary.done,
            failed = summary.failed,
            write_failures = summary.write_failures,
            "dispatcher stopped"
        );
        self.monitor.send(DispatchNotice::Stopped {
            summary: summary.clone(),
        });

        summary
    }
}

fn join(handle: ScopedJoinHandle<'_, ()>, role: &str) {
    if handle.join().is_err() {
        tracing::error!(role, "dispatcher thread panicked");
    }
}
