//! Workload lifecycle: seed, run readers, stop, drain.
//!
//! ```text
//! Uninitialized --initialize--> Seeding --start--> Running
//!     Running --stop--> Stopping --shutdown--> Stopped
//! ```
//!
//! Seeding always completes before the first reader is spawned. Stopping is
//! cooperative: readers finish their in-flight read and exit on the next
//! flag check. Readers still running after the grace period are aborted.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::{JoinHandle, JoinSet};
use tracing::{info, warn};

use latency_core::Settings;
use latency_store::{ContainerRef, ContainerSpec, DocumentStore};

use crate::corpus::{Corpus, DOC_COUNT};
use crate::document::build_document;
use crate::error::WorkloadError;
use crate::reader::{run_reader, ReaderContext};
use crate::sampler::DiagnosticsSampler;
use crate::signal::StopSignal;
use crate::stats::{ReadStats, StatsSnapshot};

/// Autoscale ceiling for a container the workload has to create.
pub const DEFAULT_MAX_THROUGHPUT: u32 = 100_000;

/// How long shutdown waits for readers to drain.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkloadState {
    Uninitialized,
    Seeding,
    Running,
    Stopping,
    Stopped,
}

#[derive(Debug, Clone)]
pub struct WorkloadConfig {
    pub container: ContainerRef,
    pub concurrency: usize,
    pub property_count: usize,
    pub doc_count: usize,
    pub max_throughput: u32,
    pub diagnostics_sampling_rate: f64,
    pub grace_period: Duration,
    pub report_interval: Option<Duration>,
}

impl WorkloadConfig {
    pub fn new(container: ContainerRef) -> Self {
        Self {
            container,
            concurrency: 1,
            property_count: 20,
            doc_count: DOC_COUNT,
            max_throughput: DEFAULT_MAX_THROUGHPUT,
            diagnostics_sampling_rate: 1.0,
            grace_period: DEFAULT_GRACE_PERIOD,
            report_interval: None,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            concurrency: settings.concurrency,
            property_count: settings.property_count,
            diagnostics_sampling_rate: settings.diagnostics_sampling_rate,
            report_interval: settings.report_interval,
            ..Self::new(ContainerRef::new(
                settings.database_id.clone(),
                settings.container_id.clone(),
            ))
        }
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn property_count(mut self, property_count: usize) -> Self {
        self.property_count = property_count;
        self
    }

    pub fn doc_count(mut self, doc_count: usize) -> Self {
        self.doc_count = doc_count;
        self
    }

    pub fn grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    pub fn report_interval(mut self, interval: Option<Duration>) -> Self {
        self.report_interval = interval;
        self
    }
}

/// Handle to the spawned readers, consumed by [`Workload::shutdown`].
pub struct ReaderPool {
    readers: JoinSet<()>,
    reporter: Option<JoinHandle<()>>,
    spawned: usize,
}

impl ReaderPool {
    /// Number of readers that were launched.
    pub fn spawned(&self) -> usize {
        self.spawned
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Every reader observed the stop flag within the grace period.
    Graceful,
    /// Some readers were still running and have been aborted.
    TimedOut { abandoned: usize },
}

struct Lifecycle {
    state: WorkloadState,
    seeded: bool,
}

pub struct Workload {
    config: WorkloadConfig,
    store: Arc<dyn DocumentStore>,
    corpus: Corpus,
    stop: StopSignal,
    stats: ReadStats,
    lifecycle: Mutex<Lifecycle>,
    context: Mutex<Option<Arc<ReaderContext>>>,
}

impl Workload {
    /// Create a workload and generate its corpus. Nothing is sent to the
    /// store until [`Workload::initialize`].
    pub fn new(config: WorkloadConfig, store: Arc<dyn DocumentStore>) -> Self {
        let corpus = Corpus::generate(config.doc_count);
        Self {
            config,
            store,
            corpus,
            stop: StopSignal::new(),
            stats: ReadStats::new(),
            lifecycle: Mutex::new(Lifecycle {
                state: WorkloadState::Uninitialized,
                seeded: false,
            }),
            context: Mutex::new(None),
        }
    }

    pub fn state(&self) -> WorkloadState {
        self.lifecycle().state
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    pub fn config(&self) -> &WorkloadConfig {
        &self.config
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Readers that have entered their loop.
    pub fn readers_started(&self) -> usize {
        self.with_context(|ctx| ctx.started.load(Ordering::SeqCst))
    }

    /// Readers that have left their loop.
    pub fn readers_finished(&self) -> usize {
        self.with_context(|ctx| ctx.finished.load(Ordering::SeqCst))
    }

    /// Ensure database and container exist, then write every corpus document.
    ///
    /// The first failed write aborts seeding; the workload is then unusable.
    pub async fn initialize(&self) -> Result<(), WorkloadError> {
        self.transition("initialize", WorkloadState::Uninitialized, WorkloadState::Seeding)?;
        info!("Initializing workload...");

        let result = self.seed().await;
        let mut lifecycle = self.lifecycle();
        match result {
            Ok(()) => {
                lifecycle.seeded = true;
                info!(documents = self.corpus.len(), "Initialization finished.");
                Ok(())
            }
            Err(e) => {
                lifecycle.state = WorkloadState::Stopped;
                Err(e)
            }
        }
    }

    async fn seed(&self) -> Result<(), WorkloadError> {
        let container = &self.config.container;

        self.store
            .create_database_if_not_exists(&container.database_id)
            .await
            .map_err(|source| WorkloadError::Setup {
                what: format!("database {}", container.database_id),
                source,
            })?;

        let spec = ContainerSpec::partitioned_by_id(
            container.container_id.clone(),
            self.config.max_throughput,
        );
        self.store
            .create_container_if_not_exists(&container.database_id, &spec)
            .await
            .map_err(|source| WorkloadError::Setup {
                what: format!("container {}", container.link()),
                source,
            })?;

        for (index, id) in self.corpus.ids().iter().enumerate() {
            let doc = build_document(id, self.config.property_count);
            self.store
                .create_item(container, id, &doc)
                .await
                .map_err(|source| WorkloadError::Seed {
                    index,
                    id: id.clone(),
                    source,
                })?;
        }
        Ok(())
    }

    /// Launch exactly `concurrency` readers. Requires completed seeding.
    pub fn start(&self) -> Result<ReaderPool, WorkloadError> {
        {
            let mut lifecycle = self.lifecycle();
            if lifecycle.state != WorkloadState::Seeding || !lifecycle.seeded {
                return Err(WorkloadError::InvalidState {
                    action: "start",
                    state: lifecycle.state,
                });
            }
            lifecycle.state = WorkloadState::Running;
        }

        let ctx = Arc::new(ReaderContext {
            store: Arc::clone(&self.store),
            container: self.config.container.clone(),
            corpus: self.corpus.clone(),
            stop: self.stop.clone(),
            stats: self.stats.clone(),
            sampler: DiagnosticsSampler::new(self.config.diagnostics_sampling_rate),
            started: AtomicUsize::new(0),
            finished: AtomicUsize::new(0),
        });
        *self.context.lock().unwrap_or_else(|e| e.into_inner()) = Some(Arc::clone(&ctx));

        let mut readers = JoinSet::new();
        for sequence in 0..self.config.concurrency {
            readers.spawn(run_reader(Arc::clone(&ctx), sequence));
        }

        let reporter = self
            .config
            .report_interval
            .map(|interval| spawn_reporter(self.stats.clone(), self.stop.clone(), interval));

        info!(readers = self.config.concurrency, "Workload running");
        Ok(ReaderPool {
            readers,
            reporter,
            spawned: self.config.concurrency,
        })
    }

    /// Request the readers to stop. Only the first call has an effect;
    /// in-flight reads are not interrupted.
    pub fn stop(&self) -> bool {
        if !self.stop.trigger() {
            return false;
        }
        let mut lifecycle = self.lifecycle();
        if lifecycle.state == WorkloadState::Running {
            lifecycle.state = WorkloadState::Stopping;
        }
        info!("Requested workload to stop...");
        true
    }

    /// Stop (if not already requested) and wait up to the grace period for
    /// every reader to exit.
    pub async fn shutdown(&self, mut pool: ReaderPool) -> ShutdownOutcome {
        self.stop();

        if let Some(reporter) = pool.reporter.take() {
            reporter.abort();
        }

        let drained = tokio::time::timeout(self.config.grace_period, async {
            while let Some(joined) = pool.readers.join_next().await {
                if let Err(e) = joined {
                    warn!(error = %e, "Reader task ended abnormally");
                }
            }
        })
        .await;

        let outcome = match drained {
            Ok(()) => ShutdownOutcome::Graceful,
            Err(_) => {
                let abandoned = pool.readers.len();
                warn!(
                    abandoned,
                    grace_period = ?self.config.grace_period,
                    "Could not shutdown gracefully..."
                );
                pool.readers.abort_all();
                ShutdownOutcome::TimedOut { abandoned }
            }
        };

        self.lifecycle().state = WorkloadState::Stopped;
        outcome
    }

    fn transition(
        &self,
        action: &'static str,
        from: WorkloadState,
        to: WorkloadState,
    ) -> Result<(), WorkloadError> {
        let mut lifecycle = self.lifecycle();
        if lifecycle.state != from {
            return Err(WorkloadError::InvalidState {
                action,
                state: lifecycle.state,
            });
        }
        lifecycle.state = to;
        Ok(())
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn with_context<T: Default>(&self, f: impl FnOnce(&ReaderContext) -> T) -> T {
        let guard = self.context.lock().unwrap_or_else(|e| e.into_inner());
        guard.as_deref().map(f).unwrap_or_default()
    }
}

/// Log a statistics snapshot every `interval` until stopped.
fn spawn_reporter(stats: ReadStats, stop: StopSignal, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // Skip the immediate first tick
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if stop.is_stopped() {
                break;
            }
            info!(stats = %stats.snapshot(), "Progress");
        }
    })
}
