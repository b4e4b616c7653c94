//! The per-task point-read loop.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, error, info};

use latency_store::{ContainerRef, DocumentStore};

use crate::corpus::Corpus;
use crate::sampler::DiagnosticsSampler;
use crate::signal::StopSignal;
use crate::stats::{ReadOutcome, ReadStats};

/// Everything a reader needs, shared read-only across the pool.
pub(crate) struct ReaderContext {
    pub store: Arc<dyn DocumentStore>,
    pub container: ContainerRef,
    pub corpus: Corpus,
    pub stop: StopSignal,
    pub stats: ReadStats,
    pub sampler: DiagnosticsSampler,
    pub started: AtomicUsize,
    pub finished: AtomicUsize,
}

/// Read random corpus members until the stop signal is set.
///
/// Failures are logged and counted; they never end the loop.
pub(crate) async fn run_reader(ctx: Arc<ReaderContext>, sequence: usize) {
    info!(reader = sequence, "Starting reader");
    ctx.started.fetch_add(1, Ordering::SeqCst);
    let mut rng = StdRng::from_entropy();

    while !ctx.stop.is_stopped() {
        let id = ctx.corpus.pick(&mut rng);
        let sampled = ctx.sampler.sample(&mut rng);

        let started = Instant::now();
        let result = ctx.store.read_item(&ctx.container, id, id).await;
        let latency = started.elapsed();

        match result {
            Ok(resp) if resp.is_ok() => {
                ctx.stats.record(ReadOutcome::Success, latency);
                if sampled {
                    debug!(reader = sequence, id, diagnostics = %resp.diagnostics, "Read completed");
                }
            }
            Ok(resp) => {
                ctx.stats.record(ReadOutcome::Status(resp.status), latency);
                if sampled {
                    error!(
                        reader = sequence,
                        id,
                        status = resp.status,
                        diagnostics = %resp.diagnostics,
                        "Failure reading document"
                    );
                } else {
                    error!(reader = sequence, id, status = resp.status, "Failure reading document");
                }
            }
            Err(e) => {
                ctx.stats.record(ReadOutcome::Error(e.status()), latency);
                match e.diagnostics().filter(|_| sampled) {
                    Some(diagnostics) => error!(
                        reader = sequence,
                        id,
                        error = %e,
                        diagnostics = %diagnostics,
                        "Exception reading document"
                    ),
                    None => error!(reader = sequence, id, error = %e, "Exception reading document"),
                }
            }
        }
    }

    ctx.finished.fetch_add(1, Ordering::SeqCst);
    info!(reader = sequence, "Completed reader");
}
