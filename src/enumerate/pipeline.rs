//! Producer / worker pipeline and run lifecycle

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, error, info, trace, warn};

use super::progress::{ProgressSnapshot, ProgressTracker};
use super::shutdown::ShutdownSignal;
use super::source::{CandidateSource, CombinatorialSource};
use super::state::{CheckpointManager, Cursor, RunState};
use crate::error::{Result, UserForgeError};
use crate::probe::Probe;
use crate::types::{EnumConfig, ProbeOutcome, Target};

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The source was exhausted and every candidate was probed
    Completed,
    /// Shutdown was requested before the source was exhausted
    Interrupted,
}

/// What happened to the checkpoint at the end of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckpointStatus {
    Saved(Cursor),
    Failed(String),
    /// List mode keeps no resume state
    NotApplicable,
}

/// Summary of a finished run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub stats: ProgressSnapshot,
    /// Usernames the probe confirmed, in completion order
    pub valid: Vec<String>,
    /// Where a resumed run would start
    pub resume_cursor: Option<Cursor>,
    pub checkpoint: CheckpointStatus,
    /// Most candidates produced but not yet finished at any one time
    pub peak_in_flight: usize,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn is_complete(&self) -> bool {
        self.outcome == RunOutcome::Completed
    }

    /// Process exit status for this report
    pub fn exit_code(&self) -> i32 {
        match (&self.outcome, &self.checkpoint) {
            (_, CheckpointStatus::Failed(_)) => 1,
            (RunOutcome::Interrupted, _) => 1,
            (RunOutcome::Completed, _) => 0,
        }
    }
}

enum ProducerExit {
    Exhausted,
    Cancelled,
}

struct Job {
    seq: u64,
    username: String,
}

/// Candidates handed out by the producer and not yet finished by a worker.
///
/// The earliest pending position is where a resumed run has to start.
#[derive(Debug, Default)]
struct InFlight {
    inner: parking_lot::Mutex<InFlightInner>,
}

#[derive(Debug, Default)]
struct InFlightInner {
    next_seq: u64,
    pending: BTreeMap<u64, Option<Cursor>>,
    peak: usize,
}

impl InFlight {
    fn register(&self, position: Option<Cursor>) -> u64 {
        let mut inner = self.inner.lock();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.pending.insert(seq, position);
        inner.peak = inner.peak.max(inner.pending.len());
        seq
    }

    fn complete(&self, seq: u64) {
        self.inner.lock().pending.remove(&seq);
    }

    fn low_water(&self) -> Option<Cursor> {
        self.inner.lock().pending.values().flatten().next().copied()
    }

    fn peak(&self) -> usize {
        self.inner.lock().peak
    }
}

#[derive(Clone)]
struct WorkerContext {
    queue: Arc<Mutex<mpsc::Receiver<Job>>>,
    probe: Arc<dyn Probe>,
    target: Arc<Target>,
    progress: Arc<ProgressTracker>,
    in_flight: Arc<InFlight>,
    valid: Arc<parking_lot::Mutex<Vec<String>>>,
}

/// Drives one enumeration run: a single producer feeding a fixed pool of
/// probe workers through a queue bounded to the thread count.
pub struct Enumerator {
    config: EnumConfig,
    probe: Arc<dyn Probe>,
    progress: Arc<ProgressTracker>,
    shutdown: ShutdownSignal,
    checkpoint: CheckpointManager,
}

impl Enumerator {
    /// Create a new enumerator
    pub fn new(config: EnumConfig, probe: impl Probe + 'static) -> Result<Self> {
        Self::with_probe(config, Arc::new(probe))
    }

    pub fn with_probe(config: EnumConfig, probe: Arc<dyn Probe>) -> Result<Self> {
        config.validate()?;
        let checkpoint = CheckpointManager::new(config.state_file.clone());
        Ok(Self {
            config,
            probe,
            progress: Arc::new(ProgressTracker::new()),
            shutdown: ShutdownSignal::new(),
            checkpoint,
        })
    }

    /// Use an externally owned shutdown signal
    pub fn with_shutdown(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    pub fn progress(&self) -> Arc<ProgressTracker> {
        Arc::clone(&self.progress)
    }

    pub fn checkpoint(&self) -> &CheckpointManager {
        &self.checkpoint
    }

    pub fn config(&self) -> &EnumConfig {
        &self.config
    }

    /// Position `source` at the saved cursor, if a state file exists
    pub fn resume_source(&self, source: CombinatorialSource) -> Result<CombinatorialSource> {
        self.checkpoint.restore(source)
    }

    /// Run until the source is exhausted or shutdown is requested
    pub async fn run(&self, source: impl Into<CandidateSource>) -> Result<RunReport> {
        let mut source = source.into();
        let started_at = Utc::now();
        let start = Instant::now();
        let threads = self.config.threads;

        let (tx, rx) = mpsc::channel::<Job>(threads);
        let in_flight = Arc::new(InFlight::default());
        let ctx = WorkerContext {
            queue: Arc::new(Mutex::new(rx)),
            probe: Arc::clone(&self.probe),
            target: Arc::new(self.config.target.clone()),
            progress: Arc::clone(&self.progress),
            in_flight: Arc::clone(&in_flight),
            valid: Arc::new(parking_lot::Mutex::new(Vec::new())),
        };

        let mut workers = JoinSet::new();
        for id in 0..threads {
            workers.spawn(run_worker(id, ctx.clone()));
        }

        info!(
            source = source.kind(),
            threads,
            probe = self.probe.name(),
            realm = %ctx.target.realm(),
            total = ?source.total(),
            start = ?source.cursor(),
            "Starting enumeration"
        );

        // `tx` moves into the producer; returning drops it and closes the queue.
        let produced = self.produce(&mut source, tx, &in_flight).await;

        let outcome = match produced {
            Ok(ProducerExit::Exhausted) => {
                join_workers(&mut workers).await;
                RunOutcome::Completed
            }
            Ok(ProducerExit::Cancelled) | Err(_) => {
                self.drain_workers(&mut workers).await;
                RunOutcome::Interrupted
            }
        };

        let resume_cursor = source
            .cursor()
            .map(|next| in_flight.low_water().unwrap_or(next));
        let checkpoint = match resume_cursor {
            Some(cursor) => self.save_checkpoint(cursor, source.fingerprint()),
            None => CheckpointStatus::NotApplicable,
        };

        // A failed source is reported after the checkpoint had its chance.
        produced?;

        let stats = self.progress.snapshot();
        let elapsed = start.elapsed();
        match outcome {
            RunOutcome::Completed => info!(
                "Done! Tested {} usernames ({} valid) in {:.3} seconds",
                stats.attempted,
                stats.confirmed,
                elapsed.as_secs_f64()
            ),
            RunOutcome::Interrupted => warn!(
                attempted = stats.attempted,
                confirmed = stats.confirmed,
                resume = ?resume_cursor,
                "Enumeration interrupted"
            ),
        }

        let valid = std::mem::take(&mut *ctx.valid.lock());
        Ok(RunReport {
            outcome,
            stats,
            valid,
            resume_cursor,
            checkpoint,
            peak_in_flight: in_flight.peak(),
            started_at,
            elapsed,
        })
    }

    async fn produce(
        &self,
        source: &mut CandidateSource,
        tx: mpsc::Sender<Job>,
        in_flight: &InFlight,
    ) -> Result<ProducerExit> {
        loop {
            let next = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => return Ok(ProducerExit::Cancelled),
                next = source.next_candidate() => next,
            };
            let candidate = match next {
                Ok(Some(candidate)) => candidate,
                Ok(None) => return Ok(ProducerExit::Exhausted),
                Err(e) => {
                    error!(error = %e, "Failed to read candidates");
                    return Err(e);
                }
            };

            // Registered before the delay so an interrupt at any point below
            // keeps this candidate in the resume window.
            let seq = in_flight.register(candidate.position);

            if !self.config.delay.is_zero() {
                tokio::select! {
                    biased;
                    _ = self.shutdown.cancelled() => return Ok(ProducerExit::Cancelled),
                    _ = tokio::time::sleep(self.config.delay) => {}
                }
            }

            let job = Job {
                seq,
                username: candidate.username,
            };
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => return Ok(ProducerExit::Cancelled),
                sent = tx.send(job) => {
                    if sent.is_err() {
                        return Err(UserForgeError::internal("All probe workers exited"));
                    }
                }
            }
        }
    }

    /// Let workers finish queued candidates for at most `drain_timeout`
    async fn drain_workers(&self, workers: &mut JoinSet<()>) {
        let timeout = self.config.drain_timeout;
        if tokio::time::timeout(timeout, join_workers(workers)).await.is_err() {
            warn!(
                remaining = workers.len(),
                timeout_secs = timeout.as_secs_f64(),
                "Workers did not drain in time, aborting them"
            );
            workers.abort_all();
            while workers.join_next().await.is_some() {}
        }
    }

    fn save_checkpoint(&self, cursor: Cursor, fingerprint: Option<String>) -> CheckpointStatus {
        match self.checkpoint.save(&RunState::new(cursor, fingerprint)) {
            Ok(()) => {
                info!(cursor = %cursor, path = %self.checkpoint.path().display(), "State saved");
                CheckpointStatus::Saved(cursor)
            }
            Err(e) => {
                error!(error = %e, "Failed to save state, this run cannot be resumed");
                CheckpointStatus::Failed(e.to_string())
            }
        }
    }
}

async fn join_workers(workers: &mut JoinSet<()>) {
    while let Some(joined) = workers.join_next().await {
        if let Err(e) = joined {
            if e.is_panic() {
                error!(error = %e, "Probe worker panicked");
            }
        }
    }
}

async fn run_worker(id: usize, ctx: WorkerContext) {
    loop {
        let job = {
            let mut queue = ctx.queue.lock().await;
            queue.recv().await
        };
        let Some(job) = job else { break };

        let outcome = ctx.probe.probe(&job.username, &ctx.target).await;
        ctx.progress.record(&outcome);

        match &outcome {
            ProbeOutcome::Valid => {
                info!(
                    username = %job.username,
                    "[+] VALID USERNAME: {}@{}",
                    job.username,
                    ctx.target.domain
                );
                ctx.valid.lock().push(job.username);
            }
            ProbeOutcome::Invalid => trace!(username = %job.username, "Not found"),
            ProbeOutcome::Error(e) => debug!(username = %job.username, error = %e, "Probe inconclusive"),
        }

        ctx.in_flight.complete(job.seq);
    }
    trace!(worker = id, "Queue closed, worker exiting");
}
