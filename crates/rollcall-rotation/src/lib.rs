//! Per-session token rotation for Rollcall.
//!
//! Every open session gets one background task that re-issues its token at
//! a fixed interval until the session closes or the job is stopped.
//!
//! # State machine (per session)
//!
//! ```text
//! Idle ──start/schedule──→ Running ──stop / session closed──→ Stopped
//!                             ↑                                  │
//!                             └──────────start/schedule──────────┘
//! ```
//!
//! # Tick loop
//!
//! Each job waits for the interval *or* its cancellation token, with no
//! lock held while suspended, then issues under the session lock:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         _ = cancel.cancelled() => return,
//!         _ = sleep_until(next) => {}
//!     }
//!     issuer.issue(session_id).await;
//! }
//! ```
//!
//! A tick that finds its session inactive removes its own registry entry
//! and exits. It only removes the entry if that entry is still its own, so
//! a job started later for the same session is never touched. The tick
//! re-checks its cancellation once it holds the session lock, so a job
//! stopped while the tick was waiting issues nothing.
//!
//! # Registry lock
//!
//! The registry lock is never held across store I/O or the session lock.
//! `start` reserves the session's slot, releases the lock, issues the
//! initial token, and re-locks to spawn. A `stop` that lands in between
//! withdraws the reservation and the start spawns nothing.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use rollcall_model::{ErrorKind, SessionId, Store, StoreError};
use rollcall_token::{TokenError, TokenIssuer};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

// ---------------------------------------------------------------------------
// State and stats
// ---------------------------------------------------------------------------

/// Rotation state of one session, as seen by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RotationState {
    /// Open session, no job.
    #[default]
    Idle,
    /// A rotation job is live, or `start` is issuing its first token.
    Running,
    /// The job was stopped while the session is still open, or the session
    /// is closed.
    Stopped,
}

/// Snapshot of scheduler counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RotationStats {
    /// Timer ticks that reached the issuance step.
    pub ticks: u64,
    /// Tokens issued, including the initial token from [`RotationScheduler::start`].
    pub tokens_issued: u64,
    /// Ticks whose issuance failed for a reason other than the session
    /// having closed. The job keeps running after these.
    pub failed_ticks: u64,
    pub jobs_started: u64,
    pub jobs_stopped: u64,
}

#[derive(Debug, Default)]
struct Counters {
    ticks: AtomicU64,
    tokens_issued: AtomicU64,
    failed_ticks: AtomicU64,
    jobs_started: AtomicU64,
    jobs_stopped: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> RotationStats {
        RotationStats {
            ticks: self.ticks.load(Ordering::Relaxed),
            tokens_issued: self.tokens_issued.load(Ordering::Relaxed),
            failed_ticks: self.failed_ticks.load(Ordering::Relaxed),
            jobs_started: self.jobs_started.load(Ordering::Relaxed),
            jobs_stopped: self.jobs_stopped.load(Ordering::Relaxed),
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from starting or scheduling rotation.
#[derive(Debug, thiserror::Error)]
pub enum RotationError {
    /// [`RotationScheduler::shutdown`] was called; no new jobs are accepted.
    #[error("rotation scheduler is shut down")]
    ShutDown,

    /// The initial issuance in [`RotationScheduler::start`] failed.
    #[error(transparent)]
    Token(#[from] TokenError),

    /// [`RotationScheduler::state`] could not read the session.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl RotationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ShutDown => ErrorKind::InvalidState,
            Self::Token(e) => e.kind(),
            Self::Store(e) => e.kind(),
        }
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

struct RotationJob {
    /// Distinguishes this job from a later one for the same session.
    id: u64,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

enum Slot {
    /// Held by `start` while it issues the initial token.
    Starting(u64),
    Running(RotationJob),
}

#[derive(Default)]
struct Registry {
    jobs: HashMap<SessionId, Slot>,
    /// Explicitly stopped sessions that are still open. Cleared by
    /// `release` once the session closes.
    stopped: HashSet<SessionId>,
    next_job_id: u64,
}

impl Registry {
    fn next_id(&mut self) -> u64 {
        self.next_job_id += 1;
        self.next_job_id
    }

    fn is_reserved_by(&self, session_id: SessionId, job_id: u64) -> bool {
        matches!(self.jobs.get(&session_id), Some(Slot::Starting(id)) if *id == job_id)
    }
}

struct Shared<S: Store> {
    issuer: Arc<TokenIssuer<S>>,
    interval: Duration,
    registry: Mutex<Registry>,
    counters: Counters,
    /// Parent of every job's token. Cancelled by `shutdown`.
    shutdown: CancellationToken,
}

impl<S: Store> Shared<S> {
    /// Removes the registry entry for `session_id` only if it belongs to
    /// `job_id`.
    async fn remove_job(&self, session_id: SessionId, job_id: u64) {
        let mut registry = self.registry.lock().await;
        let owned = matches!(
            registry.jobs.get(&session_id),
            Some(Slot::Running(job)) if job.id == job_id
        );
        if owned {
            registry.jobs.remove(&session_id);
            Counters::bump(&self.counters.jobs_stopped);
        }
    }
}

/// Runs one rotation job per active session.
///
/// Cheap to clone; clones share the same registry.
///
/// # Lock order
///
/// The registry lock is only held for bookkeeping; nothing waits on a
/// session lock or the store while holding it. Callers that close sessions
/// still call [`stop`](Self::stop) before taking the session lock so the
/// job is gone before its session is.
pub struct RotationScheduler<S: Store> {
    shared: Arc<Shared<S>>,
}

impl<S: Store> Clone for RotationScheduler<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S: Store> RotationScheduler<S> {
    /// Creates a scheduler that rotates at the issuer's configured interval.
    pub fn new(issuer: Arc<TokenIssuer<S>>) -> Self {
        let interval = issuer.config().rotation_interval;
        debug!(interval_secs = interval.as_secs(), "rotation scheduler created");
        Self {
            shared: Arc::new(Shared {
                issuer,
                interval,
                registry: Mutex::new(Registry::default()),
                counters: Counters::default(),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    pub fn interval(&self) -> Duration {
        self.shared.interval
    }

    pub fn issuer(&self) -> &Arc<TokenIssuer<S>> {
        &self.shared.issuer
    }

    /// Issues an initial token, then schedules recurring rotation.
    ///
    /// Returns `Ok(false)` without issuing if a job is already running for
    /// this session.
    ///
    /// # Errors
    /// - [`RotationError::Token`] if the initial issuance fails. Nothing is
    ///   scheduled in that case.
    /// - [`RotationError::ShutDown`] after [`shutdown`](Self::shutdown).
    ///
    /// If [`stop`](Self::stop) runs while the initial token is being
    /// issued, the token stays but no job is spawned and this returns
    /// `Ok(false)`.
    pub async fn start(&self, session_id: SessionId) -> Result<bool, RotationError> {
        let job_id = {
            let mut registry = self.shared.registry.lock().await;
            if self.shared.shutdown.is_cancelled() {
                return Err(RotationError::ShutDown);
            }
            if registry.jobs.contains_key(&session_id) {
                debug!(%session_id, "rotation already running");
                return Ok(false);
            }
            let job_id = registry.next_id();
            registry.jobs.insert(session_id, Slot::Starting(job_id));
            job_id
        };

        let issued = self.shared.issuer.issue(session_id).await;

        let mut registry = self.shared.registry.lock().await;
        let reserved = registry.is_reserved_by(session_id, job_id);
        if let Err(e) = issued {
            if reserved {
                registry.jobs.remove(&session_id);
            }
            return Err(e.into());
        }
        Counters::bump(&self.shared.counters.tokens_issued);

        if !reserved {
            if self.shared.shutdown.is_cancelled() {
                return Err(RotationError::ShutDown);
            }
            debug!(%session_id, job_id, "start withdrawn before its job spawned");
            return Ok(false);
        }
        self.spawn_locked(&mut registry, session_id, job_id);
        Ok(true)
    }

    /// Schedules recurring rotation without issuing a token first.
    ///
    /// Returns `Ok(false)` if a job is already running.
    ///
    /// # Errors
    /// [`RotationError::ShutDown`] after [`shutdown`](Self::shutdown).
    pub async fn schedule(&self, session_id: SessionId) -> Result<bool, RotationError> {
        let mut registry = self.shared.registry.lock().await;
        if self.shared.shutdown.is_cancelled() {
            return Err(RotationError::ShutDown);
        }
        if registry.jobs.contains_key(&session_id) {
            return Ok(false);
        }
        let job_id = registry.next_id();
        self.spawn_locked(&mut registry, session_id, job_id);
        Ok(true)
    }

    /// Cancels the session's rotation job, or withdraws a `start` that is
    /// still issuing.
    ///
    /// Idempotent: returns `false` if there was nothing to stop. Does not
    /// wait for an in-flight tick. A tick still waiting for the session
    /// lock sees the cancellation once it gets the lock and issues nothing.
    pub async fn stop(&self, session_id: SessionId) -> bool {
        let slot = {
            let mut registry = self.shared.registry.lock().await;
            let slot = registry.jobs.remove(&session_id);
            if slot.is_some() {
                registry.stopped.insert(session_id);
            }
            slot
        };

        match slot {
            Some(Slot::Running(job)) => {
                job.cancel.cancel();
                Counters::bump(&self.shared.counters.jobs_stopped);
                info!(%session_id, job_id = job.id, "rotation job stopped");
                true
            }
            Some(Slot::Starting(job_id)) => {
                info!(%session_id, job_id, "pending rotation start withdrawn");
                true
            }
            None => {
                debug!(%session_id, "stop: no rotation job running");
                false
            }
        }
    }

    /// Drops what the scheduler remembers about a closed session.
    ///
    /// Call once the session is closed. [`state`](Self::state) keeps
    /// reporting `Stopped` for it, from the store.
    pub async fn release(&self, session_id: SessionId) {
        self.shared.registry.lock().await.stopped.remove(&session_id);
    }

    /// Rotation state of one session. Falls back to the store when the
    /// scheduler holds nothing for it.
    ///
    /// # Errors
    /// [`RotationError::Store`] if that lookup fails.
    pub async fn state(&self, session_id: SessionId) -> Result<RotationState, RotationError> {
        {
            let registry = self.shared.registry.lock().await;
            if registry.jobs.contains_key(&session_id) {
                return Ok(RotationState::Running);
            }
            if registry.stopped.contains(&session_id) {
                return Ok(RotationState::Stopped);
            }
        }

        let session = self.shared.issuer.store().session(session_id).await?;
        Ok(match session {
            Some(session) if !session.is_active() => RotationState::Stopped,
            _ => RotationState::Idle,
        })
    }

    /// Number of live rotation jobs.
    pub async fn running_count(&self) -> usize {
        let registry = self.shared.registry.lock().await;
        registry
            .jobs
            .values()
            .filter(|slot| matches!(slot, Slot::Running(_)))
            .count()
    }

    pub fn stats(&self) -> RotationStats {
        self.shared.counters.snapshot()
    }

    /// Cancels every job, waits for them to exit, and refuses new ones.
    pub async fn shutdown(&self) {
        self.shared.shutdown.cancel();

        let jobs: Vec<(SessionId, RotationJob)> = {
            let mut registry = self.shared.registry.lock().await;
            let drained: Vec<_> = registry.jobs.drain().collect();
            let mut jobs = Vec::with_capacity(drained.len());
            for (session_id, slot) in drained {
                registry.stopped.insert(session_id);
                if let Slot::Running(job) = slot {
                    jobs.push((session_id, job));
                }
            }
            jobs
        };

        let count = jobs.len();
        for (session_id, job) in jobs {
            Counters::bump(&self.shared.counters.jobs_stopped);
            if let Err(e) = job.handle.await {
                if e.is_panic() {
                    warn!(%session_id, job_id = job.id, "rotation job panicked");
                }
            }
        }
        info!(stopped = count, "rotation scheduler shut down");
    }

    /// Spawns a job and registers it. Caller holds the registry lock.
    fn spawn_locked(&self, registry: &mut Registry, session_id: SessionId, job_id: u64) {
        let cancel = self.shared.shutdown.child_token();

        let handle = tokio::spawn(run_job(
            Arc::clone(&self.shared),
            session_id,
            job_id,
            cancel.clone(),
        ));

        registry.stopped.remove(&session_id);
        registry.jobs.insert(
            session_id,
            Slot::Running(RotationJob {
                id: job_id,
                cancel,
                handle,
            }),
        );
        Counters::bump(&self.shared.counters.jobs_started);
        info!(
            %session_id,
            job_id,
            interval_secs = self.shared.interval.as_secs(),
            "rotation job started"
        );
    }
}

async fn run_job<S: Store>(
    shared: Arc<Shared<S>>,
    session_id: SessionId,
    job_id: u64,
    cancel: CancellationToken,
) {
    let mut next = Instant::now() + shared.interval;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!(%session_id, job_id, "rotation job cancelled");
                return;
            }
            () = time::sleep_until(next) => {}
        }
        if cancel.is_cancelled() {
            return;
        }

        Counters::bump(&shared.counters.ticks);
        match shared
            .issuer
            .issue_if(session_id, || !cancel.is_cancelled())
            .await
        {
            Ok(Some(token)) => {
                Counters::bump(&shared.counters.tokens_issued);
                debug!(%session_id, token_id = %token.id, "rotation tick");
            }
            Ok(None) => {
                debug!(%session_id, job_id, "stopped while waiting for the session lock");
                return;
            }
            Err(TokenError::SessionNotActive(_) | TokenError::SessionNotFound(_)) => {
                info!(%session_id, job_id, "session no longer active, rotation job exiting");
                shared.remove_job(session_id, job_id).await;
                return;
            }
            Err(e) => {
                Counters::bump(&shared.counters.failed_ticks);
                warn!(%session_id, error = %e, "rotation tick failed, retrying next interval");
            }
        }

        // From now, not from the missed deadline: a slow store must not
        // cause a burst of back-to-back rotations.
        next = Instant::now() + shared.interval;
    }
}
