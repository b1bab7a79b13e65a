//! Integration tests for the rotation scheduler.
//!
//! All async tests run with `start_paused = true`, so the runtime
//! auto-advances time whenever every task is idle and a five-minute
//! interval elapses instantly.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rollcall_model::{
    MemoryStore, OwnerId, Session, SessionId, SessionLocks, SessionMetadata, Store,
};
use rollcall_rotation::{RotationError, RotationScheduler, RotationState};
use rollcall_token::{TokenConfig, TokenError, TokenIssuer};
use tokio::time::timeout;

// =========================================================================
// Helpers
// =========================================================================

const INTERVAL: Duration = Duration::from_secs(5 * 60);

fn scheduler(store: &Arc<MemoryStore>) -> RotationScheduler<MemoryStore> {
    scheduler_with_locks(store).0
}

/// A scheduler plus the session locks its issuer uses, so a test can hold
/// a session lock against it.
fn scheduler_with_locks(
    store: &Arc<MemoryStore>,
) -> (RotationScheduler<MemoryStore>, Arc<SessionLocks>) {
    let locks = Arc::new(SessionLocks::new());
    let issuer = TokenIssuer::new(Arc::clone(store), Arc::clone(&locks), TokenConfig::default());
    (RotationScheduler::new(Arc::new(issuer)), locks)
}

async fn open_session(store: &MemoryStore) -> SessionId {
    let session = Session::open(OwnerId(1), SessionMetadata::default(), Utc::now());
    let id = session.id;
    store.insert_session(session).await.unwrap();
    id
}

async fn token_count(store: &MemoryStore, id: SessionId) -> usize {
    store.tokens(id).await.unwrap().len()
}

async fn active_count(store: &MemoryStore, id: SessionId) -> usize {
    store
        .tokens(id)
        .await
        .unwrap()
        .iter()
        .filter(|t| t.active)
        .count()
}

// =========================================================================
// start / schedule
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_start_issues_initial_token_and_runs() {
    let store = Arc::new(MemoryStore::new());
    let rotation = scheduler(&store);
    let id = open_session(&store).await;

    assert_eq!(rotation.state(id).await.unwrap(), RotationState::Idle);
    assert!(rotation.start(id).await.unwrap());

    assert_eq!(rotation.state(id).await.unwrap(), RotationState::Running);
    assert_eq!(rotation.running_count().await, 1);
    assert_eq!(token_count(&store, id).await, 1);
    assert_eq!(rotation.interval(), INTERVAL);
}

#[tokio::test(start_paused = true)]
async fn test_start_twice_returns_false_without_issuing() {
    let store = Arc::new(MemoryStore::new());
    let rotation = scheduler(&store);
    let id = open_session(&store).await;

    assert!(rotation.start(id).await.unwrap());
    assert!(!rotation.start(id).await.unwrap());

    assert_eq!(token_count(&store, id).await, 1);
    assert_eq!(rotation.running_count().await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_start_closed_session_fails_and_schedules_nothing() {
    let store = Arc::new(MemoryStore::new());
    let rotation = scheduler(&store);
    let id = open_session(&store).await;
    store.close_session(id, Utc::now()).await.unwrap();

    let result = rotation.start(id).await;

    assert!(matches!(
        result,
        Err(RotationError::Token(TokenError::SessionNotActive(_)))
    ));
    // Closed sessions report Stopped whether or not a job ever ran.
    assert_eq!(rotation.state(id).await.unwrap(), RotationState::Stopped);
    assert_eq!(rotation.running_count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_pending_start_does_not_block_other_sessions() {
    let store = Arc::new(MemoryStore::new());
    let (rotation, locks) = scheduler_with_locks(&store);
    let a = open_session(&store).await;
    let b = open_session(&store).await;
    rotation.start(b).await.unwrap();

    // Park A's initial issuance on its session lock.
    let held = locks.lock_session(a).await;
    let pending = {
        let rotation = rotation.clone();
        tokio::spawn(async move { rotation.start(a).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(!pending.is_finished());

    let stopped = timeout(Duration::from_secs(1), rotation.stop(b))
        .await
        .expect("stop(B) must not wait on A's start");
    assert!(stopped);
    let state = timeout(Duration::from_secs(1), rotation.state(b))
        .await
        .expect("state(B) must not wait on A's start")
        .unwrap();
    assert_eq!(state, RotationState::Stopped);
    assert_eq!(rotation.state(a).await.unwrap(), RotationState::Running);

    drop(held);
    assert!(pending.await.unwrap().unwrap());
    assert_eq!(rotation.running_count().await, 1);
    assert_eq!(token_count(&store, a).await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_stop_during_pending_start_spawns_nothing() {
    let store = Arc::new(MemoryStore::new());
    let (rotation, locks) = scheduler_with_locks(&store);
    let id = open_session(&store).await;

    let held = locks.lock_session(id).await;
    let pending = {
        let rotation = rotation.clone();
        tokio::spawn(async move { rotation.start(id).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(rotation.stop(id).await);
    drop(held);

    assert!(!pending.await.unwrap().unwrap());
    assert_eq!(rotation.running_count().await, 0);
    assert_eq!(rotation.state(id).await.unwrap(), RotationState::Stopped);

    tokio::time::sleep(INTERVAL * 2).await;
    // The initial token landed; nothing rotated it.
    assert_eq!(token_count(&store, id).await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_start_can_be_retried() {
    let store = Arc::new(MemoryStore::new());
    let rotation = scheduler(&store);
    let id = open_session(&store).await;

    store.set_unavailable(true);
    assert!(rotation.start(id).await.is_err());
    store.set_unavailable(false);

    assert!(rotation.start(id).await.unwrap());
    assert_eq!(rotation.state(id).await.unwrap(), RotationState::Running);
}

#[tokio::test(start_paused = true)]
async fn test_schedule_does_not_issue_until_first_tick() {
    let store = Arc::new(MemoryStore::new());
    let rotation = scheduler(&store);
    let id = open_session(&store).await;

    assert!(rotation.schedule(id).await.unwrap());
    assert_eq!(token_count(&store, id).await, 0);

    tokio::time::sleep(INTERVAL + Duration::from_secs(1)).await;

    assert_eq!(token_count(&store, id).await, 1);
}

// =========================================================================
// Rotation
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_tokens_rotate_each_interval() {
    let store = Arc::new(MemoryStore::new());
    let rotation = scheduler(&store);
    let id = open_session(&store).await;
    rotation.start(id).await.unwrap();

    tokio::time::sleep(INTERVAL * 3 + Duration::from_secs(1)).await;

    assert_eq!(token_count(&store, id).await, 4);
    assert_eq!(active_count(&store, id).await, 1);

    let stats = rotation.stats();
    assert_eq!(stats.ticks, 3);
    assert_eq!(stats.tokens_issued, 4);
    assert_eq!(stats.failed_ticks, 0);
}

#[tokio::test(start_paused = true)]
async fn test_no_rotation_before_interval() {
    let store = Arc::new(MemoryStore::new());
    let rotation = scheduler(&store);
    let id = open_session(&store).await;
    rotation.start(id).await.unwrap();

    tokio::time::sleep(INTERVAL - Duration::from_secs(1)).await;

    assert_eq!(token_count(&store, id).await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_tick_keeps_job_running() {
    let store = Arc::new(MemoryStore::new());
    let rotation = scheduler(&store);
    let id = open_session(&store).await;
    rotation.start(id).await.unwrap();

    store.set_unavailable(true);
    tokio::time::sleep(INTERVAL + Duration::from_secs(1)).await;

    assert_eq!(rotation.stats().failed_ticks, 1);
    assert_eq!(rotation.state(id).await.unwrap(), RotationState::Running);

    store.set_unavailable(false);
    tokio::time::sleep(INTERVAL).await;

    assert_eq!(token_count(&store, id).await, 2);
}

// =========================================================================
// stop / self-termination / shutdown
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_stop_twice_second_is_noop() {
    let store = Arc::new(MemoryStore::new());
    let rotation = scheduler(&store);
    let id = open_session(&store).await;
    rotation.start(id).await.unwrap();

    assert!(rotation.stop(id).await);
    assert!(!rotation.stop(id).await);

    assert_eq!(rotation.state(id).await.unwrap(), RotationState::Stopped);
    assert_eq!(rotation.stats().jobs_stopped, 1);
}

#[tokio::test(start_paused = true)]
async fn test_stop_unknown_session_returns_false() {
    let store = Arc::new(MemoryStore::new());
    let rotation = scheduler(&store);
    assert!(!rotation.stop(SessionId::generate()).await);
}

#[tokio::test(start_paused = true)]
async fn test_stop_halts_rotation() {
    let store = Arc::new(MemoryStore::new());
    let rotation = scheduler(&store);
    let id = open_session(&store).await;
    rotation.start(id).await.unwrap();

    rotation.stop(id).await;
    tokio::time::sleep(INTERVAL * 3).await;

    assert_eq!(token_count(&store, id).await, 1);
    assert_eq!(rotation.stats().ticks, 0);
}

#[tokio::test(start_paused = true)]
async fn test_stop_while_tick_waits_on_session_lock_issues_nothing() {
    let store = Arc::new(MemoryStore::new());
    let (rotation, locks) = scheduler_with_locks(&store);
    let id = open_session(&store).await;
    rotation.start(id).await.unwrap();

    let held = locks.lock_session(id).await;
    tokio::time::sleep(INTERVAL + Duration::from_secs(1)).await;
    // The tick fired and is parked on the session lock.
    assert_eq!(rotation.stats().ticks, 1);

    assert!(rotation.stop(id).await);
    drop(held);
    tokio::time::sleep(INTERVAL * 2).await;

    assert_eq!(token_count(&store, id).await, 1);
    assert_eq!(rotation.stats().tokens_issued, 1);
    assert_eq!(rotation.stats().ticks, 1);
    assert_eq!(rotation.state(id).await.unwrap(), RotationState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_closed_session_job_self_terminates() {
    let store = Arc::new(MemoryStore::new());
    let rotation = scheduler(&store);
    let id = open_session(&store).await;
    rotation.start(id).await.unwrap();

    // Closed behind the scheduler's back.
    store.close_session(id, Utc::now()).await.unwrap();
    tokio::time::sleep(INTERVAL + Duration::from_secs(1)).await;

    assert_eq!(rotation.state(id).await.unwrap(), RotationState::Stopped);
    assert_eq!(rotation.running_count().await, 0);
    assert_eq!(active_count(&store, id).await, 0);
    // Stopping after self-termination is a no-op.
    assert!(!rotation.stop(id).await);
}

#[tokio::test(start_paused = true)]
async fn test_restart_after_stop_runs_new_job() {
    let store = Arc::new(MemoryStore::new());
    let rotation = scheduler(&store);
    let id = open_session(&store).await;

    rotation.start(id).await.unwrap();
    rotation.stop(id).await;
    assert!(rotation.start(id).await.unwrap());

    tokio::time::sleep(INTERVAL + Duration::from_secs(1)).await;

    assert_eq!(rotation.state(id).await.unwrap(), RotationState::Running);
    // Two starts plus one tick of the second job.
    assert_eq!(token_count(&store, id).await, 3);
}

#[tokio::test(start_paused = true)]
async fn test_sessions_rotate_independently() {
    let store = Arc::new(MemoryStore::new());
    let rotation = scheduler(&store);
    let a = open_session(&store).await;
    let b = open_session(&store).await;
    rotation.start(a).await.unwrap();
    rotation.start(b).await.unwrap();

    rotation.stop(a).await;
    tokio::time::sleep(INTERVAL + Duration::from_secs(1)).await;

    assert_eq!(token_count(&store, a).await, 1);
    assert_eq!(token_count(&store, b).await, 2);
    assert_eq!(rotation.running_count().await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_all_and_refuses_new_jobs() {
    let store = Arc::new(MemoryStore::new());
    let rotation = scheduler(&store);
    let a = open_session(&store).await;
    let b = open_session(&store).await;
    rotation.start(a).await.unwrap();
    rotation.start(b).await.unwrap();

    rotation.shutdown().await;

    assert_eq!(rotation.running_count().await, 0);
    assert_eq!(rotation.state(a).await.unwrap(), RotationState::Stopped);
    let c = open_session(&store).await;
    assert!(matches!(rotation.start(c).await, Err(RotationError::ShutDown)));
    assert!(matches!(rotation.schedule(c).await, Err(RotationError::ShutDown)));
}

#[tokio::test(start_paused = true)]
async fn test_clones_share_registry() {
    let store = Arc::new(MemoryStore::new());
    let rotation = scheduler(&store);
    let other = rotation.clone();
    let id = open_session(&store).await;

    rotation.start(id).await.unwrap();

    assert!(!other.start(id).await.unwrap());
    assert!(other.stop(id).await);
    assert_eq!(rotation.state(id).await.unwrap(), RotationState::Stopped);
}
