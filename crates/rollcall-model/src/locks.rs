//! Session- and student-scoped mutual exclusion.
//!
//! Token issuance and finalization serialize per session; submission
//! appends serialize per (session, student). The registry maps are only
//! held long enough to fetch or create the per-key mutex, so contention on
//! one session never blocks another.
//!
//! A key's entry lives only while someone holds or awaits its guard. The
//! last guard (or abandoned waiter) to let go removes it, so closed
//! sessions leave nothing behind.
//!
//! Lock order is student before session. Nothing that holds a session
//! guard may ask for a student guard.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{SessionId, StudentId};

type LockMap<K> = Arc<StdMutex<HashMap<K, Arc<Mutex<()>>>>>;

/// Registry of per-session and per-(session, student) mutexes.
#[derive(Debug, Default)]
pub struct SessionLocks {
    sessions: LockMap<SessionId>,
    students: LockMap<(SessionId, StudentId)>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `session`.
    pub async fn lock_session(&self, session: SessionId) -> LockGuard<SessionId> {
        acquire(&self.sessions, session).await
    }

    /// Waits for exclusive access to one student's record in `session`.
    pub async fn lock_student(
        &self,
        session: SessionId,
        student: StudentId,
    ) -> LockGuard<(SessionId, StudentId)> {
        acquire(&self.students, (session, student)).await
    }

    /// Keys that currently have a guard held or awaited.
    pub fn tracked_keys(&self) -> usize {
        let sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner).len();
        let students = self.students.lock().unwrap_or_else(PoisonError::into_inner).len();
        sessions + students
    }
}

async fn acquire<K: Eq + Hash + Copy>(map: &LockMap<K>, key: K) -> LockGuard<K> {
    let (lease, mutex) = Lease::new(map, key);
    let guard = mutex.lock_owned().await;
    LockGuard {
        _guard: guard,
        _lease: lease,
    }
}

/// Exclusive access to one key of a [`SessionLocks`] registry.
///
/// Released on drop.
pub struct LockGuard<K: Eq + Hash> {
    // Field order matters: the mutex is unlocked before the lease checks
    // whether the entry can go.
    _guard: OwnedMutexGuard<()>,
    _lease: Lease<K>,
}

/// Claim on one registry entry. Every holder or waiter keeps one, next to
/// its own reference to the mutex; the entry goes when the last one drops.
struct Lease<K: Eq + Hash> {
    key: K,
    map: LockMap<K>,
}

impl<K: Eq + Hash + Copy> Lease<K> {
    fn new(map: &LockMap<K>, key: K) -> (Self, Arc<Mutex<()>>) {
        let mut entries = map.lock().unwrap_or_else(PoisonError::into_inner);
        let mutex = Arc::clone(entries.entry(key).or_default());
        let lease = Self {
            key,
            map: Arc::clone(map),
        };
        (lease, mutex)
    }
}

impl<K: Eq + Hash> Drop for Lease<K> {
    fn drop(&mut self) {
        let mut entries = self.map.lock().unwrap_or_else(PoisonError::into_inner);
        // References are only handed out under the map lock, so a count of
        // one means nobody holds or awaits this mutex.
        if entries
            .get(&self.key)
            .is_some_and(|entry| Arc::strong_count(entry) == 1)
        {
            entries.remove(&self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_lock_session_excludes_second_holder() {
        let locks = Arc::new(SessionLocks::new());
        let id = SessionId::generate();

        let guard = locks.lock_session(id).await;

        let contender = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _g = locks.lock_session(id).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!contender.is_finished(), "second holder must wait");
        assert_eq!(locks.tracked_keys(), 1);

        drop(guard);
        contender.await.unwrap();
        assert_eq!(locks.tracked_keys(), 0);
    }

    #[tokio::test]
    async fn test_lock_session_independent_sessions() {
        let locks = SessionLocks::new();
        let _a = locks.lock_session(SessionId::generate()).await;
        // A different session must not block.
        let _b = locks.lock_session(SessionId::generate()).await;
    }

    #[tokio::test]
    async fn test_lock_student_independent_students() {
        let locks = SessionLocks::new();
        let id = SessionId::generate();
        let _a = locks.lock_student(id, StudentId(1)).await;
        let _b = locks.lock_student(id, StudentId(2)).await;
        let _s = locks.lock_session(id).await;
    }

    #[tokio::test]
    async fn test_released_locks_leave_no_entries() {
        let locks = SessionLocks::new();

        for _ in 0..1000 {
            let id = SessionId::generate();
            let student = locks.lock_student(id, StudentId(1)).await;
            let session = locks.lock_session(id).await;
            drop(session);
            drop(student);
        }

        assert_eq!(locks.tracked_keys(), 0);
    }

    #[tokio::test]
    async fn test_held_entry_survives_other_releases() {
        let locks = SessionLocks::new();
        let id = SessionId::generate();

        let held = locks.lock_session(id).await;
        drop(locks.lock_session(SessionId::generate()).await);

        assert_eq!(locks.tracked_keys(), 1);
        drop(held);
        assert_eq!(locks.tracked_keys(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_waiter_removes_entry() {
        let locks = Arc::new(SessionLocks::new());
        let id = SessionId::generate();
        let held = locks.lock_session(id).await;

        let waiter = tokio::time::timeout(Duration::from_millis(10), locks.lock_session(id)).await;
        assert!(waiter.is_err());

        drop(held);
        assert_eq!(locks.tracked_keys(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiter_still_excluded_after_holder_releases() {
        let locks = Arc::new(SessionLocks::new());
        let id = SessionId::generate();
        let first = locks.lock_session(id).await;

        let second = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let guard = locks.lock_session(id).await;
                tokio::time::sleep(Duration::from_secs(1)).await;
                drop(guard);
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        drop(first);
        tokio::time::sleep(Duration::from_millis(10)).await;

        // The waiter now holds the lock, so the entry must still exist and
        // a third caller must wait behind it.
        assert_eq!(locks.tracked_keys(), 1);
        let third = tokio::time::timeout(Duration::from_millis(10), locks.lock_session(id)).await;
        assert!(third.is_err());

        second.await.unwrap();
        assert_eq!(locks.tracked_keys(), 0);
    }
}
