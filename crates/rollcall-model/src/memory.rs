//! In-process [`Store`] implementation.
//!
//! All tables live behind one `tokio::sync::Mutex`, which makes every
//! method trivially atomic. Good enough for a single-process deployment,
//! tests, and the demo.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::{
    AttendanceRecord, NewToken, OwnerId, Rotation, Session, SessionId, Store, StoreError,
    Student, StudentId, Submission, Token, TokenId,
};

#[derive(Debug, Default)]
struct Tables {
    students: HashMap<StudentId, Student>,
    sessions: HashMap<SessionId, Session>,
    /// Tokens per session, in issue order.
    tokens: HashMap<SessionId, Vec<Token>>,
    next_token_id: u64,
    records: HashMap<(SessionId, StudentId), AttendanceRecord>,
    submissions: HashMap<(SessionId, StudentId), Vec<Submission>>,
}

/// A [`Store`] that keeps everything in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    /// When set, every write fails with [`StoreError::Unavailable`].
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates an outage: writes fail until this is set back to `false`.
    /// Reads keep working so callers can observe that nothing changed.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store marked unavailable".into()));
        }
        Ok(())
    }
}

impl Store for MemoryStore {
    async fn insert_student(&self, student: Student) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut t = self.tables.lock().await;
        t.students.insert(student.id, student);
        Ok(())
    }

    async fn student(&self, id: StudentId) -> Result<Option<Student>, StoreError> {
        let t = self.tables.lock().await;
        Ok(t.students.get(&id).cloned())
    }

    async fn insert_session(&self, session: Session) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut t = self.tables.lock().await;
        if t.sessions.contains_key(&session.id) {
            return Err(StoreError::DuplicateSession(session.id));
        }
        t.sessions.insert(session.id, session);
        Ok(())
    }

    async fn session(&self, id: SessionId) -> Result<Option<Session>, StoreError> {
        let t = self.tables.lock().await;
        Ok(t.sessions.get(&id).cloned())
    }

    async fn sessions_for_owner(&self, owner: OwnerId) -> Result<Vec<Session>, StoreError> {
        let t = self.tables.lock().await;
        let mut sessions: Vec<Session> = t
            .sessions
            .values()
            .filter(|s| s.owner == owner)
            .cloned()
            .collect();
        sessions.sort_by_key(|s| s.started_at);
        Ok(sessions)
    }

    async fn close_session(
        &self,
        id: SessionId,
        ended_at: DateTime<Utc>,
    ) -> Result<Session, StoreError> {
        self.check_writable()?;
        let mut t = self.tables.lock().await;
        let session = t
            .sessions
            .get_mut(&id)
            .ok_or(StoreError::SessionNotFound(id))?;
        if !session.active {
            return Err(StoreError::SessionClosed(id));
        }
        session.active = false;
        session.ended_at = Some(ended_at);
        let closed = session.clone();

        if let Some(tokens) = t.tokens.get_mut(&id) {
            for token in tokens.iter_mut().filter(|t| t.active) {
                token.active = false;
            }
        }
        Ok(closed)
    }

    async fn rotate_token(&self, token: NewToken) -> Result<Rotation, StoreError> {
        self.check_writable()?;
        let mut t = self.tables.lock().await;
        let session = t
            .sessions
            .get(&token.session_id)
            .ok_or(StoreError::SessionNotFound(token.session_id))?;
        if !session.active {
            return Err(StoreError::SessionClosed(token.session_id));
        }

        t.next_token_id += 1;
        let id = TokenId(t.next_token_id);
        let tokens = t.tokens.entry(token.session_id).or_default();

        let mut deactivated = Vec::new();
        for existing in tokens.iter_mut().filter(|t| t.active) {
            existing.active = false;
            deactivated.push(existing.id);
        }

        let stored = Token {
            id,
            session_id: token.session_id,
            value: token.value,
            created_at: token.created_at,
            expires_at: token.expires_at,
            active: true,
        };
        tokens.push(stored.clone());

        Ok(Rotation {
            token: stored,
            deactivated,
        })
    }

    async fn active_token(&self, session: SessionId) -> Result<Option<Token>, StoreError> {
        let t = self.tables.lock().await;
        Ok(t.tokens
            .get(&session)
            .and_then(|tokens| tokens.iter().find(|t| t.active).cloned()))
    }

    async fn tokens(&self, session: SessionId) -> Result<Vec<Token>, StoreError> {
        let t = self.tables.lock().await;
        Ok(t.tokens.get(&session).cloned().unwrap_or_default())
    }

    async fn tokens_with_value(
        &self,
        session: SessionId,
        value: &str,
    ) -> Result<Vec<Token>, StoreError> {
        let t = self.tables.lock().await;
        Ok(t.tokens
            .get(&session)
            .map(|tokens| tokens.iter().filter(|t| t.value == value).cloned().collect())
            .unwrap_or_default())
    }

    async fn record(
        &self,
        session: SessionId,
        student: StudentId,
    ) -> Result<Option<AttendanceRecord>, StoreError> {
        let t = self.tables.lock().await;
        Ok(t.records.get(&(session, student)).cloned())
    }

    async fn save_record(
        &self,
        record: AttendanceRecord,
        submission: Option<Submission>,
    ) -> Result<AttendanceRecord, StoreError> {
        self.check_writable()?;
        let mut t = self.tables.lock().await;
        let key = (record.session_id, record.student_id);
        if let Some(submission) = submission {
            t.submissions.entry(key).or_default().push(submission);
        }
        t.records.insert(key, record.clone());
        Ok(record)
    }

    async fn records_for_session(
        &self,
        session: SessionId,
    ) -> Result<Vec<AttendanceRecord>, StoreError> {
        let t = self.tables.lock().await;
        let mut records: Vec<AttendanceRecord> = t
            .records
            .values()
            .filter(|r| r.session_id == session)
            .cloned()
            .collect();
        records.sort_by_key(|r| (r.check_in, r.student_id.0));
        Ok(records)
    }

    async fn records_for_student(
        &self,
        student: StudentId,
    ) -> Result<Vec<AttendanceRecord>, StoreError> {
        let t = self.tables.lock().await;
        let mut records: Vec<AttendanceRecord> = t
            .records
            .values()
            .filter(|r| r.student_id == student)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.check_in);
        Ok(records)
    }

    async fn submission_count(
        &self,
        session: SessionId,
        student: StudentId,
    ) -> Result<usize, StoreError> {
        let t = self.tables.lock().await;
        Ok(t.submissions.get(&(session, student)).map_or(0, Vec::len))
    }

    async fn submissions(
        &self,
        session: SessionId,
        student: StudentId,
    ) -> Result<Vec<Submission>, StoreError> {
        let t = self.tables.lock().await;
        Ok(t.submissions
            .get(&(session, student))
            .cloned()
            .unwrap_or_default())
    }
}
