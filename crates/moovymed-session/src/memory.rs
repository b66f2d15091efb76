// ABOUTME: In-memory SessionStore used by tests and short-lived processes.
// ABOUTME: Holds the Session behind a mutex and never touches the filesystem.

use std::sync::{Mutex, MutexGuard};

use chrono::Utc;

use crate::model::Session;
use crate::store::{SessionError, SessionStore};

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    session: Mutex<Session>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing session, e.g. one seeded by a test.
    pub fn with_session(session: Session) -> Self {
        Self {
            session: Mutex::new(session),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        // A poisoned lock still holds a consistent Session; every write is a
        // plain field assignment.
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Session {
        self.lock().clone()
    }

    fn set_tokens(&self, access_token: &str, refresh_token: &str) -> Result<(), SessionError> {
        let mut session = self.lock();
        session.access_token = Some(access_token.to_string());
        session.refresh_token = Some(refresh_token.to_string());
        session.updated_at = Some(Utc::now());
        Ok(())
    }

    fn set_access_token(&self, access_token: &str) -> Result<(), SessionError> {
        let mut session = self.lock();
        session.access_token = Some(access_token.to_string());
        session.updated_at = Some(Utc::now());
        Ok(())
    }

    fn set_locale(&self, locale: &str) -> Result<(), SessionError> {
        let mut session = self.lock();
        session.locale = Some(locale.to_string());
        session.updated_at = Some(Utc::now());
        Ok(())
    }

    fn set_reset_user_id(&self, user_id: Option<&str>) -> Result<(), SessionError> {
        let mut session = self.lock();
        session.reset_user_id = user_id.map(String::from);
        session.updated_at = Some(Utc::now());
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        *self.lock() = Session::default();
        Ok(())
    }
}
