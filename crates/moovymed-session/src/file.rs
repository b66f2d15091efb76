// ABOUTME: File-backed SessionStore that persists credentials as JSON across restarts.
// ABOUTME: Writes atomically (temp file, fsync, rename) and deletes the file when the session is cleared.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;

use crate::model::Session;
use crate::store::{SessionError, SessionStore};

/// Persisted session store, the analogue of browser local storage.
///
/// The file is read once at [`FileSessionStore::open`]; afterwards the
/// in-memory copy is authoritative and every write is flushed to disk.
#[derive(Debug)]
pub struct FileSessionStore {
    path: PathBuf,
    session: Mutex<Session>,
}

impl FileSessionStore {
    /// Open the store at `path`. A missing file is an empty session.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SessionError> {
        let path = path.into();
        let session = match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(e) if e.kind() == ErrorKind::NotFound => Session::default(),
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(path = %path.display(), authenticated = session.is_authenticated(), "opened session file");

        Ok(Self {
            path,
            session: Mutex::new(session),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Apply `update` in memory, then persist the result while still holding
    /// the lock so concurrent writers land on disk in the same order.
    fn write_with(&self, update: impl FnOnce(&mut Session)) -> Result<(), SessionError> {
        let mut session = self.lock();
        update(&mut session);
        session.updated_at = Some(Utc::now());
        persist(&self.path, &session)
    }
}

/// Atomic write: serialize to `<file>.tmp`, fsync, then rename over the target.
fn persist(path: &Path, session: &Session) -> Result<(), SessionError> {
    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
    {
        fs::create_dir_all(dir)?;
    }

    let tmp_path = path.with_extension("tmp");
    let json = serde_json::to_string_pretty(session)?;

    let mut file = File::create(&tmp_path)?;
    file.write_all(json.as_bytes())?;
    file.sync_all()?;
    drop(file);

    fs::rename(&tmp_path, path)?;
    Ok(())
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Session {
        self.lock().clone()
    }

    fn set_tokens(&self, access_token: &str, refresh_token: &str) -> Result<(), SessionError> {
        self.write_with(|s| {
            s.access_token = Some(access_token.to_string());
            s.refresh_token = Some(refresh_token.to_string());
        })
    }

    fn set_access_token(&self, access_token: &str) -> Result<(), SessionError> {
        self.write_with(|s| s.access_token = Some(access_token.to_string()))
    }

    fn set_locale(&self, locale: &str) -> Result<(), SessionError> {
        self.write_with(|s| s.locale = Some(locale.to_string()))
    }

    fn set_reset_user_id(&self, user_id: Option<&str>) -> Result<(), SessionError> {
        self.write_with(|s| s.reset_user_id = user_id.map(String::from))
    }

    fn clear(&self) -> Result<(), SessionError> {
        let mut session = self.lock();
        *session = Session::default();

        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => {
                // The old tokens must not come back on the next open, so
                // overwrite the file with an empty session instead.
                tracing::warn!(path = %self.path.display(), error = %e, "could not remove session file; overwriting it");
                persist(&self.path, &session)?;
                Err(e.into())
            }
        }
    }
}
