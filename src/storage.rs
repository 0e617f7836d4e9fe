use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::PathBuf;

use crate::models::{AuthUser, Session};

const TOKEN_FILE: &str = "auth_token";
const USER_FILE: &str = "auth_user.json";

#[derive(Debug)]
pub enum StorageError {
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Io(err) => write!(f, "io error: {err}"),
            StorageError::Json(err) => write!(f, "json error: {err}"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<std::io::Error> for StorageError {
    fn from(value: std::io::Error) -> Self {
        StorageError::Io(value)
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(value: serde_json::Error) -> Self {
        StorageError::Json(value)
    }
}

/// Durable home of the auth token and user profile.
///
/// Every public operation is best-effort: failures are logged and the caller carries on with
/// whatever it holds in memory. A profile that cannot be read back is treated as absent.
pub struct SessionStore {
    root: PathBuf,
}

impl SessionStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn save(&self, session: &Session) {
        if let Err(error) = self.try_save(session) {
            log::error!("failed to save session dir={} err={error}", self.root.display());
        }
    }

    pub fn load(&self) -> Option<Session> {
        let token = match self.read_token() {
            Ok(token) => token?,
            Err(error) => {
                log::error!("failed to load token err={error}");
                return None;
            }
        };
        let user = match self.read_user() {
            Ok(user) => user,
            Err(error) => {
                log::warn!("stored user profile unreadable, treating as absent err={error}");
                None
            }
        };
        Some(Session { token, user })
    }

    pub fn clear(&self) {
        for name in [TOKEN_FILE, USER_FILE] {
            match fs::remove_file(self.root.join(name)) {
                Ok(()) => {}
                Err(error) if error.kind() == ErrorKind::NotFound => {}
                Err(error) => log::error!("failed to clear {name} err={error}"),
            }
        }
    }

    fn try_save(&self, session: &Session) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root)?;
        self.write_atomic(TOKEN_FILE, session.token.as_bytes())?;
        match &session.user {
            Some(user) => self.write_atomic(USER_FILE, &serde_json::to_vec(user)?)?,
            None => match fs::remove_file(self.root.join(USER_FILE)) {
                Ok(()) => {}
                Err(error) if error.kind() == ErrorKind::NotFound => {}
                Err(error) => return Err(error.into()),
            },
        }
        Ok(())
    }

    fn read_token(&self) -> Result<Option<String>, StorageError> {
        let raw = match fs::read_to_string(self.root.join(TOKEN_FILE)) {
            Ok(raw) => raw,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(error.into()),
        };
        let token = raw.trim();
        if token.is_empty() {
            return Ok(None);
        }
        Ok(Some(token.to_string()))
    }

    fn read_user(&self) -> Result<Option<AuthUser>, StorageError> {
        let raw = match fs::read_to_string(self.root.join(USER_FILE)) {
            Ok(raw) => raw,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(error.into()),
        };
        if raw.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&raw)?))
    }

    fn write_atomic(&self, name: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.root.join(name);
        let temp_path = path.with_extension("tmp");
        {
            let mut file = File::create(&temp_path)?;
            file.write_all(bytes)?;
            file.sync_all()?;
        }
        fs::rename(temp_path, path)?;
        Ok(())
    }
}
