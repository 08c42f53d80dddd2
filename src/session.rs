//! Session state for Gator.
//!
//! The current user is kept in a small JSON file between invocations.
//! Unknown keys in the file (such as a `db_url` written by other tools)
//! are preserved on save.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{GatorError, Result};

/// Contents of the session file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    /// Name of the logged-in user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_user_name: Option<String>,

    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

impl SessionState {
    /// Record `name` as the current user.
    pub fn set_user(&mut self, name: impl Into<String>) {
        self.current_user_name = Some(name.into());
    }

    /// Forget the current user.
    pub fn clear_user(&mut self) {
        self.current_user_name = None;
    }
}

/// Session file at a fixed path.
#[derive(Debug, Clone)]
pub struct Session {
    path: PathBuf,
}

impl Session {
    /// Create a session backed by the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Read the session file. A missing or empty file is an empty session.
    pub fn load(&self) -> Result<SessionState> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No session file at {:?}", self.path);
                return Ok(SessionState::default());
            }
            Err(e) => return Err(GatorError::Io(e)),
        };
        if content.trim().is_empty() {
            return Ok(SessionState::default());
        }
        serde_json::from_str(&content).map_err(|e| {
            GatorError::Session(format!("invalid session file {:?}: {}", self.path, e))
        })
    }

    /// Write the session file, creating parent directories as needed.
    pub fn save(&self, state: &SessionState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(state)
            .map_err(|e| GatorError::Session(format!("failed to encode session: {}", e)))?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }

    /// Load, set the current user and save.
    pub fn set_current_user(&self, name: &str) -> Result<()> {
        let mut state = self.load()?;
        state.set_user(name);
        self.save(&state)
    }

    /// Name of the current user, or a `Session` error if nobody is logged in.
    pub fn require_current_user(&self) -> Result<String> {
        self.load()?
            .current_user_name
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                GatorError::Session("no user logged in; run `gator login <name>`".to_string())
            })
    }
}
