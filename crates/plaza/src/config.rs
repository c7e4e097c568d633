//! Server configuration from the environment.
//!
//! | Variable            | Required | Default          |
//! |---------------------|----------|------------------|
//! | `PLAZA_BIND_ADDR`   | no       | `127.0.0.1:8080` |
//! | `JWT_PASSWORD`      | yes      |                  |
//! | `PLAZA_SPACES_FILE` | no       | no spaces        |
//!
//! A `.env` file in the working directory is loaded first, if present.
//! Variables already set in the process environment win.

use std::path::PathBuf;

use plaza_session::StaticSpaces;

use crate::PlazaError;

pub const BIND_ADDR_VAR: &str = "PLAZA_BIND_ADDR";
pub const JWT_SECRET_VAR: &str = "JWT_PASSWORD";
pub const SPACES_FILE_VAR: &str = "PLAZA_SPACES_FILE";

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

/// Everything the presence server needs to start.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub bind_addr: String,
    /// HMAC secret shared with the account service that signs credentials.
    pub jwt_secret: String,
    /// JSON space catalog to serve. `None` starts with no spaces.
    pub spaces_file: Option<PathBuf>,
}

impl ServerConfig {
    /// Loads `.env` (if any) and reads the process environment.
    ///
    /// # Errors
    /// [`PlazaError::Config`] if `JWT_PASSWORD` is missing or empty.
    pub fn from_env() -> Result<Self, PlazaError> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                return Err(PlazaError::Config(format!("failed to read .env: {e}")));
            }
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary variable source.
    ///
    /// Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, PlazaError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let jwt_secret = get(JWT_SECRET_VAR)
            .ok_or_else(|| PlazaError::Config(format!("{JWT_SECRET_VAR} is not set")))?;

        Ok(Self {
            bind_addr: get(BIND_ADDR_VAR).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            jwt_secret,
            spaces_file: get(SPACES_FILE_VAR).map(PathBuf::from),
        })
    }

    /// Reads the space catalog named by `spaces_file`.
    ///
    /// # Errors
    /// [`PlazaError::Config`] if the file can't be read or parsed.
    pub fn load_spaces(&self) -> Result<StaticSpaces, PlazaError> {
        let Some(path) = &self.spaces_file else {
            tracing::warn!("no {SPACES_FILE_VAR} configured, every join will be rejected");
            return Ok(StaticSpaces::new());
        };

        let json = std::fs::read_to_string(path)
            .map_err(|e| PlazaError::Config(format!("{}: {e}", path.display())))?;
        let spaces = StaticSpaces::from_json(&json)
            .map_err(|e| PlazaError::Config(format!("{}: {e}", path.display())))?;

        tracing::info!(path = %path.display(), count = spaces.len(), "loaded space catalog");
        Ok(spaces)
    }
}
