use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

pub const ACCESS_KEY: &str = "access";
pub const REFRESH_KEY: &str = "refresh";

const SESSION_FILE: &str = "session.json";

/// Access/refresh token pair granting access to the remote API.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub access: String,
    pub refresh: Option<String>,
}

impl Session {
    pub fn new(access: impl Into<String>, refresh: Option<String>) -> Self {
        Self {
            access: access.into(),
            refresh,
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access", &"<redacted>")
            .field("refresh", &self.refresh.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Login,
    Home,
}

/// Local key-value storage holding the session tokens.
#[derive(Debug)]
pub struct SessionStore {
    pub data_dir: PathBuf,
    pub path: PathBuf,
}

impl SessionStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let path = data_dir.join(SESSION_FILE);
        info!(
            data_dir = %data_dir.display(),
            session = %path.display(),
            "opened session store"
        );

        Ok(Self { data_dir, path })
    }

    #[tracing::instrument(skip(self))]
    pub fn load(&self) -> anyhow::Result<Option<Session>> {
        let map = self.read_map()?;
        let access = map
            .get(ACCESS_KEY)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty());

        let Some(access) = access else {
            debug!("no access token stored");
            return Ok(None);
        };

        Ok(Some(Session {
            access: access.to_string(),
            refresh: map.get(REFRESH_KEY).cloned(),
        }))
    }

    #[tracing::instrument(skip(self, session))]
    pub fn save(&self, session: &Session) -> anyhow::Result<()> {
        let mut map = self.read_map_or_reset();
        map.insert(ACCESS_KEY.to_string(), session.access.clone());
        match &session.refresh {
            Some(refresh) => {
                map.insert(REFRESH_KEY.to_string(), refresh.clone());
            }
            None => {
                map.remove(REFRESH_KEY);
            }
        }
        self.write_map(&map)?;
        info!("stored session tokens");
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub fn clear(&self) -> anyhow::Result<()> {
        let mut map = self.read_map_or_reset();
        map.remove(ACCESS_KEY);
        map.remove(REFRESH_KEY);
        self.write_map(&map)?;
        info!("cleared session tokens");
        Ok(())
    }

    /// One-shot launch check; a store that cannot be read counts as logged out.
    #[tracing::instrument(skip(self))]
    pub fn initial_route(&self) -> Route {
        match self.load() {
            Ok(Some(_)) => Route::Home,
            Ok(None) => Route::Login,
            Err(err) => {
                warn!(error = %err, "failed reading session store; routing to login");
                Route::Login
            }
        }
    }

    fn read_map(&self) -> anyhow::Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("failed reading {}", self.path.display()))?;
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        serde_json::from_str(&raw)
            .with_context(|| format!("failed parsing {}", self.path.display()))
    }

    /// Writers start over from an empty map when the file is unreadable, so
    /// a corrupt store is replaced rather than blocking login and logout.
    fn read_map_or_reset(&self) -> BTreeMap<String, String> {
        self.read_map().unwrap_or_else(|err| {
            warn!(error = %err, "discarding unreadable session store");
            BTreeMap::new()
        })
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> anyhow::Result<()> {
        debug!(file = %self.path.display(), keys = map.len(), "saving session map atomically");

        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut temp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut temp, map)?;
        writeln!(temp)?;
        temp.flush()?;

        temp.persist(&self.path)
            .map_err(|err| anyhow!("failed to persist {}: {}", self.path.display(), err))?;

        Ok(())
    }
}
