//! File-backed connection store.
//!
//! One TOML file per user under `<config_dir>/worksync/connections/`.
//! Files contain OAuth tokens, so they are written owner-only.

use std::path::PathBuf;

use tracing::warn;
use worksync_core::{CalendarConnection, ConnectionStore, SyncError, SyncResult};

use crate::config;

pub struct FileConnectionStore {
    dir: PathBuf,
}

impl FileConnectionStore {
    pub fn new() -> SyncResult<Self> {
        Ok(Self {
            dir: config::base_dir()?.join("connections"),
        })
    }

    /// Store rooted at an explicit directory (tests, custom deployments).
    pub fn at(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, user_id: i64) -> PathBuf {
        self.dir.join(format!("{user_id}.toml"))
    }

    /// All stored connections. Unreadable files are skipped with a warning
    /// so one corrupt entry cannot block maintenance over the rest.
    pub fn list(&self) -> SyncResult<Vec<CalendarConnection>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut connections = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("toml") {
                continue;
            }
            let contents = std::fs::read_to_string(&path)?;
            match toml::from_str::<CalendarConnection>(&contents) {
                Ok(connection) => connections.push(connection),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "skipping unreadable connection file");
                }
            }
        }

        connections.sort_by_key(|connection| connection.user_id);
        Ok(connections)
    }
}

impl ConnectionStore for FileConnectionStore {
    fn save(&self, connection: &CalendarConnection) -> SyncResult<()> {
        let contents = toml::to_string_pretty(connection)
            .map_err(|err| SyncError::Store(err.to_string()))?;

        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(connection.user_id);
        std::fs::write(&path, contents)?;

        // Owner-only: the file holds OAuth tokens.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }

    fn load(&self, user_id: i64) -> SyncResult<CalendarConnection> {
        let path = self.path_for(user_id);
        if !path.exists() {
            return Err(SyncError::Store(format!(
                "no stored calendar connection for user {user_id}"
            )));
        }

        let contents = std::fs::read_to_string(&path)?;
        toml::from_str(&contents).map_err(|err| {
            SyncError::Store(format!("failed to parse {}: {err}", path.display()))
        })
    }
}
