// src/store.rs
//! Persisted state: the source list and the schedule, as one JSON document.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::ingest::types::FeedSource;
use crate::schedule::ScheduleConfig;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    #[serde(default)]
    pub news_sources: Vec<FeedSource>,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

#[async_trait::async_trait]
pub trait StateStore: Send + Sync {
    async fn load(&self) -> Result<PersistedState>;
    async fn save(&self, state: &PersistedState) -> Result<()>;
}

/// `db.json`-style file. A missing file reads as the empty default.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl StateStore for JsonFileStore {
    async fn load(&self) -> Result<PersistedState> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(s) => serde_json::from_str(&s)
                .with_context(|| format!("parsing state file {}", self.path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(PersistedState::default()),
            Err(e) => Err(e).with_context(|| format!("reading state file {}", self.path.display())),
        }
    }

    async fn save(&self, state: &PersistedState) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("creating {}", dir.display()))?;
        }
        let json = serde_json::to_vec_pretty(state).context("serializing state")?;
        // Write-then-rename so readers never see a half-written document.
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("replacing {}", self.path.display()))?;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: std::sync::Mutex<PersistedState>,
}

impl MemoryStore {
    pub fn new(initial: PersistedState) -> Self {
        Self {
            inner: std::sync::Mutex::new(initial),
        }
    }
}

#[async_trait::async_trait]
impl StateStore for MemoryStore {
    async fn load(&self) -> Result<PersistedState> {
        Ok(self
            .inner
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone())
    }

    async fn save(&self, state: &PersistedState) -> Result<()> {
        *self.inner.lock().unwrap_or_else(|p| p.into_inner()) = state.clone();
        Ok(())
    }
}

/// Shared handle that serializes read-modify-write cycles on a store.
pub struct Db {
    backend: Arc<dyn StateStore>,
    write_lock: Mutex<()>,
}

impl Db {
    pub fn new(backend: Arc<dyn StateStore>) -> Self {
        Self {
            backend,
            write_lock: Mutex::new(()),
        }
    }

    pub fn in_memory(initial: PersistedState) -> Self {
        Self::new(Arc::new(MemoryStore::new(initial)))
    }

    pub async fn read(&self) -> Result<PersistedState> {
        self.backend.load().await
    }

    /// Apply `f` to the current state and persist the result. Nothing is
    /// written when `f` fails.
    pub async fn modify<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut PersistedState) -> Result<T> + Send,
        T: Send,
    {
        let _guard = self.write_lock.lock().await;
        let mut state = self.backend.load().await?;
        let out = f(&mut state)?;
        self.backend.save(&state).await?;
        Ok(out)
    }

    pub async fn sources(&self) -> Result<Vec<FeedSource>> {
        Ok(self.read().await?.news_sources)
    }

    pub async fn add_source(&self, name: &str, url: &str) -> Result<FeedSource> {
        let source = FeedSource {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            url: url.trim().to_string(),
        };
        let created = source.clone();
        self.modify(move |s| {
            s.news_sources.push(source);
            Ok(())
        })
        .await?;
        Ok(created)
    }

    /// Returns false when no source had that id.
    pub async fn remove_source(&self, id: &str) -> Result<bool> {
        self.modify(|s| {
            let before = s.news_sources.len();
            s.news_sources.retain(|src| src.id != id);
            Ok(s.news_sources.len() != before)
        })
        .await
    }
}
