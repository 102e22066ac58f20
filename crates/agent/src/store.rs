use std::cmp::Reverse;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

use concierge_core::domain::conversation::{ConversationId, ConversationState};

pub const UNKNOWN_TRAVELER: &str = "Unknown Traveler";

/// One stored conversation, as listed on the planner dashboard.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub id: ConversationId,
    pub display_name: String,
    pub state: ConversationState,
    pub created_at: DateTime<Utc>,
}

impl ConversationRecord {
    pub fn new(
        id: ConversationId,
        display_name: Option<&str>,
        state: ConversationState,
        created_at: DateTime<Utc>,
    ) -> Self {
        let display_name = display_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(UNKNOWN_TRAVELER)
            .to_owned();
        Self { id, display_name, state, created_at }
    }

    pub fn status(&self) -> &'static str {
        self.state.phase.status_label()
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.state.last_activity.unwrap_or(self.created_at)
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("conversation store unavailable: {0}")]
    Unavailable(String),
    #[error("io error on `{path}`: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("decode error: {0}")]
    Decode(String),
}

#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn load(&self, id: &ConversationId) -> Result<Option<ConversationRecord>, StoreError>;
    async fn save(&self, record: ConversationRecord) -> Result<(), StoreError>;
    /// Every record, most recently active first.
    async fn list(&self) -> Result<Vec<ConversationRecord>, StoreError>;
}

fn most_recent_first(mut records: Vec<ConversationRecord>) -> Vec<ConversationRecord> {
    records.sort_by_key(|record| (Reverse(record.last_activity()), record.id.clone()));
    records
}

#[derive(Default)]
pub struct InMemoryConversationStore {
    records: RwLock<HashMap<ConversationId, ConversationRecord>>,
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn load(&self, id: &ConversationId) -> Result<Option<ConversationRecord>, StoreError> {
        let records = self.records.read().await;
        Ok(records.get(id).cloned())
    }

    async fn save(&self, record: ConversationRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        records.insert(record.id.clone(), record);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<ConversationRecord>, StoreError> {
        let records = self.records.read().await;
        Ok(most_recent_first(records.values().cloned().collect()))
    }
}

/// Keeps every record in one JSON document, rewritten on each save. Saves go through a
/// sibling temp file and a rename, so readers never see a half-written document.
pub struct JsonFileConversationStore {
    path: PathBuf,
    records: RwLock<Option<HashMap<ConversationId, ConversationRecord>>>,
}

impl JsonFileConversationStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), records: RwLock::new(None) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|name| name.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    async fn write_atomically(&self, encoded: String) -> Result<(), StoreError> {
        let staging = self.staging_path();
        tokio::fs::write(&staging, encoded)
            .await
            .map_err(|source| StoreError::Io { path: staging.clone(), source })?;
        if let Err(source) = tokio::fs::rename(&staging, &self.path).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(StoreError::Io { path: self.path.clone(), source });
        }
        Ok(())
    }

    async fn read_file(&self) -> Result<HashMap<ConversationId, ConversationRecord>, StoreError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Ok(HashMap::new());
            }
            Err(source) => return Err(StoreError::Io { path: self.path.clone(), source }),
        };
        if raw.trim().is_empty() {
            return Ok(HashMap::new());
        }

        let records: Vec<ConversationRecord> =
            serde_json::from_str(&raw).map_err(|error| StoreError::Decode(error.to_string()))?;
        Ok(records.into_iter().map(|record| (record.id.clone(), record)).collect())
    }

    async fn snapshot(&self) -> Result<HashMap<ConversationId, ConversationRecord>, StoreError> {
        if let Some(records) = self.records.read().await.as_ref() {
            return Ok(records.clone());
        }
        let mut cache = self.records.write().await;
        if cache.is_none() {
            *cache = Some(self.read_file().await?);
        }
        Ok(cache.clone().unwrap_or_default())
    }
}

#[async_trait]
impl ConversationStore for JsonFileConversationStore {
    async fn load(&self, id: &ConversationId) -> Result<Option<ConversationRecord>, StoreError> {
        Ok(self.snapshot().await?.remove(id))
    }

    async fn save(&self, record: ConversationRecord) -> Result<(), StoreError> {
        let mut cache = self.records.write().await;
        let mut records = match cache.take() {
            Some(records) => records,
            None => self.read_file().await?,
        };
        records.insert(record.id.clone(), record);

        let ordered = most_recent_first(records.values().cloned().collect());
        let written = match serde_json::to_string_pretty(&ordered) {
            Ok(encoded) => self.write_atomically(encoded).await,
            Err(error) => Err(StoreError::Decode(error.to_string())),
        };

        if written.is_err() {
            // Drop the unsaved record so the cache keeps matching the file.
            *cache = None;
            return written;
        }
        *cache = Some(records);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<ConversationRecord>, StoreError> {
        Ok(most_recent_first(self.snapshot().await?.into_values().collect()))
    }
}
