//! Persistence backends for the application state.
//!
//! The whole dataset is one JSON-serializable snapshot with three records:
//! the user registry, the event collection, and the active session identity.
//! Backends only load and save the snapshot; all rules live in the store.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::NaiveDate;
use entities::{Event, EventStatus, User};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use crate::{StoreError, StoreResult};

/// The persisted application state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// All registered users.
    #[serde(default)]
    pub users: Vec<User>,
    /// All events, soft-deleted tombstones included.
    #[serde(default)]
    pub events: Vec<Event>,
    /// The active session identity, if any.
    #[serde(default)]
    pub current_user: Option<User>,
}

impl StateSnapshot {
    /// Repairs records written by an older schema.
    ///
    /// Events persisted without a `status` field deserialize as `Active`;
    /// this pass flips them to `Expired` when their date has passed. Any
    /// date-passed event also loses its pending requests, whatever its
    /// status. Returns whether anything changed so the caller can skip
    /// rewriting an untouched snapshot.
    pub fn migrate(&mut self, today: NaiveDate) -> bool {
        let mut changed = false;
        for event in &mut self.events {
            if event.date >= today {
                continue;
            }
            if !event.pending_user_ids.is_empty() {
                event.pending_user_ids.clear();
                changed = true;
            }
            if event.status == EventStatus::Active {
                event.status = EventStatus::Expired;
                changed = true;
            }
        }
        if changed {
            debug!("repaired legacy event records on load");
        }
        changed
    }
}

/// Trait for state persistence backends.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Loads the persisted snapshot, or `None` if nothing was saved yet.
    async fn load(&self) -> StoreResult<Option<StateSnapshot>>;

    /// Persists the snapshot, replacing whatever was stored before.
    async fn save(&self, snapshot: &StateSnapshot) -> StoreResult<()>;
}

/// In-memory state store for testing and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    snapshot: RwLock<Option<StateSnapshot>>,
}

impl MemoryStateStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self) -> StoreResult<Option<StateSnapshot>> {
        let snapshot = self.snapshot.read().await;
        Ok(snapshot.clone())
    }

    async fn save(&self, snapshot: &StateSnapshot) -> StoreResult<()> {
        let mut stored = self.snapshot.write().await;
        *stored = Some(snapshot.clone());
        Ok(())
    }
}

/// State store backed by a single JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStateStore {
    path: PathBuf,
}

impl JsonFileStateStore {
    /// Opens the default store at `~/.meetup/state.json`.
    pub fn open_default() -> StoreResult<Self> {
        let dir = dirs::home_dir()
            .map(|p| p.join(".meetup"))
            .ok_or(StoreError::StateDirNotFound)?;
        Self::open(dir.join("state.json"))
    }

    /// Opens a store backed by the given file, creating parent directories
    /// as needed.
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self { path })
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[async_trait]
impl StateStore for JsonFileStateStore {
    async fn load(&self) -> StoreResult<Option<StateSnapshot>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, snapshot: &StateSnapshot) -> StoreResult<()> {
        let content = serde_json::to_string_pretty(snapshot)?;
        tokio::fs::write(&self.path, content).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Days, Utc};
    use entities::EventDraft;
    use uuid::Uuid;

    use super::*;

    fn event_on(date: NaiveDate) -> Event {
        Event::new(
            EventDraft {
                title: "Five-a-side".to_string(),
                category: "Football".to_string(),
                location: "Riverside pitch".to_string(),
                description: None,
                date,
                start_time: "06:00 PM".to_string(),
                end_time: "07:00 PM".to_string(),
                capacity: 10,
            },
            Uuid::new_v4(),
        )
    }

    #[test]
    fn test_migrate_expires_date_passed_events() {
        let today = Utc::now().date_naive();
        let mut event = event_on(today.checked_sub_days(Days::new(1)).unwrap());
        event.pending_user_ids.push(Uuid::new_v4());

        let mut snapshot = StateSnapshot {
            events: vec![event],
            ..Default::default()
        };

        assert!(snapshot.migrate(today));
        assert_eq!(snapshot.events[0].status, EventStatus::Expired);
        assert!(snapshot.events[0].pending_user_ids.is_empty());

        // Repaired state needs no second rewrite.
        assert!(!snapshot.migrate(today));
    }

    #[test]
    fn test_migrate_clears_pending_even_for_deleted_events() {
        let today = Utc::now().date_naive();
        let mut event = event_on(today.checked_sub_days(Days::new(2)).unwrap());
        event.status = EventStatus::Deleted;
        event.pending_user_ids.push(Uuid::new_v4());

        let mut snapshot = StateSnapshot {
            events: vec![event],
            ..Default::default()
        };

        assert!(snapshot.migrate(today));
        // The tombstone keeps its status but loses stale requests.
        assert_eq!(snapshot.events[0].status, EventStatus::Deleted);
        assert!(snapshot.events[0].pending_user_ids.is_empty());
    }

    #[test]
    fn test_migrate_leaves_current_events_alone() {
        let today = Utc::now().date_naive();
        let mut event = event_on(today);
        event.pending_user_ids.push(Uuid::new_v4());

        let mut snapshot = StateSnapshot {
            events: vec![event],
            ..Default::default()
        };

        assert!(!snapshot.migrate(today));
        assert_eq!(snapshot.events[0].status, EventStatus::Active);
        assert_eq!(snapshot.events[0].pending_user_ids.len(), 1);
    }

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStateStore::open(dir.path().join("state.json")).unwrap();

        // Nothing saved yet.
        assert!(store.load().await.unwrap().is_none());

        let snapshot = StateSnapshot {
            users: vec![User::new("alice")],
            events: vec![event_on(Utc::now().date_naive())],
            current_user: None,
        };
        store.save(&snapshot).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.users.len(), 1);
        assert_eq!(loaded.users[0].username, "alice");
        assert_eq!(loaded.events.len(), 1);
    }

    #[tokio::test]
    async fn test_file_store_rejects_corrupt_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        tokio::fs::write(&path, "not json").await.unwrap();

        let store = JsonFileStateStore::open(&path).unwrap();
        assert!(matches!(
            store.load().await,
            Err(StoreError::Serialization(_))
        ));
    }

    #[test]
    fn test_snapshot_without_current_user_deserializes() {
        let snapshot: StateSnapshot =
            serde_json::from_str(r#"{"users": [], "events": []}"#).unwrap();
        assert!(snapshot.current_user.is_none());
    }
}
