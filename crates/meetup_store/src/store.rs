//! The store facade the UI talks to.
//!
//! One logical thread of control drives every operation: the in-memory state
//! is mutated synchronously under the write lock, the sweeper runs when the
//! event collection was loaded or changed size, and the durable write is
//! issued last. A failed write is logged and never rolls back memory; within
//! this process, reads always see the latest state.

use std::sync::Arc;

use chrono::{Local, NaiveDate};
use entities::{
    CAPACITY_MAX, CAPACITY_MIN, CATEGORY_MAX_LEN, DESCRIPTION_MAX_LEN, Event, EventDraft,
    EventStatus, LOCATION_MAX_LEN, TITLE_MAX_LEN, User, ViewerStatus,
};
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{StateSnapshot, StateStore, StoreError, StoreResult, sweep};

/// The in-memory working set.
#[derive(Debug, Default)]
struct AppState {
    users: Vec<User>,
    events: Vec<Event>,
    current_user: Option<User>,
}

impl AppState {
    fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            users: self.users.clone(),
            events: self.events.clone(),
            current_user: self.current_user.clone(),
        }
    }

    fn user(&self, id: Uuid) -> StoreResult<&User> {
        self.users
            .iter()
            .find(|u| u.id == id)
            .ok_or_else(|| StoreError::not_found("user", id.to_string()))
    }

    fn event(&self, id: Uuid) -> StoreResult<&Event> {
        self.events
            .iter()
            .find(|e| e.id == id)
            .ok_or_else(|| StoreError::not_found("event", id.to_string()))
    }

    fn event_mut(&mut self, id: Uuid) -> StoreResult<&mut Event> {
        self.events
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| StoreError::not_found("event", id.to_string()))
    }
}

/// The store facade: identity directory, session, event repository and
/// membership engine behind one interface.
///
/// Screens depend on this object, not on a process-wide singleton, so the
/// backend can be swapped without touching callers.
pub struct MeetupStore {
    state: RwLock<AppState>,
    backend: Arc<dyn StateStore>,
}

impl MeetupStore {
    /// Opens a store over the given backend, loading previously persisted
    /// state and repairing records written by older schemas. The repaired
    /// snapshot is rewritten only if the repair changed something.
    pub async fn open(backend: Arc<dyn StateStore>) -> StoreResult<Self> {
        let mut state = AppState::default();
        if let Some(mut snapshot) = backend.load().await? {
            let today = today();
            let migrated = snapshot.migrate(today);
            let swept = sweep(&mut snapshot.events, today);
            if migrated || swept {
                backend.save(&snapshot).await?;
            }
            info!(
                users = snapshot.users.len(),
                events = snapshot.events.len(),
                "loaded persisted state"
            );
            state = AppState {
                users: snapshot.users,
                events: snapshot.events,
                current_user: snapshot.current_user,
            };
        }
        Ok(Self {
            state: RwLock::new(state),
            backend,
        })
    }

    /// Persists the current state. Memory is already updated; a write
    /// failure is logged and swallowed so the session keeps working.
    async fn persist(&self, state: &AppState) {
        if let Err(error) = self.backend.save(&state.snapshot()).await {
            warn!(%error, "failed to persist state; in-memory state is ahead of disk");
        }
    }

    // =========================================================================
    // Identity directory
    // =========================================================================

    /// Registers a new user and makes them the active session identity.
    /// Usernames are unique, matched case-sensitively.
    pub async fn register(&self, username: &str) -> StoreResult<User> {
        if username.trim().is_empty() {
            return Err(StoreError::validation("username", "is required"));
        }
        let mut state = self.state.write().await;
        if state.users.iter().any(|u| u.username == username) {
            return Err(StoreError::UsernameTaken {
                username: username.to_string(),
            });
        }
        let user = User::new(username);
        state.users.push(user.clone());
        state.current_user = Some(user.clone());
        self.persist(&state).await;
        Ok(user)
    }

    /// Logs in by exact username match and makes the user the active
    /// session identity.
    ///
    /// The password is accepted but not checked; this is where a real
    /// credential check slots in later without touching any other
    /// component.
    pub async fn login(&self, username: &str, _password: &str) -> StoreResult<User> {
        let mut state = self.state.write().await;
        let user = state
            .users
            .iter()
            .find(|u| u.username == username)
            .cloned()
            .ok_or_else(|| StoreError::not_found("user", username))?;
        state.current_user = Some(user.clone());
        self.persist(&state).await;
        Ok(user)
    }

    /// Resolves a user id to a display name. Unknown ids get a fallback
    /// synthesized from the truncated id rather than an error.
    pub async fn display_name(&self, user_id: Uuid) -> String {
        let state = self.state.read().await;
        state
            .users
            .iter()
            .find(|u| u.id == user_id)
            .map(|u| u.username.clone())
            .unwrap_or_else(|| format!("User {}", &user_id.to_string()[..4]))
    }

    /// Returns all registered users.
    pub async fn users(&self) -> Vec<User> {
        let state = self.state.read().await;
        state.users.clone()
    }

    // =========================================================================
    // Session manager
    // =========================================================================

    /// Returns the active session identity, if any. The session is part of
    /// the persisted state and survives a restart.
    pub async fn current_user(&self) -> Option<User> {
        let state = self.state.read().await;
        state.current_user.clone()
    }

    /// Clears the active session identity.
    pub async fn logout(&self) {
        let mut state = self.state.write().await;
        state.current_user = None;
        self.persist(&state).await;
    }

    // =========================================================================
    // Event repository
    // =========================================================================

    /// Creates a new active event. The creator joins automatically.
    pub async fn create_event(&self, draft: EventDraft, creator_id: Uuid) -> StoreResult<Event> {
        validate_draft(&draft)?;
        let mut state = self.state.write().await;
        state.user(creator_id)?;
        let event = Event::new(draft, creator_id);
        let event_id = event.id;
        state.events.push(event);
        // The collection changed size; an event created with a past date is
        // expired right away.
        sweep(&mut state.events, today());
        let event = state.event(event_id)?.clone();
        self.persist(&state).await;
        Ok(event)
    }

    /// Updates an event's fields. Creator only; the new capacity may not
    /// drop below the current member count.
    pub async fn update_event(
        &self,
        event_id: Uuid,
        draft: EventDraft,
        requester_id: Uuid,
    ) -> StoreResult<Event> {
        validate_draft(&draft)?;
        let mut state = self.state.write().await;
        let updated = {
            let event = state.event_mut(event_id)?;
            if event.creator_id != requester_id {
                return Err(StoreError::unauthorized("update this event"));
            }
            if (draft.capacity as usize) < event.joined_user_ids.len() {
                return Err(StoreError::CapacityViolation {
                    capacity: draft.capacity,
                    joined: event.joined_user_ids.len(),
                });
            }
            event.apply(draft);
            event.clone()
        };
        self.persist(&state).await;
        Ok(updated)
    }

    /// Soft-deletes an event. Creator only. Membership lists are kept so
    /// joined users retain their history; the record is never removed.
    pub async fn delete_event(&self, event_id: Uuid, requester_id: Uuid) -> StoreResult<()> {
        let mut state = self.state.write().await;
        {
            let event = state.event_mut(event_id)?;
            if event.creator_id != requester_id {
                return Err(StoreError::unauthorized("delete this event"));
            }
            event.status = EventStatus::Deleted;
            event.touch();
        }
        self.persist(&state).await;
        Ok(())
    }

    /// Returns the full event collection, tombstones included.
    pub async fn events(&self) -> Vec<Event> {
        let state = self.state.read().await;
        state.events.clone()
    }

    /// Returns a single event by id.
    pub async fn event(&self, event_id: Uuid) -> StoreResult<Event> {
        let state = self.state.read().await;
        state.event(event_id).cloned()
    }

    /// The discover feed: events that are neither deleted nor expired,
    /// soonest first.
    pub async fn upcoming_events(&self) -> Vec<Event> {
        let today = today();
        let state = self.state.read().await;
        let mut events: Vec<Event> = state
            .events
            .iter()
            .filter(|e| !e.is_deleted() && !e.is_expired(today))
            .cloned()
            .collect();
        events.sort_by_key(|e| e.date);
        events
    }

    /// Events created by the given user, tombstones included.
    pub async fn my_events(&self, user_id: Uuid) -> Vec<Event> {
        let state = self.state.read().await;
        state
            .events
            .iter()
            .filter(|e| e.creator_id == user_id)
            .cloned()
            .collect()
    }

    /// Events the user has joined but does not own. Past and deleted events
    /// stay in the list as history.
    pub async fn joined_events(&self, user_id: Uuid) -> Vec<Event> {
        let state = self.state.read().await;
        state
            .events
            .iter()
            .filter(|e| e.joined_user_ids.contains(&user_id) && e.creator_id != user_id)
            .cloned()
            .collect()
    }

    // =========================================================================
    // Membership engine
    // =========================================================================

    /// Requests to join an event.
    ///
    /// Silently refused (the event is returned unchanged) when the event is
    /// deleted, expired or at capacity, and idempotent when the user is
    /// already pending or joined. Unknown ids are a typed error so callers
    /// can tell "already satisfied" from "target does not exist".
    pub async fn request_join(&self, event_id: Uuid, user_id: Uuid) -> StoreResult<Event> {
        let mut state = self.state.write().await;
        state.user(user_id)?;
        let today = today();
        let (updated, changed) = {
            let event = state.event_mut(event_id)?;
            let refused = event.is_deleted() || event.is_expired(today) || event.is_full();
            let already_tracked = event.pending_user_ids.contains(&user_id)
                || event.joined_user_ids.contains(&user_id);
            if refused || already_tracked {
                (event.clone(), false)
            } else {
                event.pending_user_ids.push(user_id);
                event.touch();
                (event.clone(), true)
            }
        };
        if changed {
            self.persist(&state).await;
        }
        Ok(updated)
    }

    /// Withdraws a pending request or leaves a joined event; one operation
    /// covers both. Idempotent when the user is in neither list. The
    /// creator cannot leave their own event; they delete it instead.
    pub async fn cancel_join(&self, event_id: Uuid, user_id: Uuid) -> StoreResult<Event> {
        let mut state = self.state.write().await;
        state.user(user_id)?;
        let (updated, changed) = {
            let event = state.event_mut(event_id)?;
            if event.creator_id == user_id {
                return Err(StoreError::unauthorized("leave an event you created"));
            }
            let before = event.pending_user_ids.len() + event.joined_user_ids.len();
            event.pending_user_ids.retain(|id| *id != user_id);
            event.joined_user_ids.retain(|id| *id != user_id);
            let changed = event.pending_user_ids.len() + event.joined_user_ids.len() != before;
            if changed {
                event.touch();
            }
            (event.clone(), changed)
        };
        if changed {
            self.persist(&state).await;
        }
        Ok(updated)
    }

    /// Accepts a pending join request, moving the user into the joined
    /// list. Creator only. At capacity the event is returned unchanged and
    /// the user stays pending; the guard is silent, not an error.
    pub async fn accept_request(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        acting_user_id: Uuid,
    ) -> StoreResult<Event> {
        let mut state = self.state.write().await;
        state.user(user_id)?;
        let (updated, changed) = {
            let event = state.event_mut(event_id)?;
            if event.creator_id != acting_user_id {
                return Err(StoreError::unauthorized("accept requests for this event"));
            }
            if event.pending_user_ids.contains(&user_id) && !event.is_full() {
                event.pending_user_ids.retain(|id| *id != user_id);
                event.joined_user_ids.push(user_id);
                event.touch();
                (event.clone(), true)
            } else {
                (event.clone(), false)
            }
        };
        if changed {
            self.persist(&state).await;
        }
        Ok(updated)
    }

    /// Rejects a pending join request. Creator only; idempotent.
    pub async fn reject_request(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        acting_user_id: Uuid,
    ) -> StoreResult<Event> {
        let mut state = self.state.write().await;
        state.user(user_id)?;
        let (updated, changed) = {
            let event = state.event_mut(event_id)?;
            if event.creator_id != acting_user_id {
                return Err(StoreError::unauthorized("reject requests for this event"));
            }
            let before = event.pending_user_ids.len();
            event.pending_user_ids.retain(|id| *id != user_id);
            let changed = event.pending_user_ids.len() != before;
            if changed {
                event.touch();
            }
            (event.clone(), changed)
        };
        if changed {
            self.persist(&state).await;
        }
        Ok(updated)
    }

    /// Classifies how a viewer relates to an event, for display.
    pub async fn viewer_status(&self, event_id: Uuid, viewer: Uuid) -> StoreResult<ViewerStatus> {
        let state = self.state.read().await;
        Ok(state.event(event_id)?.viewer_status(viewer))
    }
}

/// Today at local midnight; the day boundary all expiry comparisons use.
fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Validates draft fields before any mutation.
fn validate_draft(draft: &EventDraft) -> StoreResult<()> {
    if draft.title.trim().is_empty() {
        return Err(StoreError::validation("title", "is required"));
    }
    if draft.title.chars().count() > TITLE_MAX_LEN {
        return Err(StoreError::validation(
            "title",
            format!("must be at most {TITLE_MAX_LEN} characters"),
        ));
    }
    if draft.category.trim().is_empty() {
        return Err(StoreError::validation("category", "is required"));
    }
    if draft.category.chars().count() > CATEGORY_MAX_LEN {
        return Err(StoreError::validation(
            "category",
            format!("must be at most {CATEGORY_MAX_LEN} characters"),
        ));
    }
    if draft.location.trim().is_empty() {
        return Err(StoreError::validation("location", "is required"));
    }
    if draft.location.chars().count() > LOCATION_MAX_LEN {
        return Err(StoreError::validation(
            "location",
            format!("must be at most {LOCATION_MAX_LEN} characters"),
        ));
    }
    if let Some(description) = &draft.description {
        if description.chars().count() > DESCRIPTION_MAX_LEN {
            return Err(StoreError::validation(
                "description",
                format!("must be at most {DESCRIPTION_MAX_LEN} characters"),
            ));
        }
    }
    if !(CAPACITY_MIN..=CAPACITY_MAX).contains(&draft.capacity) {
        return Err(StoreError::validation(
            "capacity",
            format!("must be between {CAPACITY_MIN} and {CAPACITY_MAX}"),
        ));
    }
    Ok(())
}
