//! Event-related entity definitions.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum length of an event title, in characters.
pub const TITLE_MAX_LEN: usize = 50;
/// Maximum length of an event category, in characters.
pub const CATEGORY_MAX_LEN: usize = 20;
/// Maximum length of an event location, in characters.
pub const LOCATION_MAX_LEN: usize = 50;
/// Maximum length of an event description, in characters.
pub const DESCRIPTION_MAX_LEN: usize = 200;
/// Smallest allowed event capacity.
pub const CAPACITY_MIN: u32 = 1;
/// Largest allowed event capacity.
pub const CAPACITY_MAX: u32 = 50;

/// Lifecycle status of an event.
///
/// `Active` events accept join requests, `Expired` events are past their
/// date, and `Deleted` events are soft-deleted tombstones kept so joined
/// users retain their history. There is no transition out of `Deleted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    /// Open for join requests.
    Active,
    /// Date has passed.
    Expired,
    /// Soft-deleted by the creator.
    Deleted,
}

impl Default for EventStatus {
    fn default() -> Self {
        Self::Active
    }
}

/// How a particular viewer relates to an event.
///
/// First matching rule wins: creator before joined, joined before pending,
/// pending before full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewerStatus {
    /// The viewer created the event.
    Creator,
    /// The viewer is a confirmed member.
    Joined,
    /// The viewer has an outstanding join request.
    Pending,
    /// The viewer is unaffiliated and the event is at capacity.
    Full,
    /// The viewer is unaffiliated and could request to join.
    Available,
}

/// Raw input fields for creating or updating an event.
///
/// The same draft is used for both operations; the edit form resubmits every
/// field. Validation happens in the store, before any mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventDraft {
    /// Event title.
    pub title: String,
    /// Sport or activity category.
    pub category: String,
    /// Where the event takes place.
    pub location: String,
    /// Optional free-text description.
    pub description: Option<String>,
    /// Calendar date of the event (day granularity).
    pub date: NaiveDate,
    /// Formatted start time of day.
    pub start_time: String,
    /// Formatted end time of day.
    pub end_time: String,
    /// Maximum number of members, creator included.
    pub capacity: u32,
}

/// A sports meetup event.
///
/// An event and its membership lists form one aggregate: `joined_user_ids`
/// never exceeds `capacity`, the creator is always a member, and the pending
/// list stays disjoint from the joined list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique identifier.
    pub id: Uuid,
    /// Event title.
    pub title: String,
    /// Sport or activity category.
    pub category: String,
    /// Where the event takes place.
    pub location: String,
    /// Optional free-text description.
    pub description: Option<String>,
    /// Calendar date of the event.
    pub date: NaiveDate,
    /// Formatted start time of day.
    pub start_time: String,
    /// Formatted end time of day.
    pub end_time: String,
    /// Maximum number of members, creator included.
    pub capacity: u32,
    /// User who created the event.
    pub creator_id: Uuid,
    /// Confirmed members, in join order. Always contains the creator.
    pub joined_user_ids: Vec<Uuid>,
    /// Users with an outstanding join request, in request order.
    #[serde(default)]
    pub pending_user_ids: Vec<Uuid>,
    /// Lifecycle status. Records persisted before this field existed
    /// deserialize as `Active` and are repaired on load.
    #[serde(default)]
    pub status: EventStatus,
    /// When this record was created.
    pub created_at: DateTime<Utc>,
    /// When this record was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// Creates a new active event from a draft. The creator joins
    /// automatically.
    pub fn new(draft: EventDraft, creator_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: draft.title,
            category: draft.category,
            location: draft.location,
            description: draft.description,
            date: draft.date,
            start_time: draft.start_time,
            end_time: draft.end_time,
            capacity: draft.capacity,
            creator_id,
            joined_user_ids: vec![creator_id],
            pending_user_ids: Vec::new(),
            status: EventStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    /// Overwrites the mutable fields from a draft. Identity, membership and
    /// status are untouched.
    pub fn apply(&mut self, draft: EventDraft) {
        self.title = draft.title;
        self.category = draft.category;
        self.location = draft.location;
        self.description = draft.description;
        self.date = draft.date;
        self.start_time = draft.start_time;
        self.end_time = draft.end_time;
        self.capacity = draft.capacity;
        self.touch();
    }

    /// Bumps the update timestamp.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Whether the event has been soft-deleted.
    pub fn is_deleted(&self) -> bool {
        self.status == EventStatus::Deleted
    }

    /// Whether the event is past its date.
    ///
    /// The single expiry predicate: an event is expired when its stored
    /// status says so or its date is before `today`. Time of day never
    /// enters the comparison.
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.status == EventStatus::Expired || self.date < today
    }

    /// Whether the event is at capacity.
    pub fn is_full(&self) -> bool {
        self.joined_user_ids.len() >= self.capacity as usize
    }

    /// Classifies how `viewer` relates to this event.
    pub fn viewer_status(&self, viewer: Uuid) -> ViewerStatus {
        if self.creator_id == viewer {
            ViewerStatus::Creator
        } else if self.joined_user_ids.contains(&viewer) {
            ViewerStatus::Joined
        } else if self.pending_user_ids.contains(&viewer) {
            ViewerStatus::Pending
        } else if self.is_full() {
            ViewerStatus::Full
        } else {
            ViewerStatus::Available
        }
    }

    /// Whether `viewer` created this event and it has outstanding join
    /// requests.
    pub fn has_pending_requests(&self, viewer: Uuid) -> bool {
        self.creator_id == viewer && !self.pending_user_ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Days;

    use super::*;

    fn draft() -> EventDraft {
        EventDraft {
            title: "Five-a-side".to_string(),
            category: "Football".to_string(),
            location: "Riverside pitch".to_string(),
            description: None,
            date: Utc::now().date_naive(),
            start_time: "06:00 PM".to_string(),
            end_time: "07:00 PM".to_string(),
            capacity: 10,
        }
    }

    #[test]
    fn test_creator_joins_automatically() {
        let creator = Uuid::new_v4();
        let event = Event::new(draft(), creator);

        assert_eq!(event.creator_id, creator);
        assert_eq!(event.joined_user_ids, vec![creator]);
        assert!(event.pending_user_ids.is_empty());
        assert_eq!(event.status, EventStatus::Active);
    }

    #[test]
    fn test_is_expired_by_date_or_status() {
        let today = Utc::now().date_naive();
        let mut event = Event::new(draft(), Uuid::new_v4());

        assert!(!event.is_expired(today));

        event.date = today.checked_sub_days(Days::new(1)).unwrap();
        assert!(event.is_expired(today));

        // A stored Expired status wins even if the date looks current.
        event.date = today;
        event.status = EventStatus::Expired;
        assert!(event.is_expired(today));
    }

    #[test]
    fn test_viewer_status_priority() {
        let creator = Uuid::new_v4();
        let joined = Uuid::new_v4();
        let pending = Uuid::new_v4();
        let stranger = Uuid::new_v4();

        let mut event = Event::new(draft(), creator);
        event.capacity = 2;
        event.joined_user_ids.push(joined);
        event.pending_user_ids.push(pending);

        assert_eq!(event.viewer_status(creator), ViewerStatus::Creator);
        assert_eq!(event.viewer_status(joined), ViewerStatus::Joined);
        assert_eq!(event.viewer_status(pending), ViewerStatus::Pending);
        // Two joined out of capacity two: strangers see a full event.
        assert_eq!(event.viewer_status(stranger), ViewerStatus::Full);

        event.capacity = 5;
        assert_eq!(event.viewer_status(stranger), ViewerStatus::Available);
    }

    #[test]
    fn test_has_pending_requests_is_creator_only() {
        let creator = Uuid::new_v4();
        let other = Uuid::new_v4();
        let mut event = Event::new(draft(), creator);

        assert!(!event.has_pending_requests(creator));

        event.pending_user_ids.push(other);
        assert!(event.has_pending_requests(creator));
        assert!(!event.has_pending_requests(other));
    }

    #[test]
    fn test_legacy_event_without_status_deserializes_as_active() {
        let json = serde_json::json!({
            "id": Uuid::new_v4(),
            "title": "Morning run",
            "category": "Running",
            "location": "Park loop",
            "date": "2024-03-01",
            "start_time": "07:00 AM",
            "end_time": "08:00 AM",
            "capacity": 5,
            "creator_id": Uuid::new_v4(),
            "joined_user_ids": [Uuid::new_v4()],
            "created_at": Utc::now(),
            "updated_at": Utc::now(),
        });

        let event: Event = serde_json::from_value(json).unwrap();
        assert_eq!(event.status, EventStatus::Active);
        assert!(event.pending_user_ids.is_empty());
        assert!(event.description.is_none());
    }
}
