//! Date-driven event expiry.

use chrono::NaiveDate;
use entities::{Event, EventStatus};
use tracing::debug;

/// Reconciles date-driven expiry into stored status.
///
/// Runs whenever the event collection is loaded or changes size. Expired
/// events lose their pending requests and have their status pinned to
/// `Expired`; deleted events are tombstones and stay untouched whatever
/// their date. Returns whether anything changed so the caller persists only
/// when needed. Sweeping twice in a row is a no-op.
pub fn sweep(events: &mut [Event], today: NaiveDate) -> bool {
    let mut changed = false;
    for event in events.iter_mut() {
        if event.is_deleted() || !event.is_expired(today) {
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
        debug!("sweeper expired stale events");
    }
    changed
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
                title: "Sunday tennis".to_string(),
                category: "Tennis".to_string(),
                location: "Court 3".to_string(),
                description: None,
                date,
                start_time: "10:00 AM".to_string(),
                end_time: "11:00 AM".to_string(),
                capacity: 4,
            },
            Uuid::new_v4(),
        )
    }

    #[test]
    fn test_sweep_expires_and_clears_pending() {
        let today = Utc::now().date_naive();
        let mut event = event_on(today.checked_sub_days(Days::new(1)).unwrap());
        event.pending_user_ids.push(Uuid::new_v4());
        let mut events = vec![event];

        assert!(sweep(&mut events, today));
        assert_eq!(events[0].status, EventStatus::Expired);
        assert!(events[0].pending_user_ids.is_empty());

        // Idempotent: a second pass finds nothing to do.
        assert!(!sweep(&mut events, today));
    }

    #[test]
    fn test_sweep_expires_without_pending() {
        let today = Utc::now().date_naive();
        let mut events = vec![event_on(today.checked_sub_days(Days::new(3)).unwrap())];

        assert!(sweep(&mut events, today));
        assert_eq!(events[0].status, EventStatus::Expired);
    }

    #[test]
    fn test_sweep_leaves_deleted_events_untouched() {
        let today = Utc::now().date_naive();
        let mut event = event_on(today.checked_sub_days(Days::new(1)).unwrap());
        event.status = EventStatus::Deleted;
        let mut events = vec![event];

        assert!(!sweep(&mut events, today));
        assert_eq!(events[0].status, EventStatus::Deleted);
    }

    #[test]
    fn test_sweep_leaves_future_events_untouched() {
        let today = Utc::now().date_naive();
        let mut event = event_on(today.checked_add_days(Days::new(7)).unwrap());
        event.pending_user_ids.push(Uuid::new_v4());
        let mut events = vec![event];

        assert!(!sweep(&mut events, today));
        assert_eq!(events[0].status, EventStatus::Active);
        assert_eq!(events[0].pending_user_ids.len(), 1);
    }
}
