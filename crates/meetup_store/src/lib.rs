//! Event and membership storage for the meetup app.
//!
//! This crate is the single facade the UI talks to: it owns the in-memory
//! collections of users and events, enforces the membership and lifecycle
//! rules, and persists every change through a pluggable [`StateStore`]
//! backend. State is loaded once at startup, repaired if it was written by an
//! older schema, and swept for date-driven expiry whenever the event
//! collection changes size.

mod error;
mod persistence;
mod store;
mod sweeper;

pub use error::*;
pub use persistence::*;
pub use store::*;
pub use sweeper::*;
