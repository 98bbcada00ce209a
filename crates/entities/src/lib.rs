//! Core entity definitions for the meetup store.
//!
//! This crate defines the data types shared across the application: users,
//! events and their membership lists, and the derived per-viewer status.

mod event;
mod user;

pub use event::*;
pub use user::*;
