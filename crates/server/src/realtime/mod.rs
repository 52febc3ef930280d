//! Live updates
//!
//! Connected map clients are grouped into grid-cell rooms by their last
//! search area; new registrations are pushed to the rooms covering them.

pub mod hub;
pub mod socket;

pub use hub::{CellKey, ConnectionId, LiveHub, Subscription};
