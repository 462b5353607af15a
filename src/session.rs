//! The session coordinator and everything around it.
//!
//! One [`Coordinator`] owns the [`PlaylistState`]. It runs on its own thread
//! (see [`SessionService`]) and is the only writer of state; every other
//! part of the program sends it messages and reads published snapshots.

mod coordinator;
mod message;
mod publisher;
mod service;
mod state;
mod ticker;

pub use coordinator::{Coordinator, next_speed};
pub use message::Intent;
pub use publisher::{StatePublisher, StateReader};
pub use service::SessionService;
pub use state::*;

#[cfg(test)]
mod tests;
