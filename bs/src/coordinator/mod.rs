//! Coordinator: the background context
//!
//! Owns the authoritative run state, dispatches every inbound envelope to
//! exactly one handler, drives the page through run/toggle/status
//! round-trips, and pushes run-state and badge updates to control surfaces.

mod config;
mod core;
mod handle;
mod messages;

pub use config::CoordinatorConfig;
pub use core::{Coordinator, PREFERENCES_KEY};
pub use handle::CoordinatorHandle;
pub use messages::{CoordRequest, CoordinatorError, Push};
