//! Run-state tracking
//!
//! [`RunStateMachine`] holds the single authoritative run state and its
//! "cannot run" reason; [`run_guard`] checks preferences before a run or
//! toggle is attempted.

mod guard;
mod machine;

pub use guard::{INVALID_TOKENS_REASON, RunBlocked, is_valid_token, run_guard};
pub use machine::{RunStateMachine, TransitionError};
