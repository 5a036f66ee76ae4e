//! Pre-run check on preferences

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::debug;

use crate::domain::{Preferences, UserSource};

pub const INVALID_TOKENS_REASON: &str = "Token list is empty or contains an invalid token.";

static TOKEN_FORMAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w-]{24,}\.[\w-]{6}\.[\w-]{27,}$").expect("token pattern is valid"));

/// Preferences that must not be used to start the bot
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct RunBlocked {
    pub reason: &'static str,
}

pub fn is_valid_token(token: &str) -> bool {
    TOKEN_FORMAT.is_match(token)
}

/// Reject token mode with no tokens or a badly formed one
pub fn run_guard(prefs: &Preferences) -> Result<(), RunBlocked> {
    debug!(use_users = prefs.use_users.as_str(), tokens = prefs.token_list.len(), "run_guard: called");
    if prefs.use_users != UserSource::Tokens {
        return Ok(());
    }
    if prefs.token_list.is_empty() || !prefs.token_list.iter().all(|t| is_valid_token(t)) {
        return Err(RunBlocked {
            reason: INVALID_TOKENS_REASON,
        });
    }
    Ok(())
}
