//! Cumulative statistics folded from domain events

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::log::{DomainEvent, EventKind};

/// One recorded steal; either side may be unknown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Steal {
    pub character: Option<String>,
    pub user: Option<String>,
}

/// Kakera counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct KakeraStats {
    /// Number of collection events per kakera type
    pub per_type: BTreeMap<String, u64>,
    /// Running sum of kakera gained per user
    pub amount: BTreeMap<String, u64>,
}

/// Cumulative statistics keyed by username
///
/// Every collection only grows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Stats {
    pub characters: BTreeMap<String, Vec<String>>,
    pub soulmates: BTreeMap<String, Vec<String>>,
    pub steals: Vec<Steal>,
    pub kakera: KakeraStats,
}

/// What folding one event did to the stats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsOutcome {
    Updated,
    /// The event kind does not feed the stats
    NotTracked,
    /// A field the stats are keyed on was missing
    Skipped(&'static str),
}

impl Stats {
    /// Fold one event into the stats
    pub fn apply(&mut self, event: &DomainEvent) -> StatsOutcome {
        match event.event_type {
            EventKind::Claim => {
                let (Some(user), Some(character)) = (event.user(), event.character()) else {
                    return StatsOutcome::Skipped("claim without user or character");
                };
                self.characters.entry(user).or_default().push(character);
                StatsOutcome::Updated
            }
            EventKind::Steal => {
                self.steals.push(Steal {
                    character: event.character(),
                    user: event.user(),
                });
                StatsOutcome::Updated
            }
            EventKind::Kakera => {
                // The two counters are independent: a missing user still counts the type
                let kakera_type = event.kakera_type();
                let user = event.user();
                let complete = kakera_type.is_some() && user.is_some();
                if let Some(kakera_type) = kakera_type {
                    *self.kakera.per_type.entry(kakera_type).or_insert(0) += 1;
                }
                if let Some(user) = user {
                    let total = self.kakera.amount.entry(user).or_insert(0);
                    *total = total.saturating_add(event.amount().unwrap_or(0));
                }
                if complete {
                    StatsOutcome::Updated
                } else {
                    StatsOutcome::Skipped("kakera without user or kakeraType")
                }
            }
            EventKind::Soulmate => {
                let (Some(user), Some(character)) = (event.user(), event.character()) else {
                    return StatsOutcome::Skipped("soulmate without user or character");
                };
                self.soulmates.entry(user).or_default().push(character);
                StatsOutcome::Updated
            }
            EventKind::CharacterFound | EventKind::Bonus => StatsOutcome::NotTracked,
        }
    }
}
