//! Badge identifiers and the per-profile badge multiset.
//!
//! # Invariants
//! - A badge is present iff its multiplicity is at least one.
//! - Multiplicities never drop below zero; removing an absent badge is a no-op.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// Badges a profile can earn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Badge {
    /// Account older than the configured number of days.
    Veteran,
    /// Profile filled in.
    NiceProfile,
    /// Cast enough upvotes.
    Supporter,
    /// Cast enough downvotes.
    Critic,
    /// Cast enough votes in total.
    Voter,
    /// Question reached the vote threshold.
    GoodQuestion,
    /// Answer reached the vote threshold.
    GoodAnswer,
    /// Holds an accepted answer; revoked when the acceptance is undone.
    Eureka,
    /// First accepted answer.
    Noob,
    Enthusiast,
    Freshman,
    Scholar,
    Teacher,
    Professor,
    Geek,
}

impl Badge {
    pub const ALL: [Badge; 15] = [
        Badge::Veteran,
        Badge::NiceProfile,
        Badge::Supporter,
        Badge::Critic,
        Badge::Voter,
        Badge::GoodQuestion,
        Badge::GoodAnswer,
        Badge::Eureka,
        Badge::Noob,
        Badge::Enthusiast,
        Badge::Freshman,
        Badge::Scholar,
        Badge::Teacher,
        Badge::Professor,
        Badge::Geek,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Veteran => "veteran",
            Self::NiceProfile => "nice_profile",
            Self::Supporter => "supporter",
            Self::Critic => "critic",
            Self::Voter => "voter",
            Self::GoodQuestion => "good_question",
            Self::GoodAnswer => "good_answer",
            Self::Eureka => "eureka",
            Self::Noob => "noob",
            Self::Enthusiast => "enthusiast",
            Self::Freshman => "freshman",
            Self::Scholar => "scholar",
            Self::Teacher => "teacher",
            Self::Professor => "professor",
            Self::Geek => "geek",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|badge| badge.as_str() == normalized)
    }

    /// Reputation reward used when the config has no override.
    pub fn default_reward(self) -> i64 {
        match self {
            Self::Veteran | Self::NiceProfile => 10,
            _ => 0,
        }
    }
}

impl Display for Badge {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Multiset of badges held by one profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BadgeSet(BTreeMap<Badge, u32>);

impl BadgeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, badge: Badge) -> bool {
        self.count(badge) > 0
    }

    /// Number of times `badge` was granted and not revoked.
    pub fn count(&self, badge: Badge) -> u32 {
        self.0.get(&badge).copied().unwrap_or(0)
    }

    /// Adds one occurrence and returns the new multiplicity.
    pub fn insert(&mut self, badge: Badge) -> u32 {
        let slot = self.0.entry(badge).or_insert(0);
        *slot = slot.saturating_add(1);
        *slot
    }

    /// Removes one occurrence. Returns `false` when the badge was absent.
    pub fn remove_one(&mut self, badge: Badge) -> bool {
        match self.0.get_mut(&badge) {
            Some(count) if *count > 1 => {
                *count -= 1;
                true
            }
            Some(_) => {
                self.0.remove(&badge);
                true
            }
            None => false,
        }
    }

    /// Number of distinct badges held.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Badge, u32)> + '_ {
        self.0.iter().map(|(badge, count)| (*badge, *count))
    }
}
