//! User profile aggregate: reputation, vote counters, badges.
//!
//! # Responsibility
//! - Apply reputation deltas with a zero floor.
//! - Bucket every delta into yearly/quarterly/monthly/weekly vote gains,
//!   lazily resetting a bucket when its calendar period has rolled over.
//!
//! # Invariants
//! - `reputation >= 0` after every mutation.
//! - Rolling counters may dip below zero internally but read as `>= 0`.
//! - `updated_at` is the instant of the last vote-gain update and decides
//!   which buckets reset on the next one.

use crate::clock::millis_to_datetime;
use crate::model::badge::{Badge, BadgeSet};
use crate::model::record::{ObjectKind, Record};
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

/// Moderation role of the profile owner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    User,
    Moderator,
    Admin,
}

impl Role {
    pub fn is_moderator(self) -> bool {
        matches!(self, Self::Moderator | Self::Admin)
    }
}

/// Which rolling buckets must restart from the incoming delta.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResetMask {
    pub year: bool,
    pub quarter: bool,
    pub month: bool,
    pub week: bool,
}

/// Compares calendar periods of `last_update` and `now` (UTC).
///
/// Quarter and month compare together with the calendar year, week uses
/// the ISO week-numbering year, so wrap-arounds never alias.
pub fn reset_mask(last_update: DateTime<Utc>, now: DateTime<Utc>) -> ResetMask {
    let quarter = |at: DateTime<Utc>| (at.year(), at.month0() / 3);
    let month = |at: DateTime<Utc>| (at.year(), at.month());
    ResetMask {
        year: last_update.year() != now.year(),
        quarter: quarter(last_update) != quarter(now),
        month: month(last_update) != month(now),
        week: last_update.iso_week() != now.iso_week(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: Role,
    /// Cumulative score.
    #[serde(default)]
    pub reputation: i64,
    #[serde(default)]
    pub upvotes: i64,
    #[serde(default)]
    pub downvotes: i64,
    #[serde(default)]
    yearly_votes: i64,
    #[serde(default)]
    quarterly_votes: i64,
    #[serde(default)]
    monthly_votes: i64,
    #[serde(default)]
    weekly_votes: i64,
    #[serde(default)]
    pub badges: BadgeSet,
    /// Badges granted since the owner last saw a notification.
    #[serde(default)]
    pub new_badges: Vec<Badge>,
    /// Admin-assigned badge markers.
    #[serde(default)]
    pub custom_badges: Vec<String>,
    #[serde(default)]
    pub spaces: Vec<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Record for Profile {
    const KIND: ObjectKind = ObjectKind::Profile;

    fn id(&self) -> &str {
        &self.id
    }
}

impl Profile {
    pub fn new(id: impl Into<String>, name: impl Into<String>, now_millis: i64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role: Role::User,
            reputation: 0,
            upvotes: 0,
            downvotes: 0,
            yearly_votes: 0,
            quarterly_votes: 0,
            monthly_votes: 0,
            weekly_votes: 0,
            badges: BadgeSet::new(),
            new_badges: Vec::new(),
            custom_badges: Vec::new(),
            spaces: Vec::new(),
            created_at: now_millis,
            updated_at: now_millis,
        }
    }

    /// Adds reputation. Negative amounts are routed to [`Profile::remove_rep`].
    pub fn add_rep(&mut self, amount: i64, now: DateTime<Utc>) {
        if amount < 0 {
            self.remove_rep(amount.saturating_neg(), now);
            return;
        }
        self.reputation = self.reputation.saturating_add(amount);
        self.update_vote_gains(amount, now);
    }

    /// Removes reputation, clamping the result at zero.
    pub fn remove_rep(&mut self, amount: i64, now: DateTime<Utc>) {
        if amount < 0 {
            self.add_rep(amount.saturating_neg(), now);
            return;
        }
        self.reputation = self.reputation.saturating_sub(amount).max(0);
        self.update_vote_gains(-amount, now);
    }

    fn update_vote_gains(&mut self, delta: i64, now: DateTime<Utc>) {
        let mask = reset_mask(millis_to_datetime(self.updated_at), now);
        roll(&mut self.yearly_votes, mask.year, delta);
        roll(&mut self.quarterly_votes, mask.quarter, delta);
        roll(&mut self.monthly_votes, mask.month, delta);
        roll(&mut self.weekly_votes, mask.week, delta);
        self.updated_at = now.timestamp_millis();
    }

    pub fn yearly_votes(&self) -> i64 {
        self.yearly_votes.max(0)
    }

    pub fn quarterly_votes(&self) -> i64 {
        self.quarterly_votes.max(0)
    }

    pub fn monthly_votes(&self) -> i64 {
        self.monthly_votes.max(0)
    }

    pub fn weekly_votes(&self) -> i64 {
        self.weekly_votes.max(0)
    }

    pub fn total_votes(&self) -> i64 {
        self.upvotes + self.downvotes
    }

    pub fn has_badge(&self, badge: Badge) -> bool {
        self.badges.contains(badge)
    }

    /// Drains pending badge notifications.
    pub fn take_new_badges(&mut self) -> Vec<Badge> {
        std::mem::take(&mut self.new_badges)
    }
}

fn roll(bucket: &mut i64, reset: bool, delta: i64) {
    if reset {
        *bucket = delta;
    } else {
        *bucket = bucket.saturating_add(delta);
    }
}

#[cfg(test)]
mod tests {
    use super::{reset_mask, Profile, ResetMask};
    use chrono::{TimeZone, Utc};

    #[test]
    fn same_week_resets_nothing() {
        let last = Utc.with_ymd_and_hms(2024, 5, 13, 8, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 5, 17, 20, 0, 0).unwrap();
        assert_eq!(reset_mask(last, now), ResetMask::default());
    }

    #[test]
    fn next_week_in_same_month_resets_only_week() {
        let last = Utc.with_ymd_and_hms(2024, 5, 17, 0, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 5, 20, 0, 0, 0).unwrap();
        let mask = reset_mask(last, now);
        assert!(mask.week);
        assert!(!mask.month && !mask.quarter && !mask.year);
    }

    #[test]
    fn same_quarter_number_in_another_year_still_resets_quarter() {
        let last = Utc.with_ymd_and_hms(2023, 2, 1, 0, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let mask = reset_mask(last, now);
        assert!(mask.year && mask.quarter && mask.month && mask.week);
    }

    #[test]
    fn iso_week_spanning_new_year_is_one_week() {
        // 2020-12-31 and 2021-01-01 both belong to ISO week 53 of 2020.
        let last = Utc.with_ymd_and_hms(2020, 12, 31, 0, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
        let mask = reset_mask(last, now);
        assert!(!mask.week);
        assert!(mask.year && mask.quarter && mask.month);
    }

    #[test]
    fn remove_rep_floors_reputation_and_counters_read_as_zero() {
        let now = Utc.with_ymd_and_hms(2024, 5, 13, 0, 0, 0).unwrap();
        let mut profile = Profile::new("u1", "Ann", now.timestamp_millis());
        profile.add_rep(2, now);
        profile.remove_rep(5, now);
        assert_eq!(profile.reputation, 0);
        assert_eq!(profile.weekly_votes(), 0);
        assert_eq!(profile.yearly_votes(), 0);
    }
}
