//! Badge engine.
//!
//! # Responsibility
//! - Grant and revoke badges, pairing each with its reputation reward.
//! - Re-evaluate threshold badges after profile mutations.
//!
//! # Invariants
//! - `grant_once` never adds a badge the profile already holds.
//! - `revoke` of an absent badge changes nothing, reward included.
//! - Thresholds are checked on write paths only; there is no scheduler.

use crate::config::BadgeConfig;
use crate::model::badge::Badge;
use crate::model::profile::Profile;
use crate::model::votable::VotableKind;
use chrono::{DateTime, Duration, Utc};
use log::info;

pub struct BadgeEngine<'a> {
    config: &'a BadgeConfig,
}

impl<'a> BadgeEngine<'a> {
    pub fn new(config: &'a BadgeConfig) -> Self {
        Self { config }
    }

    /// Grants `badge` unless `condition` is false or it is already held.
    pub fn grant_once(
        &self,
        profile: &mut Profile,
        badge: Badge,
        condition: bool,
        now: DateTime<Utc>,
    ) -> bool {
        if profile.has_badge(badge) {
            return false;
        }
        self.grant(profile, badge, condition, now)
    }

    /// Adds one occurrence of `badge` when `condition` holds.
    pub fn grant(
        &self,
        profile: &mut Profile,
        badge: Badge,
        condition: bool,
        now: DateTime<Utc>,
    ) -> bool {
        if !condition {
            return false;
        }
        let held = profile.badges.insert(badge);
        profile.new_badges.push(badge);
        let reward = self.config.reward_for(badge);
        if reward != 0 {
            profile.add_rep(reward, now);
        }
        info!(
            "event=badge_grant module=badges status=ok profile={} badge={} held={} reward={}",
            profile.id, badge, held, reward
        );
        true
    }

    /// Removes one occurrence of `badge` and takes its reward back.
    pub fn revoke(&self, profile: &mut Profile, badge: Badge, now: DateTime<Utc>) -> bool {
        if !profile.badges.remove_one(badge) {
            return false;
        }
        if let Some(pos) = profile.new_badges.iter().rposition(|pending| *pending == badge) {
            profile.new_badges.remove(pos);
        }
        let reward = self.config.reward_for(badge);
        if reward != 0 {
            profile.remove_rep(reward, now);
        }
        info!(
            "event=badge_revoke module=badges status=ok profile={} badge={} reward={}",
            profile.id, badge, reward
        );
        true
    }

    /// Grants every newly satisfied threshold badge and returns them.
    ///
    /// Reputation tiers are walked in ascending order so a reward earned on
    /// one tier counts toward the next within the same pass.
    pub fn evaluate_thresholds(&self, profile: &mut Profile, now: DateTime<Utc>) -> Vec<Badge> {
        let config = self.config;
        let mut granted = Vec::new();

        for (badge, threshold) in [
            (Badge::Enthusiast, config.enthusiast_ifhas),
            (Badge::Freshman, config.freshman_ifhas),
            (Badge::Scholar, config.scholar_ifhas),
            (Badge::Teacher, config.teacher_ifhas),
            (Badge::Professor, config.professor_ifhas),
            (Badge::Geek, config.geek_ifhas),
        ] {
            let reached = profile.reputation >= threshold;
            if self.grant_once(profile, badge, reached, now) {
                granted.push(badge);
            }
        }

        let voter_badges = [
            (Badge::Supporter, profile.upvotes >= config.supporter_ifhas),
            (Badge::Critic, profile.downvotes >= config.critic_ifhas),
            (Badge::Voter, profile.total_votes() >= config.voter_ifhas),
            (
                Badge::Veteran,
                now.timestamp_millis() - profile.created_at
                    >= Duration::days(config.veteran_after_days).num_milliseconds(),
            ),
        ];
        for (badge, reached) in voter_badges {
            if self.grant_once(profile, badge, reached, now) {
                granted.push(badge);
            }
        }

        granted
    }

    /// Grants GoodQuestion/GoodAnswer when a post's score crosses the
    /// configured threshold upward.
    pub fn check_vote_milestone(
        &self,
        author: &mut Profile,
        kind: VotableKind,
        previous_votes: i64,
        new_votes: i64,
        now: DateTime<Utc>,
    ) -> Option<Badge> {
        let (badge, threshold) = match kind {
            VotableKind::Question => (Badge::GoodQuestion, self.config.good_question_ifhas),
            VotableKind::Answer => (Badge::GoodAnswer, self.config.good_answer_ifhas),
            VotableKind::OtherPost | VotableKind::Comment => return None,
        };
        let crossed = previous_votes < threshold && new_votes >= threshold;
        self.grant(author, badge, crossed, now).then_some(badge)
    }
}

#[cfg(test)]
mod tests {
    use super::BadgeEngine;
    use crate::config::BadgeConfig;
    use crate::model::badge::Badge;
    use crate::model::profile::Profile;
    use crate::model::votable::VotableKind;
    use chrono::{Duration, TimeZone, Utc};

    #[test]
    fn reputation_tiers_cascade_in_one_pass() {
        let mut config = BadgeConfig::default();
        config.enthusiast_ifhas = 10;
        config.freshman_ifhas = 15;
        config.rewards.insert("enthusiast".to_string(), 5);
        let engine = BadgeEngine::new(&config);
        let now = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();
        let mut profile = Profile::new("u1", "Ann", now.timestamp_millis());
        profile.add_rep(10, now);

        let granted = engine.evaluate_thresholds(&mut profile, now);
        assert_eq!(granted, vec![Badge::Enthusiast, Badge::Freshman]);
        assert_eq!(profile.reputation, 15);
        assert!(engine.evaluate_thresholds(&mut profile, now).is_empty());
    }

    #[test]
    fn grant_once_twice_holds_badge_and_reward_once() {
        let config = BadgeConfig::default();
        let engine = BadgeEngine::new(&config);
        let now = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();
        let mut profile = Profile::new("u1", "Ann", now.timestamp_millis());

        assert!(engine.grant_once(&mut profile, Badge::NiceProfile, true, now));
        assert!(!engine.grant_once(&mut profile, Badge::NiceProfile, true, now));

        assert_eq!(profile.badges.count(Badge::NiceProfile), 1);
        assert_eq!(profile.new_badges, vec![Badge::NiceProfile]);
        assert_eq!(profile.reputation, Badge::NiceProfile.default_reward());
        assert!(!engine.grant_once(&mut profile, Badge::Noob, false, now));
        assert!(!profile.has_badge(Badge::Noob));
    }

    #[test]
    fn veteran_requires_profile_age() {
        let config = BadgeConfig::default();
        let engine = BadgeEngine::new(&config);
        let created = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        let mut profile = Profile::new("u1", "Ann", created.timestamp_millis());

        let early = created + Duration::days(364);
        assert!(!engine
            .evaluate_thresholds(&mut profile, early)
            .contains(&Badge::Veteran));
        let later = created + Duration::days(365);
        assert!(engine
            .evaluate_thresholds(&mut profile, later)
            .contains(&Badge::Veteran));
        assert_eq!(profile.reputation, Badge::Veteran.default_reward());
    }

    #[test]
    fn milestone_fires_only_on_upward_crossing() {
        let config = BadgeConfig::default();
        let engine = BadgeEngine::new(&config);
        let now = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();
        let mut author = Profile::new("u1", "Ann", now.timestamp_millis());

        assert_eq!(
            engine.check_vote_milestone(&mut author, VotableKind::Answer, 9, 10, now),
            Some(Badge::GoodAnswer)
        );
        assert_eq!(
            engine.check_vote_milestone(&mut author, VotableKind::Answer, 10, 11, now),
            None
        );
        assert_eq!(
            engine.check_vote_milestone(&mut author, VotableKind::Comment, 9, 10, now),
            None
        );
        assert_eq!(author.badges.count(Badge::GoodAnswer), 1);
    }
}
