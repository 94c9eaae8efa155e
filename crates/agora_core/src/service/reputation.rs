//! Reputation engine.
//!
//! # Responsibility
//! - Translate an applied vote into author/voter reputation deltas and vote
//!   counters, then re-run badge evaluation on both profiles.
//! - Apply and undo the accepted-answer rewards.
//!
//! # Invariants
//! - A correction first reverses the previous direction's effect, so a
//!   corrected vote ends with the same profile state as a fresh vote in the
//!   new direction (up to the zero floor).
//! - Voter up/down counters never go negative.

use crate::config::{LedgerConfig, RewardConfig};
use crate::model::badge::Badge;
use crate::model::profile::Profile;
use crate::model::votable::VotableKind;
use crate::model::vote::VoteValue;
use crate::service::badges::BadgeEngine;
use chrono::{DateTime, Utc};
use log::debug;

/// Profile-side effects of one applied vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteSettlement<'v> {
    pub kind: VotableKind,
    pub value: VoteValue,
    /// Direction being replaced, if this vote reverses an earlier one.
    pub corrects: Option<VoteValue>,
    pub previous_votes: i64,
    pub new_votes: i64,
    pub target_id: &'v str,
}

pub struct ReputationEngine<'a> {
    rewards: &'a RewardConfig,
    badges: BadgeEngine<'a>,
}

impl<'a> ReputationEngine<'a> {
    pub fn new(config: &'a LedgerConfig) -> Self {
        Self {
            rewards: &config.rewards,
            badges: BadgeEngine::new(&config.badges),
        }
    }

    pub fn badges(&self) -> &BadgeEngine<'a> {
        &self.badges
    }

    /// Author reward for an upvote on a votable of `kind`.
    pub fn upvote_reward(&self, kind: VotableKind) -> i64 {
        match kind {
            VotableKind::Answer => self.rewards.answer_voteup_reward_author,
            VotableKind::Question => self.rewards.question_voteup_reward_author,
            VotableKind::OtherPost | VotableKind::Comment => self.rewards.voteup_reward_author,
        }
    }

    /// Applies reputation, counters and badges for one vote.
    pub fn settle(
        &self,
        settlement: VoteSettlement<'_>,
        voter: &mut Profile,
        author: &mut Profile,
        now: DateTime<Utc>,
    ) {
        if let Some(previous) = settlement.corrects {
            self.reverse(settlement.kind, previous, voter, author, now);
        }

        match settlement.value {
            VoteValue::Up => {
                author.add_rep(self.upvote_reward(settlement.kind), now);
                voter.upvotes += 1;
            }
            VoteValue::Down => {
                author.remove_rep(self.rewards.post_votedown_penalty_author, now);
                voter.remove_rep(self.rewards.post_votedown_penalty_voter, now);
                voter.downvotes += 1;
            }
        }

        self.badges.check_vote_milestone(
            author,
            settlement.kind,
            settlement.previous_votes,
            settlement.new_votes,
            now,
        );
        let voter_badges = self.badges.evaluate_thresholds(voter, now);
        let author_badges = self.badges.evaluate_thresholds(author, now);

        debug!(
            "event=rep_settle module=reputation status=ok target={} value={} corrected={} voter_rep={} author_rep={} badges={}",
            settlement.target_id,
            settlement.value.as_str(),
            settlement.corrects.is_some(),
            voter.reputation,
            author.reputation,
            voter_badges.len() + author_badges.len()
        );
    }

    fn reverse(
        &self,
        kind: VotableKind,
        previous: VoteValue,
        voter: &mut Profile,
        author: &mut Profile,
        now: DateTime<Utc>,
    ) {
        match previous {
            VoteValue::Up => {
                author.remove_rep(self.upvote_reward(kind), now);
                voter.upvotes = (voter.upvotes - 1).max(0);
            }
            VoteValue::Down => {
                author.add_rep(self.rewards.post_votedown_penalty_author, now);
                voter.add_rep(self.rewards.post_votedown_penalty_voter, now);
                voter.downvotes = (voter.downvotes - 1).max(0);
            }
        }
    }

    /// Grants (or with `approve == false` takes back) the accepted-answer
    /// rewards plus the Eureka badge. First approval also grants Noob.
    ///
    /// Callers skip this when the approver wrote the answer.
    pub fn apply_answer_approval(
        &self,
        author: &mut Profile,
        approver: &mut Profile,
        approve: bool,
        now: DateTime<Utc>,
    ) {
        if approve {
            author.add_rep(self.rewards.answer_approve_reward_author, now);
            approver.add_rep(self.rewards.answer_approve_reward_voter, now);
            self.badges.grant_once(author, Badge::Noob, true, now);
            self.badges.grant(author, Badge::Eureka, true, now);
        } else {
            author.remove_rep(self.rewards.answer_approve_reward_author, now);
            approver.remove_rep(self.rewards.answer_approve_reward_voter, now);
            self.badges.revoke(author, Badge::Eureka, now);
        }
        self.badges.evaluate_thresholds(author, now);
        self.badges.evaluate_thresholds(approver, now);
    }
}
