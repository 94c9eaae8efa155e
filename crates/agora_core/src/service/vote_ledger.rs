//! Vote ledger: the request-path entry point for votes.
//!
//! # Responsibility
//! - Batch-load the author profile, voter profile and live vote record.
//! - Delegate the conditional write to the datastore's atomic vote primitive.
//! - Settle reputation and badges, persist both profiles, run auto-moderation.
//!
//! # Invariants
//! - Returns `Ok(false)` without side effects for self-votes, missing
//!   profiles, a missing votable and rejected votes.
//! - The votable counter and vote record change atomically; profiles are
//!   written afterwards in one batch.

use crate::clock::Clock;
use crate::config::LedgerConfig;
use crate::model::profile::Profile;
use crate::model::record::{ObjectKey, ObjectKind};
use crate::model::report::{Report, ReportKind};
use crate::model::votable::Votable;
use crate::model::vote::{Vote, VoteValue};
use crate::repo::datastore::{Datastore, Filter, Patch, VoteOutcome};
use crate::repo::{RepoError, RepoResult};
use crate::service::reputation::{ReputationEngine, VoteSettlement};
use chrono::{DateTime, Utc};
use log::{info, warn};

/// Live vote state of one voter on one votable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorVote {
    None,
    Upvoted,
    Downvoted,
}

impl From<Option<&Vote>> for PriorVote {
    fn from(value: Option<&Vote>) -> Self {
        match value.map(|vote| vote.value) {
            None => Self::None,
            Some(VoteValue::Up) => Self::Upvoted,
            Some(VoteValue::Down) => Self::Downvoted,
        }
    }
}

pub struct VoteLedger<'a, S: Datastore> {
    store: &'a S,
    config: &'a LedgerConfig,
    clock: &'a dyn Clock,
    reputation: ReputationEngine<'a>,
}

impl<'a, S: Datastore> VoteLedger<'a, S> {
    pub fn new(store: &'a S, config: &'a LedgerConfig, clock: &'a dyn Clock) -> Self {
        Self {
            store,
            config,
            clock,
            reputation: ReputationEngine::new(config),
        }
    }

    /// Current vote of `voter_id` on `votable_id`.
    pub fn prior_vote(&self, voter_id: &str, votable_id: &str) -> RepoResult<PriorVote> {
        let vote = self.store.read::<Vote>(&Vote::id_for(voter_id, votable_id))?;
        Ok(PriorVote::from(vote.as_ref()))
    }

    /// Casts, re-casts or corrects a vote.
    ///
    /// On success `votable.votes()` reflects the persisted counter. Returns
    /// `Ok(false)` when the vote was not applied.
    pub fn apply_vote(
        &self,
        votable: &mut Votable,
        voter_id: &str,
        is_upvote: bool,
    ) -> RepoResult<bool> {
        let value = VoteValue::from_upvote(is_upvote);
        let author_id = votable.creator_id().to_string();
        if author_id == voter_id {
            info!(
                "event=vote_apply module=vote_ledger status=skip reason=self_vote target={}",
                votable.key()
            );
            return Ok(false);
        }

        let author_key = ObjectKey::new(ObjectKind::Profile, author_id.as_str());
        let voter_key = ObjectKey::new(ObjectKind::Profile, voter_id);
        let vote_key = ObjectKey::new(ObjectKind::Vote, Vote::id_for(voter_id, votable.id()));
        let docs = self.store.read_documents(&[
            author_key.clone(),
            voter_key.clone(),
            vote_key.clone(),
        ])?;
        let (Some(author_doc), Some(voter_doc)) = (docs.get(&author_key), docs.get(&voter_key))
        else {
            info!(
                "event=vote_apply module=vote_ledger status=skip reason=missing_profile target={} voter={}",
                votable.key(),
                voter_id
            );
            return Ok(false);
        };
        let mut author: Profile = author_doc.decode()?;
        let mut voter: Profile = voter_doc.decode()?;
        let live_vote = docs.get(&vote_key).map(|doc| doc.decode::<Vote>()).transpose()?;
        let prior = PriorVote::from(live_vote.as_ref());

        let now = self.clock.now();
        let outcome = match self.store.vote(
            &votable.key(),
            voter_id,
            value,
            self.config.votes,
            now.timestamp_millis(),
        ) {
            Ok(outcome) => outcome,
            Err(RepoError::NotFound(key)) => {
                info!(
                    "event=vote_apply module=vote_ledger status=skip reason=missing_votable target={} voter={}",
                    key, voter_id
                );
                return Ok(false);
            }
            Err(err) => return Err(err),
        };
        let corrects = match outcome {
            VoteOutcome::Rejected(reason) => {
                info!(
                    "event=vote_apply module=vote_ledger status=skip reason={:?} target={} voter={}",
                    reason,
                    votable.key(),
                    voter_id
                );
                return Ok(false);
            }
            VoteOutcome::Corrected { previous } => Some(previous),
            VoteOutcome::Cast | VoteOutcome::Recast => None,
        };
        if corrects.is_some() == (prior == PriorVote::None) {
            warn!(
                "event=vote_apply module=vote_ledger status=race target={} prior={:?} outcome={:?}",
                votable.key(),
                prior,
                outcome
            );
        }

        let previous_votes = votable.votes();
        let new_votes = self
            .persisted_votes(&votable.key())?
            .unwrap_or(previous_votes + outcome.counter_delta(value));
        self.reputation.settle(
            VoteSettlement {
                kind: votable.kind(),
                value,
                corrects,
                previous_votes: new_votes - outcome.counter_delta(value),
                new_votes,
                target_id: votable.id(),
            },
            &mut voter,
            &mut author,
            now,
        );
        votable.set_votes(new_votes);
        self.store.update_all(&[voter, author])?;

        if value == VoteValue::Down {
            self.auto_moderate(votable, now)?;
        }

        info!(
            "event=vote_apply module=vote_ledger status=ok target={} voter={} value={} outcome={:?} votes={}",
            votable.key(),
            voter_id,
            value.as_str(),
            outcome,
            new_votes
        );
        Ok(true)
    }

    fn persisted_votes(&self, key: &ObjectKey) -> RepoResult<Option<i64>> {
        let docs = self.store.read_documents(std::slice::from_ref(key))?;
        Ok(docs
            .get(key)
            .and_then(|doc| doc.body.get("votes"))
            .and_then(|votes| votes.as_i64()))
    }

    /// Hides a comment, or opens a closing report on a post, once its score
    /// drops to the moderation threshold.
    fn auto_moderate(&self, votable: &mut Votable, now: DateTime<Utc>) -> RepoResult<()> {
        let threshold = self.config.moderation.auto_moderation_threshold;
        if votable.votes() > threshold {
            return Ok(());
        }

        match votable {
            Votable::Comment(comment) => {
                if comment.hidden {
                    return Ok(());
                }
                comment.hidden = true;
                self.store.patch_all(
                    ObjectKind::Comment,
                    &[Patch::new(comment.id.as_str()).set("hidden", true)],
                )?;
                info!(
                    "event=auto_moderate module=vote_ledger status=ok action=hide_comment target={} votes={}",
                    comment.id, comment.votes
                );
            }
            Votable::Post(post) => {
                let open_reports = self.store.count(
                    ObjectKind::Report,
                    &Filter::And(vec![
                        Filter::eq("parent_id", post.id.as_str()),
                        Filter::eq("kind", "for_closing"),
                        Filter::eq("closed", false),
                    ]),
                )?;
                if open_reports > 0 {
                    return Ok(());
                }
                let mut report = Report::new(
                    post.id.as_str(),
                    ReportKind::ForClosing,
                    format!("Score dropped to {}", post.votes),
                    now.timestamp_millis(),
                );
                report.author_name = "System".to_string();
                self.store.create(&report)?;
                info!(
                    "event=auto_moderate module=vote_ledger status=ok action=report_post target={} votes={} report={}",
                    post.id, post.votes, report.id
                );
            }
        }
        Ok(())
    }
}
