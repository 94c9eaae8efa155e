//! Ledger configuration schema and loading.
//!
//! # Responsibility
//! - Hold every tunable consumed by the ledger: rewards and penalties, vote
//!   windows, badge thresholds, tag policy, job sizing, cache TTL, logging.
//! - Parse TOML and validate ranges before any service sees the values.
//!
//! # Invariants
//! - Every section is optional in the file; missing values take defaults.
//! - Unknown keys are rejected so typos do not silently fall back to defaults.
//!
//! # Example
//!
//! ```toml
//! [rewards]
//! answer_voteup_reward_author = 10
//!
//! [votes]
//! locked_after_sec = 30
//!
//! [tags]
//! max_tags_per_post = 5
//! allow_tag_creation = false
//! ```

use crate::logging::parse_level;
use crate::model::badge::Badge;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    ParseError(String),

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Root configuration for the ledger core.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct LedgerConfig {
    pub rewards: RewardConfig,
    pub votes: VoteWindowConfig,
    pub badges: BadgeConfig,
    pub tags: TagPolicy,
    pub moderation: ModerationConfig,
    pub jobs: JobConfig,
    pub spaces: SpaceCacheConfig,
    pub logging: LoggingConfig,
}

/// Reputation rewards and penalties per vote kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct RewardConfig {
    pub answer_voteup_reward_author: i64,
    pub question_voteup_reward_author: i64,
    pub voteup_reward_author: i64,
    pub answer_approve_reward_author: i64,
    pub answer_approve_reward_voter: i64,
    pub post_votedown_penalty_author: i64,
    pub post_votedown_penalty_voter: i64,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            answer_voteup_reward_author: 10,
            question_voteup_reward_author: 5,
            voteup_reward_author: 2,
            answer_approve_reward_author: 10,
            answer_approve_reward_voter: 3,
            post_votedown_penalty_author: 3,
            post_votedown_penalty_voter: 1,
        }
    }
}

/// Time windows enforced by the datastore's vote primitive.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct VoteWindowConfig {
    /// A same-direction vote may be cast again once this many seconds passed.
    pub expires_after_sec: i64,
    /// A cast vote cannot be reversed until this many seconds passed.
    pub locked_after_sec: i64,
}

impl Default for VoteWindowConfig {
    fn default() -> Self {
        Self {
            expires_after_sec: 30 * 24 * 60 * 60,
            locked_after_sec: 30,
        }
    }
}

/// Badge thresholds and per-badge reputation rewards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct BadgeConfig {
    pub voter_ifhas: i64,
    pub critic_ifhas: i64,
    pub supporter_ifhas: i64,
    pub good_question_ifhas: i64,
    pub good_answer_ifhas: i64,
    pub enthusiast_ifhas: i64,
    pub freshman_ifhas: i64,
    pub scholar_ifhas: i64,
    pub teacher_ifhas: i64,
    pub professor_ifhas: i64,
    pub geek_ifhas: i64,
    pub veteran_after_days: i64,
    /// Reward overrides keyed by badge name (`nice_profile = 10`).
    pub rewards: BTreeMap<String, i64>,
}

impl Default for BadgeConfig {
    fn default() -> Self {
        Self {
            voter_ifhas: 100,
            critic_ifhas: 10,
            supporter_ifhas: 50,
            good_question_ifhas: 20,
            good_answer_ifhas: 10,
            enthusiast_ifhas: 100,
            freshman_ifhas: 300,
            scholar_ifhas: 500,
            teacher_ifhas: 1000,
            professor_ifhas: 5000,
            geek_ifhas: 9000,
            veteran_after_days: 365,
            rewards: BTreeMap::new(),
        }
    }
}

impl BadgeConfig {
    /// Reputation reward attached to `badge`, honoring overrides.
    pub fn reward_for(&self, badge: Badge) -> i64 {
        self.rewards
            .get(badge.as_str())
            .copied()
            .unwrap_or_else(|| badge.default_reward())
    }
}

/// Tag limits and creation permission.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct TagPolicy {
    pub max_tags_per_post: usize,
    pub min_tags_per_post: usize,
    /// When false only moderators may introduce previously unknown tags.
    pub allow_tag_creation: bool,
}

impl Default for TagPolicy {
    fn default() -> Self {
        Self {
            max_tags_per_post: 5,
            min_tags_per_post: 0,
            allow_tag_creation: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ModerationConfig {
    /// Votable score at or below which auto-moderation fires.
    pub auto_moderation_threshold: i64,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            auto_moderation_threshold: -5,
        }
    }
}

/// Background reconciliation sizing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct JobConfig {
    pub workers: usize,
    pub page_size: u32,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            page_size: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct SpaceCacheConfig {
    pub ttl_sec: i64,
}

impl Default for SpaceCacheConfig {
    fn default() -> Self {
        Self { ttl_sec: 30 }
    }
}

/// File logging. Nothing is initialized unless `dir` is set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `trace|debug|info|warn|error|off`; unset means `debug` in debug
    /// builds and `info` otherwise.
    pub level: Option<String>,
    /// Absolute directory for `agora*.log` files.
    pub dir: Option<PathBuf>,
    pub max_file_size_mb: u64,
    pub keep_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: None,
            dir: None,
            max_file_size_mb: 10,
            keep_files: 5,
        }
    }
}

impl LedgerConfig {
    /// Reads, parses and validates a TOML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parses and validates TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let rewards = &self.rewards;
        for (name, value) in [
            ("answer_voteup_reward_author", rewards.answer_voteup_reward_author),
            ("question_voteup_reward_author", rewards.question_voteup_reward_author),
            ("voteup_reward_author", rewards.voteup_reward_author),
            ("answer_approve_reward_author", rewards.answer_approve_reward_author),
            ("answer_approve_reward_voter", rewards.answer_approve_reward_voter),
            ("post_votedown_penalty_author", rewards.post_votedown_penalty_author),
            ("post_votedown_penalty_voter", rewards.post_votedown_penalty_voter),
        ] {
            if value < 0 {
                return Err(ConfigError::InvalidValue(format!(
                    "rewards.{name} must not be negative, got {value}"
                )));
            }
        }

        if self.votes.expires_after_sec < 0 || self.votes.locked_after_sec < 0 {
            return Err(ConfigError::InvalidValue(
                "votes windows must not be negative".to_string(),
            ));
        }

        for name in self.badges.rewards.keys() {
            if Badge::parse(name).is_none() {
                return Err(ConfigError::InvalidValue(format!(
                    "badges.rewards has unknown badge `{name}`"
                )));
            }
        }

        if self.tags.max_tags_per_post == 0 {
            return Err(ConfigError::InvalidValue(
                "tags.max_tags_per_post must be at least 1".to_string(),
            ));
        }
        if self.tags.min_tags_per_post > self.tags.max_tags_per_post {
            return Err(ConfigError::InvalidValue(format!(
                "tags.min_tags_per_post ({}) exceeds tags.max_tags_per_post ({})",
                self.tags.min_tags_per_post, self.tags.max_tags_per_post
            )));
        }

        if self.jobs.workers == 0 || self.jobs.page_size == 0 {
            return Err(ConfigError::InvalidValue(
                "jobs.workers and jobs.page_size must be at least 1".to_string(),
            ));
        }
        if let Some(level) = self.logging.level.as_deref() {
            parse_level(level).map_err(|err| ConfigError::InvalidValue(err.to_string()))?;
        }
        if self.logging.max_file_size_mb == 0 || self.logging.keep_files == 0 {
            return Err(ConfigError::InvalidValue(
                "logging.max_file_size_mb and logging.keep_files must be at least 1".to_string(),
            ));
        }
        if self.spaces.ttl_sec < 0 {
            return Err(ConfigError::InvalidValue(
                "spaces.ttl_sec must not be negative".to_string(),
            ));
        }

        Ok(())
    }
}
