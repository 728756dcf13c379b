use crate::types::RewardId;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Which ceiling a redemption ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitScope {
    Total,
    Daily,
}

impl fmt::Display for LimitScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LimitScope::Total => f.write_str("total"),
            LimitScope::Daily => f.write_str("daily"),
        }
    }
}

#[derive(Error, Debug)]
pub enum PromoError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("Reward {reward_id} is expired or not started yet")]
    RewardExpiredOrNotStarted { reward_id: RewardId },

    #[error("Reward {reward_id} reached its {scope} limit of {limit}")]
    LimitExceeded {
        reward_id: RewardId,
        scope:     LimitScope,
        limit:     u32,
    },

    #[error("Reward {reward_id} has no unredeemed coupons left")]
    NoCouponsAvailable { reward_id: RewardId },

    #[error("Store conflict, attempt must be retried")]
    ConflictRetry,

    #[error("Redemption still conflicting after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PromoError {
    /// Stable snake_case name, used on the wire by the runner.
    pub fn kind(&self) -> &'static str {
        match self {
            PromoError::NotFound { .. }                  => "not_found",
            PromoError::RewardExpiredOrNotStarted { .. } => "reward_expired_or_not_started",
            PromoError::LimitExceeded { scope: LimitScope::Total, .. } => "total_limit_exceeded",
            PromoError::LimitExceeded { scope: LimitScope::Daily, .. } => "daily_limit_exceeded",
            PromoError::NoCouponsAvailable { .. }        => "no_coupons_available",
            PromoError::ConflictRetry                    => "conflict_retry",
            PromoError::RetriesExhausted { .. }          => "retries_exhausted",
            PromoError::InvalidConfig(_)                 => "invalid_config",
            PromoError::Database(_)                      => "database",
            PromoError::Serialization(_)                 => "serialization",
            PromoError::Other(_)                         => "other",
        }
    }

    /// Whether the same request could succeed later without the caller
    /// changing anything. A daily ceiling resets when the day rolls over.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PromoError::LimitExceeded { scope: LimitScope::Daily, .. }
                | PromoError::ConflictRetry
                | PromoError::RetriesExhausted { .. }
        )
    }
}

pub type PromoResult<T> = Result<T, PromoError>;
