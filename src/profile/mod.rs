//! Counterparty profile screening.
//!
//! Before accepting, the partner's account is checked for the usual signs
//! of a throwaway: low level, a young account, or a private profile. Any
//! signal turns an accept into a manual review.

pub mod steam;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::types::TradeError;

pub use steam::SteamProfileClient;

/// Community visibility state Steam reports for a private profile.
pub const VISIBILITY_PRIVATE: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSummary {
    pub level: u32,
    /// Absent when the profile hides it.
    pub created_at: Option<DateTime<Utc>>,
    pub visibility: u32,
}

/// Account lookup used by the fraud screen.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProfileLookup: Send + Sync {
    async fn summary(&self, steam_id: u64) -> Result<ProfileSummary, TradeError>;
}

// ---------------------------------------------------------------------------
// Screen
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FraudScreen {
    pub min_level: u32,
    pub min_account_age: Duration,
}

impl Default for FraudScreen {
    fn default() -> Self {
        Self {
            min_level: 4,
            min_account_age: Duration::seconds(15_768_000),
        }
    }
}

impl FraudScreen {
    /// Human-readable signals raised by this profile. Empty means clean.
    pub fn signals(&self, profile: &ProfileSummary, now: DateTime<Utc>) -> Vec<String> {
        let mut signals = Vec::new();

        if profile.level < self.min_level {
            signals.push(format!("level {} below {}", profile.level, self.min_level));
        }

        if let Some(created) = profile.created_at {
            let age = now - created;
            if age < self.min_account_age {
                signals.push(format!("account is {} days old", age.num_days()));
            }
        }

        if profile.visibility == VISIBILITY_PRIVATE {
            signals.push("private profile".to_string());
        }

        signals
    }
}
