//! Trade service seam.
//!
//! The `TradeService` trait is the only path through which the engine talks
//! to the trading platform: accepting, declining, querying escrow and
//! refreshing offer data. Calls are wrapped with a timeout and may be
//! retried once after a fixed backoff.

pub mod dry_run;

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::types::{AcceptStatus, Offer, TradeError};

pub use dry_run::{Dispatch, DryRunTradeService};

/// Escrow hold, in days, for each side of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EscrowDays {
    pub ours: u32,
    pub theirs: u32,
}

impl EscrowDays {
    /// Days that apply to this offer: their hold matters if we receive
    /// items, ours if we give items.
    pub fn effective(&self, receiving: bool, giving: bool) -> u32 {
        let theirs = if receiving { self.theirs } else { 0 };
        let ours = if giving { self.ours } else { 0 };
        theirs.max(ours)
    }
}

/// Operations the engine needs from the trading platform.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TradeService: Send + Sync {
    /// Accept an offer. `Pending` means a mobile confirmation is required.
    async fn accept(&self, offer_id: &str) -> Result<AcceptStatus, TradeError>;

    async fn decline(&self, offer_id: &str) -> Result<(), TradeError>;

    /// Escrow hold durations for the offer's parties.
    async fn escrow_days(&self, offer_id: &str) -> Result<EscrowDays, TradeError>;

    /// Drop any cached inventory so the next fetch sees fresh item data.
    async fn invalidate_cache(&self);

    /// Fetch the offer again from the platform.
    async fn refetch(&self, offer_id: &str) -> Result<Offer, TradeError>;
}

// ---------------------------------------------------------------------------
// Call helpers
// ---------------------------------------------------------------------------

/// Run `call` under a deadline; expiry becomes a transport error.
pub async fn with_timeout<T, Fut>(operation: &str, limit: Duration, call: Fut) -> Result<T, TradeError>
where
    Fut: Future<Output = Result<T, TradeError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(TradeError::transport(
            operation,
            format!("timed out after {}ms", limit.as_millis()),
        )),
    }
}

/// Run `op` with a timeout, retrying once after `backoff` on a transport
/// failure. Other errors are returned immediately.
pub async fn retry_once<T, F, Fut>(
    operation: &str,
    limit: Duration,
    backoff: Duration,
    mut op: F,
) -> Result<T, TradeError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, TradeError>>,
{
    match with_timeout(operation, limit, op()).await {
        Ok(value) => Ok(value),
        Err(e @ TradeError::Transport { .. }) => {
            warn!(
                operation,
                error = %e,
                backoff_ms = backoff.as_millis() as u64,
                "Trade service call failed, retrying once"
            );
            tokio::time::sleep(backoff).await;
            let result = with_timeout(operation, limit, op()).await;
            if result.is_ok() {
                debug!(operation, "Retry succeeded");
            }
            result
        }
        Err(e) => Err(e),
    }
}
