//! Dry-run trade service.
//!
//! Logs and records every dispatch instead of talking to the platform.
//! Used by the replay runner and the integration tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tracing::info;

use super::{EscrowDays, TradeService};
use crate::types::{AcceptStatus, Offer, TradeError};

/// A call the engine made against the trade service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Accept(String),
    Decline(String),
    EscrowQuery(String),
    InvalidateCache,
    Refetch(String),
}

pub struct DryRunTradeService {
    offers: HashMap<String, Offer>,
    escrow: EscrowDays,
    dispatched: Mutex<Vec<Dispatch>>,
}

impl DryRunTradeService {
    /// `offers` back `refetch`; an unknown id is a transport error.
    pub fn new(offers: &[Offer], escrow: EscrowDays) -> Self {
        Self {
            offers: offers.iter().map(|o| (o.id.clone(), o.clone())).collect(),
            escrow,
            dispatched: Mutex::new(Vec::new()),
        }
    }

    pub fn dispatched(&self) -> Vec<Dispatch> {
        self.dispatched
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, dispatch: Dispatch) {
        self.dispatched
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(dispatch);
    }
}

#[async_trait]
impl TradeService for DryRunTradeService {
    async fn accept(&self, offer_id: &str) -> Result<AcceptStatus, TradeError> {
        info!(offer = offer_id, "[dry-run] accept");
        self.record(Dispatch::Accept(offer_id.to_string()));
        Ok(AcceptStatus::Accepted)
    }

    async fn decline(&self, offer_id: &str) -> Result<(), TradeError> {
        info!(offer = offer_id, "[dry-run] decline");
        self.record(Dispatch::Decline(offer_id.to_string()));
        Ok(())
    }

    async fn escrow_days(&self, offer_id: &str) -> Result<EscrowDays, TradeError> {
        self.record(Dispatch::EscrowQuery(offer_id.to_string()));
        Ok(self.escrow)
    }

    async fn invalidate_cache(&self) {
        self.record(Dispatch::InvalidateCache);
    }

    async fn refetch(&self, offer_id: &str) -> Result<Offer, TradeError> {
        self.record(Dispatch::Refetch(offer_id.to_string()));
        self.offers
            .get(offer_id)
            .cloned()
            .ok_or_else(|| TradeError::transport("refetch", format!("unknown offer {offer_id}")))
    }
}
