//! In-memory trade service for integration testing.
//!
//! Records every dispatch, serves refetches from a queue and can be told
//! to fail accepts, so tests can drive the controller deterministically.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use offerdesk::trade::{EscrowDays, TradeService};
use offerdesk::types::{AcceptStatus, Offer, TradeError};

pub struct MockTrade {
    escrow: EscrowDays,
    accept_status: AcceptStatus,
    accepted: Arc<Mutex<Vec<String>>>,
    declined: Arc<Mutex<Vec<String>>>,
    refetch_queue: Arc<Mutex<VecDeque<Offer>>>,
    cache_invalidations: Arc<Mutex<u32>>,
    /// If set, accepts fail with this transport message.
    force_accept_error: Arc<Mutex<Option<String>>>,
}

impl MockTrade {
    pub fn new() -> Self {
        Self {
            escrow: EscrowDays::default(),
            accept_status: AcceptStatus::Accepted,
            accepted: Arc::new(Mutex::new(Vec::new())),
            declined: Arc::new(Mutex::new(Vec::new())),
            refetch_queue: Arc::new(Mutex::new(VecDeque::new())),
            cache_invalidations: Arc::new(Mutex::new(0)),
            force_accept_error: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_escrow(mut self, escrow: EscrowDays) -> Self {
        self.escrow = escrow;
        self
    }

    pub fn with_accept_status(mut self, status: AcceptStatus) -> Self {
        self.accept_status = status;
        self
    }

    /// Queue the offer the next refetch returns.
    pub fn queue_refetch(&self, offer: Offer) {
        self.refetch_queue.lock().unwrap().push_back(offer);
    }

    pub fn set_accept_error(&self, msg: &str) {
        *self.force_accept_error.lock().unwrap() = Some(msg.to_string());
    }

    pub fn accepted(&self) -> Vec<String> {
        self.accepted.lock().unwrap().clone()
    }

    pub fn declined(&self) -> Vec<String> {
        self.declined.lock().unwrap().clone()
    }

    pub fn cache_invalidations(&self) -> u32 {
        *self.cache_invalidations.lock().unwrap()
    }
}

#[async_trait]
impl TradeService for MockTrade {
    async fn accept(&self, offer_id: &str) -> Result<AcceptStatus, TradeError> {
        if let Some(msg) = self.force_accept_error.lock().unwrap().clone() {
            return Err(TradeError::transport("accept", msg));
        }
        self.accepted.lock().unwrap().push(offer_id.to_string());
        Ok(self.accept_status)
    }

    async fn decline(&self, offer_id: &str) -> Result<(), TradeError> {
        self.declined.lock().unwrap().push(offer_id.to_string());
        Ok(())
    }

    async fn escrow_days(&self, _offer_id: &str) -> Result<EscrowDays, TradeError> {
        Ok(self.escrow)
    }

    async fn invalidate_cache(&self) {
        *self.cache_invalidations.lock().unwrap() += 1;
    }

    async fn refetch(&self, offer_id: &str) -> Result<Offer, TradeError> {
        self.refetch_queue
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| TradeError::transport("refetch", format!("nothing queued for {offer_id}")))
    }
}
