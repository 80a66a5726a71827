//! Shared stock ledger.
//!
//! One-unit stock cap across concurrently evaluated offers: a display name
//! reserved by one offer cannot be bought again by another until it is
//! released. Reservation is a single check-and-insert under one lock.
//!
//! Holds are stamped with the snapshot generation they were taken under.
//! A committed hold only blocks offers evaluated against the same
//! generation; once a newer snapshot is published, the marketplace's own
//! listings say whether the name is still wanted.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Hold {
    offer_id: String,
    generation: u64,
    committed: bool,
}

/// Another offer already holds this name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{name} is already held by offer {holder}")]
pub struct StockConflict {
    pub name: String,
    pub holder: String,
}

#[derive(Debug, Default)]
pub struct StockLedger {
    holds: Mutex<HashMap<String, Hold>>,
}

impl StockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve every name for `offer_id` under snapshot `generation`, or
    /// nothing at all.
    ///
    /// Names already held by the same offer are accepted again. Committed
    /// holds from older generations are dropped first.
    pub fn reserve(&self, offer_id: &str, names: &[String], generation: u64) -> Result<(), StockConflict> {
        let mut holds = self.holds.lock().unwrap_or_else(PoisonError::into_inner);
        holds.retain(|_, hold| !(hold.committed && hold.generation < generation));

        for name in names {
            if let Some(hold) = holds.get(name) {
                if hold.offer_id != offer_id {
                    return Err(StockConflict {
                        name: name.clone(),
                        holder: hold.offer_id.clone(),
                    });
                }
            }
        }

        for name in names {
            holds.entry(name.clone()).or_insert_with(|| Hold {
                offer_id: offer_id.to_string(),
                generation,
                committed: false,
            });
        }
        debug!(offer = offer_id, count = names.len(), generation, "Stock reserved");
        Ok(())
    }

    /// Turn an offer's reservations into committed stock.
    pub fn commit(&self, offer_id: &str) {
        let mut holds = self.holds.lock().unwrap_or_else(PoisonError::into_inner);
        for hold in holds.values_mut() {
            if hold.offer_id == offer_id {
                hold.committed = true;
            }
        }
    }

    /// Drop an offer's uncommitted reservations.
    pub fn release(&self, offer_id: &str) {
        let mut holds = self.holds.lock().unwrap_or_else(PoisonError::into_inner);
        holds.retain(|_, hold| hold.committed || hold.offer_id != offer_id);
    }

    /// Names currently held, committed or not.
    pub fn held_names(&self) -> Vec<String> {
        let holds = self.holds.lock().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = holds.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_reserve_conflict_between_offers() {
        let ledger = StockLedger::new();
        ledger.reserve("o1", &names(&["Team Captain"]), 0).unwrap();
        let err = ledger.reserve("o2", &names(&["Bill's Hat", "Team Captain"]), 0).unwrap_err();
        assert_eq!(err.holder, "o1");
        // All-or-nothing: Bill's Hat was not reserved.
        assert_eq!(ledger.held_names(), names(&["Team Captain"]));
    }

    #[test]
    fn test_release_and_commit() {
        let ledger = StockLedger::new();
        ledger.reserve("o1", &names(&["A"]), 0).unwrap();
        ledger.reserve("o2", &names(&["B"]), 0).unwrap();
        ledger.commit("o1");
        ledger.release("o1");
        ledger.release("o2");
        assert_eq!(ledger.held_names(), names(&["A"]));
        assert!(ledger.reserve("o3", &names(&["A"]), 0).is_err());
    }

    #[test]
    fn test_committed_hold_expires_with_newer_snapshot() {
        let ledger = StockLedger::new();
        ledger.reserve("o1", &names(&["A"]), 0).unwrap();
        ledger.commit("o1");

        assert!(ledger.reserve("o2", &names(&["A"]), 0).is_err());
        assert!(ledger.reserve("o2", &names(&["A"]), 1).is_ok());
        assert_eq!(ledger.held_names(), names(&["A"]));
        ledger.release("o2");
        assert!(ledger.held_names().is_empty());
    }

    #[test]
    fn test_reservation_survives_newer_snapshot() {
        let ledger = StockLedger::new();
        ledger.reserve("o1", &names(&["A"]), 0).unwrap();
        // Still in flight: only committed holds expire.
        let err = ledger.reserve("o2", &names(&["A"]), 1).unwrap_err();
        assert_eq!(err.holder, "o1");
    }

    #[test]
    fn test_concurrent_reservations_single_winner() {
        let ledger = Arc::new(StockLedger::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let ledger = Arc::clone(&ledger);
                std::thread::spawn(move || ledger.reserve(&format!("o{i}"), &names(&["Capped"]), 0).is_ok())
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }
}
