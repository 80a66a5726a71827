//! Offer lifecycle controller.
//!
//! Drives one offer from receipt to a terminal decision:
//!
//! ```text
//! Received → Classified → {OwnerFastPath | GiftCheck | GameFilter}
//!          → BuyOrderPass → SellOrderPass → EscrowCheck
//!          → {Accept, Decline, ManualReview, AbandonForRecheck}
//! ```
//!
//! Only this module performs external I/O: escrow queries, accept/decline
//! dispatch and the profile lookup behind the fraud screen. Each
//! evaluation reads a single market snapshot taken when it starts.

use chrono::Utc;
use futures::future::join_all;
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::summary::offer_summary;
use crate::config::{AppConfig, EscrowPolicy};
use crate::currency::{value_items, ExchangePolicy};
use crate::market::{MarketSnapshot, SnapshotStore};
use crate::orders::{check_price, check_stock_limit, match_buy_orders, price_given_items, SellRejection, StockLedger};
use crate::profile::{FraudScreen, ProfileLookup};
use crate::trade::{retry_once, TradeService};
use crate::types::{Decision, Offer, OfferState, Reason, TradeError, Verdict};

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// Decision policy, resolved from configuration once at startup.
#[derive(Debug, Clone)]
pub struct Policy {
    pub owners: HashSet<u64>,
    pub target_app_id: u32,
    pub accept_gifts: bool,
    pub include_craft_weapons: bool,
    pub escrow: EscrowPolicy,
    pub exchange: ExchangePolicy,
    pub recheck_delay: Duration,
    /// Rechecks allowed after the first evaluation.
    pub recheck_attempts: u32,
    pub accept_backoff: Duration,
    pub call_timeout: Duration,
    /// `None` disables the fraud screen.
    pub fraud: Option<FraudScreen>,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            owners: HashSet::new(),
            target_app_id: crate::types::TF2_APP_ID,
            accept_gifts: false,
            include_craft_weapons: false,
            escrow: EscrowPolicy::Decline,
            exchange: ExchangePolicy::default(),
            recheck_delay: Duration::from_secs(15),
            recheck_attempts: 3,
            accept_backoff: Duration::from_secs(30),
            call_timeout: Duration::from_secs(30),
            fraud: None,
        }
    }
}

impl Policy {
    pub fn from_config(config: &AppConfig) -> Self {
        let fraud = config.fraud.enabled.then(|| FraudScreen {
            min_level: config.fraud.min_level,
            min_account_age: chrono::Duration::seconds(config.fraud.min_account_age_secs),
        });

        Self {
            owners: config.agent.owners.iter().copied().collect(),
            target_app_id: config.agent.target_app_id,
            accept_gifts: config.policy.accept_gifts,
            include_craft_weapons: config.policy.include_craft_weapons,
            escrow: config.policy.escrow,
            exchange: config.policy.currency_exchange,
            recheck_delay: config.timing.recheck_delay(),
            recheck_attempts: config.timing.recheck_attempts,
            accept_backoff: config.timing.accept_backoff(),
            call_timeout: config.timing.call_timeout(),
            fraud,
        }
    }
}

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Received,
    Classified,
    OwnerFastPath,
    GiftCheck,
    GameFilter,
    BuyOrderPass,
    SellOrderPass,
    EscrowCheck,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Received => "received",
            Stage::Classified => "classified",
            Stage::OwnerFastPath => "owner",
            Stage::GiftCheck => "gift_check",
            Stage::GameFilter => "game_filter",
            Stage::BuyOrderPass => "buy_orders",
            Stage::SellOrderPass => "sell_orders",
            Stage::EscrowCheck => "escrow",
        };
        f.write_str(name)
    }
}

fn enter(stage: Stage) {
    debug!(stage = %stage, "Offer stage");
}

/// Side effect owed to the trade service once a decision is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dispatch {
    Accept,
    Decline,
    /// Log only.
    Skip,
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

pub struct OfferController {
    policy: Policy,
    snapshots: Arc<SnapshotStore>,
    trade: Arc<dyn TradeService>,
    profiles: Option<Arc<dyn ProfileLookup>>,
    ledger: Arc<StockLedger>,
}

impl OfferController {
    pub fn new(policy: Policy, snapshots: Arc<SnapshotStore>, trade: Arc<dyn TradeService>) -> Self {
        Self {
            policy,
            snapshots,
            trade,
            profiles: None,
            ledger: Arc::new(StockLedger::new()),
        }
    }

    /// Enable profile lookups for the fraud screen.
    pub fn with_profiles(mut self, profiles: Arc<dyn ProfileLookup>) -> Self {
        self.profiles = Some(profiles);
        self
    }

    /// Share a stock ledger with other controllers.
    pub fn with_ledger(mut self, ledger: Arc<StockLedger>) -> Self {
        self.ledger = ledger;
        self
    }

    pub fn ledger(&self) -> &StockLedger {
        &self.ledger
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Evaluate one offer against the current snapshot and dispatch the
    /// result.
    pub async fn evaluate(&self, offer: &Offer) -> Result<Verdict, TradeError> {
        let span = info_span!(
            "offer",
            id = %offer.short_id(),
            partner = %offer.partner_steam3(),
            evaluation = %Uuid::new_v4(),
        );
        self.evaluate_in_span(offer).instrument(span).await
    }

    async fn evaluate_in_span(&self, offer: &Offer) -> Result<Verdict, TradeError> {
        let (snapshot, generation) = self.snapshots.current_with_generation();

        let (mut verdict, dispatch) = match self.decide(offer, &snapshot, generation).await {
            Ok(decided) => decided,
            Err(e) => {
                self.ledger.release(&offer.id);
                return Err(e);
            }
        };

        match dispatch {
            Dispatch::Accept => {
                let status = retry_once("accept", self.policy.call_timeout, self.policy.accept_backoff, || {
                    self.trade.accept(&offer.id)
                })
                .await;

                match status {
                    Ok(status) => {
                        self.ledger.commit(&offer.id);
                        verdict.accept_status = Some(status);
                        if verdict.confirmation_required() {
                            info!("Offer accepted, waiting on confirmation");
                        }
                    }
                    Err(e) => {
                        self.ledger.release(&offer.id);
                        warn!(error = %e, "Accept failed after retry");
                        return Err(e);
                    }
                }
            }
            Dispatch::Decline => {
                self.ledger.release(&offer.id);
                retry_once("decline", self.policy.call_timeout, self.policy.accept_backoff, || {
                    self.trade.decline(&offer.id)
                })
                .await?;
            }
            Dispatch::Skip => {
                self.ledger.release(&offer.id);
            }
        }

        info!(
            decision = %verdict.decision,
            reason = %verdict.reason,
            summary = %verdict.summary,
            "Offer evaluated"
        );
        Ok(verdict)
    }

    /// Run the decision pipeline. Stock is reserved for an accept; the
    /// caller commits or releases it.
    async fn decide(
        &self,
        offer: &Offer,
        snapshot: &MarketSnapshot,
        generation: u64,
    ) -> Result<(Verdict, Dispatch), TradeError> {
        enter(Stage::Received);
        let outcome = |decision, reason, summary: &str| {
            let mut verdict = Verdict::new(&offer.id, decision, reason);
            verdict.summary = summary.to_string();
            verdict
        };

        if offer.glitched {
            info!("Offer is glitched, skipping");
            return Ok((outcome(Decision::Decline, Reason::Glitched, ""), Dispatch::Skip));
        }

        let given = &offer.items_to_give;
        let received = &offer.items_to_receive;
        let weapons = self.policy.include_craft_weapons;

        // Craft weapons only count as currency when the counterparty adds them.
        let ours = value_items(given, false);
        let theirs = value_items(received, weapons);
        enter(Stage::Classified);
        debug!(ours = %ours.total, theirs = %theirs.total, "Valued both sides");

        let summary = offer_summary(&ours.total, given, &theirs.total, received, &[]);

        if self.policy.owners.contains(&offer.partner) {
            enter(Stage::OwnerFastPath);
            return Ok((outcome(Decision::Accept, Reason::Owner, &summary), Dispatch::Accept));
        }

        if offer.is_one_sided() {
            enter(Stage::GiftCheck);
            if offer.is_gift() && self.policy.accept_gifts {
                return Ok((outcome(Decision::Accept, Reason::Gift, &summary), Dispatch::Accept));
            }
            return Ok((outcome(Decision::Decline, Reason::OneSided, &summary), Dispatch::Skip));
        }

        enter(Stage::GameFilter);
        let app_ids: BTreeSet<u32> = ours.app_ids.union(&theirs.app_ids).copied().collect();
        if app_ids.len() != 1 || !app_ids.contains(&self.policy.target_app_id) {
            let reason = Reason::ForeignGame {
                app_ids: app_ids.into_iter().collect(),
            };
            return Ok((outcome(Decision::Decline, reason, &summary), Dispatch::Skip));
        }

        let key_price = snapshot.average_key_price()?;

        enter(Stage::BuyOrderPass);
        let pass = match match_buy_orders(given, received, &snapshot.buy_listings, theirs.total, weapons) {
            Ok(pass) => pass,
            Err(missing) => {
                info!(asset_id = %missing.asset_id, "Item is missing app data, will recheck");
                let reason = Reason::MissingClassification {
                    asset_id: missing.asset_id,
                };
                return Ok((outcome(Decision::AbandonForRecheck, reason, &summary), Dispatch::Skip));
            }
        };

        let summary = offer_summary(&ours.total, given, &theirs.total, received, &pass.bought);
        let finish = |decision, reason| {
            let mut verdict = outcome(decision, reason, &summary);
            verdict.bought = pass.bought.clone();
            verdict.stock_limit = pass.purchased_names.clone();
            verdict
        };

        enter(Stage::SellOrderPass);
        let sold = check_stock_limit(&pass.purchased_names)
            .and_then(|()| price_given_items(given, &pass.residual_given, &snapshot.sell_listings, ours.total));
        let required = match sold {
            Ok(required) => required,
            Err(SellRejection::StockLimit { name }) => {
                info!(item = %name, "Stock limit reached");
                return Ok((finish(Decision::Decline, Reason::StockLimit { name }), Dispatch::Skip));
            }
            Err(SellRejection::Unlisted { asset_id, name }) => {
                info!(asset_id = %asset_id, item = %name, "Offer asks for an item we do not sell");
                return Ok((finish(Decision::Decline, Reason::Unlisted { asset_id, name }), Dispatch::Skip));
            }
        };

        let check = check_price(required, pass.offered, key_price, self.policy.exchange);
        debug!(ask = %check.ask, bid = %check.bid, "Price check");

        if !check.price_ok {
            let reason = if !check.exchange.metal_ok {
                Reason::MetalShortfall {
                    required: check.required.metal.normalize(),
                    offered: check.offered.metal.normalize(),
                }
            } else if !check.exchange.keys_ok {
                Reason::KeyShortfall {
                    required: check.required.keys.normalize(),
                    offered: check.offered.keys.normalize(),
                }
            } else {
                Reason::InsufficientValue {
                    required: check.ask.normalize(),
                    offered: check.bid.normalize(),
                }
            };
            info!(reason = %reason, "Declining offer on price");
            return Ok((finish(Decision::Decline, reason), Dispatch::Skip));
        }

        if let Err(conflict) = self.ledger.reserve(&offer.id, &pass.purchased_names, generation) {
            info!(item = %conflict.name, holder = %conflict.holder, "Stock held by another offer");
            let reason = Reason::StockLimit { name: conflict.name };
            return Ok((finish(Decision::Decline, reason), Dispatch::Skip));
        }

        enter(Stage::EscrowCheck);
        if self.policy.escrow != EscrowPolicy::Accept {
            let days = retry_once("escrow", self.policy.call_timeout, self.policy.accept_backoff, || {
                self.trade.escrow_days(&offer.id)
            })
            .await?
            .effective(!received.is_empty(), !given.is_empty());

            if days > 0 {
                let reason = Reason::Escrow { days };
                return Ok(match self.policy.escrow {
                    EscrowPolicy::Hold => {
                        warn!(days, "Offer would be held in escrow, leaving for manual review");
                        (finish(Decision::ManualReview, reason), Dispatch::Skip)
                    }
                    _ => {
                        info!(days, "Declining escrowed offer");
                        (finish(Decision::Decline, reason), Dispatch::Decline)
                    }
                });
            }
        }

        if let Some(signals) = self.fraud_signals(offer.partner).await {
            warn!(signals = ?signals, "Counterparty flagged, leaving for manual review");
            return Ok((finish(Decision::ManualReview, Reason::Suspicious { signals }), Dispatch::Skip));
        }

        Ok((finish(Decision::Accept, Reason::Matched), Dispatch::Accept))
    }

    /// `Some` when the partner should be reviewed by a human.
    async fn fraud_signals(&self, partner: u64) -> Option<Vec<String>> {
        let (screen, profiles) = match (&self.policy.fraud, &self.profiles) {
            (Some(screen), Some(profiles)) => (screen, profiles),
            _ => return None,
        };

        let lookup = retry_once("profile", self.policy.call_timeout, self.policy.accept_backoff, || {
            profiles.summary(partner)
        })
        .await;

        match lookup {
            Ok(profile) => {
                let signals = screen.signals(&profile, Utc::now());
                (!signals.is_empty()).then_some(signals)
            }
            Err(e) => Some(vec![format!("profile lookup failed: {e}")]),
        }
    }

    /// Evaluate an offer, rechecking with fresh item data while it is
    /// missing classification. Bounded by `recheck_attempts`.
    pub async fn handle_offer(&self, offer: Offer) -> Result<Verdict, TradeError> {
        let mut offer = offer;
        let mut rechecks = 0;

        loop {
            let verdict = self.evaluate(&offer).await?;
            if verdict.decision != Decision::AbandonForRecheck {
                return Ok(verdict);
            }
            if rechecks >= self.policy.recheck_attempts {
                warn!(offer = %offer.short_id(), rechecks, "Giving up on offer still missing item data");
                return Ok(verdict);
            }
            rechecks += 1;

            info!(
                offer = %offer.short_id(),
                attempt = rechecks,
                delay_secs = self.policy.recheck_delay.as_secs(),
                "Rechecking offer"
            );
            tokio::time::sleep(self.policy.recheck_delay).await;
            self.trade.invalidate_cache().await;

            let id = offer.id.clone();
            offer = retry_once("refetch", self.policy.call_timeout, self.policy.accept_backoff, || {
                self.trade.refetch(&id)
            })
            .await?;
        }
    }

    /// Evaluate a batch of offers concurrently against one snapshot.
    ///
    /// An unusable snapshot fails the whole batch and asks the marketplace
    /// sync for a credential refresh.
    pub async fn evaluate_batch(&self, offers: Vec<Offer>) -> Result<Vec<Result<Verdict, TradeError>>, TradeError> {
        let snapshot = self.snapshots.current();
        if let Err(e) = snapshot.average_key_price() {
            self.snapshots.request_credential_refresh(&e.to_string());
            return Err(e);
        }

        info!(count = offers.len(), etag = ?snapshot.etag, "Evaluating offer batch");
        let results = join_all(offers.into_iter().map(|offer| self.handle_offer(offer))).await;

        let invalid = results
            .iter()
            .find_map(|r| match r {
                Err(e @ TradeError::ConfigurationInvalid(_)) => Some(e.clone()),
                _ => None,
            });
        if let Some(e) = invalid {
            self.snapshots.request_credential_refresh(&e.to_string());
            return Err(e);
        }

        Ok(results)
    }

    /// React to an offer state reported by the trade service.
    ///
    /// An offer whose items became invalid is declined; a declined or
    /// canceled offer gives back any stock it was holding.
    pub async fn handle_state_change(&self, offer: &Offer, previous: OfferState) -> Result<Option<Verdict>, TradeError> {
        debug!(offer = %offer.short_id(), from = ?previous, to = ?offer.state, "Offer state changed");

        match offer.state {
            OfferState::InvalidItems => {
                info!(offer = %offer.short_id(), "Offer items became invalid, declining");
                self.ledger.release(&offer.id);
                retry_once("decline", self.policy.call_timeout, self.policy.accept_backoff, || {
                    self.trade.decline(&offer.id)
                })
                .await?;
                Ok(Some(Verdict::new(&offer.id, Decision::Decline, Reason::InvalidItems)))
            }
            OfferState::Declined | OfferState::Canceled => {
                self.ledger.release(&offer.id);
                Ok(None)
            }
            _ => Ok(None),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
