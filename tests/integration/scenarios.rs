//! End-to-end offer scenarios through the public API.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

use offerdesk::currency::{value_items, ExchangePolicy};
use offerdesk::engine::{OfferController, Policy};
use offerdesk::market::{MarketSnapshot, SnapshotStore};
use offerdesk::orders::{check_price, match_buy_orders};
use offerdesk::trade::EscrowDays;
use offerdesk::types::*;

use crate::mock_trade::MockTrade;

const PARTNER: u64 = 76561198000000002;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn policy() -> Policy {
    Policy {
        recheck_delay: Duration::ZERO,
        accept_backoff: Duration::ZERO,
        call_timeout: Duration::from_secs(1),
        ..Policy::default()
    }
}

fn key(asset: &str) -> Item {
    Item::new(TF2_APP_ID, asset, KEY_NAME).unique().with_app_data(5021, 6)
}

fn refined(asset: &str) -> Item {
    Item::new(TF2_APP_ID, asset, "Refined Metal").unique().with_app_data(5002, 6)
}

fn unique(asset: &str, name: &str, def_index: u32) -> Item {
    Item::new(TF2_APP_ID, asset, name).unique().with_app_data(def_index, 6)
}

fn craft_weapon(asset: &str) -> Item {
    Item::new(TF2_APP_ID, asset, "Shotgun")
        .unique()
        .with_app_data(9, 6)
        .with_tag("Type", "Secondary weapon")
        .with_description("( Not Usable in Crafting )")
}

fn listing_item(def_index: u32, name: &str) -> ListingItem {
    ListingItem {
        defindex: def_index,
        quality: 6,
        name: name.to_string(),
        attributes: vec![],
        flag_cannot_craft: false,
        asset_id: None,
    }
}

fn store(listings: Vec<Listing>) -> Arc<SnapshotStore> {
    Arc::new(SnapshotStore::new(MarketSnapshot::from_listings(
        listings,
        KeyPrice {
            low: dec!(50),
            high: dec!(50),
        },
        Some("etag-1".into()),
    )))
}

fn offer(id: &str, give: Vec<Item>, receive: Vec<Item>) -> Offer {
    Offer {
        id: id.to_string(),
        partner: PARTNER,
        items_to_give: give,
        items_to_receive: receive,
        glitched: false,
        state: OfferState::Active,
    }
}

fn controller(policy: Policy, listings: Vec<Listing>, trade: &Arc<MockTrade>) -> OfferController {
    OfferController::new(policy, store(listings), trade.clone())
}

// ---------------------------------------------------------------------------
// Scenario A: gifts
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_gift_of_one_key() {
    let gift = offer("100", vec![], vec![key("k1")]);
    assert_eq!(
        value_items(&gift.items_to_receive, false).total,
        CurrencyTotal::new(dec!(1), dec!(0))
    );

    let trade = Arc::new(MockTrade::new());
    let ctrl = controller(Policy { accept_gifts: true, ..policy() }, vec![], &trade);
    let verdict = assert_ok!(ctrl.evaluate(&gift).await);
    assert_eq!(verdict.decision, Decision::Accept);
    assert_eq!(trade.accepted(), vec!["100".to_string()]);

    let trade = Arc::new(MockTrade::new());
    let ctrl = controller(policy(), vec![], &trade);
    let verdict = assert_ok!(ctrl.evaluate(&gift).await);
    assert_eq!(verdict.decision, Decision::Decline);
    assert!(trade.accepted().is_empty());
    assert!(trade.declined().is_empty());
}

// ---------------------------------------------------------------------------
// Scenario B: metal shortfall
// ---------------------------------------------------------------------------

#[test]
fn test_metal_shortfall_price_check() {
    let check = check_price(
        CurrencyTotal::new(dec!(0), dec!(5)),
        CurrencyTotal::new(dec!(0), dec!(4.5)),
        dec!(50),
        ExchangePolicy::default(),
    );
    assert!(!check.price_ok);
    assert!(!check.exchange.metal_ok);
}

#[tokio::test]
async fn test_metal_shortfall_declines_with_amounts() {
    let sell = Listing::sell(
        "s1",
        ListingItem {
            asset_id: Some("mine".into()),
            ..listing_item(378, "Team Captain")
        },
        CurrencyTotal::new(dec!(0), dec!(5)),
    );
    let trade = Arc::new(MockTrade::new());
    let weapons = Policy {
        include_craft_weapons: true,
        ..policy()
    };
    let ctrl = controller(weapons, vec![sell], &trade);

    // 4 refined + 1 reclaimed + 1 scrap + 1 craft weapon = 81/18 = 4.5 ref
    let mut receive: Vec<Item> = (0..4).map(|i| refined(&format!("r{i}"))).collect();
    receive.push(Item::new(TF2_APP_ID, "rec", "Reclaimed Metal").unique().with_app_data(5001, 6));
    receive.push(Item::new(TF2_APP_ID, "scr", "Scrap Metal").unique().with_app_data(5000, 6));
    receive.push(craft_weapon("w1"));

    let o = offer("200", vec![unique("mine", "Team Captain", 378)], receive);
    let verdict = assert_ok!(ctrl.evaluate(&o).await);
    assert_eq!(verdict.decision, Decision::Decline);
    assert_eq!(
        verdict.reason,
        Reason::MetalShortfall {
            required: dec!(5),
            offered: dec!(4.5)
        }
    );
    assert_eq!(
        verdict.reason.to_string(),
        "not enough metal (required = 5, given = 4.5)"
    );
    assert!(trade.declined().is_empty());
}

// ---------------------------------------------------------------------------
// Scenario C: remapped item id
// ---------------------------------------------------------------------------

#[test]
fn test_remapped_item_matches_listing() {
    let received = vec![refined("r1"), unique("rl", "Rocket Launcher", 205)];
    let listings = vec![Listing::buy(
        "b1",
        listing_item(18, "Rocket Launcher"),
        CurrencyTotal::new(dec!(0), dec!(2)),
    )];

    let offered = value_items(&received, false).total;
    let pass = assert_ok!(match_buy_orders(&[], &received, &listings, offered, false));
    assert_eq!(pass.bought, vec![1]);
    assert_eq!(pass.residual_received, vec![0]);
    assert_eq!(pass.offered.metal, dec!(3));
    assert_eq!(pass.purchased_names, vec!["Rocket Launcher".to_string()]);
}

#[tokio::test]
async fn test_remapped_item_bought_end_to_end() {
    let buy = Listing::buy(
        "b1",
        listing_item(18, "Rocket Launcher"),
        CurrencyTotal::new(dec!(0), dec!(2)),
    );
    let trade = Arc::new(MockTrade::new());
    let ctrl = controller(policy(), vec![buy], &trade);

    let o = offer(
        "300",
        vec![refined("g1"), refined("g2")],
        vec![unique("rl", "Rocket Launcher", 205)],
    );
    let verdict = assert_ok!(ctrl.evaluate(&o).await);
    assert_eq!(verdict.decision, Decision::Accept);
    assert_eq!(verdict.bought, vec![0]);
    assert_eq!(verdict.stock_limit, vec!["Rocket Launcher".to_string()]);
    assert!(verdict.summary.contains("Bought items (1): Rocket Launcher"));
}

// ---------------------------------------------------------------------------
// Scenario D: stock limit
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_duplicate_names_hit_stock_limit() {
    let buy = Listing::buy(
        "b1",
        listing_item(378, "Team Captain"),
        CurrencyTotal::new(dec!(0), dec!(1)),
    );
    let trade = Arc::new(MockTrade::new());
    let ctrl = controller(policy(), vec![buy], &trade);

    let o = offer(
        "400",
        vec![refined("g1"), refined("g2")],
        vec![unique("h1", "Team Captain", 378), unique("h2", "Team Captain", 378)],
    );
    let verdict = assert_ok!(ctrl.evaluate(&o).await);
    assert_eq!(verdict.decision, Decision::Decline);
    assert_eq!(
        verdict.reason,
        Reason::StockLimit {
            name: "Team Captain".into()
        }
    );
    assert!(trade.accepted().is_empty());
}

#[tokio::test]
async fn test_concurrent_offers_cannot_both_buy_capped_item() {
    let buy = Listing::buy(
        "b1",
        listing_item(378, "Team Captain"),
        CurrencyTotal::new(dec!(0), dec!(1)),
    );
    let trade = Arc::new(MockTrade::new());
    let ctrl = controller(policy(), vec![buy], &trade);

    let offers = vec![
        offer("501", vec![refined("a")], vec![unique("h1", "Team Captain", 378)]),
        offer("502", vec![refined("b")], vec![unique("h2", "Team Captain", 378)]),
    ];
    let results = assert_ok!(ctrl.evaluate_batch(offers).await);

    let decisions: Vec<Decision> = results
        .into_iter()
        .map(|r| assert_ok!(r).decision)
        .collect();
    assert_eq!(decisions.iter().filter(|d| **d == Decision::Accept).count(), 1);
    assert_eq!(decisions.iter().filter(|d| **d == Decision::Decline).count(), 1);
    assert_eq!(trade.accepted().len(), 1);
}

// ---------------------------------------------------------------------------
// Scenario E: craft weapons
// ---------------------------------------------------------------------------

#[test]
fn test_nine_craft_weapons_are_half_a_refined() {
    let weapons: Vec<Item> = (0..9).map(|i| craft_weapon(&format!("w{i}"))).collect();
    let total = value_items(&weapons, true).total;
    assert_eq!(total.metal, dec!(0.5));
    assert_eq!(total.keys, Decimal::ZERO);
}

// ---------------------------------------------------------------------------
// Lifecycle edges
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_recheck_picks_up_fresh_item_data() {
    let buy = Listing::buy(
        "b1",
        listing_item(378, "Team Captain"),
        CurrencyTotal::new(dec!(0), dec!(1)),
    );
    let trade = Arc::new(MockTrade::new());
    let ctrl = controller(policy(), vec![buy], &trade);

    let mut bare = unique("h1", "Team Captain", 378);
    bare.app_data = None;
    trade.queue_refetch(offer("600", vec![refined("g1")], vec![unique("h1", "Team Captain", 378)]));

    let verdict = assert_ok!(ctrl.handle_offer(offer("600", vec![refined("g1")], vec![bare])).await);
    assert_eq!(verdict.decision, Decision::Accept);
    assert_eq!(trade.cache_invalidations(), 1);
}

#[tokio::test]
async fn test_pending_confirmation_reported() {
    let buy = Listing::buy(
        "b1",
        listing_item(378, "Team Captain"),
        CurrencyTotal::new(dec!(0), dec!(1)),
    );
    let trade = Arc::new(MockTrade::new().with_accept_status(AcceptStatus::Pending));
    let ctrl = controller(policy(), vec![buy], &trade);

    let o = offer("700", vec![refined("g1")], vec![unique("h1", "Team Captain", 378)]);
    let verdict = assert_ok!(ctrl.evaluate(&o).await);
    assert!(verdict.confirmation_required());
}

#[tokio::test]
async fn test_accept_transport_failure_surfaces() {
    let buy = Listing::buy(
        "b1",
        listing_item(378, "Team Captain"),
        CurrencyTotal::new(dec!(0), dec!(1)),
    );
    let trade = Arc::new(MockTrade::new());
    trade.set_accept_error("connection reset");
    let ctrl = controller(policy(), vec![buy], &trade);

    let o = offer("800", vec![refined("g1")], vec![unique("h1", "Team Captain", 378)]);
    let err = assert_err!(ctrl.evaluate(&o).await);
    assert!(matches!(err, TradeError::Transport { .. }));
    assert!(ctrl.ledger().held_names().is_empty());
}

#[tokio::test]
async fn test_escrow_decline_dispatches() {
    let buy = Listing::buy(
        "b1",
        listing_item(378, "Team Captain"),
        CurrencyTotal::new(dec!(0), dec!(1)),
    );
    let trade = Arc::new(MockTrade::new().with_escrow(EscrowDays { ours: 0, theirs: 15 }));
    let ctrl = controller(policy(), vec![buy], &trade);

    let o = offer("900", vec![refined("g1")], vec![unique("h1", "Team Captain", 378)]);
    let verdict = assert_ok!(ctrl.evaluate(&o).await);
    assert_eq!(verdict.reason, Reason::Escrow { days: 15 });
    assert_eq!(trade.declined(), vec!["900".to_string()]);
}

#[tokio::test]
async fn test_snapshot_swap_does_not_affect_held_reference() {
    let snapshots = store(vec![]);
    let held = snapshots.current();
    let diff = snapshots.replace(MarketSnapshot::from_listings(
        vec![Listing::buy(
            "b9",
            listing_item(378, "Team Captain"),
            CurrencyTotal::new(dec!(0), dec!(1)),
        )],
        KeyPrice {
            low: dec!(51),
            high: dec!(51),
        },
        Some("etag-2".into()),
    ));
    assert_eq!(diff.added, 1);
    assert!(held.buy_listings.is_empty());
    assert_eq!(snapshots.current().etag.as_deref(), Some("etag-2"));
}

#[tokio::test]
async fn test_republished_buy_order_can_be_filled_again() {
    let buy = Listing::buy(
        "b1",
        listing_item(378, "Team Captain"),
        CurrencyTotal::new(dec!(0), dec!(1)),
    );
    let snapshots = store(vec![buy.clone()]);
    let trade = Arc::new(MockTrade::new());
    let ctrl = OfferController::new(policy(), Arc::clone(&snapshots), trade.clone());

    let first = offer("601", vec![refined("g1")], vec![unique("h1", "Team Captain", 378)]);
    let verdict = assert_ok!(ctrl.evaluate(&first).await);
    assert_eq!(verdict.decision, Decision::Accept);

    snapshots.replace(MarketSnapshot::from_listings(
        vec![buy],
        KeyPrice {
            low: dec!(50),
            high: dec!(50),
        },
        Some("etag-2".into()),
    ));

    let second = offer("602", vec![refined("g2")], vec![unique("h2", "Team Captain", 378)]);
    let verdict = assert_ok!(ctrl.evaluate(&second).await);
    assert_eq!(verdict.decision, Decision::Accept);
    assert_eq!(trade.accepted(), vec!["601".to_string(), "602".to_string()]);
}
