//! OFFERDESK: trade-offer evaluation engine
//!
//! Replay entry point. Loads configuration, initialises structured
//! logging, reads a marketplace snapshot and a batch of offers from disk,
//! and evaluates them concurrently against a dry-run trade service.

use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info, warn};

use offerdesk::config;
use offerdesk::engine::{OfferController, Policy};
use offerdesk::market::SnapshotStore;
use offerdesk::profile::SteamProfileClient;
use offerdesk::storage;
use offerdesk::trade::{DryRunTradeService, EscrowDays};
use offerdesk::types::{Decision, Verdict};

const BANNER: &str = r#"
  ___  _____ _____ _____ ____  ____  _____ ____  _  __
 / _ \|  ___|  ___| ____|  _ \|  _ \| ____/ ___|| |/ /
| | | | |_  | |_  |  _| | |_) | | | |  _| \___ \| ' /
| |_| |  _| |  _| | |___|  _ <| |_| | |___ ___) | . \
 \___/|_|   |_|   |_____|_| \_\____/|_____|____/|_|\_\

  Trade-offer evaluation engine
  v0.1.0 - Replay
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cfg = config::AppConfig::load("config.toml")?;

    init_logging();

    println!("{BANNER}");
    info!(
        agent_name = %cfg.agent.name,
        owners = cfg.agent.owners.len(),
        target_app_id = cfg.agent.target_app_id,
        escrow = ?cfg.policy.escrow,
        "OFFERDESK starting up"
    );

    // -- Inputs ----------------------------------------------------------

    let snapshot = storage::load_snapshot(&cfg.replay.snapshot_path)?;
    let offers = storage::load_offers(&cfg.replay.offers_path)?;
    if offers.is_empty() {
        warn!("No offers to evaluate");
        return Ok(());
    }

    // -- Components ------------------------------------------------------

    let snapshots = Arc::new(SnapshotStore::new(snapshot));
    let trade = Arc::new(DryRunTradeService::new(
        &offers,
        EscrowDays {
            ours: cfg.replay.escrow_days_ours,
            theirs: cfg.replay.escrow_days_theirs,
        },
    ));

    let policy = Policy::from_config(&cfg);
    let mut controller = OfferController::new(policy, Arc::clone(&snapshots), trade.clone());

    if let Some(key) = cfg.steam_api_key()? {
        let client = SteamProfileClient::new(key, cfg.timing.call_timeout())?;
        controller = controller.with_profiles(Arc::new(client));
        info!("Fraud screen enabled");
    }

    // -- Evaluate --------------------------------------------------------

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let results = tokio::select! {
        results = controller.evaluate_batch(offers) => results,
        _ = &mut shutdown => {
            info!("Shutdown signal received, abandoning replay");
            return Ok(());
        }
    };

    let results = match results {
        Ok(results) => results,
        Err(e) => {
            error!(error = %e, "Batch rejected");
            return Err(e.into());
        }
    };

    let mut verdicts: Vec<Verdict> = Vec::with_capacity(results.len());
    for result in results {
        match result {
            Ok(verdict) => verdicts.push(verdict),
            Err(e) => error!(error = %e, "Offer evaluation failed"),
        }
    }

    print_report(&verdicts);
    info!(
        dispatched = trade.dispatched().len(),
        held = controller.ledger().held_names().len(),
        "Replay complete"
    );

    storage::save_verdicts(&verdicts, &cfg.replay.verdicts_path)?;
    Ok(())
}

fn print_report(verdicts: &[Verdict]) {
    let count = |d: Decision| verdicts.iter().filter(|v| v.decision == d).count();

    println!();
    println!("  Accepted:       {}", count(Decision::Accept));
    println!("  Declined:       {}", count(Decision::Decline));
    println!("  Manual review:  {}", count(Decision::ManualReview));
    println!("  Recheck:        {}", count(Decision::AbandonForRecheck));
    println!();

    for verdict in verdicts {
        println!("[{}] {}: {}", verdict.offer_id, verdict.decision, verdict.reason);
        for line in verdict.summary.lines() {
            println!("    {line}");
        }
    }
}

/// Initialise the tracing subscriber.
///
/// Respects `RUST_LOG` for filtering; set `OFFERDESK_LOG_JSON=1` for JSON
/// output.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("offerdesk=info"));

    let json_logging = std::env::var("OFFERDESK_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
