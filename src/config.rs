//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (the Steam Web API key) are referenced by env-var name in the
//! config and resolved at runtime.

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::fs;
use std::time::Duration;

use crate::currency::ExchangePolicy;
use crate::types::{TradeError, TF2_APP_ID};

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub agent: AgentConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub fraud: FraudConfig,
    #[serde(default)]
    pub replay: ReplayConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AgentConfig {
    pub name: String,
    /// 64-bit steam ids whose offers are accepted without matching.
    #[serde(default)]
    pub owners: Vec<u64>,
    #[serde(default = "default_app_id")]
    pub target_app_id: u32,
}

/// What to do when an offer would be held in escrow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EscrowPolicy {
    /// Decline any offer with escrow.
    #[default]
    Decline,
    /// Ignore escrow entirely.
    Accept,
    /// Leave escrowed offers for a human.
    Hold,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct PolicyConfig {
    #[serde(default)]
    pub accept_gifts: bool,
    /// Count craft weapons as 1/18 ref each.
    #[serde(default)]
    pub include_craft_weapons: bool,
    #[serde(default)]
    pub escrow: EscrowPolicy,
    #[serde(default)]
    pub currency_exchange: ExchangePolicy,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TimingConfig {
    #[serde(default = "default_recheck_delay")]
    pub recheck_delay_secs: u64,
    #[serde(default = "default_recheck_attempts")]
    pub recheck_attempts: u32,
    #[serde(default = "default_accept_backoff")]
    pub accept_backoff_secs: u64,
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            recheck_delay_secs: default_recheck_delay(),
            recheck_attempts: default_recheck_attempts(),
            accept_backoff_secs: default_accept_backoff(),
            call_timeout_secs: default_call_timeout(),
        }
    }
}

impl TimingConfig {
    pub fn recheck_delay(&self) -> Duration {
        Duration::from_secs(self.recheck_delay_secs)
    }

    pub fn accept_backoff(&self) -> Duration {
        Duration::from_secs(self.accept_backoff_secs)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct FraudConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_min_level")]
    pub min_level: u32,
    #[serde(default = "default_min_account_age")]
    pub min_account_age_secs: i64,
    #[serde(default = "default_steam_key_env")]
    pub steam_api_key_env: String,
}

impl Default for FraudConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_level: default_min_level(),
            min_account_age_secs: default_min_account_age(),
            steam_api_key_env: default_steam_key_env(),
        }
    }
}

/// Inputs for the offline replay runner.
#[derive(Debug, Deserialize, Clone)]
pub struct ReplayConfig {
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: String,
    #[serde(default = "default_offers_path")]
    pub offers_path: String,
    #[serde(default = "default_verdicts_path")]
    pub verdicts_path: String,
    #[serde(default)]
    pub escrow_days_ours: u32,
    #[serde(default)]
    pub escrow_days_theirs: u32,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            snapshot_path: default_snapshot_path(),
            offers_path: default_offers_path(),
            verdicts_path: default_verdicts_path(),
            escrow_days_ours: 0,
            escrow_days_theirs: 0,
        }
    }
}

fn default_app_id() -> u32 {
    TF2_APP_ID
}
fn default_recheck_delay() -> u64 {
    15
}
fn default_recheck_attempts() -> u32 {
    3
}
fn default_accept_backoff() -> u64 {
    30
}
fn default_call_timeout() -> u64 {
    30
}
fn default_min_level() -> u32 {
    4
}
fn default_min_account_age() -> i64 {
    // Half a year.
    15_768_000
}
fn default_steam_key_env() -> String {
    "STEAM_API_KEY".to_string()
}
fn default_snapshot_path() -> String {
    "data/snapshot.json".to_string()
}
fn default_offers_path() -> String {
    "data/offers.json".to_string()
}
fn default_verdicts_path() -> String {
    "data/verdicts.json".to_string()
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config = Self::parse(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        config.validate()?;
        Ok(config)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), TradeError> {
        if self.timing.recheck_attempts == 0 {
            return Err(TradeError::Config(
                "timing.recheck_attempts must be at least 1".into(),
            ));
        }
        if self.timing.call_timeout_secs == 0 {
            return Err(TradeError::Config(
                "timing.call_timeout_secs must be positive".into(),
            ));
        }
        if self.fraud.min_account_age_secs < 0 {
            return Err(TradeError::Config(
                "fraud.min_account_age_secs cannot be negative".into(),
            ));
        }
        Ok(())
    }

    /// Resolve an environment variable name to its value.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }

    /// Steam Web API key, required only when the fraud screen is enabled.
    pub fn steam_api_key(&self) -> Result<Option<SecretString>> {
        if !self.fraud.enabled {
            return Ok(None);
        }
        let key = Self::resolve_env(&self.fraud.steam_api_key_env)?;
        Ok(Some(SecretString::new(key)))
    }
}
