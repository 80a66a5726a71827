//! Steam Web API profile client.
//!
//! Endpoints:
//! - `IPlayerService/GetSteamLevel/v1`
//! - `ISteamUser/GetPlayerSummaries/v2`
//!
//! Auth: `key` query parameter (Steam Web API key).

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{ProfileLookup, ProfileSummary};
use crate::types::TradeError;

const BASE_URL: &str = "https://api.steampowered.com";

// ---------------------------------------------------------------------------
// API response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    response: T,
}

#[derive(Debug, Deserialize)]
struct LevelResponse {
    #[serde(default)]
    player_level: u32,
}

#[derive(Debug, Deserialize)]
struct SummariesResponse {
    #[serde(default)]
    players: Vec<PlayerSummary>,
}

#[derive(Debug, Deserialize)]
struct PlayerSummary {
    #[serde(default)]
    communityvisibilitystate: u32,
    #[serde(default)]
    timecreated: Option<i64>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct SteamProfileClient {
    http: Client,
    api_key: SecretString,
    base_url: String,
}

impl SteamProfileClient {
    pub fn new(api_key: SecretString, timeout: Duration) -> Result<Self, TradeError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent("offerdesk/0.1.0")
            .build()
            .map_err(|e| TradeError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_key,
            base_url: BASE_URL.to_string(),
        })
    }

    /// Point the client at another host, e.g. a local stub.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn get<T: for<'de> Deserialize<'de>>(
        &self,
        operation: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, TradeError> {
        let url = format!("{}/{path}", self.base_url);
        debug!(url = %url, "Querying Steam Web API");

        let resp = self
            .http
            .get(&url)
            .query(&[("key", self.api_key.expose_secret().as_str())])
            .query(query)
            .send()
            .await
            .map_err(|e| TradeError::transport(operation, e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            return Err(TradeError::transport(operation, format!("HTTP {status}")));
        }

        let envelope: Envelope<T> = resp
            .json()
            .await
            .map_err(|e| TradeError::transport(operation, format!("bad response body: {e}")))?;
        Ok(envelope.response)
    }

    fn to_summary(level: LevelResponse, summaries: SummariesResponse) -> Result<ProfileSummary, TradeError> {
        let player = summaries
            .players
            .into_iter()
            .next()
            .ok_or_else(|| TradeError::transport("profile", "no player summary returned"))?;

        Ok(ProfileSummary {
            level: level.player_level,
            created_at: player
                .timecreated
                .and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
            visibility: player.communityvisibilitystate,
        })
    }
}

#[async_trait]
impl ProfileLookup for SteamProfileClient {
    async fn summary(&self, steam_id: u64) -> Result<ProfileSummary, TradeError> {
        let id = steam_id.to_string();
        let level_query = [("steamid", id.clone())];
        let summaries_query = [("steamids", id)];
        let (level, summaries) = tokio::try_join!(
            self.get::<LevelResponse>("steam_level", "IPlayerService/GetSteamLevel/v1/", &level_query),
            self.get::<SummariesResponse>(
                "player_summaries",
                "ISteamUser/GetPlayerSummaries/v2/",
                &summaries_query,
            ),
        )?;
        Self::to_summary(level, summaries)
    }
}
