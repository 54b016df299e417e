//! HTTP+JSON client for the crash game server.
//!
//! Base URL: configurable, `http://localhost:5050` by default.
//! All routes live under `/api/game/`. Commands answer with a
//! `{success, message?, error?, data?}` envelope; the server sometimes
//! pairs a rejection with HTTP 400, so envelopes are decoded regardless of
//! status and classified by `success`.

use async_trait::async_trait;
use reqwest::{Client, Response};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::RemoteStateClient;
use crate::types::{BetRecord, GameError, Phase, PlayerId, Result, RoundSnapshot};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const SERVER_NAME: &str = "crash-game";

const USER_AGENT: &str = "AVIATOR/0.1.0 (crash-game-client)";

// ---------------------------------------------------------------------------
// API types (server JSON -> Rust)
// ---------------------------------------------------------------------------

/// `GET /api/game/status`
#[derive(Debug, Deserialize)]
struct StatusResponse {
    phase: Phase,
    multiplier: f64,
    round: u64,
    #[serde(default)]
    remaining_time_ms: u64,
    #[serde(default)]
    active_bets: u32,
    #[serde(default)]
    crash_point: Option<f64>,
}

impl StatusResponse {
    fn into_snapshot(self) -> Result<RoundSnapshot> {
        if !self.multiplier.is_finite() || self.multiplier <= 0.0 {
            return Err(GameError::Protocol(format!(
                "invalid multiplier {}",
                self.multiplier
            )));
        }
        // A crash point only means something once the round has crashed.
        let crash_point = match self.phase {
            Phase::Crashed => self.crash_point.filter(|cp| cp.is_finite() && *cp > 0.0),
            _ => None,
        };
        Ok(RoundSnapshot {
            round_id: self.round,
            phase: self.phase,
            multiplier: self.multiplier,
            remaining_ms: self.remaining_time_ms,
            active_bet_count: self.active_bets,
            crash_point,
        })
    }
}

/// Common command envelope.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
    data: Option<T>,
}

impl<T> Envelope<T> {
    /// Turn `success: false` into a rejection carrying the server's reason.
    fn into_result(self, default_reason: &str) -> Result<Option<T>> {
        if self.success {
            Ok(self.data)
        } else {
            let reason = self
                .error
                .or(self.message)
                .unwrap_or_else(|| default_reason.to_string());
            Err(GameError::Rejected(reason))
        }
    }
}

#[derive(Debug, Deserialize)]
struct BalanceData {
    balance: Decimal,
}

#[derive(Debug, Deserialize)]
struct BekoData {
    ulke: String,
}

#[derive(Debug, Deserialize)]
struct ActiveBetEntry {
    player_name: String,
    amount: Decimal,
}

#[derive(Debug, Serialize)]
struct PlayerRequest<'a> {
    player_id: &'a str,
}

#[derive(Debug, Serialize)]
struct JoinRequest<'a> {
    player_id: &'a str,
    name: &'a str,
}

#[derive(Debug, Serialize)]
struct BetRequest<'a> {
    player_id: &'a str,
    amount: Decimal,
}

#[derive(Debug, Serialize)]
struct LoadBalanceRequest<'a> {
    player_name: &'a str,
    amount: Decimal,
}

/// Placeholder payload for commands whose `data` we ignore.
#[derive(Debug, Deserialize)]
struct Ignored {}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Crash game server client.
pub struct HttpGameClient {
    http: Client,
    base_url: String,
    crash_history_len: usize,
}

impl HttpGameClient {
    /// Create a client. `timeout` bounds every request and should be
    /// shorter than the poll period.
    pub fn new(base_url: &str, timeout: Duration, crash_history_len: usize) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| GameError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            crash_history_len,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/game/{path}", self.base_url)
    }

    // -- Internal helpers ------------------------------------------------

    /// GET a plain JSON document; non-2xx is a protocol failure.
    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        let resp = self.http.get(&url).send().await.map_err(network)?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(GameError::Protocol(format!("{path}: HTTP {status}: {body}")));
        }

        decode(path, resp).await
    }

    /// Send a command and decode its envelope whatever the status code.
    async fn command<B, T>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: &B,
    ) -> Result<Envelope<T>>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        debug!(url = %url, "Sending game command");

        let resp = self
            .http
            .request(method, &url)
            .json(body)
            .send()
            .await
            .map_err(network)?;

        decode(path, resp).await
    }
}

fn network(e: reqwest::Error) -> GameError {
    GameError::Network(e.to_string())
}

async fn decode<T: DeserializeOwned>(path: &str, resp: Response) -> Result<T> {
    let bytes = resp.bytes().await.map_err(network)?;
    serde_json::from_slice(&bytes)
        .map_err(|e| GameError::Protocol(format!("{path}: unexpected response: {e}")))
}

// ---------------------------------------------------------------------------
// RemoteStateClient trait implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl RemoteStateClient for HttpGameClient {
    async fn fetch_round_state(&self) -> Result<RoundSnapshot> {
        let status: StatusResponse = self.get_json("status").await?;
        status.into_snapshot()
    }

    async fn fetch_player_state(&self, player_id: &PlayerId) -> Result<Decimal> {
        let env: Envelope<BalanceData> = self
            .command(
                reqwest::Method::PUT,
                "players",
                &PlayerRequest { player_id: player_id.as_str() },
            )
            .await?;
        env.into_result("Player not found")?
            .map(|d| d.balance)
            .ok_or_else(|| GameError::Protocol("players: missing data.balance".into()))
    }

    async fn join(&self, player_id: &PlayerId, name: &str) -> Result<()> {
        let env: Envelope<Ignored> = self
            .command(
                reqwest::Method::POST,
                "join",
                &JoinRequest { player_id: player_id.as_str(), name },
            )
            .await?;
        env.into_result("Could not join the game").map(|_| ())
    }

    async fn place_bet(&self, player_id: &PlayerId, amount: Decimal) -> Result<()> {
        let env: Envelope<Ignored> = self
            .command(
                reqwest::Method::POST,
                "bet",
                &BetRequest { player_id: player_id.as_str(), amount },
            )
            .await?;
        env.into_result("Bet could not be placed").map(|_| ())
    }

    async fn cashout(&self, player_id: &PlayerId) -> Result<()> {
        let env: Envelope<Ignored> = self
            .command(
                reqwest::Method::POST,
                "cashout",
                &PlayerRequest { player_id: player_id.as_str() },
            )
            .await?;
        env.into_result("Cashout failed").map(|_| ())
    }

    async fn fetch_active_bets(&self) -> Result<Vec<BetRecord>> {
        let entries: Vec<ActiveBetEntry> = self.get_json("active-bets").await?;
        Ok(entries
            .into_iter()
            .map(|e| BetRecord { player_name: e.player_name, amount: e.amount })
            .collect())
    }

    async fn fetch_recent_crash_points(&self) -> Result<Vec<f64>> {
        let mut points: Vec<f64> = self.get_json("old-crash-points").await?;
        // Keep the newest `crash_history_len`, still oldest first.
        if points.len() > self.crash_history_len {
            points.drain(..points.len() - self.crash_history_len);
        }
        Ok(points)
    }

    async fn load_balance(&self, player_name: &str, amount: Decimal) -> Result<()> {
        let env: Envelope<Ignored> = self
            .command(
                reqwest::Method::POST,
                "load-balance",
                &LoadBalanceRequest { player_name, amount },
            )
            .await?;
        env.into_result("Balance could not be loaded").map(|_| ())
    }

    async fn bring_beko(&self, player_id: &PlayerId) -> Result<String> {
        let env: Envelope<BekoData> = self
            .command(
                reqwest::Method::POST,
                "bring-beko",
                &PlayerRequest { player_id: player_id.as_str() },
            )
            .await?;
        env.into_result("Could not bring Beko back")?
            .map(|d| d.ulke)
            .ok_or_else(|| GameError::Protocol("bring-beko: missing data.ulke".into()))
    }

    fn name(&self) -> &str {
        SERVER_NAME
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
