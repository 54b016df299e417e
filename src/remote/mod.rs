//! Game server integration.
//!
//! Defines the `RemoteStateClient` trait and provides the HTTP+JSON
//! implementation used against the crash game server.

pub mod http;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::types::{BetRecord, PlayerId, Result, RoundSnapshot};

/// Request/response contract with the authoritative game server.
///
/// Implementors perform I/O only and apply no policy. Every failure comes
/// back as a `GameError` value; none of these calls panic or abort the
/// caller's loop.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteStateClient: Send + Sync {
    /// Fetch the current round snapshot.
    async fn fetch_round_state(&self) -> Result<RoundSnapshot>;

    /// Fetch the authoritative balance of a joined player.
    async fn fetch_player_state(&self, player_id: &PlayerId) -> Result<Decimal>;

    /// Register the player under a display name.
    async fn join(&self, player_id: &PlayerId, name: &str) -> Result<()>;

    async fn place_bet(&self, player_id: &PlayerId, amount: Decimal) -> Result<()>;

    async fn cashout(&self, player_id: &PlayerId) -> Result<()>;

    /// Bets still open in the current round.
    async fn fetch_active_bets(&self) -> Result<Vec<BetRecord>>;

    /// Recent crash points, oldest first.
    async fn fetch_recent_crash_points(&self) -> Result<Vec<f64>>;

    /// Administrative top-up of a player's balance, addressed by name.
    async fn load_balance(&self, player_name: &str, amount: Decimal) -> Result<()>;

    /// Spend the whole balance on a ticket; returns the destination drawn.
    async fn bring_beko(&self, player_id: &PlayerId) -> Result<String>;

    /// Server identifier for logging.
    fn name(&self) -> &str;
}
