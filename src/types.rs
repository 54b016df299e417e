//! Shared types for the AVIATOR client.
//!
//! These types form the data model used across all modules.
//! They are designed to be stable so that the remote client, the engine
//! and the dashboard can depend on them without circular references.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Balance a freshly joined player starts with on the server.
pub const INITIAL_BALANCE: Decimal = dec!(1000);

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Opaque per-session player identifier.
///
/// Generated once when the session starts and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    /// Create a fresh random identifier: `player_` followed by nine
    /// lowercase alphanumeric characters.
    pub fn generate() -> Self {
        let token = uuid::Uuid::new_v4().simple().to_string();
        Self(format!("player_{}", &token[..9]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last four characters, used as a short tag in the UI.
    pub fn short(&self) -> &str {
        let start = self.0.len().saturating_sub(4);
        &self.0[start..]
    }
}

impl From<&str> for PlayerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Round
// ---------------------------------------------------------------------------

/// Stage of the shared round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Waiting,
    Flying,
    Crashed,
}

impl Phase {
    /// Whether `next` is the legal successor of `self` within one round.
    pub fn precedes(&self, next: Phase) -> bool {
        matches!(
            (self, next),
            (Phase::Waiting, Phase::Flying) | (Phase::Flying, Phase::Crashed)
        )
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Waiting => write!(f, "waiting"),
            Phase::Flying => write!(f, "flying"),
            Phase::Crashed => write!(f, "crashed"),
        }
    }
}

/// Read-only mirror of the server's round state, replaced wholesale on
/// every successful poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundSnapshot {
    pub round_id: u64,
    pub phase: Phase,
    pub multiplier: f64,
    /// Only meaningful while Waiting or Crashed.
    pub remaining_ms: u64,
    pub active_bet_count: u32,
    /// Present only once the round has crashed.
    pub crash_point: Option<f64>,
}

impl RoundSnapshot {
    pub fn waiting(round_id: u64) -> Self {
        Self {
            round_id,
            phase: Phase::Waiting,
            multiplier: 1.0,
            remaining_ms: 10_000,
            active_bet_count: 0,
            crash_point: None,
        }
    }

    pub fn flying(round_id: u64, multiplier: f64) -> Self {
        Self {
            phase: Phase::Flying,
            multiplier,
            remaining_ms: 0,
            ..Self::waiting(round_id)
        }
    }

    pub fn crashed(round_id: u64, crash_point: f64) -> Self {
        Self {
            phase: Phase::Crashed,
            multiplier: crash_point,
            remaining_ms: 3_000,
            crash_point: Some(crash_point),
            ..Self::waiting(round_id)
        }
    }
}

impl fmt::Display for RoundSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.phase, self.crash_point) {
            (Phase::Crashed, Some(cp)) => {
                write!(f, "Round {} | crashed at {cp:.2}x", self.round_id)
            }
            (Phase::Flying, _) => write!(
                f,
                "Round {} | flying {:.2}x | bets: {}",
                self.round_id, self.multiplier, self.active_bet_count
            ),
            (phase, _) => write!(
                f,
                "Round {} | {phase} | {:.1}s left",
                self.round_id,
                self.remaining_ms as f64 / 1000.0
            ),
        }
    }
}

/// Colour band used to render past crash points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrashBand {
    Red,
    Blue,
    Green,
}

impl CrashBand {
    pub fn of(crash_point: f64) -> Self {
        if crash_point < 3.0 {
            CrashBand::Red
        } else if crash_point < 6.0 {
            CrashBand::Blue
        } else {
            CrashBand::Green
        }
    }
}

/// Transition detected between two successive polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionEvent {
    PhaseChanged { from: Phase, to: Phase },
    RoundAdvanced { old_round: u64, new_round: u64 },
}

impl fmt::Display for TransitionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionEvent::PhaseChanged { from, to } => write!(f, "{from} -> {to}"),
            TransitionEvent::RoundAdvanced { old_round, new_round } => {
                write!(f, "round {old_round} -> {new_round}")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// Local view of the player's wallet and wager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    pub player_id: PlayerId,
    pub display_name: Option<String>,
    pub balance: Decimal,
    pub current_bet: Decimal,
    pub is_joined: bool,
    pub is_in_game: bool,
}

impl PlayerState {
    pub fn new(player_id: PlayerId) -> Self {
        Self {
            player_id,
            display_name: None,
            balance: INITIAL_BALANCE,
            current_bet: Decimal::ZERO,
            is_joined: false,
            is_in_game: false,
        }
    }

    /// Whether a wager is open and unsettled.
    pub fn has_open_bet(&self) -> bool {
        self.is_in_game && self.current_bet > Decimal::ZERO
    }
}

impl fmt::Display for PlayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) | balance={:.2} | bet={:.2}{}",
            self.display_name.as_deref().unwrap_or("-"),
            self.player_id.short(),
            self.balance,
            self.current_bet,
            if self.is_in_game { " | in game" } else { "" },
        )
    }
}

/// An open bet as listed by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetRecord {
    pub player_name: String,
    pub amount: Decimal,
}

/// Final outcome of a wager, produced exactly once per round.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Settlement {
    Won { stake: Decimal, multiplier: f64, winnings: Decimal },
    Lost { stake: Decimal, crash_point: Option<f64> },
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Severity::Info => "info",
            Severity::Success => "success",
            Severity::Error => "error",
        })
    }
}

/// A user-facing event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: u64,
    pub message: String,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {:>7} | {}",
            self.timestamp.format("%H:%M:%S"),
            self.severity,
            self.message
        )
    }
}

// ---------------------------------------------------------------------------
// Presentation contract
// ---------------------------------------------------------------------------

/// Everything a presentation layer may read, captured atomically.
#[derive(Debug, Clone, Serialize)]
pub struct ControllerView {
    pub round: Option<RoundSnapshot>,
    pub player: PlayerState,
    /// `current_bet * multiplier` while flying with an open bet.
    pub potential_win: Option<Decimal>,
    pub notifications: Vec<Notification>,
    pub active_bets: Vec<BetRecord>,
    /// Oldest first.
    pub crash_history: Vec<f64>,
    pub can_bet: bool,
    pub can_cashout: bool,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Local check that failed before any network call was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Precondition {
    #[error("You must join the game first")]
    NotJoined,
    #[error("Already joined")]
    AlreadyJoined,
    #[error("Please enter your name")]
    EmptyName,
    #[error("Insufficient balance")]
    InsufficientBalance,
    #[error("Bet amount must be positive")]
    InvalidAmount,
    #[error("A bet is already active")]
    BetAlreadyActive,
    #[error("No active bet")]
    NoActiveBet,
    #[error("Bets are only accepted while waiting for take-off")]
    BettingClosed,
    #[error("Cashout is only possible while flying")]
    NotFlying,
    #[error("Another action is still in progress")]
    ActionInProgress,
    #[error("Balance too low for a ticket")]
    BalanceTooLow,
}

/// Domain-specific error types for AVIATOR.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    /// The request did not complete.
    #[error("Network error: {0}")]
    Network(String),

    /// The response was malformed or had an unexpected shape.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The server answered `success: false`.
    #[error("Rejected by server: {0}")]
    Rejected(String),

    #[error(transparent)]
    Precondition(#[from] Precondition),
}

impl GameError {
    /// Transport-level failures are swallowed by the poll loop.
    pub fn is_transient(&self) -> bool {
        matches!(self, GameError::Network(_) | GameError::Protocol(_))
    }

    /// Text suitable for an error notification.
    pub fn user_message(&self) -> String {
        match self {
            GameError::Rejected(msg) => msg.clone(),
            GameError::Precondition(p) => p.to_string(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, GameError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
