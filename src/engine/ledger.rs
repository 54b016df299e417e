//! Bet ledger: the single writer of the local `PlayerState`.
//!
//! Absorbs two update channels: optimistic local mutations made right
//! after a user action, and the authoritative balance fetched on every
//! poll. The server always wins on balance; local arithmetic only hides
//! latency until the next poll.

use rust_decimal::prelude::*;
use tracing::{debug, info, warn};

use crate::types::{PlayerId, PlayerState, Precondition, Settlement};

pub struct BetLedger {
    state: PlayerState,
}

impl BetLedger {
    pub fn new(player_id: PlayerId) -> Self {
        Self { state: PlayerState::new(player_id) }
    }

    pub fn state(&self) -> &PlayerState {
        &self.state
    }

    /// Record a successful join. The display name is fixed from here on.
    pub fn mark_joined(&mut self, name: &str) -> Result<(), Precondition> {
        if self.state.is_joined {
            return Err(Precondition::AlreadyJoined);
        }
        self.state.is_joined = true;
        self.state.display_name = Some(name.to_string());
        Ok(())
    }

    /// Check every bet precondition without touching state.
    pub fn check_bet(&self, amount: Decimal) -> Result<(), Precondition> {
        if !self.state.is_joined {
            return Err(Precondition::NotJoined);
        }
        if amount <= Decimal::ZERO {
            return Err(Precondition::InvalidAmount);
        }
        if self.state.current_bet > Decimal::ZERO || self.state.is_in_game {
            return Err(Precondition::BetAlreadyActive);
        }
        if amount > self.state.balance {
            return Err(Precondition::InsufficientBalance);
        }
        Ok(())
    }

    /// Deduct the stake and open the wager.
    pub fn apply_local_bet(&mut self, amount: Decimal) -> Result<(), Precondition> {
        self.check_bet(amount)?;
        self.state.balance -= amount;
        self.state.current_bet = amount;
        self.state.is_in_game = true;
        debug!(amount = %amount, balance = %self.state.balance, "Local bet applied");
        Ok(())
    }

    /// Undo `apply_local_bet` after the server refused (or never saw) it.
    pub fn rollback_bet(&mut self, amount: Decimal) {
        if !self.state.is_in_game || self.state.current_bet != amount {
            // The round moved on while the command was in flight; the next
            // authoritative refresh settles the balance.
            warn!(
                amount = %amount,
                current_bet = %self.state.current_bet,
                "Rollback skipped, bet already cleared"
            );
            return;
        }
        self.state.balance += amount;
        self.state.current_bet = Decimal::ZERO;
        self.state.is_in_game = false;
        debug!(amount = %amount, balance = %self.state.balance, "Local bet rolled back");
    }

    /// Close the wager as a win at `multiplier`, crediting stake × multiplier.
    pub fn apply_local_cashout(&mut self, multiplier: f64) -> Result<Settlement, Precondition> {
        if !self.state.is_in_game {
            return Err(Precondition::NoActiveBet);
        }
        let factor = Decimal::from_f64(multiplier)
            .filter(|m| *m > Decimal::ZERO)
            .ok_or(Precondition::InvalidAmount)?;

        let stake = self.state.current_bet;
        let winnings = stake * factor;
        self.state.balance += winnings;
        self.state.current_bet = Decimal::ZERO;
        self.state.is_in_game = false;

        info!(
            stake = %stake,
            multiplier,
            winnings = format!("{:.2}", winnings),
            balance = format!("{:.2}", self.state.balance),
            "Cashed out"
        );
        Ok(Settlement::Won { stake, multiplier, winnings })
    }

    /// Overwrite the balance with the server's value.
    pub fn reconcile_authoritative(&mut self, remote_balance: Decimal) {
        if remote_balance != self.state.balance {
            debug!(
                local = %self.state.balance,
                remote = %remote_balance,
                "Balance corrected from server"
            );
        }
        self.state.balance = remote_balance;
    }

    /// Settle an open wager as lost. Returns `None` when there is nothing
    /// to settle, so a second call in the same round is a no-op.
    pub fn settle_on_crash(&mut self, crash_point: Option<f64>) -> Option<Settlement> {
        if !self.state.has_open_bet() {
            return None;
        }
        let stake = self.state.current_bet;
        self.state.current_bet = Decimal::ZERO;
        self.state.is_in_game = false;

        info!(
            stake = %stake,
            crash_point = ?crash_point,
            balance = format!("{:.2}", self.state.balance),
            "Bet lost"
        );
        Some(Settlement::Lost { stake, crash_point })
    }

    /// Clear any wager state when a new round begins. Idempotent.
    /// Returns whether anything was cleared.
    pub fn reset_on_round_advance(&mut self) -> bool {
        let had_bet = self.state.is_in_game || self.state.current_bet > Decimal::ZERO;
        self.state.current_bet = Decimal::ZERO;
        self.state.is_in_game = false;
        had_bet
    }

    /// Balance after the server consumed the whole wallet.
    pub fn zero_balance(&mut self) {
        self.state.balance = Decimal::ZERO;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
