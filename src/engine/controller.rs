//! Controller: ties the remote client, tracker, ledger and notification
//! sink together.
//!
//! `ControllerState` is the pure, synchronous reconciliation pipeline.
//! `Controller` wraps it behind a mutex, performs the network calls for
//! poll cycles and user actions, and never holds the lock across an await
//! on the server.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::ledger::BetLedger;
use super::notifications::NotificationSink;
use super::tracker::RoundTracker;
use crate::remote::RemoteStateClient;
use crate::types::{
    BetRecord, ControllerView, GameError, Notification, Phase, PlayerId, PlayerState,
    Precondition, Result, RoundSnapshot, Settlement, Severity, TransitionEvent,
};

/// Balance needed before the player may buy Beko a ticket home.
pub const TICKET_PRICE: Decimal = dec!(2000);

const BEKO_HOME: &str = "türkiye";

// ---------------------------------------------------------------------------
// Cycle data
// ---------------------------------------------------------------------------

/// Raw results of one poll cycle's network phase.
#[derive(Debug, Clone)]
pub struct CycleFetch {
    pub round: RoundSnapshot,
    /// `None` when not joined or when the player fetch failed.
    pub balance: Option<Decimal>,
    /// Action counter observed before any request was issued.
    pub action_epoch: u64,
}

/// What one applied cycle changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleOutcome {
    pub transition: Option<TransitionEvent>,
    pub settlement: Option<Settlement>,
    pub balance_applied: bool,
}

// ---------------------------------------------------------------------------
// Pure pipeline
// ---------------------------------------------------------------------------

/// A cashout whose server reply has not arrived yet.
#[derive(Debug, Clone, Copy)]
struct PendingCashout {
    /// Multiplier when the request was sent.
    multiplier: f64,
    /// Loss settlement held back until the reply decides the bet.
    deferred: Option<DeferredLoss>,
}

#[derive(Debug, Clone, Copy, Default)]
struct DeferredLoss {
    crash_point: Option<f64>,
    /// Set when the round also advanced; wager state must then be reset.
    old_round: Option<u64>,
}

pub struct ControllerState {
    tracker: RoundTracker,
    ledger: BetLedger,
    sink: NotificationSink,
    round: Option<RoundSnapshot>,
    active_bets: Vec<BetRecord>,
    crash_history: Vec<f64>,
    pending_cashout: Option<PendingCashout>,
}

impl ControllerState {
    pub fn new(player_id: PlayerId) -> Self {
        Self {
            tracker: RoundTracker::new(),
            ledger: BetLedger::new(player_id),
            sink: NotificationSink::default(),
            round: None,
            active_bets: Vec::new(),
            crash_history: Vec::new(),
            pending_cashout: None,
        }
    }

    /// Apply one poll result. Order: round observation, balance
    /// reconciliation, settlement, notification.
    pub fn apply_cycle(&mut self, round: RoundSnapshot, balance: Option<Decimal>) -> CycleOutcome {
        let transition = self.tracker.observe(&round);
        let crash_point = round.crash_point;
        self.round = Some(round);

        let balance_applied = match balance {
            Some(remote) => {
                self.ledger.reconcile_authoritative(remote);
                true
            }
            None => false,
        };

        // The bet belongs to an in-flight cashout; its reply settles it.
        if let Some(pending) = self.pending_cashout.as_mut() {
            if self.ledger.state().has_open_bet() {
                match transition {
                    Some(TransitionEvent::PhaseChanged { to: Phase::Crashed, .. }) => {
                        pending.deferred.get_or_insert_with(DeferredLoss::default).crash_point =
                            crash_point;
                    }
                    Some(TransitionEvent::RoundAdvanced { old_round, .. }) => {
                        pending
                            .deferred
                            .get_or_insert_with(DeferredLoss::default)
                            .old_round
                            .get_or_insert(old_round);
                    }
                    _ => {}
                }
                if transition.is_some() {
                    debug!(transition = ?transition, "Cashout in flight, settlement deferred");
                }
                return CycleOutcome { transition, settlement: None, balance_applied };
            }
        }

        let settlement = match transition {
            Some(TransitionEvent::PhaseChanged { to: Phase::Crashed, .. }) => {
                self.ledger.settle_on_crash(crash_point)
            }
            Some(TransitionEvent::RoundAdvanced { .. }) => {
                let settlement = self.ledger.settle_on_crash(None);
                self.ledger.reset_on_round_advance();
                settlement
            }
            _ => None,
        };

        if let Some(settlement) = settlement {
            self.notify_settlement(settlement, transition);
        }

        CycleOutcome { transition, settlement, balance_applied }
    }

    fn notify_settlement(&mut self, settlement: Settlement, transition: Option<TransitionEvent>) {
        let message = match (settlement, transition) {
            (Settlement::Lost { stake, crash_point: Some(cp) }, _) => {
                format!("Crashed at {cp:.2}x! Bet of {stake:.2} lost.")
            }
            (
                Settlement::Lost { stake, crash_point: None },
                Some(TransitionEvent::RoundAdvanced { old_round, .. }),
            ) => format!("Round {old_round} ended before its crash was seen. Bet of {stake:.2} lost."),
            (Settlement::Lost { stake, crash_point: None }, _) => {
                format!("Bet of {stake:.2} lost.")
            }
            (Settlement::Won { multiplier, winnings, .. }, _) => {
                format!("You won {winnings:.2}! ({multiplier:.2}x)")
            }
        };
        let severity = match settlement {
            Settlement::Won { .. } => Severity::Success,
            Settlement::Lost { .. } => Severity::Error,
        };
        self.sink.append(message, severity);
    }

    /// Check the cashout window and mark a cashout as in flight.
    fn begin_cashout(&mut self) -> std::result::Result<(), Precondition> {
        if !self.ledger.state().is_in_game {
            return Err(Precondition::NoActiveBet);
        }
        self.require_phase(Phase::Flying, Precondition::NotFlying)?;
        let multiplier = self.round.as_ref().map_or(1.0, |r| r.multiplier);
        self.pending_cashout = Some(PendingCashout { multiplier, deferred: None });
        Ok(())
    }

    /// Settle the bet from the server's cashout reply. Any crash or round
    /// change seen while the request was in flight is resolved here, so the
    /// bet settles exactly once.
    fn finish_cashout(&mut self, reply: Result<()>) -> Result<Settlement> {
        let Some(pending) = self.pending_cashout.take() else {
            return self.reject("cashout", Precondition::NoActiveBet.into());
        };

        let outcome = match reply {
            Ok(()) => {
                // Still flying: the server paid at least the latest multiplier.
                let multiplier = match &self.round {
                    Some(round) if pending.deferred.is_none() && round.phase == Phase::Flying => {
                        round.multiplier.max(pending.multiplier)
                    }
                    _ => pending.multiplier,
                };
                match self.ledger.apply_local_cashout(multiplier) {
                    Ok(settlement) => {
                        self.notify_settlement(settlement, None);
                        Ok(settlement)
                    }
                    Err(p) => self.reject("cashout", p.into()),
                }
            }
            Err(e) => match pending.deferred {
                // The round ended under the refused cashout: report the loss
                // instead of the refusal.
                Some(deferred) => {
                    warn!(error = %e, "Cashout refused after the round ended");
                    if let Some(settlement) = self.ledger.settle_on_crash(deferred.crash_point) {
                        let transition = deferred.old_round.map(|old_round| {
                            TransitionEvent::RoundAdvanced {
                                old_round,
                                new_round: self.round.as_ref().map_or(old_round + 1, |r| r.round_id),
                            }
                        });
                        self.notify_settlement(settlement, transition);
                    }
                    Err(e)
                }
                None => self.reject("cashout", e),
            },
        };

        if pending.deferred.is_some_and(|d| d.old_round.is_some()) {
            self.ledger.reset_on_round_advance();
        }
        outcome
    }

    /// Replace the auxiliary listings; a failed fetch keeps the old list.
    pub fn apply_aux(&mut self, active_bets: Option<Vec<BetRecord>>, crash_history: Option<Vec<f64>>) {
        if let Some(bets) = active_bets {
            self.active_bets = bets;
        }
        if let Some(history) = crash_history {
            self.crash_history = history;
        }
    }

    /// Record a rejected action: one error notification, no state change.
    fn reject<T>(&mut self, action: &str, err: GameError) -> Result<T> {
        warn!(action, error = %err, "Action rejected");
        self.sink.append(err.user_message(), Severity::Error);
        Err(err)
    }

    fn require_phase(&self, phase: Phase, otherwise: Precondition) -> std::result::Result<(), Precondition> {
        match &self.round {
            Some(round) if round.phase == phase => Ok(()),
            _ => Err(otherwise),
        }
    }

    pub fn player(&self) -> &PlayerState {
        self.ledger.state()
    }

    pub fn round(&self) -> Option<&RoundSnapshot> {
        self.round.as_ref()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.sink.snapshot()
    }

    pub fn view(&self) -> ControllerView {
        let player = self.ledger.state().clone();
        let phase = self.round.as_ref().map(|r| r.phase);
        let flying = phase == Some(Phase::Flying);

        let potential_win = match &self.round {
            Some(round) if flying && player.has_open_bet() => {
                Decimal::try_from(round.multiplier)
                    .ok()
                    .map(|m| player.current_bet * m)
            }
            _ => None,
        };

        ControllerView {
            can_bet: player.is_joined
                && phase == Some(Phase::Waiting)
                && !player.has_open_bet()
                && player.balance > Decimal::ZERO,
            can_cashout: flying && player.has_open_bet(),
            potential_win,
            round: self.round.clone(),
            notifications: self.sink.snapshot(),
            active_bets: self.active_bets.clone(),
            crash_history: self.crash_history.clone(),
            player,
        }
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Marks a user action as outstanding; released on drop.
///
/// The shared counter is odd exactly while an action is in flight.
struct ActionGuard<'a>(&'a AtomicU64);

impl Drop for ActionGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct Controller {
    remote: Arc<dyn RemoteStateClient>,
    player_id: PlayerId,
    state: Mutex<ControllerState>,
    actions: AtomicU64,
}

impl Controller {
    /// Create a controller with a freshly generated player id.
    pub fn new(remote: Arc<dyn RemoteStateClient>) -> Self {
        Self::with_player_id(remote, PlayerId::generate())
    }

    pub fn with_player_id(remote: Arc<dyn RemoteStateClient>, player_id: PlayerId) -> Self {
        Self {
            remote,
            state: Mutex::new(ControllerState::new(player_id.clone())),
            player_id,
            actions: AtomicU64::new(0),
        }
    }

    pub fn player_id(&self) -> &PlayerId {
        &self.player_id
    }

    fn begin_action(&self) -> Option<ActionGuard<'_>> {
        let current = self.actions.load(Ordering::SeqCst);
        if current % 2 == 1 {
            return None;
        }
        self.actions
            .compare_exchange(current, current + 1, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| ActionGuard(&self.actions))
    }

    async fn reject_busy<T>(&self, action: &str) -> Result<T> {
        self.state
            .lock()
            .await
            .reject(action, Precondition::ActionInProgress.into())
    }

    // -- Poll cycle ------------------------------------------------------

    /// Network half of a poll cycle. Returns `None` when the round state
    /// could not be fetched; the previous snapshot then stays in place.
    pub async fn fetch_cycle(&self) -> Option<CycleFetch> {
        let action_epoch = self.actions.load(Ordering::SeqCst);

        let round = match self.remote.fetch_round_state().await {
            Ok(round) => round,
            Err(e) => {
                log_poll_failure("status", &e);
                return None;
            }
        };

        let joined = self.state.lock().await.player().is_joined;
        let balance = if joined {
            match self.remote.fetch_player_state(&self.player_id).await {
                Ok(balance) => Some(balance),
                Err(e) => {
                    log_poll_failure("players", &e);
                    None
                }
            }
        } else {
            None
        };

        Some(CycleFetch { round, balance, action_epoch })
    }

    /// State half of a poll cycle. `is_live` is checked under the state
    /// lock; when it returns false the results are discarded.
    pub async fn apply_cycle(
        &self,
        fetch: CycleFetch,
        is_live: impl FnOnce() -> bool,
    ) -> Option<CycleOutcome> {
        let mut state = self.state.lock().await;
        if !is_live() {
            debug!(round = fetch.round.round_id, "Poll stopped, discarding cycle results");
            return None;
        }

        // A balance read that overlapped a user action may predate or
        // postdate the server-side effect of that action.
        let mut balance = fetch.balance;
        let epoch_now = self.actions.load(Ordering::SeqCst);
        if balance.is_some() && (fetch.action_epoch != epoch_now || epoch_now % 2 == 1) {
            debug!("Balance read overlapped a user action, skipping reconcile");
            balance = None;
        }

        Some(state.apply_cycle(fetch.round, balance))
    }

    /// Run one full cycle immediately.
    pub async fn poll_once(&self) -> Option<CycleOutcome> {
        let fetch = self.fetch_cycle().await?;
        self.apply_cycle(fetch, || true).await
    }

    /// Refresh the active-bets listing and crash history.
    pub async fn refresh_aux(&self) {
        self.refresh_aux_if(|| true).await;
    }

    /// Like `refresh_aux`, but the results are dropped when `is_live`
    /// (checked under the state lock) returns false.
    pub async fn refresh_aux_if(&self, is_live: impl FnOnce() -> bool) {
        let (bets, history) = futures::join!(
            self.remote.fetch_active_bets(),
            self.remote.fetch_recent_crash_points()
        );
        let bets = bets.map_err(|e| log_poll_failure("active-bets", &e)).ok();
        let history = history
            .map_err(|e| log_poll_failure("old-crash-points", &e))
            .ok();

        let mut state = self.state.lock().await;
        if !is_live() {
            debug!("Poll stopped, discarding listings");
            return;
        }
        state.apply_aux(bets, history);
    }

    // -- User actions ----------------------------------------------------

    /// Join under `name`.
    pub async fn join(&self, name: &str) -> Result<()> {
        let Some(_guard) = self.begin_action() else {
            return self.reject_busy("join").await;
        };
        let name = name.trim();
        {
            let mut state = self.state.lock().await;
            if name.is_empty() {
                return state.reject("join", Precondition::EmptyName.into());
            }
            if state.player().is_joined {
                return state.reject("join", Precondition::AlreadyJoined.into());
            }
        }

        let result = self.remote.join(&self.player_id, name).await;

        let mut state = self.state.lock().await;
        match result {
            Ok(()) => {
                if let Err(p) = state.ledger.mark_joined(name) {
                    return state.reject("join", p.into());
                }
                info!(player_id = %self.player_id, name, "Joined game");
                state.sink.append(
                    format!("Joined the game! ID: {}", self.player_id),
                    Severity::Success,
                );
                Ok(())
            }
            Err(e) => state.reject("join", e),
        }
    }

    /// Place a bet for the round that is currently waiting for take-off.
    ///
    /// The stake is deducted locally before the server is asked and
    /// restored if the server refuses or cannot be reached.
    pub async fn place_bet(&self, amount: Decimal) -> Result<()> {
        let Some(_guard) = self.begin_action() else {
            return self.reject_busy("bet").await;
        };
        {
            let mut state = self.state.lock().await;
            let checked = state
                .ledger
                .check_bet(amount)
                .and_then(|_| state.require_phase(Phase::Waiting, Precondition::BettingClosed));
            if let Err(p) = checked {
                return state.reject("bet", p.into());
            }
            if let Err(p) = state.ledger.apply_local_bet(amount) {
                return state.reject("bet", p.into());
            }
        }

        let result = self.remote.place_bet(&self.player_id, amount).await;

        let mut state = self.state.lock().await;
        match result {
            Ok(()) => {
                state.sink.append(format!("Bet of {amount:.2} placed!"), Severity::Success);
                Ok(())
            }
            Err(e) => {
                state.ledger.rollback_bet(amount);
                state.reject("bet", e)
            }
        }
    }

    /// Cash out the open bet. The server decides; a crash observed while
    /// the request is in flight waits for its reply.
    pub async fn cashout(&self) -> Result<Settlement> {
        let Some(_guard) = self.begin_action() else {
            return self.reject_busy("cashout").await;
        };
        {
            let mut state = self.state.lock().await;
            if let Err(p) = state.begin_cashout() {
                return state.reject("cashout", p.into());
            }
        }

        let reply = self.remote.cashout(&self.player_id).await;
        self.state.lock().await.finish_cashout(reply)
    }

    /// Administrative top-up for any player, addressed by display name.
    pub async fn load_balance(&self, player_name: &str, amount: Decimal) -> Result<()> {
        let Some(_guard) = self.begin_action() else {
            return self.reject_busy("load-balance").await;
        };
        let player_name = player_name.trim();
        if player_name.is_empty() {
            return self
                .state
                .lock()
                .await
                .reject("load-balance", Precondition::EmptyName.into());
        }
        if amount <= Decimal::ZERO {
            return self
                .state
                .lock()
                .await
                .reject("load-balance", Precondition::InvalidAmount.into());
        }

        let result = self.remote.load_balance(player_name, amount).await;

        let mut state = self.state.lock().await;
        match result {
            Ok(()) => {
                state.sink.append(
                    format!("Loaded {amount:.2} onto {player_name}'s balance."),
                    Severity::Success,
                );
                Ok(())
            }
            Err(e) => state.reject("load-balance", e),
        }
    }

    /// Spend the whole balance on a ticket home for Beko.
    /// Returns the destination the server drew.
    pub async fn bring_beko(&self) -> Result<String> {
        let Some(_guard) = self.begin_action() else {
            return self.reject_busy("bring-beko").await;
        };
        {
            let mut state = self.state.lock().await;
            if !state.player().is_joined {
                return state.reject("bring-beko", Precondition::NotJoined.into());
            }
            if state.player().balance <= TICKET_PRICE {
                return state.reject("bring-beko", Precondition::BalanceTooLow.into());
            }
        }

        let result = self.remote.bring_beko(&self.player_id).await;

        let mut state = self.state.lock().await;
        match result {
            Ok(destination) => {
                state.ledger.zero_balance();
                if destination.to_lowercase() == BEKO_HOME {
                    state.sink.append("Beko is back home!", Severity::Success);
                } else {
                    state.sink.append(
                        format!("No luck! Beko started working in {destination}"),
                        Severity::Error,
                    );
                }
                Ok(destination)
            }
            Err(e) => state.reject("bring-beko", e),
        }
    }

    // -- Read side -------------------------------------------------------

    pub async fn view(&self) -> ControllerView {
        self.state.lock().await.view()
    }

    pub async fn player(&self) -> PlayerState {
        self.state.lock().await.player().clone()
    }

    pub async fn round(&self) -> Option<RoundSnapshot> {
        self.state.lock().await.round().cloned()
    }

    pub async fn notifications(&self) -> Vec<Notification> {
        self.state.lock().await.notifications()
    }

    /// Notifications appended after `after_id`, oldest first.
    pub async fn notifications_since(&self, after_id: u64) -> Vec<Notification> {
        self.state.lock().await.sink.since(after_id)
    }
}

fn log_poll_failure(endpoint: &str, err: &GameError) {
    match err {
        GameError::Network(_) => debug!(endpoint, error = %err, "Poll request failed"),
        _ => warn!(endpoint, error = %err, "Poll response unusable"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
