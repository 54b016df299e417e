//! End-to-end sessions: controller + mock game server, driven one poll
//! cycle at a time.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

use aviator::engine::Controller;
use aviator::types::*;

use crate::mock_server::MockGameServer;

async fn joined_session(round_id: u64) -> (Arc<MockGameServer>, Controller) {
    let server = Arc::new(MockGameServer::new(round_id));
    let controller = Controller::new(server.clone());
    controller.join("pilot").await.unwrap();
    controller.poll_once().await.unwrap();
    (server, controller)
}

fn error_count(notifications: &[Notification]) -> usize {
    notifications
        .iter()
        .filter(|n| n.severity == Severity::Error)
        .count()
}

#[tokio::test]
async fn test_bet_then_cashout_at_two_and_a_half() {
    let (server, ctrl) = joined_session(1).await;
    assert_eq!(ctrl.player().await.balance, dec!(1000));

    ctrl.place_bet(dec!(100)).await.unwrap();
    assert_eq!(ctrl.player().await.balance, dec!(900));

    server.take_off(2.5);
    ctrl.poll_once().await.unwrap();
    assert!(ctrl.view().await.can_cashout);

    let settlement = ctrl.cashout().await.unwrap();
    assert_eq!(
        settlement,
        Settlement::Won { stake: dec!(100), multiplier: 2.5, winnings: dec!(250) }
    );
    let player = ctrl.player().await;
    assert_eq!(player.balance, dec!(1150));
    assert_eq!(player.current_bet, Decimal::ZERO);
    assert!(!player.is_in_game);

    // The server agrees after the next reconcile.
    ctrl.poll_once().await.unwrap();
    assert_eq!(ctrl.player().await.balance, dec!(1150));
    assert_eq!(server.balance_of(ctrl.player_id()), Some(dec!(1150)));
}

#[tokio::test]
async fn test_crash_settles_loss_once() {
    let (server, ctrl) = joined_session(4).await;
    ctrl.place_bet(dec!(100)).await.unwrap();
    server.take_off(1.5);
    ctrl.poll_once().await.unwrap();

    server.crash(1.8);
    let outcome = ctrl.poll_once().await.unwrap();
    assert_eq!(
        outcome.transition,
        Some(TransitionEvent::PhaseChanged { from: Phase::Flying, to: Phase::Crashed })
    );
    ctrl.poll_once().await.unwrap();

    let player = ctrl.player().await;
    assert_eq!(player.current_bet, Decimal::ZERO);
    assert!(!player.is_in_game);
    assert_eq!(player.balance, dec!(900));

    let notes = ctrl.notifications().await;
    assert_eq!(error_count(&notes), 1);
    assert!(notes[0].message.contains("1.80x"));
}

#[tokio::test]
async fn test_round_advance_without_seeing_crash() {
    let (server, ctrl) = joined_session(5).await;
    ctrl.place_bet(dec!(100)).await.unwrap();
    server.take_off(1.3);
    ctrl.poll_once().await.unwrap();

    // The crash happens between two polls.
    server.crash(1.9);
    server.next_round();
    let outcome = ctrl.poll_once().await.unwrap();
    assert_eq!(
        outcome.transition,
        Some(TransitionEvent::RoundAdvanced { old_round: 5, new_round: 6 })
    );

    let player = ctrl.player().await;
    assert_eq!(player.current_bet, Decimal::ZERO);
    assert!(!player.is_in_game);
    assert!(ctrl.view().await.can_bet);
}

#[tokio::test]
async fn test_server_rejection_rolls_back_bet() {
    let (server, ctrl) = joined_session(2).await;
    // The plane left before our poll noticed.
    server.take_off(1.1);

    let err = ctrl.place_bet(dec!(100)).await.unwrap_err();
    assert!(matches!(err, GameError::Rejected(_)));

    let player = ctrl.player().await;
    assert_eq!(player.balance, dec!(1000));
    assert!(!player.is_in_game);

    let notes = ctrl.notifications().await;
    assert_eq!(notes[0].severity, Severity::Error);
    assert_eq!(notes[0].message, "Bets are closed for this round");
}

#[tokio::test]
async fn test_network_failure_rolls_back_bet() {
    let (server, ctrl) = joined_session(2).await;
    server.set_network_error(Some("connection reset"));

    let err = ctrl.place_bet(dec!(250)).await.unwrap_err();
    assert!(err.is_transient());
    assert_eq!(ctrl.player().await.balance, dec!(1000));
    assert_eq!(error_count(&ctrl.notifications().await), 1);
}

#[tokio::test]
async fn test_outage_keeps_last_snapshot() {
    let (server, ctrl) = joined_session(3).await;
    server.take_off(1.6);
    ctrl.poll_once().await.unwrap();

    server.set_network_error(Some("timed out"));
    assert!(ctrl.poll_once().await.is_none());
    assert!(ctrl.poll_once().await.is_none());
    let round = ctrl.round().await.unwrap();
    assert_eq!(round.phase, Phase::Flying);
    assert_eq!(round.round_id, 3);
    // Swallowed poll failures never reach the user.
    assert_eq!(ctrl.notifications().await.len(), 1);

    server.set_network_error(None);
    server.crash(2.2);
    let outcome = ctrl.poll_once().await.unwrap();
    assert!(outcome.transition.is_some());
}

#[tokio::test]
async fn test_notifications_keep_five_newest() {
    let server = Arc::new(MockGameServer::new(1));
    let ctrl = Controller::new(server.clone());
    for _ in 0..7 {
        let _ = ctrl.place_bet(dec!(10)).await;
    }
    let notes = ctrl.notifications().await;
    assert_eq!(notes.len(), 5);
    assert!(notes.windows(2).all(|w| w[0].id > w[1].id));
    assert_eq!(server.calls_to("bet"), 0);
}

#[tokio::test]
async fn test_second_join_never_reaches_server() {
    let (server, ctrl) = joined_session(1).await;
    let err = ctrl.join("pilot").await.unwrap_err();
    assert!(matches!(err, GameError::Precondition(Precondition::AlreadyJoined)));
    assert_eq!(server.calls_to("join"), 1);
}

#[tokio::test]
async fn test_load_balance_then_bring_beko_home() {
    let (server, ctrl) = joined_session(1).await;
    ctrl.load_balance("pilot", dec!(3000)).await.unwrap();
    // Loading never touches the local balance; the poll does.
    assert_eq!(ctrl.player().await.balance, dec!(1000));
    ctrl.poll_once().await.unwrap();
    assert_eq!(ctrl.player().await.balance, dec!(4000));

    let destination = ctrl.bring_beko().await.unwrap();
    assert_eq!(destination, "Türkiye");
    assert_eq!(ctrl.player().await.balance, Decimal::ZERO);
    assert_eq!(server.balance_of(ctrl.player_id()), Some(Decimal::ZERO));
    assert_eq!(ctrl.notifications().await[0].severity, Severity::Success);
}

#[tokio::test]
async fn test_beko_lands_elsewhere() {
    let (server, ctrl) = joined_session(1).await;
    server.set_beko_destination("Almanya");
    ctrl.load_balance("pilot", dec!(2500)).await.unwrap();
    ctrl.poll_once().await.unwrap();

    ctrl.bring_beko().await.unwrap();
    let notes = ctrl.notifications().await;
    assert_eq!(notes[0].severity, Severity::Error);
    assert!(notes[0].message.contains("Almanya"));
}

#[tokio::test]
async fn test_aux_lists_follow_the_server() {
    let (server, ctrl) = joined_session(1).await;
    ctrl.place_bet(dec!(75)).await.unwrap();
    ctrl.refresh_aux().await;
    let view = ctrl.view().await;
    assert_eq!(view.active_bets, vec![BetRecord { player_name: "pilot".into(), amount: dec!(75) }]);

    server.take_off(1.2);
    server.crash(1.2);
    ctrl.refresh_aux().await;
    let view = ctrl.view().await;
    assert!(view.active_bets.is_empty());
    assert_eq!(view.crash_history, vec![1.2]);

    server.set_network_error(Some("down"));
    ctrl.refresh_aux().await;
    assert_eq!(ctrl.view().await.crash_history, vec![1.2]);
}
