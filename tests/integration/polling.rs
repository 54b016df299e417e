//! Poll loop against the mock server on a paused tokio clock.

use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;

use aviator::engine::{Controller, PollLoop};
use aviator::types::*;

use crate::mock_server::MockGameServer;

const PERIOD: Duration = Duration::from_millis(100);

#[tokio::test(start_paused = true)]
async fn test_poll_loop_settles_a_full_round() {
    let server = Arc::new(MockGameServer::new(10));
    let ctrl = Arc::new(Controller::new(server.clone()));
    let mut poller = PollLoop::new(ctrl.clone(), Duration::from_secs(2));
    poller.start(PERIOD);

    ctrl.join("pilot").await.unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    ctrl.place_bet(dec!(200)).await.unwrap();

    server.take_off(1.4);
    tokio::time::sleep(Duration::from_millis(200)).await;
    server.crash(2.0);
    tokio::time::sleep(Duration::from_millis(200)).await;
    server.next_round();
    tokio::time::sleep(Duration::from_millis(200)).await;
    poller.stop().await;

    let notes = ctrl.notifications().await;
    let losses: Vec<_> = notes.iter().filter(|n| n.severity == Severity::Error).collect();
    assert_eq!(losses.len(), 1);
    assert!(losses[0].message.contains("2.00x"));

    let view = ctrl.view().await;
    assert_eq!(view.round.map(|r| r.round_id), Some(11));
    assert_eq!(view.player.balance, dec!(800));
    assert!(!view.player.is_in_game);
    // Transitions pull a fresh crash history.
    assert_eq!(view.crash_history, vec![2.0]);
}

#[tokio::test(start_paused = true)]
async fn test_stopped_loop_stops_talking_to_server() {
    let server = Arc::new(MockGameServer::new(1));
    let ctrl = Arc::new(Controller::new(server.clone()));
    let mut poller = PollLoop::new(ctrl, Duration::from_secs(2));

    poller.start(PERIOD);
    tokio::time::sleep(Duration::from_millis(320)).await;
    poller.stop().await;

    let calls = server.calls_to("status");
    assert!(calls >= 3);
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(server.calls_to("status"), calls);
}
