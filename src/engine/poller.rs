//! Poll loop: drives the controller's reconciliation cycle on a fixed
//! period.
//!
//! One cycle at a time: ticks that come due while a cycle is still running
//! are skipped, never queued. `stop()` cancels future cycles and discards
//! the results of one that is still in flight.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::controller::Controller;

struct Running {
    stop_tx: watch::Sender<bool>,
    live: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

pub struct PollLoop {
    controller: Arc<Controller>,
    aux_refresh: Duration,
    cycles: Arc<AtomicU64>,
    running: Option<Running>,
}

impl PollLoop {
    pub fn new(controller: Arc<Controller>, aux_refresh: Duration) -> Self {
        Self {
            controller,
            aux_refresh,
            cycles: Arc::new(AtomicU64::new(0)),
            running: None,
        }
    }

    /// Start polling every `period`. No-op while already running.
    pub fn start(&mut self, period: Duration) {
        if self.is_running() {
            debug!("Poll loop already running");
            return;
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let live = Arc::new(AtomicBool::new(true));
        let handle = tokio::spawn(run(
            self.controller.clone(),
            period,
            self.aux_refresh,
            self.cycles.clone(),
            live.clone(),
            stop_rx,
        ));

        info!(period_ms = period.as_millis() as u64, "Poll loop started");
        self.running = Some(Running { stop_tx, live, handle });
    }

    /// Stop polling and wait for the task to wind down. Idempotent.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };
        running.live.store(false, Ordering::SeqCst);
        let _ = running.stop_tx.send(true);
        if let Err(e) = running.handle.await {
            warn!(error = %e, "Poll task ended abnormally");
        }
        info!(cycles = self.cycles_completed(), "Poll loop stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|r| !r.handle.is_finished())
    }

    /// Cycles whose results were applied, across restarts.
    pub fn cycles_completed(&self) -> u64 {
        self.cycles.load(Ordering::SeqCst)
    }
}

impl Drop for PollLoop {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            running.live.store(false, Ordering::SeqCst);
            running.handle.abort();
        }
    }
}

async fn run(
    controller: Arc<Controller>,
    period: Duration,
    aux_refresh: Duration,
    cycles: Arc<AtomicU64>,
    live: Arc<AtomicBool>,
    mut stop_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_aux: Option<Instant> = None;

    loop {
        tokio::select! {
            _ = stop_rx.changed() => break,
            _ = ticker.tick() => {}
        }

        let Some(fetch) = controller.fetch_cycle().await else {
            continue;
        };
        let Some(outcome) = controller
            .apply_cycle(fetch, || live.load(Ordering::SeqCst))
            .await
        else {
            break;
        };
        cycles.fetch_add(1, Ordering::SeqCst);

        let aux_due = outcome.transition.is_some()
            || last_aux.map_or(true, |at| at.elapsed() >= aux_refresh);
        if aux_due && live.load(Ordering::SeqCst) {
            controller
                .refresh_aux_if(|| live.load(Ordering::SeqCst))
                .await;
            last_aux = Some(Instant::now());
        }
    }
}
