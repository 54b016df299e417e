//! AVIATOR: crash-game client
//!
//! Entry point. Loads configuration, initialises structured logging,
//! connects to the game server and keeps the local round and bet state in
//! sync by polling, while reading player commands from stdin.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use aviator::config;
use aviator::dashboard;
use aviator::engine::{Controller, PollLoop};
use aviator::remote::http::HttpGameClient;
use aviator::remote::RemoteStateClient;
use aviator::types::{CrashBand, Notification};

const BANNER: &str = r#"
    _ __     _____    _  _____ ___  ____
   / \\ \   / /_ _|  / \|_   _/ _ \|  _ \
  / _ \\ \ / / | |  / _ \ | || | | | |_) |
 / ___ \\ V /  | | / ___ \| || |_| |  _ <
/_/   \_\\_/  |___/_/   \_\_| \___/|_| \_\

  Crash-game client
  v0.1.0
"#;

const HELP: &str = "\
commands:
  join <name>            join the game
  bet [amount]           bet (default from config) while waiting
  cashout                cash out while flying
  status                 round and player summary
  bets                   open bets this round
  history                recent crash points
  beko                   buy Beko a ticket home
  load <player> <amount> top up a player's balance
  quit                   leave";

/// Env var naming an alternative config file.
const CONFIG_PATH_ENV: &str = "AVIATOR_CONFIG";

/// How often poll-driven notifications (crashes, round changes) are printed.
const NOTIFICATION_INTERVAL: Duration = Duration::from_millis(250);

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let config_path =
        std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| "config.toml".to_string());
    let cfg = config::AppConfig::load_or_default(&config_path)?;

    init_logging();

    println!("{BANNER}");

    // -- Initialise components -------------------------------------------

    let client = HttpGameClient::new(
        &cfg.server.base_url,
        Duration::from_millis(cfg.server.request_timeout_ms),
        cfg.poll.crash_history_len,
    )
    .context("Failed to build game server client")?;
    info!(
        server = client.name(),
        base_url = %cfg.server.base_url,
        period_ms = cfg.poll.period_ms,
        "AVIATOR starting up"
    );

    let controller = Arc::new(Controller::new(Arc::new(client)));
    info!(player_id = %controller.player_id(), "Client identity generated");

    if cfg.dashboard.enabled {
        dashboard::spawn_dashboard(controller.clone(), cfg.dashboard.port).await?;
    }

    let mut poller = PollLoop::new(controller.clone(), cfg.poll.aux_refresh());
    poller.start(cfg.poll.period());

    if let Some(name) = cfg.session.player_name.as_deref() {
        // Failure is already surfaced as a notification.
        let _ = controller.join(name).await;
    }

    // -- Command loop ----------------------------------------------------

    println!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut seen = 0u64;
    let mut notices = tokio::time::interval(NOTIFICATION_INTERVAL);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        info!("stdin closed.");
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to read command");
                        break;
                    }
                };
                if !run_command(&controller, &cfg, line.trim()).await {
                    break;
                }
                print_new_notifications(&controller, &mut seen).await;
            }
            _ = notices.tick() => {
                print_new_notifications(&controller, &mut seen).await;
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                break;
            }
        }
    }

    poller.stop().await;
    let player = controller.player().await;
    info!(
        player_id = %player.player_id,
        balance = format!("{:.2}", player.balance),
        cycles = poller.cycles_completed(),
        "AVIATOR shut down cleanly."
    );

    Ok(())
}

/// Execute one stdin command. Returns `false` when the user asked to quit.
async fn run_command(controller: &Controller, cfg: &config::AppConfig, line: &str) -> bool {
    let mut parts = line.split_whitespace();
    let Some(command) = parts.next() else {
        return true;
    };

    // Action failures are reported through notifications.
    match command {
        "join" => {
            let name = parts.collect::<Vec<_>>().join(" ");
            let _ = controller.join(&name).await;
        }
        "bet" => {
            let amount = match parts.next().map(str::parse::<Decimal>) {
                None => cfg.session.default_bet,
                Some(Ok(amount)) => amount,
                Some(Err(_)) => {
                    println!("usage: bet [amount]");
                    return true;
                }
            };
            let _ = controller.place_bet(amount).await;
        }
        "cashout" => {
            let _ = controller.cashout().await;
        }
        "status" => {
            match controller.round().await {
                Some(round) => println!("{round}"),
                None => println!("No round observed yet"),
            }
            println!("{}", controller.player().await);
            if let Some(win) = controller.view().await.potential_win {
                println!("Potential win: {win:.2}");
            }
        }
        "bets" => {
            let bets = controller.view().await.active_bets;
            if bets.is_empty() {
                println!("No open bets");
            }
            for bet in bets {
                println!("  {:<20} {:>10.2}", bet.player_name, bet.amount);
            }
        }
        "history" => {
            let line: Vec<String> = controller
                .view()
                .await
                .crash_history
                .iter()
                .map(|cp| format!("{cp:.2}x({:?})", CrashBand::of(*cp)))
                .collect();
            println!("{}", line.join("  "));
        }
        "beko" => {
            let _ = controller.bring_beko().await;
        }
        "load" => {
            let (Some(player), Some(Ok(amount))) =
                (parts.next(), parts.next().map(str::parse::<Decimal>))
            else {
                println!("usage: load <player> <amount>");
                return true;
            };
            let _ = controller.load_balance(player, amount).await;
        }
        "quit" | "exit" => return false,
        "help" => println!("{HELP}"),
        other => println!("unknown command: {other} (try `help`)"),
    }
    true
}

/// Print notifications posted after `seen` and advance it.
async fn print_new_notifications(controller: &Controller, seen: &mut u64) {
    for notification in controller.notifications_since(*seen).await {
        *seen = notification.id;
        print_notification(&notification);
    }
}

fn print_notification(notification: &Notification) {
    println!("{notification}");
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("aviator=info"));

    let json_logging = std::env::var("AVIATOR_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
