use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use client_core::{
    load_settings,
    presentation::{render_dashboard, render_metric_cards},
    ActionOutcome, CallOrigin, ClientSettings, DashboardEvent, FleetApi, HttpFleetClient,
    RefreshController, RefreshPhase, RefreshSnapshot, RefreshTrigger, RowActionController,
    RowSnapshot,
};
use shared::domain::Metrics;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast::error::RecvError,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{parse_command, OperatorCommand, HELP};

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

#[derive(Parser, Debug)]
#[command(about = "Terminal dashboard for the fleet backend")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Live view: polls the backend and takes operator commands on stdin.
    Watch {
        #[arg(long)]
        interval_secs: Option<u64>,
    },
    /// Print the metric cards once.
    Metrics,
    /// Print the vehicle table once.
    Vehicles,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut settings = load_settings().context("failed to load dashboard settings")?;

    match cli.command.unwrap_or(Command::Watch {
        interval_secs: None,
    }) {
        Command::Watch { interval_secs } => {
            if let Some(secs) = interval_secs {
                settings.poll_interval = Duration::from_secs(secs.max(1));
            }
            watch(settings).await
        }
        Command::Metrics => {
            let api = HttpFleetClient::new(settings.base_url(CallOrigin::ServerSide));
            let metrics = api.fetch_metrics().await?;
            println!("{}", render_metric_cards(&metrics));
            Ok(())
        }
        Command::Vehicles => {
            let api = HttpFleetClient::new(settings.base_url(CallOrigin::ServerSide));
            let snapshot = RefreshSnapshot {
                vehicles: api.fetch_vehicles().await?,
                error: None,
                last_updated: Utc::now(),
                phase: RefreshPhase::Idle,
            };
            print!("{}", render_dashboard(None, &snapshot, &RowSnapshot::default()));
            Ok(())
        }
    }
}

async fn watch(settings: ClientSettings) -> Result<()> {
    let server_side = HttpFleetClient::new(settings.base_url(CallOrigin::ServerSide));
    let (metrics, vehicles) =
        futures::try_join!(server_side.fetch_metrics(), server_side.fetch_vehicles())
            .with_context(|| {
                format!(
                    "failed to load the fleet snapshot from {}",
                    server_side.base_url()
                )
            })?;
    info!(count = vehicles.len(), "dashboard: initial snapshot loaded");

    let api: Arc<dyn FleetApi> = Arc::new(HttpFleetClient::new(
        settings.base_url(CallOrigin::Interactive),
    ));
    let refresher =
        RefreshController::with_poll_interval(api.clone(), vehicles, settings.poll_interval);
    let rows = RowActionController::new(api, refresher.clone());
    let mut events = refresher.subscribe();
    refresher.start();

    let mut notice: Option<String> = None;
    redraw(&metrics, &refresher, &rows, notice.as_deref());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                match parse_command(&line) {
                    Ok(Some(OperatorCommand::Quit)) => break,
                    Ok(Some(OperatorCommand::Help)) => println!("{HELP}"),
                    Ok(Some(command)) => {
                        notice = None;
                        dispatch(&refresher, &rows, command);
                        redraw(&metrics, &refresher, &rows, notice.as_deref());
                    }
                    Ok(None) => {}
                    Err(err) => println!("{err}"),
                }
            }
            event = events.recv() => {
                match event {
                    Ok(DashboardEvent::ActionFailed { vehicle_id, message }) => {
                        notice = Some(format!("{vehicle_id}: {message}"));
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "dashboard: event stream lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
                redraw(&metrics, &refresher, &rows, notice.as_deref());
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    refresher.stop();
    info!("dashboard: stopped");
    Ok(())
}

/// Row actions and refreshes run on their own tasks so input stays live and
/// rows never wait on each other.
fn dispatch(
    refresher: &Arc<RefreshController>,
    rows: &Arc<RowActionController>,
    command: OperatorCommand,
) {
    match command {
        OperatorCommand::EditDraft { vehicle_id, text } => rows.update_draft(&vehicle_id, text),
        OperatorCommand::SetStatus { vehicle_id, status } => {
            let rows = rows.clone();
            tokio::spawn(async move {
                report_skip(rows.set_status(&vehicle_id, status).await);
            });
        }
        OperatorCommand::SaveDriver { vehicle_id } => {
            let rows = rows.clone();
            tokio::spawn(async move {
                report_skip(rows.save_driver(&vehicle_id).await);
            });
        }
        OperatorCommand::ClearDriver { vehicle_id } => {
            let rows = rows.clone();
            tokio::spawn(async move {
                report_skip(rows.clear_driver(&vehicle_id).await);
            });
        }
        OperatorCommand::Refresh => {
            let refresher = refresher.clone();
            tokio::spawn(async move {
                refresher.refresh(RefreshTrigger::Manual).await;
            });
        }
        OperatorCommand::Help | OperatorCommand::Quit => {}
    }
}

fn report_skip(outcome: ActionOutcome) {
    if let ActionOutcome::Skipped(reason) = outcome {
        info!(?reason, "dashboard: action skipped");
    }
}

fn redraw(
    metrics: &Metrics,
    refresher: &RefreshController,
    rows: &RowActionController,
    notice: Option<&str>,
) {
    let mut screen = String::from(CLEAR_SCREEN);
    screen.push_str(&render_dashboard(
        Some(metrics),
        &refresher.snapshot(),
        &rows.snapshot(),
    ));
    if let Some(notice) = notice {
        screen.push_str(&format!("! action failed: {notice}\n"));
    }
    screen.push_str("type 'help' for commands\n");
    print!("{screen}");
}
