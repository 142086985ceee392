use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{ArgAction, Parser};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use departure_board::board::{Board, Partition, partition};
use departure_board::config::Configuration;
use departure_board::events::{FetchUpdate, PowerMode};
use departure_board::render::Composition;
use departure_board::service::ServiceRecord;
use departure_board::slot::UpdateSlot;
use departure_board::tasks::{blink, fetch::FetchPipeline, frame, schedule};

#[derive(Debug, Parser)]
#[command(
    name = "departure-board",
    version,
    about = "Animated public transport departure board"
)]
struct Args {
    /// Path to YAML config
    #[arg(value_name = "CONFIG")]
    config: PathBuf,
    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
    /// Fetch once, print the pinned and rotating services and exit
    #[arg(long = "fetch-once")]
    fetch_once: bool,
    /// Stop after this many frames
    #[arg(long = "frames", value_name = "N")]
    frames: Option<u64>,
}

fn default_filter(verbosity: u8) -> EnvFilter {
    match verbosity {
        0 => EnvFilter::new("info"),
        1 => EnvFilter::new("info,departure_board=debug"),
        _ => EnvFilter::new("info,departure_board=trace"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let Args {
        config,
        verbose,
        fetch_once,
        frames,
    } = Args::parse();

    // RUST_LOG wins over -v
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(verbose)))
        .with_target(false)
        .compact()
        .init();

    let cfg = Configuration::from_yaml_file(&config)
        .with_context(|| format!("failed to load configuration from {}", config.display()))?
        .validated()
        .context("invalid configuration values")?;
    tracing::debug!(
        "Loaded configuration from {}:\n{:#?}",
        config.display(),
        cfg
    );

    let feed = cfg.build_feed()?;

    if fetch_once {
        let pipeline = FetchPipeline::new(
            feed,
            cfg.fetch_options(),
            UpdateSlot::new(),
            CancellationToken::new(),
        );
        print_fetch(&cfg, pipeline.fetch_update().await);
        return Ok(());
    }

    let cancel = CancellationToken::new();

    // Ctrl-D/Ctrl-C stop the board
    if io::stdin().is_terminal() {
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || {
            let mut sink = Vec::new();
            match io::stdin().read_to_end(&mut sink) {
                Ok(_) => tracing::info!("stdin closed; initiating shutdown"),
                Err(err) => tracing::warn!("stdin watcher failed: {err}"),
            }
            cancel.cancel();
        });
    } else {
        tracing::debug!("stdin is not a terminal; skipping shutdown watcher");
    }

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!("ctrl-c handler failed: {err}");
                return;
            }
            tracing::info!("ctrl-c received; initiating shutdown");
            cancel.cancel();
        });
    }

    let updates = UpdateSlot::<FetchUpdate>::new();
    let pipeline = FetchPipeline::new(feed, cfg.fetch_options(), updates.clone(), cancel.child_token());
    pipeline.spawn_periodic();

    let (power_tx, power_rx) = mpsc::channel::<PowerMode>(4);
    let blink_state = blink::BlinkState::default();
    let mut tasks = JoinSet::new();

    tasks.spawn({
        let state = blink_state.clone();
        let period = cfg.blink_interval;
        let cancel = cancel.clone();
        async move {
            blink::run(state, period, cancel)
                .await
                .context("blink task failed")
        }
    });

    match cfg.energy_saver.clone().filter(|energy| energy.is_enabled()) {
        Some(energy) => {
            let cancel = cancel.clone();
            tasks.spawn(async move {
                schedule::run(energy, cancel, power_tx)
                    .await
                    .context("energy saver task failed")
            });
        }
        None => {
            tracing::debug!("energy saver disabled");
            drop(power_tx);
        }
    }

    let surface = Composition::new(cfg.display.width, cfg.display.height, cfg.display.mode);
    let mut board = Board::new(surface, pipeline.clone(), updates, cfg.board_options());

    // The frame loop owns the board on this task until it stops
    if let Err(err) = frame::run(
        &mut board,
        blink_state,
        power_rx,
        cfg.frame_options(frames),
        cancel.clone(),
    )
    .await
    .context("frame loop failed")
    {
        tracing::error!("{err:?}");
    }
    cancel.cancel();
    pipeline.shutdown().await;

    while let Some(res) = tasks.join_next().await {
        match res {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("task error: {e:?}"),
            Err(e) => tracing::error!("join error: {e}"),
        }
    }

    let surface = board.shutdown();
    tracing::info!(leftover_elements = surface.len(), "board released");
    Ok(())
}

fn print_fetch(cfg: &Configuration, update: FetchUpdate) {
    println!("# departures at {}", Utc::now().with_timezone(&cfg.timezone).to_rfc3339());
    let services = match update {
        FetchUpdate::Services(services) => services,
        FetchUpdate::Outage(outage) => {
            println!(
                "# outage: {} ({})",
                outage.kind.headline(),
                outage.detail.as_deref().unwrap_or("no detail")
            );
            return;
        }
    };
    if services.is_empty() {
        println!("(no services)");
        return;
    }

    let Partition { pinned, rotating } = partition(&services, cfg.pin_earliest);
    println!("# pinned:");
    match pinned {
        Some(service) => println!("  {}", describe(&service)),
        None => println!("  (none)"),
    }
    println!("\n# rotating:");
    if rotating.is_empty() {
        println!("  (none)");
    }
    for (idx, service) in rotating.iter().enumerate() {
        println!("  {:>3}: {}", idx + 1, describe(service));
    }
}

fn describe(service: &ServiceRecord) -> String {
    let mut line = format!(
        "{:<5} {:<24} {:>8}",
        service.line(),
        service.destination(),
        service.display().to_string().trim()
    );
    if !service.via().is_empty() {
        line.push_str(&format!("  via {}", service.via()));
    }
    line
}
