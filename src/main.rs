use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use picture_verse::config::Configuration;
use picture_verse::events::{Inbound, Request, View};
use picture_verse::sequencer::{Sequencer, WallClock};
use picture_verse::slide_order::simulate_order;
use picture_verse::tasks;

#[derive(Debug, Parser)]
#[command(
    name = "picture-verse",
    version,
    about = "hourly verse, camera, and family photo display"
)]
struct Args {
    /// Path to YAML config
    #[arg(value_name = "CONFIG", default_value = "config.yaml")]
    config: PathBuf,
    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
    /// Deterministic RNG seed for family shuffling (overrides shuffle-seed)
    #[arg(long = "seed", value_name = "SEED")]
    seed: Option<u64>,
    /// Print the first N family slide indices without starting the display
    #[arg(long = "dry-run", value_name = "ITERATIONS")]
    dry_run: Option<usize>,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let Args {
        config,
        verbose,
        seed,
        dry_run,
    } = Args::parse();
    init_tracing(verbose);

    let mut cfg = Configuration::from_yaml_file(&config)
        .with_context(|| format!("failed to load configuration from {}", config.display()))?
        .validated()
        .context("invalid configuration values")?;
    if seed.is_some() {
        cfg.shuffle_seed = seed;
    }
    tracing::debug!("Loaded configuration from {}:\n{:#?}", config.display(), cfg);

    if let Some(iterations) = dry_run {
        return run_dry_run(&cfg, iterations);
    }

    let clock = WallClock::new(cfg.timezone);
    let (inbound_tx, inbound_rx) = mpsc::channel::<Inbound>(64); // collaborators -> sequencer
    let (request_tx, _) = broadcast::channel::<Request>(16); // sequencer -> collaborators
    let (view_tx, view_rx) = mpsc::channel::<View>(16); // sequencer -> display

    let cancel = CancellationToken::new();
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

    let mut tasks = JoinSet::new();

    // Collaborators subscribe before the sequencer emits its startup requests.
    tasks.spawn({
        let cfg = cfg.verse.clone();
        let to_sequencer = inbound_tx.clone();
        let requests = request_tx.subscribe();
        let cancel = cancel.clone();
        async move {
            tasks::verse::run(cfg, to_sequencer, requests, cancel)
                .await
                .context("verse task failed")
        }
    });

    tasks.spawn({
        let cfg = cfg.library.clone();
        let to_sequencer = inbound_tx.clone();
        let requests = request_tx.subscribe();
        let cancel = cancel.clone();
        async move {
            tasks::library::run(cfg, to_sequencer, requests, cancel)
                .await
                .context("library task failed")
        }
    });

    if cfg.show_camera || cfg.prioritize_motion_clips {
        tasks.spawn({
            let cfg = cfg.camera.clone();
            let to_sequencer = inbound_tx.clone();
            let requests = request_tx.subscribe();
            let cancel = cancel.clone();
            async move {
                tasks::camera::run(cfg, clock, to_sequencer, requests, cancel)
                    .await
                    .context("camera task failed")
            }
        });
    }

    tasks.spawn({
        let render = cfg.render.clone();
        let feedback = inbound_tx.clone();
        let cancel = cancel.clone();
        async move {
            tasks::display::run(render, view_rx, feedback, cancel)
                .await
                .context("display task failed")
        }
    });
    drop(inbound_tx);

    tasks.spawn({
        let sequencer = Sequencer::new(cfg.sequencer_options(), clock.now());
        let channels = tasks::sequencer::Channels {
            inbound: inbound_rx,
            requests: request_tx,
            views: view_tx,
        };
        let clock_poll = cfg.clock_poll_interval;
        let cancel = cancel.clone();
        async move {
            tasks::sequencer::run(sequencer, clock, clock_poll, channels, cancel)
                .await
                .context("sequencer task failed")
        }
    });

    // The first task to finish takes the rest down with it.
    if let Some(res) = tasks.join_next().await {
        log_exit(res);
    }
    cancel.cancel();
    while let Some(res) = tasks.join_next().await {
        log_exit(res);
    }
    Ok(())
}

fn log_exit(res: Result<Result<()>, tokio::task::JoinError>) {
    match res {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!("task error: {e:?}"),
        Err(e) => tracing::error!("join error: {e}"),
    }
}

fn run_dry_run(cfg: &Configuration, iterations: usize) -> Result<()> {
    let photos = tasks::library::scan_family(&cfg.library.pictures_dir).with_context(|| {
        format!(
            "failed to scan pictures in {}",
            cfg.library.pictures_dir.display()
        )
    })?;

    println!(
        "# family order dry run\n# photos: {}\n# ordering: {:?}\n# iterations: {}\n# seed: {}\n",
        photos.len(),
        cfg.ordering,
        iterations,
        cfg.shuffle_seed
            .map_or_else(|| "(random)".to_string(), |s| s.to_string())
    );

    if photos.is_empty() {
        println!(
            "(no photos discovered under {})",
            cfg.library.pictures_dir.display()
        );
        return Ok(());
    }

    let plan = simulate_order(photos.len(), cfg.ordering, cfg.shuffle_seed, iterations);
    println!("# planned order:");
    for (step, idx) in plan.iter().enumerate() {
        println!("  {:>4}: [{idx}] {}", step + 1, photos[*idx].display());
    }
    Ok(())
}
