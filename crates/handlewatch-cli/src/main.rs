use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod config;

use handlewatch_channels::telegram::{self, TelegramBot, TelegramNotifier};
use handlewatch_channels::ChannelBot;
use handlewatch_probe::{build_chain, Classifier};
use handlewatch_schema::Target;
use handlewatch_scheduler::{
    invert_watchlists, JsonWatchRegistry, Monitor, StatusBook, StatusFile, WatchRegistry,
    WatchlistFile,
};

use crate::config::{ensure_skeleton_config, load_config, validate_config, AppConfig};

#[derive(Parser)]
#[command(name = "handlewatch", version, about = "Instagram handle status watcher")]
struct Cli {
    #[arg(
        long,
        default_value = "~/.handlewatch",
        help = "Config root directory (contains config/, data/ and logs/)"
    )]
    config_root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Run the telegram bot, the monitor and the health server")]
    Start,
    #[command(about = "Classify one username through the probe chain and exit")]
    Check {
        #[arg(help = "Instagram username")]
        target: String,
    },
    #[command(about = "Validate config/main.yaml")]
    Validate,
    #[command(about = "Print every watchlist with the stored status")]
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli = Cli::parse();

    if cli.config_root.starts_with("~") {
        if let Some(home) = std::env::var_os("HOME") {
            cli.config_root = PathBuf::from(home).join(
                cli.config_root
                    .strip_prefix("~")
                    .unwrap_or(&cli.config_root),
            );
        }
    }

    let log_dir = cli.config_root.join("logs");
    std::fs::create_dir_all(&log_dir)?;
    let file_appender = tracing_appender::rolling::daily(&log_dir, "handlewatch.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking),
        )
        .init();

    match cli.command {
        Commands::Start => {
            if ensure_skeleton_config(&cli.config_root)? {
                eprintln!(
                    "  Wrote default config to {}",
                    cli.config_root.join(config::MAIN_CONFIG).display()
                );
            }
            start(&cli.config_root).await?;
        }
        Commands::Check { target } => {
            let config = load_valid_config(&cli.config_root)?;
            let target = Target::parse(&target)?;
            let chain = build_chain(&config.probes, config.monitor.probe_timeout())?;
            let observation = chain.classify(&target).await;
            println!("🔎 {target} → {observation}");
        }
        Commands::Validate => {
            let config = load_valid_config(&cli.config_root)?;
            let kinds: Vec<&str> = config.probes.iter().map(|probe| probe.kind()).collect();
            println!(
                "Config valid. Probes: {}. Cycle every {} min, {} s between checks.",
                kinds.join(" → "),
                config.monitor.interval_minutes,
                config.monitor.pacing_secs
            );
        }
        Commands::List => {
            let config = load_valid_config(&cli.config_root)?;
            print_watchlists(&config.data_dir(&cli.config_root)).await?;
        }
    }

    Ok(())
}

fn load_valid_config(root: &Path) -> Result<AppConfig> {
    let config = load_config(root)?;
    validate_config(&config)?;
    Ok(config)
}

fn open_stores(data_dir: &Path) -> Result<(StatusBook, JsonWatchRegistry)> {
    let book = StatusBook::open(StatusFile::new(data_dir))
        .with_context(|| format!("failed to open status store in {}", data_dir.display()))?;
    let registry = JsonWatchRegistry::open(WatchlistFile::new(data_dir))
        .with_context(|| format!("failed to open watchlists in {}", data_dir.display()))?;
    Ok((book, registry))
}

async fn print_watchlists(data_dir: &Path) -> Result<()> {
    let (book, registry) = open_stores(data_dir)?;
    let watchlists = registry.get_all().await;
    if watchlists.is_empty() {
        println!("No watchlists.");
        return Ok(());
    }

    for (subscriber, targets) in &watchlists {
        println!("{subscriber}:");
        for target in targets {
            let status = match book.get(target).await {
                Some(record) if record.pending != record.confirmed => format!(
                    "{} (seen once: {})",
                    record.confirmed.label(),
                    record.pending.label()
                ),
                Some(record) => record.confirmed.label().to_string(),
                None => "not checked yet".to_string(),
            };
            println!("  {target}  {status}");
        }
    }
    println!(
        "{} subscriber(s), {} distinct target(s)",
        watchlists.len(),
        invert_watchlists(&watchlists).len()
    );
    Ok(())
}

async fn start(root: &Path) -> Result<()> {
    let config = load_valid_config(root)?;
    if !config.telegram.enabled {
        bail!("telegram is disabled; alerts have nowhere to go");
    }
    if config.telegram.token.is_empty() {
        bail!("telegram token is empty (set BOT_TOKEN or telegram.token)");
    }

    let data_dir = config.data_dir(root);
    let (book, registry) = open_stores(&data_dir)?;
    let chain = build_chain(&config.probes, config.monitor.probe_timeout())?;
    tracing::info!(
        probes = ?chain.names(),
        data_dir = %data_dir.display(),
        "probe chain ready"
    );

    let bot = telegram::client(&config.telegram.token);
    let monitor = Arc::new(Monitor::new(
        Arc::new(registry),
        Arc::new(chain),
        Arc::new(book),
        Arc::new(TelegramNotifier::new(bot.clone())),
        config.monitor.clone(),
    ));

    let runner = Arc::clone(&monitor);
    tokio::spawn(async move {
        runner.run().await;
    });

    if config.server.enabled {
        let http_state = handlewatch_server::AppState::new(Arc::clone(&monitor));
        let http_addr = config.server.addr();
        tokio::spawn(async move {
            if let Err(err) = handlewatch_server::serve(http_state, &http_addr).await {
                tracing::error!("health server exited with error: {err}");
            }
        });
    }

    let bot: Box<dyn ChannelBot> = Box::new(TelegramBot::new(bot, monitor));
    tracing::info!("Starting {} bot", bot.channel_type());

    tokio::select! {
        result = bot.run() => result?,
        _ = shutdown_signal() => tracing::info!("Goodbye."),
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => tracing::info!("Received SIGINT, shutting down..."),
                    _ = sigterm.recv() => tracing::info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(err) => {
                tracing::warn!("failed to install SIGTERM handler: {err}");
                ctrl_c.await.ok();
                tracing::info!("Received SIGINT, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        tracing::info!("Received SIGINT, shutting down...");
    }
}
