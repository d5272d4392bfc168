use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use pricewatch_bot::console::run_console;
use pricewatch_bot::{
    ConsoleNotifier, FanoutNotifier, JobScheduler, Notifier, PriceCheckWorker, PriceWatch,
    TickHandler, WebhookNotifier,
};
use pricewatch_core::{format_price, normalize_product_url, AppConfig, ChatId};
use pricewatch_scraper::{PriceFetcher, ShopifyClient};
use pricewatch_store::{JsonFilePersistence, StatePersistence, TrackingStore};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "pricewatch")]
#[command(about = "Track product prices and get alerted when they drop")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the bot, reading `[<chat_id>] <command>` lines from stdin (default)
    Run {
        /// Chat id for input lines without a leading id
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        chat_id: i64,
    },
    /// Fetch and print the current price of one product
    Check {
        /// Product page URL
        url: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = pricewatch_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Some(Commands::Check { url }) => check(&config, &url).await,
        Some(Commands::Run { chat_id }) => run(&config, ChatId(chat_id)).await,
        None => run(&config, ChatId(0)).await,
    }
}

async fn check(config: &AppConfig, raw_url: &str) -> anyhow::Result<()> {
    let url = normalize_product_url(raw_url)?;
    let client = ShopifyClient::new(config.request_timeout_secs, &config.user_agent)?;
    let price = client
        .fetch_price(&url)
        .await
        .with_context(|| format!("failed to fetch price for {url}"))?;
    println!("{url}: {}", format_price(price, &config.currency_symbol));
    Ok(())
}

async fn run(config: &AppConfig, default_chat_id: ChatId) -> anyhow::Result<()> {
    tracing::info!(env = %config.env, state_path = %config.state_path.display(), "starting pricewatch");

    let persistence = Arc::new(JsonFilePersistence::new(config.state_path.clone()));
    let store = Arc::new(
        TrackingStore::open(persistence as Arc<dyn StatePersistence>)
            .await
            .context("failed to load subscriber state")?,
    );
    let fetcher: Arc<dyn PriceFetcher> = Arc::new(ShopifyClient::new(
        config.request_timeout_secs,
        &config.user_agent,
    )?);
    let notifier = build_notifier(config)?;

    let worker = Arc::new(PriceCheckWorker::new(
        Arc::clone(&store),
        Arc::clone(&fetcher),
        notifier,
        config.request_timeout(),
        config.currency_symbol.clone(),
    ));
    let scheduler = JobScheduler::new(
        worker as Arc<dyn TickHandler>,
        config.check_interval(),
        config.first_check_delay(),
    );
    let watch = PriceWatch::new(
        store,
        scheduler.clone(),
        fetcher,
        config.request_timeout(),
        config.currency_symbol.clone(),
    );

    watch
        .restore_jobs(
            config.first_check_delay(),
            Duration::from_secs(config.startup_jitter_secs),
        )
        .await;

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let result = tokio::select! {
        result = run_console(&watch, stdin, tokio::io::stdout(), default_chat_id) => {
            // Jobs keep running without console input.
            if result.is_ok() {
                shutdown_signal().await;
            }
            result.context("console transport failed")
        }
        () = shutdown_signal() => Ok(()),
    };

    scheduler.shutdown();
    result
}

fn build_notifier(config: &AppConfig) -> anyhow::Result<Arc<dyn Notifier>> {
    let console: Arc<dyn Notifier> = Arc::new(ConsoleNotifier);
    let Some(webhook_url) = config.webhook_url.as_deref() else {
        return Ok(console);
    };
    let webhook = WebhookNotifier::new(webhook_url, config.request_timeout())
        .context("failed to build webhook notifier")?;
    tracing::info!("webhook notifications enabled");
    Ok(Arc::new(FanoutNotifier::new(vec![
        console,
        Arc::new(webhook),
    ])))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, stopping price-check jobs");
}
