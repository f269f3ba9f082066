use {
    anyhow::Context as _,
    clap::Parser,
    portal_discord::PortalHandler,
    secrecy::ExposeSecret,
    serenity::all::Client,
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

/// Messages deleted later than this many cached messages ago lose their
/// last-known author; the relay then relies on correlation lookup misses.
const CACHED_MESSAGES: usize = 500;

#[derive(Parser)]
#[command(
    name = "portalbot",
    about = "Relays messages between grouped Discord channels"
)]
struct Cli {
    /// Path to a config file (defaults to standard discovery).
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, default_value_t = false)]
    json_logs: bool,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_telemetry(&cli);

    let config = match &cli.config {
        Some(path) => portal_config::load_config(path)?,
        None => portal_config::discover_and_load(),
    };

    if config.portals.is_empty() {
        anyhow::bail!("no portals configured; add [[portals]] entries to portalbot.toml");
    }
    let token = config
        .discord
        .token
        .as_ref()
        .context("no discord token configured; set [discord].token, e.g. \"${DISCORD_TOKEN}\"")?
        .expose_secret()
        .clone();

    info!(portals = config.portals.len(), "starting portal relay");

    let mut cache_settings = serenity::cache::Settings::default();
    cache_settings.max_messages = CACHED_MESSAGES;

    let mut client = Client::builder(&token, PortalHandler::intents())
        .event_handler(PortalHandler::new(config))
        .cache_settings(cache_settings)
        .await
        .context("failed to build discord client")?;

    client.start().await.context("discord gateway exited")?;
    Ok(())
}
