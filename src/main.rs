//! TRC binary: wire the engine together and run the chat loop.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use rustyline::DefaultEditor;
use tracing_subscriber::EnvFilter;

use trc::cli::{self, Repl, TerminalRenderer};
use trc::config::Config;
use trc::diag::DiagnosticLog;
use trc::llm::{Assistant, GeminiClient, GeminiConfig};
use trc::monitor::{ChannelAnalyzer, PassiveMonitor};
use trc::relay::{RelayDispatcher, RetryPolicy, Session};
use trc::store::HistoryStore;
use trc::transport::http::{HttpRelayConfig, HttpRelayTransport};

#[derive(Debug, Parser)]
#[command(name = "trc", version, about = "Multi-channel terminal relay chat")]
struct Cli {
    /// Relay base URL (overrides TRC_RELAY_URL).
    #[arg(long)]
    relay_url: Option<String>,

    /// Path to the local history database (overrides TRC_DB_PATH).
    #[arg(long)]
    db: Option<PathBuf>,

    /// Channel to join at startup (overrides TRC_DEFAULT_CHANNEL).
    #[arg(long)]
    channel: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("trc=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Cli::parse();
    let mut config = {
        let relay_override = args.relay_url.clone();
        Config::from_lookup(move |key| {
            if key == "TRC_RELAY_URL" {
                if let Some(url) = &relay_override {
                    return Some(url.clone());
                }
            }
            std::env::var(key).ok()
        })?
    };
    if let Some(db) = args.db {
        config.db_path = db;
    }
    if let Some(channel) = args.channel {
        config.default_channel = channel;
    }

    let store = HistoryStore::open(&config.db_path).await?;
    let diag = Arc::new(DiagnosticLog::new());
    let transport = Arc::new(HttpRelayTransport::new(HttpRelayConfig {
        base_url: config.relay_url.clone(),
        auth_token: config.relay_token.clone(),
        poll_wait: config.poll_wait,
    })?);
    let assistant = Arc::new(match &config.gemini_api_key {
        Some(key) => Assistant::new(GeminiClient::new(GeminiConfig::new(
            key,
            &config.gemini_model,
        ))),
        None => Assistant::offline(),
    });
    let renderer = Arc::new(TerminalRenderer);
    let monitor = PassiveMonitor::new(
        Arc::clone(&assistant) as Arc<dyn ChannelAnalyzer>,
        store.clone(),
        renderer.clone(),
        Arc::clone(&diag),
    );

    println!("Welcome to TRC!");
    if !assistant.is_enabled() {
        println!("(assistant offline: GEMINI_API_KEY not set)");
    }

    let mut editor = DefaultEditor::new()?;
    let username = cli::login(&mut editor, &store).await?;

    let dispatcher = Arc::new(RelayDispatcher::new(
        transport,
        store.clone(),
        Arc::clone(&diag),
        renderer,
        monitor,
        Session::new(username.clone(), config.default_channel.clone()),
        RetryPolicy::default(),
    ));

    println!("Joined as {username}. Type /help for commands.");
    if let Err(err) = dispatcher.join(&config.default_channel).await {
        // The stream is up even when the join announcement fails; warn
        // and keep going rather than refuse to start offline.
        println!("Warning: could not announce join to #{}: {err}", config.default_channel);
    }
    println!("Starting in #{}", dispatcher.focused().await);

    let mut repl = Repl::new(editor, dispatcher, store, diag, assistant);
    repl.run().await
}
