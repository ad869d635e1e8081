mod cli;

use std::path::Path;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use sidekick_panel::{
    ConversationSession, PanelBridge, PanelCommand, PanelDispatcher, PanelHost, SettingsTarget,
};

/// Terminal host: prints events as JSON lines and declines the
/// interactive choices a real surface would render as dialogs.
struct TerminalHost;

#[async_trait::async_trait]
impl PanelHost for TerminalHost {
    fn open_settings(&self, target: SettingsTarget) {
        tracing::info!("settings requested: {target:?} (edit the config file)");
    }
}

#[tokio::main]
async fn main() {
    let args = cli::parse();

    // Initialize logging
    let log_directive = args.log_level.as_deref().unwrap_or("sidekick=info");
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(
                log_directive
                    .parse()
                    .unwrap_or_else(|_| "sidekick=info".parse().unwrap()),
            ),
        )
        .init();

    tracing::info!("Sidekick v{} starting...", env!("CARGO_PKG_VERSION"));

    // Load config
    let mut config = match &args.config {
        Some(path) => sidekick_config::load_from_path(Path::new(path)),
        None => sidekick_config::load_config(),
    }
    .unwrap_or_else(|e| {
        tracing::warn!("config load failed, using defaults: {e}");
        sidekick_config::SidekickConfig::default()
    });

    if let Some(model) = &args.model {
        config.model.name = model.clone();
    }
    tracing::info!("using model {}", config.model.name);

    // Wire the panel: events go to stdout as JSON lines.
    let bridge = Arc::new(PanelBridge::new());
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    bridge.attach(event_tx);
    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => println!("{json}"),
                Err(e) => tracing::warn!("failed to encode event: {e}"),
            }
        }
    });

    let session = Arc::new(ConversationSession::new(
        (&config).into(),
        bridge,
        Arc::new(TerminalHost),
    ));
    let dispatcher = PanelDispatcher::new(session);

    // Stdin loop: slash commands map to control commands, JSON lines are
    // raw protocol commands, anything else is a free-text question.
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match line {
            "/quit" | "/exit" => break,
            "/stop" => dispatcher.handle(PanelCommand::StopGenerating),
            "/clear" => dispatcher.handle(PanelCommand::ClearConversation),
            "/login" => dispatcher.handle(PanelCommand::Login),
            raw if raw.starts_with('{') => dispatcher.handle_raw(raw),
            question => dispatcher.handle(PanelCommand::AddFreeTextQuestion {
                value: question.to_string(),
            }),
        }
    }

    tracing::info!("Sidekick shutting down");
}
