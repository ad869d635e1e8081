use clap::Parser;

/// Sidekick — an AI chat side panel, driven from the terminal.
#[derive(Parser, Debug)]
#[command(name = "sidekick", version, about)]
pub struct Args {
    /// Config file path override.
    #[arg(long)]
    pub config: Option<String>,

    /// Model override (e.g. gpt-4, code-davinci-002).
    #[arg(short = 'm', long)]
    pub model: Option<String>,

    /// Log level override (debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,
}

pub fn parse() -> Args {
    Args::parse()
}
