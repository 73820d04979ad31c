use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio::net::UnixListener;
use tokio::signal;
use tracing::{error, info};

use zygate_companion::serve_connection;
use zygate_config::logging::{init_logging, LogLevel};

#[derive(Parser)]
#[command(name = "zygated")]
#[command(version, about = "Zygate companion daemon", long_about = None)]
struct Cli {
    /// Unix socket the hook connects to
    #[arg(long, env = "ZYGATE_SOCKET", default_value = "/tmp/zygate.sock")]
    socket: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the companion (default)
    Start,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging(LogLevel::Info);

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Start) {
        Commands::Start => start_companion(cli.socket).await?,
    }

    Ok(())
}

async fn start_companion(socket_path: PathBuf) -> Result<()> {
    info!(component = "COMPANION", "zygated: starting");

    if socket_path.exists() {
        tokio::fs::remove_file(&socket_path).await?;
    }

    let listener = UnixListener::bind(&socket_path)?;
    info!(component = "COMPANION", socket = %socket_path.display(), "zygated: listening");

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, _addr)) => {
                        // One task per specialization event; events share no
                        // mutable state.
                        tokio::spawn(async move {
                            let mut stream = stream;
                            serve_connection(&mut stream).await;
                        });
                    }
                    Err(err) => {
                        error!(component = "COMPANION", %err, "zygated: accept error");
                    }
                }
            }
            _ = signal::ctrl_c() => {
                info!(component = "COMPANION", "zygated: shutdown signal received");
                break;
            }
        }
    }

    if socket_path.exists() {
        tokio::fs::remove_file(&socket_path).await?;
    }

    Ok(())
}
