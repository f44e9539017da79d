//! termbridge: WebSocket terminal bridge server.
//!
//! Accepts WebSocket connections on loopback and wires each one to its
//! own shell running in a pseudo-terminal. Keystrokes and resize events
//! flow in as JSON frames; raw terminal output flows back as binary.

mod bridge;
mod protocol;

use clap::Parser;
use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;

use crate::bridge::handle_connection;
use termbridge_pty::detect_shell;

#[derive(Parser)]
#[command(name = "termbridge", about = "WebSocket to PTY terminal bridge")]
struct Args {
    /// Port to listen on (loopback only).
    #[arg(short, long, default_value_t = 3022)]
    port: u16,

    /// Shell to run instead of the user's default.
    #[arg(long)]
    shell: Option<String>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "termbridge=info".into()),
        )
        .init();

    let args = Args::parse();
    let shell = args.shell.unwrap_or_else(detect_shell);

    let addr = format!("127.0.0.1:{}", args.port);
    let listener = TcpListener::bind(&addr)
        .await
        .expect("Failed to bind TCP listener");

    tracing::info!(%addr, shell = %shell, "termbridge listening for WS connections");

    // Accept loop: one independent bridge task per connection.
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let shell = shell.clone();
                tokio::spawn(async move {
                    match accept_async(stream).await {
                        Ok(ws) => handle_connection(ws, peer, shell).await,
                        Err(e) => {
                            tracing::warn!(peer = %peer, error = %e, "WS handshake failed");
                        }
                    }
                });
            }
            Err(e) => {
                tracing::warn!(error = %e, "TCP accept error");
            }
        }
    }
}
