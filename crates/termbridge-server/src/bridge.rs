//! Per-connection bridge: one WebSocket peer wired to one PTY session.
//!
//! Each accepted connection gets its own shell process. Decoded peer
//! messages flow into the PTY in receipt order; PTY output flows back
//! as raw binary frames in production order. When either side ends,
//! the other is torn down, and teardown is idempotent.

use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use termbridge_pty::{PtySession, SpawnOptions};

use crate::protocol::{decode, ClientMessage, ServerMessage};

/// Control frames (pongs) queued behind PTY output.
const OUTBOUND_CHANNEL_CAPACITY: usize = 32;

/// Handle a single WebSocket terminal connection.
///
/// Spawns a PTY session with the default 80x30 geometry, forwards peer
/// input into it, and pumps its output back until one side closes.
pub async fn handle_connection(
    ws: WebSocketStream<TcpStream>,
    addr: SocketAddr,
    shell: String,
) {
    let (mut sink, mut stream) = ws.split();

    let options = SpawnOptions {
        shell,
        ..SpawnOptions::default()
    };
    let cwd = options.cwd.clone();

    // A connection whose shell cannot start is released, not left dangling.
    let mut session = match PtySession::spawn(options) {
        Ok(session) => session,
        Err(e) => {
            tracing::error!(peer = %addr, error = %e, "Failed to start PTY session");
            let _ = sink.send(Message::Close(None)).await;
            return;
        }
    };
    let mut output_rx = session.take_output().expect("output taken once per spawn");

    tracing::info!(peer = %addr, "Terminal session started");

    // Initial terminal info frame, best effort.
    let info = ServerMessage::TerminalInfo {
        hostname: std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string()),
        cwd: cwd.map(|p| p.display().to_string()).unwrap_or_default(),
    };
    let json = serde_json::to_string(&info).unwrap();
    let _ = sink.send(Message::Text(json.into())).await;

    let (out_tx, mut out_rx) = mpsc::channel::<Message>(OUTBOUND_CHANNEL_CAPACITY);

    // Outbound pump: PTY output and queued control frames → peer.
    // End-of-stream on the PTY side means the shell exited; close the
    // connection rather than leave the peer attached to a dead shell.
    let pump = tokio::spawn(async move {
        loop {
            tokio::select! {
                chunk = output_rx.recv() => match chunk {
                    Some(bytes) => {
                        if sink.send(Message::Binary(bytes.into())).await.is_err() {
                            break; // Peer gone; remaining output is dropped.
                        }
                    }
                    None => {
                        let _ = sink.send(Message::Close(None)).await;
                        break;
                    }
                },
                frame = out_rx.recv() => match frame {
                    Some(msg) => {
                        if sink.send(msg).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                },
            }
        }
    });

    // Inbound loop: decoded peer messages → PTY, in receipt order.
    // Resize and write failures are expected races against teardown and
    // are swallowed; malformed frames were already discarded by decode.
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => match decode(&text) {
                Some(ClientMessage::Resize { cols, rows }) => {
                    if let Err(e) = session.resize(cols, rows) {
                        tracing::debug!(peer = %addr, error = %e, "Resize discarded");
                    }
                }
                Some(ClientMessage::Data { content }) => {
                    if let Err(e) = session.write(content.as_bytes()) {
                        tracing::debug!(peer = %addr, error = %e, "Write to dead PTY ignored");
                    }
                }
                None => {}
            },
            Ok(Message::Ping(data)) => {
                let _ = out_tx.send(Message::Pong(data)).await;
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(peer = %addr, error = %e, "WS error");
                break;
            }
        }
    }

    // Teardown: kill at most once, then let the pump drain out.
    session.kill();
    drop(out_tx);
    let _ = pump.await;

    tracing::info!(peer = %addr, "Terminal session closed");
}

// =============================================================================
// TESTS
// =============================================================================
