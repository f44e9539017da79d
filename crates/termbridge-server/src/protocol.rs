//! Wire-level envelope between the WebSocket peer and the PTY session.
//!
//! Inbound frames carry a small tagged JSON envelope; terminal output
//! goes back as raw binary frames with no envelope at all.

use serde::{Deserialize, Serialize};

/// Messages a client sends to drive the terminal.
#[derive(Debug, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "resize")]
    Resize { cols: u16, rows: u16 },

    #[serde(rename = "data")]
    Data { content: String },
}

/// JSON text frames the server sends to the client.
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Sent once after the session spawns so the client can label the tab.
    #[serde(rename = "terminalInfo")]
    TerminalInfo { hostname: String, cwd: String },
}

/// Best-effort decode of an inbound text frame.
///
/// Anything that is not a well-formed envelope — invalid JSON, an
/// unknown tag, missing or mistyped fields — is discarded: the caller
/// gets `None` and nothing is forwarded or surfaced to the peer.
pub fn decode(raw: &str) -> Option<ClientMessage> {
    match serde_json::from_str(raw) {
        Ok(msg) => Some(msg),
        Err(e) => {
            tracing::debug!(error = %e, "Discarding malformed message");
            None
        }
    }
}
