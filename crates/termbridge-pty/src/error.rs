//! PTY error types.

/// Errors originating from PTY operations.
#[derive(Debug, thiserror::Error)]
pub enum PtyError {
    #[error("failed to spawn shell: {0}")]
    Spawn(String),

    #[error("invalid terminal geometry: {cols}x{rows}")]
    InvalidGeometry { cols: u16, rows: u16 },

    #[error("failed to resize PTY: {0}")]
    Resize(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
