//! PTY session management using the `portable-pty` crate.
//!
//! Provides [`PtySession`] for spawning a shell inside a pseudo-terminal,
//! writing input, consuming output, resizing, and lifecycle management.
//! Output is delivered as byte chunks over a tokio channel so async
//! consumers can forward it without polling.

mod error;
mod session;
mod shell;

pub use error::PtyError;
pub use session::{PtySession, SpawnOptions, DEFAULT_COLS, DEFAULT_ROWS};
pub use shell::{detect_shell, prompt_command};
