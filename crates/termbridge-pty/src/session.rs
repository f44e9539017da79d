//! PTY session: spawn a shell in a pseudo-terminal and mediate all I/O with it.
//!
//! A [`PtySession`] owns the master side of the PTY pair: a writer for
//! input, a child handle for lifecycle, and a background reader thread
//! that delivers output chunks over a tokio channel. The channel closing
//! is the end-of-stream signal for process exit.

use std::io::{Read, Write};
use std::path::PathBuf;
use std::thread;

use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use tokio::sync::mpsc;

use crate::error::PtyError;
use crate::shell::{detect_shell, prompt_command};

/// Default terminal columns.
pub const DEFAULT_COLS: u16 = 80;

/// Default terminal rows.
pub const DEFAULT_ROWS: u16 = 30;

/// Maximum bytes to read from the PTY in a single pass (8 KB).
const PTY_READ_CHUNK: usize = 8_192;

/// Output chunks buffered between the reader thread and the consumer.
const OUTPUT_CHANNEL_CAPACITY: usize = 256;

// =============================================================================
// SPAWN OPTIONS
// =============================================================================

/// Options for spawning a shell inside a PTY.
pub struct SpawnOptions {
    /// Shell executable to run.
    pub shell: String,
    /// Initial terminal columns.
    pub cols: u16,
    /// Initial terminal rows.
    pub rows: u16,
    /// Working directory for the shell. `None` inherits the server's cwd.
    pub cwd: Option<PathBuf>,
    /// Extra environment variables, applied on top of the inherited set.
    pub env: Vec<(String, String)>,
}

impl Default for SpawnOptions {
    /// Detected shell, 80x30, the user's home directory, no extra env.
    fn default() -> Self {
        Self {
            shell: detect_shell(),
            cols: DEFAULT_COLS,
            rows: DEFAULT_ROWS,
            cwd: dirs::home_dir(),
            env: Vec::new(),
        }
    }
}

// =============================================================================
// SESSION
// =============================================================================

/// A single shell process attached to a pseudo-terminal.
///
/// Owned exclusively by the bridge that spawned it. All operations stay
/// safe after the process has exited: writes fail with a recoverable
/// error and [`PtySession::kill`] is an idempotent no-op.
pub struct PtySession {
    /// Writer to send input bytes to the PTY.
    writer: Box<dyn Write + Send>,
    /// Master PTY handle (for resize).
    master: Box<dyn MasterPty + Send>,
    /// Child process handle (for wait / kill).
    child: Box<dyn Child + Send + Sync>,
    /// Last successfully applied terminal size.
    size: PtySize,
    /// Receiver for output chunks, taken once by the consumer.
    output_rx: Option<mpsc::Receiver<Vec<u8>>>,
    /// Set once `kill` has run.
    killed: bool,
}

impl PtySession {
    /// Spawn a shell inside a new PTY with the given options.
    ///
    /// Sets `TERM=xterm-256color` so the shell renders with full color
    /// support, and a cwd-reporting `PROMPT_COMMAND` for shells that
    /// honor it. A background thread reads output from the PTY and sends
    /// chunks over the session's output channel; the channel closes when
    /// the process exits.
    pub fn spawn(options: SpawnOptions) -> Result<Self, PtyError> {
        if options.cols == 0 || options.rows == 0 {
            return Err(PtyError::InvalidGeometry {
                cols: options.cols,
                rows: options.rows,
            });
        }

        let size = PtySize {
            rows: options.rows,
            cols: options.cols,
            pixel_width: 0,
            pixel_height: 0,
        };

        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(size)
            .map_err(|e| PtyError::Spawn(format!("failed to open PTY: {e}")))?;

        let mut cmd = CommandBuilder::new(&options.shell);
        cmd.env("TERM", "xterm-256color");
        if let Some(prompt) = prompt_command(&options.shell) {
            cmd.env("PROMPT_COMMAND", prompt);
        }
        for (key, val) in &options.env {
            cmd.env(key, val);
        }
        if let Some(cwd) = &options.cwd {
            cmd.cwd(cwd);
        }

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| PtyError::Spawn(format!("failed to spawn '{}': {e}", options.shell)))?;

        // Drop the slave side; only the master is needed from here on.
        drop(pair.slave);

        let writer = pair
            .master
            .take_writer()
            .map_err(|e| PtyError::Spawn(format!("failed to take PTY writer: {e}")))?;
        let mut reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| PtyError::Spawn(format!("failed to clone PTY reader: {e}")))?;

        let (tx, rx) = mpsc::channel::<Vec<u8>>(OUTPUT_CHANNEL_CAPACITY);

        thread::Builder::new()
            .name("pty-reader".to_string())
            .spawn(move || {
                let mut buf = [0u8; PTY_READ_CHUNK];
                loop {
                    match reader.read(&mut buf) {
                        Ok(0) => break, // EOF, shell exited
                        Ok(n) => {
                            if tx.blocking_send(buf[..n].to_vec()).is_err() {
                                break; // Receiver dropped
                            }
                        }
                        Err(e) => {
                            tracing::debug!("PTY reader error: {e}");
                            break;
                        }
                    }
                }
            })
            .map_err(|e| PtyError::Spawn(format!("failed to spawn PTY reader thread: {e}")))?;

        Ok(Self {
            writer,
            master: pair.master,
            child,
            size,
            output_rx: Some(rx),
            killed: false,
        })
    }

    /// Write raw input bytes to the PTY, verbatim.
    ///
    /// After the process has exited this fails with a recoverable I/O
    /// error; it never panics.
    pub fn write(&mut self, data: &[u8]) -> Result<(), PtyError> {
        self.writer.write_all(data)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Resize the PTY to new dimensions.
    ///
    /// Rejects zero cols or rows with [`PtyError::InvalidGeometry`] and
    /// keeps the last-known-good geometry. On success the recorded size
    /// reflects the applied values.
    pub fn resize(&mut self, cols: u16, rows: u16) -> Result<(), PtyError> {
        if cols == 0 || rows == 0 {
            return Err(PtyError::InvalidGeometry { cols, rows });
        }
        let new_size = PtySize {
            rows,
            cols,
            pixel_width: 0,
            pixel_height: 0,
        };
        self.master
            .resize(new_size)
            .map_err(|e| PtyError::Resize(e.to_string()))?;
        self.size = new_size;
        Ok(())
    }

    /// Take the output receiver. Returns `None` after the first call.
    ///
    /// The receiver yields output chunks in production order and closes
    /// when the process exits.
    pub fn take_output(&mut self) -> Option<mpsc::Receiver<Vec<u8>>> {
        self.output_rx.take()
    }

    /// Kill the shell process. Idempotent: killing an already-exited or
    /// already-killed session is a no-op.
    pub fn kill(&mut self) {
        if self.killed {
            return;
        }
        self.killed = true;

        if let Err(e) = self.child.kill() {
            tracing::debug!("PTY kill error (may already be dead): {e}");
        }
        // Reap the child so it does not linger as a zombie.
        if let Err(e) = self.child.wait() {
            tracing::debug!("PTY wait error: {e}");
        }
    }

    /// Last successfully applied terminal dimensions as `(cols, rows)`.
    pub fn size(&self) -> (u16, u16) {
        (self.size.cols, self.size.rows)
    }

    /// Exit code if the process has exited, `None` while it is running.
    pub fn try_wait(&mut self) -> Option<u32> {
        match self.child.try_wait() {
            Ok(Some(status)) => Some(status.exit_code()),
            _ => None,
        }
    }

    /// Whether the shell process is still running.
    pub fn is_alive(&mut self) -> bool {
        !self.killed && self.try_wait().is_none()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[cfg(unix)]
    fn spawn_sh(cols: u16, rows: u16) -> PtySession {
        PtySession::spawn(SpawnOptions {
            shell: "/bin/sh".to_string(),
            cols,
            rows,
            cwd: None,
            env: Vec::new(),
        })
        .expect("spawn /bin/sh")
    }

    #[cfg(unix)]
    async fn recv_until(
        rx: &mut mpsc::Receiver<Vec<u8>>,
        marker: &str,
        deadline: Duration,
    ) -> String {
        let mut output = String::new();
        let _ = tokio::time::timeout(deadline, async {
            while let Some(chunk) = rx.recv().await {
                output.push_str(&String::from_utf8_lossy(&chunk));
                if output.contains(marker) {
                    break;
                }
            }
        })
        .await;
        output
    }

    #[test]
    fn spawn_rejects_zero_geometry() {
        let result = PtySession::spawn(SpawnOptions {
            cols: 0,
            rows: 24,
            ..SpawnOptions::default()
        });
        assert!(matches!(
            result,
            Err(PtyError::InvalidGeometry { cols: 0, rows: 24 })
        ));
    }

    #[test]
    fn spawn_fails_for_missing_shell() {
        let result = PtySession::spawn(SpawnOptions {
            shell: "/nonexistent/shell-binary".to_string(),
            ..SpawnOptions::default()
        });
        assert!(matches!(result, Err(PtyError::Spawn(_))));
    }

    #[test]
    fn default_options_are_sane() {
        let opts = SpawnOptions::default();
        assert!(!opts.shell.is_empty());
        assert_eq!(opts.cols, DEFAULT_COLS);
        assert_eq!(opts.rows, DEFAULT_ROWS);
        assert!(opts.env.is_empty());
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn write_and_read_echo() {
        let mut session = spawn_sh(80, 24);
        let mut rx = session.take_output().expect("output receiver");

        session
            .write(b"echo BRIDGE_TEST_MARKER_12345\n")
            .expect("write");

        let output = recv_until(&mut rx, "BRIDGE_TEST_MARKER_12345", Duration::from_secs(5)).await;
        assert!(
            output.contains("BRIDGE_TEST_MARKER_12345"),
            "output should contain echo marker, got: {output}"
        );

        session.kill();
    }

    #[test]
    #[cfg(unix)]
    fn resize_updates_recorded_size() {
        let mut session = spawn_sh(80, 24);
        assert_eq!(session.size(), (80, 24));

        session.resize(120, 40).expect("resize");
        assert_eq!(session.size(), (120, 40));

        session.kill();
    }

    #[test]
    #[cfg(unix)]
    fn resize_rejects_zero_and_keeps_geometry() {
        let mut session = spawn_sh(100, 40);

        let result = session.resize(0, 40);
        assert!(matches!(result, Err(PtyError::InvalidGeometry { .. })));
        assert_eq!(session.size(), (100, 40));

        let result = session.resize(80, 0);
        assert!(matches!(result, Err(PtyError::InvalidGeometry { .. })));
        assert_eq!(session.size(), (100, 40));

        session.kill();
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn output_closes_after_exit() {
        let mut session = spawn_sh(80, 24);
        let mut rx = session.take_output().expect("output receiver");

        session.write(b"exit\n").expect("write exit");

        // Drain until the channel closes; end-of-stream is the exit signal.
        let closed = tokio::time::timeout(Duration::from_secs(5), async {
            while rx.recv().await.is_some() {}
        })
        .await;
        assert!(closed.is_ok(), "output channel should close after exit");

        session.kill();
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn kill_is_idempotent_and_write_after_kill_is_safe() {
        let mut session = spawn_sh(80, 24);
        let mut rx = session.take_output().expect("output receiver");

        session.kill();
        session.kill(); // second call must be a no-op

        // Wait for the reader to observe the dead process.
        let _ = tokio::time::timeout(Duration::from_secs(5), async {
            while rx.recv().await.is_some() {}
        })
        .await;

        assert!(!session.is_alive());

        // Write to a dead session must return, never panic.
        let _ = session.write(b"echo nope\n");
    }

    #[test]
    #[cfg(unix)]
    fn take_output_is_single_use() {
        let mut session = spawn_sh(80, 24);
        assert!(session.take_output().is_some());
        assert!(session.take_output().is_none());
        session.kill();
    }
}
