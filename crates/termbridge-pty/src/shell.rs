//! Shell detection and per-shell environment helpers.

/// Detect the user's default shell.
///
/// - On Unix: reads the `SHELL` environment variable, falling back to `/bin/sh`.
/// - On Windows: reads the `COMSPEC` environment variable, falling back to `cmd.exe`.
pub fn detect_shell() -> String {
    #[cfg(unix)]
    {
        std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string())
    }

    #[cfg(windows)]
    {
        std::env::var("COMSPEC").unwrap_or_else(|_| "cmd.exe".to_string())
    }

    #[cfg(not(any(unix, windows)))]
    {
        "/bin/sh".to_string()
    }
}

/// `PROMPT_COMMAND` value for shells that support it, or `None`.
///
/// bash and zsh get a prompt hook that emits an OSC 9;9 sequence with the
/// current working directory, so terminal clients can track the cwd as the
/// user moves around.
pub fn prompt_command(shell: &str) -> Option<&'static str> {
    if shell.ends_with("bash") || shell.ends_with("zsh") {
        Some(r#"printf "\033]9;9;%s\033\\" "${PWD}""#)
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
