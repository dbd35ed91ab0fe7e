//! PTY utilities for the hbui plugin console.
//!
//! Package manager commands are run attached to a pseudo-terminal so that
//! progress bars and colorized output look the same in the browser terminal
//! as they would in an interactive shell.
//!
//! # Platform Support
//!
//! - **Linux**: Full support via native PTY
//! - **macOS**: Full support via native PTY
//! - **Windows**: Support via ConPTY (Windows 10+)
//!
//! # Example
//!
//! ```ignore
//! use hbui_utils_pty::{command_builder, create_command_pty};
//!
//! let pair = create_command_pty()?;
//! let cmd = command_builder(&["npm".into(), "--version".into()], "/tmp".as_ref(), &[]);
//! let child = pair.slave.spawn_command(cmd)?;
//! ```

use std::path::Path;

// Re-export core types from portable-pty for convenient access
pub use portable_pty::{
    Child, ChildKiller, CommandBuilder, ExitStatus, MasterPty, PtyPair, PtySize, native_pty_system,
};

/// Terminal width used for package manager commands.
pub const COMMAND_COLS: u16 = 80;

/// Terminal height used for package manager commands.
pub const COMMAND_ROWS: u16 = 30;

/// Terminal type advertised to spawned commands.
pub const TERM_NAME: &str = "xterm-color";

/// PTY size used for package manager commands (80x30).
#[must_use]
pub fn command_pty_size() -> PtySize {
    PtySize {
        rows: COMMAND_ROWS,
        cols: COMMAND_COLS,
        pixel_width: 0,
        pixel_height: 0,
    }
}

/// Creates a new PTY pair with the fixed command size.
///
/// # Errors
///
/// Returns an error if the PTY cannot be created, which may happen if:
/// - The system doesn't support PTY operations
/// - Resource limits have been reached
pub fn create_command_pty() -> anyhow::Result<PtyPair> {
    open_pty(command_pty_size())
}

/// Creates a new PTY pair with custom size.
///
/// # Errors
///
/// Returns an error if the PTY cannot be created.
pub fn create_pty_pair_with_size(cols: u16, rows: u16) -> anyhow::Result<PtyPair> {
    open_pty(PtySize {
        rows,
        cols,
        pixel_width: 0,
        pixel_height: 0,
    })
}

fn open_pty(size: PtySize) -> anyhow::Result<PtyPair> {
    let (cols, rows) = (size.cols, size.rows);
    native_pty_system()
        .openpty(size)
        .map_err(|e| anyhow::anyhow!("Failed to open PTY with size {}x{}: {}", cols, rows, e))
}

/// Builds a PTY command from an argv vector.
///
/// The first element is the program, the rest are its arguments. The
/// command inherits the current environment, gets `TERM` set to
/// [`TERM_NAME`] and then every pair in `env` on top.
///
/// # Panics
///
/// Never panics; an empty `argv` produces a builder for the default shell.
#[must_use]
pub fn command_builder(argv: &[String], cwd: &Path, env: &[(String, String)]) -> CommandBuilder {
    let mut cmd = match argv.split_first() {
        Some((program, args)) => {
            let mut cmd = CommandBuilder::new(program);
            cmd.args(args);
            cmd
        }
        None => CommandBuilder::new_default_prog(),
    };

    cmd.cwd(cwd);
    cmd.env("TERM", TERM_NAME);
    for (key, value) in env {
        cmd.env(key, value);
    }
    cmd
}
