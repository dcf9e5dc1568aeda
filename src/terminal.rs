use std::io::{self, IsTerminal};

/// Reports terminal capabilities of the process output streams.
pub trait TerminalClient {
    /// Returns whether stdout is attached to a terminal.
    fn stdout_is_terminal(&self) -> bool;

    /// Returns whether stderr is attached to a terminal.
    fn stderr_is_terminal(&self) -> bool;
}

/// Terminal client backed by the real process streams.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTerminalClient;

impl TerminalClient for SystemTerminalClient {
    fn stdout_is_terminal(&self) -> bool {
        io::stdout().is_terminal()
    }

    fn stderr_is_terminal(&self) -> bool {
        io::stderr().is_terminal()
    }
}
