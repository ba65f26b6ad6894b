//! Shell-wide state owned by the REPL.
//!
//! Deliberately thin: the working directory lives in the host process (so
//! `cd` and `pwd` go through `std::env`), and the executable search path is
//! re-read from the environment on every lookup rather than cached here.

use crate::history::History;

/// State shared with builtin handlers.
pub struct ShellState {
    /// Set by `exit`/`quit`; the REPL stops before the next prompt.
    pub should_exit: bool,
    /// The command history, appended to before each line is dispatched.
    pub history: History,
}

impl ShellState {
    pub fn new() -> Self {
        ShellState {
            should_exit: false,
            history: History::new(),
        }
    }
}

impl Default for ShellState {
    fn default() -> Self {
        ShellState::new()
    }
}
