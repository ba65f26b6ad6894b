//! A small interactive POSIX-flavored shell.
//!
//! One line of input flows through three tightly coupled subsystems: the
//! [`lexer`] applies the quoting and escape rules, the [`parser`] plans the
//! token sequence into pipeline stages with their redirections, and the
//! execution side (builtin registry, external runner, pipeline engine)
//! turns each stage into in-process work or child processes with the right
//! file descriptors. A raw-mode line editor supplies history browsing and
//! tab completion at the prompt.
//!
//! The crate is a library plus a thin binary; [`Repl`] is the top-level
//! entry point.

mod builtin;
mod completion;
mod editor;
mod external;
mod interpreter;
pub mod history;
pub mod lexer;
pub mod parser;
mod pipeline;
mod state;

pub use interpreter::Repl;
