//! Built-in commands and their dispatch table.
//!
//! Builtins execute in-process. Each handler receives its argument vector
//! and explicit stream parameters supplied by the caller; handlers never
//! touch the process-global streams, so redirection and pipelining are a
//! matter of which sinks the caller passes in.

use crate::external;
use crate::history;
use crate::state::ShellState;
use anyhow::Result;
use argh::{EarlyExit, FromArgs};
use std::io::{Read, Write};
use std::path::Path;

/// Conventional exit code: 0 for success, non-zero for failure.
pub type ExitCode = i32;

/// Every name `type` reports as a shell builtin. Matched case-sensitively
/// there, unlike dispatch, which lowercases first.
pub const BUILTIN_NAMES: &[&str] = &["cd", "echo", "exit", "history", "pwd", "quit", "type"];

/// A command implemented inside the shell process.
pub trait Builtin {
    /// Canonical lowercase name of the command.
    fn name(&self) -> &'static str;

    /// Alternate lowercase names that dispatch to this command.
    fn aliases(&self) -> &'static [&'static str] {
        &[]
    }

    /// Execute with the given arguments (argv minus the command name) and
    /// streams. Implementations write their own diagnostics to `stderr`
    /// and reserve `Err` for stream failures.
    fn execute(
        &self,
        args: &[String],
        stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        state: &mut ShellState,
    ) -> Result<ExitCode>;
}

/// The dispatch table: lowercased command name to handler.
pub struct Registry {
    commands: Vec<Box<dyn Builtin>>,
}

impl Registry {
    pub fn new() -> Self {
        Registry {
            commands: vec![
                Box::new(Echo),
                Box::new(Exit),
                Box::new(TypeCmd),
                Box::new(Pwd),
                Box::new(Cd),
                Box::new(HistoryCmd),
            ],
        }
    }

    /// Look up a handler by its lowercased name.
    pub fn lookup(&self, name: &str) -> Option<&dyn Builtin> {
        self.commands
            .iter()
            .find(|command| command.name() == name || command.aliases().contains(&name))
            .map(|command| &**command)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Registry::new()
    }
}

/// `echo`: the space-joined arguments followed by a newline. No options;
/// every argument is printed as-is.
struct Echo;

impl Builtin for Echo {
    fn name(&self) -> &'static str {
        "echo"
    }

    fn execute(
        &self,
        args: &[String],
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        _state: &mut ShellState,
    ) -> Result<ExitCode> {
        writeln!(stdout, "{}", args.join(" "))?;
        Ok(0)
    }
}

/// `exit` / `quit`: raise the REPL's exit flag. Arguments are ignored.
struct Exit;

impl Builtin for Exit {
    fn name(&self) -> &'static str {
        "exit"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["quit"]
    }

    fn execute(
        &self,
        _args: &[String],
        _stdin: &mut dyn Read,
        _stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        state: &mut ShellState,
    ) -> Result<ExitCode> {
        state.should_exit = true;
        Ok(0)
    }
}

/// `pwd`: the current working directory of the shell process.
struct Pwd;

impl Builtin for Pwd {
    fn name(&self) -> &'static str {
        "pwd"
    }

    fn execute(
        &self,
        _args: &[String],
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        _state: &mut ShellState,
    ) -> Result<ExitCode> {
        let dir = std::env::current_dir()?;
        writeln!(stdout, "{}", dir.display())?;
        Ok(0)
    }
}

/// `cd`: change the process working directory. Arguments are joined with
/// single spaces to form the path; a lone `~` is replaced by `$HOME` when
/// set. On failure the directory is unchanged.
struct Cd;

impl Builtin for Cd {
    fn name(&self) -> &'static str {
        "cd"
    }

    fn execute(
        &self,
        args: &[String],
        _stdin: &mut dyn Read,
        _stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        _state: &mut ShellState,
    ) -> Result<ExitCode> {
        let mut path = args.join(" ");
        if path == "~" {
            if let Ok(home) = std::env::var("HOME") {
                path = home;
            }
        }
        match std::env::set_current_dir(&path) {
            Ok(()) => Ok(0),
            Err(_) => {
                writeln!(stderr, "cd: {}: No such file or directory", path)?;
                Ok(1)
            }
        }
    }
}

/// `type`: report whether the first argument is a shell builtin, an
/// executable on PATH, or nothing. All output goes to stdout so it can be
/// captured with `>`.
struct TypeCmd;

impl Builtin for TypeCmd {
    fn name(&self) -> &'static str {
        "type"
    }

    fn execute(
        &self,
        args: &[String],
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        _state: &mut ShellState,
    ) -> Result<ExitCode> {
        let Some(name) = args.first() else {
            return Ok(0);
        };
        if BUILTIN_NAMES.contains(&name.as_str()) {
            writeln!(stdout, "{} is a shell builtin", name)?;
        } else if let Some(path) = external::find_executable(name) {
            writeln!(stdout, "{} is {}", name, path.display())?;
        } else {
            writeln!(stdout, "{}: not found", name)?;
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Display the command history or move it between the shell and files.
struct HistoryArgs {
    /// append the non-blank lines of a file to the history
    #[argh(option, short = 'r', arg_name = "file")]
    read: Option<String>,

    /// write the whole history to a file, replacing its contents
    #[argh(option, short = 'w', arg_name = "file")]
    write: Option<String>,

    /// append the entries recorded since the last write to a file
    #[argh(option, short = 'a', arg_name = "file")]
    append: Option<String>,

    /// show only the last COUNT entries
    #[argh(positional)]
    count: Option<usize>,
}

/// `history`: list entries with their 1-based indices, or move history to
/// and from plain-text files.
struct HistoryCmd;

impl Builtin for HistoryCmd {
    fn name(&self) -> &'static str {
        "history"
    }

    fn execute(
        &self,
        args: &[String],
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        state: &mut ShellState,
    ) -> Result<ExitCode> {
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let parsed = match HistoryArgs::from_args(&["history"], &arg_refs) {
            Ok(parsed) => parsed,
            Err(EarlyExit { output, status }) => {
                return if status.is_ok() {
                    write!(stdout, "{}", output)?;
                    Ok(0)
                } else {
                    writeln!(stderr, "{}", output.trim_end())?;
                    Ok(1)
                };
            }
        };

        if let Some(file) = parsed.read {
            return match state.history.read_from(Path::new(&file)) {
                Ok(()) => Ok(0),
                Err(err) => {
                    writeln!(stderr, "history: {}: {}", file, history::io_reason(&err))?;
                    Ok(1)
                }
            };
        }
        if let Some(file) = parsed.write {
            return match state.history.write_to(Path::new(&file)) {
                Ok(()) => Ok(0),
                Err(err) => {
                    writeln!(stderr, "history: {}: {}", file, history::io_reason(&err))?;
                    Ok(1)
                }
            };
        }
        if let Some(file) = parsed.append {
            return match state.history.append_to(Path::new(&file)) {
                Ok(()) => Ok(0),
                Err(err) => {
                    writeln!(stderr, "history: {}: {}", file, history::io_reason(&err))?;
                    Ok(1)
                }
            };
        }

        let total = state.history.len();
        let skip = parsed.count.map_or(0, |count| total.saturating_sub(count));
        for (index, entry) in state.history.iter().enumerate().skip(skip) {
            writeln!(stdout, "{:>5}  {}", index + 1, entry)?;
        }
        Ok(0)
    }
}
