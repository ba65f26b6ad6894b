//! The read–plan–execute loop that ties the shell together.
//!
//! Each iteration prints the prompt, reads one line through the line
//! editor, records it in history, lexes and plans it, and either hands a
//! multi-stage pipeline to the pipeline engine or dispatches the single
//! stage to a builtin or the external runner. Every error is recovered here
//! and the loop continues; only end-of-input and `exit`/`quit` stop it.

use crate::builtin::Registry;
use crate::editor::LineEditor;
use crate::external;
use crate::lexer;
use crate::parser::{self, Stage};
use crate::pipeline;
use crate::state::ShellState;
use anyhow::Result;
use std::io::{self, Write};
use std::path::Path;

const HISTFILE_VAR: &str = "HISTFILE";

/// The interactive shell.
pub struct Repl {
    registry: Registry,
    state: ShellState,
}

impl Repl {
    pub fn new() -> Self {
        Repl {
            registry: Registry::new(),
            state: ShellState::new(),
        }
    }

    /// Run until `exit`/`quit` or end of input.
    pub fn run(&mut self) -> Result<()> {
        self.load_history_file();
        while !self.state.should_exit {
            let line = match LineEditor::new(&self.state.history).read_line() {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(err) => {
                    // A failing terminal ends the session cleanly.
                    log::warn!("terminal read failed: {}", err);
                    break;
                }
            };
            let line = line.trim_end();
            if line.is_empty() {
                continue;
            }
            self.state.history.push(line.to_string());
            self.execute_line(line);
        }
        self.save_history_file();
        Ok(())
    }

    fn execute_line(&mut self, line: &str) {
        let tokens = lexer::lex(line);
        let planned = match parser::plan(&tokens) {
            Ok(Some(planned)) => planned,
            Ok(None) => return,
            Err(err) => {
                eprintln!("{}", err);
                return;
            }
        };
        if planned.stages.len() > 1 {
            if let Err(err) = pipeline::run(&planned, &self.registry, &mut self.state) {
                eprintln!("{}", err);
            }
        } else {
            self.dispatch(&planned.stages[0]);
        }
    }

    /// Run a single stage: a builtin with file-backed sinks when redirected,
    /// or the external runner.
    fn dispatch(&mut self, stage: &Stage) {
        let name = &stage.argv[0];
        let lowered = name.to_lowercase();
        log::debug!("dispatching {:?}", name);

        let Some(builtin) = self.registry.lookup(&lowered) else {
            if let Err(err) = external::run(stage) {
                eprintln!("{}", err);
            }
            return;
        };

        let mut stdout_sink: Box<dyn Write> = match &stage.redirections.stdout {
            Some(redirect) => match external::open_redirect(redirect) {
                Ok(file) => Box::new(file),
                Err(err) => {
                    eprintln!("{}: {}", redirect.path, err);
                    return;
                }
            },
            None => Box::new(io::stdout()),
        };
        let mut stderr_sink: Box<dyn Write> = match &stage.redirections.stderr {
            Some(redirect) => match external::open_redirect(redirect) {
                Ok(file) => Box::new(file),
                Err(err) => {
                    eprintln!("{}: {}", redirect.path, err);
                    return;
                }
            },
            None => Box::new(io::stderr()),
        };

        let mut stdin = io::empty();
        if let Err(err) = builtin.execute(
            &stage.argv[1..],
            &mut stdin,
            &mut *stdout_sink,
            &mut *stderr_sink,
            &mut self.state,
        ) {
            let _ = writeln!(stderr_sink, "{}", err);
        }
        let _ = stdout_sink.flush();
        let _ = stderr_sink.flush();
    }

    /// Load `$HISTFILE` on startup, when set and readable. Loaded entries
    /// count as already flushed for incremental appends.
    fn load_history_file(&mut self) {
        let Some(path) = std::env::var_os(HISTFILE_VAR) else {
            return;
        };
        let path = Path::new(&path);
        if path.exists() {
            if let Err(err) = self.state.history.read_from(path) {
                log::warn!("could not load {}: {}", path.display(), err);
            }
        }
        self.state.history.mark_flushed();
    }

    /// Write the full history back to `$HISTFILE` on clean exit.
    fn save_history_file(&mut self) {
        let Some(path) = std::env::var_os(HISTFILE_VAR) else {
            return;
        };
        if let Err(err) = self.state.history.write_to(Path::new(&path)) {
            log::warn!("could not save {}: {}", Path::new(&path).display(), err);
        }
    }
}

impl Default for Repl {
    fn default() -> Self {
        Repl::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{lock_process_env, make_temp_dir};
    use std::fs;

    #[test]
    fn redirected_echo_truncates_and_appends() {
        let dir = make_temp_dir("repl_redirect");
        let out = dir.join("out.txt");

        let mut repl = Repl::new();
        repl.execute_line(&format!("echo hello > {}", out.display()));
        assert_eq!(fs::read_to_string(&out).unwrap(), "hello\n");

        // Truncation is idempotent.
        repl.execute_line(&format!("echo hello > {}", out.display()));
        assert_eq!(fs::read_to_string(&out).unwrap(), "hello\n");

        repl.execute_line(&format!("echo hello >> {}", out.display()));
        assert_eq!(fs::read_to_string(&out).unwrap(), "hello\nhello\n");

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn quoting_survives_to_the_output() {
        let dir = make_temp_dir("repl_quote");
        let out = dir.join("out.txt");

        let mut repl = Repl::new();
        repl.execute_line(&format!("echo 'hello   world' > {}", out.display()));
        assert_eq!(fs::read_to_string(&out).unwrap(), "hello   world\n");

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn type_output_is_capturable() {
        let _lock = lock_process_env();
        let dir = make_temp_dir("repl_type");
        let out = dir.join("out.txt");

        let mut repl = Repl::new();
        repl.execute_line(&format!("type echo > {}", out.display()));
        assert_eq!(fs::read_to_string(&out).unwrap(), "echo is a shell builtin\n");

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn stderr_redirection_captures_cd_diagnostics() {
        let dir = make_temp_dir("repl_stderr");
        let err_file = dir.join("err.txt");

        let mut repl = Repl::new();
        repl.execute_line(&format!(
            "cd missing_dir_for_repl_test 2> {}",
            err_file.display()
        ));
        assert_eq!(
            fs::read_to_string(&err_file).unwrap(),
            "cd: missing_dir_for_repl_test: No such file or directory\n"
        );

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn exit_flag_is_observed_by_dispatch() {
        let mut repl = Repl::new();
        repl.execute_line("exit");
        assert!(repl.state.should_exit);

        let mut repl = Repl::new();
        repl.execute_line("QUIT");
        assert!(repl.state.should_exit);
    }

    #[test]
    #[cfg(unix)]
    fn single_external_command_runs_with_redirection() {
        let _lock = lock_process_env();
        let dir = make_temp_dir("repl_external");
        let out = dir.join("out.txt");

        let mut repl = Repl::new();
        repl.execute_line(&format!("printf one.two > {}", out.display()));
        assert_eq!(fs::read_to_string(&out).unwrap(), "one.two");

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    #[cfg(unix)]
    fn pipeline_end_to_end_through_the_repl() {
        let _lock = lock_process_env();
        let dir = make_temp_dir("repl_pipeline");
        let out = dir.join("out.txt");

        let mut repl = Repl::new();
        repl.execute_line(&format!("echo a b c | wc -w > {}", out.display()));
        let text = fs::read_to_string(&out).unwrap();
        assert_eq!(text.trim(), "3");

        let _ = fs::remove_dir_all(dir);
    }
}
