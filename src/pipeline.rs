//! Pipeline execution: wiring N stages together, mixing builtins and
//! externals.
//!
//! On Unix a pipeline made entirely of externals is delegated to
//! `/bin/sh -c` by joining the per-stage `exec -a` expressions with `|`.
//! Everything else runs through buffered sequential execution: each stage's
//! stdout is collected in memory and fed to the next stage's stdin. The
//! shell is synchronous, so full buffering between stages is fine.

use crate::builtin::Registry;
use crate::external;
use crate::parser::{Pipeline, Redirect, Stage};
use crate::state::ShellState;
use anyhow::Result;
use std::fs::File;
use std::io::{self, Cursor, Read, Write};
use std::process::Stdio;

/// Run a planned pipeline to completion.
pub fn run(pipeline: &Pipeline, registry: &Registry, state: &mut ShellState) -> Result<()> {
    #[cfg(unix)]
    if let Some(script) = delegable_script(pipeline, registry) {
        return run_delegated(&script);
    }
    run_buffered(pipeline, registry, state)
}

/// The `/bin/sh` form of this pipeline, when every stage is an external
/// command that resolves. Builtins and unresolvable names fall back to the
/// buffered engine, which reports `command not found` per stage.
#[cfg(unix)]
fn delegable_script(pipeline: &Pipeline, registry: &Registry) -> Option<String> {
    let mut parts = Vec::with_capacity(pipeline.stages.len());
    for stage in &pipeline.stages {
        let name = &stage.argv[0];
        if registry.lookup(&name.to_lowercase()).is_some() {
            return None;
        }
        let path = external::find_executable(name)?;
        parts.push(external::stage_command(
            name,
            &path,
            &stage.argv[1..],
            &stage.redirections,
        ));
    }
    Some(parts.join(" | "))
}

#[cfg(unix)]
fn run_delegated(script: &str) -> Result<()> {
    log::debug!("delegating pipeline: {:?}", script);
    if let Err(err) = std::process::Command::new("/bin/sh")
        .arg("-c")
        .arg(script)
        .status()
    {
        eprintln!("Error executing /bin/sh: {}", err);
    }
    Ok(())
}

/// Where a stage's output stream is routed in the buffered engine.
enum Sink {
    File(File),
    Stdout(io::Stdout),
    Stderr(io::Stderr),
    Buffer(Vec<u8>),
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Sink::File(file) => file.write(buf),
            Sink::Stdout(out) => out.write(buf),
            Sink::Stderr(err) => err.write(buf),
            Sink::Buffer(bytes) => bytes.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Sink::File(file) => file.flush(),
            Sink::Stdout(out) => out.flush(),
            Sink::Stderr(err) => err.flush(),
            Sink::Buffer(_) => Ok(()),
        }
    }
}

impl Sink {
    fn into_buffer(self) -> Option<Vec<u8>> {
        match self {
            Sink::Buffer(bytes) => Some(bytes),
            _ => None,
        }
    }
}

fn open_or_report(redirect: &Redirect) -> Option<File> {
    match external::open_redirect(redirect) {
        Ok(file) => Some(file),
        Err(err) => {
            eprintln!("{}: {}", redirect.path, err);
            None
        }
    }
}

fn run_buffered(pipeline: &Pipeline, registry: &Registry, state: &mut ShellState) -> Result<()> {
    let count = pipeline.stages.len();
    let mut carry: Option<Vec<u8>> = None;

    for (index, stage) in pipeline.stages.iter().enumerate() {
        let last = index + 1 == count;
        let input = carry.take();
        let name = &stage.argv[0];

        let outcome = if let Some(builtin) = registry.lookup(&name.to_lowercase()) {
            run_builtin_stage(builtin, stage, input, last, state)?
        } else {
            run_external_stage(stage, input, last)?
        };
        match outcome {
            StageOutcome::Produced(bytes) => carry = bytes,
            StageOutcome::Abort => return Ok(()),
        }
    }
    Ok(())
}

enum StageOutcome {
    /// The stage ran; the payload is what the next stage reads.
    Produced(Option<Vec<u8>>),
    /// The stage could not run or be waited for; the rest of the pipeline
    /// is abandoned.
    Abort,
}

fn run_builtin_stage(
    builtin: &dyn crate::builtin::Builtin,
    stage: &Stage,
    input: Option<Vec<u8>>,
    last: bool,
    state: &mut ShellState,
) -> Result<StageOutcome> {
    let mut stdin: Box<dyn Read> = match input {
        Some(bytes) => Box::new(Cursor::new(bytes)),
        None => Box::new(io::empty()),
    };

    // A file redirection claims the descriptor even mid-pipeline, so the
    // next stage then reads nothing from this one.
    let mut stdout_sink = match (&stage.redirections.stdout, last) {
        (Some(redirect), _) => match open_or_report(redirect) {
            Some(file) => Sink::File(file),
            None => return Ok(StageOutcome::Abort),
        },
        (None, false) => Sink::Buffer(Vec::new()),
        (None, true) => Sink::Stdout(io::stdout()),
    };
    let mut stderr_sink = match &stage.redirections.stderr {
        Some(redirect) => match open_or_report(redirect) {
            Some(file) => Sink::File(file),
            None => return Ok(StageOutcome::Abort),
        },
        None => Sink::Stderr(io::stderr()),
    };

    if let Err(err) = builtin.execute(
        &stage.argv[1..],
        &mut stdin,
        &mut stdout_sink,
        &mut stderr_sink,
        state,
    ) {
        let _ = writeln!(stderr_sink, "{}", err);
    }
    let _ = stdout_sink.flush();

    if last {
        Ok(StageOutcome::Produced(None))
    } else {
        Ok(StageOutcome::Produced(Some(
            stdout_sink.into_buffer().unwrap_or_default(),
        )))
    }
}

fn run_external_stage(
    stage: &Stage,
    input: Option<Vec<u8>>,
    last: bool,
) -> Result<StageOutcome> {
    let name = &stage.argv[0];
    let Some(path) = external::find_executable(name) else {
        eprintln!("{}: command not found", name);
        let produced = if last { None } else { Some(Vec::new()) };
        return Ok(StageOutcome::Produced(produced));
    };

    let stdin_cfg = if input.is_some() {
        Stdio::piped()
    } else {
        Stdio::inherit()
    };
    let piped_out = stage.redirections.stdout.is_none() && !last;
    let stdout_cfg = if let Some(redirect) = &stage.redirections.stdout {
        match open_or_report(redirect) {
            Some(file) => Stdio::from(file),
            None => return Ok(StageOutcome::Abort),
        }
    } else if last {
        Stdio::inherit()
    } else {
        Stdio::piped()
    };
    let stderr_cfg = match &stage.redirections.stderr {
        Some(redirect) => match open_or_report(redirect) {
            Some(file) => Stdio::from(file),
            None => return Ok(StageOutcome::Abort),
        },
        None => Stdio::inherit(),
    };

    let mut child =
        match external::spawn_stage(name, &path, &stage.argv[1..], stdin_cfg, stdout_cfg, stderr_cfg)
        {
            Ok(child) => child,
            Err(err) => {
                eprintln!("Error executing {}: {}", name, err);
                return Ok(StageOutcome::Abort);
            }
        };

    if let Some(bytes) = input {
        if let Some(mut child_stdin) = child.stdin.take() {
            // The child may exit without draining its input.
            let _ = child_stdin.write_all(&bytes);
        }
    }

    if piped_out {
        match child.wait_with_output() {
            Ok(output) => Ok(StageOutcome::Produced(Some(output.stdout))),
            Err(err) => {
                eprintln!("Error executing {}: {}", name, err);
                Ok(StageOutcome::Abort)
            }
        }
    } else {
        match child.wait() {
            Ok(_) => {
                let produced = if last { None } else { Some(Vec::new()) };
                Ok(StageOutcome::Produced(produced))
            }
            Err(err) => {
                eprintln!("Error executing {}: {}", name, err);
                Ok(StageOutcome::Abort)
            }
        }
    }
}
