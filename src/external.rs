//! Executable lookup and external command execution.
//!
//! Lookup walks the directories of `PATH`, which is re-read from the
//! environment on every call. On Unix a command runs through
//! `/bin/sh -c "exec -a <name> <path> …"` so the process keeps the name it
//! was invoked under even when the on-disk path differs; on Windows the
//! resolved path is launched directly with a real argument vector.

use crate::builtin::ExitCode;
use crate::parser::{Redirect, RedirectMode, Redirections, Stage};
use anyhow::Result;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

/// Resolve a command name to the first matching executable on `PATH`.
///
/// `PATH` is read from the environment each call; an empty or unset value
/// matches nothing. Empty entries and directories that do not exist are
/// skipped. The returned path is canonicalized.
///
/// A name containing a path separator is not searched: the named path
/// itself is accepted if it passes the executability test, so `./prog` and
/// absolute paths work.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    if name.is_empty() {
        return None;
    }
    if has_path_separator(name) {
        let candidate = PathBuf::from(name);
        if is_executable(&candidate) {
            return Some(canonical(candidate));
        }
        return None;
    }

    let search = std::env::var_os("PATH")?;
    if search.is_empty() {
        return None;
    }
    for dir in std::env::split_paths(&search) {
        if dir.as_os_str().is_empty() || !dir.is_dir() {
            continue;
        }
        for candidate in candidates_in(&dir, name) {
            if is_executable(&candidate) {
                log::debug!("resolved {} to {}", name, candidate.display());
                return Some(canonical(candidate));
            }
        }
    }
    None
}

fn has_path_separator(name: &str) -> bool {
    name.contains('/') || name.contains(std::path::MAIN_SEPARATOR)
}

fn canonical(path: PathBuf) -> PathBuf {
    fs::canonicalize(&path).unwrap_or(path)
}

#[cfg(unix)]
fn candidates_in(dir: &Path, name: &str) -> Vec<PathBuf> {
    vec![dir.join(name)]
}

/// Windows candidates: a name that already carries an extension is tried
/// as-is; otherwise each `PATHEXT` extension is appended in order.
#[cfg(windows)]
fn candidates_in(dir: &Path, name: &str) -> Vec<PathBuf> {
    if Path::new(name).extension().is_some() {
        return vec![dir.join(name)];
    }
    pathext()
        .iter()
        .map(|ext| dir.join(format!("{}{}", name, ext)))
        .collect()
}

/// The `PATHEXT` extension list, with the conventional default.
#[cfg(windows)]
pub(crate) fn pathext() -> Vec<String> {
    let exts = std::env::var("PATHEXT").unwrap_or_else(|_| ".EXE;.BAT;.CMD;.COM".to_string());
    exts.split(';')
        .filter(|ext| !ext.is_empty())
        .map(str::to_string)
        .collect()
}

/// Whether a path names something this shell would run: an existing
/// non-directory with an execute bit (any of user/group/other) on Unix, or
/// any existing non-directory on Windows.
#[cfg(unix)]
pub(crate) fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    match fs::metadata(path) {
        Ok(meta) => meta.is_file() && meta.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}

#[cfg(windows)]
pub(crate) fn is_executable(path: &Path) -> bool {
    fs::metadata(path).map(|meta| !meta.is_dir()).unwrap_or(false)
}

/// Open a redirection target the way its operator asked for.
pub fn open_redirect(redirect: &Redirect) -> std::io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create(true);
    match redirect.mode {
        RedirectMode::Truncate => options.truncate(true),
        RedirectMode::Append => options.append(true),
    };
    options.open(&redirect.path)
}

/// Wrap a value in single quotes for `/bin/sh`, escaping embedded single
/// quotes as `'"'"'`.
#[cfg(unix)]
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r#"'"'"'"#))
}

/// Compose the `exec -a <name> <path> <args>…` expression for one stage,
/// with its file redirections appended.
#[cfg(unix)]
pub(crate) fn stage_command(
    name: &str,
    path: &Path,
    args: &[String],
    redirections: &Redirections,
) -> String {
    let mut command = format!("exec -a {} {}", quote(name), quote(&path.to_string_lossy()));
    for arg in args {
        command.push(' ');
        command.push_str(&quote(arg));
    }
    if let Some(redirect) = &redirections.stdout {
        let op = match redirect.mode {
            RedirectMode::Truncate => ">",
            RedirectMode::Append => ">>",
        };
        command.push_str(&format!(" {} {}", op, quote(&redirect.path)));
    }
    if let Some(redirect) = &redirections.stderr {
        let op = match redirect.mode {
            RedirectMode::Truncate => "2>",
            RedirectMode::Append => "2>>",
        };
        command.push_str(&format!(" {} {}", op, quote(&redirect.path)));
    }
    command
}

/// Run one external command with the ambient standard streams, applying its
/// redirections, and wait for it to exit.
///
/// A name that does not resolve reports `command not found`; spawn and wait
/// failures report `Error executing <name>`. Both go to stderr and return
/// control to the caller.
pub fn run(stage: &Stage) -> Result<ExitCode> {
    let name = &stage.argv[0];
    let Some(path) = find_executable(name) else {
        eprintln!("{}: command not found", name);
        return Ok(127);
    };
    execute(name, &path, &stage.argv[1..], &stage.redirections)
}

#[cfg(unix)]
fn execute(
    name: &str,
    path: &Path,
    args: &[String],
    redirections: &Redirections,
) -> Result<ExitCode> {
    let command = stage_command(name, path, args, redirections);
    log::debug!("running /bin/sh -c {:?}", command);
    match Command::new("/bin/sh").arg("-c").arg(&command).status() {
        Ok(status) => Ok(status.code().unwrap_or(-1)),
        Err(err) => {
            eprintln!("Error executing {}: {}", name, err);
            Ok(1)
        }
    }
}

#[cfg(windows)]
fn execute(
    name: &str,
    path: &Path,
    args: &[String],
    redirections: &Redirections,
) -> Result<ExitCode> {
    let mut command = Command::new(path);
    command.args(args);
    if redirections.stdout.is_some() {
        command.stdout(Stdio::piped());
    }
    if redirections.stderr.is_some() {
        command.stderr(Stdio::piped());
    }

    let child = match command.spawn() {
        Ok(child) => child,
        Err(err) => {
            eprintln!("Error executing {}: {}", name, err);
            return Ok(1);
        }
    };
    let output = match child.wait_with_output() {
        Ok(output) => output,
        Err(err) => {
            eprintln!("Error executing {}: {}", name, err);
            return Ok(1);
        }
    };

    if let Some(redirect) = &redirections.stdout {
        write_capture(redirect, &output.stdout)?;
    }
    if let Some(redirect) = &redirections.stderr {
        write_capture(redirect, &output.stderr)?;
    }
    Ok(output.status.code().unwrap_or(-1))
}

#[cfg(windows)]
fn write_capture(redirect: &Redirect, bytes: &[u8]) -> Result<()> {
    use std::io::Write;
    let mut file = open_redirect(redirect)?;
    file.write_all(bytes)?;
    Ok(())
}

/// Spawn one pipeline stage with explicit stdio wiring. The pipeline engine
/// owns feeding stdin and collecting stdout.
pub(crate) fn spawn_stage(
    name: &str,
    path: &Path,
    args: &[String],
    stdin: Stdio,
    stdout: Stdio,
    stderr: Stdio,
) -> std::io::Result<Child> {
    #[cfg(unix)]
    {
        let command = stage_command(name, path, args, &Redirections::default());
        Command::new("/bin/sh")
            .arg("-c")
            .arg(command)
            .stdin(stdin)
            .stdout(stdout)
            .stderr(stderr)
            .spawn()
    }
    #[cfg(windows)]
    {
        let _ = name;
        Command::new(path)
            .args(args)
            .stdin(stdin)
            .stdout(stdout)
            .stderr(stderr)
            .spawn()
    }
}
