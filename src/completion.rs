//! Completion candidates for the first token on the line.
//!
//! The candidate set is the builtin completion set plus the name of every
//! executable found on `PATH` (basename without extension on Windows),
//! filtered by the typed prefix. Results come back sorted and deduplicated.

use crate::external;
use std::collections::BTreeSet;
use std::fs;

/// Builtins offered to completion.
const COMPLETION_BUILTINS: &[&str] = &["echo", "exit"];

/// Collect every completion candidate that starts with `prefix`.
pub fn candidates(prefix: &str) -> Vec<String> {
    let mut names = BTreeSet::new();
    for builtin in COMPLETION_BUILTINS {
        if builtin.starts_with(prefix) {
            names.insert((*builtin).to_string());
        }
    }

    if let Some(search) = std::env::var_os("PATH") {
        for dir in std::env::split_paths(&search) {
            let Ok(entries) = fs::read_dir(&dir) else {
                continue;
            };
            for entry in entries.flatten() {
                let Some(name) = command_name(&entry) else {
                    continue;
                };
                if name.starts_with(prefix) && external::is_executable(&entry.path()) {
                    names.insert(name);
                }
            }
        }
    }

    names.into_iter().collect()
}

#[cfg(unix)]
fn command_name(entry: &fs::DirEntry) -> Option<String> {
    entry.file_name().to_str().map(str::to_string)
}

/// On Windows a command is typed without its extension, so candidates are
/// the basenames of files carrying a `PATHEXT` extension.
#[cfg(windows)]
fn command_name(entry: &fs::DirEntry) -> Option<String> {
    let path = entry.path();
    let ext = path.extension()?.to_str()?;
    let dotted = format!(".{}", ext);
    if !external::pathext()
        .iter()
        .any(|known| known.eq_ignore_ascii_case(&dotted))
    {
        return None;
    }
    path.file_stem()?.to_str().map(str::to_string)
}

/// The longest common prefix of a set of candidates. Empty input yields the
/// empty string.
pub fn longest_common_prefix(words: &[String]) -> String {
    let Some((first, rest)) = words.split_first() else {
        return String::new();
    };
    let mut prefix_len = first.len();
    for word in rest {
        let mut common = 0;
        for (a, b) in first.chars().zip(word.chars()) {
            if a != b {
                break;
            }
            common += a.len_utf8();
        }
        prefix_len = prefix_len.min(common);
    }
    first[..prefix_len].to_string()
}
