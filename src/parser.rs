//! The command planner: turns the lexer's token sequence into a pipeline of
//! stages with their redirections extracted.
//!
//! Operators are recognized here, not in the lexer, by exact string match on
//! unquoted tokens: `|` splits stages, and `>`, `>>`, `1>`, `1>>`, `2>`,
//! `2>>` attach redirections to the stage they appear in.

use crate::lexer::Token;
use std::fmt;

/// How a redirection opens its target file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectMode {
    /// `>` / `1>` / `2>`: create or truncate.
    Truncate,
    /// `>>` / `1>>` / `2>>`: create or append.
    Append,
}

/// Which standard stream a redirection captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RedirectTarget {
    Stdout,
    Stderr,
}

/// One redirection: a target path and the open mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub path: String,
    pub mode: RedirectMode,
}

/// The redirections of one stage, at most one per descriptor.
/// When an operator is repeated for the same descriptor, the last one wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Redirections {
    pub stdout: Option<Redirect>,
    pub stderr: Option<Redirect>,
}

impl Redirections {
    pub fn is_empty(&self) -> bool {
        self.stdout.is_none() && self.stderr.is_none()
    }
}

/// One command of a pipeline: its argv and its redirections.
/// The argv is never empty and never contains a recognized operator or an
/// operator's operand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub argv: Vec<String>,
    pub redirections: Redirections,
}

/// An ordered sequence of at least one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    pub stages: Vec<Stage>,
}

/// Errors detected while planning a command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanError {
    /// Adjacent, leading, or trailing `|` left a stage with no tokens.
    EmptyStage,
}

impl fmt::Display for PlanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanError::EmptyStage => write!(f, "Empty pipeline stage"),
        }
    }
}

impl std::error::Error for PlanError {}

fn redirect_operator(text: &str) -> Option<(RedirectTarget, RedirectMode)> {
    match text {
        ">" | "1>" => Some((RedirectTarget::Stdout, RedirectMode::Truncate)),
        ">>" | "1>>" => Some((RedirectTarget::Stdout, RedirectMode::Append)),
        "2>" => Some((RedirectTarget::Stderr, RedirectMode::Truncate)),
        "2>>" => Some((RedirectTarget::Stderr, RedirectMode::Append)),
        _ => None,
    }
}

/// Plan a token sequence into a pipeline.
///
/// Returns `Ok(None)` when the line is effectively empty: no tokens at all,
/// or a stage whose argv vanished once its redirections were extracted.
pub fn plan(tokens: &[Token]) -> Result<Option<Pipeline>, PlanError> {
    if tokens.is_empty() {
        return Ok(None);
    }

    let mut stages = Vec::new();
    for group in tokens.split(|t| t.is_operator("|")) {
        if group.is_empty() {
            return Err(PlanError::EmptyStage);
        }
        stages.push(extract_stage(group));
    }

    if stages.iter().any(|s| s.argv.is_empty()) {
        return Ok(None);
    }

    Ok(Some(Pipeline { stages }))
}

/// Scan one stage's tokens left to right, consuming each redirection
/// operator together with its operand. An operator with no following token
/// is silently dropped.
fn extract_stage(tokens: &[Token]) -> Stage {
    let mut argv = Vec::new();
    let mut redirections = Redirections::default();

    let mut i = 0;
    while i < tokens.len() {
        let token = &tokens[i];
        if !token.quoted {
            if let Some((target, mode)) = redirect_operator(&token.text) {
                if let Some(operand) = tokens.get(i + 1) {
                    let redirect = Redirect {
                        path: operand.text.clone(),
                        mode,
                    };
                    match target {
                        RedirectTarget::Stdout => redirections.stdout = Some(redirect),
                        RedirectTarget::Stderr => redirections.stderr = Some(redirect),
                    }
                    i += 2;
                } else {
                    i += 1;
                }
                continue;
            }
        }
        argv.push(token.text.clone());
        i += 1;
    }

    Stage { argv, redirections }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;

    fn plan_line(line: &str) -> Result<Option<Pipeline>, PlanError> {
        plan(&lex(line))
    }

    fn single_stage(line: &str) -> Stage {
        let pipeline = plan_line(line).unwrap().unwrap();
        assert_eq!(pipeline.stages.len(), 1);
        pipeline.stages.into_iter().next().unwrap()
    }

    #[test]
    fn plain_command_is_one_stage() {
        let stage = single_stage("echo a b");
        assert_eq!(stage.argv, vec!["echo", "a", "b"]);
        assert!(stage.redirections.is_empty());
    }

    #[test]
    fn empty_input_plans_to_nothing() {
        assert_eq!(plan_line("").unwrap(), None);
        assert_eq!(plan_line("   ").unwrap(), None);
    }

    #[test]
    fn stdout_redirection_is_extracted() {
        let stage = single_stage("echo hi > out.txt");
        assert_eq!(stage.argv, vec!["echo", "hi"]);
        let redirect = stage.redirections.stdout.unwrap();
        assert_eq!(redirect.path, "out.txt");
        assert_eq!(redirect.mode, RedirectMode::Truncate);
        assert!(stage.redirections.stderr.is_none());
    }

    #[test]
    fn operator_synonyms_and_modes() {
        assert_eq!(
            single_stage("x 1> f").redirections.stdout.unwrap().mode,
            RedirectMode::Truncate
        );
        assert_eq!(
            single_stage("x >> f").redirections.stdout.unwrap().mode,
            RedirectMode::Append
        );
        assert_eq!(
            single_stage("x 1>> f").redirections.stdout.unwrap().mode,
            RedirectMode::Append
        );
        assert_eq!(
            single_stage("x 2> f").redirections.stderr.unwrap().mode,
            RedirectMode::Truncate
        );
        assert_eq!(
            single_stage("x 2>> f").redirections.stderr.unwrap().mode,
            RedirectMode::Append
        );
    }

    #[test]
    fn both_streams_can_be_redirected_in_one_stage() {
        let stage = single_stage("cmd > out.txt 2>> err.txt");
        assert_eq!(stage.argv, vec!["cmd"]);
        assert_eq!(stage.redirections.stdout.unwrap().path, "out.txt");
        let err = stage.redirections.stderr.unwrap();
        assert_eq!(err.path, "err.txt");
        assert_eq!(err.mode, RedirectMode::Append);
    }

    #[test]
    fn repeated_redirection_last_wins() {
        let stage = single_stage("cmd > first > second");
        let redirect = stage.redirections.stdout.unwrap();
        assert_eq!(redirect.path, "second");
    }

    #[test]
    fn operator_without_operand_is_dropped() {
        let stage = single_stage("echo hi >");
        assert_eq!(stage.argv, vec!["echo", "hi"]);
        assert!(stage.redirections.is_empty());
    }

    #[test]
    fn quoted_operator_stays_in_argv() {
        let stage = single_stage(r#"echo ">" out"#);
        assert_eq!(stage.argv, vec!["echo", ">", "out"]);
        assert!(stage.redirections.is_empty());
    }

    #[test]
    fn pipe_splits_stages() {
        let pipeline = plan_line("echo a b c | wc -w").unwrap().unwrap();
        assert_eq!(pipeline.stages.len(), 2);
        assert_eq!(pipeline.stages[0].argv, vec!["echo", "a", "b", "c"]);
        assert_eq!(pipeline.stages[1].argv, vec!["wc", "-w"]);
    }

    #[test]
    fn quoted_pipe_is_an_argument() {
        let stage = single_stage(r#"echo "|""#);
        assert_eq!(stage.argv, vec!["echo", "|"]);
    }

    #[test]
    fn empty_stage_is_an_error() {
        assert_eq!(plan_line("a | | b"), Err(PlanError::EmptyStage));
        assert_eq!(plan_line("| a"), Err(PlanError::EmptyStage));
        assert_eq!(plan_line("a |"), Err(PlanError::EmptyStage));
        assert_eq!(plan_line("|"), Err(PlanError::EmptyStage));
        assert_eq!(PlanError::EmptyStage.to_string(), "Empty pipeline stage");
    }

    #[test]
    fn redirection_only_line_is_treated_as_empty() {
        assert_eq!(plan_line("> f").unwrap(), None);
        assert_eq!(plan_line("2>> f | x").unwrap(), None);
    }

    #[test]
    fn planning_preserves_the_token_multiset() {
        // Reassembling argv, pipes, and operator/operand pairs must yield
        // the lexer's output (for lines spelled with canonical operators).
        for line in [
            "a b c",
            "a > f",
            "a 2>> e b | c d > f | g",
            "x >> f 2> e",
        ] {
            let tokens = lex(line);
            let pipeline = plan(&tokens).unwrap().unwrap();
            let mut rebuilt: Vec<String> = Vec::new();
            for (i, stage) in pipeline.stages.iter().enumerate() {
                if i > 0 {
                    rebuilt.push("|".to_string());
                }
                rebuilt.extend(stage.argv.iter().cloned());
                if let Some(r) = &stage.redirections.stdout {
                    let op = match r.mode {
                        RedirectMode::Truncate => ">",
                        RedirectMode::Append => ">>",
                    };
                    rebuilt.push(op.to_string());
                    rebuilt.push(r.path.clone());
                }
                if let Some(r) = &stage.redirections.stderr {
                    let op = match r.mode {
                        RedirectMode::Truncate => "2>",
                        RedirectMode::Append => "2>>",
                    };
                    rebuilt.push(op.to_string());
                    rebuilt.push(r.path.clone());
                }
            }
            let mut expected: Vec<String> = tokens.into_iter().map(|t| t.text).collect();
            expected.sort();
            rebuilt.sort();
            assert_eq!(rebuilt, expected, "line: {line}");
        }
    }
}
