//! The session loop: prompt, read, evaluate, reap, repeat.
//!
//! One line is fully finished, children included, before the next prompt
//! appears. Validation failures answer to the configured [`ErrorPolicy`];
//! OS failures in the parent always end the session.

use std::os::fd::AsFd;

use anyhow::Context;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::debug;

use crate::exec::{self, Input, Output};
use crate::lexer::{self, LexingError, Limits};
use crate::parser::{self, ParsedLine, ParsingError, Redirect, RedirectKind};

const PROMPT: &str = "$ ";

/// What happens to the session after a line is rejected by validation.
///
/// Ending the whole session on the first rejected line is the deliberate
/// default: a rejected line leaves the operator's intent unknown, so the
/// session stops instead of guessing. `Recoverable` reports the rejection
/// and keeps the session alive. OS failures in the parent end the session
/// under either policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    #[default]
    Strict,
    Recoverable,
}

/// Session configuration: line limits and the error policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct Config {
    pub limits: Limits,
    pub policy: ErrorPolicy,
}

/// Why one line did not run to completion.
#[derive(Debug)]
pub enum LineError {
    /// Rejected by the tokenizer; nothing was spawned.
    Lex(LexingError),
    /// Rejected by the grammar; nothing was spawned.
    Parse(ParsingError),
    /// The parent hit an OS failure while orchestrating the line.
    Os(anyhow::Error),
}

impl LineError {
    /// Validation failures answer to [`ErrorPolicy`]; OS failures do not.
    pub fn is_validation(&self) -> bool {
        matches!(self, LineError::Lex(_) | LineError::Parse(_))
    }
}

impl From<LexingError> for LineError {
    fn from(err: LexingError) -> Self {
        LineError::Lex(err)
    }
}

impl From<ParsingError> for LineError {
    fn from(err: ParsingError) -> Self {
        LineError::Parse(err)
    }
}

impl std::fmt::Display for LineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LineError::Lex(err) => write!(f, "{err}"),
            LineError::Parse(err) => write!(f, "{err}"),
            LineError::Os(err) => write!(f, "{err:#}"),
        }
    }
}

/// A line-at-a-time command interpreter.
///
/// Reads one line, runs it as one or two child processes with the requested
/// stream wiring, drains the children, and prompts again. Every command is
/// an external program; there are no built-ins.
#[derive(Debug, Default)]
pub struct Interpreter {
    config: Config,
}

impl Interpreter {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Drives the session to completion and returns the process exit code:
    /// 0 after EOF, 1 after a fatal line, 130 when interrupted at the prompt.
    pub fn run(&mut self) -> anyhow::Result<i32> {
        let mut rl = DefaultEditor::new()?;

        loop {
            match rl.readline(PROMPT) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        rl.add_history_entry(line.as_str())?;
                    }
                    if let Err(err) = self.eval_line(&line) {
                        eprintln!("monosh: {err}");
                        let recoverable = err.is_validation()
                            && self.config.policy == ErrorPolicy::Recoverable;
                        if !recoverable {
                            return Ok(1);
                        }
                    }
                }
                Err(ReadlineError::Interrupted) => return Ok(130),
                Err(ReadlineError::Eof) => return Ok(0),
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Evaluates one line: tokenize, classify, execute, reap. An empty or
    /// all-whitespace line is a no-op.
    pub fn eval_line(&self, line: &str) -> Result<(), LineError> {
        let tokens = lexer::split_into_tokens(line, &self.config.limits)?;
        if tokens.is_empty() {
            return Ok(());
        }
        let parsed = parser::parse_line(tokens)?;
        debug!(?parsed, "dispatching line");
        self.execute(parsed).map_err(LineError::Os)
    }

    fn execute(&self, line: ParsedLine) -> anyhow::Result<()> {
        match line {
            ParsedLine::Simple { argv } => self.run_simple(argv),
            ParsedLine::Redirected { argv, redirect } => self.run_redirected(argv, redirect),
            ParsedLine::Piped { left, right } => self.run_piped(left, right, None),
            ParsedLine::PipedWithRedirect {
                left,
                right,
                redirect,
            } => self.run_piped(left, right, Some(redirect)),
        }
    }

    // One child with both streams inherited; wait for exactly that child.
    fn run_simple(&self, argv: Vec<String>) -> anyhow::Result<()> {
        let child = exec::spawn(&argv, Input::Inherit, Output::Inherit)
            .context("cannot start command")?;
        child.wait().context("cannot wait for command")?;
        Ok(())
    }

    // One child with the redirected stream; afterwards every outstanding
    // child is drained rather than waiting on the specific pid.
    fn run_redirected(&self, argv: Vec<String>, redirect: Redirect) -> anyhow::Result<()> {
        let (stdin, stdout) = match redirect.kind {
            RedirectKind::Input => (Input::File(&redirect.target), Output::Inherit),
            RedirectKind::Output => (Input::Inherit, Output::File(&redirect.target)),
        };
        exec::spawn(&argv, stdin, stdout).context("cannot start command")?;
        exec::reap_all().context("cannot reap children")?;
        Ok(())
    }

    // Two children around one pipe. A validated Input redirect feeds the
    // left child and a validated Output redirect drains the right one; the
    // token order admitted by the parser allows no other combination.
    fn run_piped(
        &self,
        left: Vec<String>,
        right: Vec<String>,
        redirect: Option<Redirect>,
    ) -> anyhow::Result<()> {
        let (read_end, write_end) = exec::make_pipe().context("cannot create pipe")?;

        let left_stdin = match &redirect {
            Some(r) if r.kind == RedirectKind::Input => Input::File(&r.target),
            _ => Input::Inherit,
        };
        exec::spawn(&left, left_stdin, Output::Pipe(write_end.as_fd()))
            .context("cannot start left command")?;

        let right_stdout = match &redirect {
            Some(r) if r.kind == RedirectKind::Output => Output::File(&r.target),
            _ => Output::Inherit,
        };
        exec::spawn(&right, Input::Pipe(read_end.as_fd()), right_stdout)
            .context("cannot start right command")?;

        // Both ends must be closed before reaping, or the right child never
        // sees EOF.
        drop(write_end);
        drop(read_end);
        exec::reap_all().context("cannot reap children")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Execution paths are covered end to end through the binary in
    // tests/cli.rs; in-process tests stick to paths that spawn nothing.

    #[test]
    fn empty_and_blank_lines_are_no_ops() {
        let sh = Interpreter::default();
        assert!(sh.eval_line("").is_ok());
        assert!(sh.eval_line("   \t ").is_ok());
    }

    #[test]
    fn rejected_lines_classify_as_validation() {
        let sh = Interpreter::default();

        let err = sh.eval_line("ls >a >b").unwrap_err();
        assert!(err.is_validation());
        assert!(matches!(
            err,
            LineError::Parse(ParsingError::MultipleRedirects(_))
        ));

        let err = sh.eval_line(&"x ".repeat(200)).unwrap_err();
        assert!(err.is_validation());
        assert!(matches!(err, LineError::Lex(LexingError::LineTooLong { .. })));
    }

    #[test]
    fn token_limit_is_enforced_through_eval() {
        let sh = Interpreter::new(Config {
            limits: Limits {
                max_line_bytes: 256,
                max_tokens: 2,
            },
            policy: ErrorPolicy::Strict,
        });
        let err = sh.eval_line("a b c").unwrap_err();
        assert!(matches!(
            err,
            LineError::Lex(LexingError::TooManyTokens { .. })
        ));
    }
}
