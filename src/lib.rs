//! A tiny line-oriented command interpreter.
//!
//! Each input line holds at most one pipe and at most one redirection, with
//! no quoting and no built-ins: every command is an external program. The
//! crate is small and easy to read, suitable for studying process creation,
//! descriptor wiring, and child reaping on Unix.
//!
//! A line flows through [`lexer`] (whitespace tokens under configurable
//! limits), [`parser`] (classification into an executable shape), and the
//! process primitives in [`exec`] (fork, stream wiring, exec, reap). The
//! [`Interpreter`] owns the prompt loop and finishes every line, children
//! included, before the next prompt.

pub mod exec;
mod interpreter;
pub mod lexer;
pub mod parser;

/// Re-exports of the session-level API.
///
/// See [`Interpreter`] for the prompt loop and [`Config`] for the knobs it
/// takes.
pub use interpreter::{Config, ErrorPolicy, Interpreter, LineError};
