//! A minimal command-line shell.
//!
//! Each input line is split on whitespace, stripped of its redirection
//! operators (`<`, `>`, `>>`) and trailing background marker (`&`), and then
//! either run in-process as a built-in (`cd`, `dir`, `environ`, `set`, `echo`,
//! `help`, `pause`, `quit`) or launched as an external program.
//!
//! The main entry point is [`Interpreter`], which owns the shell context
//! ([`env::Environment`]) and reads lines interactively or from a batch file.
//! The public modules [`lexer`] and [`parser`] expose the two parsing stages,
//! and [`command`] the traits for plugging in commands of your own.

mod builtin;
pub mod command;
pub mod env;
mod external;
mod interpreter;
pub mod io_adapters;
pub mod jobs;
pub mod lexer;
pub mod parser;

/// Just a convenient re-export of the command runner.
///
/// See [`Interpreter`] for the high-level API and examples.
pub use interpreter::Interpreter;
pub use external::find_command_path;
