use crate::env::Environment;
use crate::parser::ParsedCommand;
use anyhow::Result;
use std::io::{Read, Write};
use std::process::Stdio;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// External commands report their own status, built-ins follow the same convention.
pub type ExitCode = i32;

/// Exit status reported when a program cannot be located.
pub const EXIT_NOT_FOUND: ExitCode = 127;

/// Exit status reported when a program exists but cannot be executed.
pub const EXIT_NOT_EXECUTABLE: ExitCode = 126;

/// Print a one-line diagnostic for the user on standard error.
pub(crate) fn report(message: impl std::fmt::Display) {
    eprintln!("myshell: {}", message);
}

/// Abstraction over a readable input stream that can also be converted into
/// a [`Stdio`] handle for spawning external processes.
///
/// A blanket implementation exists for any type that implements `Read` and
/// `Into<Stdio>`, which covers both the inherited standard input and a `File`
/// opened for `<` redirection.
pub trait Stdin: Read {
    /// Convert this input into a [`Stdio`] handle suitable for `std::process::Command`.
    fn stdio(self: Box<Self>) -> Stdio;
}

impl<T: Read + Into<Stdio>> Stdin for T {
    fn stdio(self: Box<Self>) -> Stdio {
        (*self).into()
    }
}

/// Abstraction over a writable output stream that can also be converted into
/// a [`Stdio`] handle for spawning external processes.
///
/// A blanket implementation exists for any type that implements `Write` and
/// `Into<Stdio>` (`std::io::Stdout`, or a `File` opened for `>`/`>>`).
pub trait Stdout: Write {
    /// Convert this output into a [`Stdio`] handle suitable for `std::process::Command`.
    fn stdio(self: Box<Self>) -> Stdio;
}

impl<T: Write + Into<Stdio>> Stdout for T {
    fn stdio(self: Box<Self>) -> Stdio {
        (*self).into()
    }
}

/// Object-safe trait for any command that can be executed by the shell.
///
/// This is implemented by built-ins via a blanket impl and by external commands.
/// The streams are owned: they are dropped, and any redirection file closed,
/// when `execute` returns.
pub trait ExecutableCommand {
    /// Executes the command.
    fn execute(
        self: Box<Self>,
        stdin: Box<dyn Stdin>,
        stdout: Box<dyn Stdout>,
        env: &mut Environment,
    ) -> Result<ExitCode>;
}

/// Factory that tries to create a command from a classified command line.
///
/// Returns `None` when the factory doesn't recognize the command name.
pub trait CommandFactory {
    /// Attempt to create a command instance for the provided command line.
    fn try_create(
        &self,
        env: &Environment,
        cmd: &ParsedCommand,
    ) -> Option<Box<dyn ExecutableCommand>>;
}
