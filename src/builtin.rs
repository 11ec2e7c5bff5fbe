use crate::command::{CommandFactory, ExecutableCommand, ExitCode, Stdin, Stdout};
use crate::env::Environment;
use crate::interpreter::Factory;
use crate::parser::ParsedCommand;
use anyhow::{Context, Result, bail};
use argh::{EarlyExit, FromArgs};
use std::ffi::OsString;
use std::io::{ErrorKind, Read, Write};
use std::path::Path;
use tracing::debug;

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed directly
/// in-process without spawning a child process, so they can change the shell context.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "echo" or "cd".
    fn name() -> &'static str;

    /// Executes the command using provided IO streams and environment.
    ///
    /// Return value should follow shell conventions: 0 for success, non-zero for error.
    fn execute(
        self,
        stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(
        self: Box<Self>,
        mut stdin: Box<dyn Stdin>,
        mut stdout: Box<dyn Stdout>,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let code = T::execute(*self, &mut stdin, &mut stdout, env).context(T::name())?;
        stdout.flush()?;
        Ok(code)
    }
}

/// Output of argh when it refuses the arguments or answers `--help`.
struct InvalidArgs {
    output: String,
    is_error: bool,
}

impl ExecutableCommand for InvalidArgs {
    fn execute(
        self: Box<Self>,
        _stdin: Box<dyn Stdin>,
        mut stdout: Box<dyn Stdout>,
        _env: &mut Environment,
    ) -> Result<ExitCode> {
        if self.is_error {
            eprintln!("{}", self.output.trim_end());
            Ok(1)
        } else {
            writeln!(stdout, "{}", self.output.trim_end())?;
            Ok(0)
        }
    }
}

impl<T: BuiltinCommand + 'static> CommandFactory for Factory<T> {
    fn try_create(
        &self,
        _env: &Environment,
        cmd: &ParsedCommand,
    ) -> Option<Box<dyn ExecutableCommand>> {
        if cmd.name() != T::name() {
            return None;
        }
        if cmd.background {
            debug!(builtin = T::name(), "background marker ignored for builtin");
        }
        let args: Vec<&str> = cmd.args().iter().map(String::as_str).collect();
        Some(match T::from_args(&[cmd.name()], &args) {
            Ok(builtin) => Box::new(builtin),
            Err(EarlyExit { output, status }) => Box::new(InvalidArgs {
                output,
                is_error: status.is_err(),
            }),
        })
    }
}

#[derive(FromArgs)]
/// Change the working directory. Without a target, print the current one.
pub struct Cd {
    #[argh(positional)]
    /// directory to switch to; absolute or relative to the current directory.
    pub target: Option<String>,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        match self.target {
            None => writeln!(stdout, "{}", env.current_dir.display())?,
            Some(target) => {
                let new_dir = env.change_dir(&target)?;
                debug!(dir = %new_dir.display(), "changed directory");
            }
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// List every entry of a directory, unsorted.
pub struct Dir {
    #[argh(positional, greedy)]
    /// directory to list, the current one when absent; further words are ignored.
    pub paths: Vec<String>,
}

#[cfg(unix)]
fn read_entry_names(path: &Path) -> Result<Vec<OsString>> {
    use nix::dir::Dir as RawDir;
    use nix::fcntl::OFlag;
    use nix::sys::stat::Mode;
    use std::os::unix::ffi::OsStrExt;

    let mut dir = RawDir::open(
        path,
        OFlag::O_RDONLY | OFlag::O_DIRECTORY | OFlag::O_CLOEXEC,
        Mode::empty(),
    )?;
    let mut names = Vec::new();
    for entry in dir.iter() {
        let entry = entry?;
        names.push(std::ffi::OsStr::from_bytes(entry.file_name().to_bytes()).to_owned());
    }
    Ok(names)
}

#[cfg(not(unix))]
fn read_entry_names(path: &Path) -> Result<Vec<OsString>> {
    let mut names = vec![OsString::from("."), OsString::from("..")];
    for entry in std::fs::read_dir(path)? {
        names.push(entry?.file_name());
    }
    Ok(names)
}

impl BuiltinCommand for Dir {
    fn name() -> &'static str {
        "dir"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let path = self.paths.first().map_or(".", String::as_str);
        let names =
            read_entry_names(&env.resolve_path(path)).with_context(|| path.to_string())?;
        for name in names {
            writeln!(stdout, "{}", name.to_string_lossy())?;
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Print every environment variable as NAME=value.
pub struct Environ {}

impl BuiltinCommand for Environ {
    fn name() -> &'static str {
        "environ"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        for (name, value) in &env.vars {
            writeln!(stdout, "{}={}", name, value)?;
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Set an environment variable for the shell and every command it starts.
pub struct Set {
    #[argh(positional, greedy)]
    /// the variable name followed by its value; further words are ignored.
    pub args: Vec<String>,
}

impl BuiltinCommand for Set {
    fn name() -> &'static str {
        "set"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let [name, value, ..] = self.args.as_slice() else {
            writeln!(stdout, "Usage: set VARIABLE VALUE")?;
            return Ok(1);
        };
        if name.is_empty() || name.contains(['=', '\0']) {
            bail!("invalid variable name: {}", name);
        }
        if value.contains('\0') {
            bail!("invalid value for {}", name);
        }
        env.set_var(name.as_str(), value.as_str());
        debug!(%name, %value, "variable set");
        Ok(0)
    }
}

/// Write the words to standard output, each followed by a single space.
///
/// Words are printed verbatim, flags included, so this type implements
/// [`FromArgs`] by hand instead of deriving it.
pub struct Echo {
    /// values to print as-is.
    pub words: Vec<String>,
}

impl FromArgs for Echo {
    fn from_args(_command_name: &[&str], args: &[&str]) -> Result<Self, EarlyExit> {
        Ok(Echo {
            words: args.iter().map(|s| s.to_string()).collect(),
        })
    }
}

impl BuiltinCommand for Echo {
    fn name() -> &'static str {
        "echo"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        _env: &mut Environment,
    ) -> Result<ExitCode> {
        for word in &self.words {
            write!(stdout, "{} ", word)?;
        }
        writeln!(stdout)?;
        Ok(0)
    }
}

const HELP_TEXT: &str = "\
\n----- MyShell Help -----
cd [dir]        Change directory
dir [dir]       List directory contents
environ         List environment variables
set var value   Set environment variable
echo text       Display text
help            Show this help
pause           Wait for Enter
quit            Exit shell
Supports redirection (<, >, >>) and background (&)
";

#[derive(FromArgs)]
/// Print a summary of the built-in commands.
pub struct Help {}

impl BuiltinCommand for Help {
    fn name() -> &'static str {
        "help"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        _env: &mut Environment,
    ) -> Result<ExitCode> {
        stdout.write_all(HELP_TEXT.as_bytes())?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Wait until Enter is pressed.
pub struct Pause {}

impl BuiltinCommand for Pause {
    fn name() -> &'static str {
        "pause"
    }

    fn execute(
        self,
        stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        _env: &mut Environment,
    ) -> Result<ExitCode> {
        write!(stdout, "Shell paused. Press Enter to continue...")?;
        stdout.flush()?;

        // One byte at a time so nothing after the newline is consumed.
        let mut byte = [0u8; 1];
        loop {
            match stdin.read(&mut byte) {
                Ok(0) => break,
                Ok(_) if byte[0] == b'\n' => break,
                Ok(_) => {}
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Exit the shell.
pub struct Quit {}

impl BuiltinCommand for Quit {
    fn name() -> &'static str {
        "quit"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        _stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        env.should_exit = true;
        Ok(0)
    }
}
