use crate::command::{
    CommandFactory, EXIT_NOT_EXECUTABLE, EXIT_NOT_FOUND, ExecutableCommand, ExitCode, Stdin,
    Stdout, report,
};
use crate::env::Environment;
use crate::interpreter::Factory;
use crate::parser::ParsedCommand;
use anyhow::{Context, Result};
use std::borrow::Cow;
use std::ffi::OsStr;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::process::ExitStatus;
use tracing::{debug, info};

/// Search path used when the shell context has no `PATH` variable.
pub const DEFAULT_PATH: &str = "/usr/local/bin:/usr/bin:/bin";

/// Command that is not a builtin.
pub struct ExternalCommand {
    name: String,
    args: Vec<String>,
    background: bool,
}

impl ExternalCommand {
    pub fn new(name: impl Into<String>, args: Vec<String>, background: bool) -> Self {
        Self {
            name: name.into(),
            args,
            background,
        }
    }
}

impl CommandFactory for Factory<ExternalCommand> {
    fn try_create(
        &self,
        _env: &Environment,
        cmd: &ParsedCommand,
    ) -> Option<Box<dyn ExecutableCommand>> {
        Some(Box::new(ExternalCommand::new(
            cmd.name(),
            cmd.args().to_vec(),
            cmd.background,
        )))
    }
}

impl ExecutableCommand for ExternalCommand {
    fn execute(
        self: Box<Self>,
        stdin: Box<dyn Stdin>,
        stdout: Box<dyn Stdout>,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let search_paths = env.get_var("PATH").unwrap_or(DEFAULT_PATH);
        let Some(program) = find_command_path(
            OsStr::new(search_paths),
            &env.current_dir,
            Path::new(&self.name),
        ) else {
            report(format_args!("{}: command not found", self.name));
            return Ok(EXIT_NOT_FOUND);
        };

        let mut command = std::process::Command::new(program.as_ref());
        #[cfg(unix)]
        std::os::unix::process::CommandExt::arg0(&mut command, &self.name);
        command
            .args(&self.args)
            .env_clear()
            .envs(env.vars.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .current_dir(&env.current_dir)
            .stdin(stdin.stdio())
            .stdout(stdout.stdio());

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                report(format_args!("{}: {}", self.name, e));
                return Ok(EXIT_NOT_EXECUTABLE);
            }
            Err(e) => {
                return Err(e).with_context(|| format!("failed to spawn {}", self.name));
            }
        };
        // Drop our copies of the redirection handles now that the child holds them.
        drop(command);

        if self.background {
            info!(pid = child.id(), program = %program.display(), "spawned in background");
            println!("Process running in background PID: {}", child.id());
            env.jobs.track(child);
            return Ok(0);
        }

        debug!(pid = child.id(), program = %program.display(), "spawned in foreground");
        let exit_status = child
            .wait()
            .with_context(|| format!("failed to wait for {}", self.name))?;
        Ok(status_code(exit_status))
    }
}

/// Shell-style exit code of a finished process.
pub(crate) fn status_code(exit_status: ExitStatus) -> ExitCode {
    match exit_status.code() {
        Some(x) => x,
        None => terminated_by_signal(exit_status),
    }
}

#[cfg(unix)]
fn terminated_by_signal(exit_status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    if let Some(signal) = ExitStatusExt::signal(&exit_status) {
        128 + signal
    } else if ExitStatusExt::core_dumped(&exit_status) {
        255
    } else {
        -1
    }
}

#[cfg(not(unix))]
fn terminated_by_signal(_exit_status: ExitStatus) -> i32 {
    -1
}

/// Resolve a command path the way a typical shell would.
///
/// Behavior:
/// - Absolute path: returns it if it names an existing file.
/// - Relative with several components (e.g., `bin/sh`, `./foo`): resolved
///   against `cwd` and returned if it names an existing file.
/// - Single path component: search each directory in `search_paths` (PATH)
///   and return the first executable match. Empty PATH entries mean `cwd`.
/// - Empty path: returns `None`.
///
/// Returns either a borrowed reference to the provided `path` or an owned `PathBuf`
/// when the result had to be built from `cwd` or a PATH entry.
pub fn find_command_path<'a>(
    search_paths: &OsStr,
    cwd: &Path,
    path: &'a Path,
) -> Option<Cow<'a, Path>> {
    if path.is_absolute() {
        return find_by_path(path).map(Cow::Borrowed);
    }

    let mut components = path.components();
    match (components.next(), components.next()) {
        (None, _) => None,
        (Some(Component::Normal(name)), None) => {
            find_in_path(search_paths, cwd, name).map(Cow::Owned)
        }
        _ => {
            let joined = cwd.join(path);
            find_by_path(&joined)?;
            Some(Cow::Owned(joined))
        }
    }
}

fn find_in_path(search_paths: &OsStr, cwd: &Path, cmd: &OsStr) -> Option<PathBuf> {
    for dir in std::env::split_paths(search_paths) {
        let dir = if dir.as_os_str().is_empty() {
            cwd.to_path_buf()
        } else {
            cwd.join(dir)
        };
        let path = dir.join(cmd);
        if is_executable(&path) {
            return Some(path);
        }
        debug!(candidate = %path.display(), "skipped, not an executable file");
    }
    None
}

fn find_by_path(path: &Path) -> Option<&Path> {
    if path.is_file() { Some(path) } else { None }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
