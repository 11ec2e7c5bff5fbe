use crate::command::{CommandFactory, ExitCode, Stdin, Stdout, report};
use crate::env::Environment;
use crate::lexer;
use crate::parser::{self, OutputRedirect, ParsedCommand};
use anyhow::{Context, anyhow};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, IsTerminal, Read, Write};
use std::path::Path;
use std::process::Stdio;
use tracing::{debug, info};

/// Factory allows creating instances of ExecutableCommand.
///
/// Only support commands defined in this crate — BuiltinCommand and ExternalCommand.
pub(crate) struct Factory<T> {
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

/// A minimal shell that runs built-in and external commands line by line.
///
/// The interpreter owns the shell context ([`Environment`]) and a list of
/// [`CommandFactory`] objects that are queried in order to create the command
/// named on a line. See [`Default`] for the factories included out of the box.
///
/// Example
/// ```
/// use myshell::Interpreter;
/// let mut sh = Interpreter::default();
/// let code = sh.execute_line("echo hello world");
/// assert_eq!(code, 0);
/// ```
pub struct Interpreter {
    env: Environment,
    commands: Vec<Box<dyn CommandFactory>>,
    last_status: ExitCode,
}

impl Interpreter {
    /// Create a new interpreter over the current process state with a custom
    /// set of command factories.
    pub fn new(commands: Vec<Box<dyn CommandFactory>>) -> Self {
        Self::with_environment(Environment::new(), commands)
    }

    /// Create an interpreter over an explicit shell context.
    pub fn with_environment(env: Environment, commands: Vec<Box<dyn CommandFactory>>) -> Self {
        Self {
            env,
            commands,
            last_status: 0,
        }
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut Environment {
        &mut self.env
    }

    /// Whether `quit` has run.
    pub fn should_exit(&self) -> bool {
        self.env.should_exit
    }

    /// Exit status of the most recent command that ran.
    pub fn last_status(&self) -> ExitCode {
        self.last_status
    }

    /// Run one classified command.
    ///
    /// `stdin` and `stdout` are used unless the command redirects them. Redirection
    /// files are opened here, before any command is created, and are closed when the
    /// command returns.
    pub fn run(
        &mut self,
        cmd: &ParsedCommand,
        stdin: Box<dyn Stdin>,
        stdout: Box<dyn Stdout>,
    ) -> anyhow::Result<ExitCode> {
        let stdin: Box<dyn Stdin> = match &cmd.input {
            Some(path) => Box::new(open_input(&self.env.resolve_path(path))?),
            None => stdin,
        };
        let stdout: Box<dyn Stdout> = match &cmd.output {
            Some(redirect) => Box::new(open_output(&self.env, redirect)?),
            None => stdout,
        };

        for factory in &self.commands {
            if let Some(command) = factory.try_create(&self.env, cmd) {
                return command.execute(stdin, stdout, &mut self.env);
            }
        }
        Err(anyhow!("{}: command not found", cmd.name()))
    }

    /// Tokenize, classify and run one line with the given default streams.
    ///
    /// Returns `Ok(None)` when the line holds no command.
    pub fn execute_line_with_io(
        &mut self,
        line: &str,
        stdin: Box<dyn Stdin>,
        stdout: Box<dyn Stdout>,
    ) -> anyhow::Result<Option<ExitCode>> {
        self.env.jobs.reap();

        let tokens = lexer::split_into_tokens(line);
        let Some(cmd) = parser::classify(tokens)? else {
            return Ok(None);
        };
        debug!(?cmd, "dispatching");
        self.run(&cmd, stdin, stdout).map(Some)
    }

    /// Run one line against the shell's own standard streams.
    ///
    /// Errors are reported on standard error and never stop the shell; the
    /// returned value is the status of the line (the previous status for a
    /// line holding no command).
    pub fn execute_line(&mut self, line: &str) -> ExitCode {
        let stdin = InheritedStdin(std::io::stdin().lock());
        match self.execute_line_with_io(line, Box::new(stdin), Box::new(std::io::stdout())) {
            Ok(Some(code)) => self.last_status = code,
            Ok(None) => {}
            Err(e) => {
                debug!(%line, error = %e, "command failed");
                report(format_args!("{:#}", e));
                self.last_status = 1;
            }
        }
        self.last_status
    }

    /// Run every line of `path` in order, stopping early after `quit`.
    ///
    /// Fails only when the file cannot be opened or read.
    pub fn run_batch(&mut self, path: &Path) -> anyhow::Result<()> {
        let file = File::open(path)
            .with_context(|| format!("batch file not found: {}", path.display()))?;
        info!(path = %path.display(), "running batch file");

        for line in BufReader::new(file).split(b'\n') {
            let line = line.with_context(|| format!("cannot read {}", path.display()))?;
            self.execute_line(&String::from_utf8_lossy(&line));
            if self.env.should_exit {
                break;
            }
        }
        Ok(())
    }

    /// Interactive read-execute loop with a `<cwd> > ` prompt.
    ///
    /// Ends on `quit` or end of input. When standard input is not a terminal
    /// the line editor is bypassed, but the prompt is still printed.
    pub fn repl(&mut self) -> rustyline::Result<()> {
        if !std::io::stdin().is_terminal() {
            return Ok(self.repl_piped()?);
        }
        let mut rl = DefaultEditor::new()?;

        while !self.env.should_exit {
            match rl.readline(&self.prompt()) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        rl.add_history_entry(line.as_str())?;
                    }
                    self.execute_line(&line);
                }
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => {
                    debug!("end of input");
                    break;
                }
                Err(err) => return Err(err),
            }
        }

        Ok(())
    }

    fn prompt(&self) -> String {
        format!("{} > ", self.env.current_dir.display())
    }

    fn repl_piped(&mut self) -> std::io::Result<()> {
        let mut line = Vec::new();
        while !self.env.should_exit {
            let mut stdout = std::io::stdout();
            write!(stdout, "{}", self.prompt())?;
            stdout.flush()?;

            line.clear();
            // The lock is released before the line runs, so commands can read stdin.
            if std::io::stdin().lock().read_until(b'\n', &mut line)? == 0 {
                debug!("end of input");
                break;
            }
            let text = String::from_utf8_lossy(&line);
            self.execute_line(text.trim_end_matches(['\n', '\r']));
        }
        Ok(())
    }
}

fn open_input(path: &Path) -> anyhow::Result<File> {
    File::open(path).with_context(|| format!("input redirection: {}", path.display()))
}

fn open_output(env: &Environment, redirect: &OutputRedirect) -> anyhow::Result<File> {
    let path = env.resolve_path(&redirect.path);
    let mut options = OpenOptions::new();
    options.write(true).create(true);
    if redirect.append {
        options.append(true);
    } else {
        options.truncate(true);
    }
    #[cfg(unix)]
    std::os::unix::fs::OpenOptionsExt::mode(&mut options, 0o644);
    options
        .open(&path)
        .with_context(|| format!("output redirection: {}", path.display()))
}

impl Default for Interpreter {
    /// Create an interpreter with the default set of commands:
    /// - built-ins: `cd`, `dir`, `environ`, `set`, `echo`, `help`, `pause`, `quit`
    /// - external command launcher, tried last
    fn default() -> Self {
        use crate::builtin::*;
        use crate::external::ExternalCommand;
        Self::new(vec![
            Box::new(Factory::<Cd>::default()),
            Box::new(Factory::<Dir>::default()),
            Box::new(Factory::<Environ>::default()),
            Box::new(Factory::<Set>::default()),
            Box::new(Factory::<Echo>::default()),
            Box::new(Factory::<Help>::default()),
            Box::new(Factory::<Pause>::default()),
            Box::new(Factory::<Quit>::default()),
            Box::new(Factory::<ExternalCommand>::default()),
        ])
    }
}

struct InheritedStdin<'a>(std::io::StdinLock<'a>);

impl Read for InheritedStdin<'_> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.0.read(buf)
    }
}

impl Stdin for InheritedStdin<'_> {
    fn stdio(self: Box<Self>) -> Stdio {
        Stdio::inherit()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use crate::Interpreter;
    use crate::command::ExitCode;
    use crate::env::Environment;
    use crate::io_adapters::{Captured, MemReader, MemWriter};
    use crate::parser::{ParsedCommand, ParsingError};
    use std::fs;
    use std::path::PathBuf;
    use std::time::{Duration, Instant};

    fn shell() -> (tempfile::TempDir, PathBuf, Interpreter) {
        let tmp = tempfile::tempdir().unwrap();
        let base = fs::canonicalize(tmp.path()).unwrap();
        let mut env = Environment::with_dir(&base);
        env.set_var("PATH", "/usr/bin:/bin");
        let defaults = Interpreter::default();
        let sh = Interpreter::with_environment(env, defaults.commands);
        (tmp, base, sh)
    }

    fn line(sh: &mut Interpreter, text: &str) -> (anyhow::Result<Option<ExitCode>>, Captured) {
        line_with_input(sh, text, "")
    }

    fn line_with_input(
        sh: &mut Interpreter,
        text: &str,
        input: &str,
    ) -> (anyhow::Result<Option<ExitCode>>, Captured) {
        let (writer, out) = MemWriter::with_handle();
        let res = sh.execute_line_with_io(text, Box::new(MemReader::from(input)), Box::new(writer));
        (res, out)
    }

    #[test]
    fn test_blank_lines_do_nothing() {
        let (_tmp, _base, mut sh) = shell();
        for text in ["", "   ", "\t \t"] {
            let (res, out) = line(&mut sh, text);
            assert_eq!(res.unwrap(), None);
            assert!(out.contents().is_empty());
        }
    }

    #[test]
    fn test_echo_redirect_truncates_then_appends() {
        let (_tmp, base, mut sh) = shell();
        let out_path = base.join("out.txt");
        fs::write(&out_path, "old contents that must go away\n").unwrap();

        let (res, out) = line(&mut sh, "echo hello > out.txt");
        assert_eq!(res.unwrap(), Some(0));
        assert!(out.contents().is_empty());
        assert_eq!(fs::read_to_string(&out_path).unwrap(), "hello \n");

        let (res, _) = line(&mut sh, "echo again >> out.txt");
        assert_eq!(res.unwrap(), Some(0));
        assert_eq!(fs::read_to_string(&out_path).unwrap(), "hello \nagain \n");
    }

    #[test]
    fn test_set_is_visible_to_environ_and_children() {
        let (_tmp, base, mut sh) = shell();

        let (res, _) = line(&mut sh, "set FOO bar");
        assert_eq!(res.unwrap(), Some(0));

        let (_, out) = line(&mut sh, "environ");
        assert!(out.contents().lines().any(|l| l == "FOO=bar"));

        let (res, _) = line(&mut sh, "env > child_env.txt");
        assert_eq!(res.unwrap(), Some(0));
        let child_env = fs::read_to_string(base.join("child_env.txt")).unwrap();
        assert!(child_env.lines().any(|l| l == "FOO=bar"));
    }

    #[test]
    fn test_cd_changes_reported_directory_and_pwd() {
        let (_tmp, base, mut sh) = shell();
        let target = base.join("target");
        fs::create_dir(&target).unwrap();

        let (res, _) = line(&mut sh, &format!("cd {}", target.display()));
        assert_eq!(res.unwrap(), Some(0));

        let (_, out) = line(&mut sh, "cd");
        assert_eq!(out.contents(), format!("{}\n", target.display()));
        assert_eq!(sh.env().get_var("PWD"), Some(target.to_str().unwrap()));

        let (res, _) = line(&mut sh, "cd /nonexistent-path");
        assert!(res.is_err());
        assert_eq!(sh.env().current_dir, target);
    }

    #[test]
    fn test_relative_redirects_follow_cd() {
        let (_tmp, base, mut sh) = shell();
        fs::create_dir(base.join("sub")).unwrap();
        fs::write(base.join("sub").join("in.txt"), "b\na\n").unwrap();

        line(&mut sh, "cd sub").0.unwrap();
        let (res, _) = line(&mut sh, "sort < in.txt > sorted.txt");
        assert_eq!(res.unwrap(), Some(0));
        assert_eq!(
            fs::read_to_string(base.join("sub").join("sorted.txt")).unwrap(),
            "a\nb\n"
        );
    }

    #[test]
    fn test_missing_input_file_spawns_nothing() {
        let (_tmp, base, mut sh) = shell();
        let (res, _) = line(&mut sh, "cat < missing.txt > out.txt");

        let err = res.unwrap_err();
        assert!(format!("{:#}", err).starts_with("input redirection: "));
        assert!(!base.join("out.txt").exists());
    }

    #[test]
    fn test_operator_only_line_creates_nothing() {
        let (_tmp, base, mut sh) = shell();
        let (res, _) = line(&mut sh, "> out.txt");
        assert_eq!(res.unwrap(), None);
        assert!(!base.join("out.txt").exists());
    }

    #[test]
    fn test_missing_redirect_target_is_a_parse_error() {
        let (_tmp, _base, mut sh) = shell();
        let (res, _) = line(&mut sh, "echo hi >");
        let err = res.unwrap_err();
        assert_eq!(
            err.downcast_ref::<ParsingError>(),
            Some(&ParsingError::MissingRedirectTarget(">".to_string()))
        );
    }

    #[test]
    fn test_unknown_command_is_127_and_shell_continues() {
        let (_tmp, _base, mut sh) = shell();
        let (res, _) = line(&mut sh, "no-such-command-for-myshell --flag");
        assert_eq!(res.unwrap(), Some(127));

        let (res, out) = line(&mut sh, "echo still here");
        assert_eq!(res.unwrap(), Some(0));
        assert_eq!(out.contents(), "still here \n");
    }

    #[test]
    fn test_builtin_reads_redirected_input() {
        let (_tmp, base, mut sh) = shell();
        fs::write(base.join("enter.txt"), "\n").unwrap();

        let (res, out) = line_with_input(&mut sh, "pause < enter.txt", "never read");
        assert_eq!(res.unwrap(), Some(0));
        assert_eq!(out.contents(), "Shell paused. Press Enter to continue...");
    }

    #[test]
    fn test_foreground_waits_background_does_not() {
        let (_tmp, _base, mut sh) = shell();

        let started = Instant::now();
        let (res, _) = line(&mut sh, "sleep 1");
        assert_eq!(res.unwrap(), Some(0));
        assert!(started.elapsed() >= Duration::from_secs(1));

        let started = Instant::now();
        let (res, _) = line(&mut sh, "sleep 2 &");
        assert_eq!(res.unwrap(), Some(0));
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(sh.env().jobs.len(), 1);
    }

    #[test]
    fn test_quit_sets_exit_flag() {
        let (_tmp, _base, mut sh) = shell();
        assert!(!sh.should_exit());
        let (res, _) = line(&mut sh, "quit");
        assert_eq!(res.unwrap(), Some(0));
        assert!(sh.should_exit());
    }

    #[test]
    fn test_batch_stops_after_quit() {
        let (_tmp, base, mut sh) = shell();
        let script = base.join("script.txt");
        fs::write(
            &script,
            "echo one >> log.txt\n\nquit\necho two >> log.txt\n",
        )
        .unwrap();

        sh.run_batch(&script).unwrap();

        assert!(sh.should_exit());
        assert_eq!(fs::read_to_string(base.join("log.txt")).unwrap(), "one \n");
    }

    #[test]
    fn test_batch_missing_file_fails() {
        let (_tmp, base, mut sh) = shell();
        let err = sh.run_batch(&base.join("nope.txt")).unwrap_err();
        assert!(err.to_string().starts_with("batch file not found"));
    }

    #[test]
    fn test_hand_built_empty_command_is_not_found() {
        let (_tmp, _base, mut sh) = shell();
        let cmd = ParsedCommand {
            argv: Vec::new(),
            input: None,
            output: None,
            background: false,
        };
        let code = sh
            .run(&cmd, Box::new(MemReader::from("")), Box::new(MemWriter::new()))
            .unwrap();
        assert_eq!(code, 127);
    }
}
