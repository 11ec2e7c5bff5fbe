use crate::jobs::BackgroundJobs;
use anyhow::{Context, Result, bail};
use std::env as stdenv;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// The shell context every command runs against.
///
/// The environment contains:
/// - `vars`: the variables exported to every child, in the order they were
///   first defined (the process environment's order, then `set` additions).
/// - `current_dir`: the working directory for path resolution and child processes.
/// - `should_exit`: a flag that the line source checks to know when to terminate.
/// - `jobs`: children started in the background and not reaped yet.
///
/// The interpreter owns one `Environment` and never touches the process-wide
/// working directory or variables, so tests can build one by hand.
#[derive(Debug)]
pub struct Environment {
    /// Ordered `NAME=value` pairs; names are unique.
    pub vars: Vec<(String, String)>,
    /// The current working directory for command execution.
    pub current_dir: PathBuf,
    /// When set to true, indicates that the shell loop should exit.
    pub should_exit: bool,
    /// Background children, owned by the shell until they are reaped.
    pub jobs: BackgroundJobs,
}

impl Environment {
    /// Capture the current process state into a new `Environment` instance.
    ///
    /// Variables whose name or value is not valid UTF-8 are left out, so no
    /// child ever inherits an altered value.
    pub fn new() -> Self {
        let vars = utf8_vars(stdenv::vars_os());
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            vars,
            current_dir,
            should_exit: false,
            jobs: BackgroundJobs::new(),
        }
    }

    /// A context with no variables, rooted at `current_dir`.
    pub fn with_dir(current_dir: impl Into<PathBuf>) -> Self {
        Self {
            vars: Vec::new(),
            current_dir: current_dir.into(),
            should_exit: false,
            jobs: BackgroundJobs::new(),
        }
    }

    /// Get the value of an environment variable.
    pub fn get_var(&self, key: &str) -> Option<&str> {
        self.vars
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Set or override an environment variable.
    ///
    /// An existing variable keeps its position; a new one goes last.
    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        let key = key.into();
        let val = val.into();
        match self.vars.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = val,
            None => self.vars.push((key, val)),
        }
    }

    /// Resolve `path` against the current directory.
    pub fn resolve_path(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.current_dir.join(path)
        }
    }

    /// Make `target` the current directory and update `PWD`.
    ///
    /// On error nothing is modified.
    pub fn change_dir(&mut self, target: impl AsRef<Path>) -> Result<&Path> {
        let target = target.as_ref();
        let canonical = fs::canonicalize(self.resolve_path(target))
            .with_context(|| format!("{}", target.display()))?;
        if !canonical.is_dir() {
            bail!("{}: Not a directory", target.display());
        }
        self.set_var("PWD", canonical.to_string_lossy());
        self.current_dir = canonical;
        Ok(&self.current_dir)
    }
}

fn utf8_vars(vars: impl IntoIterator<Item = (OsString, OsString)>) -> Vec<(String, String)> {
    vars.into_iter()
        .filter_map(|(k, v)| match (k.into_string(), v.into_string()) {
            (Ok(k), Ok(v)) => Some((k, v)),
            (k, _) => {
                debug!(name = ?k, "skipping environment variable that is not valid UTF-8");
                None
            }
        })
        .collect()
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}
