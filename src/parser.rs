//! Classification of a token sequence into a runnable command line.
//!
//! The line grammar is flat: `command [args...] [< in] [> out | >> out] [&]`,
//! with the redirection operators allowed anywhere among the words and the
//! background marker only recognized as the very last token.

use std::path::PathBuf;

/// Background marker, recognized only as the last token.
pub const BACKGROUND_OP: &str = "&";
/// Input redirection operator.
pub const INPUT_OP: &str = "<";
/// Truncating output redirection operator.
pub const OUTPUT_OP: &str = ">";
/// Appending output redirection operator.
pub const APPEND_OP: &str = ">>";

/// Where standard output of a command should go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRedirect {
    /// The file receiving the output, relative to the shell's working directory.
    pub path: PathBuf,
    /// `true` for `>>` (append), `false` for `>` (truncate).
    pub append: bool,
}

/// A command line with its redirection and background markers extracted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    /// The command name followed by its arguments. Never empty when produced by [`classify`].
    pub argv: Vec<String>,
    /// File to read standard input from (`<`).
    pub input: Option<PathBuf>,
    /// File to write standard output to (`>` or `>>`).
    pub output: Option<OutputRedirect>,
    /// Whether the line ended with `&`.
    pub background: bool,
}

impl ParsedCommand {
    /// The command name, `argv[0]`, or `""` for a hand-built empty `argv`.
    pub fn name(&self) -> &str {
        self.argv.first().map_or("", String::as_str)
    }

    /// The arguments following the command name.
    pub fn args(&self) -> &[String] {
        self.argv.get(1..).unwrap_or_default()
    }
}

/// Errors that can occur while classifying a token sequence.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParsingError {
    /// A redirection operator was the last token, or was followed by another operator.
    #[error("syntax error: expected a file name after '{0}'")]
    MissingRedirectTarget(String),
}

fn is_operator(token: &str) -> bool {
    matches!(token, INPUT_OP | OUTPUT_OP | APPEND_OP)
}

struct Classifier {
    tokens: Vec<String>,
    pos: usize,
}

impl Classifier {
    fn from(tokens: Vec<String>) -> Self {
        Classifier { tokens, pos: 0 }
    }

    fn consume(&mut self) -> Option<String> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// First pass: strip a trailing background marker.
    fn take_background(&mut self) -> bool {
        if self.tokens.last().map(String::as_str) == Some(BACKGROUND_OP) {
            self.tokens.pop();
            true
        } else {
            false
        }
    }

    /// Consume the target of the operator `op` that was just read.
    fn redirect_target(&mut self, op: &str) -> Result<PathBuf, ParsingError> {
        match self.consume() {
            Some(target) if !is_operator(&target) => Ok(PathBuf::from(target)),
            _ => Err(ParsingError::MissingRedirectTarget(op.to_string())),
        }
    }

    /// Second pass: pull redirections out of the remaining tokens.
    fn build(mut self) -> Result<Option<ParsedCommand>, ParsingError> {
        let background = self.take_background();

        let mut argv = Vec::new();
        let mut input = None;
        let mut output = None;

        while let Some(token) = self.consume() {
            match token.as_str() {
                INPUT_OP => input = Some(self.redirect_target(INPUT_OP)?),
                OUTPUT_OP | APPEND_OP => {
                    let path = self.redirect_target(&token)?;
                    output = Some(OutputRedirect {
                        path,
                        append: token == APPEND_OP,
                    });
                }
                _ => argv.push(token),
            }
        }

        if argv.is_empty() {
            return Ok(None);
        }

        Ok(Some(ParsedCommand {
            argv,
            input,
            output,
            background,
        }))
    }
}

/// Classifies a token sequence into a [`ParsedCommand`].
///
/// Returns `Ok(None)` when nothing is left to run once the background marker
/// and all redirections are removed, which includes the empty sequence.
pub fn classify(tokens: Vec<String>) -> Result<Option<ParsedCommand>, ParsingError> {
    Classifier::from(tokens).build()
}
