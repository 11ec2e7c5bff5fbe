//! Lexical analysis for the shell's line syntax.
//!
//! Tokens are maximal runs of non-whitespace characters. There is no quoting
//! and no escaping; operators such as `<` or `&` are only recognized later,
//! when they stand alone as a whole token.

/// Splits a raw input line into its whitespace-delimited tokens.
///
/// Runs of whitespace (spaces, tabs, line terminators) collapse into one
/// separator, so an empty or blank line yields no tokens at all.
///
/// # Arguments
/// * `line` - The string to be tokenized.
pub fn split_into_tokens(line: &str) -> Vec<String> {
    line.split_whitespace().map(str::to_owned).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whitespace_runs_collapse() {
        assert_eq!(split_into_tokens("a  b\tc"), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_blank_lines_yield_nothing() {
        assert!(split_into_tokens("").is_empty());
        assert!(split_into_tokens("   \t  ").is_empty());
        assert!(split_into_tokens("\r\n").is_empty());
    }

    #[test]
    fn test_operators_glued_to_words_stay_words() {
        assert_eq!(
            split_into_tokens("  echo hi >out.txt &\n"),
            vec!["echo", "hi", ">out.txt", "&"]
        );
    }

    #[test]
    fn test_quotes_have_no_meaning() {
        assert_eq!(
            split_into_tokens("echo \"hello world\""),
            vec!["echo", "\"hello", "world\""]
        );
    }
}
