//! Lexical analysis for the interpreter: splitting an input line into tokens.
//!
//! The token grammar is deliberately small. A token is a maximal run of
//! non-whitespace bytes; there is no quoting or escaping, so the splitter is
//! a bounded whitespace scan rather than a state machine.

/// Caps applied to every input line before it reaches the parser.
///
/// The defaults mirror the interpreter's historical fixed buffers: a
/// 256-byte line and at most 10 tokens per line. Exceeding either cap
/// rejects the whole line with a [`LexingError`] instead of truncating it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Maximum length of one input line, in bytes.
    pub max_line_bytes: usize,
    /// Maximum number of tokens one line may produce.
    pub max_tokens: usize,
}

pub const DEFAULT_MAX_LINE_BYTES: usize = 256;
pub const DEFAULT_MAX_TOKENS: usize = 10;

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

/// Errors that can occur while splitting a line into tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LexingError {
    /// The raw line exceeds [`Limits::max_line_bytes`].
    LineTooLong { len: usize, max: usize },
    /// The line splits into more than [`Limits::max_tokens`] tokens.
    TooManyTokens { max: usize },
}

impl std::fmt::Display for LexingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LexingError::LineTooLong { len, max } => {
                write!(f, "line is {len} bytes, the limit is {max}")
            }
            LexingError::TooManyTokens { max } => {
                write!(f, "too many tokens on one line, the limit is {max}")
            }
        }
    }
}

impl std::error::Error for LexingError {}

/// Splits `line` into owned, whitespace-separated tokens.
///
/// An empty or all-whitespace line yields an empty vector; the session loop
/// re-prompts in that case. Token storage is allocated fresh per line, so
/// nothing carries over from previous lines.
pub fn split_into_tokens(line: &str, limits: &Limits) -> Result<Vec<String>, LexingError> {
    if line.len() > limits.max_line_bytes {
        return Err(LexingError::LineTooLong {
            len: line.len(),
            max: limits.max_line_bytes,
        });
    }

    let mut tokens = Vec::new();
    for word in line.split_ascii_whitespace() {
        if tokens.len() == limits.max_tokens {
            return Err(LexingError::TooManyTokens {
                max: limits.max_tokens,
            });
        }
        tokens.push(word.to_string());
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(line: &str) -> Vec<String> {
        split_into_tokens(line, &Limits::default()).unwrap()
    }

    #[test]
    fn splits_on_runs_of_whitespace() {
        assert_eq!(toks("ls -l  /tmp"), vec!["ls", "-l", "/tmp"]);
        assert_eq!(toks("\tcat\t<in.txt "), vec!["cat", "<in.txt"]);
    }

    #[test]
    fn empty_and_blank_lines_yield_no_tokens() {
        assert!(toks("").is_empty());
        assert!(toks(" \t ").is_empty());
    }

    #[test]
    fn operators_are_plain_tokens() {
        assert_eq!(toks("a | b >c"), vec!["a", "|", "b", ">c"]);
    }

    #[test]
    fn line_over_the_byte_limit_is_rejected() {
        let limits = Limits {
            max_line_bytes: 8,
            max_tokens: 10,
        };
        let err = split_into_tokens("123456789", &limits).unwrap_err();
        assert_eq!(err, LexingError::LineTooLong { len: 9, max: 8 });
    }

    #[test]
    fn line_at_the_byte_limit_is_accepted() {
        let limits = Limits {
            max_line_bytes: 8,
            max_tokens: 10,
        };
        let tokens = split_into_tokens("12345678", &limits).unwrap();
        assert_eq!(tokens, vec!["12345678"]);
    }

    #[test]
    fn too_many_tokens_is_rejected_not_truncated() {
        let limits = Limits {
            max_line_bytes: 256,
            max_tokens: 3,
        };
        let err = split_into_tokens("a b c d", &limits).unwrap_err();
        assert_eq!(err, LexingError::TooManyTokens { max: 3 });
        assert_eq!(split_into_tokens("a b c", &limits).unwrap().len(), 3);
    }
}
