//! Syntax analysis: classifying one line of tokens into an executable shape.
//!
//! The grammar allows at most one redirection and at most one pipe per line.
//! A redirection is a single token whose first byte is `<` or `>` and whose
//! remainder is the target path (`>out.txt`); a pipe is the bare token `|`.
//! Everything else is an ordinary argv word.

/// Direction of a redirection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectKind {
    /// Input redirection (`<path`): the child reads standard input from the file.
    Input,
    /// Output redirection (`>path`): the child writes standard output to the
    /// file, creating or truncating it.
    Output,
}

impl std::fmt::Display for RedirectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RedirectKind::Input => write!(f, "input"),
            RedirectKind::Output => write!(f, "output"),
        }
    }
}

/// A validated redirection: direction plus a non-empty target path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub kind: RedirectKind,
    pub target: String,
}

/// The shape of one parsed line, ready for execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedLine {
    /// No redirection, no pipe: the full token list is the argv.
    Simple { argv: Vec<String> },
    /// One redirection: argv is every token before the redirect token;
    /// tokens after it are dropped.
    Redirected { argv: Vec<String>, redirect: Redirect },
    /// One pipe: `left` feeds `right` through it.
    Piped { left: Vec<String>, right: Vec<String> },
    /// One pipe plus one redirection. An `Input` redirect feeds the left
    /// command, an `Output` redirect drains the right one; the validated
    /// token order guarantees there is no other combination.
    PipedWithRedirect {
        left: Vec<String>,
        right: Vec<String>,
        redirect: Redirect,
    },
}

/// Errors that can occur while classifying a token list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsingError {
    /// A second redirect token was found. Carries the direction of the
    /// second token, which is the one being reported.
    MultipleRedirects(RedirectKind),
    /// A redirect token with nothing after its direction byte. The target
    /// must be part of the same token, so a spaced `> path` form lands here.
    EmptyRedirectTarget(RedirectKind),
    /// An input redirect after the pipe, or an output redirect before it.
    MisplacedRedirect(RedirectKind),
    /// The pipe is the first or last token of the line.
    InvalidPipePosition,
}

impl std::fmt::Display for ParsingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParsingError::MultipleRedirects(kind) => {
                write!(f, "multiple {kind} redirects on one line")
            }
            ParsingError::EmptyRedirectTarget(kind) => {
                write!(f, "{kind} redirect has no target path")
            }
            ParsingError::MisplacedRedirect(RedirectKind::Input) => {
                write!(f, "input redirection cannot occur after the pipe")
            }
            ParsingError::MisplacedRedirect(RedirectKind::Output) => {
                write!(f, "output redirection cannot occur before the pipe")
            }
            ParsingError::InvalidPipePosition => {
                write!(f, "a pipe cannot be the first or last token")
            }
        }
    }
}

impl std::error::Error for ParsingError {}

fn redirect_kind(token: &str) -> Option<RedirectKind> {
    match token.as_bytes().first() {
        Some(b'<') => Some(RedirectKind::Input),
        Some(b'>') => Some(RedirectKind::Output),
        _ => None,
    }
}

/// Classifies a non-empty token list into a [`ParsedLine`].
///
/// One left-to-right pass records the position of the first redirect token
/// (a second one is an error) and of the last pipe token: a later `|`
/// overwrites an earlier one, so only the last pipe splits the line and any
/// earlier `|` stays in the left command's argv as an ordinary word.
pub fn parse_line(tokens: Vec<String>) -> Result<ParsedLine, ParsingError> {
    let mut redirect_at: Option<(usize, RedirectKind)> = None;
    let mut pipe_at: Option<usize> = None;

    for (i, token) in tokens.iter().enumerate() {
        if let Some(kind) = redirect_kind(token) {
            if redirect_at.is_some() {
                return Err(ParsingError::MultipleRedirects(kind));
            }
            redirect_at = Some((i, kind));
        }
        if token == "|" {
            pipe_at = Some(i);
        }
    }

    if let Some((i, kind)) = redirect_at {
        if tokens[i].len() == 1 {
            return Err(ParsingError::EmptyRedirectTarget(kind));
        }
    }

    if let (Some((r, kind)), Some(p)) = (redirect_at, pipe_at) {
        match kind {
            RedirectKind::Input if r > p => {
                return Err(ParsingError::MisplacedRedirect(kind));
            }
            RedirectKind::Output if r < p => {
                return Err(ParsingError::MisplacedRedirect(kind));
            }
            _ => {}
        }
    }

    if let Some(p) = pipe_at {
        if p == 0 || p == tokens.len() - 1 {
            return Err(ParsingError::InvalidPipePosition);
        }
    }

    let line = match (redirect_at, pipe_at) {
        (None, None) => ParsedLine::Simple { argv: tokens },
        (Some((r, kind)), None) => {
            let target = tokens[r][1..].to_string();
            let argv = tokens.into_iter().take(r).collect();
            ParsedLine::Redirected {
                argv,
                redirect: Redirect { kind, target },
            }
        }
        (None, Some(p)) => {
            let (left, right) = split_around(tokens, p, None);
            ParsedLine::Piped { left, right }
        }
        (Some((r, kind)), Some(p)) => {
            let target = tokens[r][1..].to_string();
            let (left, right) = split_around(tokens, p, Some(r));
            ParsedLine::PipedWithRedirect {
                left,
                right,
                redirect: Redirect { kind, target },
            }
        }
    };
    Ok(line)
}

/// Splits the tokens around the pipe position, dropping the pipe token itself
/// and the redirect token (if any) from whichever side holds it.
fn split_around(
    tokens: Vec<String>,
    pipe: usize,
    redirect: Option<usize>,
) -> (Vec<String>, Vec<String>) {
    let mut left = Vec::new();
    let mut right = Vec::new();
    for (i, token) in tokens.into_iter().enumerate() {
        if i == pipe || Some(i) == redirect {
            continue;
        }
        if i < pipe {
            left.push(token);
        } else {
            right.push(token);
        }
    }
    (left, right)
}
