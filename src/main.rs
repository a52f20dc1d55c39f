use std::process::ExitCode;

use argh::FromArgs;
use monosh::lexer::Limits;
use monosh::{Config, ErrorPolicy, Interpreter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// A line-oriented command interpreter: one pipe and one redirection per
/// line, no quoting, every command an external program.
#[derive(FromArgs, Debug)]
struct Args {
    /// maximum number of tokens accepted on one line (default 10)
    #[argh(option, default = "monosh::lexer::DEFAULT_MAX_TOKENS")]
    max_tokens: usize,

    /// maximum length of one line in bytes (default 256)
    #[argh(option, default = "monosh::lexer::DEFAULT_MAX_LINE_BYTES")]
    max_line_bytes: usize,

    /// report rejected lines and keep the session alive instead of exiting
    #[argh(switch)]
    recoverable: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let args: Args = argh::from_env();
    match run(args) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("monosh: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> anyhow::Result<u8> {
    let config = Config {
        limits: Limits {
            max_line_bytes: args.max_line_bytes,
            max_tokens: args.max_tokens,
        },
        policy: if args.recoverable {
            ErrorPolicy::Recoverable
        } else {
            ErrorPolicy::Strict
        },
    };
    let mut interpreter = Interpreter::new(config);
    let code = interpreter.run()?;
    Ok(code as u8)
}
