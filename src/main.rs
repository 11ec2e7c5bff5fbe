use argh::FromArgs;
use myshell::Interpreter;
use std::env;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process;
use tracing::{debug, info};

#[derive(FromArgs)]
/// A minimal shell. Reads commands from BATCH_FILE when given, from the terminal otherwise.
struct Args {
    #[argh(switch)]
    /// log at debug level (RUST_LOG overrides).
    debug: bool,

    #[argh(positional)]
    /// file with one command per line.
    batch_file: Option<PathBuf>,
}

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "warn" };
    let env_filter = env::var("RUST_LOG").unwrap_or_else(|_| default_level.to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from(env_filter))
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .without_time()
        .compact()
        .init();
}

fn main() {
    let args: Args = argh::from_env();
    init_logging(args.debug);
    info!("starting myshell v{}", env!("CARGO_PKG_VERSION"));

    let mut shell = Interpreter::default();
    match args.batch_file {
        Some(path) => {
            if let Err(e) = shell.run_batch(&path) {
                eprintln!("myshell: {:#}", e);
                process::exit(1);
            }
        }
        None => {
            if let Err(e) = shell.repl() {
                eprintln!("myshell: {}", e);
                process::exit(1);
            }
        }
    }

    debug!(
        background = ?shell.env().jobs.pids(),
        "exiting, background children left running"
    );
    process::exit(0);
}
