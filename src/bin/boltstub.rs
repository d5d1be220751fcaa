//! boltstub Binary
//!
//! Runs one scripted conversation and exits with its verdict.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use boltstub::{Config, ExitStatus, Script, StubServer};
use clap::{ArgAction, Parser};
use tracing_subscriber::{fmt, EnvFilter};

/// Scriptable stub Bolt server
#[derive(Parser, Debug)]
#[command(name = "boltstub")]
#[command(about = "Play the server side of a scripted Bolt conversation")]
#[command(version)]
struct Args {
    /// Listen address (host:port, :port or port)
    #[arg(short, long, env = "BOLTSTUB_LISTEN_ADDR", default_value = "127.0.0.1:17687")]
    listen: String,

    /// Inactivity timeout in seconds (waits forever if unset)
    #[arg(short, long)]
    timeout: Option<f64>,

    /// More output (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Script file describing the conversation
    script: PathBuf,
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize tracing/logging; diagnostics go to stderr
    let default_level = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,boltstub={}", default_level)));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("boltstub v{}", boltstub::VERSION);

    let outcome = run(&args);
    ExitStatus::report(&outcome).into()
}

fn run(args: &Args) -> boltstub::Result<boltstub::State> {
    let timeout = match args.timeout {
        Some(secs) => match Duration::try_from_secs_f64(secs) {
            Ok(timeout) if !timeout.is_zero() => Some(timeout),
            _ => {
                return Err(boltstub::StubError::Config(format!(
                    "timeout must be a positive number of seconds, got {}",
                    secs
                )))
            }
        },
        None => None,
    };

    // Script problems are reported before any socket is opened
    let script = Script::load(&args.script)?;
    tracing::info!("Script: {}", args.script.display());

    let config = Config::builder()
        .listen_addr(Config::parse_listen_addr(&args.listen)?)
        .timeout(timeout)
        .build();

    let server = StubServer::bind(config)?;
    server.run(&script)
}
