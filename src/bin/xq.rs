//! `xq` command-line front end.
//!
//! Resolves the source and expression from the command line, runs the query
//! pipeline and maps the outcome to an exit code.

use std::io::{self, IsTerminal};
use std::process::ExitCode;
use std::time::Duration;

use clap::error::ErrorKind;
use clap::{ArgAction, CommandFactory, Parser};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use xq::args::{self, Arguments};
use xq::{BuildInfo, Config, FetchOptions, XqError};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// xq -- query an XML document with XPath.
///
/// Every match is printed on its own line. SRC may be a local path, a
/// `file://`, `http://` or `https://` URI, or `-` for stdin (the default).
#[derive(Parser, Debug)]
#[command(name = "xq", disable_version_flag = true, about, long_about = None)]
struct Cli {
    /// Source of the XML document.
    #[arg(long = "file", value_name = "SRC")]
    file: Option<String>,

    /// Source of the XML document (`--file` wins if both are given).
    #[arg(short = 'f', value_name = "SRC")]
    f: Option<String>,

    /// XPath expression to evaluate.
    #[arg(long = "xpath", value_name = "EXPR")]
    xpath: Option<String>,

    /// XPath expression to evaluate (`--xpath` wins if both are given).
    #[arg(short = 'x', value_name = "EXPR")]
    x: Option<String>,

    /// Give up on HTTP sources after this many seconds.
    #[arg(long, value_name = "SECONDS")]
    timeout: Option<u64>,

    /// Log what xq is doing to stderr.
    #[arg(long)]
    verbose: bool,

    /// Print build information and exit.
    #[arg(short = 'v', long = "version", action = ArgAction::SetTrue)]
    version: bool,
}

// ---------------------------------------------------------------------------
// Exit codes
// ---------------------------------------------------------------------------

const EXIT_SUCCESS: u8 = 0;
const EXIT_FAILURE: u8 = 1;

// ---------------------------------------------------------------------------
// Main entry point
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            return match e.kind() {
                // stdout carries matches only
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                    eprint!("{}", e.render());
                    ExitCode::from(EXIT_SUCCESS)
                }
                _ => {
                    let _ = e.print();
                    ExitCode::from(EXIT_FAILURE)
                }
            };
        }
    };

    init_logging(cli.verbose);

    if cli.version {
        eprintln!("{}", BuildInfo::current());
        return ExitCode::from(EXIT_SUCCESS);
    }

    let arguments = match args::resolve(
        cli.file.as_deref(),
        cli.f.as_deref(),
        cli.xpath.as_deref(),
        cli.x.as_deref(),
    ) {
        Ok(arguments) => arguments,
        Err(e) => {
            eprintln!("error: {e}\n\n{}", Cli::command().render_usage());
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    ExitCode::from(execute(&arguments, &config(&cli)))
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_target(false)
        .init();
}

fn config(cli: &Cli) -> Config {
    Config::default().fetch(FetchOptions::default().timeout(cli.timeout.map(Duration::from_secs)))
}

/// Runs the pipeline and returns an exit code.
fn execute(arguments: &Arguments, config: &Config) -> u8 {
    if arguments.source_defaulted && io::stdin().is_terminal() {
        warn!("no --file given, reading the document from the terminal");
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match xq::run(&arguments.source, &arguments.xpath, config, &mut out) {
        Ok(_) => EXIT_SUCCESS,
        Err(e) if e.is_broken_pipe() => EXIT_SUCCESS,
        Err(e) => {
            report(&e);
            EXIT_FAILURE
        }
    }
}

fn report(err: &XqError) {
    match err {
        XqError::InvalidSource { reason, .. } => {
            eprintln!("{err}");
            let mut cause = std::error::Error::source(reason);
            while let Some(c) = cause {
                eprintln!("  caused by: {c}");
                cause = c.source();
            }
        }
        _ => eprintln!("{err}"),
    }
}
