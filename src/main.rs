mod commands;
mod debugger;
mod logging;

use std::env;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};

const USAGE: &str = "usage: xdc [--connect HOST:PORT] [--breakpoints FILE]";

/// Command-line options.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct Args {
    /// Connect to an engine instead of waiting for one.
    pub(crate) connect: Option<String>,
    /// JSON breakpoint file sent after the engine connects.
    pub(crate) breakpoints: Option<PathBuf>,
    pub(crate) help: bool,
}

impl Args {
    fn parse<I: IntoIterator<Item = String>>(args: I) -> Result<Self> {
        let mut parsed = Self::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--connect" | "-c" => {
                    let addr = args.next().context("--connect needs HOST:PORT")?;
                    parsed.connect = Some(addr);
                }
                "--breakpoints" | "-b" => {
                    let file = args.next().context("--breakpoints needs a file")?;
                    parsed.breakpoints = Some(PathBuf::from(file));
                }
                "--help" | "-h" => parsed.help = true,
                other => bail!("unexpected argument `{other}`\n{USAGE}"),
            }
        }
        Ok(parsed)
    }
}

fn run() -> Result<()> {
    let args = Args::parse(env::args().skip(1))?;
    if args.help {
        println!("{USAGE}\n\n{}", commands::HELP);
        return Ok(());
    }
    debugger::run_debugger(args)
}

fn main() {
    if let Err(e) = run() {
        eprintln!("xdc: {:#}", e);
        std::process::exit(1);
    }
}
