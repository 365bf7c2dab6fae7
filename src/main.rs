//! ncc command line entry point

use clap::Parser;
use tracing_subscriber::EnvFilter;

use ncc::cli::{Cli, Commands};
use ncc::commands;
use ncc::context::Context;
use ncc::error::Result;

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("NCC_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<i32> {
    if let Commands::Version = cli.command {
        commands::version::run();
        return Ok(0);
    }

    let context = Context::load()?;
    match cli.command {
        Commands::Repository(args) => commands::repository::run(&context, args).map(|()| 0),
        Commands::Credential(args) => commands::credential::run(&context, args).map(|()| 0),
        Commands::Package(args) => commands::package::run(&context, args),
        Commands::Build(args) => commands::build::run(&args).map(|()| 0),
        Commands::Version => Ok(0),
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            let code = e.exit_code();
            eprintln!("{:?}", miette::Report::new(e));
            std::process::exit(code);
        }
    }
}
