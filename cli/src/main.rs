mod cli;
mod commands;
mod logging;

use cli::{Cli, Commands};
use commands::{build, serve};

pub fn run() -> anyhow::Result<()> {
    use clap::Parser;

    let cli = Cli::parse();
    logging::init(cli.verbose);
    match &cli.command {
        Commands::Build(args) => build::run(&cli, args),
        Commands::Serve(args) => serve::run(&cli, args),
    }
}

fn main() -> anyhow::Result<()> { run() }
