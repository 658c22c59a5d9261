use clap::Parser;
use dateiexperte::cli::{Cli, init_logging, run_cli};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;
    run_cli(cli)
}
