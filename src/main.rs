use clap::Parser;
use vatrader::cli::{run, Cli};
use vatrader::logging::init_logging;

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    run(cli)
}
