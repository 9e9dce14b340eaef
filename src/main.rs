use clap::Parser;
use papertrader::cli::{Cli, run};
use papertrader::logging;

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    run(cli)
}
