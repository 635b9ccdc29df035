use clap::Parser;
use krx_rebalancer::cli::{run, Cli};
use krx_rebalancer::logging::init_tracing;

fn main() -> std::process::ExitCode {
    dotenv::dotenv().ok();
    init_tracing();
    run(Cli::parse())
}
