mod analyze;
mod cli;
mod data;
mod metrics;
mod netem;
mod report;
mod setup;
mod units;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::analyze::{run_flent, run_iperf, run_sim};
use crate::setup::run_netem;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .ok();

    let cli = Cli::parse();
    let result: Result<()> = match cli.command {
        Some(Commands::Netem(netem)) => run_netem(netem),
        Some(Commands::Sim(cmd)) => run_sim(cmd),
        Some(Commands::Iperf(cmd)) => run_iperf(cmd),
        Some(Commands::Flent(cmd)) => run_flent(cmd),
        None => {
            Cli::command().print_help().ok();
            println!();
            Ok(())
        }
    };

    if let Err(err) = result {
        let code = exit_code_for_error(&err);
        eprintln!("error: {err:?}");
        std::process::exit(code);
    }
}

pub(crate) fn exit_code_for_error(err: &anyhow::Error) -> i32 {
    // 2: malformed argument, 3: external command failed, 4: bad input data, 1: other
    for cause in err.chain() {
        if cause.is::<crate::units::ParseError>() {
            return 2;
        }
        if cause.is::<crate::netem::exec::ExecError>() {
            return 3;
        }
        if cause.is::<crate::data::LoadError>() {
            return 4;
        }
    }
    1
}
