use anyhow::{Context, Result};
use tracing::info;

use crate::cli::Netem;
use crate::netem::exec::{apply, CommandRunner, DryRunRunner, SystemRunner};
use crate::netem::{derive_config, render_commands, NetemParams, ShellCommand, Topology};

fn split_args(args: Netem) -> (NetemParams, Topology, bool) {
    let params = NetemParams {
        rate: args.rate,
        rtt: args.rtt,
        limit: args.limit,
        max_buf_size: args.max_buf_size,
        burst_frac: args.burst_frac,
        bdp_policy: args.bdp_policy.into(),
    };
    let topo = Topology { dev: args.dev, ifb: args.ifb, min_mtu: args.min_mtu };
    (params, topo, args.dry_run)
}

/// Parses and sizes everything before touching the system, so a malformed
/// argument never leaves a half-configured device behind.
pub fn plan(args: Netem) -> Result<(Vec<ShellCommand>, bool)> {
    let (params, topo, dry_run) = split_args(args);
    let config = derive_config(&params).context("Invalid NetEm parameters")?;
    info!(
        dev = %topo.dev,
        ifb = %topo.ifb,
        rate_bytes_per_sec = ?config.rate_bytes_per_sec,
        rtt_secs = config.rtt_secs,
        buffer = config.buffer_size_bytes,
        burst = config.burst_size_bytes,
        limit = config.limit_bytes,
        "Derived NetEm configuration"
    );
    Ok((render_commands(&config, &topo), dry_run))
}

pub fn run_netem(args: Netem) -> Result<()> {
    let (cmds, dry_run) = plan(args)?;
    if dry_run {
        execute(&cmds, &mut DryRunRunner)
    } else {
        execute(&cmds, &mut SystemRunner)
    }
}

fn execute<R: CommandRunner>(cmds: &[ShellCommand], runner: &mut R) -> Result<()> {
    apply(cmds, runner).context("Configuring NetEm")?;
    info!(commands = cmds.len(), "NetEm configured");
    Ok(())
}
