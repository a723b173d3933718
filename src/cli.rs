use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::metrics::FirstSample;
use crate::netem::{
    BdpPolicy, DEFAULT_BURST_FRAC, DEFAULT_MAX_BUF_SIZE, DEFAULT_MIN_MTU, DEFAULT_RTT,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Set up a server (not the client) for NetEm testing
    Netem(Netem),
    /// Analyze simulator CSV output
    #[command(subcommand)]
    Sim(SimCommand),
    /// Analyze iperf3 / BWCtl JSON results
    #[command(subcommand)]
    Iperf(IperfCommand),
    /// Analyze flent results
    #[command(subcommand)]
    Flent(FlentCommand),
}

#[derive(Parser, Clone, Debug)]
pub struct Netem {
    /// Network device to attach the NetEm qdisc to
    pub dev: String,

    /// Rate to limit traffic to, e.g. 10Mbits or 1gbytes (default: no limit)
    #[arg(long)]
    pub rate: Option<String>,

    /// Emulated RTT, e.g. 30ms
    #[arg(long, default_value = DEFAULT_RTT)]
    pub rtt: String,

    /// NetEm buffer length limit in bytes, e.g. 64K (default: socket buffer size)
    #[arg(long)]
    pub limit: Option<String>,

    /// Upper bound on socket buffer sizes
    #[arg(long, default_value_t = DEFAULT_MAX_BUF_SIZE)]
    pub max_buf_size: u64,

    /// Smallest MTU, used to turn the byte limit into packets
    #[arg(long, default_value_t = DEFAULT_MIN_MTU)]
    pub min_mtu: u64,

    /// Burstiness of the TBF as a fraction of the buffer size
    #[arg(long, value_parser = parse_fraction, default_value_t = DEFAULT_BURST_FRAC)]
    pub burst_frac: f64,

    /// Size buffers to one or two bandwidth-delay products
    #[arg(long, value_enum, default_value_t = BdpPolicyOpt::Double)]
    pub bdp_policy: BdpPolicyOpt,

    /// Intermediate functional block device that ingress is redirected to
    #[arg(long, default_value = "ifb0")]
    pub ifb: String,

    /// Print the commands without running them
    #[arg(long)]
    pub dry_run: bool,
}

fn parse_fraction(s: &str) -> Result<f64, String> {
    let x: f64 = s.parse().map_err(|e| format!("{e}"))?;
    if (0.0..=1.0).contains(&x) {
        Ok(x)
    } else {
        Err(format!("{x} is not in the range [0, 1]"))
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum BdpPolicyOpt {
    Single,
    Double,
}

impl From<BdpPolicyOpt> for BdpPolicy {
    fn from(v: BdpPolicyOpt) -> Self {
        match v {
            BdpPolicyOpt::Single => BdpPolicy::Single,
            BdpPolicyOpt::Double => BdpPolicy::Double,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Csv,
    Json,
}

#[derive(Args, Clone, Debug)]
pub struct Output {
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
    pub format: OutputFormat,
}

#[derive(Args, Clone, Debug)]
pub struct RateWindow {
    /// Window width in seconds for rate estimation (default: one sample)
    #[arg(long)]
    pub rate_interval: Option<f64>,

    /// Rate reported for the first sample when there is no window
    #[arg(long, value_enum, default_value_t = FirstSampleOpt::Nan)]
    pub first_sample: FirstSampleOpt,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum FirstSampleOpt {
    Nan,
    Wrap,
}

impl From<FirstSampleOpt> for FirstSample {
    fn from(v: FirstSampleOpt) -> Self {
        match v {
            FirstSampleOpt::Nan => FirstSample::Nan,
            FirstSampleOpt::Wrap => FirstSample::WrapAround,
        }
    }
}

#[derive(Subcommand, Clone, Debug)]
pub enum SimCommand {
    /// Time series of a single flow
    Flow {
        /// The data file to read
        data_file: PathBuf,
        /// Flow id to select
        #[arg(long, default_value_t = 0)]
        flow: u32,
        #[command(flatten)]
        window: RateWindow,
        #[command(flatten)]
        output: Output,
    },
    /// Rates of every flow and their Jain fairness index over time
    Flows {
        /// The data file to read
        data_file: PathBuf,
        #[command(flatten)]
        window: RateWindow,
        #[command(flatten)]
        output: Output,
    },
}

#[derive(Args, Clone, Debug)]
pub struct IperfInput {
    /// Select the iperf stream to use
    #[arg(short, long, default_value_t = 0)]
    pub stream: usize,

    /// Input is pscheduler output wrapping the iperf3 result
    #[arg(long = "ps")]
    pub pscheduler: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Metric {
    /// Throughput in Mbps
    Rate,
    /// Congestion window in Mbits
    Cwnd,
    /// Round-trip time in ms
    Rtt,
}

#[derive(Subcommand, Clone, Debug)]
pub enum IperfCommand {
    /// Per-interval rate, cwnd, RTT and retransmits of one test
    Series {
        /// Result file of the test
        test: PathBuf,
        #[command(flatten)]
        input: IperfInput,
        #[command(flatten)]
        output: Output,
    },
    /// Empirical CDF of one metric across tests
    Ecdf {
        /// Result files of the tests to compare
        #[arg(required = true)]
        tests: Vec<PathBuf>,
        #[arg(long, value_enum, default_value_t = Metric::Rate)]
        metric: Metric,
        #[command(flatten)]
        input: IperfInput,
        #[command(flatten)]
        output: Output,
    },
}

#[derive(Subcommand, Clone, Debug)]
pub enum FlentCommand {
    /// Jain fairness index over the mean rate of each TCP upload
    Jain {
        /// flent result file (gzip or plain JSON)
        infile: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn netem_defaults() {
        let cli = Cli::try_parse_from(["ccprobe", "netem", "eth0"]).unwrap();
        let Some(Commands::Netem(n)) = cli.command else { panic!("expected netem") };
        assert_eq!(n.dev, "eth0");
        assert_eq!(n.rtt, "30ms");
        assert_eq!(n.rate, None);
        assert_eq!(n.max_buf_size, (1 << 31) - 1);
        assert_eq!(n.min_mtu, 576);
        assert_eq!(n.burst_frac, 0.01);
        assert_eq!(n.ifb, "ifb0");
        assert!(matches!(n.bdp_policy, BdpPolicyOpt::Double));
        assert!(!n.dry_run);
    }

    #[test]
    fn burst_frac_must_be_a_fraction() {
        assert!(Cli::try_parse_from(["ccprobe", "netem", "eth0", "--burst-frac", "1.5"]).is_err());
        assert!(Cli::try_parse_from(["ccprobe", "netem", "eth0", "--burst-frac", "x"]).is_err());
        assert!(Cli::try_parse_from(["ccprobe", "netem", "eth0", "--burst-frac", "1"]).is_ok());
    }

    #[test]
    fn iperf_ecdf_takes_many_tests() {
        let cli = Cli::try_parse_from([
            "ccprobe", "iperf", "ecdf", "a.json", "b.json", "--metric", "rtt", "-s", "1", "--ps",
        ])
        .unwrap();
        let Some(Commands::Iperf(IperfCommand::Ecdf { tests, metric, input, .. })) = cli.command else {
            panic!("expected iperf ecdf")
        };
        assert_eq!(tests.len(), 2);
        assert_eq!(metric, Metric::Rtt);
        assert_eq!(input.stream, 1);
        assert!(input.pscheduler);
    }

    #[test]
    fn sim_flow_window_flags() {
        let cli = Cli::try_parse_from([
            "ccprobe", "sim", "flow", "out.csv", "--flow", "2", "--rate-interval", "0.5",
            "--first-sample", "wrap", "--format", "json",
        ])
        .unwrap();
        let Some(Commands::Sim(SimCommand::Flow { flow, window, output, .. })) = cli.command else {
            panic!("expected sim flow")
        };
        assert_eq!(flow, 2);
        assert_eq!(window.rate_interval, Some(0.5));
        assert!(matches!(window.first_sample, FirstSampleOpt::Wrap));
        assert_eq!(output.format, OutputFormat::Json);
    }
}
