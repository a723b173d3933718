//! Derives NetEm/TBF parameters from human-readable limits and renders the
//! `sysctl`, `ip` and `tc` commands that install them.
//!
//! Ingress traffic on `dev` is redirected to an `ifb` device. There it passes
//! through an optional token bucket and then a NetEm delay queue.

pub mod exec;

use std::fmt;

use crate::units::{parse_limit, parse_rate, parse_time, ParseError};

pub const DEFAULT_MAX_BUF_SIZE: u64 = (1 << 31) - 1;
pub const DEFAULT_MIN_MTU: u64 = 576;
pub const DEFAULT_RTT: &str = "30ms";
pub const DEFAULT_BURST_FRAC: f64 = 0.01;

/// How many bandwidth-delay products of socket buffer to allow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BdpPolicy {
    Single,
    #[default]
    Double,
}

impl BdpPolicy {
    pub fn scale(self) -> f64 {
        match self {
            BdpPolicy::Single => 1.0,
            BdpPolicy::Double => 2.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NetemParams {
    pub rate: Option<String>,
    pub rtt: String,
    pub limit: Option<String>,
    pub max_buf_size: u64,
    pub burst_frac: f64,
    pub bdp_policy: BdpPolicy,
}

impl Default for NetemParams {
    fn default() -> Self {
        Self {
            rate: None,
            rtt: DEFAULT_RTT.to_string(),
            limit: None,
            max_buf_size: DEFAULT_MAX_BUF_SIZE,
            burst_frac: DEFAULT_BURST_FRAC,
            bdp_policy: BdpPolicy::default(),
        }
    }
}

/// Devices the queueing disciplines are attached to.
#[derive(Debug, Clone)]
pub struct Topology {
    pub dev: String,
    pub ifb: String,
    pub min_mtu: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NetemConfig {
    /// `None` means no rate limit.
    pub rate_bytes_per_sec: Option<f64>,
    pub rtt_secs: f64,
    pub buffer_size_bytes: u64,
    pub burst_size_bytes: u64,
    pub limit_bytes: u64,
}

pub fn derive_config(params: &NetemParams) -> Result<NetemConfig, ParseError> {
    let rate = params
        .rate
        .as_deref()
        .map(parse_rate)
        .transpose()?
        .map(|q| q.magnitude);
    let rtt = parse_time(&params.rtt)?.magnitude;

    let buffer_size_bytes = match rate {
        Some(rate) => {
            let bdp = rate * rtt;
            let wanted = (params.bdp_policy.scale() * bdp).ceil() as u64;
            wanted.min(params.max_buf_size)
        }
        None => params.max_buf_size,
    };

    let limit_bytes = match params.limit.as_deref() {
        Some(limit) => parse_limit(limit)?.magnitude.ceil() as u64,
        None => buffer_size_bytes,
    };

    let burst_size_bytes = (buffer_size_bytes as f64 * params.burst_frac).ceil() as u64;

    Ok(NetemConfig {
        rate_bytes_per_sec: rate,
        rtt_secs: rtt,
        buffer_size_bytes,
        burst_size_bytes,
        limit_bytes,
    })
}

/// A single external command. `best_effort` commands may fail without
/// aborting the sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
    pub program: String,
    pub args: Vec<String>,
    pub best_effort: bool,
}

impl ShellCommand {
    fn new(program: &str, args: &str) -> Self {
        Self {
            program: program.to_string(),
            args: args.split_whitespace().map(str::to_string).collect(),
            best_effort: false,
        }
    }

    fn sysctl(key: &str, value: &str) -> Self {
        Self {
            program: "sysctl".to_string(),
            args: vec!["-w".to_string(), format!("{key}={value}")],
            best_effort: false,
        }
    }

    fn best_effort(mut self) -> Self {
        self.best_effort = true;
        self
    }
}

impl fmt::Display for ShellCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Ordered commands that install `config` on `topo`. Order matters: the ifb
/// device must be up before anything is redirected to it.
pub fn render_commands(config: &NetemConfig, topo: &Topology) -> Vec<ShellCommand> {
    let buf = config.buffer_size_bytes.to_string();
    let triple = format!("{buf} {buf} {buf}");
    let Topology { dev, ifb, min_mtu } = topo;

    let mut cmds = vec![
        ShellCommand::sysctl("net.core.rmem_default", &buf),
        ShellCommand::sysctl("net.core.rmem_max", &buf),
        ShellCommand::sysctl("net.core.wmem_default", &buf),
        ShellCommand::sysctl("net.core.wmem_max", &buf),
        ShellCommand::sysctl("net.ipv4.tcp_rmem", &triple),
        ShellCommand::sysctl("net.ipv4.tcp_wmem", &triple),
        ShellCommand::new("tc", &format!("qdisc del dev {ifb} root")).best_effort(),
        ShellCommand::new("tc", &format!("qdisc del dev {dev} ingress")).best_effort(),
        ShellCommand::new("tc", &format!("qdisc del dev {dev} root")).best_effort(),
        ShellCommand::new("ip", &format!("link set dev {ifb} up")),
        ShellCommand::new("tc", &format!("qdisc add dev {dev} ingress")),
        ShellCommand::new(
            "tc",
            &format!(
                "filter add dev {dev} parent ffff: protocol ip u32 match u32 0 0 flowid 1:1 \
                 action mirred egress redirect dev {ifb}"
            ),
        ),
    ];

    let parent = match config.rate_bytes_per_sec {
        Some(rate) => {
            cmds.push(ShellCommand::new(
                "tc",
                &format!(
                    "qdisc add dev {ifb} root handle 1: tbf rate {}bit burst {} limit {}",
                    (8.0 * rate).ceil() as u64,
                    config.burst_size_bytes,
                    config.limit_bytes
                ),
            ));
            "parent 1:"
        }
        None => "root",
    };

    let delay_us = (config.rtt_secs * 1e6).round() as u64;
    let limit_pkts = (config.limit_bytes as f64 / *min_mtu as f64).ceil() as u64;
    cmds.push(ShellCommand::new(
        "tc",
        &format!("qdisc add dev {ifb} {parent} netem delay {delay_us} limit {limit_pkts}"),
    ));
    cmds
}
