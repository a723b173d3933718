//! Derived series for the analysis subcommands.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::cli::{FlentCommand, IperfCommand, Metric, OutputFormat, SimCommand};
use crate::data::flent::FlentResults;
use crate::data::iperf::{IperfTest, StreamInterval};
use crate::data::sim::{self, SimRecord};
use crate::metrics::{compute_rates, ecdf, jain_index, jain_series, FirstSample, BYTES_PER_SEC_PER_MBPS};
use crate::report::{Cell, Table};

const MEGA: f64 = (1u64 << 20) as f64;

fn flow_rates(flow: &[SimRecord], interval: Option<f64>, first: FirstSample) -> Vec<f64> {
    let times: Vec<f64> = flow.iter().map(|r| r.time).collect();
    let bytes: Vec<f64> = flow.iter().map(|r| r.bytes_sent).collect();
    compute_rates(&times, &bytes, interval, first)
}

pub fn sim_flow_table(flow: &[SimRecord], interval: Option<f64>, first: FirstSample) -> Table {
    let rates = flow_rates(flow, interval, first);
    let mut table = Table::new([
        "time",
        "cwnd",
        "gain_cwnd",
        "bdp",
        "losses",
        "rate_mbps",
        "pacing_rate_mbps",
        "rtt_ms",
        "min_rtt_ms",
        "mode",
    ]);
    for (r, rate) in flow.iter().zip(rates) {
        table.push(vec![
            r.time.into(),
            r.cwnd.into(),
            r.gain_cwnd.into(),
            r.bdp.into(),
            r.losses.into(),
            (rate / BYTES_PER_SEC_PER_MBPS).into(),
            (r.pacing_rate / BYTES_PER_SEC_PER_MBPS).into(),
            (r.rtt * 1000.0).into(),
            (r.min_rtt * 1000.0).into(),
            r.mode.into(),
        ]);
    }
    table
}

/// One row per sample index: the lowest flow id's timestamp, every flow's
/// rate and the fairness index across them. Rows stop at the shortest flow.
pub fn sim_flows_table(records: &[SimRecord], interval: Option<f64>, first: FirstSample) -> Table {
    let flows = sim::split_flows(records);
    let rates: Vec<Vec<f64>> = flows
        .values()
        .map(|f| {
            flow_rates(f, interval, first)
                .into_iter()
                .map(|r| r / BYTES_PER_SEC_PER_MBPS)
                .collect()
        })
        .collect();
    let jain = jain_series(&rates);

    let mut columns = vec!["time".to_string()];
    columns.extend(flows.keys().map(|id| format!("flow{id}_rate_mbps")));
    columns.push("jain".to_string());
    let mut table = Table::new(columns);

    let Some(lead) = flows.values().next() else {
        return table;
    };
    for (k, index) in jain.iter().enumerate() {
        let mut row: Vec<Cell> = Vec::with_capacity(flows.len() + 2);
        row.push(lead[k].time.into());
        row.extend(rates.iter().map(|r| Cell::from(r[k])));
        row.push((*index).into());
        table.push(row);
    }
    table
}

pub fn iperf_series_table(stream: &[StreamInterval]) -> Table {
    let mut table = Table::new([
        "start",
        "end",
        "seconds",
        "bytes",
        "rate_mbps",
        "cwnd_mbits",
        "rtt_ms",
        "rttvar_ms",
        "retransmits",
        "pmtu",
    ]);
    for s in stream {
        table.push(vec![
            s.start.into(),
            s.end.into(),
            s.seconds.into(),
            s.bytes.into(),
            (s.bits_per_second / MEGA).into(),
            s.snd_cwnd.map(|c| c / MEGA).into(),
            s.rtt.map(|r| r / 1e3).into(),
            s.rttvar.map(|r| r / 1e3).into(),
            s.retransmits.into(),
            s.pmtu.into(),
        ]);
    }
    table
}

pub fn metric_values(stream: &[StreamInterval], metric: Metric) -> Vec<f64> {
    match metric {
        Metric::Rate => stream.iter().map(|s| s.bits_per_second / MEGA).collect(),
        Metric::Cwnd => stream.iter().filter_map(|s| s.snd_cwnd).map(|c| c / MEGA).collect(),
        Metric::Rtt => stream.iter().filter_map(|s| s.rtt).map(|r| r / 1e3).collect(),
    }
}

pub fn iperf_ecdf_table(tests: &[(String, Vec<StreamInterval>)], metric: Metric) -> Table {
    let mut table = Table::new(["test", "value", "p"]);
    for (name, stream) in tests {
        for (value, p) in ecdf(&metric_values(stream, metric)) {
            table.push(vec![name.as_str().into(), value.into(), p.into()]);
        }
    }
    table
}

fn emit(table: &Table, format: OutputFormat) -> Result<()> {
    let stdout = std::io::stdout();
    let mut lock = stdout.lock();
    table.write(format, &mut lock)?;
    lock.flush()?;
    Ok(())
}

fn load_sim(path: &Path) -> Result<Vec<SimRecord>> {
    let records = sim::load(path).with_context(|| format!("Loading {}", path.display()))?;
    debug!(path = %path.display(), records = records.len(), "Loaded simulation data");
    Ok(records)
}

fn load_iperf(path: &Path, pscheduler: bool) -> Result<IperfTest> {
    let data = IperfTest::from_path(path, pscheduler)
        .with_context(|| format!("Loading {}", path.display()))?;
    for c in &data.start.connected {
        debug!(
            socket = c.socket,
            local = %format!("{}:{}", c.local_host, c.local_port),
            remote = %format!("{}:{}", c.remote_host, c.remote_port),
            "Connection"
        );
    }
    Ok(data)
}

fn select_stream(data: &IperfTest, index: usize, path: &Path) -> Result<Vec<StreamInterval>> {
    let stream = data
        .stream(index)
        .with_context(|| format!("Reading {}", path.display()))?;
    let omitted = stream.iter().filter(|s| s.omitted).count();
    if let Some(first) = stream.first() {
        debug!(socket = first.socket, intervals = stream.len(), omitted, "Selected stream");
    }
    Ok(stream)
}

pub fn run_sim(cmd: SimCommand) -> Result<()> {
    match cmd {
        SimCommand::Flow { data_file, flow, window, output } => {
            let records = load_sim(&data_file)?;
            let selected = sim::flow(&records, flow)
                .with_context(|| format!("Selecting flow in {}", data_file.display()))?;
            let table = sim_flow_table(&selected, window.rate_interval, window.first_sample.into());
            emit(&table, output.format)
        }
        SimCommand::Flows { data_file, window, output } => {
            let records = load_sim(&data_file)?;
            let table = sim_flows_table(&records, window.rate_interval, window.first_sample.into());
            info!(flows = table.columns.len().saturating_sub(2), rows = table.rows.len(), "Computed flow rates");
            emit(&table, output.format)
        }
    }
}

pub fn run_iperf(cmd: IperfCommand) -> Result<()> {
    match cmd {
        IperfCommand::Series { test, input, output } => {
            let data = load_iperf(&test, input.pscheduler)?;
            debug!(start = data.start_time(), streams = data.stream_count(), "Loaded test");
            let stream = select_stream(&data, input.stream, &test)?;
            emit(&iperf_series_table(&stream), output.format)
        }
        IperfCommand::Ecdf { tests, metric, input, output } => {
            let mut streams = Vec::with_capacity(tests.len());
            for path in &tests {
                let data = load_iperf(path, input.pscheduler)?;
                let stream = select_stream(&data, input.stream, path)?;
                streams.push((path.display().to_string(), stream));
            }
            emit(&iperf_ecdf_table(&streams, metric), output.format)
        }
    }
}

pub fn run_flent(cmd: FlentCommand) -> Result<()> {
    match cmd {
        FlentCommand::Jain { infile } => {
            let results = FlentResults::from_path(&infile)
                .with_context(|| format!("Loading {}", infile.display()))?;
            let means = results.upload_means()?;
            for (name, mean) in &means {
                debug!(series = %name, mean, "Upload mean");
            }
            let rates: Vec<f64> = means.values().copied().collect();
            println!("{}", jain_index(&rates));
            Ok(())
        }
    }
}
