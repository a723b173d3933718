//! CSV output of the congestion-control simulator, one row per flow sample.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, Trim};
use serde::Deserialize;

use super::LoadError;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SimRecord {
    pub flow_id: u32,
    pub time: f64,
    pub rtt: f64,
    pub cwnd: f64,
    /// Bytes sent since the previous sample of this flow. Older captures
    /// call the column `rate`.
    #[serde(alias = "rate")]
    pub bytes_sent: f64,
    pub losses: f64,
    pub pacing_rate: f64,
    pub min_rtt: f64,
    pub bdp: f64,
    pub mode: f64,
    #[serde(default)]
    pub gain_cwnd: Option<f64>,
}

pub fn read_records<R: Read>(reader: R) -> Result<Vec<SimRecord>, LoadError> {
    let mut rdr = ReaderBuilder::new().trim(Trim::All).from_reader(reader);
    let mut records = Vec::new();
    for row in rdr.deserialize() {
        records.push(row?);
    }
    Ok(records)
}

pub fn load(path: &Path) -> Result<Vec<SimRecord>, LoadError> {
    let file = std::fs::File::open(path)?;
    read_records(std::io::BufReader::new(file))
}

/// Records of a single flow, in file order.
pub fn flow(records: &[SimRecord], flow_id: u32) -> Result<Vec<SimRecord>, LoadError> {
    let selected: Vec<SimRecord> = records
        .iter()
        .filter(|r| r.flow_id == flow_id)
        .cloned()
        .collect();
    if selected.is_empty() {
        return Err(LoadError::NoSuchFlow(flow_id));
    }
    Ok(selected)
}

/// Records grouped by flow id, in id order. Only ids that have rows get a
/// group, so a stray large id costs one entry.
pub fn split_flows(records: &[SimRecord]) -> BTreeMap<u32, Vec<SimRecord>> {
    let mut flows: BTreeMap<u32, Vec<SimRecord>> = BTreeMap::new();
    for r in records {
        flows.entry(r.flow_id).or_default().push(r.clone());
    }
    flows
}
