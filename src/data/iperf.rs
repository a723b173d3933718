//! iperf3 / BWCtl JSON captures, optionally wrapped in pscheduler output.

use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use super::LoadError;

#[derive(Debug, Clone, Deserialize)]
pub struct IperfTest {
    pub start: Start,
    pub intervals: Vec<Interval>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Start {
    #[serde(default)]
    pub connected: Vec<Connection>,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Timestamp {
    pub timesecs: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Connection {
    pub socket: i64,
    pub local_host: String,
    pub local_port: u16,
    pub remote_host: String,
    pub remote_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Interval {
    pub streams: Vec<StreamInterval>,
}

/// One stream's numbers for one reporting interval.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamInterval {
    pub socket: i64,
    pub start: f64,
    pub end: f64,
    pub seconds: f64,
    pub bytes: f64,
    pub bits_per_second: f64,
    pub retransmits: Option<f64>,
    pub snd_cwnd: Option<f64>,
    pub rtt: Option<f64>,
    pub rttvar: Option<f64>,
    pub pmtu: Option<f64>,
    #[serde(default)]
    pub omitted: bool,
}

#[derive(Deserialize)]
struct PschedulerResult {
    diags: String,
}

/// pscheduler puts the raw iperf3 JSON in `diags`, between the first blank
/// line and the next one.
fn embedded_result(diags: &str) -> Result<&str, LoadError> {
    let start = diags.find("\n\n").ok_or(LoadError::Pscheduler)? + 2;
    let rest = &diags[start..];
    Ok(match rest.find("\n\n") {
        Some(end) => &rest[..end],
        None => rest,
    })
}

impl IperfTest {
    pub fn from_reader<R: Read>(reader: R, pscheduler: bool) -> Result<Self, LoadError> {
        if pscheduler {
            let wrapper: PschedulerResult = serde_json::from_reader(reader)?;
            let inner = embedded_result(&wrapper.diags)?;
            Ok(serde_json::from_str(inner)?)
        } else {
            Ok(serde_json::from_reader(reader)?)
        }
    }

    pub fn from_path(path: &Path, pscheduler: bool) -> Result<Self, LoadError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(std::io::BufReader::new(file), pscheduler)
    }

    pub fn start_time(&self) -> f64 {
        self.start.timestamp.timesecs
    }

    /// Number of streams present in every interval.
    pub fn stream_count(&self) -> usize {
        self.intervals
            .iter()
            .map(|i| i.streams.len())
            .min()
            .unwrap_or(0)
    }

    /// All intervals of one stream, sorted by start time.
    pub fn stream(&self, index: usize) -> Result<Vec<StreamInterval>, LoadError> {
        let available = self.stream_count();
        if index >= available {
            return Err(LoadError::NoSuchStream { index, available });
        }
        let mut samples: Vec<StreamInterval> = self
            .intervals
            .iter()
            .map(|i| i.streams[index].clone())
            .collect();
        samples.sort_by(|a, b| a.start.total_cmp(&b.start));
        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_STREAMS: &str = r#"{
        "start": {
            "connected": [
                {"socket": 5, "local_host": "10.0.0.1", "local_port": 40000,
                 "remote_host": "10.0.0.2", "remote_port": 5201},
                {"socket": 7, "local_host": "10.0.0.1", "local_port": 40002,
                 "remote_host": "10.0.0.2", "remote_port": 5201}
            ],
            "timestamp": {"time": "Mon, 01 Jan 2024 00:00:00 GMT", "timesecs": 1704067200}
        },
        "intervals": [
            {"streams": [
                {"socket": 5, "start": 1.0, "end": 2.0, "seconds": 1.0, "bytes": 1000,
                 "bits_per_second": 8000, "retransmits": 1, "snd_cwnd": 2048, "rtt": 30000,
                 "rttvar": 100, "pmtu": 1500, "omitted": false},
                {"socket": 7, "start": 1.0, "end": 2.0, "seconds": 1.0, "bytes": 500,
                 "bits_per_second": 4000, "omitted": false}
            ]},
            {"streams": [
                {"socket": 5, "start": 0.0, "end": 1.0, "seconds": 1.0, "bytes": 2000,
                 "bits_per_second": 16000, "retransmits": 0, "snd_cwnd": 1024, "rtt": 31000,
                 "rttvar": 90, "pmtu": 1500, "omitted": false},
                {"socket": 7, "start": 0.0, "end": 1.0, "seconds": 1.0, "bytes": 700,
                 "bits_per_second": 5600, "omitted": false}
            ]}
        ]
    }"#;

    #[test]
    fn loads_and_transposes_streams() {
        let test = IperfTest::from_reader(TWO_STREAMS.as_bytes(), false).unwrap();
        assert_eq!(test.start.connected.len(), 2);
        assert_eq!(test.start_time(), 1_704_067_200.0);
        assert_eq!(test.stream_count(), 2);

        let second = test.stream(1).unwrap();
        assert!(second.iter().all(|s| s.socket == 7));
        assert!(second[0].rtt.is_none());
    }

    #[test]
    fn stream_is_sorted_by_start() {
        let test = IperfTest::from_reader(TWO_STREAMS.as_bytes(), false).unwrap();
        let first = test.stream(0).unwrap();
        assert_eq!(first[0].start, 0.0);
        assert_eq!(first[0].snd_cwnd, Some(1024.0));
        assert_eq!(first[1].start, 1.0);
    }

    #[test]
    fn missing_stream_is_reported() {
        let test = IperfTest::from_reader(TWO_STREAMS.as_bytes(), false).unwrap();
        match test.stream(2) {
            Err(LoadError::NoSuchStream { index: 2, available: 2 }) => {}
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn missing_required_field_is_an_error() {
        let broken = r#"{"start": {"timestamp": {"timesecs": 0}},
            "intervals": [{"streams": [{"socket": 1, "start": 0}]}]}"#;
        let err = IperfTest::from_reader(broken.as_bytes(), false).unwrap_err();
        assert!(matches!(err, LoadError::Json(_)));
        assert!(err.to_string().contains("missing field"));
    }

    #[test]
    fn unwraps_pscheduler_diags() {
        let wrapper = serde_json::json!({
            "diags": format!("Running iperf3\n\n{}\n\nDone", TWO_STREAMS.replace('\n', " ")),
        });
        let raw = serde_json::to_vec(&wrapper).unwrap();
        let test = IperfTest::from_reader(raw.as_slice(), true).unwrap();
        assert_eq!(test.stream_count(), 2);
    }

    #[test]
    fn pscheduler_without_blank_line_fails() {
        let raw = br#"{"diags": "no result here"}"#;
        let err = IperfTest::from_reader(&raw[..], true).unwrap_err();
        assert!(matches!(err, LoadError::Pscheduler));
    }
}
