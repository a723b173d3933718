//! flent result files (`*.flent.gz`, or the same JSON uncompressed).

use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::sync::OnceLock;

use flate2::read::GzDecoder;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use super::LoadError;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

fn upload_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^TCP upload::[0-9]+$").expect("upload pattern compiles"))
}

#[derive(Debug, Clone, Deserialize)]
pub struct FlentResults {
    pub results: BTreeMap<String, Value>,
}

impl FlentResults {
    /// Reads JSON, transparently inflating it when it starts with the gzip
    /// magic bytes.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, LoadError> {
        let mut reader = BufReader::new(reader);
        let is_gzip = reader.fill_buf()?.starts_with(&GZIP_MAGIC);
        if is_gzip {
            Ok(serde_json::from_reader(GzDecoder::new(reader))?)
        } else {
            Ok(serde_json::from_reader(reader)?)
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, LoadError> {
        Self::from_reader(std::fs::File::open(path)?)
    }

    /// Mean of every `TCP upload::<n>` series, nulls skipped.
    pub fn upload_means(&self) -> Result<BTreeMap<String, f64>, LoadError> {
        self.results
            .iter()
            .filter(|(name, _)| upload_re().is_match(name))
            .map(|(name, values)| {
                let samples: Vec<Option<f64>> = serde_json::from_value(values.clone())
                    .map_err(|_| LoadError::BadSeries { name: name.clone() })?;
                Ok((name.clone(), mean(&samples)))
            })
            .collect()
    }
}

fn mean(samples: &[Option<f64>]) -> f64 {
    let present: Vec<f64> = samples.iter().flatten().copied().collect();
    present.iter().sum::<f64>() / present.len() as f64
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::write::GzEncoder;
    use flate2::Compression;

    use super::*;
    use crate::metrics::jain_index;

    const RESULTS: &str = r#"{
        "metadata": {"NAME": "tcp_nup"},
        "results": {
            "TCP upload::1": [10.0, null, 20.0],
            "TCP upload::2": [15.0, 15.0],
            "TCP upload sum": [25.0, 35.0],
            "Ping (ms) ICMP": [30.1, 30.5],
            "TCP upload::avg": [1.0]
        }
    }"#;

    #[test]
    fn averages_only_numbered_uploads() {
        let res = FlentResults::from_reader(RESULTS.as_bytes()).unwrap();
        let means = res.upload_means().unwrap();
        assert_eq!(means.len(), 2);
        assert_eq!(means["TCP upload::1"], 15.0);
        assert_eq!(means["TCP upload::2"], 15.0);
        let rates: Vec<f64> = means.values().copied().collect();
        assert!((jain_index(&rates) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn reads_gzip_transparently() {
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(RESULTS.as_bytes()).unwrap();
        let gz = enc.finish().unwrap();
        let res = FlentResults::from_reader(gz.as_slice()).unwrap();
        assert_eq!(res.upload_means().unwrap().len(), 2);
    }

    #[test]
    fn non_numeric_upload_series_is_an_error() {
        let raw = r#"{"results": {"TCP upload::1": ["fast"]}}"#;
        let res = FlentResults::from_reader(raw.as_bytes()).unwrap();
        match res.upload_means() {
            Err(LoadError::BadSeries { name }) => assert_eq!(name, "TCP upload::1"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn all_null_series_is_nan() {
        assert!(mean(&[None, None]).is_nan());
    }
}
