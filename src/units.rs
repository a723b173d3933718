//! Engineering-unit notation used on the `netem` command line.
//!
//! Rates look like `10Mbits` or `2.5gbytes`, times like `30ms` and limits
//! like `64K`. Upper-case SI prefixes are decimal (`1000^n`), lower-case ones
//! are binary (`1024^n`). Suffixes are case-sensitive and the whole string
//! must match.

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

pub const RATE_PATTERN: &str = r"^([0-9]+(?:\.[0-9]+)?)([TGMKtgmk])?(bits|bytes)$";
pub const TIME_PATTERN: &str = r"^([0-9]+(?:\.[0-9]+)?)(s|ms|us)?$";
pub const LIMIT_PATTERN: &str = r"^([0-9]+(?:\.[0-9]+)?)([TGMKtgmk])?$";

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("rate {input:?} must conform to \"{}\"", RATE_PATTERN)]
    Rate { input: String },
    #[error("time {input:?} must conform to \"{}\"", TIME_PATTERN)]
    Time { input: String },
    #[error("limit {input:?} must conform to \"{}\"", LIMIT_PATTERN)]
    Limit { input: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitClass {
    /// Bytes, or bytes per second for rates.
    Bytes,
    Seconds,
    /// Dimensionless count such as a queue limit.
    Scalar,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quantity {
    pub magnitude: f64,
    pub unit: UnitClass,
}

fn rate_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(RATE_PATTERN).expect("rate pattern compiles"))
}

fn time_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(TIME_PATTERN).expect("time pattern compiles"))
}

fn limit_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(LIMIT_PATTERN).expect("limit pattern compiles"))
}

/// Multiplier for an SI prefix character.
pub fn si_scale(prefix: &str) -> f64 {
    match prefix {
        "T" => 1e12,
        "G" => 1e9,
        "M" => 1e6,
        "K" => 1e3,
        "t" => (1u64 << 40) as f64,
        "g" => (1u64 << 30) as f64,
        "m" => (1u64 << 20) as f64,
        "k" => (1u64 << 10) as f64,
        _ => 1.0,
    }
}

fn time_scale(suffix: &str) -> f64 {
    match suffix {
        "ms" => 1e-3,
        "us" => 1e-6,
        _ => 1.0,
    }
}

/// Parses a rate and normalizes it to bytes per second.
pub fn parse_rate(input: &str) -> Result<Quantity, ParseError> {
    let caps = rate_re()
        .captures(input)
        .ok_or_else(|| ParseError::Rate { input: input.to_string() })?;
    let mut rate: f64 = caps[1]
        .parse()
        .map_err(|_| ParseError::Rate { input: input.to_string() })?;
    if let Some(prefix) = caps.get(2) {
        rate *= si_scale(prefix.as_str());
    }
    if &caps[3] != "bytes" {
        rate /= 8.0;
    }
    Ok(Quantity { magnitude: rate, unit: UnitClass::Bytes })
}

/// Parses a duration in seconds; a bare number is seconds.
pub fn parse_time(input: &str) -> Result<Quantity, ParseError> {
    let caps = time_re()
        .captures(input)
        .ok_or_else(|| ParseError::Time { input: input.to_string() })?;
    let mut secs: f64 = caps[1]
        .parse()
        .map_err(|_| ParseError::Time { input: input.to_string() })?;
    if let Some(suffix) = caps.get(2) {
        secs *= time_scale(suffix.as_str());
    }
    Ok(Quantity { magnitude: secs, unit: UnitClass::Seconds })
}

pub fn parse_limit(input: &str) -> Result<Quantity, ParseError> {
    let caps = limit_re()
        .captures(input)
        .ok_or_else(|| ParseError::Limit { input: input.to_string() })?;
    let mut limit: f64 = caps[1]
        .parse()
        .map_err(|_| ParseError::Limit { input: input.to_string() })?;
    if let Some(prefix) = caps.get(2) {
        limit *= si_scale(prefix.as_str());
    }
    Ok(Quantity { magnitude: limit, unit: UnitClass::Scalar })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-9 * b.abs().max(1.0)
    }

    #[test]
    fn decimal_megabits_to_bytes() {
        let q = parse_rate("10Mbits").unwrap();
        assert_eq!(q.unit, UnitClass::Bytes);
        assert!(close(q.magnitude, 1_250_000.0));
    }

    #[test]
    fn decimal_gigabytes_stay_bytes() {
        assert!(close(parse_rate("1Gbytes").unwrap().magnitude, 1e9));
    }

    #[test]
    fn lowercase_prefix_is_binary() {
        let q = parse_rate("5mbits").unwrap();
        assert!(close(q.magnitude, 5.0 * 1048576.0 / 8.0));
        let q = parse_rate("2kbytes").unwrap();
        assert!(close(q.magnitude, 2048.0));
    }

    #[test]
    fn rate_without_prefix() {
        assert!(close(parse_rate("800bits").unwrap().magnitude, 100.0));
        assert!(close(parse_rate("1.5bytes").unwrap().magnitude, 1.5));
    }

    #[test]
    fn rate_rejects_garbage() {
        assert_eq!(parse_rate("abc"), Err(ParseError::Rate { input: "abc".into() }));
        assert!(parse_rate("10M").is_err());
        assert!(parse_rate("10Mbit").is_err());
        assert!(parse_rate("10MBITS").is_err());
        assert!(parse_rate(" 10Mbits").is_err());
        assert!(parse_rate(".5Mbits").is_err());
    }

    #[test]
    fn time_suffixes() {
        assert!(close(parse_time("30ms").unwrap().magnitude, 0.030));
        assert!(close(parse_time("1.5s").unwrap().magnitude, 1.5));
        assert!(close(parse_time("250us").unwrap().magnitude, 250e-6));
    }

    #[test]
    fn bare_time_is_seconds() {
        let q = parse_time("100").unwrap();
        assert_eq!(q.unit, UnitClass::Seconds);
        assert!(close(q.magnitude, 100.0));
    }

    #[test]
    fn time_rejects_unknown_suffix() {
        assert!(parse_time("30ns").is_err());
        assert!(parse_time("30MS").is_err());
        assert!(parse_time("").is_err());
    }

    #[test]
    fn limit_uses_si_table() {
        assert!(close(parse_limit("1000").unwrap().magnitude, 1000.0));
        assert!(close(parse_limit("64K").unwrap().magnitude, 64_000.0));
        assert!(close(parse_limit("64k").unwrap().magnitude, 65_536.0));
        assert!(close(parse_limit("1.5M").unwrap().magnitude, 1_500_000.0));
        assert!(parse_limit("64Kbytes").is_err());
    }

    #[test]
    fn error_message_names_the_input() {
        let err = parse_limit("lots").unwrap_err();
        assert!(err.to_string().contains("\"lots\""));
    }
}
