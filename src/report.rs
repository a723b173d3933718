use std::io::Write;

use anyhow::Result;
use crate::cli::OutputFormat;

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Num(f64),
    Text(String),
    Missing,
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Cell::Num(v)
    }
}

impl From<Option<f64>> for Cell {
    fn from(v: Option<f64>) -> Self {
        v.map_or(Cell::Missing, Cell::Num)
    }
}

impl From<&str> for Cell {
    fn from(v: &str) -> Self {
        Cell::Text(v.to_string())
    }
}

impl Cell {
    fn to_field(&self) -> String {
        match self {
            Cell::Num(v) if v.is_nan() => "NaN".to_string(),
            Cell::Num(v) => v.to_string(),
            Cell::Text(s) => s.clone(),
            Cell::Missing => String::new(),
        }
    }

    /// JSON has no NaN or infinity, so non-finite numbers become null.
    fn to_json(&self) -> serde_json::Value {
        match self {
            Cell::Num(v) => serde_json::Number::from_f64(*v)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Cell::Text(s) => serde_json::Value::String(s.clone()),
            Cell::Missing => serde_json::Value::Null,
        }
    }
}

/// Column-named rows, written as CSV or a JSON array of objects.
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Vec<Cell>) {
        debug_assert_eq!(row.len(), self.columns.len());
        self.rows.push(row);
    }

    #[cfg(test)]
    pub fn column(&self, name: &str) -> Option<Vec<&Cell>> {
        let idx = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().map(|r| &r[idx]).collect())
    }

    pub fn write<W: Write>(&self, format: OutputFormat, out: W) -> Result<()> {
        match format {
            OutputFormat::Csv => {
                let mut wtr = csv::Writer::from_writer(out);
                wtr.write_record(&self.columns)?;
                for row in &self.rows {
                    wtr.write_record(row.iter().map(Cell::to_field))?;
                }
                wtr.flush()?;
            }
            OutputFormat::Json => {
                let objects: Vec<serde_json::Map<String, serde_json::Value>> = self
                    .rows
                    .iter()
                    .map(|row| {
                        self.columns
                            .iter()
                            .cloned()
                            .zip(row.iter().map(Cell::to_json))
                            .collect()
                    })
                    .collect();
                let mut out = out;
                serde_json::to_writer_pretty(&mut out, &objects)?;
                writeln!(out)?;
            }
        }
        Ok(())
    }
}
