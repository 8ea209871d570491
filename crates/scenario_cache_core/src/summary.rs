//! Percentile-band summaries of wide per-replicate time series.
//!
//! Input tables carry one row per replicate. The first two columns are
//! metadata; every remaining column is one output time point.

use std::io::Read;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::error::{Result, ScenarioError};

pub const METADATA_COLUMNS: usize = 2;
pub const LOWER_QUANTILE: f64 = 0.05;
pub const UPPER_QUANTILE: f64 = 0.95;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Band {
    pub median: Option<f64>,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

/// Time point name to band, in the column order of the source table.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesSummary {
    points: Vec<(String, Band)>,
}

impl SeriesSummary {
    pub fn get(&self, time_point: &str) -> Option<&Band> {
        self.points
            .iter()
            .find(|(name, _)| name == time_point)
            .map(|(_, band)| band)
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|error| ScenarioError::Serialization {
            message: error.to_string(),
        })
    }
}

impl Serialize for SeriesSummary {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.points.len()))?;
        for (name, band) in &self.points {
            map.serialize_entry(name, band)?;
        }
        map.end()
    }
}

/// Summarizes a CSV table. Empty and non-numeric cells count as missing.
pub fn summarize_csv(reader: impl Read) -> Result<SeriesSummary> {
    let mut csv_reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);

    let headers = csv_reader.headers().map_err(summary_error)?.clone();
    if headers.len() <= METADATA_COLUMNS {
        return Err(ScenarioError::Summarization {
            message: format!(
                "table has {} columns, expected metadata plus at least one time point",
                headers.len()
            ),
        });
    }

    let time_points: Vec<String> = headers
        .iter()
        .skip(METADATA_COLUMNS)
        .map(str::to_string)
        .collect();
    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); time_points.len()];

    for record in csv_reader.records() {
        let record = record.map_err(summary_error)?;
        for (column, cell) in columns.iter_mut().zip(record.iter().skip(METADATA_COLUMNS)) {
            if let Ok(value) = cell.trim().parse::<f64>() {
                if !value.is_nan() {
                    column.push(value);
                }
            }
        }
    }

    let points = time_points
        .into_iter()
        .zip(columns)
        .map(|(name, mut values)| {
            values.sort_by(f64::total_cmp);
            let band = Band {
                median: quantile(&values, 0.5),
                lower: quantile(&values, LOWER_QUANTILE),
                upper: quantile(&values, UPPER_QUANTILE),
            };
            (name, band)
        })
        .collect();

    Ok(SeriesSummary { points })
}

/// Linear-interpolation quantile over already sorted values.
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let position = (sorted.len() - 1) as f64 * q;
    let lower_index = position.floor() as usize;
    let upper_index = position.ceil() as usize;
    let fraction = position - lower_index as f64;
    Some(sorted[lower_index] + (sorted[upper_index] - sorted[lower_index]) * fraction)
}

fn summary_error(error: csv::Error) -> ScenarioError {
    ScenarioError::Summarization {
        message: error.to_string(),
    }
}
