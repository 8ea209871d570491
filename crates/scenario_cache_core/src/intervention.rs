//! Intervention (mass drug administration) schedules and their CSV form.

use serde_json::Value;

use crate::error::{Result, ScenarioError};

pub const TRACHOMA_START_SIM_YEAR: u32 = 2020;
pub const TRACHOMA_END_SIM_YEAR: u32 = 2030;

const TRACHOMA_COLUMNS: [&str; 5] = [
    "start_sim_year",
    "end_sim_year",
    "first_mda",
    "last_mda",
    "mda_vector",
];

/// Header row plus records, with every record as wide as the header and
/// every cell a JSON scalar.
#[derive(Debug, Clone, PartialEq)]
pub struct InterventionTable {
    columns: Vec<String>,
    records: Vec<Vec<Value>>,
}

impl InterventionTable {
    pub fn from_value(value: &Value) -> Result<Self> {
        let rows = value
            .as_array()
            .ok_or_else(|| ScenarioError::invalid("mdaData must be a list of rows"))?;
        let (header, body) = rows
            .split_first()
            .ok_or_else(|| ScenarioError::missing_field("mdaData"))?;

        let columns = header
            .as_array()
            .filter(|cells| !cells.is_empty())
            .ok_or_else(|| ScenarioError::invalid("mdaData header must be a non-empty list"))?
            .iter()
            .map(|cell| {
                cell.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| ScenarioError::invalid("mdaData header cells must be strings"))
            })
            .collect::<Result<Vec<_>>>()?;

        if body.is_empty() {
            return Err(ScenarioError::invalid(
                "mdaData must contain at least one record",
            ));
        }

        let mut records = Vec::with_capacity(body.len());
        for (index, row) in body.iter().enumerate() {
            let cells = row.as_array().ok_or_else(|| {
                ScenarioError::invalid(format!("mdaData row {} must be a list", index + 1))
            })?;
            if cells.len() != columns.len() {
                return Err(ScenarioError::invalid(format!(
                    "mdaData row {} has {} cells, expected {}",
                    index + 1,
                    cells.len(),
                    columns.len()
                )));
            }
            if cells
                .iter()
                .any(|cell| matches!(cell, Value::Array(_) | Value::Object(_)))
            {
                return Err(ScenarioError::invalid(format!(
                    "mdaData row {} contains a nested value",
                    index + 1
                )));
            }
            records.push(cells.clone());
        }

        Ok(Self { columns, records })
    }

    pub fn records(&self) -> &[Vec<Value>] {
        &self.records
    }

    pub fn to_csv(&self) -> Result<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(&self.columns).map_err(csv_error)?;
        for record in &self.records {
            writer
                .write_record(record.iter().map(csv_cell))
                .map_err(csv_error)?;
        }
        writer.into_inner().map_err(|error| ScenarioError::Serialization {
            message: error.to_string(),
        })
    }
}

/// Single-row trachoma schedule with the rounds embedded as a JSON list.
pub fn trachoma_intervention_csv(rounds: &[Value]) -> Result<Vec<u8>> {
    let mda_vector = serde_json::to_string(rounds).map_err(|error| ScenarioError::Serialization {
        message: error.to_string(),
    })?;

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(TRACHOMA_COLUMNS).map_err(csv_error)?;
    writer
        .write_record([
            TRACHOMA_START_SIM_YEAR.to_string(),
            TRACHOMA_END_SIM_YEAR.to_string(),
            String::new(),
            String::new(),
            mda_vector,
        ])
        .map_err(csv_error)?;
    writer.into_inner().map_err(|error| ScenarioError::Serialization {
        message: error.to_string(),
    })
}

// Booleans use the capitalised spelling the engines' table readers expect.
fn csv_cell(cell: &Value) -> String {
    match cell {
        Value::Null => String::new(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn csv_error(error: csv::Error) -> ScenarioError {
    ScenarioError::Serialization {
        message: error.to_string(),
    }
}
