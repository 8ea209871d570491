use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, ScenarioError};
use crate::intervention::InterventionTable;

pub const MAX_REPLICATES: u32 = 200;
pub const STH_YEARS_TO_SIMULATE: u32 = 12;
pub const STH_OUTPUT_FREQUENCY: u32 = 6;
pub const STH_DEMOGRAPHY_NAME: &str = "WHOGeneric";

pub const KEY_DISEASE: &str = "disease";
pub const KEY_UNIT: &str = "iu";
pub const KEY_RUNS: &str = "runs";
pub const KEY_INTERVENTION_TABLE: &str = "mdaData";
pub const KEY_COVERAGE: &str = "coverage";
pub const KEY_INTERVENTION_ROUNDS: &str = "mdaRounds";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Disease {
    #[serde(rename = "sth-roundworm")]
    SthRoundworm,
    #[serde(rename = "sth-whipworm")]
    SthWhipworm,
    #[serde(rename = "sth-hookworm")]
    SthHookworm,
    #[serde(rename = "sch-mansoni")]
    SchMansoni,
    #[serde(rename = "trachoma")]
    Trachoma,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiseaseFamily {
    SthSch,
    Trachoma,
}

impl Disease {
    pub const ALL: [Disease; 5] = [
        Self::SthRoundworm,
        Self::SthWhipworm,
        Self::SthHookworm,
        Self::SchMansoni,
        Self::Trachoma,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SthRoundworm => "sth-roundworm",
            Self::SthWhipworm => "sth-whipworm",
            Self::SthHookworm => "sth-hookworm",
            Self::SchMansoni => "sch-mansoni",
            Self::Trachoma => "trachoma",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|disease| disease.as_str() == raw)
    }

    pub fn family(self) -> DiseaseFamily {
        match self {
            Self::Trachoma => DiseaseFamily::Trachoma,
            _ => DiseaseFamily::SthSch,
        }
    }
}

impl std::fmt::Display for Disease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Implementation unit code: three-letter country code followed by the unit id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AdministrativeUnit(String);

impl AdministrativeUnit {
    pub fn parse(raw: &str) -> Result<Self> {
        let code = raw.trim();
        if code.len() <= 3 {
            return Err(ScenarioError::invalid(format!(
                "iu '{code}' must be a country code followed by a unit id"
            )));
        }
        if !code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ScenarioError::invalid(format!(
                "iu '{code}' must contain only ASCII letters and digits"
            )));
        }
        Ok(Self(code.to_string()))
    }

    pub fn code(&self) -> &str {
        &self.0
    }

    pub fn country(&self) -> &str {
        &self.0[..3]
    }

    pub fn unit_id(&self) -> &str {
        &self.0[3..]
    }
}

impl std::fmt::Display for AdministrativeUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioCommon {
    pub disease: Disease,
    pub unit: AdministrativeUnit,
    /// Already clamped to [`MAX_REPLICATES`].
    pub replicate_count: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SthScenario {
    pub common: ScenarioCommon,
    pub intervention_table: InterventionTable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrachomaScenario {
    pub common: ScenarioCommon,
    pub coverage: f64,
    pub intervention_rounds: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScenarioRequest {
    SthSch(SthScenario),
    Trachoma(TrachomaScenario),
}

impl ScenarioRequest {
    pub fn common(&self) -> &ScenarioCommon {
        match self {
            Self::SthSch(scenario) => &scenario.common,
            Self::Trachoma(scenario) => &scenario.common,
        }
    }
}

pub fn clamp_replicates(requested: u64) -> u32 {
    requested.min(u64::from(MAX_REPLICATES)) as u32
}

/// Validates the payload shape and builds the family-specific request.
///
/// Every shape problem is reported here, before any artifact is written.
pub fn parse_scenario(payload: &Value) -> Result<ScenarioRequest> {
    let Some(object) = payload.as_object() else {
        return Err(ScenarioError::MalformedBody {
            message: "request payload must be a JSON object".to_string(),
        });
    };

    for key in [KEY_DISEASE, KEY_UNIT, KEY_RUNS] {
        required(object, key)?;
    }

    let disease_raw = required(object, KEY_DISEASE)?;
    let disease_name = disease_raw
        .as_str()
        .ok_or_else(|| ScenarioError::UnsupportedDisease {
            disease: disease_raw.to_string(),
        })?;
    let disease = Disease::parse(disease_name).ok_or_else(|| ScenarioError::UnsupportedDisease {
        disease: disease_name.to_string(),
    })?;

    match disease.family() {
        DiseaseFamily::Trachoma => {
            required(object, KEY_COVERAGE)?;
            required(object, KEY_INTERVENTION_ROUNDS)?;
        }
        DiseaseFamily::SthSch => {
            let table = required(object, KEY_INTERVENTION_TABLE)?;
            if table.as_array().is_some_and(Vec::is_empty) {
                return Err(ScenarioError::missing_field(KEY_INTERVENTION_TABLE));
            }
        }
    }

    let unit = required(object, KEY_UNIT)?
        .as_str()
        .ok_or_else(|| ScenarioError::invalid("iu must be a string"))
        .and_then(AdministrativeUnit::parse)?;

    let requested = replicate_request(required(object, KEY_RUNS)?)
        .ok_or_else(|| ScenarioError::invalid("runs must be a positive integer"))?;

    let common = ScenarioCommon {
        disease,
        unit,
        replicate_count: clamp_replicates(requested),
    };

    match disease.family() {
        DiseaseFamily::SthSch => {
            let intervention_table =
                InterventionTable::from_value(required(object, KEY_INTERVENTION_TABLE)?)?;
            Ok(ScenarioRequest::SthSch(SthScenario {
                common,
                intervention_table,
            }))
        }
        DiseaseFamily::Trachoma => {
            let coverage = required(object, KEY_COVERAGE)?
                .as_f64()
                .filter(|value| value.is_finite() && *value >= 0.0)
                .ok_or_else(|| ScenarioError::invalid("coverage must be a non-negative number"))?;
            let intervention_rounds = required(object, KEY_INTERVENTION_ROUNDS)?
                .as_array()
                .cloned()
                .ok_or_else(|| ScenarioError::invalid("mdaRounds must be a list"))?;
            Ok(ScenarioRequest::Trachoma(TrachomaScenario {
                common,
                coverage,
                intervention_rounds,
            }))
        }
    }
}

// Integral floats such as `10.0` count as whole runs.
fn replicate_request(value: &Value) -> Option<u64> {
    value
        .as_u64()
        .or_else(|| {
            value
                .as_f64()
                .filter(|runs| runs.fract() == 0.0 && *runs >= 1.0 && *runs < u64::MAX as f64)
                .map(|runs| runs as u64)
        })
        .filter(|runs| *runs > 0)
}

fn required<'a>(object: &'a Map<String, Value>, key: &str) -> Result<&'a Value> {
    match object.get(key) {
        None | Some(Value::Null) => Err(ScenarioError::missing_field(key)),
        Some(value) => Ok(value),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SthOutputPaths {
    pub kksac: String,
    pub mhisac: String,
}

/// Payload handed to the STH/SCH simulation engine. Paths are storage URIs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SthEngineRequest {
    pub parameter_file_name: String,
    pub demography_name: String,
    pub intervention_input_path: String,
    pub output_paths: SthOutputPaths,
    pub historical_state_path: String,
    pub reference_series_path: String,
    pub replicate_count: u32,
    pub years_to_simulate: u32,
    pub output_frequency: u32,
}

/// Payload handed to the trachoma simulation engine. Paths are storage URIs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrachomaEngineRequest {
    pub transmission_param_path: String,
    pub intervention_input_path: String,
    pub output_prevalence_path: String,
    pub infection_trace_path: String,
    pub historical_state_path: String,
    pub coverage: f64,
    pub replicate_count: u32,
}
