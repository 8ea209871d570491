//! Deterministic storage layout for scenario inputs, outputs and manifests.
//!
//! Every artifact is addressed by one bucket-relative key. The storage URI
//! handed to the engines and the public URL returned to clients are both
//! derived from that key through a [`StorageRoot`], so the two forms cannot
//! drift apart.

use crate::contract::{AdministrativeUnit, Disease};
use crate::fingerprint::Fingerprint;

pub const DEFAULT_KEY_ROOT: &str = "diseases";
const OUTPUT_DATA_DIR: &str = "output-data";

/// Static per-disease naming inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiseaseFiles {
    pub parameter_file_name: Option<&'static str>,
    pub file_abbreviation: &'static str,
    pub source_data_dir: &'static str,
}

pub fn disease_files(disease: Disease) -> DiseaseFiles {
    match disease {
        Disease::SthRoundworm => DiseaseFiles {
            parameter_file_name: Some("AscarisParameters_moderate.txt"),
            file_abbreviation: "Asc",
            source_data_dir: "source-data-redesign2021",
        },
        Disease::SthWhipworm => DiseaseFiles {
            parameter_file_name: Some("TrichurisParameters_moderate.txt"),
            file_abbreviation: "Tri",
            source_data_dir: "source-data-redesign2021",
        },
        Disease::SthHookworm => DiseaseFiles {
            parameter_file_name: Some("HookwormParameters_moderate.txt"),
            file_abbreviation: "Hook",
            source_data_dir: "source-data-redesign2021",
        },
        Disease::SchMansoni => DiseaseFiles {
            parameter_file_name: Some("SCH_MansoniParameters.txt"),
            file_abbreviation: "Man",
            source_data_dir: "source-data",
        },
        Disease::Trachoma => DiseaseFiles {
            parameter_file_name: None,
            file_abbreviation: "Trac",
            source_data_dir: "source-data",
        },
    }
}

/// Bucket plus the two URL bases that artifact keys are resolved against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageRoot {
    pub bucket: String,
    pub uri_scheme: String,
    pub public_base_url: String,
}

impl StorageRoot {
    pub fn s3(bucket: impl Into<String>) -> Self {
        let bucket = bucket.into();
        let public_base_url = format!("https://{bucket}.s3.amazonaws.com");
        Self {
            bucket,
            uri_scheme: "s3".to_string(),
            public_base_url,
        }
    }

    pub fn with_public_base_url(mut self, base: impl Into<String>) -> Self {
        self.public_base_url = base.into().trim_end_matches('/').to_string();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArtifactPath {
    key: String,
}

impl ArtifactPath {
    fn new(key: String) -> Self {
        Self { key }
    }

    /// Bucket-relative object key.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn storage_uri(&self, root: &StorageRoot) -> String {
        format!("{}://{}/{}", root.uri_scheme, root.bucket, self.key)
    }

    pub fn public_url(&self, root: &StorageRoot) -> String {
        format!("{}/{}", root.public_base_url, self.key)
    }

    /// Sibling summary artifact: `<stem>-summary.json` in the same directory.
    fn summary(&self) -> Self {
        let stem = self.key.strip_suffix(".csv").unwrap_or(&self.key);
        Self::new(format!("{stem}-summary.json"))
    }
}

/// Raw series plus the JSON summary derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesArtifacts {
    pub data: ArtifactPath,
    pub summary: ArtifactPath,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SthArtifacts {
    pub intervention_input: ArtifactPath,
    pub reference_series: ArtifactPath,
    pub historical_state: ArtifactPath,
    pub future_kksac: SeriesArtifacts,
    pub future_mhisac: SeriesArtifacts,
    pub historical_kksac: SeriesArtifacts,
    pub historical_mhisac: SeriesArtifacts,
    pub manifest: ArtifactPath,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrachomaArtifacts {
    pub intervention_input: ArtifactPath,
    pub transmission_params: ArtifactPath,
    pub infection_trace: ArtifactPath,
    pub historical_state: ArtifactPath,
    pub future_prevalence: SeriesArtifacts,
    pub historical_prevalence: SeriesArtifacts,
    pub manifest: ArtifactPath,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactSet {
    SthSch(SthArtifacts),
    Trachoma(TrachomaArtifacts),
}

impl ArtifactSet {
    /// Outputs whose joint existence counts as a cache hit.
    pub fn required_outputs(&self) -> Vec<&ArtifactPath> {
        match self {
            Self::SthSch(set) => vec![&set.future_kksac.data, &set.future_mhisac.data],
            Self::Trachoma(set) => vec![&set.future_prevalence.data],
        }
    }

    pub fn manifest(&self) -> &ArtifactPath {
        match self {
            Self::SthSch(set) => &set.manifest,
            Self::Trachoma(set) => &set.manifest,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactNamer {
    key_root: String,
}

impl Default for ArtifactNamer {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_ROOT)
    }
}

impl ArtifactNamer {
    pub fn new(key_root: &str) -> Self {
        Self {
            key_root: key_root.trim_matches('/').to_string(),
        }
    }

    /// `<root>/<disease>/<source dir>/<country>/<iu>`, shared by every fingerprint.
    pub fn source_prefix(&self, disease: Disease, unit: &AdministrativeUnit) -> String {
        format!(
            "{}/{disease}/{}/{}/{}",
            self.key_root,
            disease_files(disease).source_data_dir,
            unit.country(),
            unit.code(),
        )
    }

    /// `<root>/<disease>/output-data/<country>/<iu>/<fingerprint>`.
    pub fn output_prefix(
        &self,
        disease: Disease,
        unit: &AdministrativeUnit,
        fingerprint: &Fingerprint,
    ) -> String {
        format!(
            "{}/{disease}/{OUTPUT_DATA_DIR}/{}/{}/{fingerprint}",
            self.key_root,
            unit.country(),
            unit.code(),
        )
    }

    pub fn artifact_set(
        &self,
        disease: Disease,
        unit: &AdministrativeUnit,
        fingerprint: &Fingerprint,
    ) -> ArtifactSet {
        match disease {
            Disease::Trachoma => ArtifactSet::Trachoma(self.trachoma_artifacts(unit, fingerprint)),
            _ => ArtifactSet::SthSch(self.sth_artifacts(disease, unit, fingerprint)),
        }
    }

    pub fn sth_artifacts(
        &self,
        disease: Disease,
        unit: &AdministrativeUnit,
        fingerprint: &Fingerprint,
    ) -> SthArtifacts {
        let abbrev = disease_files(disease).file_abbreviation;
        let iu = unit.code();
        let src = self.source_prefix(disease, unit);
        let out = self.output_prefix(disease, unit, fingerprint);
        let path = |dir: &str, file: String| ArtifactPath::new(format!("{dir}/{file}"));

        let future_kksac = path(&out, format!("OutputPrevKKSAC-{abbrev}-{iu}-{fingerprint}.csv"));
        let future_mhisac = path(&out, format!("OutputPrevMHISAC-{abbrev}-{iu}-{fingerprint}.csv"));

        SthArtifacts {
            intervention_input: path(&out, format!("InputMDA-{fingerprint}.csv")),
            reference_series: path(&src, format!("Input_Rk_{abbrev}_{iu}.csv")),
            historical_state: path(&src, format!("{abbrev}_{iu}.p")),
            future_kksac: SeriesArtifacts {
                summary: future_kksac.summary(),
                data: future_kksac,
            },
            future_mhisac: SeriesArtifacts {
                summary: future_mhisac.summary(),
                data: future_mhisac,
            },
            historical_kksac: SeriesArtifacts {
                data: path(&src, format!("PrevKKSAC{abbrev}_{iu}.csv")),
                summary: path(
                    &out,
                    format!("HistoricalKKSACPrev-{iu}-{fingerprint}-summary.json"),
                ),
            },
            historical_mhisac: SeriesArtifacts {
                data: path(&src, format!("PrevMHISAC{abbrev}_{iu}.csv")),
                summary: path(
                    &out,
                    format!("HistoricalMHISACPrev-{iu}-{fingerprint}-summary.json"),
                ),
            },
            manifest: path(&out, format!("{abbrev}-{iu}-{fingerprint}-info.json")),
        }
    }

    pub fn trachoma_artifacts(
        &self,
        unit: &AdministrativeUnit,
        fingerprint: &Fingerprint,
    ) -> TrachomaArtifacts {
        let disease = Disease::Trachoma;
        let abbrev = disease_files(disease).file_abbreviation;
        let unit_file_id = format!("{}{}", unit.country(), unit.unit_id());
        let src = self.source_prefix(disease, unit);
        let out = self.output_prefix(disease, unit, fingerprint);
        let path = |dir: &str, file: String| ArtifactPath::new(format!("{dir}/{file}"));

        let future = path(&out, format!("OutputPrev-{fingerprint}.csv"));
        // The historical summary depends on the unit only, so it sits next to
        // the shared historical series rather than under the fingerprint.
        let historical = path(&src, format!("OutputPrev_{unit_file_id}.csv"));

        TrachomaArtifacts {
            intervention_input: path(&out, format!("InputMDA-{fingerprint}.csv")),
            transmission_params: path(&src, format!("InputBet_{unit_file_id}.csv")),
            infection_trace: path(&out, format!("InfectFile-{fingerprint}.csv")),
            historical_state: path(&src, format!("OutputVals_{unit_file_id}.p")),
            future_prevalence: SeriesArtifacts {
                summary: future.summary(),
                data: future,
            },
            historical_prevalence: SeriesArtifacts {
                summary: historical.summary(),
                data: historical,
            },
            manifest: path(&out, format!("{abbrev}-{}-{fingerprint}-info.json", unit.code())),
        }
    }
}
