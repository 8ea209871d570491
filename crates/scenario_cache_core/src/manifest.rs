use serde::{Deserialize, Serialize};

use crate::error::{Result, ScenarioError};
use crate::storage_keys::{SeriesArtifacts, StorageRoot, SthArtifacts, TrachomaArtifacts};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SthResultUrls {
    #[serde(rename = "historicalKKSACDataUrl")]
    pub historical_kksac_data_url: String,
    #[serde(rename = "historicalKKSACSummaryUrl")]
    pub historical_kksac_summary_url: String,
    #[serde(rename = "historicalMHISACDataUrl")]
    pub historical_mhisac_data_url: String,
    #[serde(rename = "historicalMHISACSummaryUrl")]
    pub historical_mhisac_summary_url: String,
    #[serde(rename = "futureKKSACDataUrl")]
    pub future_kksac_data_url: String,
    #[serde(rename = "futureKKSACSummaryUrl")]
    pub future_kksac_summary_url: String,
    #[serde(rename = "futureMHISACDataUrl")]
    pub future_mhisac_data_url: String,
    #[serde(rename = "futureMHISACSummaryUrl")]
    pub future_mhisac_summary_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TrachomaResultUrls {
    pub historical_data_url: String,
    pub historical_summary_url: String,
    pub future_data_url: String,
    pub future_summary_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ResultUrls {
    SthSch(SthResultUrls),
    Trachoma(TrachomaResultUrls),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResultManifest {
    pub status: bool,
    pub is_new_simulation: bool,
    #[serde(flatten)]
    pub urls: ResultUrls,
}

impl ResultManifest {
    pub fn new(urls: ResultUrls, is_new_simulation: bool) -> Self {
        Self {
            status: true,
            is_new_simulation,
            urls,
        }
    }

    /// Copy written to storage. A later reader of the stored file did not
    /// trigger the run, so it never reports a fresh simulation.
    pub fn persisted(&self) -> Self {
        Self {
            is_new_simulation: false,
            ..self.clone()
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|error| ScenarioError::Serialization {
            message: error.to_string(),
        })
    }
}

pub fn sth_result_urls(artifacts: &SthArtifacts, root: &StorageRoot) -> SthResultUrls {
    let (historical_kksac_data_url, historical_kksac_summary_url) =
        series_urls(&artifacts.historical_kksac, root);
    let (historical_mhisac_data_url, historical_mhisac_summary_url) =
        series_urls(&artifacts.historical_mhisac, root);
    let (future_kksac_data_url, future_kksac_summary_url) =
        series_urls(&artifacts.future_kksac, root);
    let (future_mhisac_data_url, future_mhisac_summary_url) =
        series_urls(&artifacts.future_mhisac, root);

    SthResultUrls {
        historical_kksac_data_url,
        historical_kksac_summary_url,
        historical_mhisac_data_url,
        historical_mhisac_summary_url,
        future_kksac_data_url,
        future_kksac_summary_url,
        future_mhisac_data_url,
        future_mhisac_summary_url,
    }
}

pub fn trachoma_result_urls(artifacts: &TrachomaArtifacts, root: &StorageRoot) -> TrachomaResultUrls {
    let (historical_data_url, historical_summary_url) =
        series_urls(&artifacts.historical_prevalence, root);
    let (future_data_url, future_summary_url) = series_urls(&artifacts.future_prevalence, root);

    TrachomaResultUrls {
        historical_data_url,
        historical_summary_url,
        future_data_url,
        future_summary_url,
    }
}

fn series_urls(series: &SeriesArtifacts, root: &StorageRoot) -> (String, String) {
    (series.data.public_url(root), series.summary.public_url(root))
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use crate::contract::{AdministrativeUnit, Disease};
    use crate::fingerprint::fingerprint_bytes;
    use crate::storage_keys::ArtifactNamer;

    use super::*;

    fn trachoma_manifest(is_new_simulation: bool) -> ResultManifest {
        let unit = AdministrativeUnit::parse("ETH18551").expect("unit");
        let artifacts = ArtifactNamer::default().trachoma_artifacts(&unit, &fingerprint_bytes(b"x"));
        let urls = trachoma_result_urls(&artifacts, &StorageRoot::s3("bucket"));
        ResultManifest::new(ResultUrls::Trachoma(urls), is_new_simulation)
    }

    #[test]
    fn persisted_copy_is_never_new() {
        let manifest = trachoma_manifest(true);
        assert!(manifest.is_new_simulation);
        assert!(!manifest.persisted().is_new_simulation);
        assert_eq!(manifest.persisted().urls, manifest.urls);
    }

    #[test]
    fn serializes_flat_wire_fields() {
        let json: Value = serde_json::from_slice(&trachoma_manifest(false).to_json().expect("json"))
            .expect("valid json");
        assert_eq!(json["status"], json!(true));
        assert_eq!(json["isNewSimulation"], json!(false));
        assert!(json["futureSummaryUrl"]
            .as_str()
            .expect("url")
            .starts_with("https://bucket.s3.amazonaws.com/diseases/trachoma/output-data/ETH/ETH18551/"));
        assert!(json.get("urls").is_none());
    }

    #[test]
    fn sth_fields_use_series_acronyms() {
        let unit = AdministrativeUnit::parse("ETH12345").expect("unit");
        let artifacts = ArtifactNamer::default().sth_artifacts(
            Disease::SthHookworm,
            &unit,
            &fingerprint_bytes(b"x"),
        );
        let manifest = ResultManifest::new(
            ResultUrls::SthSch(sth_result_urls(&artifacts, &StorageRoot::s3("bucket"))),
            true,
        );
        let json: Value = serde_json::from_slice(&manifest.to_json().expect("json")).expect("json");

        for field in [
            "historicalKKSACDataUrl",
            "historicalKKSACSummaryUrl",
            "historicalMHISACDataUrl",
            "historicalMHISACSummaryUrl",
            "futureKKSACDataUrl",
            "futureKKSACSummaryUrl",
            "futureMHISACDataUrl",
            "futureMHISACSummaryUrl",
        ] {
            assert!(json[field].is_string(), "missing {field}");
        }

        let round_trip: ResultManifest = serde_json::from_value(json).expect("manifest parses");
        assert_eq!(round_trip, manifest);
    }
}
