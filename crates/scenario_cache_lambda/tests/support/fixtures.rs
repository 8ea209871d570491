use std::sync::Arc;
use std::time::Duration;

use scenario_cache_core::fingerprint::FingerprintMode;
use scenario_cache_core::storage_keys::{ArtifactNamer, StorageRoot};
use scenario_cache_lambda::handlers::run::{ApiGatewayResponse, ScenarioService};
use serde_json::{json, Value};

use super::doubles::{MemoryStore, SeriesEngines, SharedStore};

pub const BUCKET: &str = "ntd-results";

/// Wide replicate table: two metadata columns, then one column per time point.
pub const REPLICATE_SERIES: &str =
    "draw,age_group,2020.0,2020.5,2021.0\n1,SAC,0.30,0.20,0.10\n2,SAC,0.40,0.30,0.20\n3,SAC,0.50,0.40,0.30\n";

pub type TestService = ScenarioService<SharedStore, SeriesEngines>;

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub engines: SeriesEngines,
    pub service: TestService,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_engine_delay(Duration::ZERO)
    }

    pub fn with_engine_delay(delay: Duration) -> Self {
        Self::build(delay, FingerprintMode::Raw)
    }

    pub fn with_fingerprint_mode(mode: FingerprintMode) -> Self {
        Self::build(Duration::ZERO, mode)
    }

    fn build(delay: Duration, mode: FingerprintMode) -> Self {
        let store = Arc::new(MemoryStore::default());
        let engines = SeriesEngines::new(Arc::clone(&store), BUCKET, delay);
        let service = ScenarioService::new(
            SharedStore(Arc::clone(&store)),
            engines.clone(),
            ArtifactNamer::default(),
            StorageRoot::s3(BUCKET),
        )
        .with_fingerprint_mode(mode);
        Self {
            store,
            engines,
            service,
        }
    }

    /// Seeds the shared historical series the engines never produce.
    pub fn seed_sth_history(&self, source_dir: &str, abbrev: &str, iu: &str) {
        let src = format!("diseases/{source_dir}/{}/{iu}", &iu[..3]);
        self.store.seed(
            &format!("{src}/PrevKKSAC{abbrev}_{iu}.csv"),
            REPLICATE_SERIES.as_bytes(),
        );
        self.store.seed(
            &format!("{src}/PrevMHISAC{abbrev}_{iu}.csv"),
            REPLICATE_SERIES.as_bytes(),
        );
    }

    pub fn seed_trachoma_history(&self, iu: &str) {
        self.store.seed(
            &format!("diseases/trachoma/source-data/{}/{iu}/OutputPrev_{iu}.csv", &iu[..3]),
            REPLICATE_SERIES.as_bytes(),
        );
    }

    /// Bucket key behind a public URL returned in a manifest.
    pub fn key_for_url(url: &Value) -> String {
        url.as_str()
            .and_then(|url| url.strip_prefix(&format!("https://{BUCKET}.s3.amazonaws.com/")))
            .map(str::to_string)
            .unwrap_or_else(|| panic!("unexpected url {url}"))
    }
}

pub fn sth_body() -> String {
    json!({
        "disease": "sth-roundworm",
        "iu": "ETH12345",
        "runs": 10,
        "mdaData": [
            ["Year", "Age_start", "Age_end", "Coverage", "Label"],
            [2018, 2, 4, 0.75, "Pre-SAC"],
            [2019, 5, 14, 0.75, "SAC"]
        ]
    })
    .to_string()
}

pub fn trachoma_body() -> String {
    json!({
        "disease": "trachoma",
        "iu": "ETH18551",
        "runs": 500,
        "coverage": 0.6,
        "mdaRounds": [2021, 2022, 2024]
    })
    .to_string()
}

pub fn post_run(body: &str) -> Value {
    json!({
        "version": "2.0",
        "rawPath": "/run",
        "requestContext": {"http": {"method": "POST"}},
        "body": body,
        "isBase64Encoded": false
    })
}

pub fn body_json(response: &ApiGatewayResponse) -> Value {
    serde_json::from_str(&response.body).expect("response body should be json")
}
