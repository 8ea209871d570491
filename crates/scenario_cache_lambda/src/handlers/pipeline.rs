//! Per-family scenario pipelines.
//!
//! A pipeline owns the full check-then-run sequence for one fingerprint:
//! write the intervention input, consult the cache gate, run the engine on a
//! miss, make sure every summary exists, then persist the manifest. Callers are expected to
//! hold the fingerprint's single-flight guard for the duration of
//! [`Pipeline::run`].

use std::fs;
use std::time::Instant;

use scenario_cache_core::contract::{
    ScenarioCommon, ScenarioRequest, SthEngineRequest, SthOutputPaths, SthScenario,
    TrachomaEngineRequest, TrachomaScenario, STH_DEMOGRAPHY_NAME, STH_OUTPUT_FREQUENCY,
    STH_YEARS_TO_SIMULATE,
};
use scenario_cache_core::error::{Result, ScenarioError};
use scenario_cache_core::fingerprint::Fingerprint;
use scenario_cache_core::intervention::trachoma_intervention_csv;
use scenario_cache_core::manifest::{
    sth_result_urls, trachoma_result_urls, ResultManifest, ResultUrls,
};
use scenario_cache_core::storage_keys::{
    disease_files, ArtifactNamer, ArtifactPath, SeriesArtifacts, StorageRoot, SthArtifacts,
    TrachomaArtifacts,
};
use scenario_cache_core::summary::summarize_csv;

use crate::adapters::engine::{SthEngine, TrachomaEngine};
use crate::adapters::object_store::{scratch_path, ObjectStore};

const COMPONENT: &str = "pipeline";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "hit",
            Self::Miss => "miss",
        }
    }
}

/// Hit iff every required output exists. Contents are never compared.
pub fn check_cache(store: &impl ObjectStore, required: &[&ArtifactPath]) -> Result<CacheStatus> {
    for path in required {
        if !store.object_exists(path.key()).map_err(storage_error)? {
            return Ok(CacheStatus::Miss);
        }
    }
    Ok(CacheStatus::Hit)
}

/// Summarizes the table at `data` and writes the JSON to `summary`.
pub fn summarize_artifact(
    store: &impl ObjectStore,
    data: &ArtifactPath,
    summary: &ArtifactPath,
) -> Result<()> {
    let local = store
        .download_to_local(data.key(), &scratch_path("series.csv"))
        .map_err(storage_error)?;
    let summarized = fs::File::open(&local)
        .map_err(|error| ScenarioError::Storage {
            message: format!("failed to open local copy of {}: {error}", data.key()),
        })
        .and_then(|file| summarize_csv(file));
    if let Err(error) = fs::remove_file(&local) {
        tracing::debug!(
            component = COMPONENT,
            event = "scratch_cleanup_failed",
            path = %local.display(),
            error = %error,
        );
    }

    let body = summarized?.to_json()?;
    store
        .write_object(summary.key(), &body)
        .map_err(storage_error)
}

/// Summarizes the series only when its summary does not exist yet.
/// Returns whether a summary was written.
pub fn summarize_if_missing(store: &impl ObjectStore, series: &SeriesArtifacts) -> Result<bool> {
    if store
        .object_exists(series.summary.key())
        .map_err(storage_error)?
    {
        return Ok(false);
    }
    summarize_artifact(store, &series.data, &series.summary)?;
    Ok(true)
}

/// Writes the manifest with `isNewSimulation` forced to false.
pub fn persist_manifest(
    store: &impl ObjectStore,
    path: &ArtifactPath,
    manifest: &ResultManifest,
) -> Result<()> {
    let body = manifest.persisted().to_json()?;
    store.write_object(path.key(), &body).map_err(storage_error)
}

#[derive(Debug, Clone, PartialEq)]
pub struct SthPipeline {
    scenario: SthScenario,
    fingerprint: Fingerprint,
    artifacts: SthArtifacts,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrachomaPipeline {
    scenario: TrachomaScenario,
    fingerprint: Fingerprint,
    artifacts: TrachomaArtifacts,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Pipeline {
    SthSch(SthPipeline),
    Trachoma(TrachomaPipeline),
}

impl Pipeline {
    pub fn plan(request: ScenarioRequest, fingerprint: Fingerprint, namer: &ArtifactNamer) -> Self {
        match request {
            ScenarioRequest::SthSch(scenario) => {
                let common = &scenario.common;
                let artifacts = namer.sth_artifacts(common.disease, &common.unit, &fingerprint);
                Self::SthSch(SthPipeline {
                    scenario,
                    fingerprint,
                    artifacts,
                })
            }
            ScenarioRequest::Trachoma(scenario) => {
                let artifacts = namer.trachoma_artifacts(&scenario.common.unit, &fingerprint);
                Self::Trachoma(TrachomaPipeline {
                    scenario,
                    fingerprint,
                    artifacts,
                })
            }
        }
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        match self {
            Self::SthSch(pipeline) => &pipeline.fingerprint,
            Self::Trachoma(pipeline) => &pipeline.fingerprint,
        }
    }

    pub fn common(&self) -> &ScenarioCommon {
        match self {
            Self::SthSch(pipeline) => &pipeline.scenario.common,
            Self::Trachoma(pipeline) => &pipeline.scenario.common,
        }
    }

    pub fn manifest_path(&self) -> &ArtifactPath {
        match self {
            Self::SthSch(pipeline) => &pipeline.artifacts.manifest,
            Self::Trachoma(pipeline) => &pipeline.artifacts.manifest,
        }
    }

    pub fn run<S, E>(&self, store: &S, engines: &E, root: &StorageRoot) -> Result<ResultManifest>
    where
        S: ObjectStore,
        E: SthEngine + TrachomaEngine,
    {
        let started = Instant::now();
        let common = self.common();
        tracing::info!(
            component = COMPONENT,
            event = "run_started",
            disease = %common.disease,
            iu = %common.unit,
            fingerprint = %self.fingerprint(),
            replicates = common.replicate_count,
        );

        let outcome = match self {
            Self::SthSch(pipeline) => pipeline.run(store, engines, root),
            Self::Trachoma(pipeline) => pipeline.run(store, engines, root),
        };

        match &outcome {
            Ok(manifest) => tracing::info!(
                component = COMPONENT,
                event = "run_completed",
                disease = %common.disease,
                iu = %common.unit,
                fingerprint = %self.fingerprint(),
                is_new_simulation = manifest.is_new_simulation,
                duration_ms = started.elapsed().as_millis() as u64,
            ),
            Err(error) => tracing::error!(
                component = COMPONENT,
                event = "run_failed",
                disease = %common.disease,
                iu = %common.unit,
                fingerprint = %self.fingerprint(),
                error_kind = error.kind().as_str(),
                error = %error,
                duration_ms = started.elapsed().as_millis() as u64,
            ),
        }
        outcome
    }
}

impl SthPipeline {
    fn run(
        &self,
        store: &impl ObjectStore,
        engine: &impl SthEngine,
        root: &StorageRoot,
    ) -> Result<ResultManifest> {
        let common = &self.scenario.common;
        let artifacts = &self.artifacts;

        let intervention_csv = self.scenario.intervention_table.to_csv()?;
        store
            .write_object(artifacts.intervention_input.key(), &intervention_csv)
            .map_err(storage_error)?;

        let cache = check_cache(
            store,
            &[&artifacts.future_kksac.data, &artifacts.future_mhisac.data],
        )?;
        log_cache(common, &self.fingerprint, cache);

        if cache == CacheStatus::Miss {
            let parameter_file_name = disease_files(common.disease)
                .parameter_file_name
                .ok_or_else(|| {
                    ScenarioError::invalid(format!("{} has no parameter file", common.disease))
                })?;
            let request = SthEngineRequest {
                parameter_file_name: parameter_file_name.to_string(),
                demography_name: STH_DEMOGRAPHY_NAME.to_string(),
                intervention_input_path: artifacts.intervention_input.storage_uri(root),
                output_paths: SthOutputPaths {
                    kksac: artifacts.future_kksac.data.storage_uri(root),
                    mhisac: artifacts.future_mhisac.data.storage_uri(root),
                },
                historical_state_path: artifacts.historical_state.storage_uri(root),
                reference_series_path: artifacts.reference_series.storage_uri(root),
                replicate_count: common.replicate_count,
                years_to_simulate: STH_YEARS_TO_SIMULATE,
                output_frequency: STH_OUTPUT_FREQUENCY,
            };
            run_engine(common, &self.fingerprint, || engine.run_sth(&request))?;
        }
        summarize_outputs(
            store,
            cache,
            &[&artifacts.future_kksac, &artifacts.future_mhisac],
            &[&artifacts.historical_kksac, &artifacts.historical_mhisac],
        )?;

        let manifest = ResultManifest::new(
            ResultUrls::SthSch(sth_result_urls(artifacts, root)),
            cache == CacheStatus::Miss,
        );
        persist_manifest(store, &artifacts.manifest, &manifest)?;
        Ok(manifest)
    }
}

impl TrachomaPipeline {
    fn run(
        &self,
        store: &impl ObjectStore,
        engine: &impl TrachomaEngine,
        root: &StorageRoot,
    ) -> Result<ResultManifest> {
        let common = &self.scenario.common;
        let artifacts = &self.artifacts;

        let intervention_csv = trachoma_intervention_csv(&self.scenario.intervention_rounds)?;
        store
            .write_object(artifacts.intervention_input.key(), &intervention_csv)
            .map_err(storage_error)?;

        let cache = check_cache(store, &[&artifacts.future_prevalence.data])?;
        log_cache(common, &self.fingerprint, cache);

        if cache == CacheStatus::Miss {
            let request = TrachomaEngineRequest {
                transmission_param_path: artifacts.transmission_params.storage_uri(root),
                intervention_input_path: artifacts.intervention_input.storage_uri(root),
                output_prevalence_path: artifacts.future_prevalence.data.storage_uri(root),
                infection_trace_path: artifacts.infection_trace.storage_uri(root),
                historical_state_path: artifacts.historical_state.storage_uri(root),
                coverage: self.scenario.coverage,
                replicate_count: common.replicate_count,
            };
            run_engine(common, &self.fingerprint, || engine.run_trachoma(&request))?;
        }
        summarize_outputs(
            store,
            cache,
            &[&artifacts.future_prevalence],
            &[&artifacts.historical_prevalence],
        )?;

        let manifest = ResultManifest::new(
            ResultUrls::Trachoma(trachoma_result_urls(artifacts, root)),
            cache == CacheStatus::Miss,
        );
        persist_manifest(store, &artifacts.manifest, &manifest)?;
        Ok(manifest)
    }
}

/// Fresh engine output is always re-summarized. On a hit only absent
/// summaries are built, which completes a run whose summaries failed after
/// the engine had already written its outputs.
fn summarize_outputs(
    store: &impl ObjectStore,
    cache: CacheStatus,
    future: &[&SeriesArtifacts],
    historical: &[&SeriesArtifacts],
) -> Result<()> {
    for series in future {
        match cache {
            CacheStatus::Miss => summarize_artifact(store, &series.data, &series.summary)?,
            CacheStatus::Hit => {
                summarize_if_missing(store, series)?;
            }
        }
    }
    for series in historical {
        summarize_if_missing(store, series)?;
    }
    Ok(())
}

fn run_engine(
    common: &ScenarioCommon,
    fingerprint: &Fingerprint,
    invoke: impl FnOnce() -> std::result::Result<(), String>,
) -> Result<()> {
    let started = Instant::now();
    invoke().map_err(|message| ScenarioError::Engine { message })?;
    tracing::info!(
        component = COMPONENT,
        event = "engine_completed",
        disease = %common.disease,
        iu = %common.unit,
        fingerprint = %fingerprint,
        duration_ms = started.elapsed().as_millis() as u64,
    );
    Ok(())
}

fn log_cache(common: &ScenarioCommon, fingerprint: &Fingerprint, cache: CacheStatus) {
    tracing::info!(
        component = COMPONENT,
        event = "cache_checked",
        disease = %common.disease,
        iu = %common.unit,
        fingerprint = %fingerprint,
        cache = cache.as_str(),
    );
}

fn storage_error(message: String) -> ScenarioError {
    ScenarioError::Storage { message }
}
