use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use scenario_cache_core::contract::{SthEngineRequest, TrachomaEngineRequest};
use scenario_cache_lambda::adapters::engine::{SthEngine, TrachomaEngine};
use scenario_cache_lambda::adapters::object_store::ObjectStore;

use super::fixtures::REPLICATE_SERIES;

/// In-memory bucket that records every write in order.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    writes: Mutex<Vec<String>>,
}

impl MemoryStore {
    pub fn seed(&self, key: &str, body: &[u8]) {
        self.objects
            .lock()
            .expect("poisoned mutex")
            .insert(key.to_string(), body.to_vec());
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().expect("poisoned mutex").get(key).cloned()
    }

    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().expect("poisoned mutex").clone()
    }
}

impl ObjectStore for MemoryStore {
    fn object_exists(&self, key: &str) -> Result<bool, String> {
        Ok(self.objects.lock().expect("poisoned mutex").contains_key(key))
    }

    fn write_object(&self, key: &str, body: &[u8]) -> Result<(), String> {
        self.writes
            .lock()
            .expect("poisoned mutex")
            .push(key.to_string());
        self.seed(key, body);
        Ok(())
    }

    fn read_object(&self, key: &str) -> Result<Vec<u8>, String> {
        self.get(key).ok_or_else(|| format!("no such key: {key}"))
    }
}

struct EngineState {
    store: Arc<MemoryStore>,
    bucket: String,
    delay: Duration,
    sth_runs: AtomicUsize,
    trachoma_runs: AtomicUsize,
    sth_requests: Mutex<Vec<SthEngineRequest>>,
}

/// Engine double that writes a fixed replicate table to every requested
/// output through the shared store. Clones share counters.
#[derive(Clone)]
pub struct SeriesEngines {
    state: Arc<EngineState>,
}

impl SeriesEngines {
    pub fn new(store: Arc<MemoryStore>, bucket: &str, delay: Duration) -> Self {
        Self {
            state: Arc::new(EngineState {
                store,
                bucket: bucket.to_string(),
                delay,
                sth_runs: AtomicUsize::new(0),
                trachoma_runs: AtomicUsize::new(0),
                sth_requests: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn sth_runs(&self) -> usize {
        self.state.sth_runs.load(Ordering::SeqCst)
    }

    pub fn trachoma_runs(&self) -> usize {
        self.state.trachoma_runs.load(Ordering::SeqCst)
    }

    pub fn sth_requests(&self) -> Vec<SthEngineRequest> {
        self.state.sth_requests.lock().expect("poisoned mutex").clone()
    }

    fn write_output(&self, uri: &str) -> Result<(), String> {
        let prefix = format!("s3://{}/", self.state.bucket);
        let key = uri
            .strip_prefix(&prefix)
            .ok_or_else(|| format!("output {uri} is outside bucket {}", self.state.bucket))?;
        self.state.store.seed(key, REPLICATE_SERIES.as_bytes());
        Ok(())
    }
}

impl SthEngine for SeriesEngines {
    fn run_sth(&self, request: &SthEngineRequest) -> Result<(), String> {
        self.state.sth_runs.fetch_add(1, Ordering::SeqCst);
        thread::sleep(self.state.delay);
        self.write_output(&request.output_paths.kksac)?;
        self.write_output(&request.output_paths.mhisac)?;
        self.state
            .sth_requests
            .lock()
            .expect("poisoned mutex")
            .push(request.clone());
        Ok(())
    }
}

impl TrachomaEngine for SeriesEngines {
    fn run_trachoma(&self, request: &TrachomaEngineRequest) -> Result<(), String> {
        self.state.trachoma_runs.fetch_add(1, Ordering::SeqCst);
        thread::sleep(self.state.delay);
        self.write_output(&request.output_prevalence_path)
    }
}

/// Lets the service own an `Arc` to a store the test still inspects.
pub struct SharedStore(pub Arc<MemoryStore>);

impl ObjectStore for SharedStore {
    fn object_exists(&self, key: &str) -> Result<bool, String> {
        self.0.object_exists(key)
    }

    fn write_object(&self, key: &str, body: &[u8]) -> Result<(), String> {
        self.0.write_object(key, body)
    }

    fn read_object(&self, key: &str) -> Result<Vec<u8>, String> {
        self.0.read_object(key)
    }
}
