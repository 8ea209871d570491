use scenario_cache_core::contract::{SthEngineRequest, TrachomaEngineRequest};
use serde::Serialize;

/// STH/SCH engine. Writes both prevalence series to the requested paths.
pub trait SthEngine {
    fn run_sth(&self, request: &SthEngineRequest) -> Result<(), String>;
}

/// Trachoma engine. Writes the prevalence series and the infection trace.
pub trait TrachomaEngine {
    fn run_trachoma(&self, request: &TrachomaEngineRequest) -> Result<(), String>;
}

/// Synchronous request/response invocation of a named remote function.
pub trait FunctionInvoker {
    fn invoke_sync(&self, function_name: &str, payload: &[u8]) -> Result<Vec<u8>, String>;
}

/// Both engines deployed as functions and reached through one invoker. The
/// engines report results through storage, so response bodies are ignored.
#[derive(Debug, Clone)]
pub struct InvokedEngines<I> {
    invoker: I,
    sth_function: String,
    trachoma_function: String,
}

impl<I: FunctionInvoker> InvokedEngines<I> {
    pub fn new(invoker: I, sth_function: impl Into<String>, trachoma_function: impl Into<String>) -> Self {
        Self {
            invoker,
            sth_function: sth_function.into(),
            trachoma_function: trachoma_function.into(),
        }
    }

    fn invoke(&self, function_name: &str, request: &impl Serialize) -> Result<(), String> {
        let payload = serde_json::to_vec(request)
            .map_err(|error| format!("failed to serialize engine request: {error}"))?;
        self.invoker.invoke_sync(function_name, &payload).map(|_| ())
    }
}

impl<I: FunctionInvoker> SthEngine for InvokedEngines<I> {
    fn run_sth(&self, request: &SthEngineRequest) -> Result<(), String> {
        self.invoke(&self.sth_function, request)
    }
}

impl<I: FunctionInvoker> TrachomaEngine for InvokedEngines<I> {
    fn run_trachoma(&self, request: &TrachomaEngineRequest) -> Result<(), String> {
        self.invoke(&self.trachoma_function, request)
    }
}
