use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use scenario_cache_core::contract::parse_scenario;
use scenario_cache_core::error::{Result, ScenarioError};
use scenario_cache_core::fingerprint::{fingerprint_payload, FingerprintMode};
use scenario_cache_core::manifest::ResultManifest;
use scenario_cache_core::storage_keys::{ArtifactNamer, StorageRoot};

use crate::adapters::engine::{SthEngine, TrachomaEngine};
use crate::adapters::object_store::ObjectStore;
use crate::handlers::pipeline::Pipeline;
use crate::handlers::single_flight::FingerprintLocks;

const COMPONENT: &str = "run_handler";
pub const GREETING: &str = "NTD scenario runner is up";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiGatewayResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub headers: Value,
    pub body: String,
}

/// Long-lived request handler. Built once per process and shared by every
/// invocation so the fingerprint locks see all in-flight requests.
pub struct ScenarioService<S, E> {
    store: S,
    engines: E,
    namer: ArtifactNamer,
    root: StorageRoot,
    fingerprint_mode: FingerprintMode,
    locks: FingerprintLocks,
}

impl<S, E> ScenarioService<S, E>
where
    S: ObjectStore,
    E: SthEngine + TrachomaEngine,
{
    pub fn new(store: S, engines: E, namer: ArtifactNamer, root: StorageRoot) -> Self {
        Self {
            store,
            engines,
            namer,
            root,
            fingerprint_mode: FingerprintMode::default(),
            locks: FingerprintLocks::new(),
        }
    }

    pub fn with_fingerprint_mode(mut self, mode: FingerprintMode) -> Self {
        self.fingerprint_mode = mode;
        self
    }

    /// Validates, fingerprints and runs one scenario body.
    ///
    /// The fingerprint is taken over `body` exactly as received (or its
    /// canonical form), never over the parsed value.
    pub fn execute(&self, body: &[u8]) -> Result<ResultManifest> {
        let payload: Value =
            serde_json::from_slice(body).map_err(|error| ScenarioError::MalformedBody {
                message: error.to_string(),
            })?;
        let request = parse_scenario(&payload)?;
        let fingerprint = fingerprint_payload(body, self.fingerprint_mode)?;
        let pipeline = Pipeline::plan(request, fingerprint, &self.namer);

        let _guard = self.locks.acquire(pipeline.fingerprint().as_str());
        pipeline.run(&self.store, &self.engines, &self.root)
    }
}

/// Routes one API Gateway (v1 or v2) or direct invocation event.
pub fn handle_run_event<S, E>(event: Value, service: &ScenarioService<S, E>) -> ApiGatewayResponse
where
    S: ObjectStore,
    E: SthEngine + TrachomaEngine,
{
    let method = event_method(&event);
    let path = event_path(&event);

    match (method.as_deref(), path.as_deref()) {
        (Some("OPTIONS"), _) => empty_response(204),
        (Some("GET"), Some("/")) => text_response(200, GREETING),
        (None, _) | (Some("POST"), Some("/run")) => run_response(event, service),
        (Some(method), path) => {
            tracing::warn!(
                component = COMPONENT,
                event = "route_not_found",
                method,
                path = path.unwrap_or(""),
            );
            json_response(404, json!({"status": false, "msg": "not found"}))
        }
    }
}

fn run_response<S, E>(event: Value, service: &ScenarioService<S, E>) -> ApiGatewayResponse
where
    S: ObjectStore,
    E: SthEngine + TrachomaEngine,
{
    let outcome = request_body(event).and_then(|body| service.execute(&body));
    match outcome {
        Ok(manifest) => match serde_json::to_value(&manifest) {
            Ok(body) => json_response(200, body),
            Err(error) => failure_response(&ScenarioError::Serialization {
                message: error.to_string(),
            }),
        },
        Err(error) => {
            if error.is_rejection() {
                tracing::warn!(
                    component = COMPONENT,
                    event = "request_rejected",
                    error = %error,
                );
            }
            failure_response(&error)
        }
    }
}

/// Extracts the raw body bytes. A string body is passed through untouched so
/// the fingerprint covers exactly what the client sent.
fn request_body(event: Value) -> Result<Vec<u8>> {
    let Value::Object(mut object) = event else {
        return Err(ScenarioError::MalformedBody {
            message: "request payload must be a JSON object".to_string(),
        });
    };

    if object
        .get("isBase64Encoded")
        .and_then(Value::as_bool)
        .unwrap_or(false)
    {
        return Err(ScenarioError::MalformedBody {
            message: "base64-encoded bodies are not supported".to_string(),
        });
    }

    let body = match object.remove("body") {
        None => return serialize_body(&Value::Object(object)),
        Some(body) => body,
    };

    match body {
        Value::String(text) => Ok(text.into_bytes()),
        Value::Object(_) => serialize_body(&body),
        Value::Null => Err(ScenarioError::MalformedBody {
            message: "request body is empty".to_string(),
        }),
        _ => Err(ScenarioError::MalformedBody {
            message: "request body must be a JSON object".to_string(),
        }),
    }
}

fn serialize_body(value: &Value) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|error| ScenarioError::Serialization {
        message: error.to_string(),
    })
}

fn event_method(event: &Value) -> Option<String> {
    event
        .pointer("/requestContext/http/method")
        .or_else(|| event.get("httpMethod"))
        .and_then(Value::as_str)
        .map(str::to_ascii_uppercase)
}

fn event_path(event: &Value) -> Option<String> {
    event
        .get("rawPath")
        .or_else(|| event.get("path"))
        .and_then(Value::as_str)
        .map(|path| match path.trim_end_matches('/') {
            "" => "/".to_string(),
            trimmed => trimmed.to_string(),
        })
}

fn failure_response(error: &ScenarioError) -> ApiGatewayResponse {
    let status_code = if error.is_rejection() { 400 } else { 200 };
    json_response(
        status_code,
        json!({
            "status": false,
            "msg": error.to_string(),
            "errorKind": error.kind().as_str(),
            "retryable": error.is_retryable(),
        }),
    )
}

fn cors_headers(content_type: Option<&str>) -> Value {
    let mut headers = json!({
        "Access-Control-Allow-Origin": "*",
        "Access-Control-Allow-Headers": "content-type",
        "Access-Control-Allow-Methods": "GET,POST,OPTIONS",
    });
    if let (Some(content_type), Some(object)) = (content_type, headers.as_object_mut()) {
        object.insert("Content-Type".to_string(), json!(content_type));
    }
    headers
}

fn json_response(status_code: u16, payload: Value) -> ApiGatewayResponse {
    ApiGatewayResponse {
        status_code,
        headers: cors_headers(Some("application/json")),
        body: payload.to_string(),
    }
}

fn text_response(status_code: u16, body: &str) -> ApiGatewayResponse {
    ApiGatewayResponse {
        status_code,
        headers: cors_headers(Some("text/plain")),
        body: body.to_string(),
    }
}

fn empty_response(status_code: u16) -> ApiGatewayResponse {
    ApiGatewayResponse {
        status_code,
        headers: cors_headers(None),
        body: String::new(),
    }
}
