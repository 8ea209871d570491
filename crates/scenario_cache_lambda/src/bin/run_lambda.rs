use std::sync::Arc;

use aws_sdk_lambda::types::InvocationType;
use aws_sdk_s3::primitives::ByteStream;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use scenario_cache_lambda::adapters::engine::{FunctionInvoker, InvokedEngines};
use scenario_cache_lambda::adapters::object_store::ObjectStore;
use scenario_cache_lambda::config::ServiceConfig;
use scenario_cache_lambda::handlers::run::{handle_run_event, ApiGatewayResponse, ScenarioService};
use scenario_cache_lambda::observability::init_logging;
use serde_json::Value;

type Service = ScenarioService<S3ObjectStore, InvokedEngines<AwsFunctionInvoker>>;

struct S3ObjectStore {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl ObjectStore for S3ObjectStore {
    fn object_exists(&self, key: &str) -> Result<bool, String> {
        let client = self.client.clone();
        let bucket = self.bucket.clone();
        let key = key.to_string();

        block_on(async move {
            match client.head_object().bucket(bucket).key(&key).send().await {
                Ok(_) => Ok(true),
                Err(error) => {
                    if error
                        .as_service_error()
                        .is_some_and(|service_error| service_error.is_not_found())
                    {
                        Ok(false)
                    } else {
                        Err(format!("failed to check s3 object {key}: {error}"))
                    }
                }
            }
        })
    }

    fn write_object(&self, key: &str, body: &[u8]) -> Result<(), String> {
        let client = self.client.clone();
        let bucket = self.bucket.clone();
        let key = key.to_string();
        let bytes = body.to_vec();

        block_on(async move {
            client
                .put_object()
                .bucket(bucket)
                .key(&key)
                .body(ByteStream::from(bytes))
                .send()
                .await
                .map(|_| ())
                .map_err(|error| format!("failed to write s3 object {key}: {error}"))
        })
    }

    fn read_object(&self, key: &str) -> Result<Vec<u8>, String> {
        let client = self.client.clone();
        let bucket = self.bucket.clone();
        let key = key.to_string();

        block_on(async move {
            let output = client
                .get_object()
                .bucket(bucket)
                .key(&key)
                .send()
                .await
                .map_err(|error| format!("failed to read s3 object {key}: {error}"))?;
            output
                .body
                .collect()
                .await
                .map(|data| data.into_bytes().to_vec())
                .map_err(|error| format!("failed to stream s3 object {key}: {error}"))
        })
    }
}

struct AwsFunctionInvoker {
    lambda_client: aws_sdk_lambda::Client,
}

impl FunctionInvoker for AwsFunctionInvoker {
    fn invoke_sync(&self, function_name: &str, payload: &[u8]) -> Result<Vec<u8>, String> {
        let client = self.lambda_client.clone();
        let function_name = function_name.to_string();
        let request_payload = payload.to_vec();

        block_on(async move {
            let output = client
                .invoke()
                .function_name(&function_name)
                .invocation_type(InvocationType::RequestResponse)
                .set_payload(Some(request_payload.into()))
                .send()
                .await
                .map_err(|error| format!("failed to invoke {function_name}: {error}"))?;

            let response = output
                .payload()
                .map(|blob| blob.as_ref().to_vec())
                .unwrap_or_default();
            if let Some(function_error) = output.function_error() {
                return Err(format!(
                    "{function_name} failed with {function_error}: {}",
                    String::from_utf8_lossy(&response)
                ));
            }
            Ok(response)
        })
    }
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}

async fn handle_request(
    event: LambdaEvent<Value>,
    service: Arc<Service>,
) -> Result<ApiGatewayResponse, Error> {
    // The fingerprint lock may park this thread until a peer run finishes.
    Ok(tokio::task::block_in_place(|| {
        handle_run_event(event.payload, &service)
    }))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = ServiceConfig::from_env()?;
    init_logging(config.log_format);

    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let store = S3ObjectStore {
        client: aws_sdk_s3::Client::new(&aws_config),
        bucket: config.bucket.clone(),
    };
    let engines = InvokedEngines::new(
        AwsFunctionInvoker {
            lambda_client: aws_sdk_lambda::Client::new(&aws_config),
        },
        &config.sth_engine_function,
        &config.trachoma_engine_function,
    );
    let service: Arc<Service> = Arc::new(
        ScenarioService::new(store, engines, config.namer(), config.storage_root())
            .with_fingerprint_mode(config.fingerprint_mode),
    );

    tracing::info!(
        component = "run_lambda",
        event = "cold_start",
        bucket = %config.bucket,
        fingerprint_mode = ?config.fingerprint_mode,
    );

    lambda_runtime::run(service_fn(move |event| {
        handle_request(event, Arc::clone(&service))
    }))
    .await
}
