mod support;

use scenario_cache_lambda::handlers::run::handle_run_event;
use serde_json::json;
use support::fixtures::{body_json, post_run, Harness};

#[test]
fn missing_unit_is_rejected_before_any_write() {
    let harness = Harness::new();
    let body = json!({
        "disease": "sth-roundworm",
        "runs": 10,
        "mdaData": [["Year"], [2018]]
    })
    .to_string();

    let response = handle_run_event(post_run(&body), &harness.service);

    assert_eq!(response.status_code, 400);
    assert_eq!(body_json(&response)["msg"], json!("request data is missing key: iu"));
    assert!(harness.store.writes().is_empty());
    assert_eq!(harness.engines.sth_runs(), 0);
}

#[test]
fn unsupported_disease_is_rejected() {
    let harness = Harness::new();
    let body = json!({"disease": "lf", "iu": "ETH12345", "runs": 10}).to_string();

    let response = handle_run_event(post_run(&body), &harness.service);

    assert_eq!(response.status_code, 400);
    assert_eq!(
        body_json(&response)["msg"],
        json!("request data specifies unknown disease: lf")
    );
    assert!(harness.store.writes().is_empty());
}

#[test]
fn ragged_intervention_table_fails_without_writes() {
    let harness = Harness::new();
    let body = json!({
        "disease": "sch-mansoni",
        "iu": "ETH12345",
        "runs": 10,
        "mdaData": [["Year", "Coverage"], [2018]]
    })
    .to_string();

    let response = handle_run_event(post_run(&body), &harness.service);
    let json = body_json(&response);

    assert_eq!(response.status_code, 200);
    assert_eq!(json["status"], json!(false));
    assert_eq!(json["errorKind"], json!("validation"));
    assert!(harness.store.writes().is_empty());
}

#[test]
fn missing_history_is_a_retryable_storage_failure() {
    let harness = Harness::new();
    let body = json!({
        "disease": "sth-hookworm",
        "iu": "KEN00001",
        "runs": 3,
        "mdaData": [["Year", "Coverage"], [2018, 0.5]]
    })
    .to_string();

    let json = body_json(&handle_run_event(post_run(&body), &harness.service));

    assert_eq!(json["status"], json!(false));
    assert_eq!(json["errorKind"], json!("storage"));
    assert_eq!(json["retryable"], json!(true));
}
