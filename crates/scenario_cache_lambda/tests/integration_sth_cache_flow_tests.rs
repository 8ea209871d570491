mod support;

use scenario_cache_core::fingerprint::{fingerprint_bytes, FingerprintMode};
use scenario_cache_lambda::handlers::run::handle_run_event;
use serde_json::json;
use support::fixtures::{body_json, post_run, sth_body, Harness};

const SUMMARY_FIELDS: [&str; 4] = [
    "historicalKKSACSummaryUrl",
    "historicalMHISACSummaryUrl",
    "futureKKSACSummaryUrl",
    "futureMHISACSummaryUrl",
];

#[test]
fn first_submission_simulates_and_resubmission_hits_cache() {
    let harness = Harness::new();
    harness.seed_sth_history("sth-roundworm/source-data-redesign2021", "Asc", "ETH12345");
    let body = sth_body();

    let first = handle_run_event(post_run(&body), &harness.service);
    assert_eq!(first.status_code, 200);
    let first_json = body_json(&first);
    assert_eq!(first_json["status"], json!(true));
    assert_eq!(first_json["isNewSimulation"], json!(true));
    assert_eq!(harness.engines.sth_runs(), 1);

    for field in SUMMARY_FIELDS {
        let key = Harness::key_for_url(&first_json[field]);
        assert!(
            harness.store.get(&key).is_some(),
            "{field} should point at a written summary"
        );
    }

    let second = handle_run_event(post_run(&body), &harness.service);
    let second_json = body_json(&second);
    assert_eq!(second_json["isNewSimulation"], json!(false));
    assert_eq!(harness.engines.sth_runs(), 1);

    let mut first_urls = first_json.clone();
    let mut second_urls = second_json.clone();
    first_urls["isNewSimulation"] = json!(null);
    second_urls["isNewSimulation"] = json!(null);
    assert_eq!(first_urls, second_urls);
}

#[test]
fn outputs_land_under_the_body_fingerprint() {
    let harness = Harness::new();
    harness.seed_sth_history("sth-roundworm/source-data-redesign2021", "Asc", "ETH12345");
    let body = sth_body();
    let fingerprint = fingerprint_bytes(body.as_bytes());

    let response = body_json(&handle_run_event(post_run(&body), &harness.service));
    let future = Harness::key_for_url(&response["futureKKSACDataUrl"]);
    assert_eq!(
        future,
        format!(
            "diseases/sth-roundworm/output-data/ETH/ETH12345/{fingerprint}/OutputPrevKKSAC-Asc-ETH12345-{fingerprint}.csv"
        )
    );

    let manifest_key = format!(
        "diseases/sth-roundworm/output-data/ETH/ETH12345/{fingerprint}/Asc-ETH12345-{fingerprint}-info.json"
    );
    let persisted: serde_json::Value =
        serde_json::from_slice(&harness.store.get(&manifest_key).expect("manifest written"))
            .expect("manifest is json");
    assert_eq!(persisted["isNewSimulation"], json!(false));
    assert_eq!(persisted["futureKKSACDataUrl"], response["futureKKSACDataUrl"]);

    let requests = harness.engines.sth_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].replicate_count, 10);
    assert_eq!(
        requests[0].reference_series_path,
        "s3://ntd-results/diseases/sth-roundworm/source-data-redesign2021/ETH/ETH12345/Input_Rk_Asc_ETH12345.csv"
    );
}

#[test]
fn whitespace_variant_is_a_different_scenario_in_raw_mode() {
    let harness = Harness::new();
    harness.seed_sth_history("sth-roundworm/source-data-redesign2021", "Asc", "ETH12345");
    let body = sth_body();
    let spaced = body.replace(',', ", ");

    handle_run_event(post_run(&body), &harness.service);
    let second = body_json(&handle_run_event(post_run(&spaced), &harness.service));

    assert_eq!(second["isNewSimulation"], json!(true));
    assert_eq!(harness.engines.sth_runs(), 2);
}

#[test]
fn intervention_input_is_written_as_csv() {
    let harness = Harness::new();
    harness.seed_sth_history("sth-roundworm/source-data-redesign2021", "Asc", "ETH12345");
    let body = sth_body();
    let fingerprint = fingerprint_bytes(body.as_bytes());

    handle_run_event(post_run(&body), &harness.service);

    let csv = harness
        .store
        .get(&format!(
            "diseases/sth-roundworm/output-data/ETH/ETH12345/{fingerprint}/InputMDA-{fingerprint}.csv"
        ))
        .expect("intervention input written");
    let text = String::from_utf8(csv).expect("utf8");
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("Year,Age_start,Age_end,Coverage,Label"));
    assert_eq!(lines.next(), Some("2018,2,4,0.75,Pre-SAC"));
}

#[test]
fn retry_after_missing_history_completes_every_summary() {
    let harness = Harness::new();
    let body = json!({
        "disease": "sth-hookworm",
        "iu": "KEN00001",
        "runs": 3,
        "mdaData": [["Year", "Coverage"], [2018, 0.5]]
    })
    .to_string();

    let first = body_json(&handle_run_event(post_run(&body), &harness.service));
    assert_eq!(first["status"], json!(false));
    assert_eq!(first["retryable"], json!(true));

    harness.seed_sth_history("sth-hookworm/source-data-redesign2021", "Hook", "KEN00001");
    let retry = body_json(&handle_run_event(post_run(&body), &harness.service));

    assert_eq!(retry["status"], json!(true));
    assert_eq!(retry["isNewSimulation"], json!(false));
    assert_eq!(harness.engines.sth_runs(), 1);
    for field in SUMMARY_FIELDS {
        let key = Harness::key_for_url(&retry[field]);
        assert!(harness.store.get(&key).is_some(), "{field} should exist after retry");
    }
}

#[test]
fn reordered_keys_hit_the_cache_in_canonical_mode() {
    let harness = Harness::with_fingerprint_mode(FingerprintMode::Canonical);
    harness.seed_sth_history("sth-roundworm/source-data-redesign2021", "Asc", "ETH12345");
    let body = sth_body();
    let reordered = r#"{"mdaData": [["Year", "Age_start", "Age_end", "Coverage", "Label"], [2018, 2, 4, 0.75, "Pre-SAC"], [2019, 5, 14, 0.75, "SAC"]], "runs": 10, "iu": "ETH12345", "disease": "sth-roundworm"}"#;

    let first = body_json(&handle_run_event(post_run(&body), &harness.service));
    let second = body_json(&handle_run_event(post_run(reordered), &harness.service));

    assert_eq!(first["isNewSimulation"], json!(true));
    assert_eq!(second["status"], json!(true));
    assert_eq!(second["isNewSimulation"], json!(false));
    assert_eq!(harness.engines.sth_runs(), 1);
    assert_eq!(first["futureKKSACSummaryUrl"], second["futureKKSACSummaryUrl"]);
}
