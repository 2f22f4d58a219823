//! Tests for sample downloads

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value, json};
use spl_core::config::SampleConfig;
use spl_core::{AcceptDefaults, ConnectionAdapter, SamplesManager};
use spl_test_utils::{Answer, Call, MemoryService, ScriptedPrompter};
use tempfile::TempDir;

fn row(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}

fn samples() -> BTreeMap<String, SampleConfig> {
    let sample = |query: &str| SampleConfig {
        src: "dev".into(),
        query: query.into(),
        earliest: "-24h".into(),
        latest: "now".into(),
    };
    BTreeMap::from([
        ("errors".to_string(), sample("index=_internal log_level=ERROR")),
        ("empty".to_string(), sample("index=nothing")),
        ("broken".to_string(), sample("| bogus")),
    ])
}

fn service() -> Arc<MemoryService> {
    Arc::new(
        MemoryService::new("https://dev:8089")
            .with_polls_until_done(3)
            .with_search_results(
                "search index=_internal log_level=ERROR",
                vec![
                    row(json!({"_time": "2024-01-01T00:00:00", "_raw": "boom", "host": "a"})),
                    row(json!({"_time": "2024-01-01T00:00:01", "_raw": "bang", "tag": ["x", "y"]})),
                ],
            )
            .with_failing_search("| bogus"),
    )
}

fn manager(dir: &TempDir, interactive: bool) -> SamplesManager {
    SamplesManager::new(&samples(), dir.path(), interactive)
        .with_poll_interval(Duration::from_millis(1))
}

#[tokio::test]
async fn test_named_sample_is_written_as_csv() {
    let dir = TempDir::new().unwrap();
    let service = service();
    let adapter = ConnectionAdapter::from_service("dev", service.clone(), false);

    let report = manager(&dir, false)
        .download(&adapter, Some("errors"), &AcceptDefaults)
        .await
        .unwrap();

    let path = dir.path().join("errors.csv");
    assert_eq!(report.written, vec![path.clone()]);
    assert!(report.errors.is_empty());

    let mut reader = csv::Reader::from_path(&path).unwrap();
    let headers: Vec<String> = reader.headers().unwrap().iter().map(str::to_string).collect();
    for column in ["_time", "_raw", "host", "tag"] {
        assert!(headers.contains(&column.to_string()), "missing {column}");
    }
    let records: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(records.len(), 2);
    let tag = headers.iter().position(|h| h == "tag").unwrap();
    assert_eq!(&records[1][tag], "x\ny");
    assert_eq!(&records[0][tag], "");

    assert_eq!(
        service.calls(),
        vec![Call::Search(spl_client::SearchRequest {
            query: "search index=_internal log_level=ERROR".into(),
            earliest: "-24h".into(),
            latest: "now".into(),
        })]
    );
}

#[tokio::test]
async fn test_empty_results_write_no_file() {
    let dir = TempDir::new().unwrap();
    let adapter = ConnectionAdapter::from_service("dev", service(), false);

    let report = manager(&dir, false)
        .download(&adapter, Some("empty"), &AcceptDefaults)
        .await
        .unwrap();

    assert!(report.written.is_empty());
    assert_eq!(report.warnings, vec!["Sample 'empty' returned no results"]);
    assert!(!dir.path().join("empty.csv").exists());
}

#[tokio::test]
async fn test_interactive_selection_runs_concurrently_and_collects_errors() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("samples")).unwrap();
    let adapter = ConnectionAdapter::from_service("dev", service(), false);
    // candidates are sorted: broken, empty, errors
    let prompter = ScriptedPrompter::new([Answer::MultiSelect(vec![0, 1, 2]), Answer::Select(1)]);

    let report = manager(&dir, true)
        .download(&adapter, None, &prompter)
        .await
        .unwrap();

    assert_eq!(report.written, vec![dir.path().join("samples/errors.csv")]);
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].starts_with("broken:"));
}

#[tokio::test]
async fn test_sample_of_other_connection_is_rejected() {
    let dir = TempDir::new().unwrap();
    let adapter = ConnectionAdapter::from_service("prod", service(), false);

    let err = manager(&dir, false)
        .download(&adapter, Some("errors"), &AcceptDefaults)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Unknown sample 'errors'"));
}
