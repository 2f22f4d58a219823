use pretty_assertions::assert_eq;
use serde::{Deserialize, Serialize};
use spl_fs::{ConfigStore, Error};
use std::collections::BTreeMap;
use std::fs;
use tempfile::TempDir;

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct Connection {
    host: String,
    port: u16,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct Settings {
    connections: BTreeMap<String, Connection>,
}

#[test]
fn test_load_yaml() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("settings.yaml");
    fs::write(
        &file_path,
        "connections:\n  localhost:\n    host: localhost\n    port: 8089\n",
    )
    .unwrap();

    let settings: Settings = ConfigStore::new().load(&file_path).unwrap();
    assert_eq!(settings.connections["localhost"].port, 8089);
}

#[test]
fn test_load_json_value() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("settings.json");
    fs::write(&file_path, r#"{"connections": {}}"#).unwrap();

    let value = ConfigStore::new().load_value(&file_path).unwrap();
    assert!(value["connections"].is_object());
}

#[test]
fn test_save_then_load_yaml() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("nested/dir/settings.yaml");
    let mut connections = BTreeMap::new();
    connections.insert(
        "onprem".to_string(),
        Connection {
            host: "splunk.example.com".into(),
            port: 8089,
        },
    );
    let settings = Settings { connections };

    let store = ConfigStore::new();
    store.save(&file_path, &settings).unwrap();
    let loaded: Settings = store.load(&file_path).unwrap();

    assert_eq!(loaded, settings);
}

#[test]
fn test_parse_error_names_format_and_path() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("settings.yaml");
    fs::write(&file_path, "connections: [unclosed").unwrap();

    let err = ConfigStore::new().load_value(&file_path).unwrap_err();
    match err {
        Error::ConfigParse { path, format, .. } => {
            assert_eq!(path, file_path);
            assert_eq!(format, "YAML");
        }
        other => panic!("expected ConfigParse, got {other:?}"),
    }
}

#[test]
fn test_missing_file_is_io_error() {
    let temp = TempDir::new().unwrap();
    let err = ConfigStore::new()
        .load_value(&temp.path().join("settings.yaml"))
        .unwrap_err();
    assert!(matches!(err, Error::Io { .. }));
}
