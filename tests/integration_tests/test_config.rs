// integration tests for session files

use std::fs;

use condition_interpreter::config::{self, SessionConfig};
use condition_interpreter::GameType;

use crate::common::{cleanup_test_dir, create_game_dir, file_crc, init_tracing};

#[test]
fn test_session_file_round_trip() {
    init_tracing();
    let (test_dir, data) = create_game_dir("config_round_trip");
    let path = test_dir.join("session.json");

    let mut config = SessionConfig::new(GameType::Skyrim, &data, test_dir.join("Local"));
    config.active_plugins = vec!["Blank.esm".to_string(), "Blank.esp".to_string()];
    config
        .plugin_versions
        .insert("Blank.esp".to_string(), "1.2".to_string());
    config.plugin_crcs.insert(
        "Blank.esm".to_string(),
        format!("{:08x}", file_crc(&data.join("Blank.esm"))),
    );
    config.conditions = vec!["many_active(\"Blank\\.es.\")".to_string()];

    config::save(&config, &path).unwrap();
    assert!(config::verify(&path).unwrap().is_empty());

    let session = config::load(&path).unwrap().into_session().unwrap();
    assert_eq!(session.data_path(), data.as_path());
    assert!(session.evaluate("many_active(\"Blank\\.es.\")").unwrap());
    assert!(session
        .evaluate("version(\"Blank.esp\", \"1.2\", ==)")
        .unwrap());

    // the configured checksum is used instead of reading the file
    fs::write(data.join("Blank.esm"), b"changed").unwrap();
    let crc = &config.plugin_crcs["Blank.esm"];
    assert!(session
        .evaluate(&format!("checksum(\"Blank.esm\", {})", crc))
        .unwrap());

    cleanup_test_dir(&test_dir);
}

#[test]
fn test_verify_reports_bad_conditions() {
    let (test_dir, _data) = create_game_dir("config_verify");
    let path = test_dir.join("session.json");

    let content = serde_json::json!({
        "game": "Fallout4",
        "data_path": "Data",
        "local_path": "Local",
        "conditions": [
            "file(\"Fallout4.esm\")",
            "version(\"Fallout4.exe\", \"1.10\")",
            "active(\"DLCRobot.esm\") xor active(\"DLCCoast.esm\")"
        ]
    });
    fs::write(&path, serde_json::to_string_pretty(&content).unwrap()).unwrap();

    let errors = config::verify(&path).unwrap();
    assert_eq!(errors.len(), 2, "{:?}", errors);
    assert!(errors[0].starts_with("conditions[1]"));
    assert!(errors[1].starts_with("conditions[2]"));

    cleanup_test_dir(&test_dir);
}
