// integration tests for basic session behaviour against a real data directory

use condition_interpreter::{parse_condition, Entries, Error};

use crate::common::{cleanup_test_dir, create_game_dir, create_session, file_crc};

#[test]
fn test_file_exists_in_data_dir() {
    let (test_dir, data) = create_game_dir("scenario_file");
    let session = create_session(&data);

    assert!(session.evaluate("file(\"Blank.esm\")").unwrap());
    assert!(!session.evaluate("file(\"missing.esm\")").unwrap());

    cleanup_test_dir(&test_dir);
}

#[test]
fn test_active_plugins_are_replaced_wholesale() {
    let (test_dir, data) = create_game_dir("scenario_active");
    let session = create_session(&data);

    session
        .set_active_plugins(Entries::from(&["Blank.esm"]))
        .unwrap();
    assert!(session.evaluate("active(\"Blank.esm\")").unwrap());

    let none: [&str; 0] = [];
    session.set_active_plugins(Entries::from(&none)).unwrap();
    assert!(!session.evaluate("active(\"Blank.esm\")").unwrap());

    cleanup_test_dir(&test_dir);
}

#[test]
fn test_checksum_falls_back_to_file_when_crc_cache_is_cleared() {
    let (test_dir, data) = create_game_dir("scenario_checksum");
    let session = create_session(&data);
    let actual = file_crc(&data.join("Blank.esm"));
    assert_ne!(actual, 0xDEADBEEF);

    let text = "checksum(\"Blank.esm\", DEADBEEF)";
    session
        .set_crc_cache(Entries::from(&[("Blank.esm", 0xDEADBEEF_u32)]))
        .unwrap();
    assert!(session.evaluate(text).unwrap());

    // clearing only the results keeps the supplied checksum
    session.clear_condition_cache().unwrap();
    assert!(session.evaluate(text).unwrap());

    let none: [(&str, u32); 0] = [];
    session.set_crc_cache(Entries::from(&none)).unwrap();
    assert!(!session.evaluate(text).unwrap());
    assert!(session
        .evaluate(&format!("checksum(\"Blank.esm\", {:08X})", actual))
        .unwrap());

    cleanup_test_dir(&test_dir);
}

#[test]
fn test_unterminated_string_is_named_in_error() {
    let err = parse_condition("file(\"Blank.").unwrap_err();
    let message = err.to_string();

    assert!(message.contains("unterminated string"), "{}", message);
    assert!(message.contains("file(\"Blank."), "{}", message);
}

#[test]
fn test_missing_data_dir_means_missing_files() {
    let (test_dir, data) = create_game_dir("scenario_missing_data");
    let session = create_session(&data.join("DoesNotExist"));

    assert!(!session.evaluate("file(\"Blank.esm\")").unwrap());
    assert!(!session.evaluate("many(\"Blank\\.es.\")").unwrap());
    assert!(!session
        .evaluate("checksum(\"Blank.esm\", DEADBEEF)")
        .unwrap());

    cleanup_test_dir(&test_dir);
}

#[test]
fn test_evaluation_errors_are_recorded_on_the_session() {
    let (test_dir, data) = create_game_dir("scenario_errors");
    let session = create_session(&data);

    let err = session.evaluate("active(\"Blank.esm\") and").unwrap_err();
    assert!(matches!(err, Error::Parse(_)));
    assert_eq!(
        session.last_error_message(),
        Some(err.to_string()),
        "the recorded message should match the returned error"
    );

    session.evaluate("file(\"Blank.esm\")").unwrap();
    assert_eq!(session.last_error_message(), None);

    cleanup_test_dir(&test_dir);
}
