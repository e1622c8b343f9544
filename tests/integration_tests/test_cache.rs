// integration tests for condition result caching

use std::fs;

use condition_interpreter::{Entries, Session};

use crate::common::{cleanup_test_dir, create_game_dir, create_session};

const ACTIVE: &str = "active(\"Blank.esm\")";
const VERSION: &str = "version(\"Blank.esm\", \"5.0\", ==)";
const CHECKSUM: &str = "checksum(\"Blank.esm\", DEADBEEF)";

fn evaluate_all(session: &Session) -> [bool; 3] {
    [
        session.evaluate(ACTIVE).unwrap(),
        session.evaluate(VERSION).unwrap(),
        session.evaluate(CHECKSUM).unwrap(),
    ]
}

#[test]
fn test_repeated_evaluation_is_served_from_cache() {
    let (test_dir, data) = create_game_dir("cache_idempotent");
    let session = create_session(&data);
    let text = "file(\"Blank.esm\")";

    assert!(!session.is_cached(text).unwrap());
    let first = session.evaluate(text).unwrap();
    assert!(session.is_cached(text).unwrap());

    // the file is gone, but nothing told the session so
    fs::remove_file(data.join("Blank.esm")).unwrap();
    let second = session.evaluate(text).unwrap();

    assert_eq!(first, second);
    assert_eq!(session.cache_len().unwrap(), 1);

    session.clear_condition_cache().unwrap();
    assert!(!session.evaluate(text).unwrap());

    cleanup_test_dir(&test_dir);
}

#[test]
fn test_cache_key_is_the_exact_text() {
    let (test_dir, data) = create_game_dir("cache_verbatim");
    let session = create_session(&data);

    session.evaluate("file(\"Blank.esm\")").unwrap();
    session.evaluate("file( \"Blank.esm\" )").unwrap();

    assert_eq!(session.cache_len().unwrap(), 2);

    cleanup_test_dir(&test_dir);
}

#[test]
fn test_every_mutation_invalidates_cached_results() {
    let (test_dir, data) = create_game_dir("cache_invalidation");
    let session = create_session(&data);

    assert_eq!(evaluate_all(&session), [false, true, false]);
    assert_eq!(session.cache_len().unwrap(), 3);

    session
        .set_active_plugins(Entries::from(&["Blank.esm"]))
        .unwrap();
    assert_eq!(session.cache_len().unwrap(), 0);
    assert_eq!(evaluate_all(&session), [true, true, false]);

    session
        .set_plugin_versions(Entries::from(&[("Blank.esm", "6.0")]))
        .unwrap();
    assert_eq!(session.cache_len().unwrap(), 0);
    assert_eq!(evaluate_all(&session), [true, false, false]);

    session
        .set_crc_cache(Entries::from(&[("Blank.esm", 0xDEADBEEF_u32)]))
        .unwrap();
    assert_eq!(session.cache_len().unwrap(), 0);
    assert_eq!(evaluate_all(&session), [true, false, true]);

    cleanup_test_dir(&test_dir);
}

#[test]
fn test_explicit_clear_gives_same_results_after_mutation() {
    let (test_dir, data) = create_game_dir("cache_clear_then_mutate");
    let mutated = create_session(&data);
    let cleared = create_session(&data);

    evaluate_all(&mutated);
    evaluate_all(&cleared);
    cleared.clear_condition_cache().unwrap();
    cleared.clear_condition_cache().unwrap();

    for session in [&mutated, &cleared] {
        session
            .set_active_plugins(Entries::from(&["Blank.esm"]))
            .unwrap();
        session
            .set_plugin_versions(Entries::from(&[("Blank.esm", "1.0")]))
            .unwrap();
    }

    assert_eq!(evaluate_all(&mutated), evaluate_all(&cleared));

    cleanup_test_dir(&test_dir);
}

#[test]
fn test_failed_evaluation_is_not_cached() {
    let (test_dir, data) = create_game_dir("cache_failure");
    let session = create_session(&data);

    assert!(session.evaluate("file(\"Blank.esm\") or").is_err());
    assert!(session.evaluate("file(\"../../outside.esp\")").is_err());
    assert_eq!(session.cache_len().unwrap(), 0);

    cleanup_test_dir(&test_dir);
}
