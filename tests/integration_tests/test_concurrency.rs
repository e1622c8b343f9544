// integration tests for sharing a session between threads

use std::thread;

use condition_interpreter::{Entries, Session};

use crate::common::{cleanup_test_dir, create_game_dir, create_session};

const CONDITIONS: [&str; 4] = [
    "active(\"Blank.esm\")",
    "file(\"Blank.esm\") and not active(\"Blank.esp\")",
    "checksum(\"Blank.esm\", DEADBEEF) or many(\"Blank\\.es.\")",
    "version(\"Blank.esm\", \"5.0\", >=)",
];

fn assert_send_sync<T: Send + Sync>() {}

#[test]
fn test_session_is_shareable() {
    assert_send_sync::<Session>();
}

#[test]
fn test_parallel_evaluations_agree() {
    let (test_dir, data) = create_game_dir("concurrency_readers");
    let session = create_session(&data);
    session
        .set_active_plugins(Entries::from(&["Blank.esm"]))
        .unwrap();

    let expected: Vec<bool> = CONDITIONS
        .iter()
        .map(|text| session.evaluate(text).unwrap())
        .collect();
    session.clear_condition_cache().unwrap();

    thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                for _ in 0..50 {
                    let results: Vec<bool> = CONDITIONS
                        .iter()
                        .map(|text| session.evaluate(text).unwrap())
                        .collect();
                    assert_eq!(results, expected);
                }
            });
        }
    });

    assert_eq!(session.cache_len().unwrap(), CONDITIONS.len());
    cleanup_test_dir(&test_dir);
}

#[test]
fn test_mutation_is_visible_to_later_evaluations() {
    let (test_dir, data) = create_game_dir("concurrency_writers");
    let session = create_session(&data);
    let text = "active(\"Blank.esm\")";

    thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                for _ in 0..200 {
                    session.evaluate(text).unwrap();
                }
            });
        }

        scope.spawn(|| {
            for i in 0..100 {
                let names: &[&str] = if i % 2 == 0 { &["Blank.esm"] } else { &[] };
                session.set_active_plugins(Entries::from(names)).unwrap();
            }
        });
    });

    // the writer finished with an empty set, so no stale true may survive
    assert!(!session.evaluate(text).unwrap());

    session
        .set_active_plugins(Entries::from(&["Blank.esm"]))
        .unwrap();
    assert!(session.evaluate(text).unwrap());

    cleanup_test_dir(&test_dir);
}

#[test]
fn test_computed_checksums_are_shared_between_threads() {
    let (test_dir, data) = create_game_dir("concurrency_checksums");
    let session = create_session(&data);
    let actual = crate::common::file_crc(&data.join("Blank.esm"));
    let text = format!("checksum(\"Blank.esm\", {:08X})", actual);

    thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                session.clear_condition_cache().unwrap();
                assert!(session.evaluate(&text).unwrap());
            });
        }
    });

    // the file changed, but its checksum was remembered
    std::fs::write(data.join("Blank.esm"), b"changed").unwrap();
    session.clear_condition_cache().unwrap();
    assert!(session.evaluate(&text).unwrap());

    cleanup_test_dir(&test_dir);
}
