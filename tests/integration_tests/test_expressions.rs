// integration tests for rule expressions as they appear in masterlists

use std::fs;

use condition_interpreter::conditions::MAX_NESTING_DEPTH;
use condition_interpreter::{parse_condition, Entries, Error};

use crate::common::{
    cleanup_test_dir, create_game_dir, create_session, file_crc, plugin_bytes,
};

#[test]
fn test_real_world_expressions_parse() {
    let expressions = [
        "file(\"LOOT\")",
        "version(\"..\\TESV.exe\", \"1.8\", >) and not checksum(\"EternalShineArmorAndWeapons.esp\",3E85A943)",
        "many(\"Deeper Thoughts (\\(Curie\\)|- (Expressive )?Curie)\\.esp\")",
        "active(\"Unofficial Skyrim Patch.esp\") or active(\"Unofficial Skyrim Legendary Edition Patch.esp\")",
        "not ( active(\"Dawnguard.esm\") and active(\"Dragonborn.esm\") )",
        "file(\"SKSE/Plugins/.+\\.dll\") and product_version(\"../skse_loader.exe\", \"1.7.3\", >=)",
        "filename_version(\"Mod (\\d+\\.\\d+)\\.bsa\", \"2.0\", >=)",
        "description_contains(\"Blank.esp\", \"Special Edition\") or is_master(\"Blank.esm\")",
        "readable(\"Textures\") and file_size(\"Blank.esm\", 1024) and is_executable(\"../TESV.exe\")",
        "many_active(\"Blank.*\\.es[mp]\")",
    ];

    for text in expressions {
        if let Err(e) = parse_condition(text) {
            panic!("failed to parse {}: {}", text, e);
        }
    }
}

#[test]
fn test_real_world_expressions_evaluate() {
    let (test_dir, data) = create_game_dir("expressions_evaluate");
    fs::write(data.join("Deeper Thoughts (Curie).esp"), plugin_bytes(false, None)).unwrap();
    fs::write(
        data.join("Deeper Thoughts - Expressive Curie.esp"),
        plugin_bytes(false, None),
    )
    .unwrap();
    fs::write(data.join("EternalShineArmorAndWeapons.esp"), b"eternal shine").unwrap();
    fs::write(data.join("Mod 2.3.bsa"), b"").unwrap();
    fs::create_dir_all(data.join("Meshes")).unwrap();
    fs::write(data.join("Meshes").join("armor.nif"), b"").unwrap();

    let session = create_session(&data);
    session
        .set_active_plugins(Entries::from(&["Blank.esm", "Blank.esp"]))
        .unwrap();

    let eternal_crc = file_crc(&data.join("EternalShineArmorAndWeapons.esp"));
    let cases = [
        (
            "version(\"..\\TESV.exe\", \"1.8\", >) and not checksum(\"EternalShineArmorAndWeapons.esp\",3E85A943)".to_string(),
            eternal_crc != 0x3E85A943,
        ),
        (
            format!(
                "checksum(\"EternalShineArmorAndWeapons.esp\", {:X})",
                eternal_crc
            ),
            true,
        ),
        (
            "many(\"Deeper Thoughts (\\(Curie\\)|- (Expressive )?Curie)\\.esp\")".to_string(),
            true,
        ),
        ("product_version(\"../TESV.exe\", \"1.9.0.0\", ==)".to_string(), true),
        ("version(\"../TESV.exe\", \"1.9.32\", >=)".to_string(), true),
        ("is_executable(\"../TESV.exe\")".to_string(), true),
        ("is_executable(\"Blank.esm\")".to_string(), false),
        ("file(\"Meshes/.+\\.nif\")".to_string(), true),
        ("file(\"Meshes/.+\\.dds\")".to_string(), false),
        ("file(\"blank.ESM\")".to_string(), true),
        ("file(\"Ghosted.esp\")".to_string(), true),
        ("many(\"Ghosted\\.esp\")".to_string(), false),
        ("many_active(\"Blank\\.es(m|p)\")".to_string(), true),
        ("active(\"Blank\\.esl\")".to_string(), false),
        ("is_master(\"Blank.esm\") and not is_master(\"Blank.esp\")".to_string(), true),
        ("version(\"Blank.esm\", \"5\", ==)".to_string(), true),
        ("version(\"Blank.esp\", \"0.1\", <)".to_string(), true),
        ("version(\"Missing.esp\", \"0\", !=)".to_string(), true),
        ("description_contains(\"Blank.esm\", \"version: 5\")".to_string(), true),
        ("filename_version(\"Mod (\\d+\\.\\d+)\\.bsa\", \"2.0\", >)".to_string(), true),
        ("filename_version(\"Mod (\\d+\\.\\d+)\\.bsa\", \"3.0\", >=)".to_string(), false),
        ("readable(\"Meshes\") and readable(\"Blank.esm\")".to_string(), true),
        (
            format!(
                "file_size(\"Blank.esm\", {})",
                fs::metadata(data.join("Blank.esm")).unwrap().len()
            ),
            true,
        ),
        ("file(\"LOOT\") and not file(\"LOOT\") or file(\"LOOT\")".to_string(), true),
    ];

    for (text, expected) in &cases {
        let result = session.evaluate(text);
        assert_eq!(
            result.as_ref().ok(),
            Some(expected),
            "{} gave {:?}",
            text,
            result
        );
    }

    cleanup_test_dir(&test_dir);
}

#[test]
fn test_additional_data_paths_are_searched_first() {
    let (test_dir, data) = create_game_dir("expressions_additional");
    let overlay = test_dir.join("Overlay");
    fs::create_dir_all(&overlay).unwrap();
    fs::write(overlay.join("Overlay.esp"), plugin_bytes(false, Some("v2.0"))).unwrap();
    fs::write(overlay.join("Blank.esp"), plugin_bytes(false, Some("v9.0"))).unwrap();

    let session = create_session(&data).with_additional_data_paths(vec![overlay]);

    assert!(session.evaluate("file(\"Overlay.esp\")").unwrap());
    assert!(session
        .evaluate("version(\"Blank.esp\", \"9.0\", ==)")
        .unwrap());
    // the same name in both directories only counts once
    assert!(!session.evaluate("many(\"Blank\\.esp\")").unwrap());
    assert!(session.evaluate("many(\"(Blank|Overlay)\\.esp\")").unwrap());

    cleanup_test_dir(&test_dir);
}

#[test]
fn test_paths_outside_the_game_dir_are_rejected() {
    for text in [
        "file(\"../../Skyrim.ini\")",
        "checksum(\"../../../x.esp\", 1)",
        "file(\"/etc/passwd\")",
        "many(\"Data/.*/\")",
    ] {
        let err = parse_condition(text).map(|_| ()).unwrap_err();
        assert!(err.to_string().contains(text), "{}", err);
    }
}

#[test]
fn test_deep_nesting_terminates() {
    let nested = |depth: usize| {
        format!(
            "{}file(\"LOOT\"){}",
            "(".repeat(depth),
            ")".repeat(depth)
        )
    };

    assert!(parse_condition(&nested(MAX_NESTING_DEPTH)).is_ok());
    assert!(parse_condition(&nested(MAX_NESTING_DEPTH + 1)).is_err());

    // far past any stack limit
    let err = parse_condition(&nested(100_000)).unwrap_err();
    assert!(err.message.contains("nested"));
}

#[test]
fn test_invalid_arguments_fail_at_parse_time() {
    let (test_dir, data) = create_game_dir("expressions_invalid");
    let session = create_session(&data);

    for text in [
        "checksum(\"Blank.esm\", 123456789)",
        "checksum(\"Blank.esm\", XYZ)",
        "version(\"Blank.esm\", \"1.0\", =)",
        "filename_version(\"Mod \\d+\\.bsa\", \"1\", >)",
        "active(\"Blank.esm\" \"Blank.esp\")",
        "file(\"Blank.esm\") and and file(\"Blank.esp\")",
        "not not file(\"Blank.esm\")",
    ] {
        match session.evaluate(text) {
            Err(Error::Parse(_)) => {}
            other => panic!("{} gave {:?}", text, other),
        }
    }
    assert_eq!(session.cache_len().unwrap(), 0);

    cleanup_test_dir(&test_dir);
}
