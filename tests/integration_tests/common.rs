// shared utilities for integration tests

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use condition_interpreter::{GameType, Session};
use tracing_subscriber::EnvFilter;

/// route library logs to the test output, filtered by RUST_LOG
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// create a temporary directory for a test's game install
pub fn create_test_dir(name: &str) -> PathBuf {
    let base = env::temp_dir().join("condition_interpreter_tests");
    let dir = base.join(name);

    // clean up if exists
    if dir.exists() {
        fs::remove_dir_all(&dir).ok();
    }

    fs::create_dir_all(&dir).expect("Failed to create test directory");
    dir
}

/// clean up a test directory
pub fn cleanup_test_dir(path: &Path) {
    if path.exists() {
        fs::remove_dir_all(path).ok();
    }
}

/// a Skyrim plugin consisting of just its header record
pub fn plugin_bytes(master: bool, description: Option<&str>) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(b"HEDR");
    data.extend_from_slice(&12u16.to_le_bytes());
    data.extend_from_slice(&[0u8; 12]);
    if let Some(d) = description {
        data.extend_from_slice(b"SNAM");
        data.extend_from_slice(&((d.len() + 1) as u16).to_le_bytes());
        data.extend_from_slice(d.as_bytes());
        data.push(0);
    }

    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"TES4");
    bytes.extend_from_slice(&(data.len() as u32).to_le_bytes());
    bytes.extend_from_slice(&u32::from(master).to_le_bytes());
    bytes.resize(24, 0);
    bytes.extend_from_slice(&data);
    bytes
}

/// a minimal PE executable with a version resource
pub fn executable_bytes(file_version: [u16; 4], product_version: [u16; 4]) -> Vec<u8> {
    let mut bytes = vec![0u8; 0x80];
    bytes[..2].copy_from_slice(b"MZ");
    bytes[0x3C..0x40].copy_from_slice(&0x40u32.to_le_bytes());
    bytes[0x40..0x44].copy_from_slice(b"PE\0\0");

    bytes.extend_from_slice(&[0u8; 6]);
    for unit in "VS_VERSION_INFO".encode_utf16().chain(std::iter::once(0)) {
        bytes.extend_from_slice(&unit.to_le_bytes());
    }
    while bytes.len() % 4 != 0 {
        bytes.push(0);
    }

    let pack = |v: [u16; 4]| {
        [
            (u32::from(v[0]) << 16) | u32::from(v[1]),
            (u32::from(v[2]) << 16) | u32::from(v[3]),
        ]
    };
    let [file_ms, file_ls] = pack(file_version);
    let [product_ms, product_ls] = pack(product_version);

    for value in [0xFEEF_04BD, 0x0001_0000, file_ms, file_ls, product_ms, product_ls] {
        bytes.extend_from_slice(&u32::to_le_bytes(value));
    }
    bytes.extend_from_slice(&[0u8; 28]);
    bytes
}

/// lay out `<test dir>/Game/Data` with a few plugins and an executable
///
/// returns the test directory and the data directory
pub fn create_game_dir(name: &str) -> (PathBuf, PathBuf) {
    let test_dir = create_test_dir(name);
    let game = test_dir.join("Game");
    let data = game.join("Data");
    fs::create_dir_all(&data).expect("Failed to create data directory");

    fs::write(game.join("TESV.exe"), executable_bytes([1, 9, 32, 0], [1, 9, 0, 0])).unwrap();
    fs::write(data.join("Blank.esm"), plugin_bytes(true, Some("Version: 5.0"))).unwrap();
    fs::write(data.join("Blank.esp"), plugin_bytes(false, None)).unwrap();
    fs::write(data.join("Ghosted.esp.ghost"), plugin_bytes(false, None)).unwrap();

    (test_dir, data)
}

/// a Skyrim session over the given data directory
pub fn create_session(data: &Path) -> Session {
    init_tracing();
    let local = data.parent().unwrap_or(data).join("Local");
    Session::new(GameType::Skyrim, data, local)
}

/// the CRC-32 of a file on disk
pub fn file_crc(path: &Path) -> u32 {
    crc32fast::hash(&fs::read(path).expect("Failed to read file"))
}
