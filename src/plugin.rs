//! plugin header reader
//!
//! only the first record of a plugin is read: it holds the master flag and the
//! free-text description that authors put version numbers in

use std::io::{self, Read};

use lazy_static::lazy_static;
use regex::Regex;

use crate::game::GameType;

/// master flag in the header record's flags field
const MASTER_FLAG: u32 = 0x1;

/// offset of the description inside a TES3 HEDR subrecord
const TES3_DESCRIPTION_OFFSET: usize = 40;
const TES3_DESCRIPTION_LEN: usize = 256;

lazy_static! {
    static ref VERSION_PATTERNS: [Regex; 2] = [
        Regex::new(r"(?i)\bversion:?\s+(\d+(?:[.,_-]\w+)*)").unwrap(),
        Regex::new(r"(?i)(?:^|[\s(\[])v\.?\s*(\d+(?:\.\w+)+|\d+)").unwrap(),
    ];
}

/// what the header record says about a plugin
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginHeader {
    pub is_master: bool,
    pub description: Option<String>,
}

impl PluginHeader {
    /// the version written in the description, if there is one
    pub fn version(&self) -> Option<String> {
        self.description.as_deref().and_then(extract_version)
    }
}

/// read the header record of a plugin
pub fn read_header(mut reader: impl Read, game: GameType) -> io::Result<PluginHeader> {
    let mut header = vec![0u8; game.record_header_size()];
    reader.read_exact(&mut header)?;

    let expected_type: &[u8; 4] = if game == GameType::Morrowind {
        b"TES3"
    } else {
        b"TES4"
    };
    if &header[..4] != expected_type {
        return Err(invalid_data("the file does not start with a plugin header record"));
    }

    let data_len = le_u32(&header[4..8]) as usize;
    let flags = if game == GameType::Morrowind {
        le_u32(&header[12..16])
    } else {
        le_u32(&header[8..12])
    };

    let mut data = Vec::with_capacity(data_len.min(1 << 20));
    reader.take(data_len as u64).read_to_end(&mut data)?;
    if data.len() != data_len {
        return Err(invalid_data("the header record is truncated"));
    }

    let description = if game == GameType::Morrowind {
        tes3_description(&data)?
    } else {
        tes4_description(&data)?
    };

    Ok(PluginHeader {
        is_master: flags & MASTER_FLAG != 0,
        description,
    })
}

fn tes3_description(data: &[u8]) -> io::Result<Option<String>> {
    for (kind, bytes) in Subrecords::new(data, 4) {
        if kind == b"HEDR" {
            let end = TES3_DESCRIPTION_OFFSET + TES3_DESCRIPTION_LEN;
            let field = bytes
                .get(TES3_DESCRIPTION_OFFSET..end.min(bytes.len()))
                .ok_or_else(|| invalid_data("the HEDR subrecord is too short"))?;
            return Ok(Some(decode_string(field)));
        }
    }
    Ok(None)
}

fn tes4_description(data: &[u8]) -> io::Result<Option<String>> {
    Ok(Subrecords::new(data, 2)
        .find(|(kind, _)| *kind == b"SNAM")
        .map(|(_, bytes)| decode_string(bytes)))
}

/// iterates (type, data) pairs; subrecord sizes are u16 or u32 depending on the format
struct Subrecords<'a> {
    data: &'a [u8],
    size_len: usize,
}

impl<'a> Subrecords<'a> {
    fn new(data: &'a [u8], size_len: usize) -> Self {
        Self { data, size_len }
    }
}

impl<'a> Iterator for Subrecords<'a> {
    type Item = (&'a [u8], &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let header_len = 4 + self.size_len;
        if self.data.len() < header_len {
            return None;
        }

        let size_bytes = &self.data[4..header_len];
        let size = if self.size_len == 2 {
            u16::from_le_bytes([size_bytes[0], size_bytes[1]]) as usize
        } else {
            le_u32(size_bytes) as usize
        };

        let body = self.data.get(header_len..header_len + size)?;
        let kind = &self.data[..4];
        self.data = &self.data[header_len + size..];
        Some((kind, body))
    }
}

/// null-terminated, windows-1252 text; bytes outside ascii are decoded as latin-1
fn decode_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    bytes[..end].iter().map(|&b| b as char).collect()
}

fn le_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn invalid_data(message: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message.to_string())
}

/// find a version number in a plugin description
pub fn extract_version(description: &str) -> Option<String> {
    VERSION_PATTERNS.iter().find_map(|re| {
        re.captures(description)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim_end_matches(['.', ',', '-', '_']).to_string())
    })
}
