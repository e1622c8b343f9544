//! windows executable version reader
//!
//! version numbers live in the `VS_FIXEDFILEINFO` structure of the executable's
//! version resource. the resource directory is not walked; the structure is
//! found by its `VS_VERSION_INFO` key and signature.

use std::io::{self, Read};

/// offset of the PE header pointer in the DOS header
const PE_POINTER_OFFSET: usize = 0x3C;

/// the DOS header ends with the PE header pointer
const DOS_HEADER_LEN: usize = PE_POINTER_OFFSET + 4;

/// DOS stubs are short; a pointer further than this is not a PE header
const MAX_PE_OFFSET: u64 = 0x1_0000;

const FIXED_FILE_INFO_SIGNATURE: u32 = 0xFEEF_04BD;

/// how far past the key the fixed info may start (key padding plus alignment)
const FIXED_FILE_INFO_SEARCH_LEN: usize = 16;

/// signature, struct version, then the four version fields
const FIXED_FILE_INFO_LEN: usize = 24;

/// the file is scanned for the version resource this many bytes at a time
const CHUNK_LEN: usize = 64 * 1024;

/// version numbers of an executable, formatted `major.minor.patch.build`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutableVersions {
    pub file: String,
    pub product: String,
}

#[derive(Debug, thiserror::Error)]
pub enum VersionError {
    #[error(transparent)]
    Io(#[from] io::Error),

    /// a version resource that is present but malformed
    #[error("{0}")]
    Malformed(String),
}

/// true if the reader starts with a DOS header that points to a PE header
///
/// reads no further than the PE signature
pub fn is_executable(mut reader: impl Read) -> io::Result<bool> {
    read_pe_header(&mut reader)
}

/// consume everything up to and including the PE signature
///
/// `false` as soon as the bytes stop looking like an executable
fn read_pe_header(reader: &mut impl Read) -> io::Result<bool> {
    let mut dos_header = [0u8; DOS_HEADER_LEN];
    if !read_exact_or_eof(reader, &mut dos_header)? || &dos_header[..2] != b"MZ" {
        return Ok(false);
    }

    let offset = u64::from(read_u32(&dos_header, PE_POINTER_OFFSET).unwrap_or_default());
    if offset < DOS_HEADER_LEN as u64 || offset > MAX_PE_OFFSET {
        return Ok(false);
    }

    let stub_len = offset - DOS_HEADER_LEN as u64;
    if io::copy(&mut reader.by_ref().take(stub_len), &mut io::sink())? < stub_len {
        return Ok(false);
    }

    let mut signature = [0u8; 4];
    Ok(read_exact_or_eof(reader, &mut signature)? && &signature == b"PE\0\0")
}

/// read the file and product versions
///
/// `Ok(None)` means the reader does not hold an executable or it has no version
/// resource. the file is scanned in chunks, never held in memory whole
pub fn read_versions(mut reader: impl Read) -> Result<Option<ExecutableVersions>, VersionError> {
    if !read_pe_header(&mut reader)? {
        return Ok(None);
    }

    let key = utf16_key("VS_VERSION_INFO");
    let mut window: Vec<u8> = Vec::with_capacity(CHUNK_LEN + key.len());
    let mut chunk = vec![0u8; CHUNK_LEN];

    let key_offset = loop {
        if let Some(i) = find(&window, &key) {
            break i;
        }

        // keep enough of the tail to match a key split across chunks
        let keep = window.len().min(key.len() - 1);
        window.drain(..window.len() - keep);

        let n = read_some(&mut reader, &mut chunk)?;
        if n == 0 {
            return Ok(None);
        }
        window.extend_from_slice(&chunk[..n]);
    };
    window.drain(..key_offset);

    let needed = key.len() + FIXED_FILE_INFO_SEARCH_LEN + FIXED_FILE_INFO_LEN;
    if window.len() < needed {
        let missing = (needed - window.len()) as u64;
        reader.by_ref().take(missing).read_to_end(&mut window)?;
    }

    read_fixed_info(&window, key.len())
        .map(Some)
        .map_err(VersionError::Malformed)
}

/// `bytes` starts with the version resource key
fn read_fixed_info(bytes: &[u8], key_len: usize) -> Result<ExecutableVersions, String> {
    let search_end = (key_len + FIXED_FILE_INFO_SEARCH_LEN).min(bytes.len());
    let signature = FIXED_FILE_INFO_SIGNATURE.to_le_bytes();

    let info_offset = find(&bytes[key_len..search_end], &signature)
        .map(|i| i + key_len)
        .ok_or_else(|| "the version resource has no fixed file info".to_string())?;

    let field = |index: usize| {
        read_u32(bytes, info_offset + 8 + index * 4)
            .ok_or_else(|| "the fixed file info is truncated".to_string())
    };

    let file = format_version(field(0)?, field(1)?);
    let product = format_version(field(2)?, field(3)?);

    Ok(ExecutableVersions { file, product })
}

fn read_exact_or_eof(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<bool> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}

fn read_some(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match reader.read(buf) {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            result => return result,
        }
    }
}

fn format_version(most_significant: u32, least_significant: u32) -> String {
    format!(
        "{}.{}.{}.{}",
        most_significant >> 16,
        most_significant & 0xFFFF,
        least_significant >> 16,
        least_significant & 0xFFFF
    )
}

/// the key as it is stored in the resource: UTF-16LE with a null terminator
fn utf16_key(key: &str) -> Vec<u8> {
    key.encode_utf16()
        .chain(std::iter::once(0))
        .flat_map(u16::to_le_bytes)
        .collect()
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn read_u32(bytes: &[u8], offset: usize) -> Option<u32> {
    let b = bytes.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}
