//! Text recovery for uploaded interchange files.
//!
//! Third-party scheduling tools export with unreliable or absent encoding
//! declarations, so [`recover`] resolves raw bytes into a Unicode string and
//! never fails. Strategy order, first success wins:
//!
//! 1. Strict UTF-8.
//! 2. For XML-family filenames, the encoding declared in the prolog.
//! 3. Byte-wise Windows-1252 recovery (total, so it terminates the chain;
//!    bytes `0xA0..=0xFF` map to the identical code point as in ISO-8859-1).

use std::sync::LazyLock;

use regex::Regex;

use crate::clog_debug;

/// Matches `encoding="..."` or `encoding='...'` in an XML prolog.
static ENCODING_DECL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"encoding\s*=\s*["']([A-Za-z0-9._-]+)["']"#).unwrap()
});

/// How many bytes of the file to inspect for an encoding declaration.
const DECL_SCAN_LIMIT: usize = 1024;

/// Windows-1252 control range `0x80..=0x9F`. The five slots holding the
/// direct code point (0x81, 0x8D, 0x8F, 0x90, 0x9D) are undefined in the
/// code page and fall through to the byte value.
const CP1252_CONTROL: [char; 32] = [
    '\u{20AC}', '\u{0081}', '\u{201A}', '\u{0192}', // 0x80..0x83
    '\u{201E}', '\u{2026}', '\u{2020}', '\u{2021}', // 0x84..0x87
    '\u{02C6}', '\u{2030}', '\u{0160}', '\u{2039}', // 0x88..0x8B
    '\u{0152}', '\u{008D}', '\u{017D}', '\u{008F}', // 0x8C..0x8F
    '\u{0090}', '\u{2018}', '\u{2019}', '\u{201C}', // 0x90..0x93
    '\u{201D}', '\u{2022}', '\u{2013}', '\u{2014}', // 0x94..0x97
    '\u{02DC}', '\u{2122}', '\u{0161}', '\u{203A}', // 0x98..0x9B
    '\u{0153}', '\u{009D}', '\u{017E}', '\u{0178}', // 0x9C..0x9F
];

/// Encodings the declared-encoding path knows how to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeclaredEncoding {
    Utf8,
    Latin1,
    Windows1252,
}

/// Resolve raw file bytes into a string. Total: every byte sequence,
/// including invalid UTF-8 and empty input, produces a string.
pub fn recover(bytes: &[u8], filename: &str) -> String {
    if let Ok(text) = std::str::from_utf8(bytes) {
        clog_debug!("recover: {} decoded as strict UTF-8", filename);
        return text.to_string();
    }

    if is_xml_family(filename) {
        if let Some(encoding) = declared_encoding(bytes) {
            clog_debug!("recover: {} declared encoding {:?}", filename, encoding);
            return match encoding {
                DeclaredEncoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
                DeclaredEncoding::Latin1 => decode_latin1(bytes),
                DeclaredEncoding::Windows1252 => decode_windows1252(bytes),
            };
        }
    }

    clog_debug!("recover: {} fell back to Windows-1252 byte map", filename);
    decode_windows1252(bytes)
}

fn is_xml_family(filename: &str) -> bool {
    filename
        .rsplit('.')
        .next()
        .map(|ext| ext.eq_ignore_ascii_case("xml"))
        .unwrap_or(false)
}

/// Scan the first kilobyte for an encoding declaration and normalize
/// common aliases.
fn declared_encoding(bytes: &[u8]) -> Option<DeclaredEncoding> {
    let head_len = bytes.len().min(DECL_SCAN_LIMIT);
    let head = String::from_utf8_lossy(&bytes[..head_len]);
    let name = ENCODING_DECL_RE.captures(&head)?.get(1)?.as_str().to_lowercase();
    match name.as_str() {
        "utf-8" | "utf8" => Some(DeclaredEncoding::Utf8),
        "latin1" | "latin-1" | "iso-8859-1" => Some(DeclaredEncoding::Latin1),
        "windows-1252" | "cp1252" => Some(DeclaredEncoding::Windows1252),
        _ => None,
    }
}

/// Map every byte directly to the code point of the same numeric value.
fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Byte-wise Windows-1252 recovery. ASCII maps to itself, the control range
/// goes through the fixed table, and `0xA0..=0xFF` maps to the identical
/// code point.
fn decode_windows1252(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| match b {
            0x80..=0x9F => CP1252_CONTROL[(b - 0x80) as usize],
            _ => b as char,
        })
        .collect()
}
