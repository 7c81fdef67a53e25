use sha2::{Digest, Sha256};

/// A trigram is a 3-byte sequence stored as u32 (only lower 24 bits used)
pub type Trigram = u32;

/// Unique identifier for an indexed file.
/// Derived as the little-endian u32 of the first 4 bytes of the file's SHA-256.
pub type FileId = u32;

/// Number of distinct trigram values (24 bits).
pub const TRIGRAM_UNIVERSE: usize = 1 << 24;

// Tuning constants for detecting text files. A file is not indexed if it
// contains an invalid UTF-8 byte pair, is longer than MAX_FILE_LEN bytes,
// contains a line longer than MAX_LINE_LEN bytes, or contains more than
// MAX_TEXT_TRIGRAMS distinct trigrams.
pub const MAX_FILE_LEN: u64 = 1 << 30;
pub const MAX_LINE_LEN: usize = 2000;
pub const MAX_TEXT_TRIGRAMS: usize = 20000;

/// Convert 3 bytes to a trigram
#[inline]
pub fn bytes_to_trigram(b0: u8, b1: u8, b2: u8) -> Trigram {
    ((b0 as u32) << 16) | ((b1 as u32) << 8) | (b2 as u32)
}

/// Convert trigram back to bytes (big-endian, as used in `tri:` keys)
#[inline]
pub fn trigram_to_bytes(t: Trigram) -> [u8; 3] {
    [
        ((t >> 16) & 0xFF) as u8,
        ((t >> 8) & 0xFF) as u8,
        (t & 0xFF) as u8,
    ]
}

/// Lowercase hex encoding of a byte slice.
pub fn hex_digest(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push(char::from_digit((b >> 4) as u32, 16).unwrap());
        out.push(char::from_digit((b & 0xF) as u32, 16).unwrap());
    }
    out
}

/// SHA-256 of the file bytes, as (fileid, lowercase hex digest).
///
/// The fileid is the little-endian u32 of the digest's first 4 bytes, so the
/// first 8 hex chars of the digest are exactly `hex_digest(&id.to_le_bytes())`.
pub fn digest_file(content: &[u8]) -> (FileId, String) {
    let sum = Sha256::digest(content);
    let id = u32::from_le_bytes([sum[0], sum[1], sum[2], sum[3]]);
    (id, hex_digest(&sum))
}

/// The 8 hex chars every key for this fileid's records starts with.
pub fn file_id_hex_prefix(id: FileId) -> String {
    hex_digest(&id.to_le_bytes())
}

/// Recover a fileid from the leading 8 hex chars of a digest.
/// Returns None if the prefix is malformed.
pub fn file_id_from_digest(digest: &str) -> Option<FileId> {
    if digest.len() < 8 {
        return None;
    }
    let mut bytes = [0u8; 4];
    for (i, b) in bytes.iter_mut().enumerate() {
        *b = u8::from_str_radix(digest.get(i * 2..i * 2 + 2)?, 16).ok()?;
    }
    Some(u32::from_le_bytes(bytes))
}
