//! CRC32 hashing utilities.
//!
//! TAF chunk payloads are verified with the reflected CRC32/ISO-HDLC
//! variant (polynomial 0xEDB88320, initial value and final XOR
//! 0xFFFFFFFF), computed over the raw payload bytes as they appear on
//! disk.

/// Compute the CRC32 of a byte slice.
#[inline]
pub fn hash_bytes(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

/// Continue a CRC32 computation with more data.
#[inline]
pub fn hash_bytes_with_seed(data: &[u8], seed: u32) -> u32 {
    let mut hasher = crc32fast::Hasher::new_with_initial(seed);
    hasher.update(data);
    hasher.finalize()
}

/// Compute the CRC32 of a string's UTF-8 bytes.
#[inline]
pub fn hash_str(s: &str) -> u32 {
    hash_bytes(s.as_bytes())
}
