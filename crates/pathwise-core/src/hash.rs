//! FNV-1a hashing for reproducible seeds and content fingerprints.
//!
//! Not cryptographically secure. Used to derive stable RNG seeds from
//! textual descriptions and to fingerprint solver outputs in
//! determinism checks.

/// FNV-1a offset basis for 64-bit.
const FNV_OFFSET: u64 = 0xcbf29ce484222325;
/// FNV-1a prime for 64-bit.
const FNV_PRIME: u64 = 0x00000100000001B3;

/// Feed a single byte into an FNV-1a hash state.
#[inline]
fn fnv1a_byte(hash: u64, byte: u8) -> u64 {
    (hash ^ byte as u64).wrapping_mul(FNV_PRIME)
}

/// Hash a byte slice.
pub fn fnv1a_bytes(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |h, &b| fnv1a_byte(h, b))
}

/// Hash a sequence of `f64` values by their bit patterns.
///
/// Two buffers hash equal only if they are bit-identical, which is the
/// property determinism tests need (`0.0` and `-0.0` differ).
pub fn fnv1a_f64s(values: &[f64]) -> u64 {
    let mut hash = FNV_OFFSET;
    for v in values {
        for &b in &v.to_bits().to_le_bytes() {
            hash = fnv1a_byte(hash, b);
        }
    }
    hash
}

/// Derive a 32-bit generator seed from text by folding the 64-bit hash.
pub fn seed_from_str(text: &str) -> u32 {
    let h = fnv1a_bytes(text.as_bytes());
    ((h >> 32) ^ (h & 0xffff_ffff)) as u32
}
