//! HMAC-based basis derivation and bit-string helpers.

use super::PaymentError;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Bits in an HMAC-SHA256 digest.
pub const MAX_KEY_LENGTH: usize = 256;

/// Derives a `key_length`-bit basis sequence from `HMAC-SHA256(secret, id)`.
///
/// The digest is read big-endian, most significant bit of each byte first,
/// and truncated to its first `key_length` bits. `true` means "apply a
/// Hadamard before measuring".
pub fn derive_basis(secret: &str, id: &str, key_length: usize) -> Result<Vec<bool>, PaymentError> {
    if key_length > MAX_KEY_LENGTH {
        return Err(PaymentError::KeyTooLong {
            requested: key_length,
            available: MAX_KEY_LENGTH,
        });
    }

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(id.as_bytes());
    let digest = mac.finalize().into_bytes();

    Ok(digest
        .iter()
        .flat_map(|byte| (0..8u32).rev().map(move |i| (byte >> i) & 1 == 1))
        .take(key_length)
        .collect())
}

/// Renders bits as a string of `0`/`1` digits.
pub fn to_bit_string(bits: &[bool]) -> String {
    bits.iter().map(|&b| if b { '1' } else { '0' }).collect()
}

/// Parses a non-empty string of `0`/`1` digits.
pub fn parse_bit_string(text: &str) -> Option<Vec<bool>> {
    if text.is_empty() {
        return None;
    }
    text.chars()
        .map(|c| match c {
            '0' => Some(false),
            '1' => Some(true),
            _ => None,
        })
        .collect()
}
