//! Cryptographic minting of device-flow tokens.
//!
//! All four opaque tokens (`device_code`, `user_code`, PKCE verifier,
//! `state`) are independent draws from the OS CSPRNG; none is derived
//! from another.

use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::{FlowError, Result};

/// Alphabet for user codes: digits and uppercase ASCII letters.
const USER_CODE_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Number of characters in a user code (displayed as `XXXX-XXXX`).
const USER_CODE_LEN: usize = 8;

/// Returns `n` bytes from the OS cryptographic RNG.
///
/// # Errors
/// Returns [`FlowError::Rng`] if the system RNG fails; the caller must
/// not continue the request.
pub fn random_bytes(n: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; n];
    OsRng
        .try_fill_bytes(&mut buf)
        .map_err(|e| FlowError::Rng(e.to_string()))?;
    Ok(buf)
}

/// Returns a random string of `len` characters drawn uniformly from
/// `0-9A-Z`, each character an independent draw.
///
/// # Errors
/// Returns [`FlowError::Rng`] if the system RNG fails.
pub fn random_string(len: usize) -> Result<String> {
    // Accept only draws below this limit so the modulo reduction stays
    // uniform over the 36-element alphabet.
    const LIMIT: u32 = u32::MAX - (u32::MAX % USER_CODE_ALPHABET.len() as u32);

    let mut out = String::with_capacity(len);
    let mut buf = [0u8; 4];
    while out.len() < len {
        OsRng
            .try_fill_bytes(&mut buf)
            .map_err(|e| FlowError::Rng(e.to_string()))?;
        let n = u32::from_be_bytes(buf);
        if n < LIMIT {
            out.push(USER_CODE_ALPHABET[(n % USER_CODE_ALPHABET.len() as u32) as usize] as char);
        }
    }
    Ok(out)
}

/// Mints a fresh CSRF `state` token: 16 random bytes, hex encoded.
pub fn new_state() -> Result<String> {
    Ok(hex::encode(random_bytes(16)?))
}

/// The full set of codes minted when a device starts a flow.
#[derive(Debug, Clone)]
pub struct MintedCodes {
    /// Long opaque code the device polls with (64 hex chars).
    pub device_code: String,
    /// High-entropy PKCE verifier bound to the flow (64 hex chars).
    pub pkce_verifier: String,
    /// User code in display form (`XXXX-XXXX`).
    pub user_code: String,
    /// User code in normalized storage form (`XXXXXXXX`).
    pub user_code_normalized: String,
}

impl MintedCodes {
    /// Generates a complete code set for one flow.
    ///
    /// All generation happens before any store write, so an RNG failure
    /// leaves no partial state behind.
    ///
    /// # Errors
    /// Returns [`FlowError::Rng`] if the system RNG fails.
    pub fn generate() -> Result<Self> {
        let device_code = hex::encode(random_bytes(32)?);
        let pkce_verifier = hex::encode(random_bytes(32)?);

        let raw = random_string(USER_CODE_LEN)?;
        let user_code = format!("{}-{}", &raw[..4], &raw[4..]);

        Ok(Self {
            device_code,
            pkce_verifier,
            user_code,
            user_code_normalized: raw,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_bytes_length() {
        assert_eq!(random_bytes(32).unwrap().len(), 32);
        assert_eq!(random_bytes(16).unwrap().len(), 16);
    }

    #[test]
    fn test_random_bytes_distinct() {
        let a = random_bytes(32).unwrap();
        let b = random_bytes(32).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_random_string_alphabet() {
        let s = random_string(64).unwrap();
        assert_eq!(s.len(), 64);
        assert!(s.bytes().all(|b| USER_CODE_ALPHABET.contains(&b)));
    }

    #[test]
    fn test_new_state_is_32_hex_chars() {
        let state = new_state().unwrap();
        assert_eq!(state.len(), 32);
        assert!(state.bytes().all(|b| b.is_ascii_hexdigit()));
    }

    #[test]
    fn test_minted_codes_shape() {
        let codes = MintedCodes::generate().unwrap();

        assert_eq!(codes.device_code.len(), 64);
        assert_eq!(codes.pkce_verifier.len(), 64);
        assert_ne!(codes.device_code, codes.pkce_verifier);

        assert_eq!(codes.user_code.len(), 9);
        assert_eq!(codes.user_code.as_bytes()[4], b'-');
        assert_eq!(codes.user_code_normalized.len(), 8);
        assert_eq!(codes.user_code.replace('-', ""), codes.user_code_normalized);
    }

    #[test]
    fn test_minted_codes_distinct_across_flows() {
        let a = MintedCodes::generate().unwrap();
        let b = MintedCodes::generate().unwrap();
        assert_ne!(a.device_code, b.device_code);
        assert_ne!(a.user_code_normalized, b.user_code_normalized);
    }
}
