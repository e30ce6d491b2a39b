//! PKCE (Proof Key for Code Exchange) challenge derivation.
//!
//! Implements the RFC 7636 S256 method. The proxy only derives
//! challenges; verification happens at the upstream provider.

use sha2::{Digest, Sha256};

/// Computes the S256 code challenge from a code verifier.
///
/// S256: BASE64URL(SHA256(code_verifier))
#[must_use]
pub fn compute_s256_challenge(code_verifier: &str) -> String {
    let hash = Sha256::digest(code_verifier.as_bytes());
    base64_url_encode(&hash)
}

/// Encodes bytes as base64url without padding.
fn base64_url_encode(data: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_s256_challenge_rfc7636_vector() {
        // RFC 7636 Appendix B
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        let challenge = compute_s256_challenge(verifier);

        assert_eq!(challenge, "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
    }

    #[test]
    fn test_s256_challenge_deterministic() {
        let verifier = "a-minted-verifier-value-used-twice";
        assert_eq!(
            compute_s256_challenge(verifier),
            compute_s256_challenge(verifier)
        );
    }

    #[test]
    fn test_s256_challenge_no_padding() {
        let challenge = compute_s256_challenge("some verifier");
        assert!(!challenge.contains('='));
        assert!(!challenge.contains('+'));
        assert!(!challenge.contains('/'));
    }
}
