//! PKCE (RFC 7636) verifier and S256 challenge.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{RngCore, thread_rng};
use sha2::{Digest, Sha256};

pub const CODE_CHALLENGE_METHOD: &str = "S256";

/// PKCE code challenge and verifier
#[derive(Clone)]
pub struct PkceChallenge {
    pub code_verifier: String,
    pub code_challenge: String,
}

impl std::fmt::Debug for PkceChallenge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PkceChallenge")
            .field("code_verifier", &"<redacted>")
            .field("code_challenge", &self.code_challenge)
            .finish()
    }
}

impl Default for PkceChallenge {
    fn default() -> Self {
        Self::new()
    }
}

impl PkceChallenge {
    /// Generate a fresh verifier (64 random bytes, 86 base64url chars).
    pub fn new() -> Self {
        let mut bytes = [0u8; 64];
        thread_rng().fill_bytes(&mut bytes);
        Self::from_verifier(URL_SAFE_NO_PAD.encode(bytes))
    }

    pub fn from_verifier(code_verifier: String) -> Self {
        let code_challenge = challenge_for(&code_verifier);
        Self {
            code_verifier,
            code_challenge,
        }
    }

    pub fn method(&self) -> &'static str {
        CODE_CHALLENGE_METHOD
    }
}

/// `BASE64URL(SHA256(verifier))`
pub fn challenge_for(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}
