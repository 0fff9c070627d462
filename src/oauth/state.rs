use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Random bytes behind each nonce and verifier (256 bits).
const ENTROPY_BYTES: usize = 32;

/// S256 PKCE verifier and its challenge.
pub struct PkceChallenge {
    pub code_verifier: String,
    pub code_challenge: String,
}

impl PkceChallenge {
    pub fn generate() -> Self {
        let code_verifier = random_token();
        let code_challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(code_verifier.as_bytes()));
        Self {
            code_verifier,
            code_challenge,
        }
    }
}

/// Lives for one authorization attempt.
pub struct AuthorizationState {
    state_nonce: String,
    pending: bool,
    pkce: Option<PkceChallenge>,
}

impl AuthorizationState {
    pub fn new(with_pkce: bool) -> Self {
        Self {
            state_nonce: random_token(),
            pending: true,
            pkce: with_pkce.then(PkceChallenge::generate),
        }
    }

    pub fn nonce(&self) -> &str {
        &self.state_nonce
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn pkce(&self) -> Option<&PkceChallenge> {
        self.pkce.as_ref()
    }

    /// Consume the attempt. Returns whether `echoed` matches the nonce,
    /// compared in constant time. A second call always fails.
    pub fn redeem(&mut self, echoed: Option<&str>) -> bool {
        if !std::mem::replace(&mut self.pending, false) {
            return false;
        }
        let Some(echoed) = echoed else {
            return false;
        };
        echoed.as_bytes().ct_eq(self.state_nonce.as_bytes()).into()
    }
}

fn random_token() -> String {
    let mut buf = [0u8; ENTROPY_BYTES];
    rand::Rng::fill_bytes(&mut rand::rng(), &mut buf);
    URL_SAFE_NO_PAD.encode(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonce_carries_256_bits() {
        let state = AuthorizationState::new(false);
        // 32 bytes base64url-encoded without padding: 43 chars
        assert_eq!(state.nonce().len(), 43);
        let decoded = URL_SAFE_NO_PAD.decode(state.nonce()).unwrap();
        assert!(decoded.len() * 8 >= 128);
    }

    #[test]
    fn nonces_are_unique() {
        let a = AuthorizationState::new(false);
        let b = AuthorizationState::new(false);
        assert_ne!(a.nonce(), b.nonce());
    }

    #[test]
    fn redeem_matching_nonce_once() {
        let mut state = AuthorizationState::new(false);
        let nonce = state.nonce().to_string();
        assert!(state.is_pending());
        assert!(state.redeem(Some(&nonce)));
        assert!(!state.is_pending());
        // Replaying the same callback is rejected.
        assert!(!state.redeem(Some(&nonce)));
    }

    #[test]
    fn redeem_rejects_mismatch_and_missing() {
        let mut state = AuthorizationState::new(false);
        assert!(!state.redeem(Some("forged")));

        let mut state = AuthorizationState::new(false);
        assert!(!state.redeem(None));
    }

    #[test]
    fn pkce_only_when_requested() {
        assert!(AuthorizationState::new(false).pkce().is_none());
        assert!(AuthorizationState::new(true).pkce().is_some());
    }

    #[test]
    fn pkce_challenge_is_sha256_of_verifier() {
        let pkce = PkceChallenge::generate();
        let expected = URL_SAFE_NO_PAD.encode(Sha256::digest(pkce.code_verifier.as_bytes()));
        assert_eq!(pkce.code_challenge, expected);
        for ch in pkce.code_verifier.chars().chain(pkce.code_challenge.chars()) {
            assert!(
                ch.is_ascii_alphanumeric() || ch == '-' || ch == '_',
                "Invalid char: '{ch}'"
            );
        }
    }
}
