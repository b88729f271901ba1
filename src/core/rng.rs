//! Random identifiers: session ids, peer tokens, delta epochs.
//!
//! Backed by ChaCha8. A fixed seed makes every id reproducible in tests;
//! without one the generator is seeded from the OS.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::state::SessionId;

const ID_ALPHABET: &[u8] = b"abcdefghijkmnpqrstuvwxyz23456789";

/// Generator for session-scoped random values.
#[derive(Clone, Debug)]
pub struct SessionRng {
    inner: ChaCha8Rng,
}

impl SessionRng {
    /// Create a generator from a seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            inner: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Create a generator from an optional seed, drawing one from the OS if absent.
    #[must_use]
    pub fn from_seed_or_entropy(seed: Option<u64>) -> Self {
        Self::new(seed.unwrap_or_else(rand::random))
    }

    /// Random lowercase code of `len` characters without look-alike glyphs.
    pub fn code(&mut self, len: usize) -> String {
        (0..len)
            .map(|_| ID_ALPHABET[self.inner.gen_range(0..ID_ALPHABET.len())] as char)
            .collect()
    }

    /// New session id.
    pub fn session_id(&mut self) -> SessionId {
        SessionId(self.code(8))
    }

    /// New peer token handed to a guest on join.
    pub fn peer_token(&mut self) -> String {
        self.code(24)
    }

    /// New delta epoch for this process start.
    pub fn epoch(&mut self) -> u64 {
        self.inner.gen()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_determinism() {
        let mut rng1 = SessionRng::new(42);
        let mut rng2 = SessionRng::new(42);

        assert_eq!(rng1.session_id(), rng2.session_id());
        assert_eq!(rng1.peer_token(), rng2.peer_token());
        assert_eq!(rng1.epoch(), rng2.epoch());
    }

    #[test]
    fn test_different_seeds() {
        let mut rng1 = SessionRng::new(1);
        let mut rng2 = SessionRng::new(2);
        assert_ne!(rng1.peer_token(), rng2.peer_token());
    }

    #[test]
    fn test_code_alphabet() {
        let mut rng = SessionRng::new(7);
        let code = rng.code(64);
        assert_eq!(code.len(), 64);
        assert!(code.bytes().all(|b| ID_ALPHABET.contains(&b)));
    }
}
