//! Redemption key record and id generation.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Symbols a key id is drawn from.
pub const ALPHABET: &[u8; 62] = b"1234567890abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Default key id length.
pub const DEFAULT_KEY_LENGTH: usize = 4;

/// Longest key id the generator accepts.
pub const MAX_KEY_LENGTH: usize = 64;

/// A redemption key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Key {
    /// Opaque unique token
    pub id: String,
    /// Set once the key has been allocated to a caller
    pub issued: bool,
    /// Set once an issued key has been invalidated
    pub canceled: bool,
}

/// Lifecycle state derived from a key's flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    /// Generated and waiting in the pool
    Unissued,
    /// Allocated to exactly one caller
    Issued,
    /// Issued and then invalidated
    Canceled,
}

impl KeyState {
    /// Label for logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unissued => "unissued",
            Self::Issued => "issued",
            Self::Canceled => "canceled",
        }
    }
}

impl Key {
    /// A freshly generated, unissued key.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Key {
            id: id.into(),
            issued: false,
            canceled: false,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> KeyState {
        match (self.issued, self.canceled) {
            (_, true) => KeyState::Canceled,
            (true, false) => KeyState::Issued,
            (false, false) => KeyState::Unissued,
        }
    }
}

/// Generates random key ids of a fixed length.
#[derive(Debug, Clone, Copy)]
pub struct KeyGenerator {
    length: usize,
}

impl Default for KeyGenerator {
    fn default() -> Self {
        Self {
            length: DEFAULT_KEY_LENGTH,
        }
    }
}

impl KeyGenerator {
    /// Create a generator producing ids of `length` symbols.
    ///
    /// Returns `None` when `length` is zero or above [`MAX_KEY_LENGTH`].
    #[must_use]
    pub fn new(length: usize) -> Option<Self> {
        (1..=MAX_KEY_LENGTH)
            .contains(&length)
            .then_some(Self { length })
    }

    /// Configured id length.
    #[must_use]
    pub const fn length(&self) -> usize {
        self.length
    }

    /// Generate an id, uniform over [`ALPHABET`].
    #[must_use]
    pub fn generate(&self) -> String {
        let mut rng = rand::thread_rng();
        (0..self.length)
            .map(|_| char::from(ALPHABET[rng.gen_range(0..ALPHABET.len())]))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_key_is_unissued() {
        let key = Key::new("AB12");
        assert!(!key.issued);
        assert!(!key.canceled);
        assert_eq!(key.state(), KeyState::Unissued);
    }

    #[test]
    fn test_state_derivation() {
        let mut key = Key::new("AB12");
        key.issued = true;
        assert_eq!(key.state(), KeyState::Issued);
        key.canceled = true;
        assert_eq!(key.state(), KeyState::Canceled);
    }

    #[test]
    fn test_generate_length_and_alphabet() {
        let generator = KeyGenerator::default();
        for _ in 0..100 {
            let id = generator.generate();
            assert_eq!(id.len(), DEFAULT_KEY_LENGTH);
            assert!(id.bytes().all(|b| ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn test_generator_bounds() {
        assert!(KeyGenerator::new(0).is_none());
        assert!(KeyGenerator::new(MAX_KEY_LENGTH + 1).is_none());
        assert_eq!(KeyGenerator::new(12).map(|g| g.generate().len()), Some(12));
    }

    #[test]
    fn test_alphabet_has_no_duplicates() {
        let mut symbols = ALPHABET.to_vec();
        symbols.sort_unstable();
        symbols.dedup();
        assert_eq!(symbols.len(), 62);
    }

    #[test]
    fn test_json_shape() {
        let key = Key {
            id: "AB12".to_string(),
            issued: true,
            canceled: false,
        };
        let json = serde_json::to_value(&key).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"id": "AB12", "issued": true, "canceled": false})
        );
    }
}
