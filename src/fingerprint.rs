use crate::vocabulary::Vocabulary;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Hex chars kept from the SHA-256 digest.
const FINGERPRINT_LEN: usize = 16;

/// Cache key for one (text, vocabulary) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// `SHA-256( len(text) || text || len(label_1) || label_1 || ... )`, truncated.
    ///
    /// Lengths are big-endian `u64`, so a `|` inside the text or a label can
    /// never shift bytes between components. Label order matters: reordering
    /// the vocabulary changes every fingerprint, which is how stale cache
    /// entries get orphaned rather than purged.
    pub fn compute(text: &str, vocabulary: &Vocabulary) -> Self {
        let mut hasher = Sha256::new();
        update_prefixed(&mut hasher, text.trim());
        for label in vocabulary.labels() {
            update_prefixed(&mut hasher, label);
        }
        let mut hex = hex::encode(hasher.finalize());
        hex.truncate(FINGERPRINT_LEN);
        Fingerprint(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn update_prefixed(hasher: &mut Sha256, part: &str) {
    hasher.update((part.len() as u64).to_be_bytes());
    hasher.update(part.as_bytes());
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
