//! Content fingerprints for policy tables and composed graphs.
//!
//! Uses BLAKE3 over the canonical JSON encoding.

use crate::error::CoreResult;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A BLAKE3 fingerprint (256 bits / 32 bytes), rendered as hex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Fingerprint raw bytes
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Fingerprint the JSON encoding of `value`
    ///
    /// Ordered maps keep insertion order, so equal values declared in the
    /// same order always encode identically.
    ///
    /// # Errors
    ///
    /// Returns error if `value` cannot be encoded
    pub fn of_json<T: Serialize>(value: &T) -> CoreResult<Self> {
        let bytes = serde_json::to_vec(value)?;
        Ok(Self::compute(&bytes))
    }

    /// Get as bytes
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short form for log lines
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..6])
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl From<Fingerprint> for String {
    fn from(fp: Fingerprint) -> Self {
        fp.to_hex()
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let bytes = hex::decode(&value).map_err(|e| format!("invalid hex: {}", e))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| format!("invalid fingerprint length: {} (expected 32)", b.len()))?;
        Ok(Self(arr))
    }
}
