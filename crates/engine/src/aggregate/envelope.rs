// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! The reducer save/restore binary envelope (§6.6):
//! `magic | version | reducer_kind_id | body_len | body`.
//!
//! Framed by hand with explicit `to_be_bytes` writes rather than an
//! external binary-serialization crate, matching the teacher's preference
//! for dependency-light manual framing of wire formats (`crates/pdata`'s
//! OTLP framing) while still reaching for `serde_json` to encode the
//! reducer-specific body, mirroring how the teacher encodes
//! `NodeControlMsg::Config` as a `serde_json::Value`.

const MAGIC: [u8; 4] = *b"TZAG";
const VERSION: u8 = 1;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("envelope too short: expected at least {expected} bytes, got {actual}")]
    TooShort { expected: usize, actual: usize },
    #[error("bad magic: expected {MAGIC:?}, got {actual:?}")]
    BadMagic { actual: [u8; 4] },
    #[error("unsupported envelope version: {0}")]
    UnsupportedVersion(u8),
    #[error("reducer kind mismatch: expected `{expected}`, got `{actual}`")]
    KindMismatch { expected: String, actual: String },
    #[error("declared body length {declared} does not match actual remaining {actual}")]
    BodyLengthMismatch { declared: u32, actual: usize },
    #[error("malformed body: {0}")]
    MalformedBody(String),
}

/// A decoded (or to-be-encoded) envelope. `body` is the reducer's
/// JSON-encoded state.
pub struct ReducerEnvelope {
    pub reducer_kind: String,
    pub body: Vec<u8>,
}

impl ReducerEnvelope {
    #[must_use]
    pub fn new(reducer_kind: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            reducer_kind: reducer_kind.into(),
            body,
        }
    }

    /// Encodes the envelope: `magic(4) | version(1) | kind_len(2) | kind |
    /// body_len(4) | body`.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let kind_bytes = self.reducer_kind.as_bytes();
        let mut out = Vec::with_capacity(4 + 1 + 2 + kind_bytes.len() + 4 + self.body.len());
        out.extend_from_slice(&MAGIC);
        out.push(VERSION);
        out.extend_from_slice(&(kind_bytes.len() as u16).to_be_bytes());
        out.extend_from_slice(kind_bytes);
        out.extend_from_slice(&(self.body.len() as u32).to_be_bytes());
        out.extend_from_slice(&self.body);
        out
    }

    /// Decodes an envelope, validating magic/version/length framing but
    /// not the reducer's expected kind (callers that know which reducer
    /// they expect should call `decode_expecting` instead).
    pub fn decode(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        if bytes.len() < 4 + 1 + 2 {
            return Err(EnvelopeError::TooShort {
                expected: 7,
                actual: bytes.len(),
            });
        }
        let mut offset = 0usize;
        let magic: [u8; 4] = bytes[0..4].try_into().unwrap();
        offset += 4;
        if magic != MAGIC {
            return Err(EnvelopeError::BadMagic { actual: magic });
        }
        let version = bytes[offset];
        offset += 1;
        if version != VERSION {
            return Err(EnvelopeError::UnsupportedVersion(version));
        }
        let kind_len = u16::from_be_bytes(bytes[offset..offset + 2].try_into().unwrap()) as usize;
        offset += 2;
        if bytes.len() < offset + kind_len + 4 {
            return Err(EnvelopeError::TooShort {
                expected: offset + kind_len + 4,
                actual: bytes.len(),
            });
        }
        let reducer_kind = String::from_utf8(bytes[offset..offset + kind_len].to_vec())
            .map_err(|e| EnvelopeError::MalformedBody(e.to_string()))?;
        offset += kind_len;
        let body_len = u32::from_be_bytes(bytes[offset..offset + 4].try_into().unwrap());
        offset += 4;
        let remaining = bytes.len() - offset;
        if remaining as u32 != body_len {
            return Err(EnvelopeError::BodyLengthMismatch {
                declared: body_len,
                actual: remaining,
            });
        }
        let body = bytes[offset..].to_vec();
        Ok(Self { reducer_kind, body })
    }

    /// Decodes and additionally checks the reducer kind matches
    /// `expected_kind`, the check most reducer `restore` impls want.
    pub fn decode_expecting(bytes: &[u8], expected_kind: &str) -> Result<Self, EnvelopeError> {
        let envelope = Self::decode(bytes)?;
        if envelope.reducer_kind != expected_kind {
            return Err(EnvelopeError::KindMismatch {
                expected: expected_kind.to_string(),
                actual: envelope.reducer_kind,
            });
        }
        Ok(envelope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_kind_and_body() {
        let envelope = ReducerEnvelope::new("sum", br#"{"value":42}"#.to_vec());
        let encoded = envelope.encode();
        let decoded = ReducerEnvelope::decode(&encoded).unwrap();
        assert_eq!(decoded.reducer_kind, "sum");
        assert_eq!(decoded.body, br#"{"value":42}"#);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = ReducerEnvelope::new("sum", vec![]).encode();
        bytes[0] = b'X';
        assert!(matches!(
            ReducerEnvelope::decode(&bytes),
            Err(EnvelopeError::BadMagic { .. })
        ));
    }

    #[test]
    fn rejects_truncated_body() {
        let mut bytes = ReducerEnvelope::new("sum", br#"{"value":42}"#.to_vec()).encode();
        bytes.truncate(bytes.len() - 3);
        assert!(matches!(
            ReducerEnvelope::decode(&bytes),
            Err(EnvelopeError::BodyLengthMismatch { .. })
        ));
    }

    #[test]
    fn decode_expecting_checks_kind() {
        let bytes = ReducerEnvelope::new("sum", vec![]).encode();
        assert!(matches!(
            ReducerEnvelope::decode_expecting(&bytes, "min"),
            Err(EnvelopeError::KindMismatch { .. })
        ));
    }
}
