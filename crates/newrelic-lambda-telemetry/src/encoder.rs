//! Serverless payload encoding and the envelope recognised by the log processor.
//!
//! A finalized session document is serialised to JSON, gzip-compressed and
//! base64-encoded. Each encoded payload (or chunk of one) is then framed as
//! `[1, "NR_LAMBDA_MONITORING", "<payload>"]` on a single line.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::ser::{Serialize, SerializeTuple, Serializer};
use std::fmt;
use std::io::{Read, Write};

/// Envelope format version.
pub const ENVELOPE_VERSION: u8 = 1;

/// Marker the downstream log processor pattern-matches on.
pub const ENVELOPE_MARKER: &str = "NR_LAMBDA_MONITORING";

/// Error produced while encoding or decoding a payload.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    /// The session document could not be serialised or parsed.
    #[error("failed to serialise payload")]
    Json(#[from] serde_json::Error),

    /// Compression failed.
    #[error("failed to compress payload")]
    Io(#[from] std::io::Error),

    /// Base64 decoding failed.
    #[error("payload is not valid base64")]
    Base64(#[from] base64::DecodeError),

    /// A raw payload contained non-ASCII bytes.
    #[error("payload must be ASCII")]
    NotAscii,
}

/// An encoded telemetry payload, ready for framing.
///
/// The contents are always ASCII, so the payload can be split at any byte
/// offset without producing invalid UTF-8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPayload(String);

impl EncodedPayload {
    /// Encodes a document as JSON, gzip and base64.
    pub fn encode<T: Serialize>(document: &T) -> Result<Self, EncodeError> {
        let json = serde_json::to_vec(document)?;

        let mut encoder = GzEncoder::new(Vec::with_capacity(json.len() / 4), Compression::default());
        encoder.write_all(&json)?;
        let compressed = encoder.finish()?;

        Ok(Self(STANDARD.encode(compressed)))
    }

    /// Wraps an already-encoded payload.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::NotAscii`] if the payload contains non-ASCII bytes.
    pub fn from_ascii(payload: impl Into<String>) -> Result<Self, EncodeError> {
        let payload = payload.into();
        if !payload.is_ascii() {
            return Err(EncodeError::NotAscii);
        }
        Ok(Self(payload))
    }

    /// Reverses [`EncodedPayload::encode`].
    pub fn decode(&self) -> Result<serde_json::Value, EncodeError> {
        decode_str(&self.0)
    }

    /// Returns the encoded payload text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the payload size in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Frames the whole payload in a single envelope.
    pub fn envelope(&self) -> Envelope<'_> {
        Envelope::new(&self.0)
    }
}

/// Decodes a base64 gzip JSON string, such as the concatenated chunk payloads
/// of a split envelope sequence.
pub fn decode_str(encoded: &str) -> Result<serde_json::Value, EncodeError> {
    let compressed = STANDARD.decode(encoded)?;
    let mut json = Vec::new();
    GzDecoder::new(compressed.as_slice()).read_to_end(&mut json)?;
    Ok(serde_json::from_slice(&json)?)
}

/// The `(version, marker, payload)` record understood by the log processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Envelope<'a> {
    payload: &'a str,
}

impl<'a> Envelope<'a> {
    /// Creates an envelope around a payload or payload chunk.
    pub fn new(payload: &'a str) -> Self {
        Self { payload }
    }

    /// Returns the framed payload.
    pub fn payload(&self) -> &'a str {
        self.payload
    }

    /// Serialises the envelope to its single-line wire form.
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl Serialize for Envelope<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(3)?;
        tuple.serialize_element(&ENVELOPE_VERSION)?;
        tuple.serialize_element(ENVELOPE_MARKER)?;
        tuple.serialize_element(self.payload)?;
        tuple.end()
    }
}

impl fmt::Display for Envelope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let line = self.to_line().map_err(|_| fmt::Error)?;
        f.write_str(&line)
    }
}
