//! Value serialization layer for cache entries and response artifacts.
//!
//! Three encodings are supported:
//!
//! - [`Encoding::Identity`] passes values through unchanged. It declares that
//!   it does not support encoding, so it can only be paired with backends
//!   that store structured values directly (the in-memory LRU).
//! - [`Encoding::Binary`] is MessagePack: a language-neutral, self-describing
//!   binary format that round-trips arbitrary JSON values.
//! - [`Encoding::Json`] is compact JSON bytes.
//!
//! Nil input yields nil output on both sides, so absent data flows through
//! the cache layers without tombstones. Every call updates the shared
//! [`SerializerStats`] block.

use crate::error::Error;
use crate::stats::{SerializerStats, SerializerStatsSnapshot};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

/// Wire encoding selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    #[default]
    Identity,
    Binary,
    Json,
}

impl Encoding {
    /// Whether this encoding can produce a byte representation.
    #[must_use]
    pub const fn supports_encoding(self) -> bool {
        !matches!(self, Self::Identity)
    }
}

/// A value as stored by a cache backend: either the structured value itself
/// (identity encoding, in-memory backends) or its encoded bytes.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Inline(Value),
    Bytes(Vec<u8>),
}

impl Payload {
    /// Size in bytes of the stored representation. Inline values report the
    /// length of their JSON rendering.
    #[must_use]
    pub fn size(&self) -> usize {
        match self {
            Self::Inline(value) => value.to_string().len(),
            Self::Bytes(bytes) => bytes.len(),
        }
    }
}

/// Stateful encoder/decoder wrapping one [`Encoding`].
#[derive(Debug, Clone)]
pub struct Serializer {
    encoding: Encoding,
    stats: Arc<SerializerStats>,
}

impl Serializer {
    #[must_use]
    pub fn new(encoding: Encoding) -> Self {
        Self {
            encoding,
            stats: Arc::new(SerializerStats::default()),
        }
    }

    #[must_use]
    pub const fn encoding(&self) -> Encoding {
        self.encoding
    }

    #[must_use]
    pub const fn supports_encoding(&self) -> bool {
        self.encoding.supports_encoding()
    }

    #[must_use]
    pub fn stats(&self) -> SerializerStatsSnapshot {
        self.stats.snapshot()
    }

    /// Encodes a value into its storable payload.
    ///
    /// Null input yields `None`. Identity encoding yields the value itself.
    ///
    /// # Errors
    ///
    /// Returns an encode error if the underlying format rejects the value.
    pub fn encode(&self, value: &Value) -> Result<Option<Payload>, Error> {
        if value.is_null() {
            return Ok(None);
        }

        let start = Instant::now();
        let raw_size = value.to_string().len();
        let payload = match self.encoding {
            Encoding::Identity => Payload::Inline(value.clone()),
            Encoding::Binary => Payload::Bytes(
                rmp_serde::to_vec(value)
                    .map_err(|e| Error::encode_failed(format!("messagepack encode: {e}")))?,
            ),
            Encoding::Json => Payload::Bytes(
                serde_json::to_vec(value)
                    .map_err(|e| Error::encode_failed(format!("json encode: {e}")))?,
            ),
        };
        let enc_size = match &payload {
            Payload::Inline(_) => raw_size,
            Payload::Bytes(bytes) => bytes.len(),
        };
        self.stats.record_encode(raw_size, enc_size, start.elapsed());

        Ok(Some(payload))
    }

    /// Decodes a stored payload back into a value.
    ///
    /// A decoded null yields `None`, mirroring `encode`.
    ///
    /// # Errors
    ///
    /// Returns an encode error if the bytes are not valid for this encoding,
    /// or if byte input reaches the identity serializer.
    pub fn decode(&self, payload: &Payload) -> Result<Option<Value>, Error> {
        let start = Instant::now();
        let value = match (self.encoding, payload) {
            (_, Payload::Inline(value)) => value.clone(),
            (Encoding::Binary, Payload::Bytes(bytes)) => rmp_serde::from_slice(bytes)
                .map_err(|e| Error::encode_failed(format!("messagepack decode: {e}")))?,
            (Encoding::Json, Payload::Bytes(bytes)) => serde_json::from_slice(bytes)
                .map_err(|e| Error::encode_failed(format!("json decode: {e}")))?,
            (Encoding::Identity, Payload::Bytes(_)) => {
                return Err(Error::encode_failed(
                    "identity serializer cannot decode byte payloads",
                ));
            }
        };
        self.stats.record_decode(start.elapsed());

        if value.is_null() {
            return Ok(None);
        }
        Ok(Some(value))
    }
}
