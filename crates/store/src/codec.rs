use bincode::config::standard;
use bincode::serde::{decode_from_slice, encode_to_vec};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use zstd::{decode_all, encode_all};

use crate::StoreError;

/// Compression codec options for stored values.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionCodec {
    /// No compression (useful for debugging).
    None,
    /// Zstd compression (default).
    #[default]
    Zstd,
}

/// Compression behavior configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionConfig {
    #[serde(default)]
    pub codec: CompressionCodec,
    /// Zstd level, 1-22. Higher compresses better but slower.
    #[serde(default = "CompressionConfig::default_level")]
    pub level: i32,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            codec: CompressionCodec::default(),
            level: Self::default_level(),
        }
    }
}

impl CompressionConfig {
    fn default_level() -> i32 {
        3
    }

    pub fn new(codec: CompressionCodec, level: i32) -> Self {
        Self { codec, level }
    }

    pub fn with_codec(mut self, codec: CompressionCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_level(mut self, level: i32) -> Self {
        self.level = level;
        self
    }

    /// Serialize with bincode, then compress.
    pub(crate) fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, StoreError> {
        let encoded =
            encode_to_vec(value, standard()).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        match self.codec {
            CompressionCodec::None => Ok(encoded),
            CompressionCodec::Zstd => encode_all(encoded.as_slice(), self.level)
                .map_err(|e| StoreError::Corrupt(format!("zstd encode: {e}"))),
        }
    }

    /// Decompress, then deserialize with bincode.
    pub(crate) fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, StoreError> {
        let raw = match self.codec {
            CompressionCodec::None => data.to_vec(),
            CompressionCodec::Zstd => {
                decode_all(data).map_err(|e| StoreError::Corrupt(format!("zstd decode: {e}")))?
            }
        };
        let (value, _) =
            decode_from_slice(&raw, standard()).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        Ok(value)
    }
}

/// Key layout. Tenant ids are length-prefixed so a tenant named `a/b` can
/// never share a prefix with tenant `a`.
pub(crate) mod keys {
    pub(crate) const EMBEDDING: &str = "emb";
    pub(crate) const SUBJECT: &str = "usr";
    pub(crate) const LOG: &str = "log";

    pub(crate) fn tenant_prefix(kind: &str, tenant_id: &str) -> String {
        format!("{kind}/{}/{tenant_id}/", tenant_id.len())
    }

    pub(crate) fn entry(kind: &str, tenant_id: &str, id: &str) -> String {
        let mut key = tenant_prefix(kind, tenant_id);
        key.push_str(id);
        key
    }
}
