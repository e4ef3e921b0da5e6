//! Codec limits and encoding knobs.

use serde::Deserialize;

/// Tunables for encoding and decoding.
///
/// ```
/// use sysflow_avro::CodecConfig;
///
/// let config = CodecConfig::from_json(r#"{"block_size": 100}"#).unwrap();
/// assert_eq!(config.block_size, 100);
/// assert_eq!(config.max_depth, CodecConfig::default().max_depth);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CodecConfig {
    /// Maximum number of items per array/map block when encoding.
    /// `0` writes every collection as a single block.
    pub block_size: usize,
    /// Largest string, bytes or block payload accepted when decoding.
    pub max_length: u64,
    /// Deepest record/collection nesting accepted when decoding.
    pub max_depth: usize,
    /// Most array items and map entries accepted in one decoded value,
    /// counted across every block and nesting level.
    pub max_items: u64,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            block_size: 0,
            max_length: 64 * 1024 * 1024,
            max_depth: 256,
            max_items: 1 << 20,
        }
    }
}

impl CodecConfig {
    /// Parses a config from JSON; omitted keys keep their defaults.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn with_max_length(mut self, max_length: u64) -> Self {
        self.max_length = max_length;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_max_items(mut self, max_items: u64) -> Self {
        self.max_items = max_items;
        self
    }
}
