//! # Repository configuration
//!
//! The repository configuration is a versioned, JSON-serialised parameter
//! set. The struct in this module is __total__: it always carries a value
//! for every recognised key. Callers hand in __partial__ updates as plain
//! JSON maps; missing keys are filled from the configuration being updated
//! and unrecognised keys are silently dropped, per the configurable-object
//! contract.
//!
//! A stored configuration carries a size-gated integrity tag: the SHA-512
//! hex digest of its JSON bytes once the JSON is long enough to be worth
//! tagging, an empty string otherwise.

use serde_json::Value;

use muteacle_crypto::hash::sha512_hex;
use muteacle_crypto::settings::{ConfigMap, Configurable};

use crate::error::{Error, Result};
use crate::intervals;

/// Default bucket length in seconds
pub const DEFAULT_RESOLUTION: u32 = 5;

/// Default salt length in bytes for newly created hashers
pub const DEFAULT_SALT_LENGTH: usize = 32;

/// JSON payloads shorter than this are stored with an empty integrity tag
pub const INTEGRITY_TAG_MIN_LEN: usize = 128;

/// The total repository configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RepoSettings {
    /// Bucket length in seconds; must divide a day evenly
    pub resolution: u32,
    /// Length in bytes of salts generated for new hashers
    pub salt_length: usize,
    /// Opaque map preserved verbatim for caller bookkeeping
    pub meta: ConfigMap,
}

impl Default for RepoSettings {
    fn default() -> Self {
        RepoSettings {
            resolution: DEFAULT_RESOLUTION,
            salt_length: DEFAULT_SALT_LENGTH,
            meta: ConfigMap::new(),
        }
    }
}

impl Configurable for RepoSettings {
    const KEYS: &'static [&'static str] = &["resolution", "salt_length", "meta"];

    fn config_map(&self) -> ConfigMap {
        let mut map = ConfigMap::new();
        map.insert("resolution".into(), Value::from(self.resolution));
        map.insert("salt_length".into(), Value::from(self.salt_length));
        map.insert("meta".into(), Value::Object(self.meta.clone()));
        map
    }

    fn apply_value(&mut self, key: &str, value: &Value) -> bool {
        match key {
            "resolution" => match value.as_u64().and_then(|v| u32::try_from(v).ok()) {
                Some(resolution) => {
                    self.resolution = resolution;
                    true
                }
                None => false,
            },
            "salt_length" => match value.as_u64().and_then(|v| usize::try_from(v).ok()) {
                Some(salt_length) => {
                    self.salt_length = salt_length;
                    true
                }
                None => false,
            },
            "meta" => match value.as_object() {
                Some(meta) => {
                    self.meta = meta.clone();
                    true
                }
                None => false,
            },
            _ => false,
        }
    }
}

impl RepoSettings {
    /// Check the configuration for correctness. The only thing that can be
    /// wrong with one is an inadmissible resolution.
    pub fn validate(&self) -> Result<()> {
        if intervals::admissible(self.resolution) {
            Ok(())
        } else {
            Err(Error::InvalidResolution(self.resolution))
        }
    }

    /// The configuration that results from applying a partial `update` on
    /// top of this one: requested keys replace current values, missing keys
    /// keep them. `None` means a full reset to defaults.
    pub fn merged_update(&self, update: Option<&ConfigMap>) -> RepoSettings {
        match update {
            None => RepoSettings::default(),
            Some(map) => {
                let mut merged = self.clone();
                merged.set_config(Some(map));
                merged
            }
        }
    }
}

/// Size-gated integrity tag of a JSON payload: SHA-512 lowercase hex of the
/// UTF-8 bytes when the payload is at least [`INTEGRITY_TAG_MIN_LEN`] bytes
/// long, the empty string otherwise.
pub fn integrity_tag(json: &str) -> String {
    if json.len() >= INTEGRITY_TAG_MIN_LEN {
        sha512_hex(json.as_bytes())
    } else {
        String::new()
    }
}

/// Whether a stored payload still matches the tag recorded next to it
pub fn integrity_tag_matches(json: &str, stored_tag: &str) -> bool {
    stored_tag == integrity_tag(json)
}
