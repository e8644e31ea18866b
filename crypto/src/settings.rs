//! # Configurable-object contract
//!
//! Shared configuration mechanism for entities that expose a fixed set of
//! recognised keys with default values, plus an opaque `meta` map kept for
//! caller bookkeeping. Configuration values travel as JSON maps so they can
//! be exported to and restored from a backing store verbatim.

use serde_json::{Map, Value};

/// A JSON configuration map, from recognised key name to primitive value.
pub type ConfigMap = Map<String, Value>;

/// Configuration contract for entities with a fixed recognised-key set.
///
/// The [`Default`](Default) instance of the implementing type defines the
/// default value of every recognised key. First-time configuration goes
/// through [`from_config`](Configurable::from_config), which fills every
/// recognised key and substitutes defaults for missing ones.
/// Reconfiguration goes through [`set_config`](Configurable::set_config).
pub trait Configurable: Default {
    /// Recognised configuration keys.
    const KEYS: &'static [&'static str];

    /// The current effective configuration, with every recognised key
    /// present.
    fn config_map(&self) -> ConfigMap;

    /// Adopt `value` for the recognised key `key`.
    ///
    /// Returns `false`, leaving the entity untouched, when the value cannot
    /// be used for that key.
    fn apply_value(&mut self, key: &str, value: &Value) -> bool;

    /// Reconfigure from `update`, writing only recognised keys whose values
    /// differ from the current effective values. Unrecognised keys and
    /// unusable values are ignored. Passing `None` resets every recognised
    /// key to its default.
    ///
    /// Returns the number of keys changed.
    fn set_config(&mut self, update: Option<&ConfigMap>) -> usize {
        match update {
            None => {
                *self = Self::default();
                Self::KEYS.len()
            }
            Some(requested) => {
                let current = self.config_map();
                let mut changes = 0;
                for key in Self::KEYS {
                    if let Some(value) = requested.get(*key) {
                        if current.get(*key) != Some(value) && self.apply_value(key, value) {
                            changes += 1;
                        }
                    }
                }
                changes
            }
        }
    }

    /// First-time configuration: every recognised key present in `config`
    /// is applied, every missing key takes its default.
    fn from_config(config: &ConfigMap) -> Self {
        let mut out = Self::default();
        out.set_config(Some(config));
        out
    }

    /// The current effective configuration as a JSON string.
    fn config_json(&self) -> String {
        Value::Object(self.config_map()).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // Abstract fashion object, exercising the contract without dragging a
    // real hasher in.
    #[derive(Debug, Clone, PartialEq)]
    struct Garment {
        design: String,
        size: u64,
        meta: ConfigMap,
    }

    impl Default for Garment {
        fn default() -> Self {
            Garment {
                design: "plain_black".into(),
                size: 120,
                meta: ConfigMap::new(),
            }
        }
    }

    impl Configurable for Garment {
        const KEYS: &'static [&'static str] = &["design", "size", "meta"];

        fn config_map(&self) -> ConfigMap {
            let mut map = ConfigMap::new();
            map.insert("design".into(), Value::from(self.design.clone()));
            map.insert("size".into(), Value::from(self.size));
            map.insert("meta".into(), Value::Object(self.meta.clone()));
            map
        }

        fn apply_value(&mut self, key: &str, value: &Value) -> bool {
            match key {
                "design" => match value.as_str() {
                    Some(design) => {
                        self.design = design.into();
                        true
                    }
                    None => false,
                },
                "size" => match value.as_u64() {
                    Some(size) => {
                        self.size = size;
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

    fn map_of(value: Value) -> ConfigMap {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_init_all_defaults() {
        let garment = Garment::from_config(&ConfigMap::new());

        assert_eq!(garment, Garment::default());
    }

    #[test]
    fn test_init_partial_config() {
        let garment = Garment::from_config(&map_of(json!({"size": 160})));

        assert_eq!(garment.design, "plain_black");
        assert_eq!(garment.size, 160);
    }

    #[test]
    fn test_init_full_config() {
        let config = map_of(json!({
            "design": "red_thorny_roses",
            "size": 110,
            "meta": {"country": "it", "material": "nylon"},
        }));
        let garment = Garment::from_config(&config);

        assert_eq!(garment.config_map(), config);
    }

    #[test]
    fn test_unrecognised_keys_ignored() {
        let garment = Garment::from_config(&map_of(json!({"vegan": true, "halal": true})));

        assert_eq!(garment, Garment::default());
    }

    #[test]
    fn test_reconfig_counts_changes() {
        let mut garment = Garment::default();

        let changes = garment.set_config(Some(&map_of(json!({"size": 80, "design": "plain_black"}))));

        assert_eq!(changes, 1);
        assert_eq!(garment.size, 80);
    }

    #[test]
    fn test_reconfig_unusable_value_ignored() {
        let mut garment = Garment::default();

        let changes = garment.set_config(Some(&map_of(json!({"size": "not a number"}))));

        assert_eq!(changes, 0);
        assert_eq!(garment.size, 120);
    }

    #[test]
    fn test_reset_to_defaults() {
        let mut garment = Garment::from_config(&map_of(json!({"size": 80, "design": "houndstooth"})));

        let changes = garment.set_config(None);

        assert_eq!(changes, Garment::KEYS.len());
        assert_eq!(garment, Garment::default());
    }
}
