//! # Hashers
//!
//! Named, parameterised, salted one-way functions used to witness byte
//! items. A hasher is a closed tagged variant; each variant carries its own
//! parameter record plus a per-instance salt. Two hashers are equal iff they
//! are of the same class, their recognised configuration (including `meta`)
//! is identical, and their salts are identical.

use serde_json::Value;
use sha1::Sha1;
use sha2::{Sha256, Sha512};
use thiserror::Error;

use crate::settings::{ConfigMap, Configurable};

/// Class name of the scrypt hasher variant
pub const SCRYPT: &str = "scrypt";

/// Class name of the PBKDF2 hasher variant
pub const PBKDF2: &str = "pbkdf2";

/// Every supported hasher class name, in registry order
pub const CLASSES: [&str; 2] = [SCRYPT, PBKDF2];

/// Class used when a caller requests a hasher without naming one
pub const DEFAULT_CLASS: &str = SCRYPT;

/// Errors raised when constructing or evaluating a hasher
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// The requested class name is not in the registry
    #[error("hasher class {0:?} is not supported")]
    UnknownClass(String),
    /// The named PBKDF2 digest algorithm is not supported
    #[error("digest algorithm {0:?} is not supported")]
    UnknownDigest(String),
    /// The scrypt cost parameters are out of range (`n` must be a power of
    /// two greater than one)
    #[error("scrypt cost parameters are invalid")]
    ScryptParams,
    /// The requested derived key length is invalid
    #[error("derived key length {0} is invalid")]
    KeyLength(usize),
}

/// Parameter record of the scrypt hasher
#[derive(Debug, Clone, PartialEq)]
pub struct ScryptParams {
    /// CPU/memory cost, a power of two greater than one
    pub n: u64,
    /// Block size
    pub r: u32,
    /// Parallelisation
    pub p: u32,
    /// Derived key length in bytes
    pub keylen: usize,
    /// Opaque caller bookkeeping
    pub meta: ConfigMap,
}

impl Default for ScryptParams {
    fn default() -> Self {
        ScryptParams {
            n: 1024,
            r: 16,
            p: 64,
            keylen: 32,
            meta: ConfigMap::new(),
        }
    }
}

impl Configurable for ScryptParams {
    const KEYS: &'static [&'static str] = &["n", "r", "p", "keylen", "meta"];

    fn config_map(&self) -> ConfigMap {
        let mut map = ConfigMap::new();
        map.insert("n".into(), Value::from(self.n));
        map.insert("r".into(), Value::from(self.r));
        map.insert("p".into(), Value::from(self.p));
        map.insert("keylen".into(), Value::from(self.keylen));
        map.insert("meta".into(), Value::Object(self.meta.clone()));
        map
    }

    fn apply_value(&mut self, key: &str, value: &Value) -> bool {
        match key {
            "n" => match value.as_u64() {
                Some(n) => {
                    self.n = n;
                    true
                }
                None => false,
            },
            "r" => match value.as_u64().and_then(|v| u32::try_from(v).ok()) {
                Some(r) => {
                    self.r = r;
                    true
                }
                None => false,
            },
            "p" => match value.as_u64().and_then(|v| u32::try_from(v).ok()) {
                Some(p) => {
                    self.p = p;
                    true
                }
                None => false,
            },
            "keylen" => match value.as_u64().and_then(|v| usize::try_from(v).ok()) {
                Some(keylen) => {
                    self.keylen = keylen;
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

/// Parameter record of the PBKDF2 hasher
#[derive(Debug, Clone, PartialEq)]
pub struct Pbkdf2Params {
    /// Name of the HMAC digest: `sha1`, `sha256` or `sha512`
    pub hash_algorithm: String,
    /// Iteration count
    pub i: u32,
    /// Derived key length in bytes
    pub keylen: usize,
    /// Opaque caller bookkeeping
    pub meta: ConfigMap,
}

impl Default for Pbkdf2Params {
    fn default() -> Self {
        Pbkdf2Params {
            hash_algorithm: "sha256".into(),
            i: 400_000,
            keylen: 32,
            meta: ConfigMap::new(),
        }
    }
}

impl Configurable for Pbkdf2Params {
    const KEYS: &'static [&'static str] = &["hash_algorithm", "i", "keylen", "meta"];

    fn config_map(&self) -> ConfigMap {
        let mut map = ConfigMap::new();
        map.insert(
            "hash_algorithm".into(),
            Value::from(self.hash_algorithm.clone()),
        );
        map.insert("i".into(), Value::from(self.i));
        map.insert("keylen".into(), Value::from(self.keylen));
        map.insert("meta".into(), Value::Object(self.meta.clone()));
        map
    }

    fn apply_value(&mut self, key: &str, value: &Value) -> bool {
        match key {
            "hash_algorithm" => match value.as_str() {
                Some(name) => {
                    self.hash_algorithm = name.into();
                    true
                }
                None => false,
            },
            "i" => match value.as_u64().and_then(|v| u32::try_from(v).ok()) {
                Some(i) => {
                    self.i = i;
                    true
                }
                None => false,
            },
            "keylen" => match value.as_u64().and_then(|v| usize::try_from(v).ok()) {
                Some(keylen) => {
                    self.keylen = keylen;
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

/// A salted one-way function bound to one of the registered classes
#[derive(Debug, Clone, PartialEq)]
pub enum Hasher {
    /// RFC 7914 scrypt
    Scrypt(ScryptParams, Vec<u8>),
    /// PBKDF2-HMAC of a named digest
    Pbkdf2(Pbkdf2Params, Vec<u8>),
}

impl Hasher {
    /// Construct a hasher of the named class from an optional configuration
    /// map and a salt. Missing recognised keys take their defaults.
    pub fn new(class: &str, config: Option<&ConfigMap>, salt: Vec<u8>) -> Result<Self, Error> {
        match class {
            SCRYPT => Ok(Hasher::Scrypt(
                config.map(ScryptParams::from_config).unwrap_or_default(),
                salt,
            )),
            PBKDF2 => Ok(Hasher::Pbkdf2(
                config.map(Pbkdf2Params::from_config).unwrap_or_default(),
                salt,
            )),
            other => Err(Error::UnknownClass(other.to_string())),
        }
    }

    /// Registry name of this hasher's class
    pub fn class_name(&self) -> &'static str {
        match self {
            Hasher::Scrypt(..) => SCRYPT,
            Hasher::Pbkdf2(..) => PBKDF2,
        }
    }

    /// The per-instance salt
    pub fn salt(&self) -> &[u8] {
        match self {
            Hasher::Scrypt(_, salt) | Hasher::Pbkdf2(_, salt) => salt,
        }
    }

    /// The recognised configuration, `meta` included, salt excluded
    pub fn config_map(&self) -> ConfigMap {
        match self {
            Hasher::Scrypt(params, _) => params.config_map(),
            Hasher::Pbkdf2(params, _) => params.config_map(),
        }
    }

    /// The recognised configuration as a JSON string
    pub fn config_json(&self) -> String {
        match self {
            Hasher::Scrypt(params, _) => params.config_json(),
            Hasher::Pbkdf2(params, _) => params.config_json(),
        }
    }

    /// Reconfigure the parameter record, per the configurable contract.
    /// Returns the number of keys changed. The salt is left untouched.
    pub fn set_config(&mut self, update: Option<&ConfigMap>) -> usize {
        match self {
            Hasher::Scrypt(params, _) => params.set_config(update),
            Hasher::Pbkdf2(params, _) => params.set_config(update),
        }
    }

    /// Compute the salted digest of `data`
    pub fn digest(&self, data: &[u8]) -> Result<Vec<u8>, Error> {
        match self {
            Hasher::Scrypt(params, salt) => {
                if params.n < 2 || !params.n.is_power_of_two() {
                    return Err(Error::ScryptParams);
                }
                let log_n = params.n.trailing_zeros() as u8;
                let cost = scrypt::Params::new(log_n, params.r, params.p, params.keylen)
                    .map_err(|_| Error::ScryptParams)?;
                let mut out = vec![0u8; params.keylen];
                scrypt::scrypt(data, salt, &cost, &mut out)
                    .map_err(|_| Error::KeyLength(params.keylen))?;

                Ok(out)
            }
            Hasher::Pbkdf2(params, salt) => {
                let mut out = vec![0u8; params.keylen];
                match params.hash_algorithm.as_str() {
                    "sha1" => pbkdf2::pbkdf2_hmac::<Sha1>(data, salt, params.i, &mut out),
                    "sha256" => pbkdf2::pbkdf2_hmac::<Sha256>(data, salt, params.i, &mut out),
                    "sha512" => pbkdf2::pbkdf2_hmac::<Sha512>(data, salt, params.i, &mut out),
                    other => return Err(Error::UnknownDigest(other.to_string())),
                }

                Ok(out)
            }
        }
    }
}
