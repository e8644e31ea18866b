//! # Muteacle
//!
//! Muteacle is a shadow logging engine: it records evidence that a byte
//! sequence was observed at a particular wall-clock moment, while retaining
//! nothing sufficient to reconstruct the observed bytes. A caller later
//! presenting the exact same bytes together with an approximate witnessing
//! time can ask "did you see this?" and receive a boolean answer.
//!
//! Wall-clock time is quantised into day-aligned intervals whose length is
//! a reconfigurable number of seconds (see [`intervals`]). Every witnessed
//! digest is bound to the salted, parameterised hasher that was active in
//! the interval of witnessing (see [`muteacle_crypto::hasher`]), and
//! configuration changes only take effect at the next interval boundary
//! common to the outgoing and incoming bucket lengths (see [`config`] and
//! [`repository`]), so no interval is ever served by two incompatible
//! configurations.
//!
//! ```
//! use muteacle::Repository;
//! use serde_json::json;
//!
//! let repo = Repository::in_memory().unwrap();
//!
//! // cheap parameters, tolerable for an example
//! let params = json!({ "i": 2, "keylen": 16 });
//! let report = repo
//!     .append_log([b"alfa".as_ref()], Some("pbkdf2"), params.as_object())
//!     .unwrap();
//!
//! assert!(repo.check_log(report.instant, b"alfa").unwrap());
//! assert!(!repo.check_log(report.instant, b"bravo").unwrap());
//! ```
#![deny(rust_2018_idioms)]
#![deny(non_upper_case_globals)]
#![deny(non_camel_case_types)]
#![deny(non_snake_case)]
#![deny(unused_mut)]
#![deny(missing_docs)]

pub mod config;
pub mod error;
pub mod intervals;
pub mod keys;
pub mod repository;

pub use crate::config::RepoSettings;
pub use crate::error::{Error, Result};
pub use crate::repository::{Repository, StoredConfig, WitnessReport, STORE_VERSION};

pub use muteacle_crypto::hasher::Hasher;
pub use muteacle_crypto::settings::{ConfigMap, Configurable};
