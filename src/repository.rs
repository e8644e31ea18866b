//! # Repository
//!
//! The repository is the only component that touches persistent state. It
//! mediates every read and write of the configuration history, the hasher
//! records and the digest log, and drives the two engine operations built
//! on top of them: witnessing ([`append_log`](Repository::append_log)) and
//! verification ([`check_log`](Repository::check_log)).
//!
//! A repository handle owns exclusive mutation rights to its backing
//! store; concurrent handles over the same store are not a supported
//! configuration. The in-memory backend is always single-handle.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use muteacle_crypto::hasher::{Hasher, CLASSES, DEFAULT_CLASS};
use muteacle_crypto::salt;
use muteacle_crypto::settings::{ConfigMap, Configurable};
use muteacle_storage::backends::btreemap;
use muteacle_storage::storage::{Storage, WriteBatch};

use crate::config::{integrity_tag, integrity_tag_matches, RepoSettings};
use crate::error::{Error, Result};
use crate::intervals;
use crate::keys;

/// Version tag written into every store this crate creates. Stores carrying
/// a different tag are foreign and are rejected on open.
pub const STORE_VERSION: &str = "muteacle/1";

/// Stored row of the configuration history table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigRow {
    /// Configuration JSON, exactly as hashed
    pub config: String,
    /// Size-gated integrity tag of `config`
    pub config_hash: String,
}

/// Stored row of the hasher record table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HasherRow {
    /// Row id of the hasher class in the class enumeration table
    pub class_id: u32,
    /// Parameter JSON, exactly as hashed
    pub config: String,
    /// Size-gated integrity tag of `config`
    pub config_hash: String,
    /// Base64-encoded salt
    pub salt: String,
}

/// A stored repository configuration together with its activation instant
#[derive(Debug, Clone, PartialEq)]
pub struct StoredConfig {
    /// The configuration
    pub settings: RepoSettings,
    /// Instant from which the configuration serves
    pub activation: DateTime<Utc>,
}

/// Report returned by a witnessing call.
///
/// `instant` is the one authoritative instant to present when later asking
/// whether any of the submitted items was seen.
#[derive(Debug, Clone, PartialEq)]
pub struct WitnessReport {
    /// Authoritative witnessing instant for every submitted item
    pub instant: DateTime<Utc>,
    /// Number of items whose digests were written
    pub items_logged: usize,
    /// Number of items submitted
    pub items_submitted: usize,
}

/// Shadow log repository over a key-ordered table store
pub struct Repository {
    store: Box<dyn Storage>,
    read_only: bool,
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("read_only", &self.read_only)
            .finish()
    }
}

impl Repository {
    /// Open a repository over `store`.
    ///
    /// A fresh store receives the version tag, the hasher class enumeration
    /// and a default configuration backdated to the start of the current
    /// interval. A store whose version tag differs is rejected. A store
    /// holding more than one pending configuration latches the handle
    /// read-only: every write operation fails until external intervention,
    /// while verification stays available.
    pub fn open(store: Box<dyn Storage>) -> Result<Self> {
        Self::open_with(store, None)
    }

    /// Open a repository over `store`, applying `initial` as the first
    /// configuration when the store has none. On a store that already holds
    /// configuration history, `initial` is ignored.
    pub fn open_with(store: Box<dyn Storage>, initial: Option<&ConfigMap>) -> Result<Self> {
        if let Some(tag) = store.get(keys::version().as_bytes())? {
            let tag = String::from_utf8_lossy(&tag).into_owned();
            if tag != STORE_VERSION {
                return Err(Error::ForeignStore(tag));
            }
        }

        let now = Utc::now();
        let repo = Repository {
            read_only: false,
            store,
        };
        let pending = repo.pending_row_keys(now)?.len();
        if pending > 1 {
            warn!(
                "found {} pending configurations, latching read-only; \
                 this indicates a tampered or misconfigured clock",
                pending
            );
            return Ok(Repository {
                read_only: true,
                ..repo
            });
        }

        repo.store.put(
            keys::version().into(),
            STORE_VERSION.as_bytes().to_vec(),
        )?;
        repo.register_classes()?;
        if repo.active_config(now)?.is_none() && pending == 0 {
            repo.set_config(initial)?;
        }

        Ok(repo)
    }

    /// Open a repository over a fresh in-memory store, for ephemeral
    /// sessions.
    pub fn in_memory() -> Result<Self> {
        Self::open(Box::new(btreemap::Backend::default()))
    }

    /// Open a repository over a fresh in-memory store with an initial
    /// configuration.
    pub fn in_memory_with(initial: Option<&ConfigMap>) -> Result<Self> {
        Self::open_with(Box::new(btreemap::Backend::default()), initial)
    }

    /// Whether this handle latched read-only on open
    pub fn read_only(&self) -> bool {
        self.read_only
    }

    /// The configuration active at the present instant
    pub fn get_config(&self) -> Result<RepoSettings> {
        self.active_config(Utc::now())?
            .map(|stored| stored.settings)
            .ok_or(Error::NoActiveConfig)
    }

    /// The pending configuration, if one is scheduled
    pub fn pending_config(&self) -> Result<Option<RepoSettings>> {
        Ok(self
            .pending_row(Utc::now())?
            .map(|stored| stored.settings))
    }

    /// The activation instant of the pending configuration, if one is
    /// scheduled
    pub fn pending_config_instant(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .pending_row(Utc::now())?
            .map(|stored| stored.activation))
    }

    /// Apply a configuration update, returning the instant at which the
    /// resulting configuration takes (or took) effect.
    ///
    /// The first configuration ever stored is written immediately,
    /// backdated to the start of the current interval. Afterwards:
    /// requesting the pending configuration again is a no-op; requesting
    /// the active configuration cancels any pending one; anything else
    /// replaces the pending configuration with one scheduled at the next
    /// boundary common to the active and requested resolutions, so that no
    /// interval is ever served by two configurations.
    ///
    /// Keys missing from `update` keep their active values; `None` resets
    /// every recognised key to its default.
    pub fn set_config(&self, update: Option<&ConfigMap>) -> Result<DateTime<Utc>> {
        if self.read_only {
            return Err(Error::ReadOnly);
        }
        let now = Utc::now();

        let active = match self.active_config(now)? {
            None => {
                // first configuration: write immediately, backdated
                let settings = RepoSettings::default().merged_update(update);
                settings.validate()?;
                let activation = intervals::interval_start_containing(now, settings.resolution);
                self.write_config(activation, &settings, Vec::new())?;
                info!(
                    "stored first configuration, resolution {}s, active since {}",
                    settings.resolution, activation
                );
                return Ok(activation);
            }
            Some(active) => active,
        };

        let requested = active.settings.merged_update(update);
        requested.validate()?;

        if let Some(pending) = self.pending_row(now)? {
            if pending.settings == requested {
                return Ok(pending.activation);
            }
        }

        if requested == active.settings {
            // no effective change: drop whatever was scheduled
            let stale = self.pending_row_keys(now)?;
            if !stale.is_empty() {
                let mut batch = WriteBatch::default();
                for key in stale {
                    batch.delete(key);
                }
                self.store.write(batch)?;
                info!("cancelled pending configuration change");
            }
            return Ok(active.activation);
        }

        let activation =
            intervals::next_common_start(now, active.settings.resolution, requested.resolution);
        self.write_config(activation, &requested, self.pending_row_keys(now)?)?;
        info!(
            "scheduled configuration change to resolution {}s at {}",
            requested.resolution, activation
        );

        Ok(activation)
    }

    /// Every configuration whose activation instant equals the greatest
    /// activation instant at or before `dt`, newest first. More than one
    /// configuration may share an activation instant; all of them are
    /// returned.
    pub fn load_configs(&self, dt: DateTime<Utc>) -> Result<Vec<StoredConfig>> {
        let dt_ts = dt.timestamp_micros();
        let mut out = Vec::new();
        let mut target = None;

        for (key, value) in self
            .store
            .prefix_iterator_reverse(keys::config_prefix().as_bytes())?
        {
            let ts = match keys::parse_instant(&key) {
                Some(ts) => ts,
                None => continue,
            };
            match target {
                None if ts <= dt_ts => {
                    target = Some(ts);
                    out.push(decode_config_row(&key, &value)?);
                }
                None => {}
                Some(target) if ts == target => {
                    out.push(decode_config_row(&key, &value)?);
                }
                Some(_) => break,
            }
        }

        Ok(out)
    }

    /// Obtain a hasher usable for witnessing right now, creating and
    /// persisting one when needed.
    ///
    /// When the newest hasher recallable in the current interval matches
    /// the requested class and the requested parameter overrides change
    /// nothing effective, that hasher is returned unchanged. Any effective
    /// change of class or parameters produces a fresh hasher with a fresh
    /// salt, built from class defaults plus the requested overrides.
    ///
    /// Returns the hasher together with its interval start, the
    /// authoritative instant for recalling it.
    pub fn new_hasher(
        &self,
        class: Option<&str>,
        config: Option<&ConfigMap>,
    ) -> Result<(Hasher, DateTime<Utc>)> {
        if self.read_only {
            return Err(Error::ReadOnly);
        }
        let now = Utc::now();
        let settings = self.get_config()?;
        let last = self.get_hashers(now)?.into_iter().next();

        let target_class = match (class, &last) {
            (Some(name), _) => name.to_string(),
            (None, Some(last)) => last.class_name().to_string(),
            (None, None) => DEFAULT_CLASS.to_string(),
        };

        if let Some(last) = last {
            if last.class_name() == target_class {
                // requesting no overrides never changes anything effective
                let changes = match config {
                    Some(map) => last.clone().set_config(Some(map)),
                    None => 0,
                };
                if changes == 0 {
                    debug!("reusing {} hasher of current interval", target_class);
                    let instant = intervals::interval_start_containing(now, settings.resolution);
                    return Ok((last, instant));
                }
            }
        }

        let hasher = Hasher::new(
            &target_class,
            config,
            salt::generate(settings.salt_length),
        )?;
        let instant = self.save_hasher(&hasher)?;
        debug!("created {} hasher for interval {}", target_class, instant);

        Ok((hasher, instant))
    }

    /// Persist a hasher record bound to the current interval. Returns the
    /// earliest instant by which the hasher may be recalled, i.e. the
    /// interval start.
    ///
    /// Fails when the hasher's class is not in the class enumeration of the
    /// store.
    pub fn save_hasher(&self, hasher: &Hasher) -> Result<DateTime<Utc>> {
        if self.read_only {
            return Err(Error::ReadOnly);
        }
        let now = Utc::now();
        let settings = self.get_config()?;
        let class_id = self
            .class_id(hasher.class_name())?
            .ok_or_else(|| Error::UnsupportedHasher(hasher.class_name().to_string()))?;

        let instant = intervals::interval_start_containing(now, settings.resolution);
        let ts = instant.timestamp_micros();
        let config_json = hasher.config_json();
        let row = HasherRow {
            class_id,
            config_hash: integrity_tag(&config_json),
            config: config_json,
            salt: BASE64.encode(hasher.salt()),
        };
        let seq = self.next_seq(&keys::hasher_instant_prefix(ts))?;
        self.store.put(
            keys::hasher(ts, seq).into_bytes(),
            bincode::serialize(&row)?,
        )?;

        Ok(instant)
    }

    /// Rehydrate every hasher recallable at `dt`: for each configuration
    /// active at that instant, every hasher record whose interval start
    /// matches the interval containing `dt` under that configuration's
    /// resolution, newest first.
    pub fn get_hashers(&self, dt: DateTime<Utc>) -> Result<Vec<Hasher>> {
        let mut out = Vec::new();

        for stored in self.load_configs(dt)? {
            let ts = intervals::interval_start_containing(dt, stored.settings.resolution)
                .timestamp_micros();
            let prefix = keys::hasher_instant_prefix(ts);
            let rows: Vec<_> = self
                .store
                .prefix_iterator_reverse(prefix.as_bytes())?
                .collect();
            for (key, value) in rows {
                out.push(self.decode_hasher_row(&key, &value)?);
            }
        }

        Ok(out)
    }

    /// Witness a batch of byte items: digest every item under one hasher
    /// instance and append the digests to the log in a single atomic batch,
    /// retaining no reference to the items themselves.
    ///
    /// The returned report carries the one authoritative instant for later
    /// verification of every item in the batch.
    pub fn append_log<I>(
        &self,
        items: I,
        class: Option<&str>,
        config: Option<&ConfigMap>,
    ) -> Result<WitnessReport>
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        if self.read_only {
            return Err(Error::ReadOnly);
        }
        let (hasher, instant) = self.new_hasher(class, config)?;

        let mut batch = WriteBatch::default();
        let mut count = 0;
        for item in items {
            let digest = hasher.digest(item.as_ref())?;
            batch.put(
                keys::log_entry(&BASE64.encode(digest)).into_bytes(),
                Vec::new(),
            );
            count += 1;
        }
        self.store.write(batch)?;
        debug!("witnessed {} items at {}", count, instant);

        Ok(WitnessReport {
            instant,
            items_logged: count,
            items_submitted: count,
        })
    }

    /// Verify whether `item` was witnessed at approximately `dt`: compute
    /// its digest under every hasher recallable at that instant and answer
    /// whether any of them is present in the log.
    ///
    /// The precision required of `dt` is the resolution that was active at
    /// witnessing time.
    pub fn check_log(&self, dt: DateTime<Utc>, item: &[u8]) -> Result<bool> {
        for hasher in self.get_hashers(dt)? {
            let digest = hasher.digest(item)?;
            let key = keys::log_entry(&BASE64.encode(digest));
            if self.store.get(key.as_bytes())?.is_some() {
                return Ok(true);
            }
        }

        Ok(false)
    }

    // Greatest-activation-instant-at-or-before scan; ties resolved newest
    // insertion first.
    fn active_config(&self, dt: DateTime<Utc>) -> Result<Option<StoredConfig>> {
        let dt_ts = dt.timestamp_micros();

        for (key, value) in self
            .store
            .prefix_iterator_reverse(keys::config_prefix().as_bytes())?
        {
            match keys::parse_instant(&key) {
                Some(ts) if ts <= dt_ts => return Ok(Some(decode_config_row(&key, &value)?)),
                _ => {}
            }
        }

        Ok(None)
    }

    // Earliest-scheduled configuration with an activation instant in the
    // future, if any.
    fn pending_row(&self, now: DateTime<Utc>) -> Result<Option<StoredConfig>> {
        let now_ts = now.timestamp_micros();

        for (key, value) in self
            .store
            .prefix_iterator(keys::config_prefix().as_bytes())?
        {
            match keys::parse_instant(&key) {
                Some(ts) if ts > now_ts => return Ok(Some(decode_config_row(&key, &value)?)),
                _ => {}
            }
        }

        Ok(None)
    }

    fn pending_row_keys(&self, now: DateTime<Utc>) -> Result<Vec<Vec<u8>>> {
        let now_ts = now.timestamp_micros();
        let mut out = Vec::new();

        for (key, _) in self
            .store
            .prefix_iterator(keys::config_prefix().as_bytes())?
        {
            if let Some(ts) = keys::parse_instant(&key) {
                if ts > now_ts {
                    out.push(key);
                }
            }
        }

        Ok(out)
    }

    // Insert a configuration row and delete superseded pending rows in one
    // atomic batch.
    fn write_config(
        &self,
        activation: DateTime<Utc>,
        settings: &RepoSettings,
        delete_keys: Vec<Vec<u8>>,
    ) -> Result<()> {
        let ts = activation.timestamp_micros();
        let config_json = settings.config_json();
        let row = ConfigRow {
            config_hash: integrity_tag(&config_json),
            config: config_json,
        };

        let mut batch = WriteBatch::default();
        for key in delete_keys {
            batch.delete(key);
        }
        let seq = self.next_seq(&keys::config_instant_prefix(ts))?;
        batch.put(keys::config(ts, seq).into_bytes(), bincode::serialize(&row)?);
        self.store.write(batch)?;

        Ok(())
    }

    // Write the class enumeration rows of every supported hasher class,
    // assigning row ids in registry order, unless already present.
    fn register_classes(&self) -> Result<()> {
        for (index, name) in CLASSES.iter().enumerate() {
            let id = index as u32 + 1;
            let key = keys::hasher_type(id);
            if self.store.get(key.as_bytes())?.is_none() {
                debug!("registering hasher class {:?} as id {}", name, id);
                self.store
                    .put(key.into_bytes(), bincode::serialize(name)?)?;
            }
        }

        Ok(())
    }

    fn class_id(&self, name: &str) -> Result<Option<u32>> {
        for (key, value) in self
            .store
            .prefix_iterator(keys::hasher_type_prefix().as_bytes())?
        {
            let stored: String = bincode::deserialize(&value)?;
            if stored == name {
                let hex = std::str::from_utf8(&key[keys::hasher_type_prefix().len()..])
                    .ok()
                    .and_then(|s| u32::from_str_radix(s, 16).ok());
                return Ok(hex);
            }
        }

        Ok(None)
    }

    fn class_name(&self, id: u32) -> Result<Option<String>> {
        match self.store.get(keys::hasher_type(id).as_bytes())? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    fn decode_hasher_row(&self, key: &[u8], value: &[u8]) -> Result<Hasher> {
        let row: HasherRow = bincode::deserialize(value)?;
        if !integrity_tag_matches(&row.config, &row.config_hash) {
            return Err(Error::CorruptRecord {
                key: String::from_utf8_lossy(key).into_owned(),
            });
        }
        let class = self
            .class_name(row.class_id)?
            .ok_or_else(|| Error::UnsupportedHasher(format!("class id {}", row.class_id)))?;
        let config: Value = serde_json::from_str(&row.config)?;
        let salt = BASE64
            .decode(&row.salt)
            .map_err(|_| Error::CorruptRecord {
                key: String::from_utf8_lossy(key).into_owned(),
            })?;

        Ok(Hasher::new(&class, config.as_object(), salt)?)
    }

    fn next_seq(&self, prefix: &str) -> Result<u32> {
        Ok(self.store.prefix_iterator(prefix.as_bytes())?.count() as u32)
    }
}

fn decode_config_row(key: &[u8], value: &[u8]) -> Result<StoredConfig> {
    let row: ConfigRow = bincode::deserialize(value)?;
    if !integrity_tag_matches(&row.config, &row.config_hash) {
        return Err(Error::CorruptRecord {
            key: String::from_utf8_lossy(key).into_owned(),
        });
    }
    let parsed: Value = serde_json::from_str(&row.config)?;
    let map = parsed.as_object().ok_or_else(|| Error::CorruptRecord {
        key: String::from_utf8_lossy(key).into_owned(),
    })?;
    let settings = RepoSettings::from_config(map);
    settings.validate()?;

    let ts = keys::parse_instant(key).ok_or_else(|| Error::CorruptRecord {
        key: String::from_utf8_lossy(key).into_owned(),
    })?;
    let activation = DateTime::from_timestamp_micros(ts).ok_or(Error::Timestamp(ts))?;

    Ok(StoredConfig {
        settings,
        activation,
    })
}
