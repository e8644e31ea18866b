//! # Store key layout
//!
//! The four logical tables live in one key-ordered store, one prefix per
//! table. Instants are encoded as fixed-width lowercase hex of their epoch
//! microsecond timestamp, so lexicographic key order equals chronological
//! order; a fixed-width sequence number keeps same-instant rows ordered by
//! insertion, newest = highest.

/// Key of the store version tag.
#[inline]
pub fn version() -> &'static str {
    "version"
}

/// Prefix shared by every stored repository configuration.
#[inline]
pub fn config_prefix() -> &'static str {
    "config-"
}

/// Prefix of every configuration activating at instant `ts`.
#[inline]
pub fn config_instant_prefix(ts: i64) -> String {
    format!("config-{:016x}-", ts as u64)
}

/// Key of the configuration row activating at `ts` with sequence `seq`.
#[inline]
pub fn config(ts: i64, seq: u32) -> String {
    format!("config-{:016x}-{:08x}", ts as u64, seq)
}

/// Prefix shared by every stored hasher record.
#[inline]
pub fn hasher_prefix() -> &'static str {
    "hasher-"
}

/// Prefix of every hasher record whose interval starts at instant `ts`.
#[inline]
pub fn hasher_instant_prefix(ts: i64) -> String {
    format!("hasher-{:016x}-", ts as u64)
}

/// Key of the hasher record at interval start `ts` with sequence `seq`.
#[inline]
pub fn hasher(ts: i64, seq: u32) -> String {
    format!("hasher-{:016x}-{:08x}", ts as u64, seq)
}

/// Key of the hasher class enumeration row with the given class id.
#[inline]
pub fn hasher_type(id: u32) -> String {
    format!("htype-{:08x}", id)
}

/// Prefix shared by every hasher class enumeration row.
#[inline]
pub fn hasher_type_prefix() -> &'static str {
    "htype-"
}

/// Key of the log entry holding a base64-encoded digest.
#[inline]
pub fn log_entry(digest_b64: &str) -> String {
    format!("log-{}", digest_b64)
}

/// Recover the epoch microsecond timestamp encoded in a configuration or
/// hasher key. Both prefixes are seven bytes long.
pub fn parse_instant(key: &[u8]) -> Option<i64> {
    let hex = key.get(7..23)?;
    let hex = std::str::from_utf8(hex).ok()?;

    u64::from_str_radix(hex, 16).ok().map(|ts| ts as i64)
}
