//! Repository behaviour tests over the in-memory backend.
//!
//! Hasher cost parameters are downgraded throughout to keep the suite
//! fast; the digest algebra is identical at any cost setting.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};

use muteacle::config::integrity_tag;
use muteacle::repository::{ConfigRow, HasherRow};
use muteacle::{intervals, keys};
use muteacle::{ConfigMap, Configurable, Error, Hasher, RepoSettings, Repository, STORE_VERSION};
use muteacle_storage::backends::{btreemap, nobackend};
use muteacle_storage::storage::Storage;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn map_of(value: Value) -> ConfigMap {
    value.as_object().unwrap().clone()
}

// cheap cost settings so tests spend their time on behaviour
fn scrypt_params() -> ConfigMap {
    map_of(json!({"n": 2, "r": 1, "p": 1, "keylen": 16}))
}

fn pbkdf2_params() -> ConfigMap {
    map_of(json!({"hash_algorithm": "sha256", "i": 2, "keylen": 16}))
}

fn repo_with_resolution(resolution: u32) -> Repository {
    init_logger();
    Repository::in_memory_with(Some(&map_of(json!({ "resolution": resolution })))).unwrap()
}

// unique per run, so a stray digest collision between tests is impossible
fn stamped(prefix: &str) -> Vec<u8> {
    format!("{}_{}", prefix, Utc::now().timestamp_micros()).into_bytes()
}

// keep a test that must stay inside one interval away from the boundary
fn ensure_headroom(resolution: u32) {
    if intervals::seconds_left(Utc::now(), resolution) < Duration::seconds(2) {
        intervals::sleep_until_interval_end(resolution);
    }
}

#[test]
fn witness_then_verify_in_same_interval() {
    let repo = repo_with_resolution(1);
    let alfa = stamped("alfa");

    let report = repo
        .append_log([&alfa], Some("scrypt"), Some(&scrypt_params()))
        .unwrap();

    assert_eq!(report.items_logged, 1);
    assert_eq!(report.items_submitted, 1);
    assert!(repo.check_log(report.instant, &alfa).unwrap());
    assert!(!repo.check_log(report.instant, &stamped("bravo")).unwrap());
    assert!(!repo
        .check_log(report.instant - Duration::seconds(1), &alfa)
        .unwrap());
}

#[test]
fn witness_not_found_in_neighbouring_intervals() {
    let repo = repo_with_resolution(2);
    let item = stamped("carol");

    let report = repo
        .append_log([&item], Some("pbkdf2"), Some(&pbkdf2_params()))
        .unwrap();

    // mid of the next interval, mid of the previous one
    assert!(!repo
        .check_log(report.instant + Duration::seconds(3), &item)
        .unwrap());
    assert!(!repo
        .check_log(report.instant - Duration::seconds(1), &item)
        .unwrap());
    assert!(repo.check_log(report.instant, &item).unwrap());
}

#[test]
fn witness_batch_shares_one_instant() {
    let repo = repo_with_resolution(86_400);
    ensure_headroom(86_400);
    let items = vec![stamped("alfa"), stamped("bravo"), stamped("charlie")];

    let report = repo
        .append_log(&items, Some("pbkdf2"), Some(&pbkdf2_params()))
        .unwrap();

    assert_eq!(report.items_logged, 3);
    assert_eq!(report.items_submitted, 3);
    for item in &items {
        assert!(repo.check_log(report.instant, item).unwrap());
    }
    assert!(!repo.check_log(report.instant, &stamped("delta")).unwrap());
}

#[test]
fn hashers_accumulate_within_interval() {
    let repo = repo_with_resolution(86_400);
    ensure_headroom(86_400);

    let (first, _) = repo
        .new_hasher(Some("scrypt"), Some(&scrypt_params()))
        .unwrap();
    let (second, _) = repo
        .new_hasher(Some("pbkdf2"), Some(&pbkdf2_params()))
        .unwrap();
    let (third, _) = repo
        .new_hasher(Some("scrypt"), Some(&scrypt_params()))
        .unwrap();

    let recalled = repo.get_hashers(Utc::now()).unwrap();
    assert_eq!(recalled.len(), 3);
    assert!(recalled.contains(&first));
    assert!(recalled.contains(&second));
    assert!(recalled.contains(&third));
    // same class and parameters, still independent instances
    assert_ne!(first.salt(), third.salt());
    assert_ne!(first, third);
}

#[test]
fn new_hasher_reuses_until_configuration_changes() {
    let repo = repo_with_resolution(86_400);
    ensure_headroom(86_400);

    let (first, first_instant) = repo
        .new_hasher(Some("scrypt"), Some(&scrypt_params()))
        .unwrap();
    let (repeat, repeat_instant) = repo
        .new_hasher(Some("scrypt"), Some(&scrypt_params()))
        .unwrap();

    assert_eq!(first, repeat);
    assert_eq!(first_instant, repeat_instant);
    assert_eq!(repo.get_hashers(Utc::now()).unwrap().len(), 1);

    let mut changed = scrypt_params();
    changed.insert("keylen".into(), Value::from(24));
    let (fresh, _) = repo.new_hasher(Some("scrypt"), Some(&changed)).unwrap();

    assert_ne!(fresh, first);
    assert_ne!(fresh.salt(), first.salt());
    assert_eq!(repo.get_hashers(Utc::now()).unwrap().len(), 2);
}

#[test]
fn new_hasher_without_class_follows_last_hasher() {
    let repo = repo_with_resolution(86_400);
    ensure_headroom(86_400);

    let (first, _) = repo
        .new_hasher(Some("pbkdf2"), Some(&pbkdf2_params()))
        .unwrap();
    let (followed, _) = repo.new_hasher(None, Some(&pbkdf2_params())).unwrap();

    assert_eq!(first, followed);
    assert_eq!(followed.class_name(), "pbkdf2");
}

#[test]
fn hasher_recallable_across_its_whole_interval() {
    let repo = repo_with_resolution(86_400);
    ensure_headroom(86_400);

    let (hasher, instant) = repo
        .new_hasher(Some("pbkdf2"), Some(&pbkdf2_params()))
        .unwrap();

    let n = intervals::interval_number(instant, 86_400);
    let end = intervals::interval_end(instant.date_naive(), 86_400, n);
    assert!(repo.get_hashers(instant).unwrap().contains(&hasher));
    assert!(repo.get_hashers(end).unwrap().contains(&hasher));
    assert!(repo
        .get_hashers(instant - Duration::microseconds(1))
        .unwrap()
        .is_empty());
}

#[test]
fn unsupported_hasher_class_is_rejected() {
    let repo = repo_with_resolution(86_400);

    let err = repo.new_hasher(Some("whirlpool"), None).unwrap_err();

    assert!(matches!(err, Error::Crypto(_)), "got {:?}", err);
}

#[test]
fn salt_length_follows_configuration() {
    init_logger();
    let repo = Repository::in_memory_with(Some(&map_of(json!({
        "resolution": 86_400,
        "salt_length": 8,
    }))))
    .unwrap();
    ensure_headroom(86_400);

    let (hasher, _) = repo
        .new_hasher(Some("pbkdf2"), Some(&pbkdf2_params()))
        .unwrap();

    assert_eq!(hasher.salt().len(), 8);
}

#[test]
fn set_config_rejects_inadmissible_resolution() {
    let repo = repo_with_resolution(86_400);
    let before = repo.get_config().unwrap();

    let err = repo
        .set_config(Some(&map_of(json!({"resolution": 7}))))
        .unwrap_err();

    assert!(matches!(err, Error::InvalidResolution(7)), "got {:?}", err);
    assert_eq!(repo.get_config().unwrap(), before);
    assert_eq!(repo.pending_config().unwrap(), None);
}

#[test]
fn set_config_schedules_at_common_boundary() {
    let repo = repo_with_resolution(43_200);
    ensure_headroom(43_200);
    let active = repo.get_config().unwrap();

    repo.set_config(Some(&map_of(json!({"resolution": 86_400}))))
        .unwrap();
    // a second request replaces the pending configuration outright
    let second_request = repo
        .set_config(Some(&map_of(json!({"resolution": 28_800}))))
        .unwrap();

    let pending = repo.pending_config().unwrap().unwrap();
    assert_eq!(pending.resolution, 28_800);
    assert_eq!(
        repo.pending_config_instant().unwrap().unwrap(),
        second_request
    );
    assert!(second_request > Utc::now());
    for resolution in [active.resolution, 28_800] {
        assert_eq!(
            intervals::interval_start_containing(second_request, resolution),
            second_request,
            "activation must sit on a boundary under {}s",
            resolution
        );
    }
    assert_eq!(repo.get_config().unwrap(), active);
}

#[test]
fn set_config_requesting_pending_again_is_noop() {
    let repo = repo_with_resolution(43_200);
    ensure_headroom(43_200);

    let meta = map_of(json!({"meta": {"tag": "first"}}));
    let scheduled = repo.set_config(Some(&meta)).unwrap();
    let repeated = repo.set_config(Some(&meta)).unwrap();

    assert_eq!(scheduled, repeated);
    assert_eq!(
        repo.pending_config().unwrap().unwrap().meta,
        map_of(json!({"tag": "first"}))
    );
}

#[test]
fn set_config_requesting_active_cancels_pending() {
    let repo = repo_with_resolution(43_200);
    ensure_headroom(43_200);
    let active = repo.get_config().unwrap();
    let active_since = repo.load_configs(Utc::now()).unwrap()[0].activation;

    repo.set_config(Some(&map_of(json!({"meta": {"tag": "doomed"}}))))
        .unwrap();
    assert!(repo.pending_config().unwrap().is_some());

    let returned = repo.set_config(Some(&active.config_map())).unwrap();

    assert_eq!(returned, active_since);
    assert_eq!(repo.pending_config().unwrap(), None);
    assert_eq!(repo.get_config().unwrap(), active);
}

#[test]
fn resolution_change_applies_and_keeps_old_witnesses() {
    let repo = repo_with_resolution(1);
    let before = stamped("before_change");
    let witnessed_before = repo
        .append_log([&before], Some("pbkdf2"), Some(&pbkdf2_params()))
        .unwrap();

    let activation = repo
        .set_config(Some(&map_of(json!({"resolution": 2}))))
        .unwrap();
    assert!(activation > witnessed_before.instant);

    let wait = activation - Utc::now() + Duration::milliseconds(300);
    if let Ok(wait) = wait.to_std() {
        std::thread::sleep(wait);
    }

    assert_eq!(repo.get_config().unwrap().resolution, 2);
    assert_eq!(repo.pending_config().unwrap(), None);

    let after = stamped("after_change");
    let witnessed_after = repo
        .append_log([&after], Some("pbkdf2"), Some(&pbkdf2_params()))
        .unwrap();

    // items witnessed under either resolution stay verifiable at their
    // original instants
    assert!(repo.check_log(witnessed_before.instant, &before).unwrap());
    assert!(repo.check_log(witnessed_after.instant, &after).unwrap());
    assert!(!repo.check_log(witnessed_after.instant, &before).unwrap());
}

#[test]
fn custom_hasher_saved_and_recalled() {
    let repo = repo_with_resolution(86_400);
    ensure_headroom(86_400);

    let custom = Hasher::new("pbkdf2", Some(&pbkdf2_params()), b"customsalt".to_vec()).unwrap();
    let instant = repo.save_hasher(&custom).unwrap();

    assert_eq!(
        instant,
        intervals::interval_start_containing(Utc::now(), 86_400)
    );
    assert!(repo.get_hashers(instant).unwrap().contains(&custom));
}

#[test]
fn unreachable_backend_errors_propagate() {
    init_logger();

    let err = Repository::open(Box::new(nobackend::Backend)).unwrap_err();

    assert!(matches!(err, Error::Storage(_)), "got {:?}", err);
}

#[test]
fn check_log_before_any_configuration_is_false() {
    let repo = repo_with_resolution(86_400);

    let ancient = Utc::now() - Duration::days(2);
    assert!(!repo.check_log(ancient, b"anything").unwrap());
}

fn encode_config_row(settings: &RepoSettings) -> Vec<u8> {
    let config = settings.config_json();
    let row = ConfigRow {
        config_hash: integrity_tag(&config),
        config,
    };
    bincode::serialize(&row).unwrap()
}

// Build a store the way a previous session would have left it: version tag,
// class enumeration, an active configuration, one hasher and one witnessed
// item.
fn seeded_store(
    item: &[u8],
) -> (btreemap::Backend, RepoSettings, DateTime<Utc>) {
    let store = btreemap::Backend::default();
    store
        .put(
            keys::version().as_bytes().to_vec(),
            STORE_VERSION.as_bytes().to_vec(),
        )
        .unwrap();
    store
        .put(
            keys::hasher_type(1).into_bytes(),
            bincode::serialize("scrypt").unwrap(),
        )
        .unwrap();
    store
        .put(
            keys::hasher_type(2).into_bytes(),
            bincode::serialize("pbkdf2").unwrap(),
        )
        .unwrap();

    let settings = RepoSettings::from_config(&map_of(json!({"resolution": 86_400})));
    let active_since = intervals::interval_start_containing(Utc::now(), settings.resolution);
    let active_ts = active_since.timestamp_micros();
    store
        .put(
            keys::config(active_ts, 0).into_bytes(),
            encode_config_row(&settings),
        )
        .unwrap();

    let hasher = Hasher::new("pbkdf2", Some(&pbkdf2_params()), b"fixedsalt".to_vec()).unwrap();
    let hasher_config = hasher.config_json();
    let row = HasherRow {
        class_id: 2,
        config_hash: integrity_tag(&hasher_config),
        config: hasher_config,
        salt: BASE64.encode(hasher.salt()),
    };
    store
        .put(
            keys::hasher(active_ts, 0).into_bytes(),
            bincode::serialize(&row).unwrap(),
        )
        .unwrap();
    store
        .put(
            keys::log_entry(&BASE64.encode(hasher.digest(item).unwrap())).into_bytes(),
            Vec::new(),
        )
        .unwrap();

    (store, settings, active_since)
}

#[test]
fn reopened_store_recalls_previous_session() {
    init_logger();
    let item = stamped("previous_session");
    let (store, settings, active_since) = seeded_store(&item);

    let repo = Repository::open(Box::new(store)).unwrap();

    assert!(!repo.read_only());
    assert_eq!(repo.get_config().unwrap(), settings);
    assert!(repo.check_log(active_since, &item).unwrap());
}

#[test]
fn multiple_pending_configs_latch_read_only() {
    init_logger();
    let item = stamped("latched");
    let (store, settings, active_since) = seeded_store(&item);

    // two configurations in the future can only mean a tampered clock
    for days in 1..=2 {
        let ts = (active_since + Duration::days(days)).timestamp_micros();
        store
            .put(
                keys::config(ts, 0).into_bytes(),
                encode_config_row(&settings),
            )
            .unwrap();
    }

    let repo = Repository::open(Box::new(store)).unwrap();

    assert!(repo.read_only());
    assert!(matches!(
        repo.set_config(Some(&map_of(json!({"meta": {"t": 1}})))),
        Err(Error::ReadOnly)
    ));
    assert!(matches!(
        repo.new_hasher(None, None),
        Err(Error::ReadOnly)
    ));
    assert!(matches!(
        repo.append_log([b"alfa".as_ref()], None, None),
        Err(Error::ReadOnly)
    ));
    // verification over previously witnessed data still works
    assert!(repo.check_log(active_since, &item).unwrap());
}

#[test]
fn foreign_store_is_rejected() {
    init_logger();
    let store = btreemap::Backend::default();
    store
        .put(
            keys::version().as_bytes().to_vec(),
            b"somebody-else/9".to_vec(),
        )
        .unwrap();

    let err = Repository::open(Box::new(store)).unwrap_err();

    assert!(matches!(err, Error::ForeignStore(tag) if tag == "somebody-else/9"));
}

#[test]
fn corrupt_config_row_aborts_the_read() {
    init_logger();
    let store = btreemap::Backend::default();
    store
        .put(
            keys::version().as_bytes().to_vec(),
            STORE_VERSION.as_bytes().to_vec(),
        )
        .unwrap();

    // a payload long enough to demand a real tag, stored with a stale one
    let settings = RepoSettings::from_config(&map_of(json!({
        "meta": {"padding": "x".repeat(160)},
    })));
    let config = settings.config_json();
    assert!(config.len() >= 128);
    let row = ConfigRow {
        config,
        config_hash: "0".repeat(128),
    };
    let ts = intervals::interval_start_containing(Utc::now(), 5).timestamp_micros();
    store
        .put(
            keys::config(ts, 0).into_bytes(),
            bincode::serialize(&row).unwrap(),
        )
        .unwrap();

    let err = Repository::open(Box::new(store)).unwrap_err();

    assert!(matches!(err, Error::CorruptRecord { .. }), "got {:?}", err);
}
