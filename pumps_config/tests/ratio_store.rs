use std::fs;

use pumps_config::{FileRatioStore, MemoryRatioStore, PersistedRatios};
use pumps_traits::RatioStore;
use tempfile::tempdir;

#[test]
fn missing_file_reads_zero_and_is_initialized() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ratios.toml");
    let mut store = FileRatioStore::new(&path);
    assert!(!store.is_loaded());

    assert_eq!(store.steps_per_ml().unwrap(), 0);
    assert_eq!(store.ticks_per_ml().unwrap(), 0);
    assert!(store.is_loaded());
    assert!(path.exists(), "blank store should be written on first read");
}

#[test]
fn writes_survive_a_new_instance() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("ratios.toml");

    let mut store = FileRatioStore::new(&path);
    store.set_steps_per_ml(1234).unwrap();
    store.set_ticks_per_ml(42).unwrap();
    drop(store);

    let mut reopened = FileRatioStore::new(&path);
    assert_eq!(reopened.steps_per_ml().unwrap(), 1234);
    assert_eq!(reopened.ticks_per_ml().unwrap(), 42);
}

#[test]
fn unchanged_value_does_not_rewrite_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ratios.toml");
    let mut store = FileRatioStore::new(&path);
    store.set_steps_per_ml(10).unwrap();

    // Replace the file behind the store's back; an unchanged write must not touch it.
    fs::write(&path, "sentinel").unwrap();
    store.set_steps_per_ml(10).unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), "sentinel");
}

#[test]
fn failed_write_keeps_old_value_and_retries() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ratios.toml");
    let mut store = FileRatioStore::new(&path);
    store.set_steps_per_ml(10).unwrap();

    // A directory where the temp file goes makes the next write fail.
    let blocker = path.with_extension("new");
    fs::create_dir(&blocker).unwrap();
    assert!(store.set_steps_per_ml(20).is_err());
    assert_eq!(store.steps_per_ml().unwrap(), 10);

    fs::remove_dir(&blocker).unwrap();
    store.set_steps_per_ml(20).unwrap();
    assert_eq!(FileRatioStore::new(&path).steps_per_ml().unwrap(), 20);
}

#[test]
fn foreign_version_is_reset() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ratios.toml");
    fs::write(&path, "version = 99\nsteps_per_ml = 7\nticks_per_ml = 7\n").unwrap();

    let mut store = FileRatioStore::new(&path);
    assert_eq!(store.ratios().unwrap(), PersistedRatios::default());
}

#[test]
fn corrupt_file_is_an_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ratios.toml");
    fs::write(&path, "not = [valid").unwrap();

    let mut store = FileRatioStore::new(&path);
    let err = store.steps_per_ml().expect_err("corrupt store");
    assert!(format!("{err}").contains("parse ratio store"));
}

#[test]
fn memory_store_counts_effective_writes() {
    let mut store = MemoryRatioStore::new(100, 0);
    store.set_steps_per_ml(100).unwrap();
    store.set_ticks_per_ml(5).unwrap();
    assert_eq!(store.writes, 1);
    assert_eq!(store.ticks_per_ml().unwrap(), 5);
}
