#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use assert_cmd::assert::Assert;
use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use filetime::FileTime;
use serde_json::Value;

/// `bead` with the cache rooted at `app_root` and no inherited overrides.
pub fn bead(app_root: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("bead");
    cmd.env("BEAD_APP_ROOT", app_root)
        .env_remove("BEAD_CACHE_ROOT")
        .env_remove("BEAD_RESULTS_CACHE_PATH")
        .env_remove("BEAD_RESULTS_CACHE_EXPIRY")
        .env("NO_COLOR", "1");
    cmd
}

pub fn cache_dir(app_root: &Path) -> PathBuf {
    app_root.join("cache").join("bead-resultscache")
}

pub fn parse_json(assert: &Assert) -> Value {
    serde_json::from_slice(&assert.get_output().stdout).expect("valid json")
}

pub fn stdout(assert: &Assert) -> String {
    String::from_utf8(assert.get_output().stdout.clone()).expect("utf-8 stdout")
}

/// A SQLite database with `rows` numbered rows in table `items`.
pub fn sample_db(dir: &Path, rows: usize) -> PathBuf {
    let path = dir.join("sample.db");
    let conn = rusqlite::Connection::open(&path).expect("open db");
    conn.execute_batch("CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT, price REAL);")
        .expect("create table");
    let mut insert = conn
        .prepare("INSERT INTO items (id, name, price) VALUES (?1, ?2, ?3)")
        .expect("prepare insert");
    for i in 0..rows {
        let id = i64::try_from(i).expect("small id");
        insert
            .execute(rusqlite::params![id, format!("item-{i}"), 1.5])
            .expect("insert row");
    }
    path
}

/// Push the access and modification times of every file of entry `id`
/// into the past.
pub fn age_entry(cache_dir: &Path, id: &str, by: Duration) {
    let at = FileTime::from_system_time(SystemTime::now() - by);
    let prefix = format!("resultscache-{id}.");
    for entry in std::fs::read_dir(cache_dir).expect("read cache dir") {
        let entry = entry.expect("dir entry");
        if entry.file_name().to_string_lossy().starts_with(&prefix) {
            filetime::set_file_times(entry.path(), at, at).expect("age file");
        }
    }
}
