use std::fs;
use std::time::Duration;

mod common;

use common::{age_entry, bead, cache_dir, parse_json, sample_db, stdout};

#[test]
fn cache_path_creates_directory_under_app_root() {
    let temp = tempfile::tempdir().expect("tempdir");

    let assert = bead(temp.path())
        .args(["--json", "cache", "path"])
        .assert()
        .success();
    let payload = parse_json(&assert);
    assert_eq!(payload["status"], "ok");
    let reported = payload["details"]["cache_path"].as_str().expect("path");
    assert!(
        reported.ends_with("bead-resultscache"),
        "unexpected cache path {reported}"
    );
    assert!(cache_dir(temp.path()).is_dir());
}

#[test]
fn app_root_flag_overrides_environment() {
    let temp = tempfile::tempdir().expect("tempdir");
    let other = temp.path().join("other");
    fs::create_dir_all(&other).expect("dirs");

    bead(temp.path())
        .args(["cache", "path", "--app-root"])
        .arg(&other)
        .assert()
        .success();
    assert!(cache_dir(&other).is_dir());
    assert!(!cache_dir(temp.path()).exists());
}

#[test]
fn ingest_show_list_and_drop_round_trip() {
    let temp = tempfile::tempdir().expect("tempdir");
    let db = sample_db(temp.path(), 25);

    let assert = bead(temp.path())
        .args(["--json", "cache", "ingest", "--id", "items", "--query"])
        .arg("SELECT id, name, price FROM items ORDER BY id")
        .arg("--db")
        .arg(&db)
        .assert()
        .success();
    let payload = parse_json(&assert);
    assert_eq!(payload["details"]["row_count"], 25);
    assert_eq!(payload["details"]["chunk_files"], 1);
    assert!(cache_dir(temp.path())
        .join("resultscache-items.meta")
        .is_file());

    let assert = bead(temp.path())
        .args(["--json", "cache", "show", "items", "--row", "24"])
        .assert()
        .success();
    let payload = parse_json(&assert);
    assert_eq!(
        payload["details"]["rows"][0],
        serde_json::json!({ "id": 24, "name": "item-24", "price": 1.5 })
    );

    let assert = bead(temp.path())
        .args(["--json", "cache", "show", "items", "--offset", "20"])
        .assert()
        .success();
    let payload = parse_json(&assert);
    assert_eq!(payload["details"]["rows"].as_array().map(Vec::len), Some(5));

    let assert = bead(temp.path())
        .args(["--json", "cache", "list"])
        .assert()
        .success();
    let payload = parse_json(&assert);
    assert_eq!(payload["details"]["entries"][0]["id"], "items");
    assert_eq!(payload["details"]["entries"][0]["row_count"], 25);

    bead(temp.path())
        .args(["cache", "drop", "items"])
        .assert()
        .success();
    assert!(!cache_dir(temp.path())
        .join("resultscache-items.meta")
        .exists());
}

#[test]
fn out_of_range_rows_exit_with_user_error() {
    let temp = tempfile::tempdir().expect("tempdir");
    let db = sample_db(temp.path(), 3);
    bead(temp.path())
        .args(["cache", "ingest", "--id", "small", "--query", "SELECT * FROM items"])
        .arg("--db")
        .arg(&db)
        .assert()
        .success();

    for index in ["-1", "3"] {
        let assert = bead(temp.path())
            .args(["--json", "cache", "show", "small", "--row", index])
            .assert()
            .code(1);
        let payload = parse_json(&assert);
        assert_eq!(payload["status"], "user-error");
        assert_eq!(payload["details"]["reason"], "out_of_range");
        assert_eq!(payload["details"]["code"], "BRC501");
    }
}

#[test]
fn duplicate_ids_are_rejected() {
    let temp = tempfile::tempdir().expect("tempdir");
    let db = sample_db(temp.path(), 2);
    let ingest = |id: &str| {
        bead(temp.path())
            .args(["--json", "cache", "ingest", "--query", "SELECT * FROM items", "--id", id])
            .arg("--db")
            .arg(&db)
            .assert()
    };
    ingest("dup").success();
    let assert = ingest("dup").code(1);
    let payload = parse_json(&assert);
    assert_eq!(payload["details"]["reason"], "id_in_use");
    assert!(payload["message"]
        .as_str()
        .is_some_and(|msg| msg.starts_with("bead cache ingest: ")));
}

#[test]
fn show_missing_entry_prints_hint() {
    let temp = tempfile::tempdir().expect("tempdir");
    let assert = bead(temp.path())
        .args(["cache", "show", "nope"])
        .assert()
        .code(1);
    let out = stdout(&assert);
    assert!(out.contains("bead cache show: "), "{out:?}");
    assert!(out.contains("Hint: run `bead cache list`"), "{out:?}");
}

#[test]
fn purge_removes_only_idle_entries() {
    let temp = tempfile::tempdir().expect("tempdir");
    let db = sample_db(temp.path(), 4);
    for id in ["busy", "idle"] {
        bead(temp.path())
            .args(["cache", "ingest", "--query", "SELECT * FROM items", "--id", id])
            .arg("--db")
            .arg(&db)
            .assert()
            .success();
    }
    let dir = cache_dir(temp.path());
    age_entry(&dir, "idle", Duration::from_secs(2 * 60 * 60));

    let assert = bead(temp.path())
        .args(["--json", "cache", "purge", "--dry-run"])
        .assert()
        .success();
    let payload = parse_json(&assert);
    assert_eq!(payload["details"]["status"], "dry-run");
    assert_eq!(payload["details"]["purged_ids"], serde_json::json!(["idle"]));
    assert!(dir.join("resultscache-idle.meta").exists());

    let assert = bead(temp.path())
        .args(["--json", "cache", "purge"])
        .assert()
        .success();
    let payload = parse_json(&assert);
    assert_eq!(payload["details"]["status"], "success");
    assert_eq!(payload["details"]["purged_entries"], 1);
    assert_eq!(payload["details"]["retained_entries"], 1);
    assert!(!dir.join("resultscache-idle.meta").exists());
    assert!(dir.join("resultscache-busy.meta").exists());
}

#[test]
fn purge_older_than_overrides_expiry() {
    let temp = tempfile::tempdir().expect("tempdir");
    let db = sample_db(temp.path(), 1);
    bead(temp.path())
        .args(["cache", "ingest", "--query", "SELECT * FROM items", "--id", "recent"])
        .arg("--db")
        .arg(&db)
        .assert()
        .success();
    age_entry(&cache_dir(temp.path()), "recent", Duration::from_secs(120));

    let assert = bead(temp.path())
        .args(["--json", "cache", "purge"])
        .assert()
        .success();
    assert_eq!(parse_json(&assert)["details"]["purged_entries"], 0);

    let assert = bead(temp.path())
        .args(["--json", "cache", "purge", "--older-than", "60"])
        .assert()
        .success();
    assert_eq!(parse_json(&assert)["details"]["purged_entries"], 1);
}

#[test]
fn stats_human_output_is_prefixed() {
    let temp = tempfile::tempdir().expect("tempdir");
    let assert = bead(temp.path())
        .args(["cache", "stats"])
        .assert()
        .success();
    let out = stdout(&assert);
    assert!(out.contains("bead cache stats: "), "{out:?}");
}

#[test]
fn quiet_suppresses_human_output() {
    let temp = tempfile::tempdir().expect("tempdir");
    let assert = bead(temp.path())
        .args(["-q", "cache", "stats"])
        .assert()
        .success();
    assert!(stdout(&assert).is_empty());
}

#[test]
fn quiet_still_reports_errors_on_stderr() {
    let temp = tempfile::tempdir().expect("tempdir");
    let assert = bead(temp.path())
        .args(["-q", "cache", "show", "nope"])
        .assert()
        .code(1);
    assert!(stdout(&assert).is_empty());
    let err = String::from_utf8(assert.get_output().stderr.clone()).expect("utf-8 stderr");
    assert!(err.contains("bead cache show: "), "{err:?}");
    assert!(err.contains("Hint: run `bead cache list`"), "{err:?}");
}

#[test]
fn drop_removes_an_entry_with_damaged_metadata() {
    let temp = tempfile::tempdir().expect("tempdir");
    let db = sample_db(temp.path(), 3);
    bead(temp.path())
        .args(["cache", "ingest", "--id", "damaged", "--query", "SELECT * FROM items"])
        .arg("--db")
        .arg(&db)
        .assert()
        .success();
    let meta = cache_dir(temp.path()).join("resultscache-damaged.meta");
    fs::write(&meta, b"not json").expect("damage metadata");

    let assert = bead(temp.path())
        .args(["--json", "cache", "show", "damaged"])
        .assert()
        .code(2);
    assert_eq!(parse_json(&assert)["details"]["reason"], "corrupt_metadata");

    let assert = bead(temp.path())
        .args(["--json", "cache", "drop", "damaged"])
        .assert()
        .success();
    assert_eq!(parse_json(&assert)["details"]["deleted_files"], 2);
    assert!(!meta.exists());
    assert!(!cache_dir(temp.path())
        .join("resultscache-damaged.0000.results")
        .exists());
}

#[test]
fn invalid_expiry_is_a_user_error() {
    let temp = tempfile::tempdir().expect("tempdir");
    let assert = bead(temp.path())
        .env("BEAD_RESULTS_CACHE_EXPIRY", "soon")
        .args(["--json", "cache", "stats"])
        .assert()
        .code(1);
    let payload = parse_json(&assert);
    assert_eq!(payload["details"]["reason"], "invalid_config");
}
