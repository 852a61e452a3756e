use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::tempdir;

fn cmd(data_dir: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("pagestash").unwrap();
    cmd.env("PAGESTASH_DATA_DIR", data_dir);
    cmd
}

fn save_page(data_dir: &std::path::Path, title: &str, url: &str, text: &str) -> String {
    let output = cmd(data_dir)
        .args([
            "--json", "save", "--title", title, "--url", url, "--text", text,
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let parsed: Value = serde_json::from_slice(&output).unwrap();
    parsed["id"].as_str().unwrap().to_string()
}

#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("pagestash").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"));
}

#[test]
fn test_cli_version() {
    let mut cmd = Command::cargo_bin("pagestash").unwrap();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_save_then_search_finds_keyword_match() {
    let dir = tempdir().unwrap();
    save_page(
        dir.path(),
        "Pasta night",
        "https://food.example/pasta",
        "a recipe for pasta carbonara",
    );
    save_page(
        dir.path(),
        "ML intro",
        "https://ml.example/intro",
        "an introduction to machine learning",
    );

    let output = cmd(dir.path())
        .args(["--json", "search", "pasta"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let results: Value = serde_json::from_slice(&output).unwrap();
    let rows = results.as_array().unwrap();
    assert!(!rows.is_empty());
    assert_eq!(rows[0]["title"], "Pasta night");
    assert_eq!(rows[0]["lexical_hit"], true);
    assert!(rows[0]["score"].as_f64().unwrap() >= 1.0);
}

#[test]
fn test_short_query_lists_everything() {
    let dir = tempdir().unwrap();
    save_page(dir.path(), "One", "https://one.example", "first page body");
    save_page(dir.path(), "Two", "https://two.example", "second page body");

    let output = cmd(dir.path())
        .args(["--json", "search", "ab", "--limit", "10"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let results: Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(results.as_array().unwrap().len(), 2);
}

#[test]
fn test_list_shows_saved_items() {
    let dir = tempdir().unwrap();
    save_page(dir.path(), "Kept page", "https://kept.example", "body text");

    cmd(dir.path())
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("Kept page"));
}

#[test]
fn test_save_post_keeps_attribution() {
    let dir = tempdir().unwrap();
    cmd(dir.path())
        .args([
            "save",
            "--title",
            "Post by Ada",
            "--url",
            "https://x.example/1",
            "--text",
            "engines can compute",
            "--post",
            "--author",
            "Ada L",
            "--handle",
            "@ada",
        ])
        .assert()
        .success();

    let output = cmd(dir.path())
        .args(["--json", "list"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let docs: Value = serde_json::from_slice(&output).unwrap();
    let doc = &docs.as_array().unwrap()[0];
    assert_eq!(doc["kind"], "post");
    assert_eq!(doc["author_handle"], "@ada");
}

#[test]
fn test_delete_removes_item() {
    let dir = tempdir().unwrap();
    let id = save_page(dir.path(), "Doomed", "https://doomed.example", "body");

    cmd(dir.path()).args(["delete", &id]).assert().success();

    let output = cmd(dir.path())
        .args(["--json", "list"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let docs: Value = serde_json::from_slice(&output).unwrap();
    assert!(docs.as_array().unwrap().is_empty());
}

#[test]
fn test_delete_unknown_id_fails() {
    let dir = tempdir().unwrap();
    cmd(dir.path())
        .args(["delete", "no-such-id"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_clear_requires_confirmation() {
    let dir = tempdir().unwrap();
    save_page(dir.path(), "Kept", "https://kept.example", "body");

    cmd(dir.path()).arg("clear").assert().failure();

    cmd(dir.path()).args(["clear", "--yes"]).assert().success();

    let output = cmd(dir.path())
        .args(["--json", "list"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let docs: Value = serde_json::from_slice(&output).unwrap();
    assert!(docs.as_array().unwrap().is_empty());
}

#[test]
fn test_reindex_reports_count() {
    let dir = tempdir().unwrap();
    save_page(dir.path(), "One", "https://one.example", "first page body");
    save_page(dir.path(), "Two", "https://two.example", "second page body");

    let output = cmd(dir.path())
        .args(["--json", "reindex"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let parsed: Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(parsed["reindexed"], 2);
}

#[test]
fn test_watch_mode_debounces_rapid_queries() {
    let dir = tempdir().unwrap();
    save_page(
        dir.path(),
        "Pasta night",
        "https://food.example/pasta",
        "a recipe for pasta carbonara",
    );
    save_page(
        dir.path(),
        "ML intro",
        "https://ml.example/intro",
        "an introduction to machine learning",
    );

    // Two queries land within the quiet period; only the later one runs
    let output = cmd(dir.path())
        .args(["search", "--watch"])
        .write_stdin("pasta\nmachine\n")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let stdout = String::from_utf8(output).unwrap();
    assert!(stdout.contains("ML intro"));
    assert!(!stdout.contains("Pasta night"));
}

#[test]
fn test_unknown_backend_is_a_config_error() {
    let dir = tempdir().unwrap();
    cmd(dir.path())
        .env("PAGESTASH_BACKEND", "quantum")
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown embedding backend"));
}
