use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn write(root: &Path, relative: &str, body: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, body).unwrap();
}

fn prism_feed(config_dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("prism-feed").expect("binary built");
    cmd.arg("--config")
        .arg(config_dir.join("absent.yaml"))
        .env("PRISM_FEED_LOADER__FETCH_DELAY", "0s")
        .env("PRISM_FEED_LOADER__RETRY_DELAY", "0s");
    cmd
}

#[test]
fn prints_version() {
    Command::cargo_bin("prism-feed")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn prints_help() {
    Command::cargo_bin("prism-feed")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("generate"))
        .stdout(predicate::str::contains("feed"));
}

#[test]
fn generate_fails_without_content_root() {
    let dir = tempdir().unwrap();
    prism_feed(dir.path())
        .arg("--source")
        .arg(dir.path())
        .arg("generate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn generate_then_render_feed() {
    let dir = tempdir().unwrap();
    let site = dir.path().join("public");
    write(
        &site,
        "en-US/Posts/Fanny/FantasticDay.json",
        r#"{"Name": "FantasticDay", "Poster": "Fanny", "Body": "What a day @yharim", "Priority": 2}"#,
    );
    write(
        &site,
        "en-US/Profiles/Fanny.json",
        r#"{"DisplayName": "Fanny", "AccountName": "fanny01"}"#,
    );

    prism_feed(dir.path())
        .arg("--source")
        .arg(&site)
        .arg("generate")
        .assert()
        .success()
        .stdout(predicate::str::contains("1 posts"));
    assert!(site.join("file-manifest.json").exists());

    prism_feed(dir.path())
        .arg("--source")
        .arg(&site)
        .args(["feed", "--seed", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Fanny @fanny01"))
        .stdout(predicate::str::contains("[@yharim]"))
        .stdout(predicate::str::contains("No comments yet"))
        .stdout(predicate::str::contains("Page 1/1"));
}

#[test]
fn feed_without_manifest_is_empty() {
    let dir = tempdir().unwrap();
    prism_feed(dir.path())
        .arg("--source")
        .arg(dir.path())
        .arg("feed")
        .assert()
        .success()
        .stdout(predicate::str::contains("No results"));
}

#[test]
fn feed_json_output_respects_search() {
    let dir = tempdir().unwrap();
    let site = dir.path().join("site");
    write(&site, "en-US/Posts/A/One.json", r#"{"Name": "One", "Poster": "A", "Body": "jungle trip"}"#);
    write(&site, "en-US/Posts/B/Two.json", r#"{"Name": "Two", "Poster": "B", "Body": "city lights"}"#);

    prism_feed(dir.path())
        .arg("--source")
        .arg(&site)
        .arg("generate")
        .assert()
        .success();

    let output = prism_feed(dir.path())
        .arg("--source")
        .arg(&site)
        .args(["feed", "--json", "--search", "JUNGLE"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let items: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let items = items.as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["name"], "One");
    assert_eq!(items[0]["handle"], "@A");
}

#[test]
fn feed_shows_first_image_candidate_found() {
    let dir = tempdir().unwrap();
    let site = dir.path().join("site");
    write(
        &site,
        "en-US/Posts/A/Dawn.json",
        r#"{"Name": "Dawn", "Poster": "A", "Body": "look", "Image": "Sunrise"}"#,
    );
    write(
        &site,
        "en-US/Posts/B/Dusk.json",
        r#"{"Name": "Dusk", "Poster": "B", "Body": "gone", "Image": "Missing"}"#,
    );
    write(&site, "Assets/Images/Sunrise.jpg", "jpeg bytes");
    write(&site, "Assets/Images/Sunrise.webp", "webp bytes");

    prism_feed(dir.path())
        .arg("--source")
        .arg(&site)
        .arg("generate")
        .assert()
        .success();

    prism_feed(dir.path())
        .arg("--source")
        .arg(&site)
        .arg("feed")
        .assert()
        .success()
        .stdout(predicate::str::contains("[image: /Assets/Images/Sunrise.jpg]"))
        .stdout(predicate::str::contains("Missing").not());
}

#[test]
fn watch_commits_first_run_before_exit() {
    let dir = tempdir().unwrap();
    let site = dir.path().join("site");
    write(&site, "en-US/Posts/A/One.json", r#"{"Name": "One", "Poster": "A", "Body": "hi"}"#);

    prism_feed(dir.path())
        .arg("--source")
        .arg(&site)
        .arg("generate")
        .assert()
        .success();

    prism_feed(dir.path())
        .arg("--source")
        .arg(&site)
        .args(["watch", "--seed", "3"])
        .write_stdin("")
        .assert()
        .success()
        .stdout(predicate::str::contains("[1] feed refreshed: 1 posts"))
        .stdout(predicate::str::contains("Last committed generation 1: 1 posts"));
}

#[test]
fn watch_without_manifest_reports_no_results() {
    let dir = tempdir().unwrap();
    prism_feed(dir.path())
        .arg("--source")
        .arg(dir.path())
        .arg("watch")
        .write_stdin("")
        .assert()
        .success()
        .stdout(predicate::str::contains("No results"));
}
