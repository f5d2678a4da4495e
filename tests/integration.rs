mod common;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn subs_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("subs");
    path
}

/// Temp root with a config pointing at `base_url`. Returns (tmp, config path).
fn setup_test_env(base_url: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[db]
path = "{root}/data/subs.sqlite"

[cache]
dir = "{root}/cache"

[api]
base_url = "{base_url}"
page_size = 2
timeout_secs = 5
token_env = "SUBS_TEST_TOKEN"
"#,
        root = root.display(),
        base_url = base_url,
    );

    let config_path = config_dir.join("subs.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_subs(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = subs_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env("SUBS_TEST_TOKEN", common::TOKEN)
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run subs binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn write_takeout(root: &Path, ids: &[&str]) -> PathBuf {
    let path = root.join("subscriptions.csv");
    let mut body = String::from("Channel Id,Channel Url,Channel Title\n");
    for id in ids {
        body.push_str(&format!("{id},http://www.youtube.com/channel/{id},{id}\n"));
    }
    fs::write(&path, body).unwrap();
    path
}

fn write_video(dir: &Path, id: &str, channel_id: &str) {
    fs::create_dir_all(dir).unwrap();
    let body = serde_json::json!({
        "id": id,
        "_type": "video",
        "title": format!("Video {}", id),
        "channel_id": channel_id,
        "duration": 61.5,
        "tags": ["Rust", "async"],
        "categories": ["Science & Technology"],
        "formats": [{"format_id": "140", "ext": "m4a"}, {"format_id": "137", "ext": "mp4"}],
        "requested_formats": [{"format_id": "137", "ext": "mp4"}]
    });
    fs::write(dir.join(format!("{}.info.json", id)), body.to_string()).unwrap();
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Runtime::new().unwrap()
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env("http://127.0.0.1:9");

    let (stdout, stderr, success) = run_subs(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/subs.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env("http://127.0.0.1:9");

    let (_, _, success1) = run_subs(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_subs(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_subs(&tmp.path().join("nope.toml"), &["stats"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"), "stderr: {}", stderr);
}

#[test]
fn test_stats_on_fresh_database() {
    let (_tmp, config_path) = setup_test_env("http://127.0.0.1:9");
    run_subs(&config_path, &["init"]);

    let (stdout, stderr, success) = run_subs(&config_path, &["stats"]);
    assert!(success, "stats failed: {}", stderr);
    assert!(stdout.contains("Channels:    0"));
    assert!(stdout.contains("Last import: never"));
}

#[test]
fn test_import_video_with_unknown_channel_is_rejected() {
    let (tmp, config_path) = setup_test_env("http://127.0.0.1:9");
    run_subs(&config_path, &["init"]);

    let videos = tmp.path().join("downloads");
    write_video(&videos, "vid1", "UCnobody");

    let (stdout, stderr, success) =
        run_subs(&config_path, &["import", "videos", videos.to_str().unwrap()]);
    assert!(success, "import failed: {}", stderr);
    assert!(stdout.contains("saved: 0"), "stdout: {}", stdout);
    assert!(stdout.contains("rejected: 1"), "stdout: {}", stdout);
    assert!(stderr.contains("missing channel"), "stderr: {}", stderr);
}

#[test]
fn test_takeout_sync_reports_missing_channels() {
    let rt = runtime();
    let (base_url, upstream) = rt.block_on(common::spawn(common::Upstream {
        missing: ["UCgone".to_string()].into_iter().collect(),
        ..Default::default()
    }));
    let (tmp, config_path) = setup_test_env(&base_url);
    let csv = write_takeout(tmp.path(), &["UCaaa", "UCgone", "UCbbb"]);

    let (stdout, stderr, success) =
        run_subs(&config_path, &["sync", "takeout", csv.to_str().unwrap()]);
    assert!(success, "sync failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("fetched: 2 of 3 requested"), "stdout: {}", stdout);
    assert!(stdout.contains("saved: 2"));
    assert!(stdout.contains("missing upstream: 1"));
    assert!(stdout.contains("ok"));

    // page_size = 2 → two lookups
    assert_eq!(
        *upstream.channel_id_params.lock().unwrap(),
        vec!["UCaaa,UCgone".to_string(), "UCbbb".to_string()]
    );
}

#[test]
fn test_sync_then_import_videos() {
    let rt = runtime();
    let (base_url, _upstream) = rt.block_on(common::spawn(common::Upstream::default()));
    let (tmp, config_path) = setup_test_env(&base_url);
    let csv = write_takeout(tmp.path(), &["UCaaa"]);

    let (_, stderr, success) = run_subs(&config_path, &["sync", "takeout", csv.to_str().unwrap()]);
    assert!(success, "sync failed: {}", stderr);

    let videos = tmp.path().join("downloads");
    write_video(&videos, "vid1", "UCaaa");
    write_video(&videos.join("nested"), "vid2", "UCaaa");
    fs::write(videos.join("playlist.info.json"), r#"{"id": "PL1", "_type": "playlist"}"#).unwrap();

    let (stdout, stderr, success) =
        run_subs(&config_path, &["import", "videos", videos.to_str().unwrap()]);
    assert!(success, "import failed: {}", stderr);
    assert!(stdout.contains("saved: 2"), "stdout: {}", stdout);
    assert!(stdout.contains("skipped: 1"), "stdout: {}", stdout);

    // Re-import updates in place
    let (stdout, _, _) = run_subs(&config_path, &["import", "videos", videos.to_str().unwrap()]);
    assert!(stdout.contains("saved: 2"));

    let (stdout, _, _) = run_subs(&config_path, &["stats"]);
    assert!(stdout.contains("Channels:    1 (0 incomplete)"), "stdout: {}", stdout);
    assert!(stdout.contains("Videos:      2 (0 incomplete)"), "stdout: {}", stdout);
    assert!(stdout.contains("Formats:     6"), "stdout: {}", stdout);
}

#[test]
fn test_cache_replays_and_refreshes() {
    let rt = runtime();
    let (base_url, upstream) = rt.block_on(common::spawn(common::Upstream::default()));
    let (tmp, config_path) = setup_test_env(&base_url);
    let csv = write_takeout(tmp.path(), &["UCaaa", "UCbbb", "UCccc"]);
    let csv = csv.to_str().unwrap();

    let (_, stderr, success) = run_subs(&config_path, &["sync", "takeout", csv]);
    assert!(success, "sync failed: {}", stderr);
    assert_eq!(upstream.channel_requests(), 2);
    assert!(tmp.path().join("cache").is_dir());

    // Everything served from the disk cache
    let (stdout, _, success) = run_subs(&config_path, &["sync", "takeout", csv]);
    assert!(success);
    assert!(stdout.contains("saved: 3"));
    assert_eq!(upstream.channel_requests(), 2);

    // Refresh ignores cached entries but still writes them
    run_subs(&config_path, &["sync", "takeout", csv, "--refresh-cache"]);
    assert_eq!(upstream.channel_requests(), 4);

    run_subs(&config_path, &["sync", "takeout", csv, "--no-cache"]);
    assert_eq!(upstream.channel_requests(), 6);

    run_subs(&config_path, &["sync", "takeout", csv]);
    assert_eq!(upstream.channel_requests(), 6);
}

#[test]
fn test_no_cache_leaves_no_cache_dir() {
    let rt = runtime();
    let (base_url, _upstream) = rt.block_on(common::spawn(common::Upstream::default()));
    let (tmp, config_path) = setup_test_env(&base_url);
    let csv = write_takeout(tmp.path(), &["UCaaa"]);

    let (_, stderr, success) =
        run_subs(&config_path, &["--no-cache", "sync", "takeout", csv.to_str().unwrap()]);
    assert!(success, "sync failed: {}", stderr);
    assert!(!tmp.path().join("cache").exists());
}

#[test]
fn test_sync_subscriptions_walks_every_page() {
    let rt = runtime();
    let (base_url, _upstream) = rt.block_on(common::spawn(common::Upstream {
        subscription_pages: vec![
            vec!["UCaaa".to_string(), "UCbbb".to_string()],
            vec!["UCccc".to_string()],
        ],
        ..Default::default()
    }));
    let (_tmp, config_path) = setup_test_env(&base_url);

    let (stdout, stderr, success) = run_subs(&config_path, &["sync", "subscriptions"]);
    assert!(success, "sync failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("fetched: 3 of 3 requested"), "stdout: {}", stdout);
    assert!(stdout.contains("saved: 3"));
}

#[test]
fn test_bad_token_aborts_sync() {
    let rt = runtime();
    let (base_url, _upstream) = rt.block_on(common::spawn(common::Upstream::default()));
    let (tmp, config_path) = setup_test_env(&base_url);
    let csv = write_takeout(tmp.path(), &["UCaaa"]);

    let output = Command::new(subs_binary())
        .arg("--config")
        .arg(&config_path)
        .args(["sync", "takeout", csv.to_str().unwrap()])
        .env("SUBS_TEST_TOKEN", "wrong")
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("401"), "stderr: {}", stderr);
}
