//! End-to-end tests for the `datashelf` binary: exit codes, outputs and
//! on-disk effects.

use std::collections::HashMap;
use std::fs;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::thread;

use assert_cmd::Command;
use datashelf::checksum::checksum_bytes;
use serde_json::json;
use tempfile::TempDir;

/// Variables that would leak the caller's environment into a run.
const SCRUBBED_VARS: &[&str] = &[
    "HTTP_PROXY",
    "http_proxy",
    "ALL_PROXY",
    "all_proxy",
    "CLOUDFLARE_R2_ENDPOINT_URL",
    "CLOUDFLARE_R2_ENDPOINT",
    "CLOUDFLARE_R2_ACCESS_KEY_ID",
    "CLOUDFLARE_R2_SECRET_ACCESS_KEY",
    "CLOUDFLARE_R2_BUCKET_NAME",
    "CLOUDFLARE_R2_PUBLIC_URL",
];

/// Scratch workspace with its own config file and datasets dir.
struct Workspace {
    temp: TempDir,
}

impl Workspace {
    fn new(config: &str) -> Self {
        let temp = TempDir::new().expect("temp dir");
        fs::write(temp.path().join("config.ini"), config).expect("write config");
        fs::create_dir_all(temp.path().join("datasets")).expect("datasets dir");
        Self { temp }
    }

    fn path(&self) -> &Path {
        self.temp.path()
    }

    fn datasets(&self) -> PathBuf {
        self.path().join("datasets")
    }

    fn write(&self, rel: &str, data: &[u8]) {
        let path = self.datasets().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, data).unwrap();
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("datashelf"));
        cmd.current_dir(self.path())
            .arg("--config")
            .arg(self.path().join("config.ini"))
            .arg("--datasets-dir")
            .arg(self.datasets())
            .env_remove("RUST_LOG");
        for var in SCRUBBED_VARS {
            cmd.env_remove(var);
        }
        cmd
    }
}

fn combined_output(output: &std::process::Output) -> String {
    format!(
        "{}\n{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    )
}

/// Serve fixed bodies by path over HTTP/1.1 for `requests` connections.
fn serve(bodies: HashMap<String, Vec<u8>>, requests: usize) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().unwrap();
    thread::spawn(move || {
        for stream in listener.incoming().take(requests) {
            let mut stream = stream.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let text = String::from_utf8_lossy(&request);
            let path = text.split_whitespace().nth(1).unwrap_or("/").to_string();
            let response = match bodies.get(&path) {
                Some(body) => {
                    let mut r = format!(
                        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                        body.len()
                    )
                    .into_bytes();
                    r.extend_from_slice(body);
                    r
                }
                None => b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                    .to_vec(),
            };
            let _ = stream.write_all(&response);
        }
    });
    format!("http://{}", addr)
}

fn presigned_manifest(path: &Path, files: &[(&str, &[u8], String)]) {
    let entries: Vec<_> = files
        .iter()
        .map(|(rel, data, url)| {
            json!({
                "local_path": rel,
                "r2_key": format!("toyset/{}", rel),
                "size_bytes": data.len(),
                "sha256": checksum_bytes(data),
                "presigned_url": url,
            })
        })
        .collect();
    let payload = json!({
        "dataset": "toyset",
        "generated_at": "2025-01-01T00:00:00+00:00",
        "expires_in": 3600,
        "expires_at": "2025-01-01T01:00:00+00:00",
        "files": entries,
    });
    fs::write(path, serde_json::to_vec_pretty(&payload).unwrap()).unwrap();
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn test_help_lists_subcommands() {
    let output = Command::new(assert_cmd::cargo::cargo_bin!("datashelf"))
        .arg("--help")
        .output()
        .expect("--help runs");

    assert!(output.status.success());
    let text = combined_output(&output);
    for name in ["build", "presign", "download", "resume-point", "upload", "list"] {
        assert!(text.contains(name), "help text missing {name}: {text}");
    }
}

#[test]
fn test_build_then_list() {
    let ws = Workspace::new("");
    ws.write("toyset/images/a.jpg", b"\x89jpg");
    ws.write("toyset/labels/a.txt", b"0 0.5 0.5 1 1");

    let output = ws.cmd().args(["build", "--hash"]).output().unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));

    let manifest: serde_json::Value =
        serde_json::from_slice(&fs::read(ws.datasets().join("manifests/toyset.json")).unwrap())
            .unwrap();
    assert_eq!(manifest["hashed"], true);
    assert_eq!(manifest["files"][0]["r2_key"], "toyset/images/a.jpg");
    assert!(ws.datasets().join("manifests/toyset.media.jsonl").exists());
    assert!(ws.datasets().join("manifests/index.json").exists());

    let output = ws.cmd().arg("list").output().unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("toyset"));
}

#[test]
fn test_download_missing_manifest_exits_1() {
    let ws = Workspace::new("");
    let output = ws
        .cmd()
        .args(["download", "--manifest", "nope.json"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_download_verifies_and_places_files() {
    let ws = Workspace::new("");
    let base = serve(
        HashMap::from([("/toyset/images/a.jpg".to_string(), b"\x89jpg".to_vec())]),
        1,
    );
    let manifest = ws.path().join("toyset.public.json");
    presigned_manifest(
        &manifest,
        &[("images/a.jpg", b"\x89jpg", format!("{}/toyset/images/a.jpg", base))],
    );
    let out_dir = ws.path().join("out");

    let output = ws
        .cmd()
        .arg("download")
        .arg("--manifest")
        .arg(&manifest)
        .arg("--output-dir")
        .arg(&out_dir)
        .output()
        .unwrap();

    assert!(output.status.success(), "{}", combined_output(&output));
    assert_eq!(fs::read(out_dir.join("toyset/images/a.jpg")).unwrap(), b"\x89jpg");
    assert!(String::from_utf8_lossy(&output.stdout).contains("1 files downloaded"));
}

#[test]
fn test_download_checksum_mismatch_exits_2() {
    let ws = Workspace::new("");
    let base = serve(
        HashMap::from([("/toyset/a.txt".to_string(), b"tampered".to_vec())]),
        1,
    );
    let manifest = ws.path().join("toyset.public.json");
    presigned_manifest(
        &manifest,
        &[("a.txt", b"original", format!("{}/toyset/a.txt", base))],
    );
    let out_dir = ws.path().join("out");

    let output = ws
        .cmd()
        .arg("download")
        .arg("--manifest")
        .arg(&manifest)
        .arg("--output-dir")
        .arg(&out_dir)
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2), "{}", combined_output(&output));
    assert!(!out_dir.join("toyset/a.txt").exists());
    let partials = fs::read_dir(out_dir.join("toyset"))
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().ends_with(".part"))
        .count();
    assert_eq!(partials, 0);
}

#[test]
fn test_download_transport_failure_exits_3_and_logs() {
    let ws = Workspace::new("[transfer]\ntimeout_secs = 5\n");
    let base = serve(
        HashMap::from([("/toyset/a.txt".to_string(), b"alpha".to_vec())]),
        2,
    );
    let manifest = ws.path().join("toyset.public.json");
    presigned_manifest(
        &manifest,
        &[
            ("a.txt", b"alpha", format!("{}/toyset/a.txt", base)),
            ("b.txt", b"bravo", format!("{}/toyset/b.txt", base)),
        ],
    );
    let out_dir = ws.path().join("out");

    let output = ws
        .cmd()
        .arg("download")
        .arg("--manifest")
        .arg(&manifest)
        .arg("--output-dir")
        .arg(&out_dir)
        .args(["--concurrency", "1"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(3), "{}", combined_output(&output));
    assert!(out_dir.join("toyset/a.txt").exists());
    let log = fs::read_to_string(out_dir.join("failed_downloads.log")).unwrap();
    assert_eq!(log.lines().count(), 1);
    assert!(log.starts_with("FAILED: toyset/b.txt - "));
}

#[test]
fn test_resume_point_reports_first_missing_entry() {
    let ws = Workspace::new("");
    let manifest = ws.path().join("toyset.public.json");
    presigned_manifest(
        &manifest,
        &[
            ("a.txt", b"alpha", "http://127.0.0.1:9/a".to_string()),
            ("b.txt", b"bravo", "http://127.0.0.1:9/b".to_string()),
        ],
    );
    let out_dir = ws.path().join("out");
    fs::create_dir_all(out_dir.join("toyset")).unwrap();
    fs::write(out_dir.join("toyset/a.txt"), b"alpha").unwrap();

    let output = ws
        .cmd()
        .arg("resume-point")
        .arg("--manifest")
        .arg(&manifest)
        .arg("--output-dir")
        .arg(&out_dir)
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Resume point: 1"), "{stdout}");
    assert!(stdout.contains("--start-from 1"));
}

#[test]
fn test_presign_without_store_config_exits_4() {
    let ws = Workspace::new("");
    ws.write("toyset/a.txt", b"alpha");
    assert!(ws.cmd().arg("build").output().unwrap().status.success());

    let output = ws
        .cmd()
        .args(["presign", "--dataset", "toyset"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4), "{}", combined_output(&output));
}

#[test]
fn test_presign_with_public_url() {
    let ws = Workspace::new("[storage]\npublic_url = https://pub.example.com/\n");
    ws.write("toyset/images/a.jpg", b"\x89jpg");
    assert!(ws.cmd().arg("build").output().unwrap().status.success());

    let output = ws
        .cmd()
        .args(["presign", "--dataset", "toyset", "--bundle", "all"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));

    let presigned_dir = ws.datasets().join("manifests/presigned");
    let payload: serde_json::Value =
        serde_json::from_slice(&fs::read(presigned_dir.join("toyset.public.json")).unwrap())
            .unwrap();
    assert_eq!(
        payload["files"][0]["presigned_url"],
        "https://pub.example.com/toyset/images/a.jpg"
    );
    assert_eq!(payload["files"][0]["dataset"], "toyset");
    assert!(presigned_dir.join("all.public.json").exists());
}

#[test]
fn test_missing_config_file_exits_4() {
    let ws = Workspace::new("");
    let output = Command::new(assert_cmd::cargo::cargo_bin!("datashelf"))
        .current_dir(ws.path())
        .args(["--config", "does-not-exist.ini", "list"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));
}

#[test]
fn test_download_dataset_with_only_public_url() {
    let base = serve(
        HashMap::from([("/toyset/images/a.jpg".to_string(), b"\x89jpg".to_vec())]),
        1,
    );
    let ws = Workspace::new(&format!("[storage]\npublic_url = {}/\n", base));
    ws.write("toyset/images/a.jpg", b"\x89jpg");
    let built = ws.cmd().args(["build", "--hash"]).output().unwrap();
    assert!(built.status.success(), "{}", combined_output(&built));
    let out_dir = ws.path().join("out");

    let output = ws
        .cmd()
        .args(["download", "--dataset", "toyset", "--output-dir"])
        .arg(&out_dir)
        .output()
        .unwrap();

    assert!(output.status.success(), "{}", combined_output(&output));
    assert_eq!(fs::read(out_dir.join("toyset/images/a.jpg")).unwrap(), b"\x89jpg");
}

#[test]
fn test_download_all_fetches_every_dataset() {
    let base = serve(
        HashMap::from([
            ("/toyset/a.txt".to_string(), b"alpha".to_vec()),
            ("/otherset/b.txt".to_string(), b"bravo".to_vec()),
        ]),
        2,
    );
    let ws = Workspace::new(&format!("[storage]\npublic_url = {}\n", base));
    ws.write("toyset/a.txt", b"alpha");
    ws.write("otherset/b.txt", b"bravo");
    let built = ws.cmd().args(["build", "--hash"]).output().unwrap();
    assert!(built.status.success(), "{}", combined_output(&built));
    let out_dir = ws.path().join("out");

    let output = ws
        .cmd()
        .args(["download", "--all", "--output-dir"])
        .arg(&out_dir)
        .output()
        .unwrap();

    assert!(output.status.success(), "{}", combined_output(&output));
    assert_eq!(fs::read(out_dir.join("toyset/a.txt")).unwrap(), b"alpha");
    assert_eq!(fs::read(out_dir.join("otherset/b.txt")).unwrap(), b"bravo");
    assert!(String::from_utf8_lossy(&output.stdout).contains("2 files downloaded"));
}

#[test]
fn test_download_all_failure_in_one_dataset_exits_3() {
    let base = serve(
        HashMap::from([("/toyset/a.txt".to_string(), b"alpha".to_vec())]),
        2,
    );
    let ws = Workspace::new(&format!(
        "[storage]\npublic_url = {}\n[transfer]\ntimeout_secs = 5\n",
        base
    ));
    ws.write("toyset/a.txt", b"alpha");
    ws.write("otherset/b.txt", b"bravo");
    let built = ws.cmd().args(["build", "--hash"]).output().unwrap();
    assert!(built.status.success(), "{}", combined_output(&built));
    let out_dir = ws.path().join("out");

    let output = ws
        .cmd()
        .args(["download", "--all", "--output-dir"])
        .arg(&out_dir)
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(3), "{}", combined_output(&output));
    assert!(out_dir.join("toyset/a.txt").exists());
    let log = fs::read_to_string(out_dir.join("failed_downloads.log")).unwrap();
    assert_eq!(log.lines().count(), 1);
    assert!(log.starts_with("FAILED: otherset/b.txt - "));
}
