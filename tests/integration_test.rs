use bspatch::testing::{blocky_patch, build_patch, noise};
use bspatch::{patch_bytes, Error, PatchOptions};
use std::fs;
use std::path::Path;
use std::process::{Command, Output};

fn bspatch(args: &[&Path]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_bspatch"))
        .args(args)
        .output()
        .expect("Failed to run bspatch")
}

fn apply_cli(old: &Path, patch: &Path, new: &Path, extra: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_bspatch"))
        .arg("apply")
        .args([old, patch, new])
        .args(extra)
        .output()
        .expect("Failed to run bspatch apply")
}

fn assert_success(output: &Output) {
    assert!(
        output.status.success(),
        "bspatch failed:\nstdout: {}\nstderr: {}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

fn assert_failure(output: &Output) -> String {
    assert_eq!(output.status.code(), Some(1), "bspatch should have failed");
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn test_end_to_end_cli_apply() {
    let temp = tempfile::tempdir().unwrap();
    let old_file = temp.path().join("app-1.0.bin");
    let new_file = temp.path().join("app-1.1.bin");
    let patch_file = temp.path().join("update.bsdiff");

    let old = noise(64 * 1024, 1);
    let mut new = old.clone();
    for i in (0..new.len()).step_by(997) {
        new[i] = new[i].wrapping_add(3);
    }
    new.extend_from_slice(b"appended in version 1.1");

    fs::write(&old_file, &old).unwrap();
    fs::write(&patch_file, blocky_patch(&old, &new, 4096)).unwrap();

    let output = apply_cli(&old_file, &patch_file, &new_file, &[]);
    assert_success(&output);
    assert_eq!(fs::read(&new_file).unwrap(), new);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Patch applied successfully!"), "{stdout}");
    assert!(stdout.contains(&blake3::hash(&new).to_hex().to_string()), "{stdout}");
}

#[test]
fn test_cli_documented_scenarios() {
    let temp = tempfile::tempdir().unwrap();
    let d = temp.path();

    fs::write(d.join("a.old"), b"AAAA").unwrap();
    fs::write(d.join("a.patch"), build_patch(&[(4, 0, 0)], &[1, 1, 1, 1], b"", 4)).unwrap();
    assert_success(&apply_cli(&d.join("a.old"), &d.join("a.patch"), &d.join("a.new"), &[]));
    assert_eq!(fs::read(d.join("a.new")).unwrap(), b"BBBB");

    fs::write(d.join("b.old"), b"").unwrap();
    fs::write(d.join("b.patch"), build_patch(&[(0, 5, 0)], b"", b"hello", 5)).unwrap();
    assert_success(&apply_cli(&d.join("b.old"), &d.join("b.patch"), &d.join("b.new"), &[]));
    assert_eq!(fs::read(d.join("b.new")).unwrap(), b"hello");
}

#[test]
fn test_cli_rejects_bad_patches_without_output() {
    let temp = tempfile::tempdir().unwrap();
    let d = temp.path();
    fs::write(d.join("old"), b"AAAA").unwrap();

    let cases: Vec<(&str, Vec<u8>)> = vec![
        ("short", b"BSDIFF40".to_vec()),
        ("magic", {
            let mut p = build_patch(&[(4, 0, 0)], &[1; 4], b"", 4);
            p[7] = b'1';
            p
        }),
        ("negative", build_patch(&[(4, 0, 0)], &[1; 4], b"", -4)),
        ("overrun", build_patch(&[(4, 1, 0)], &[1; 4], b"x", 4)),
        ("seek", build_patch(&[(2, 0, -3), (2, 0, 0)], &[1; 4], b"", 4)),
        ("truncated", {
            let p = build_patch(&[(4, 0, 0)], &[1; 4], b"", 4);
            p[..40].to_vec()
        }),
    ];

    for (name, patch) in cases {
        let patch_path = d.join(format!("{name}.patch"));
        let new_path = d.join(format!("{name}.new"));
        fs::write(&patch_path, patch).unwrap();

        let stderr = assert_failure(&apply_cli(&d.join("old"), &patch_path, &new_path, &[]));
        let message = stderr
            .lines()
            .find_map(|l| l.strip_prefix("Patch failed: "))
            .unwrap_or_else(|| panic!("{name}: no failure line in {stderr}"));
        assert!(message.len() <= bspatch::MAX_MESSAGE_LEN, "{name}: {message}");
        assert!(!new_path.exists(), "{name}: output must not be written");
    }
}

#[test]
fn test_cli_missing_old_file() {
    let temp = tempfile::tempdir().unwrap();
    let d = temp.path();
    fs::write(d.join("patch"), build_patch(&[(0, 1, 0)], b"", b"x", 1)).unwrap();

    let stderr = assert_failure(&apply_cli(&d.join("nope"), &d.join("patch"), &d.join("new"), &[]));
    assert!(stderr.contains("I/O error"), "{stderr}");
    assert!(!d.join("new").exists());
}

#[test]
fn test_cli_expect_blake3() {
    let temp = tempfile::tempdir().unwrap();
    let d = temp.path();
    fs::write(d.join("old"), b"").unwrap();
    fs::write(d.join("patch"), build_patch(&[(0, 5, 0)], b"", b"hello", 5)).unwrap();

    let good = blake3::hash(b"hello").to_hex().to_string();
    let output = apply_cli(&d.join("old"), &d.join("patch"), &d.join("good"), &["--expect-blake3", &good]);
    assert_success(&output);

    let bad = blake3::hash(b"jello").to_hex().to_string();
    let output = apply_cli(&d.join("old"), &d.join("patch"), &d.join("bad"), &["--expect-blake3", &bad]);
    let stderr = assert_failure(&output);
    assert!(stderr.contains("Hash mismatch"), "{stderr}");
    assert!(!d.join("bad").exists());
}

#[test]
fn test_cli_compact_offsets() {
    let temp = tempfile::tempdir().unwrap();
    let d = temp.path();
    fs::write(d.join("old"), b"").unwrap();
    // declares 2^31 bytes of output but would fail later anyway; the compact
    // profile must reject it at the header
    fs::write(d.join("patch"), build_patch(&[], b"", b"", 0x8000_0000)).unwrap();

    let stderr = assert_failure(&apply_cli(
        &d.join("old"),
        &d.join("patch"),
        &d.join("new"),
        &["--compact-offsets"],
    ));
    assert!(stderr.contains("Bad length in new size"), "{stderr}");
}

#[test]
fn test_cli_max_size() {
    let temp = tempfile::tempdir().unwrap();
    let d = temp.path();
    fs::write(d.join("old"), b"").unwrap();
    fs::write(d.join("patch"), build_patch(&[(0, 5, 0)], b"", b"hello", 5)).unwrap();

    assert_failure(&apply_cli(&d.join("old"), &d.join("patch"), &d.join("new"), &["--max-size", "4"]));
    assert_success(&apply_cli(&d.join("old"), &d.join("patch"), &d.join("new"), &["--max-size", "5"]));
}

#[test]
fn test_cli_batch_json_summary() {
    let temp = tempfile::tempdir().unwrap();
    let d = temp.path();

    let mut jobs = Vec::new();
    for i in 0..4u64 {
        let old = noise(10_000, i);
        let new = noise(12_000, i + 100);
        fs::write(d.join(format!("{i}.old")), &old).unwrap();
        fs::write(d.join(format!("{i}.patch")), blocky_patch(&old, &new, 1000)).unwrap();
        jobs.push(serde_json::json!({
            "old": format!("{i}.old"),
            "patch": format!("{i}.patch"),
            "new": format!("{i}.new"),
        }));
    }
    jobs.push(serde_json::json!({"old": "0.old", "patch": "missing.patch", "new": "missing.new"}));
    let manifest = d.join("jobs.json");
    fs::write(&manifest, serde_json::json!({ "jobs": jobs }).to_string()).unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_bspatch"))
        .arg("batch")
        .arg(&manifest)
        .args(["--jobs", "2", "--json"])
        .output()
        .expect("Failed to run bspatch batch");
    assert_eq!(output.status.code(), Some(1));

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["applied"], 4);
    assert_eq!(summary["failed"], 1);
    assert_eq!(summary["outcomes"][4]["result"]["status"], "failed");
    assert_eq!(summary["outcomes"][4]["result"]["retryable"], true);

    for i in 0..4u64 {
        assert_eq!(fs::read(d.join(format!("{i}.new"))).unwrap(), noise(12_000, i + 100));
    }
}

#[test]
fn test_cli_usage_error() {
    let output = bspatch(&[Path::new("apply"), Path::new("only-one-arg")]);
    assert!(!output.status.success());
}

#[test]
fn test_round_trip_and_determinism() {
    for (seed, old_len, new_len, block) in [
        (1, 0, 500, 64),
        (2, 500, 0, 64),
        (3, 1000, 1000, 1),
        (4, 4096, 3000, 100),
        (5, 3000, 9000, 777),
        (6, 100_000, 100_500, 8192),
    ] {
        let old = noise(old_len, seed);
        let new = noise(new_len, seed + 1000);
        let patch = blocky_patch(&old, &new, block);

        let first = patch_bytes(&old, &patch, &PatchOptions::new()).unwrap();
        assert_eq!(first, new, "seed {seed}");
        let second = patch_bytes(&old, &patch, &PatchOptions::new()).unwrap();
        assert_eq!(first, second, "seed {seed}");
    }
}

#[test]
fn test_old_file_shorter_than_add_runs() {
    // add runs extend past the old data; those positions take raw diff bytes
    // and the seek brings the old cursor back to the old end
    let patch = build_patch(&[(6, 0, -3)], &[1, 1, 1, 7, 8, 9], b"", 6);
    let new = patch_bytes(b"abc", &patch, &PatchOptions::new()).unwrap();
    assert_eq!(new, [b'b', b'c', b'd', 7, 8, 9]);

    let uncorrected = build_patch(&[(6, 0, 0)], &[1, 1, 1, 7, 8, 9], b"", 6);
    assert!(matches!(
        patch_bytes(b"abc", &uncorrected, &PatchOptions::new()),
        Err(Error::CorruptPatch(_))
    ));
}

#[test]
fn test_seek_bounds_via_library() {
    let under = build_patch(&[(1, 0, -2), (1, 0, 0)], &[0, 0], b"", 2);
    assert!(matches!(
        patch_bytes(b"ab", &under, &PatchOptions::new()),
        Err(Error::CorruptPatch(_))
    ));
    let over = build_patch(&[(1, 0, 2), (1, 0, 0)], &[0, 0], b"", 2);
    assert!(matches!(
        patch_bytes(b"ab", &over, &PatchOptions::new()),
        Err(Error::CorruptPatch(_))
    ));
}

#[test]
fn test_cli_verbose_logs_info() {
    let temp = tempfile::tempdir().unwrap();
    let d = temp.path();
    fs::write(d.join("old"), b"AAAA").unwrap();
    fs::write(d.join("patch"), build_patch(&[(4, 0, 0)], &[1; 4], b"", 4)).unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_bspatch"))
        .args(["-vv", "apply"])
        .args([d.join("old"), d.join("patch"), d.join("new")])
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to run bspatch apply");
    assert_success(&output);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Patched"), "{stderr}");
    assert!(stderr.contains("new size 4"), "{stderr}");

    let output = Command::new(env!("CARGO_BIN_EXE_bspatch"))
        .arg("apply")
        .args([d.join("old"), d.join("patch"), d.join("quiet")])
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to run bspatch apply");
    assert_success(&output);
    assert!(!String::from_utf8_lossy(&output.stderr).contains("Patched"));
}
