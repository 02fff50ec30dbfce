//! Integration tests for the binreg CLI.
//!
//! These tests run the built binary against registries packed from
//! temporary directory trees.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get a command for running binreg, isolated from any user config.
fn binreg(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("binreg").unwrap();
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join("xdg"))
        .env_remove("BINREG_CONFIG")
        .env_remove("BINREG_LOG");
    cmd
}

/// Source tree with three programs, two of them identical.
fn source_tree(root: &Path) {
    let triangle = root.join("dEQP-VK/api/smoke/triangle");
    fs::create_dir_all(&triangle).unwrap();
    fs::write(triangle.join("vert.spv"), b"\x03\x02\x23\x07vert").unwrap();
    fs::write(triangle.join("frag.spv"), b"\x03\x02\x23\x07frag").unwrap();

    let quad = root.join("dEQP-VK/api/smoke/quad");
    fs::create_dir_all(&quad).unwrap();
    fs::write(quad.join("vert.spv"), b"\x03\x02\x23\x07vert").unwrap();
}

struct Fixture {
    temp: TempDir,
}

impl Fixture {
    fn packed() -> Self {
        let temp = TempDir::new().unwrap();
        source_tree(&temp.path().join("src"));
        binreg(temp.path())
            .arg("pack")
            .arg(temp.path().join("src"))
            .arg(temp.path().join("out"))
            .assert()
            .success()
            .stdout(predicate::str::contains("Packed 3 programs (2 distinct binaries)"));
        Self { temp }
    }

    fn home(&self) -> &Path {
        self.temp.path()
    }

    fn registry(&self) -> std::path::PathBuf {
        self.temp.path().join("out")
    }
}

#[test]
fn help_describes_tool() {
    let temp = TempDir::new().unwrap();
    binreg(temp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("pack").and(predicate::str::contains("verify")));
}

#[test]
fn pack_then_get_to_stdout() {
    let f = Fixture::packed();
    binreg(f.home())
        .arg("get")
        .arg(f.registry())
        .args(["dEQP-VK.api.smoke.triangle", "frag"])
        .assert()
        .success()
        .stdout(predicate::eq(&b"\x03\x02\x23\x07frag"[..]));
}

#[test]
fn get_to_file() {
    let f = Fixture::packed();
    let out = f.home().join("quad.spv");
    binreg(f.home())
        .arg("get")
        .arg(f.registry())
        .args(["dEQP-VK.api.smoke.quad", "vert", "-o"])
        .arg(&out)
        .assert()
        .success();
    assert_eq!(fs::read(out).unwrap(), b"\x03\x02\x23\x07vert");
}

#[test]
fn get_missing_program_fails() {
    let f = Fixture::packed();
    binreg(f.home())
        .arg("get")
        .arg(f.registry())
        .args(["dEQP-VK.api.smoke.triangle", "geom"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn list_shows_sorted_identifiers() {
    let f = Fixture::packed();
    binreg(f.home())
        .arg("list")
        .arg(f.registry())
        .assert()
        .success()
        .stdout(predicate::str::starts_with(
            "dEQP-VK.api.smoke.quad / 'vert'\t#0\n\
             dEQP-VK.api.smoke.triangle / 'frag'",
        ));
}

#[test]
fn list_json() {
    let f = Fixture::packed();
    let output = binreg(f.home())
        .arg("list")
        .arg(f.registry())
        .arg("--json")
        .output()
        .unwrap();
    assert!(output.status.success());

    let rows: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0]["test_case_path"], "dEQP-VK.api.smoke.quad");
    assert_eq!(rows[0]["program_name"], "vert");
    assert_eq!(rows[0]["slot"], rows[2]["slot"]);
}

#[test]
fn stats_json() {
    let f = Fixture::packed();
    let output = binreg(f.home())
        .arg("stats")
        .arg(f.registry())
        .arg("--json")
        .output()
        .unwrap();
    assert!(output.status.success());

    let stats: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(stats["binaries"], 2);
    assert_eq!(stats["payload_bytes"], 16);
}

#[test]
fn stats_text_shows_payload_size() {
    let f = Fixture::packed();
    binreg(f.home())
        .arg("stats")
        .arg(f.registry())
        .assert()
        .success()
        .stdout(predicate::str::contains("payload:       16 (16 B)"));
}

#[test]
fn verify_passes_on_fresh_registry() {
    let f = Fixture::packed();
    binreg(f.home())
        .arg("verify")
        .arg(f.registry())
        .assert()
        .success()
        .stdout(predicate::str::contains("OK: 3 programs, 2 binaries (1 shared)"));
}

#[test]
fn verify_fails_on_corrupt_registry() {
    let f = Fixture::packed();
    let binaries = f.registry().join("binaries.bin");
    let mut bytes = fs::read(&binaries).unwrap();
    bytes.truncate(bytes.len() - 1);
    fs::write(&binaries, bytes).unwrap();

    binreg(f.home())
        .arg("verify")
        .arg(f.registry())
        .assert()
        .failure()
        .stderr(predicate::str::contains("registry unusable"));
}

#[test]
fn pack_rejects_files_with_same_identifier() {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("src/smoke");
    fs::create_dir_all(&src).unwrap();
    fs::write(src.join("vert.spv"), b"spirv").unwrap();
    fs::write(src.join("vert.bin"), b"raw").unwrap();

    binreg(temp.path())
        .arg("pack")
        .arg(temp.path().join("src"))
        .arg(temp.path().join("out"))
        .assert()
        .failure()
        .stderr(
            predicate::str::contains("vert.bin")
                .and(predicate::str::contains("vert.spv"))
                .and(predicate::str::contains("both map to program")),
        );
    assert!(!temp.path().join("out/index.bin").exists());
}

#[test]
fn quiet_pack_prints_nothing() {
    let temp = TempDir::new().unwrap();
    source_tree(&temp.path().join("src"));
    binreg(temp.path())
        .arg("--quiet")
        .arg("pack")
        .arg(temp.path().join("src"))
        .arg(temp.path().join("out"))
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn config_init_then_show() {
    let temp = TempDir::new().unwrap();
    let config = temp.path().join("binreg.toml");

    binreg(temp.path())
        .args(["config", "init", "--path"])
        .arg(&config)
        .assert()
        .success();
    assert!(fs::read_to_string(&config)
        .unwrap()
        .contains("index_page_log2 = 10"));

    binreg(temp.path())
        .arg("--config")
        .arg(&config)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("writer.sync = true"));

    binreg(temp.path())
        .args(["config", "init", "--path"])
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn invalid_config_is_reported() {
    let temp = TempDir::new().unwrap();
    let config = temp.path().join("bad.toml");
    fs::write(&config, "[reader]\nindex_page_log2 = 99\n").unwrap();

    binreg(temp.path())
        .arg("--config")
        .arg(&config)
        .args(["config", "show"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("out of range"));
}

#[test]
fn completion_generates_script() {
    let temp = TempDir::new().unwrap();
    binreg(temp.path())
        .args(["completion", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("binreg"));
}
