// INT 21h service call listing through the dostrace binary

mod utils;

use predicates::prelude::*;
use tempfile::TempDir;
use utils::{gap, insn, nop, open_read_close, write_trace};

#[test]
fn test_strace_open_read_close() {
    let dir = TempDir::new().unwrap();
    let trace = write_trace(&dir, "trace.json", &open_read_close());

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("dostrace");
    let output = cmd.arg("strace").arg(&trace).output().unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(
        lines,
        vec![
            "1: OPEN filename in 1234:0010, mode read -> handle 7",
            "4: READ file 7, length 100, store in 1234:0200, offset 0 -> 80 bytes, new offset 80",
            "7: CLOSE file 7 -> ok",
        ]
    );
}

#[test]
fn test_strace_indices_follow_gaps() {
    let dir = TempDir::new().unwrap();
    let mut entries = vec![nop(0), gap(10)];
    entries.extend(open_read_close());
    let trace = write_trace(&dir, "trace.json", &entries);

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("dostrace");
    cmd.arg("strace")
        .arg(&trace)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("12: OPEN"));
}

#[test]
fn test_strace_failed_open() {
    let dir = TempDir::new().unwrap();
    let entries = vec![
        insn(0, "int  21", "cd21", &[("eax", 0x3d02), ("edx", 0x40)], false),
        insn(0x40, "iret", "cf", &[], false),
        insn(2, "jc   0020", "7203", &[("eax", 5)], true),
    ];
    let trace = write_trace(&dir, "trace.json", &entries);

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("dostrace");
    cmd.arg("strace").arg(&trace).assert().success().stdout(
        "1: OPEN filename in 1234:0040, mode read-write -> failure: access denied (0x05)\n",
    );
}

#[test]
fn test_strace_unknown_function_and_summary() {
    let dir = TempDir::new().unwrap();
    let mut entries = open_read_close();
    entries.push(insn(0x20, "int  21", "cd21", &[("eax", 0x0900)], false));
    entries.push(insn(0x22, "int  21", "cd21", &[("eax", 0x4c00)], false));
    let trace = write_trace(&dir, "trace.json", &entries);

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("dostrace");
    cmd.arg("strace")
        .arg("--summary")
        .arg(&trace)
        .assert()
        .success()
        .stdout(predicate::str::contains("10: Unknown syscall AH = 0x09"))
        .stdout(predicate::str::contains("11: EXIT code 0"))
        .stderr(predicate::str::contains("0x09 UNKNOWN"))
        .stderr(predicate::str::contains("0x3d OPEN"))
        .stderr(predicate::str::contains("total"));
}

#[test]
fn test_strace_short_lookahead_drops_results() {
    let dir = TempDir::new().unwrap();
    let mut entries = vec![insn(0, "int  21", "cd21", &[("eax", 0x3e00), ("ebx", 3)], false)];
    entries.extend((1..4).map(nop));
    entries.push(insn(0x40, "iret", "cf", &[], false));
    entries.push(nop(5));
    let trace = write_trace(&dir, "trace.json", &entries);

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("dostrace");
    cmd.arg("strace")
        .arg("--lookahead")
        .arg("2")
        .arg(&trace)
        .assert()
        .success()
        .stdout("1: CLOSE file 3\n");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("dostrace");
    cmd.arg("strace")
        .arg(&trace)
        .assert()
        .success()
        .stdout("1: CLOSE file 3 -> ok\n");
}

#[test]
fn test_strace_missing_file() {
    let dir = TempDir::new().unwrap();

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("dostrace");
    cmd.arg("strace")
        .arg(dir.path().join("missing.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load trace"));
}

#[test]
fn test_strace_malformed_trace() {
    let dir = TempDir::new().unwrap();
    let trace = dir.path().join("bad.json");
    std::fs::write(&trace, r#"[{"gap": 2}, {"ips": 1}]"#).unwrap();

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("dostrace");
    cmd.arg("strace")
        .arg(&trace)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Malformed trace entry 1"));
}

#[test]
fn test_strace_huge_lookahead() {
    let dir = TempDir::new().unwrap();
    let trace = write_trace(&dir, "trace.json", &open_read_close());

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("dostrace");
    cmd.args(["strace", "--lookahead", "18446744073709551615"])
        .arg(&trace)
        .assert()
        .success()
        .stdout(predicate::str::contains("7: CLOSE file 7 -> ok"));
}
