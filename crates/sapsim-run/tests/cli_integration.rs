//! Integration tests for the sapsim-run CLI.

use env_logger as _;
use log as _;
use sapsim_core as _;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

// MVI C,9; LXI D,0x0010; CALL 5; MVI A,0x2A; OUT 1; HLT; 0x0010 "hi$"
const HELLO: [u8; 19] = [
    0x0E, 0x09, 0x11, 0x10, 0x00, 0xCD, 0x05, 0x00, 0x3E, 0x2A, 0xD3, 0x01, 0x76, 0x00, 0x00,
    0x00, b'h', b'i', b'$',
];

fn binary_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_sapsim-run"))
}

fn create_temp_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

fn sapsim(args: &[&str]) -> Output {
    Command::new(binary_path())
        .args(args)
        .output()
        .expect("failed to run sapsim-run")
}

#[test]
fn run_prints_console_output_and_registers() {
    let temp_dir = tempfile::tempdir().unwrap();
    let image = create_temp_file(temp_dir.path(), "hello.bin", &HELLO);

    let output = sapsim(&["run", image.to_str().unwrap()]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("hi"), "stdout was {stdout:?}");
    assert!(stdout.contains("halted (HLT)"));
    assert!(stdout.contains("A=2A"));
    assert!(stdout.contains("OUT=2A"));
}

#[test]
fn run_exits_with_two_when_the_budget_runs_out() {
    let temp_dir = tempfile::tempdir().unwrap();
    // JMP 0x0000
    let image = create_temp_file(temp_dir.path(), "loop.bin", &[0xC3, 0x00, 0x00]);

    let output = sapsim(&["run", image.to_str().unwrap(), "--max", "64"]);

    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stdout).contains("budget of 64 half-ticks"));
}

#[test]
fn run_json_dumps_history_and_moves_console_to_stderr() {
    let temp_dir = tempfile::tempdir().unwrap();
    let image = create_temp_file(temp_dir.path(), "hello.bin", &HELLO);

    let output = sapsim(&["run", image.to_str().unwrap(), "--json"]);

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("hi"));
    let value: Value = serde_json::from_slice(&output.stdout).expect("stdout is JSON");
    assert_eq!(value["outcome"]["halted"], Value::Bool(true));
    let history = value["history"].as_array().expect("history array");
    let half_ticks = value["outcome"]["half_ticks"].as_u64().expect("half-tick count");
    assert_eq!(history.len() as u64, half_ticks + 1);
    assert_eq!(history.last().unwrap()["out"], 0x2A);
}

#[test]
fn step_prints_one_line_per_instruction_with_labels() {
    let temp_dir = tempfile::tempdir().unwrap();
    let image = create_temp_file(temp_dir.path(), "hello.bin", &HELLO);
    let labels = create_temp_file(temp_dir.path(), "hello.json", br#"{"start": 0, "msg": 16}"#);

    let output = sapsim(&[
        "step",
        image.to_str().unwrap(),
        "-n",
        "2",
        "--labels",
        labels.to_str().unwrap(),
    ]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 2, "stdout was {stdout:?}");
    assert!(lines[0].starts_with("0000 start"));
    assert!(lines[0].contains("MVI C,0x09"));
    assert!(lines[1].contains("LXI D,0x0010"));
    assert!(lines[1].contains("PC=0005"));
}

#[test]
fn disasm_lists_the_image() {
    let temp_dir = tempfile::tempdir().unwrap();
    let image = create_temp_file(temp_dir.path(), "prog.bin", &[0x3E, 0x05, 0xD3, 0x01, 0x76]);

    let output = sapsim(&["disasm", image.to_str().unwrap()]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].contains("MVI A,0x05"));
    assert!(lines[0].ends_with("3E 05"));
    assert!(lines[1].contains("OUT 0x01"));
    assert!(lines[2].contains("HLT"));
}

#[test]
fn fault_exits_with_one() {
    let temp_dir = tempfile::tempdir().unwrap();
    // DAA
    let image = create_temp_file(temp_dir.path(), "daa.bin", &[0x27]);

    let output = sapsim(&["run", image.to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("error:"));
}

#[test]
fn oversized_image_is_rejected() {
    let temp_dir = tempfile::tempdir().unwrap();
    let image = create_temp_file(temp_dir.path(), "big.bin", &vec![0x76; 4096]);

    let output = sapsim(&["run", image.to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn missing_command_prints_usage() {
    let output = sapsim(&[]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Usage: sapsim-run"));
}
