use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output};

fn tool_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_so-export"))
}

fn run(args: &[&str]) -> Output {
    Command::new(tool_path())
        .args(args)
        .output()
        .expect("cannot run so-export")
}

#[test]
fn missing_arguments_fail_with_usage_error() {
    let out = run(&[]);
    assert_eq!(out.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.starts_with("Error:"), "STDOUT: {stdout}");
}

#[test]
fn help_prints_usage_and_exits_one() {
    let out = run(&["--help"]);
    assert_eq!(out.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("--class-list"), "STDOUT: {stdout}");
    assert!(stdout.contains("--so"), "STDOUT: {stdout}");
    assert!(stdout.contains("--out"), "STDOUT: {stdout}");
}

#[test]
fn invalid_object_is_a_fatal_error() {
    let dir = tempfile::tempdir().unwrap();
    let class_list = dir.path().join("classes.txt");
    std::fs::write(&class_list, "CBaseEntity\n").unwrap();

    let so = dir.path().join("broken.so");
    let mut file = std::fs::File::create(&so).unwrap();
    file.write_all(b"definitely not an elf").unwrap();

    let out_path = dir.path().join("out.json");
    let out = run(&[
        "--class-list",
        class_list.to_str().unwrap(),
        "--so",
        so.to_str().unwrap(),
        "--out",
        out_path.to_str().unwrap(),
    ]);
    assert_eq!(out.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.starts_with("Error:"), "STDOUT: {stdout}");
    assert!(!out_path.exists());
}
