#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::process::Command;

use serde_json::Value;

fn touch(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

#[test]
fn json_mode_keeps_tool_output_off_stdout() {
    let temp = tempfile::tempdir().unwrap();
    let project = temp.path().join("project");
    touch(&project, "data/tiles/pbf/monaco.osm.pbf", "pbf");
    touch(&project, "tilemaker-configs/openmaptiles.json", "{}");
    touch(&project, "tilemaker-configs/openmaptiles.lua", "-- lua");

    let bin = temp.path().join("bin");
    touch(&bin, "tilemaker", "#!/bin/sh\necho 'tilemaker says hello'\n");
    fs::set_permissions(bin.join("tilemaker"), fs::Permissions::from_mode(0o755)).unwrap();
    let path = format!(
        "{}:{}",
        bin.display(),
        std::env::var("PATH").unwrap_or_default()
    );

    let output = Command::new(env!("CARGO_BIN_EXE_cartos"))
        .args(["--json", "--no-container", "--project-dir"])
        .arg(&project)
        .args(["tiles", "generate", "monaco", "openmaptiles"])
        .current_dir(&project)
        .env("PATH", path)
        .env("XDG_CONFIG_HOME", temp.path().join("xdg"))
        .env_remove("CARTOS_DATA_DIR")
        .env_remove("CARTOS_IMAGE")
        .output()
        .unwrap();

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(output.status.success(), "stderr: {stderr}");
    let result: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(result["task"], "tiles:generate");
    assert_eq!(result["status"], "completed");
    assert!(stderr.contains("tilemaker says hello"));
}

#[test]
fn invalid_target_name_is_rejected() {
    let temp = tempfile::tempdir().unwrap();
    let output = Command::new(env!("CARGO_BIN_EXE_cartos"))
        .args(["--no-container", "--project-dir"])
        .arg(temp.path())
        .args([
            "tiles",
            "generate",
            "monaco",
            "openmaptiles",
            "--target-name",
            "../../escaped",
        ])
        .env("XDG_CONFIG_HOME", temp.path().join("xdg"))
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Invalid target name"));
}
