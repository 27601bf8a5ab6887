use std::fs;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use cartos::config::{ConfigLoader, DOCKERFILE, Overrides, default_image};
use cartos::error::MapsError;

fn project() -> (tempfile::TempDir, Utf8PathBuf) {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    (temp, root)
}

#[test]
fn local_config_file_is_picked_up() {
    let (_temp, root) = project();
    fs::write(
        root.join("cartos.json"),
        r#"{ "data_dir": "/mnt/maps", "use_container": false, "timeout_secs": 5 }"#,
    )
    .unwrap();

    let settings = ConfigLoader::resolve(Overrides {
        project_root: Some(root.to_string()),
        ..Overrides::default()
    })
    .unwrap();
    assert_eq!(settings.project_root, root);
    assert_eq!(settings.data_dir, Utf8PathBuf::from("/mnt/maps"));
    assert!(!settings.container.enabled);
    assert_eq!(settings.default_timeout.map(|timeout| timeout.as_secs()), Some(5));
}

#[test]
fn explicit_config_must_exist() {
    let (_temp, root) = project();
    let missing = root.join("nope.json");
    let err = ConfigLoader::load(Some(missing.as_str()), &root).unwrap_err();
    assert_matches!(err, MapsError::ConfigRead(path) if path.ends_with("nope.json"));
}

#[test]
fn invalid_config_is_a_parse_error() {
    let (_temp, root) = project();
    let path = root.join("broken.json");
    fs::write(&path, "{ data_dir: ").unwrap();
    let err = ConfigLoader::load(Some(path.as_str()), &root).unwrap_err();
    assert_matches!(err, MapsError::ConfigParse(_));
}

#[test]
fn image_tag_follows_dockerfile() {
    let (_temp, root) = project();
    assert_eq!(default_image(&root), "ghcr.io/jolicode/maps:latest");

    let dockerfile = root.join(DOCKERFILE);
    fs::create_dir_all(dockerfile.parent().unwrap()).unwrap();
    fs::write(&dockerfile, "FROM debian:bookworm\n").unwrap();
    let first = default_image(&root);
    assert!(first.starts_with("ghcr.io/jolicode/maps:"));
    assert_eq!(first.len(), "ghcr.io/jolicode/maps:".len() + 32);

    fs::write(&dockerfile, "FROM debian:trixie\n").unwrap();
    assert_ne!(default_image(&root), first);
}
