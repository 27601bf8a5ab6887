use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use assert_matches::assert_matches;
use flate2::Compression;
use flate2::write::GzEncoder;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use cartos::archive::{ArchiveKind, extract};
use cartos::error::MapsError;
use cartos::process::{CommandLine, ProcessOutcome, ProcessRunner, ProcessSpec};

#[derive(Default)]
struct RecordingRunner {
    calls: Mutex<Vec<CommandLine>>,
}

impl ProcessRunner for RecordingRunner {
    fn run(&self, spec: &ProcessSpec) -> Result<ProcessOutcome, MapsError> {
        self.calls.lock().unwrap().push(spec.command.clone());
        Ok(ProcessOutcome {
            code: Some(0),
            success: true,
            stdout: String::new(),
            stderr: String::new(),
        })
    }
}

fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
    let file = fs::File::create(path).unwrap();
    let mut zip = ZipWriter::new(file);
    for (name, content) in entries {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(content).unwrap();
    }
    zip.finish().unwrap();
}

fn files_in(dir: &Path) -> Vec<String> {
    let mut names = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect::<Vec<_>>();
    names.sort();
    names
}

#[test]
fn detects_kind_by_suffix() {
    assert_eq!(
        ArchiveKind::detect(Path::new("data/resources/tilemaker.zip")).unwrap(),
        ArchiveKind::Zip
    );
    assert_eq!(
        ArchiveKind::detect(Path::new("data/bin/go-pmtiles.tar.gz")).unwrap(),
        ArchiveKind::TarGz
    );
    assert_matches!(
        ArchiveKind::detect(Path::new("styles.tgz")),
        Err(MapsError::UnsupportedArchive(_))
    );
}

#[test]
fn zip_extracts_exactly_its_entries() {
    let temp = tempfile::tempdir().unwrap();
    let archive = temp.path().join("bundle.zip");
    write_zip(&archive, &[("a", b"first"), ("b", b"second")]);
    let target = temp.path().join("out");
    fs::create_dir(&target).unwrap();

    extract(&archive, &target, &RecordingRunner::default()).unwrap();

    assert_eq!(files_in(&target), vec!["a", "b"]);
    assert_eq!(fs::read(target.join("a")).unwrap(), b"first");
    assert_eq!(fs::read(target.join("b")).unwrap(), b"second");
}

#[test]
fn zip_keeps_nested_directories() {
    let temp = tempfile::tempdir().unwrap();
    let archive = temp.path().join("shortbread-tilemaker.zip");
    write_zip(
        &archive,
        &[
            ("shortbread-tilemaker-main/process.lua", b"-- lua"),
            ("shortbread-tilemaker-main/config.json", b"{}"),
        ],
    );
    let target = temp.path().join("resources");
    fs::create_dir(&target).unwrap();

    extract(&archive, &target, &RecordingRunner::default()).unwrap();
    assert!(target.join("shortbread-tilemaker-main/process.lua").is_file());
    assert!(target.join("shortbread-tilemaker-main/config.json").is_file());
}

#[test]
fn corrupt_zip_is_reported() {
    let temp = tempfile::tempdir().unwrap();
    let archive = temp.path().join("broken.zip");
    fs::write(&archive, b"<html>rate limited</html>").unwrap();
    let target = temp.path().join("out");
    fs::create_dir(&target).unwrap();

    let err = extract(&archive, &target, &RecordingRunner::default()).unwrap_err();
    assert_matches!(err, MapsError::CorruptArchive { path, .. } if path.ends_with("broken.zip"));
    assert!(files_in(&target).is_empty());
}

#[test]
fn unknown_suffix_is_unsupported() {
    let temp = tempfile::tempdir().unwrap();
    let archive = temp.path().join("styles.rar");
    fs::write(&archive, b"rar").unwrap();

    let runner = RecordingRunner::default();
    let err = extract(&archive, temp.path(), &runner).unwrap_err();
    assert_matches!(err, MapsError::UnsupportedArchive(_));
    assert!(runner.calls.lock().unwrap().is_empty());
}

#[test]
fn tar_gz_runs_tar_into_target() {
    let temp = tempfile::tempdir().unwrap();
    let archive = temp.path().join("go-pmtiles.tar.gz");
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(b"not really a tar stream").unwrap();
    fs::write(&archive, encoder.finish().unwrap()).unwrap();
    let target = temp.path().join("pmtiles");
    fs::create_dir(&target).unwrap();

    let runner = RecordingRunner::default();
    extract(&archive, &target, &runner).unwrap();

    let calls = runner.calls.lock().unwrap();
    assert_eq!(
        calls.as_slice(),
        &[CommandLine::argv([
            "tar".to_string(),
            "-xzf".to_string(),
            archive.display().to_string(),
            "-C".to_string(),
            target.display().to_string(),
        ])]
    );
}

#[test]
fn html_saved_as_tar_gz_is_corrupt() {
    let temp = tempfile::tempdir().unwrap();
    let archive = temp.path().join("styles.tar.gz");
    fs::write(&archive, b"<html>not found</html>").unwrap();

    let runner = RecordingRunner::default();
    let err = extract(&archive, temp.path(), &runner).unwrap_err();
    assert_matches!(err, MapsError::CorruptArchive { .. });
    assert!(runner.calls.lock().unwrap().is_empty());
}
