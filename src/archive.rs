use std::fs;
use std::io;
use std::path::Path;

use flate2::read::GzDecoder;
use tracing::info;
use zip::ZipArchive;

use crate::error::MapsError;
use crate::process::{CommandLine, ProcessRunner, ProcessSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    TarGz,
}

impl ArchiveKind {
    pub fn detect(path: &Path) -> Result<Self, MapsError> {
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default();
        if name.ends_with(".zip") {
            Ok(ArchiveKind::Zip)
        } else if name.ends_with(".tar.gz") {
            Ok(ArchiveKind::TarGz)
        } else {
            Err(MapsError::UnsupportedArchive(path.display().to_string()))
        }
    }
}

/// Unpacks `archive` into `target_dir`, which must already exist.
pub fn extract(
    archive: &Path,
    target_dir: &Path,
    runner: &dyn ProcessRunner,
) -> Result<(), MapsError> {
    let kind = ArchiveKind::detect(archive)?;
    info!(archive = %archive.display(), target = %target_dir.display(), ?kind, "extracting");
    match kind {
        ArchiveKind::Zip => extract_zip(archive, target_dir),
        ArchiveKind::TarGz => {
            validate_gzip(archive)?;
            let command = CommandLine::argv([
                "tar".to_string(),
                "-xzf".to_string(),
                archive.display().to_string(),
                "-C".to_string(),
                target_dir.display().to_string(),
            ]);
            runner
                .run(&ProcessSpec::new(command).timeout(None))
                .map(|_| ())
        }
    }
}

pub fn extract_zip(zip_path: &Path, target_dir: &Path) -> Result<(), MapsError> {
    let corrupt = |message: String| MapsError::CorruptArchive {
        path: zip_path.display().to_string(),
        message,
    };
    let file = fs::File::open(zip_path).map_err(|err| corrupt(err.to_string()))?;
    let mut archive = ZipArchive::new(file).map_err(|err| corrupt(err.to_string()))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|err| corrupt(err.to_string()))?;
        let entry_path = match entry.enclosed_name() {
            Some(path) => target_dir.join(path),
            None => return Err(corrupt("zip entry path traversal detected".to_string())),
        };

        if entry.is_dir() {
            fs::create_dir_all(&entry_path)
                .map_err(|err| MapsError::Filesystem(err.to_string()))?;
            continue;
        }

        if let Some(parent) = entry_path.parent() {
            fs::create_dir_all(parent).map_err(|err| MapsError::Filesystem(err.to_string()))?;
        }
        let mut outfile =
            fs::File::create(&entry_path).map_err(|err| MapsError::Filesystem(err.to_string()))?;
        io::copy(&mut entry, &mut outfile).map_err(|err| corrupt(err.to_string()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                fs::set_permissions(&entry_path, fs::Permissions::from_mode(mode))
                    .map_err(|err| MapsError::Filesystem(err.to_string()))?;
            }
        }
    }
    Ok(())
}

/// Decodes the whole gzip stream so a truncated download fails here
/// instead of half-way through `tar`.
pub fn validate_gzip(path: &Path) -> Result<(), MapsError> {
    let corrupt = |message: String| MapsError::CorruptArchive {
        path: path.display().to_string(),
        message,
    };
    let file = fs::File::open(path).map_err(|err| corrupt(err.to_string()))?;
    let mut decoder = GzDecoder::new(file);
    io::copy(&mut decoder, &mut io::sink()).map_err(|err| corrupt(err.to_string()))?;
    Ok(())
}
