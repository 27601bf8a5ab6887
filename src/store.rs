use std::fs;
use std::time::SystemTime;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::Settings;
use crate::domain::{Artifact, NameSelector, RegionName, Schema, TileFormat, TileName};
use crate::error::MapsError;

const LAYOUT_DIRECTORIES: &[&str] = &[
    "bin",
    "bin/pmtiles",
    "tiles",
    "tiles/mbtiles",
    "tiles/pbf",
    "tiles/pmtiles",
    "resources",
    "resources/shapefiles",
    "resources/styles/versatiles-style",
    "tmp/store",
];

const PBF_SUFFIX: &str = ".osm.pbf";

/// Canonical layout of the data directory.
#[derive(Debug, Clone)]
pub struct Store {
    project_root: Utf8PathBuf,
    data_root: Utf8PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArtifactEntry {
    pub schema: Option<String>,
    pub name: String,
    pub path: String,
    pub size: u64,
    #[serde(skip)]
    pub modified: Option<SystemTime>,
}

impl Store {
    pub fn new(settings: &Settings) -> Self {
        Self::new_with_paths(settings.project_root.clone(), settings.data_dir.clone())
    }

    pub fn new_with_paths(project_root: Utf8PathBuf, data_root: Utf8PathBuf) -> Self {
        Self {
            project_root,
            data_root,
        }
    }

    pub fn project_root(&self) -> &Utf8Path {
        &self.project_root
    }

    pub fn data_root(&self) -> &Utf8Path {
        &self.data_root
    }

    pub fn resolve(&self, artifact: &Artifact) -> Utf8PathBuf {
        match artifact {
            Artifact::Pbf { name } => self
                .data_root
                .join("tiles")
                .join("pbf")
                .join(format!("{name}{PBF_SUFFIX}")),
            Artifact::Tiles {
                format,
                schema,
                name,
            } => self
                .tiles_dir(*format)
                .join(schema.as_str())
                .join(format!("{name}.{}", format.extension())),
            Artifact::Shapefile { name } => self.shapefiles_dir().join(name),
            Artifact::Style { name } => self.styles_dir().join(name),
            Artifact::Binary { name } => self.bin_dir().join(name).join(name),
        }
    }

    pub fn pbf_path(&self, region: &RegionName) -> Utf8PathBuf {
        self.resolve(&Artifact::Pbf {
            name: region.stem().to_string(),
        })
    }

    pub fn tile_path(&self, format: TileFormat, schema: Schema, name: &str) -> Utf8PathBuf {
        self.resolve(&Artifact::Tiles {
            format,
            schema,
            name: name.to_string(),
        })
    }

    pub fn tiles_dir(&self, format: TileFormat) -> Utf8PathBuf {
        self.data_root.join("tiles").join(format.as_str())
    }

    pub fn pbf_dir(&self) -> Utf8PathBuf {
        self.data_root.join("tiles").join("pbf")
    }

    pub fn bin_dir(&self) -> Utf8PathBuf {
        self.data_root.join("bin")
    }

    pub fn pmtiles_binary(&self) -> Utf8PathBuf {
        self.resolve(&Artifact::Binary {
            name: "pmtiles".to_string(),
        })
    }

    pub fn resources_dir(&self) -> Utf8PathBuf {
        self.data_root.join("resources")
    }

    pub fn shapefiles_dir(&self) -> Utf8PathBuf {
        self.resources_dir().join("shapefiles")
    }

    pub fn styles_dir(&self) -> Utf8PathBuf {
        self.resources_dir().join("styles")
    }

    pub fn tilemaker_configs_dir(&self) -> Utf8PathBuf {
        self.project_root.join("tilemaker-configs")
    }

    pub fn tilemaker_config(&self, schema: Schema, extension: &str) -> Utf8PathBuf {
        self.tilemaker_configs_dir()
            .join(format!("{}.{extension}", schema.as_str()))
    }

    /// Fresh scratch directory for a tilemaker run.
    pub fn new_tilemaker_store(&self) -> Utf8PathBuf {
        self.data_root
            .join("tmp")
            .join("store")
            .join(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Path as seen from the project root, which is where external tools run.
    pub fn relative(&self, path: &Utf8Path) -> String {
        path.strip_prefix(&self.project_root)
            .map(|relative| relative.to_string())
            .unwrap_or_else(|_| path.to_string())
    }

    pub fn exists(&self, path: &Utf8Path) -> bool {
        path.as_std_path().exists()
    }

    pub fn ensure_layout(&self) -> Result<(), MapsError> {
        for directory in LAYOUT_DIRECTORIES {
            let path = self.data_root.join(directory);
            if !path.as_std_path().exists() {
                debug!(%path, "creating directory");
                fs::create_dir_all(path.as_std_path())
                    .map_err(|err| MapsError::Filesystem(err.to_string()))?;
            }
        }
        Ok(())
    }

    pub fn ensure_dir(path: &Utf8Path) -> Result<(), MapsError> {
        fs::create_dir_all(path.as_std_path()).map_err(|err| {
            MapsError::Filesystem(format!("create directory {path}: {err}"))
        })
    }

    pub fn list_pbf(&self) -> Result<Vec<ArtifactEntry>, MapsError> {
        let mut entries = Vec::new();
        for path in files_with_suffix(&self.pbf_dir(), PBF_SUFFIX)? {
            let name = file_name(&path).trim_end_matches(PBF_SUFFIX).to_string();
            entries.push(entry_for(None, name, &path)?);
        }
        Ok(entries)
    }

    /// Tile files one schema directory deep: `tiles/<format>/<schema>/<name>.<format>`.
    pub fn list_tiles(&self, format: TileFormat) -> Result<Vec<ArtifactEntry>, MapsError> {
        let root = self.tiles_dir(format);
        if !root.as_std_path().is_dir() {
            return Ok(Vec::new());
        }
        let suffix = format!(".{}", format.extension());
        let mut entries = Vec::new();
        for schema_dir in sorted_entries(&root)? {
            if !schema_dir.as_std_path().is_dir() {
                continue;
            }
            let schema = file_name(&schema_dir).to_string();
            for path in files_with_suffix(&schema_dir, &suffix)? {
                let name = file_name(&path).trim_end_matches(suffix.as_str()).to_string();
                entries.push(entry_for(Some(schema.clone()), name, &path)?);
            }
        }
        Ok(entries)
    }

    pub fn delete_pbf(&self, name: &NameSelector<RegionName>) -> Result<Vec<String>, MapsError> {
        let entries = self.list_pbf()?;
        let selected = entries.into_iter().filter(|entry| match name {
            NameSelector::All => true,
            NameSelector::One(region) => entry.name == region.stem(),
        });
        remove_entries(selected)
    }

    pub fn delete_tiles(
        &self,
        format: TileFormat,
        name: &NameSelector<TileName>,
    ) -> Result<Vec<String>, MapsError> {
        let entries = self.list_tiles(format)?;
        let selected = entries.into_iter().filter(|entry| match name {
            NameSelector::All => true,
            NameSelector::One(tile) => {
                entry.schema.as_deref() == Some(tile.schema.as_str()) && entry.name == tile.name
            }
        });
        remove_entries(selected)
    }
}

fn remove_entries(entries: impl Iterator<Item = ArtifactEntry>) -> Result<Vec<String>, MapsError> {
    let mut removed = Vec::new();
    for entry in entries {
        info!(path = %entry.path, "removing file");
        fs::remove_file(&entry.path)
            .map_err(|err| MapsError::Filesystem(format!("remove {}: {err}", entry.path)))?;
        removed.push(entry.path);
    }
    Ok(removed)
}

fn entry_for(
    schema: Option<String>,
    name: String,
    path: &Utf8Path,
) -> Result<ArtifactEntry, MapsError> {
    let metadata = fs::metadata(path.as_std_path())
        .map_err(|err| MapsError::Filesystem(err.to_string()))?;
    Ok(ArtifactEntry {
        schema,
        name,
        path: path.to_string(),
        size: metadata.len(),
        modified: metadata.modified().ok(),
    })
}

fn files_with_suffix(dir: &Utf8Path, suffix: &str) -> Result<Vec<Utf8PathBuf>, MapsError> {
    if !dir.as_std_path().is_dir() {
        return Ok(Vec::new());
    }
    Ok(sorted_entries(dir)?
        .into_iter()
        .filter(|path| path.as_std_path().is_file() && file_name(path).ends_with(suffix))
        .collect())
}

fn sorted_entries(dir: &Utf8Path) -> Result<Vec<Utf8PathBuf>, MapsError> {
    let entries = fs::read_dir(dir.as_std_path())
        .map_err(|err| MapsError::Filesystem(format!("read {dir}: {err}")))?;
    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| MapsError::Filesystem(err.to_string()))?;
        if let Ok(path) = Utf8PathBuf::from_path_buf(entry.path()) {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

fn file_name(path: &Utf8Path) -> &str {
    path.file_name().unwrap_or_default()
}
