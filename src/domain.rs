use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::MapsError;

static REGION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9][a-z0-9_-]*(/[a-z0-9][a-z0-9_-]*)*$").expect("valid region regex")
});

static TARGET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]*$").expect("valid target regex"));

/// Layer schema a tile set is generated with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Schema {
    Openmaptiles,
    Shortbread,
    ProtomapsBasemaps,
}

impl Schema {
    pub const ALL: [Schema; 3] = [
        Schema::Openmaptiles,
        Schema::Shortbread,
        Schema::ProtomapsBasemaps,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Schema::Openmaptiles => "openmaptiles",
            Schema::Shortbread => "shortbread",
            Schema::ProtomapsBasemaps => "protomaps-basemaps",
        }
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Schema {
    type Err = MapsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Schema::ALL
            .into_iter()
            .find(|schema| schema.as_str() == value.trim())
            .ok_or_else(|| {
                MapsError::InvalidArgument(format!(
                    "Unknown schema \"{value}\". Available schemas are: {}",
                    join_names(Schema::ALL.iter().map(|schema| schema.as_str()))
                ))
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TileFormat {
    Mbtiles,
    Pmtiles,
}

impl TileFormat {
    pub const ALL: [TileFormat; 2] = [TileFormat::Mbtiles, TileFormat::Pmtiles];

    pub fn as_str(self) -> &'static str {
        match self {
            TileFormat::Mbtiles => "mbtiles",
            TileFormat::Pmtiles => "pmtiles",
        }
    }

    pub fn extension(self) -> &'static str {
        self.as_str()
    }
}

impl fmt::Display for TileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TileFormat {
    type Err = MapsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "mbtiles" => Ok(TileFormat::Mbtiles),
            "pmtiles" => Ok(TileFormat::Pmtiles),
            other => Err(MapsError::InvalidArgument(format!(
                "Unknown type \"{other}\". Available types are: {}",
                join_names(TileFormat::ALL.iter().map(|format| format.as_str()))
            ))),
        }
    }
}

/// Every kind of artifact the data directory holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Pbf,
    Mbtiles,
    Pmtiles,
    Shapefile,
    Style,
    Binary,
}

impl ArtifactKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactKind::Pbf => "pbf",
            ArtifactKind::Mbtiles => "mbtiles",
            ArtifactKind::Pmtiles => "pmtiles",
            ArtifactKind::Shapefile => "shapefile",
            ArtifactKind::Style => "style",
            ArtifactKind::Binary => "binary",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactKind {
    type Err = MapsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "pbf" => Ok(ArtifactKind::Pbf),
            "mbtiles" => Ok(ArtifactKind::Mbtiles),
            "pmtiles" => Ok(ArtifactKind::Pmtiles),
            "shapefile" => Ok(ArtifactKind::Shapefile),
            "style" => Ok(ArtifactKind::Style),
            "binary" => Ok(ArtifactKind::Binary),
            other => Err(MapsError::InvalidArgument(format!("Unknown type {other}"))),
        }
    }
}

impl From<TileFormat> for ArtifactKind {
    fn from(value: TileFormat) -> Self {
        match value {
            TileFormat::Mbtiles => ArtifactKind::Mbtiles,
            TileFormat::Pmtiles => ArtifactKind::Pmtiles,
        }
    }
}

/// A Geofabrik region path such as `europe/monaco`, or `world`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegionName(String);

impl RegionName {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_world(&self) -> bool {
        self.0 == "world"
    }

    /// Last path segment; names the local artifact.
    pub fn stem(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for RegionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RegionName {
    type Err = MapsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_lowercase();
        if !REGION_RE.is_match(&normalized) {
            return Err(MapsError::InvalidRegion(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

/// `schema/name` reference to a generated tile set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TileName {
    pub schema: Schema,
    pub name: String,
}

impl fmt::Display for TileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.schema, self.name)
    }
}

impl FromStr for TileName {
    type Err = MapsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let parts = value.trim().split('/').collect::<Vec<_>>();
        let [schema, name] = parts.as_slice() else {
            return Err(MapsError::InvalidArgument(
                "The name must be in the format \"schema/name\"".to_string(),
            ));
        };
        let name: RegionName = name.parse()?;
        Ok(Self {
            schema: schema.parse()?,
            name: name.stem().to_string(),
        })
    }
}

/// File stem chosen with `--target-name`: a single path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetName(String);

impl TargetName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TargetName {
    type Err = MapsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        if !TARGET_RE.is_match(value) || value.contains("..") {
            return Err(MapsError::InvalidArgument(format!(
                "Invalid target name \"{value}\": use letters, digits, '.', '_' or '-' without '/' or '..'"
            )));
        }
        Ok(Self(value.to_string()))
    }
}

/// Logical identity of an on-disk artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Artifact {
    Pbf {
        name: String,
    },
    Tiles {
        format: TileFormat,
        schema: Schema,
        name: String,
    },
    Shapefile {
        name: String,
    },
    Style {
        name: String,
    },
    Binary {
        name: String,
    },
}

impl Artifact {
    pub fn kind(&self) -> ArtifactKind {
        match self {
            Artifact::Pbf { .. } => ArtifactKind::Pbf,
            Artifact::Tiles { format, .. } => (*format).into(),
            Artifact::Shapefile { .. } => ArtifactKind::Shapefile,
            Artifact::Style { .. } => ArtifactKind::Style,
            Artifact::Binary { .. } => ArtifactKind::Binary,
        }
    }

    /// Builds an artifact from loose strings, as typed on the command line.
    pub fn from_parts(kind: &str, schema: Option<&str>, name: &str) -> Result<Self, MapsError> {
        let kind: ArtifactKind = kind.parse()?;
        let name = name.trim();
        if name.is_empty() {
            return Err(MapsError::InvalidArgument(
                "artifact name must not be empty".to_string(),
            ));
        }
        let name = name.to_string();
        match kind {
            ArtifactKind::Pbf => Ok(Artifact::Pbf { name }),
            ArtifactKind::Mbtiles | ArtifactKind::Pmtiles => {
                let schema = schema.ok_or_else(|| {
                    MapsError::InvalidArgument(format!("{kind} artifacts require a schema"))
                })?;
                let format = if kind == ArtifactKind::Mbtiles {
                    TileFormat::Mbtiles
                } else {
                    TileFormat::Pmtiles
                };
                Ok(Artifact::Tiles {
                    format,
                    schema: schema.parse()?,
                    name,
                })
            }
            ArtifactKind::Shapefile => Ok(Artifact::Shapefile { name }),
            ArtifactKind::Style => Ok(Artifact::Style { name }),
            ArtifactKind::Binary => Ok(Artifact::Binary { name }),
        }
    }
}

/// Which tile formats a listing or deletion touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatSelector {
    All,
    One(TileFormat),
}

impl FormatSelector {
    pub fn formats(self) -> Vec<TileFormat> {
        match self {
            FormatSelector::All => TileFormat::ALL.to_vec(),
            FormatSelector::One(format) => vec![format],
        }
    }
}

impl FromStr for FormatSelector {
    type Err = MapsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.trim() == "all" {
            return Ok(FormatSelector::All);
        }
        value.parse::<TileFormat>().map(FormatSelector::One).map_err(|_| {
            MapsError::InvalidArgument(format!(
                "Unknown type \"{value}\". Available types are: {}. Pass \"all\" to remove all the file types.",
                join_names(TileFormat::ALL.iter().map(|format| format.as_str()))
            ))
        })
    }
}

/// `all`, or one specific name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameSelector<T> {
    All,
    One(T),
}

impl<T: FromStr<Err = MapsError>> FromStr for NameSelector<T> {
    type Err = MapsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "" => Err(MapsError::InvalidArgument(
                "You must provide a name to delete. Pass \"all\" to remove all the files of the selected type."
                    .to_string(),
            )),
            "all" => Ok(NameSelector::All),
            other => other.parse().map(NameSelector::One),
        }
    }
}

fn join_names<'a>(names: impl Iterator<Item = &'a str>) -> String {
    names.collect::<Vec<_>>().join(", ")
}
