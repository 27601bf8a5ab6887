use std::collections::BTreeMap;
use std::fs;

use camino::Utf8PathBuf;
use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::domain::{Schema, TileFormat};
use crate::error::MapsError;
use crate::store::{ArtifactEntry, Store};

/// Style documents the web front end serves, one family per schema.
#[derive(Debug, Clone)]
pub struct StyleCatalog {
    store: Store,
}

#[derive(Debug, Clone, Serialize)]
pub struct SchemaStyles {
    pub schema: Schema,
    pub source: &'static str,
    pub styles: &'static [&'static str],
    pub default_style: &'static str,
}

impl StyleCatalog {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Name of the vector source the styles of `schema` refer to.
    pub fn source_name(schema: Schema) -> &'static str {
        match schema {
            Schema::Openmaptiles => "openmaptiles",
            Schema::ProtomapsBasemaps => "protomaps",
            Schema::Shortbread => "versatiles-shortbread",
        }
    }

    pub fn styles(schema: Schema) -> &'static [&'static str] {
        match schema {
            Schema::Openmaptiles => &["basic", "bright"],
            Schema::ProtomapsBasemaps => &["black", "dark", "grayscale", "light", "white"],
            Schema::Shortbread => &["colorful", "eclipse", "graybeard", "neutrino"],
        }
    }

    pub fn default_style(schema: Schema) -> &'static str {
        Self::styles(schema)[0]
    }

    pub fn available(&self) -> Vec<SchemaStyles> {
        Schema::ALL
            .into_iter()
            .map(|schema| SchemaStyles {
                schema,
                source: Self::source_name(schema),
                styles: Self::styles(schema),
                default_style: Self::default_style(schema),
            })
            .collect()
    }

    pub fn style_path(&self, schema: Schema, style: &str) -> Option<Utf8PathBuf> {
        if !Self::styles(schema).contains(&style) {
            return None;
        }
        let styles_dir = self.store.styles_dir();
        Some(match schema {
            Schema::Openmaptiles if style == "basic" => {
                styles_dir.join("maptiler-basic-gl-style-master/style.json")
            }
            Schema::Openmaptiles => styles_dir.join("osm-bright-gl-style-master/style.json"),
            Schema::ProtomapsBasemaps => styles_dir
                .join("basemaps-main/styles/dist/styles")
                .join(style)
                .join("fr.json"),
            Schema::Shortbread => styles_dir
                .join("versatiles-style")
                .join(format!("{style}.json")),
        })
    }

    /// Loads the style and points its only vector source at the PMTiles
    /// archive of `location`.
    pub fn style_document(
        &self,
        schema: Schema,
        location: &str,
        style: &str,
        base_url: &str,
    ) -> Result<Value, MapsError> {
        let not_found = || MapsError::StyleNotFound {
            schema: schema.to_string(),
            style: style.to_string(),
        };
        let path = self.style_path(schema, style).ok_or_else(not_found)?;
        if !path.as_std_path().exists() {
            return Err(not_found());
        }
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|err| MapsError::Filesystem(format!("read {path}: {err}")))?;
        let mut document: Value = serde_json::from_str(&content)
            .map_err(|err| MapsError::Filesystem(format!("parse {path}: {err}")))?;

        let url = format!(
            "pmtiles://{}/pmtiles/{}/{}.pmtiles",
            base_url.trim_end_matches('/'),
            schema,
            location
        );
        let Some(object) = document.as_object_mut() else {
            return Err(MapsError::Filesystem(format!(
                "style {path} is not a JSON object"
            )));
        };
        let mut sources = Map::new();
        sources.insert(
            Self::source_name(schema).to_string(),
            json!({ "type": "vector", "url": url }),
        );
        object.insert("sources".to_string(), Value::Object(sources));
        Ok(document)
    }
}

/// Generated PMTiles archives, as the web front end sees them.
#[derive(Debug, Clone)]
pub struct TilesRepository {
    store: Store,
}

impl TilesRepository {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn has(&self, schema: Schema, name: &str) -> bool {
        self.store
            .tile_path(TileFormat::Pmtiles, schema, name)
            .as_std_path()
            .is_file()
    }

    pub fn list(&self) -> Result<BTreeMap<String, Vec<ArtifactEntry>>, MapsError> {
        let mut grouped = BTreeMap::<String, Vec<ArtifactEntry>>::new();
        for entry in self.store.list_tiles(TileFormat::Pmtiles)? {
            let schema = entry.schema.clone().unwrap_or_default();
            grouped.entry(schema).or_default().push(entry);
        }
        Ok(grouped)
    }
}
