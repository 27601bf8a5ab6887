//! Remote locations of everything the pipeline downloads.

use crate::domain::{RegionName, Schema};

pub const PLANET_PBF: &str = "https://planet.openstreetmap.org/pbf/planet-latest.osm.pbf";

pub const PMTILES_BINARY: &str = "https://github.com/protomaps/go-pmtiles/releases/download/v1.23.1/go-pmtiles_1.23.1_Linux_x86_64.tar.gz";

pub const SHAPEFILES: &[&str] = &[
    "https://naciscdn.org/naturalearth/10m/physical/ne_10m_antarctic_ice_shelves_polys.zip",
    "https://naciscdn.org/naturalearth/10m/cultural/ne_10m_urban_areas.zip",
    "https://naciscdn.org/naturalearth/10m/physical/ne_10m_glaciated_areas.zip",
    "https://osmdata.openstreetmap.de/download/water-polygons-split-4326.zip",
    "https://osmdata.openstreetmap.de/download/simplified-water-polygons-split-3857.zip",
];

pub const OPENMAPTILES_STYLES: &[(&str, &str)] = &[
    (
        "maptiler-basic-gl-style",
        "https://github.com/openmaptiles/maptiler-basic-gl-style/archive/refs/heads/master.zip",
    ),
    (
        "osm-bright-gl-style",
        "https://github.com/openmaptiles/osm-bright-gl-style/archive/refs/heads/master.zip",
    ),
];

pub const PROTOMAPS_BASEMAPS: &str = "https://github.com/protomaps/basemaps/archive/refs/heads/main.zip";

pub const VERSATILES_STYLES: &str =
    "https://github.com/versatiles-org/versatiles-style/releases/latest/download/styles.tar.gz";

/// Tilemaker configuration bundle for a schema.
#[derive(Debug, Clone, Copy)]
pub struct TilemakerBundle {
    pub schema: Schema,
    pub url: &'static str,
    pub archive: &'static str,
    /// Directory the archive unpacks to, under `resources/`.
    pub root: &'static str,
    pub process_script: &'static str,
    pub config: &'static str,
    /// Layers whose `source` points inside the bundle itself.
    pub bundled_layers: &'static [&'static str],
    /// Layers whose `source` is replaced by a downloaded shapefile.
    pub shapefile_layers: &'static [(&'static str, &'static str)],
}

pub const SHORTBREAD_TILEMAKER: TilemakerBundle = TilemakerBundle {
    schema: Schema::Shortbread,
    url: "https://github.com/shortbread-tiles/shortbread-tilemaker/archive/refs/heads/main.zip",
    archive: "shortbread-tilemaker.zip",
    root: "shortbread-tilemaker-main",
    process_script: "process.lua",
    config: "config.json",
    bundled_layers: &["boundary_labels"],
    shapefile_layers: &[
        ("ocean", "water-polygons-split-4326/water_polygons.shp"),
        (
            "ocean-low",
            "simplified-water-polygons-split-4326/simplified_water_polygons.shp",
        ),
    ],
};

pub const OPENMAPTILES_TILEMAKER: TilemakerBundle = TilemakerBundle {
    schema: Schema::Openmaptiles,
    url: "https://github.com/systemed/tilemaker/archive/refs/tags/v3.0.0.zip",
    archive: "tilemaker.zip",
    root: "tilemaker-3.0.0",
    process_script: "resources/process-openmaptiles.lua",
    config: "resources/config-openmaptiles.json",
    bundled_layers: &[],
    shapefile_layers: &[
        ("ocean", "water-polygons-split-4326/water_polygons.shp"),
        ("urban_areas", "ne_10m_urban_areas.shp"),
        ("ice_shelf", "ne_10m_antarctic_ice_shelves_polys.shp"),
        ("glacier", "ne_10m_glaciated_areas.shp"),
    ],
};

pub fn pbf_url(region: &RegionName) -> String {
    if region.is_world() {
        PLANET_PBF.to_string()
    } else {
        format!("https://download.geofabrik.de/{}-latest.osm.pbf", region.as_str())
    }
}

/// Last path segment of a URL.
pub fn url_basename(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}
