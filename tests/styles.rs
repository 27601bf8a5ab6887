use std::fs;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;
use serde_json::json;

use cartos::domain::{Schema, TileFormat};
use cartos::error::MapsError;
use cartos::store::Store;
use cartos::styles::{StyleCatalog, TilesRepository};

fn temp_store() -> (tempfile::TempDir, Store) {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    let store = Store::new_with_paths(root.clone(), root.join("data"));
    (temp, store)
}

fn write(path: &Utf8PathBuf, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

#[test]
fn style_points_at_the_pmtiles_archive() {
    let (_temp, store) = temp_store();
    let style = store.styles_dir().join("versatiles-style/colorful.json");
    write(
        &style,
        &json!({
            "version": 8,
            "sources": { "versatiles-shortbread": { "type": "vector", "url": "https://tiles.versatiles.org" } },
            "layers": [{ "id": "background", "type": "background" }]
        })
        .to_string(),
    );

    let catalog = StyleCatalog::new(store);
    let document = catalog
        .style_document(Schema::Shortbread, "monaco", "colorful", "http://localhost:8000/")
        .unwrap();
    assert_eq!(
        document["sources"],
        json!({
            "versatiles-shortbread": {
                "type": "vector",
                "url": "pmtiles://http://localhost:8000/pmtiles/shortbread/monaco.pmtiles"
            }
        })
    );
    assert_eq!(document["layers"][0]["id"], "background");
}

#[test]
fn missing_or_unknown_style_is_not_found() {
    let (_temp, store) = temp_store();
    let catalog = StyleCatalog::new(store);

    let err = catalog
        .style_document(Schema::ProtomapsBasemaps, "monaco", "light", "http://localhost:8000")
        .unwrap_err();
    assert_matches!(err, MapsError::StyleNotFound { schema, style } if schema == "protomaps-basemaps" && style == "light");

    let err = catalog
        .style_document(Schema::Openmaptiles, "monaco", "neon", "http://localhost:8000")
        .unwrap_err();
    assert_matches!(err, MapsError::StyleNotFound { .. });
}

#[test]
fn catalog_lists_every_schema() {
    let (_temp, store) = temp_store();
    let available = StyleCatalog::new(store).available();
    assert_eq!(available.len(), 3);
    let openmaptiles = &available[0];
    assert_eq!(openmaptiles.schema, Schema::Openmaptiles);
    assert_eq!(openmaptiles.default_style, "basic");
}

#[test]
fn repository_sees_generated_pmtiles() {
    let (_temp, store) = temp_store();
    write(
        &store.tile_path(TileFormat::Pmtiles, Schema::Shortbread, "monaco"),
        "pm",
    );
    write(
        &store.tile_path(TileFormat::Mbtiles, Schema::Openmaptiles, "andorra"),
        "mb",
    );

    let repository = TilesRepository::new(store);
    assert!(repository.has(Schema::Shortbread, "monaco"));
    assert!(!repository.has(Schema::Openmaptiles, "andorra"));

    let listed = repository.list().unwrap();
    assert_eq!(listed.keys().collect::<Vec<_>>(), vec!["shortbread"]);
    assert_eq!(listed["shortbread"][0].name, "monaco");
}
