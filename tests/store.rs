use std::fs;

use camino::Utf8PathBuf;

use cartos::domain::{Artifact, NameSelector, RegionName, Schema, TileFormat, TileName};
use cartos::store::Store;

fn temp_store() -> (tempfile::TempDir, Store) {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    let store = Store::new_with_paths(root.clone(), root.join("data"));
    (temp, store)
}

fn touch(path: &Utf8PathBuf, content: &[u8]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

#[test]
fn resolve_is_deterministic() {
    let (_temp, store) = temp_store();
    let artifacts = [
        Artifact::Pbf {
            name: "monaco".to_string(),
        },
        Artifact::Tiles {
            format: TileFormat::Mbtiles,
            schema: Schema::Openmaptiles,
            name: "monaco".to_string(),
        },
        Artifact::Shapefile {
            name: "ne_10m_urban_areas.shp".to_string(),
        },
        Artifact::Style {
            name: "versatiles-style".to_string(),
        },
        Artifact::Binary {
            name: "pmtiles".to_string(),
        },
    ];
    for artifact in &artifacts {
        assert_eq!(store.resolve(artifact), store.resolve(artifact));
        assert!(store.resolve(artifact).starts_with(store.data_root()));
    }
    assert!(store
        .resolve(&artifacts[1])
        .ends_with("tiles/mbtiles/openmaptiles/monaco.mbtiles"));
}

#[test]
fn ensure_layout_creates_directories() {
    let (_temp, store) = temp_store();
    store.ensure_layout().unwrap();
    for dir in [
        "bin/pmtiles",
        "tiles/mbtiles",
        "tiles/pbf",
        "tiles/pmtiles",
        "resources/shapefiles",
        "resources/styles/versatiles-style",
        "tmp/store",
    ] {
        assert!(store.data_root().join(dir).is_dir(), "{dir} missing");
    }
    store.ensure_layout().unwrap();
}

#[test]
fn list_tiles_reads_one_schema_level() {
    let (_temp, store) = temp_store();
    touch(
        &store.tile_path(TileFormat::Pmtiles, Schema::Shortbread, "monaco"),
        b"pm",
    );
    touch(
        &store.tile_path(TileFormat::Pmtiles, Schema::Openmaptiles, "andorra"),
        b"pmtiles",
    );
    touch(&store.tiles_dir(TileFormat::Pmtiles).join("stray.pmtiles"), b"x");
    touch(
        &store.tiles_dir(TileFormat::Pmtiles).join("shortbread/notes.txt"),
        b"x",
    );

    let entries = store.list_tiles(TileFormat::Pmtiles).unwrap();
    let names = entries
        .iter()
        .map(|entry| format!("{}/{}", entry.schema.as_deref().unwrap(), entry.name))
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["openmaptiles/andorra", "shortbread/monaco"]);
    assert_eq!(entries[0].size, 7);

    assert!(store.list_tiles(TileFormat::Mbtiles).unwrap().is_empty());
}

#[test]
fn delete_all_pbf_then_again() {
    let (_temp, store) = temp_store();
    for name in ["monaco", "andorra"] {
        let region: RegionName = name.parse().unwrap();
        touch(&store.pbf_path(&region), b"pbf");
    }

    let removed = store.delete_pbf(&NameSelector::All).unwrap();
    assert_eq!(removed.len(), 2);
    assert!(removed.iter().all(|path| path.ends_with(".osm.pbf")));
    assert!(store.list_pbf().unwrap().is_empty());

    let removed = store.delete_pbf(&NameSelector::All).unwrap();
    assert!(removed.is_empty());
}

#[test]
fn delete_one_tile_set() {
    let (_temp, store) = temp_store();
    let monaco = store.tile_path(TileFormat::Mbtiles, Schema::Shortbread, "monaco");
    let andorra = store.tile_path(TileFormat::Mbtiles, Schema::Shortbread, "andorra");
    touch(&monaco, b"mb");
    touch(&andorra, b"mb");

    let tile: TileName = "shortbread/monaco".parse().unwrap();
    let removed = store
        .delete_tiles(TileFormat::Mbtiles, &NameSelector::One(tile))
        .unwrap();
    assert_eq!(removed, vec![monaco.to_string()]);
    assert!(!monaco.exists());
    assert!(andorra.exists());
}
