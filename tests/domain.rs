use assert_matches::assert_matches;

use cartos::domain::{
    Artifact, ArtifactKind, FormatSelector, NameSelector, RegionName, Schema, TileFormat, TileName,
};
use cartos::error::MapsError;

#[test]
fn parse_region_lowercases() {
    let region: RegionName = "Europe/Monaco".parse().unwrap();
    assert_eq!(region.as_str(), "europe/monaco");
    assert_eq!(region.stem(), "monaco");
    assert!(!region.is_world());
    assert!("world".parse::<RegionName>().unwrap().is_world());
}

#[test]
fn parse_region_invalid() {
    for value in ["", "../etc", "europe//monaco", "monaco/", "mon aco"] {
        let err = value.parse::<RegionName>().unwrap_err();
        assert_matches!(err, MapsError::InvalidRegion(_));
    }
}

#[test]
fn parse_schema_and_format() {
    assert_eq!(
        "protomaps-basemaps".parse::<Schema>().unwrap(),
        Schema::ProtomapsBasemaps
    );
    assert_eq!("pmtiles".parse::<TileFormat>().unwrap(), TileFormat::Pmtiles);

    let err = "geojson".parse::<TileFormat>().unwrap_err();
    assert_matches!(err, MapsError::InvalidArgument(message) if message.contains("mbtiles, pmtiles"));
    let err = "osm".parse::<Schema>().unwrap_err();
    assert_matches!(err, MapsError::InvalidArgument(_));
}

#[test]
fn parse_tile_name() {
    let tile: TileName = "shortbread/monaco".parse().unwrap();
    assert_eq!(tile.schema, Schema::Shortbread);
    assert_eq!(tile.name, "monaco");
    assert_eq!(tile.to_string(), "shortbread/monaco");

    let err = "monaco".parse::<TileName>().unwrap_err();
    assert_matches!(err, MapsError::InvalidArgument(message) if message.contains("schema/name"));
}

#[test]
fn selectors() {
    assert_eq!("all".parse::<FormatSelector>().unwrap(), FormatSelector::All);
    assert_eq!(
        FormatSelector::All.formats(),
        vec![TileFormat::Mbtiles, TileFormat::Pmtiles]
    );
    assert_matches!(
        "tar".parse::<FormatSelector>(),
        Err(MapsError::InvalidArgument(message)) if message.contains("Pass \"all\"")
    );

    assert_eq!(
        "all".parse::<NameSelector<RegionName>>().unwrap(),
        NameSelector::All
    );
    assert_matches!(
        "".parse::<NameSelector<TileName>>(),
        Err(MapsError::InvalidArgument(message)) if message.contains("must provide a name")
    );
}

#[test]
fn artifact_from_parts() {
    let artifact = Artifact::from_parts("mbtiles", Some("openmaptiles"), "monaco").unwrap();
    assert_eq!(artifact.kind(), ArtifactKind::Mbtiles);
    assert_eq!(
        artifact,
        Artifact::Tiles {
            format: TileFormat::Mbtiles,
            schema: Schema::Openmaptiles,
            name: "monaco".to_string(),
        }
    );

    assert_matches!(
        Artifact::from_parts("geotiff", None, "monaco"),
        Err(MapsError::InvalidArgument(_))
    );
    assert_matches!(
        Artifact::from_parts("pmtiles", None, "monaco"),
        Err(MapsError::InvalidArgument(_))
    );
}
