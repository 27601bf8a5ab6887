use crate::app::{App, DeleteResult, ListResult, ProgressEvent, ProgressSink, TaskOutcome};
use crate::domain::{
    FormatSelector, NameSelector, RegionName, Schema, TargetName, TileFormat, TileName,
};
use crate::error::MapsError;
use crate::fetch::Fetcher;
use crate::process::{CommandLine, ProcessRunner};
use crate::store::Store;

use super::pbf::report_removed;

const WORLD_BBOX: &str = "-180,-90,180,90";

impl<F: Fetcher, R: ProcessRunner> App<F, R> {
    /// Renders `<name>.osm.pbf` into `tiles/mbtiles/<schema>/<target>.mbtiles`
    /// with tilemaker.
    pub fn generate_tiles(
        &self,
        region: &RegionName,
        schema: Schema,
        force: bool,
        target_name: Option<&TargetName>,
        sink: &dyn ProgressSink,
    ) -> Result<TaskOutcome, MapsError> {
        let pbf = self.store.pbf_path(region);
        self.require(&pbf, format!("cartos download pbf {region}"))?;

        let config = self.store.tilemaker_config(schema, "json");
        let process = self.store.tilemaker_config(schema, "lua");
        self.require(&config, tilemaker_config_hint(schema))?;
        self.require(&process, tilemaker_config_hint(schema))?;

        let name = target_name.map_or(region.stem(), TargetName::as_str);
        let target = self.store.tile_path(TileFormat::Mbtiles, schema, name);
        let artifacts = vec![self.store.relative(&target)];
        if self.skip_existing(
            &target,
            force,
            "The file already exists, skipping conversion.",
            sink,
        ) {
            return Ok(TaskOutcome::skipped("tiles:generate", artifacts));
        }

        self.ensure_tool_runtime()?;
        self.store.ensure_layout()?;
        let scratch = self.store.new_tilemaker_store();
        Store::ensure_dir(&scratch)?;
        if let Some(parent) = target.parent() {
            Store::ensure_dir(parent)?;
        }

        let command = CommandLine::argv([
            "tilemaker".to_string(),
            "--input".to_string(),
            self.store.relative(&pbf),
            "--output".to_string(),
            self.store.relative(&target),
            "--store".to_string(),
            self.store.relative(&scratch),
            "--shard-stores".to_string(),
            "--bbox".to_string(),
            WORLD_BBOX.to_string(),
            "--config".to_string(),
            self.store.relative(&config),
            "--process".to_string(),
            self.store.relative(&process),
        ]);
        let generated = self.run_tool(self.spec(command).timeout(None), None);
        let cleaned = self.remove_scratch(&scratch);
        generated?;
        cleaned?;

        sink.event(ProgressEvent::Success(format!(
            "mbtiles for \"{region}\" generated successfully!"
        )));
        Ok(TaskOutcome::completed("tiles:generate", artifacts))
    }

    pub fn convert_tiles(
        &self,
        tile: &TileName,
        target_name: Option<&TargetName>,
        force: bool,
        sink: &dyn ProgressSink,
    ) -> Result<TaskOutcome, MapsError> {
        let mbtiles = self
            .store
            .tile_path(TileFormat::Mbtiles, tile.schema, &tile.name);
        self.require(
            &mbtiles,
            format!("cartos tiles generate {} {}", tile.name, tile.schema),
        )?;
        let binary = self.store.pmtiles_binary();
        self.require(&binary, "cartos download binaries pmtiles".to_string())?;

        let name = target_name.map_or(tile.name.as_str(), TargetName::as_str);
        let target = self.store.tile_path(TileFormat::Pmtiles, tile.schema, name);
        let artifacts = vec![self.store.relative(&target)];
        if self.skip_existing(
            &target,
            force,
            "The file already exists, skipping conversion.",
            sink,
        ) {
            return Ok(TaskOutcome::skipped("tiles:convert", artifacts));
        }

        self.store.ensure_layout()?;
        if let Some(parent) = target.parent() {
            Store::ensure_dir(parent)?;
        }
        let command = CommandLine::argv([
            self.store.relative(&binary),
            "convert".to_string(),
            self.store.relative(&mbtiles),
            self.store.relative(&target),
        ]);
        self.run_tool(self.spec(command).timeout(None), None)?;

        sink.event(ProgressEvent::Success(format!(
            "Successfully converted {} into {}",
            self.store.relative(&mbtiles),
            self.store.relative(&target)
        )));
        Ok(TaskOutcome::completed("tiles:convert", artifacts))
    }

    pub fn list_tiles(
        &self,
        format: Option<TileFormat>,
        sink: &dyn ProgressSink,
    ) -> Result<Vec<ListResult>, MapsError> {
        let formats = match format {
            Some(format) => vec![format],
            None => TileFormat::ALL.to_vec(),
        };
        let mut results = Vec::new();
        for format in formats {
            sink.event(ProgressEvent::Title(format!("{format} files")));
            results.push(ListResult {
                kind: format.to_string(),
                entries: self.store.list_tiles(format)?,
            });
        }
        Ok(results)
    }

    pub fn delete_tiles(
        &self,
        formats: FormatSelector,
        name: &NameSelector<TileName>,
        sink: &dyn ProgressSink,
    ) -> Result<Vec<DeleteResult>, MapsError> {
        let mut results = Vec::new();
        for format in formats.formats() {
            sink.event(ProgressEvent::Title(format!("Removing {format} files")));
            let removed = self.store.delete_tiles(format, name)?;
            report_removed(format.as_str(), &removed, sink);
            results.push(DeleteResult {
                kind: format.to_string(),
                removed,
            });
        }
        Ok(results)
    }
}

fn tilemaker_config_hint(schema: Schema) -> String {
    match schema {
        Schema::Openmaptiles | Schema::Shortbread => {
            format!("cartos resources download {schema}")
        }
        Schema::ProtomapsBasemaps => "git checkout -- tilemaker-configs".to_string(),
    }
}
