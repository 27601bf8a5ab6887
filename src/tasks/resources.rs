use std::fs;

use serde_json::Value;
use tracing::{info, warn};

use crate::app::{App, ProgressEvent, ProgressSink, TaskOutcome};
use crate::error::MapsError;
use crate::fetch::Fetcher;
use crate::process::{CommandLine, ProcessRunner};
use crate::sources::{self, TilemakerBundle};
use crate::store::Store;

const SIMPLIFIED_WGS84: &str = "simplified-water-polygons-split-4326/simplified_water_polygons.shp";
const SIMPLIFIED_MERCATOR: &str = "simplified-water-polygons-split-3857/simplified_water_polygons.shp";

impl<F: Fetcher, R: ProcessRunner> App<F, R> {
    pub fn download_shapefiles(
        &self,
        force: bool,
        sink: &dyn ProgressSink,
    ) -> Result<TaskOutcome, MapsError> {
        sink.event(ProgressEvent::Title("Downloading shapefiles".to_string()));
        self.store.ensure_layout()?;
        let dir = self.store.shapefiles_dir();
        let mut artifacts = Vec::new();
        let mut changed = false;

        for url in sources::SHAPEFILES {
            let archive = dir.join(sources::url_basename(url));
            let relative = self.store.relative(&archive);
            artifacts.push(relative.clone());
            let message = format!("The file {relative} already exists, skipping download.");
            if self.skip_existing(&archive, force, &message, sink) {
                continue;
            }
            sink.event(ProgressEvent::Info(format!("Downloading {url}")));
            self.download(url, &archive, sink)?;
            self.extract(&archive, &dir)?;
            changed = true;
        }

        let wgs84 = dir.join(SIMPLIFIED_WGS84);
        artifacts.push(self.store.relative(&wgs84));
        let message =
            "The WGS84 simplified water polygons file already exists, skipping conversion.";
        if !self.skip_existing(&wgs84, force, message, sink) {
            if let Some(parent) = wgs84.parent() {
                Store::ensure_dir(parent)?;
            }
            let mut argv = vec![
                "ogr2ogr".to_string(),
                "-f".to_string(),
                "ESRI Shapefile".to_string(),
            ];
            if force {
                argv.push("-overwrite".to_string());
            }
            argv.extend([
                self.store.relative(&wgs84),
                self.store.relative(&dir.join(SIMPLIFIED_MERCATOR)),
                "-t_srs".to_string(),
                "EPSG:4326".to_string(),
                "-lco".to_string(),
                "ENCODING=utf8".to_string(),
            ]);
            self.run_tool(self.spec(CommandLine::Argv(argv)).timeout(None), None)?;
            changed = true;
        }

        if !changed {
            return Ok(TaskOutcome::skipped("resources:download:shapefiles", artifacts));
        }
        sink.event(ProgressEvent::Success(
            "Downloaded and converted shapefiles successfully!".to_string(),
        ));
        Ok(TaskOutcome::completed("resources:download:shapefiles", artifacts))
    }

    pub fn download_shortbread_resources(
        &self,
        force: bool,
        sink: &dyn ProgressSink,
    ) -> Result<Vec<TaskOutcome>, MapsError> {
        let shapefiles = self.download_shapefiles(false, sink)?;
        let bundle = self.install_tilemaker_bundle(&sources::SHORTBREAD_TILEMAKER, force, sink)?;
        Ok(vec![shapefiles, bundle])
    }

    pub fn download_openmaptiles_resources(
        &self,
        force: bool,
        sink: &dyn ProgressSink,
    ) -> Result<Vec<TaskOutcome>, MapsError> {
        let shapefiles = self.download_shapefiles(false, sink)?;
        let bundle =
            self.install_tilemaker_bundle(&sources::OPENMAPTILES_TILEMAKER, force, sink)?;
        Ok(vec![shapefiles, bundle])
    }

    pub fn download_all_resources(
        &self,
        force: bool,
        sink: &dyn ProgressSink,
    ) -> Result<Vec<TaskOutcome>, MapsError> {
        Ok(vec![
            self.download_shapefiles(force, sink)?,
            self.install_tilemaker_bundle(&sources::SHORTBREAD_TILEMAKER, force, sink)?,
            self.install_tilemaker_bundle(&sources::OPENMAPTILES_TILEMAKER, force, sink)?,
        ])
    }

    /// Downloads a tilemaker config bundle and writes
    /// `tilemaker-configs/<schema>.{lua,json}` pointing at local files.
    fn install_tilemaker_bundle(
        &self,
        bundle: &TilemakerBundle,
        force: bool,
        sink: &dyn ProgressSink,
    ) -> Result<TaskOutcome, MapsError> {
        let task = format!("resources:download:{}", bundle.schema);
        sink.event(ProgressEvent::Info(format!("Downloading {}", bundle.root)));
        self.store.ensure_layout()?;

        let resources = self.store.resources_dir();
        let archive = resources.join(bundle.archive);
        let mut changed = false;
        let message = format!(
            "The file {} already exists, skipping download.",
            self.store.relative(&archive)
        );
        if !self.skip_existing(&archive, force, &message, sink) {
            self.download(bundle.url, &archive, sink)?;
            self.extract(&archive, &resources)?;
            changed = true;
        }

        let lua = self.store.tilemaker_config(bundle.schema, "lua");
        let json = self.store.tilemaker_config(bundle.schema, "json");
        let artifacts = vec![self.store.relative(&lua), self.store.relative(&json)];
        if !force && !changed && self.store.exists(&lua) && self.store.exists(&json) {
            sink.event(ProgressEvent::Warning(format!(
                "The {} tilemaker config already exists, skipping.",
                bundle.schema
            )));
            return Ok(TaskOutcome::skipped(task, artifacts));
        }

        let root = resources.join(bundle.root);
        let script = root.join(bundle.process_script);
        let config = root.join(bundle.config);
        let hint = format!("cartos resources download {} --force", bundle.schema);
        self.require(&script, hint.clone())?;
        self.require(&config, hint)?;

        Store::ensure_dir(&self.store.tilemaker_configs_dir())?;
        fs::copy(script.as_std_path(), lua.as_std_path())
            .map_err(|err| MapsError::Filesystem(format!("copy {script} to {lua}: {err}")))?;

        let content = fs::read_to_string(config.as_std_path())
            .map_err(|err| MapsError::Filesystem(format!("read {config}: {err}")))?;
        let mut document: Value = serde_json::from_str(&content)
            .map_err(|err| MapsError::Filesystem(format!("parse {config}: {err}")))?;
        rewrite_layer_sources(
            &mut document,
            bundle,
            &self.store.relative(&root),
            &self.store.relative(&self.store.shapefiles_dir()),
        )?;
        let rendered = serde_json::to_string_pretty(&document)
            .map_err(|err| MapsError::Filesystem(err.to_string()))?;
        fs::write(json.as_std_path(), rendered)
            .map_err(|err| MapsError::Filesystem(format!("write {json}: {err}")))?;
        info!(config = %json, "tilemaker config written");

        sink.event(ProgressEvent::Success(format!(
            "Downloaded {} tilemaker config successfully!",
            bundle.schema
        )));
        Ok(TaskOutcome::completed(task, artifacts))
    }
}

/// Points the layer sources of a tilemaker config at local files: bundled
/// layers are prefixed with `bundle_dir`, shapefile layers are replaced by
/// their file under `shapefiles_dir`.
pub fn rewrite_layer_sources(
    document: &mut Value,
    bundle: &TilemakerBundle,
    bundle_dir: &str,
    shapefiles_dir: &str,
) -> Result<(), MapsError> {
    let layers = document
        .get_mut("layers")
        .and_then(Value::as_object_mut)
        .ok_or_else(|| {
            MapsError::Filesystem(format!(
                "{} tilemaker config has no layers",
                bundle.schema
            ))
        })?;

    for name in bundle.bundled_layers {
        let Some(layer) = layers.get_mut(*name).and_then(Value::as_object_mut) else {
            warn!(layer = name, "layer missing from tilemaker config");
            continue;
        };
        if let Some(source) = layer.get("source").and_then(Value::as_str) {
            let source = format!("{}/{source}", bundle_dir.trim_end_matches('/'));
            layer.insert("source".to_string(), Value::String(source));
        }
    }

    for (name, file) in bundle.shapefile_layers {
        let Some(layer) = layers.get_mut(*name).and_then(Value::as_object_mut) else {
            warn!(layer = name, "layer missing from tilemaker config");
            continue;
        };
        layer.insert(
            "source".to_string(),
            Value::String(format!("{}/{file}", shapefiles_dir.trim_end_matches('/'))),
        );
    }
    Ok(())
}
