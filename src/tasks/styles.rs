use clap::ValueEnum;

use crate::app::{App, ProgressEvent, ProgressSink, TaskOutcome};
use crate::error::MapsError;
use crate::fetch::Fetcher;
use crate::process::{CommandLine, ProcessRunner};
use crate::sources;

const BASEMAPS_BUILD: &str = "npm install && npm run generate-styles pmtiles:///pmtiles";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StyleSource {
    Openmaptiles,
    ProtomapsBasemaps,
    Versatiles,
    All,
}

impl<F: Fetcher, R: ProcessRunner> App<F, R> {
    pub fn download_styles(
        &self,
        source: StyleSource,
        force: bool,
        sink: &dyn ProgressSink,
    ) -> Result<Vec<TaskOutcome>, MapsError> {
        match source {
            StyleSource::Openmaptiles => Ok(vec![self.download_openmaptiles_styles(force, sink)?]),
            StyleSource::ProtomapsBasemaps => Ok(vec![self.download_protomaps_styles(force, sink)?]),
            StyleSource::Versatiles => Ok(vec![self.download_versatiles_styles(force, sink)?]),
            StyleSource::All => Ok(vec![
                self.download_openmaptiles_styles(force, sink)?,
                self.download_protomaps_styles(force, sink)?,
                self.download_versatiles_styles(force, sink)?,
            ]),
        }
    }

    fn download_openmaptiles_styles(
        &self,
        force: bool,
        sink: &dyn ProgressSink,
    ) -> Result<TaskOutcome, MapsError> {
        sink.event(ProgressEvent::Info(
            "Downloading openmaptiles styles".to_string(),
        ));
        self.store.ensure_layout()?;
        let styles_dir = self.store.styles_dir();
        let mut artifacts = Vec::new();
        let mut changed = false;

        for (name, url) in sources::OPENMAPTILES_STYLES {
            let archive = styles_dir.join(format!("{name}.zip"));
            let relative = self.store.relative(&archive);
            artifacts.push(relative.clone());
            let message = format!("The file {relative} already exists, skipping download.");
            if self.skip_existing(&archive, force, &message, sink) {
                continue;
            }
            self.download(url, &archive, sink)?;
            self.extract(&archive, &styles_dir)?;
            changed = true;
        }

        if !changed {
            return Ok(TaskOutcome::skipped("styles:download:openmaptiles", artifacts));
        }
        sink.event(ProgressEvent::Success(
            "Downloaded openmaptiles styles successfully!".to_string(),
        ));
        Ok(TaskOutcome::completed("styles:download:openmaptiles", artifacts))
    }

    fn download_protomaps_styles(
        &self,
        force: bool,
        sink: &dyn ProgressSink,
    ) -> Result<TaskOutcome, MapsError> {
        sink.event(ProgressEvent::Info(
            "Downloading protomaps basemaps styles".to_string(),
        ));
        self.store.ensure_layout()?;
        let styles_dir = self.store.styles_dir();
        let archive = styles_dir.join("protomaps.zip");
        let artifacts = vec![self.store.relative(&archive)];
        let message = format!(
            "The file {} already exists, skipping download.",
            self.store.relative(&archive)
        );
        if self.skip_existing(&archive, force, &message, sink) {
            return Ok(TaskOutcome::skipped(
                "styles:download:protomaps-basemaps",
                artifacts,
            ));
        }

        self.download(sources::PROTOMAPS_BASEMAPS, &archive, sink)?;
        self.extract(&archive, &styles_dir)?;

        let build_dir = self.store.relative(&styles_dir.join("basemaps-main/styles"));
        self.run_tool(
            self.spec(CommandLine::shell(BASEMAPS_BUILD)).timeout(None),
            Some(&build_dir),
        )?;
        sink.event(ProgressEvent::Success(
            "Downloaded and built protomaps basemaps styles successfully!".to_string(),
        ));
        Ok(TaskOutcome::completed(
            "styles:download:protomaps-basemaps",
            artifacts,
        ))
    }

    fn download_versatiles_styles(
        &self,
        force: bool,
        sink: &dyn ProgressSink,
    ) -> Result<TaskOutcome, MapsError> {
        sink.event(ProgressEvent::Info("Downloading versatiles styles".to_string()));
        self.store.ensure_layout()?;
        let styles_dir = self.store.styles_dir();
        let archive = styles_dir.join("versatiles-style-latest.tar.gz");
        let artifacts = vec![self.store.relative(&archive)];
        let message = format!(
            "The file {} already exists, skipping download.",
            self.store.relative(&archive)
        );
        if self.skip_existing(&archive, force, &message, sink) {
            return Ok(TaskOutcome::skipped("styles:download:versatiles", artifacts));
        }

        self.download(sources::VERSATILES_STYLES, &archive, sink)?;
        self.extract(&archive, &styles_dir.join("versatiles-style"))?;
        sink.event(ProgressEvent::Success(
            "Downloaded versatiles styles successfully!".to_string(),
        ));
        Ok(TaskOutcome::completed("styles:download:versatiles", artifacts))
    }
}
