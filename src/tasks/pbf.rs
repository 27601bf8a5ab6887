use crate::app::{App, DeleteResult, ListResult, ProgressEvent, ProgressSink, TaskOutcome};
use crate::domain::{NameSelector, RegionName};
use crate::error::MapsError;
use crate::fetch::Fetcher;
use crate::process::ProcessRunner;
use crate::sources;

impl<F: Fetcher, R: ProcessRunner> App<F, R> {
    pub fn download_pbf(
        &self,
        region: &RegionName,
        force: bool,
        sink: &dyn ProgressSink,
    ) -> Result<TaskOutcome, MapsError> {
        let url = sources::pbf_url(region);
        sink.event(ProgressEvent::Title(format!(
            "Downloading PBF data for \"{region}\" from {url}"
        )));
        let target = self.store.pbf_path(region);
        let artifacts = vec![self.store.relative(&target)];

        if self.skip_existing(
            &target,
            force,
            "The file already exists, skipping download.",
            sink,
        ) {
            return Ok(TaskOutcome::skipped("download:pbf", artifacts));
        }

        self.store.ensure_layout()?;
        self.download(&url, &target, sink)?;
        sink.event(ProgressEvent::Success(format!(
            "PBF data for \"{region}\" downloaded successfully!"
        )));
        Ok(TaskOutcome::completed("download:pbf", artifacts))
    }

    pub fn list_pbf(&self, sink: &dyn ProgressSink) -> Result<ListResult, MapsError> {
        sink.event(ProgressEvent::Title("pbf files".to_string()));
        Ok(ListResult {
            kind: "pbf".to_string(),
            entries: self.store.list_pbf()?,
        })
    }

    pub fn delete_pbf(
        &self,
        name: &NameSelector<RegionName>,
        sink: &dyn ProgressSink,
    ) -> Result<DeleteResult, MapsError> {
        sink.event(ProgressEvent::Title("Removing pbf files".to_string()));
        let removed = self.store.delete_pbf(name)?;
        report_removed("pbf", &removed, sink);
        Ok(DeleteResult {
            kind: "pbf".to_string(),
            removed,
        })
    }

    pub fn download_pmtiles_binary(
        &self,
        force: bool,
        sink: &dyn ProgressSink,
    ) -> Result<TaskOutcome, MapsError> {
        sink.event(ProgressEvent::Info("Downloading pmtiles".to_string()));
        let binary = self.store.pmtiles_binary();
        let artifacts = vec![self.store.relative(&binary)];
        if self.skip_existing(
            &binary,
            force,
            "The pmtiles binary already exists, skipping download.",
            sink,
        ) {
            return Ok(TaskOutcome::skipped("download:binaries:pmtiles", artifacts));
        }

        self.store.ensure_layout()?;
        let archive = self.store.bin_dir().join("go-pmtiles.tar.gz");
        self.download(sources::PMTILES_BINARY, &archive, sink)?;
        let target_dir = binary
            .parent()
            .map(|dir| dir.to_path_buf())
            .unwrap_or_else(|| self.store.bin_dir());
        self.extract(&archive, &target_dir)?;
        sink.event(ProgressEvent::Success(
            "Downloaded pmtiles successfully!".to_string(),
        ));
        Ok(TaskOutcome::completed("download:binaries:pmtiles", artifacts))
    }
}

pub(crate) fn report_removed(kind: &str, removed: &[String], sink: &dyn ProgressSink) {
    if removed.is_empty() {
        sink.event(ProgressEvent::Warning(format!(
            "No {kind} files found to delete."
        )));
        return;
    }
    sink.event(ProgressEvent::Info(format!(
        "Removed the following files: {}",
        removed.join(", ")
    )));
}
