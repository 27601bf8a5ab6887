use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tracing::{debug, warn};

use crate::archive;
use crate::config::Settings;
use crate::container::ContainerRunner;
use crate::error::MapsError;
use crate::fetch::Fetcher;
use crate::process::{CommandLine, ProcessOutcome, ProcessRunner, ProcessSpec};
use crate::store::{ArtifactEntry, Store};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Completed,
    /// The target was already there and nothing was touched.
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskOutcome {
    pub task: String,
    pub status: TaskStatus,
    pub artifacts: Vec<String>,
}

impl TaskOutcome {
    pub fn completed(task: impl Into<String>, artifacts: Vec<String>) -> Self {
        Self {
            task: task.into(),
            status: TaskStatus::Completed,
            artifacts,
        }
    }

    pub fn skipped(task: impl Into<String>, artifacts: Vec<String>) -> Self {
        Self {
            task: task.into(),
            status: TaskStatus::Skipped,
            artifacts,
        }
    }

    pub fn is_skipped(&self) -> bool {
        self.status == TaskStatus::Skipped
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ListResult {
    pub kind: String,
    pub entries: Vec<ArtifactEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteResult {
    pub kind: String,
    pub removed: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Title(String),
    Info(String),
    Success(String),
    Warning(String),
    DownloadStarted { url: String, destination: String },
    DownloadProgress { received: u64, total: Option<u64> },
    DownloadFinished { destination: String, ok: bool },
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

/// Task pipeline: every task checks its inputs, skips when its target is
/// already on disk, then runs its steps in order and stops at the first
/// failure.
pub struct App<F: Fetcher, R: ProcessRunner> {
    pub(crate) settings: Settings,
    pub(crate) store: Store,
    pub(crate) fetcher: F,
    pub(crate) runner: R,
}

impl<F: Fetcher, R: ProcessRunner> App<F, R> {
    pub fn new(settings: Settings, fetcher: F, runner: R) -> Self {
        let store = Store::new(&settings);
        Self {
            settings,
            store,
            fetcher,
            runner,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Fails with `MissingInput` unless `path` exists.
    pub(crate) fn require(&self, path: &Utf8Path, hint: String) -> Result<(), MapsError> {
        if self.store.exists(path) {
            return Ok(());
        }
        Err(MapsError::MissingInput {
            artifact: self.store.relative(path),
            hint,
        })
    }

    /// True when the task must stop because `target` is already there.
    pub(crate) fn skip_existing(
        &self,
        target: &Utf8Path,
        force: bool,
        message: &str,
        sink: &dyn ProgressSink,
    ) -> bool {
        if force || !self.store.exists(target) {
            return false;
        }
        debug!(target = %target, "target exists, skipping");
        sink.event(ProgressEvent::Warning(message.to_string()));
        true
    }

    pub(crate) fn download(
        &self,
        url: &str,
        destination: &Utf8Path,
        sink: &dyn ProgressSink,
    ) -> Result<(), MapsError> {
        sink.event(ProgressEvent::DownloadStarted {
            url: url.to_string(),
            destination: self.store.relative(destination),
        });
        let mut report = |received: u64, total: Option<u64>| {
            sink.event(ProgressEvent::DownloadProgress { received, total });
        };
        let result = self
            .fetcher
            .fetch(url, destination.as_std_path(), &mut report);
        sink.event(ProgressEvent::DownloadFinished {
            destination: self.store.relative(destination),
            ok: result.is_ok(),
        });
        result
    }

    pub(crate) fn extract(&self, archive: &Utf8Path, target_dir: &Utf8Path) -> Result<(), MapsError> {
        Store::ensure_dir(target_dir)?;
        archive::extract(archive.as_std_path(), target_dir.as_std_path(), &self.runner)
    }

    /// Process spec with the configured default timeout.
    pub(crate) fn spec(&self, command: CommandLine) -> ProcessSpec {
        ProcessSpec::new(command).timeout(self.settings.default_timeout)
    }

    /// Runs an external tool from the project root, inside the maps
    /// container unless it is disabled. `workdir` is relative to the root.
    pub(crate) fn run_tool(
        &self,
        spec: ProcessSpec,
        workdir: Option<&str>,
    ) -> Result<ProcessOutcome, MapsError> {
        if self.settings.container.enabled {
            return self.container().run(&spec, workdir);
        }
        let dir: Utf8PathBuf = match workdir {
            Some(dir) => self.settings.project_root.join(dir),
            None => self.settings.project_root.clone(),
        };
        self.runner.run(&spec.working_dir(dir.into_std_path_buf()))
    }

    /// Fails before any state is created when tools would run in a
    /// container whose image is missing.
    pub(crate) fn ensure_tool_runtime(&self) -> Result<(), MapsError> {
        if self.settings.container.enabled {
            self.container().ensure_image()?;
        }
        Ok(())
    }

    pub(crate) fn container(&self) -> ContainerRunner<'_, R> {
        ContainerRunner::new(
            &self.runner,
            &self.settings.container,
            &self.settings.project_root,
        )
        .with_data_root(self.store.data_root())
    }

    /// Removes a scratch directory through the same runner that filled it,
    /// so files owned by the container user go away too.
    pub(crate) fn remove_scratch(&self, dir: &Utf8Path) -> Result<(), MapsError> {
        let command = CommandLine::argv(["rm", "-rf", self.store.relative(dir).as_str()]);
        if let Err(err) = self.run_tool(self.spec(command), None) {
            warn!(%dir, %err, "failed to remove scratch directory");
            return Err(err);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::Mutex;

    struct NoNetwork;

    impl Fetcher for NoNetwork {
        fn fetch(
            &self,
            url: &str,
            _destination: &Path,
            progress: &mut crate::fetch::ProgressCallback<'_>,
        ) -> Result<(), MapsError> {
            progress(0, None);
            Err(MapsError::Network {
                url: url.to_string(),
                message: "offline".to_string(),
            })
        }
    }

    struct Noop;

    impl ProcessRunner for Noop {
        fn run(&self, _spec: &ProcessSpec) -> Result<ProcessOutcome, MapsError> {
            Ok(ProcessOutcome {
                code: Some(0),
                success: true,
                stdout: String::new(),
                stderr: String::new(),
            })
        }
    }

    #[derive(Default)]
    struct Events(Mutex<Vec<ProgressEvent>>);

    impl ProgressSink for Events {
        fn event(&self, event: ProgressEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    fn app(root: &Path) -> App<NoNetwork, Noop> {
        let root = Utf8PathBuf::from_path_buf(root.to_path_buf()).unwrap();
        App::new(Settings::for_project(root), NoNetwork, Noop)
    }

    #[test]
    fn failed_download_still_closes_the_progress() {
        let temp = tempfile::tempdir().unwrap();
        let app = app(temp.path());
        let events = Events::default();
        let destination = app.store.pbf_dir().join("monaco.osm.pbf");

        let err = app
            .download("https://example.invalid/monaco", &destination, &events)
            .unwrap_err();
        assert!(matches!(err, MapsError::Network { .. }));

        let events = events.0.lock().unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(
            events[2],
            ProgressEvent::DownloadFinished {
                destination: "data/tiles/pbf/monaco.osm.pbf".to_string(),
                ok: false,
            }
        );
    }

    #[test]
    fn require_reports_relative_artifact() {
        let temp = tempfile::tempdir().unwrap();
        let app = app(temp.path());
        let err = app
            .require(&app.store.pmtiles_binary(), "cartos download binaries pmtiles".to_string())
            .unwrap_err();
        match err {
            MapsError::MissingInput { artifact, hint } => {
                assert_eq!(artifact, "data/bin/pmtiles/pmtiles");
                assert_eq!(hint, "cartos download binaries pmtiles");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
