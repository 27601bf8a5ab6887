use camino::Utf8Path;
use tracing::debug;

use crate::config::ContainerSettings;
use crate::error::MapsError;
use crate::process::{CommandLine, ProcessOutcome, ProcessRunner, ProcessSpec};

/// Runs shell lines inside the maps image, with the project mounted.
pub struct ContainerRunner<'a, R: ProcessRunner> {
    runner: &'a R,
    settings: &'a ContainerSettings,
    host_root: &'a Utf8Path,
    data_root: Option<&'a Utf8Path>,
}

impl<'a, R: ProcessRunner> ContainerRunner<'a, R> {
    pub fn new(runner: &'a R, settings: &'a ContainerSettings, host_root: &'a Utf8Path) -> Self {
        Self {
            runner,
            settings,
            host_root,
            data_root: None,
        }
    }

    /// A data directory outside the project is mounted at its host path,
    /// so the absolute paths tools receive for it resolve the same way.
    pub fn with_data_root(mut self, data_root: &'a Utf8Path) -> Self {
        self.data_root = Some(data_root);
        self
    }

    pub fn image_exists(&self) -> Result<bool, MapsError> {
        let probe = ProcessSpec::new(CommandLine::argv([
            self.settings.runtime.as_str(),
            "image",
            "inspect",
            self.settings.image.as_str(),
        ]))
        .allow_failure(true)
        .quiet(true);
        Ok(self.runner.run(&probe)?.success)
    }

    pub fn ensure_image(&self) -> Result<(), MapsError> {
        if self.image_exists()? {
            return Ok(());
        }
        Err(MapsError::Precondition(format!(
            "Unable to find {} image. Did you forget to run `cartos infra build`?",
            self.settings.image
        )))
    }

    /// `spec.command` runs through `/bin/bash -c` in the container. The
    /// working directory, when given, is relative to the mount point.
    /// Timeout, quietness, failure tolerance and the environment overlay
    /// apply to the runtime process itself.
    pub fn run(
        &self,
        spec: &ProcessSpec,
        workdir: Option<&str>,
    ) -> Result<ProcessOutcome, MapsError> {
        self.ensure_image()?;
        let wrapped = self.wrap(&spec.command, workdir, spec.tty);
        debug!(image = %self.settings.image, command = %spec.command, "running in container");
        let mut outer = spec.clone();
        outer.command = wrapped;
        outer.working_dir = None;
        self.runner.run(&outer)
    }

    pub fn wrap(&self, command: &CommandLine, workdir: Option<&str>, tty: bool) -> CommandLine {
        let mount_point = self.settings.mount_point.trim_end_matches('/');
        let mut argv = vec![
            self.settings.runtime.clone(),
            "run".to_string(),
            "--init".to_string(),
            "--rm".to_string(),
        ];
        if tty {
            argv.push("-i".to_string());
            argv.push("-t".to_string());
        }
        argv.push("--network=host".to_string());
        argv.push(format!("-v{}:{mount_point}:cached", self.host_root));
        if let Some(data_root) = self
            .data_root
            .filter(|data_root| !data_root.starts_with(self.host_root))
        {
            argv.push(format!("-v{data_root}:{data_root}:cached"));
        }
        argv.push("-w".to_string());
        argv.push(match workdir {
            Some(dir) if dir.starts_with('/') => dir.to_string(),
            Some(dir) => format!("{mount_point}/{}", dir.trim_matches('/')),
            None => mount_point.to_string(),
        });
        argv.push(self.settings.image.clone());
        argv.push("/bin/bash".to_string());
        argv.push("-c".to_string());
        argv.push(command.to_shell());
        CommandLine::Argv(argv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recording {
        image_present: bool,
        calls: Mutex<Vec<ProcessSpec>>,
    }

    impl ProcessRunner for Recording {
        fn run(&self, spec: &ProcessSpec) -> Result<ProcessOutcome, MapsError> {
            self.calls.lock().unwrap().push(spec.clone());
            let is_probe = matches!(&spec.command, CommandLine::Argv(argv) if argv.get(1).map(String::as_str) == Some("image"));
            let success = !is_probe || self.image_present;
            Ok(ProcessOutcome {
                code: Some(if success { 0 } else { 1 }),
                success,
                stdout: String::new(),
                stderr: String::new(),
            })
        }
    }

    fn settings() -> ContainerSettings {
        ContainerSettings {
            enabled: true,
            runtime: "docker".to_string(),
            image: "ghcr.io/jolicode/maps:abc".to_string(),
            mount_point: "/home/app/maps".to_string(),
        }
    }

    #[test]
    fn missing_image_is_a_precondition_error() {
        let runner = Recording {
            image_present: false,
            calls: Mutex::new(Vec::new()),
        };
        let settings = settings();
        let container = ContainerRunner::new(&runner, &settings, Utf8Path::new("/srv/maps"));
        let err = container
            .run(&ProcessSpec::new(CommandLine::shell("true")), None)
            .unwrap_err();
        assert!(matches!(err, MapsError::Precondition(message) if message.contains("cartos infra build")));
        assert_eq!(runner.calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn wraps_command_with_mount_and_workdir() {
        let runner = Recording {
            image_present: true,
            calls: Mutex::new(Vec::new()),
        };
        let settings = settings();
        let container = ContainerRunner::new(&runner, &settings, Utf8Path::new("/srv/maps"));
        container
            .run(
                &ProcessSpec::new(CommandLine::argv(["npm", "install"])).timeout(None),
                Some("data/resources/styles"),
            )
            .unwrap();

        let calls = runner.calls.lock().unwrap();
        let CommandLine::Argv(argv) = &calls[1].command else {
            panic!("expected argv");
        };
        assert_eq!(
            argv,
            &vec![
                "docker",
                "run",
                "--init",
                "--rm",
                "--network=host",
                "-v/srv/maps:/home/app/maps:cached",
                "-w",
                "/home/app/maps/data/resources/styles",
                "ghcr.io/jolicode/maps:abc",
                "/bin/bash",
                "-c",
                "npm install",
            ]
        );
        assert_eq!(calls[1].timeout, None);
    }

    #[test]
    fn outside_data_dir_gets_its_own_mount() {
        let runner = Recording {
            image_present: true,
            calls: Mutex::new(Vec::new()),
        };
        let settings = settings();
        let inside = ContainerRunner::new(&runner, &settings, Utf8Path::new("/srv/maps"))
            .with_data_root(Utf8Path::new("/srv/maps/data"));
        let CommandLine::Argv(argv) = inside.wrap(&CommandLine::shell("true"), None, false) else {
            panic!("expected argv");
        };
        assert_eq!(argv.iter().filter(|arg| arg.starts_with("-v")).count(), 1);

        let outside = ContainerRunner::new(&runner, &settings, Utf8Path::new("/srv/maps"))
            .with_data_root(Utf8Path::new("/mnt/osm"));
        let CommandLine::Argv(argv) = outside.wrap(&CommandLine::shell("true"), None, false) else {
            panic!("expected argv");
        };
        assert!(argv.contains(&"-v/srv/maps:/home/app/maps:cached".to_string()));
        assert!(argv.contains(&"-v/mnt/osm:/mnt/osm:cached".to_string()));
    }
}
