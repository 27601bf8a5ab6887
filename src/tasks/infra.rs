use tracing::warn;

use crate::app::{App, ProgressEvent, ProgressSink, TaskOutcome};
use crate::error::MapsError;
use crate::fetch::Fetcher;
use crate::process::{CommandLine, ProcessRunner};

const FALLBACK_USER_ID: u32 = 1000;
const MAX_USER_ID: u32 = 256_000;

/// User id baked into the image. Root and ids the image cannot map fall
/// back to 1000.
pub fn clamp_user_id(user_id: u32) -> u32 {
    if user_id == 0 || user_id > MAX_USER_ID {
        FALLBACK_USER_ID
    } else {
        user_id
    }
}

impl<F: Fetcher, R: ProcessRunner> App<F, R> {
    pub fn build_image(&self, push: bool, sink: &dyn ProgressSink) -> Result<TaskOutcome, MapsError> {
        let container = &self.settings.container;
        let image = container.image.clone();
        sink.event(ProgressEvent::Title(format!("Building {image}")));

        let user_id = self.current_user_id()?;
        if user_id == 0 {
            warn!("running as root, falling back to a fake user id");
        }
        let user_id = clamp_user_id(user_id);

        let registry = image.split('/').next().unwrap_or_default().to_string();
        if !self.logged_in(&registry)? {
            if push {
                return Err(MapsError::Precondition(format!(
                    "You are not logged in to {registry}, so you cannot push the image."
                )));
            }
            sink.event(ProgressEvent::Warning(format!(
                "You should log in to {registry}, so you can pull a prebuilt image."
            )));
        }

        let context_dir = self
            .settings
            .dockerfile()
            .parent()
            .map(|dir| dir.to_string())
            .unwrap_or_else(|| self.settings.project_root.to_string());
        let mut argv = vec![
            container.runtime.clone(),
            "build".to_string(),
            "-t".to_string(),
            image.clone(),
            "--build-arg".to_string(),
            format!("USER_ID={user_id}"),
            format!("--cache-from=type=registry,ref={image}"),
            "--pull".to_string(),
        ];
        if push {
            argv.extend([
                "--build-arg".to_string(),
                "BUILDKIT_INLINE_CACHE=1".to_string(),
                "--push".to_string(),
            ]);
        }
        argv.push(context_dir);

        let spec = self
            .spec(CommandLine::Argv(argv))
            .timeout(None)
            .working_dir(self.settings.project_root.as_std_path());
        self.runner.run(&spec)?;
        sink.event(ProgressEvent::Success(format!("Image {image} built successfully!")));
        Ok(TaskOutcome::completed("infra:build", vec![image]))
    }

    /// Interactive bash inside the maps container.
    pub fn open_builder(&self) -> Result<TaskOutcome, MapsError> {
        let spec = self
            .spec(CommandLine::argv(["bash"]))
            .timeout(None)
            .tty(true)
            .allow_failure(true);
        let outcome = self.container().run(&spec, None)?;
        if !outcome.success {
            warn!(code = ?outcome.code, "builder shell exited with an error");
        }
        Ok(TaskOutcome::completed("infra:builder", Vec::new()))
    }

    fn current_user_id(&self) -> Result<u32, MapsError> {
        let spec = self
            .spec(CommandLine::argv(["id", "-u"]))
            .quiet(true)
            .allow_failure(true);
        let outcome = self.runner.run(&spec)?;
        Ok(outcome
            .stdout
            .trim()
            .parse()
            .ok()
            .filter(|_| outcome.success)
            .unwrap_or(FALLBACK_USER_ID))
    }

    fn logged_in(&self, registry: &str) -> Result<bool, MapsError> {
        let spec = self
            .spec(CommandLine::argv([
                self.settings.container.runtime.as_str(),
                "login",
                registry,
            ]))
            .quiet(true)
            .allow_failure(true);
        Ok(self.runner.run(&spec)?.success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_unmappable_user_ids() {
        assert_eq!(clamp_user_id(0), 1000);
        assert_eq!(clamp_user_id(1001), 1001);
        assert_eq!(clamp_user_id(256_000), 256_000);
        assert_eq!(clamp_user_id(300_000), 1000);
    }
}
