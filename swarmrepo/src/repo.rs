use std::{
    fs,
    io,
    path::{
        Path,
        PathBuf,
    },
};
use swarmcore::{
    command::{
        argv,
        CommandOutput,
        Echo,
        Runner,
    },
    config::{
        MirrorConfig,
        MIRROR_SCHEME,
    },
    error::ConfigError,
    refs::{
        ActiveRefs,
        RefSnapshot,
    },
    target::MirrorTarget,
    url::ExtendedUrl,
};

use crate::{
    error::MirrorError,
    lock::{
        LockHandle,
        LockKind,
        LockMode,
    },
};

/// Name of the git remote that points at the mirror.
pub const MIRROR_REMOTE: &str = "mirror";
/// Allow-list of mirrored ref patterns, relative to the repository.
pub const ACTIVE_REFS_FILE: &str = "mirror_active_refs";

/// A hosted repository together with the means to inspect it.
pub struct Repo<'a, R> {
    path: PathBuf,
    runner: &'a R,
    config: Option<&'a MirrorConfig>,
}

impl<'a, R: Runner> Repo<'a, R> {
    pub fn new(path: impl Into<PathBuf>, runner: &'a R) -> Self {
        Self {
            path: path.into(),
            runner,
            config: None,
        }
    }

    pub fn with_config(mut self, config: &'a MirrorConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn runner(&self) -> &'a R {
        self.runner
    }

    pub fn config(&self) -> Option<&'a MirrorConfig> {
        self.config
    }

    pub fn side_file(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    fn git<'s>(&self, args: impl IntoIterator<Item = &'s str>) -> Result<(Vec<String>, CommandOutput), MirrorError> {
        let argv = argv(std::iter::once("git").chain(args));
        let output = self.runner.run(&argv, &self.path, Echo::Silent)?;
        Ok((argv, output))
    }

    /// The raw `remote.mirror.url` value, if one is configured.
    pub fn mirror_remote(&self) -> Result<Option<String>, MirrorError> {
        let (argv, output) = self.git(["config", "--get", "remote.mirror.url"])?;
        match output.status {
            0 => {
                let value = output.output.trim();
                Ok((!value.is_empty()).then(|| value.to_string()))
            }
            // key not present
            1 => Ok(None),
            _ => Err(MirrorError::remote_run(&argv, output)),
        }
    }

    /// Resolves the mirror remote into a target; `None` means the
    /// repository is not mirrored.
    pub fn mirror_target(&self) -> Result<Option<MirrorTarget>, MirrorError> {
        if self.config.is_some_and(|config| !config.enabled) {
            return Ok(None);
        }
        let Some(remote) = self.mirror_remote()? else {
            return Ok(None);
        };
        let target = match self.config {
            Some(config) => config.resolve(&remote)?,
            None if remote.starts_with(MIRROR_SCHEME) => return Err(ConfigError::NoEntries.into()),
            None => MirrorTarget::new(remote, ""),
        };
        Ok(Some(target))
    }

    pub fn mirror_url(&self) -> Result<Option<String>, MirrorError> {
        Ok(self.mirror_target()?.map(|target| target.base_url))
    }

    pub fn is_mirrored(&self) -> Result<bool, MirrorError> {
        Ok(self.mirror_target()?.is_some())
    }

    /// Adds or replaces the mirror remote while holding the push lock.
    pub fn set_mirror_url(&self, url: &str) -> Result<(), MirrorError> {
        match (url.starts_with(MIRROR_SCHEME), self.config) {
            (true, Some(config)) => {
                config.resolve(url)?;
            }
            (true, None) => return Err(ConfigError::NoEntries.into()),
            (false, _) => {
                ExtendedUrl::parse(url)?;
            }
        }

        let lock = LockHandle::acquire(&self.path, LockKind::Push, LockMode::Exclusive)?;
        let action = if self.mirror_remote()?.is_some() { "set-url" } else { "add" };
        let (argv, output) = self.git(["remote", action, MIRROR_REMOTE, url])?;
        lock.release()?;
        if !output.success() {
            return Err(MirrorError::remote_run(&argv, output));
        }
        log::info!(
            "mirror remote for {} is now {}",
            self.path.display(),
            ExtendedUrl::parse(url)
                .and_then(|url| url.to_string(true))
                .unwrap_or_else(|_| url.to_string()),
        );
        Ok(())
    }

    pub fn show_ref(&self) -> Result<RefSnapshot, MirrorError> {
        let (argv, output) = self.git(["show-ref"])?;
        match output.status {
            0 => Ok(RefSnapshot::from_show_ref(&output.output)?),
            // no refs at all
            1 if output.output.trim().is_empty() => Ok(RefSnapshot::new()),
            _ => Err(MirrorError::remote_run(&argv, output)),
        }
    }

    /// The ref allow-list; `None` when the file is absent.
    pub fn active_refs(&self) -> Result<Option<ActiveRefs>, MirrorError> {
        match fs::read_to_string(self.side_file(ACTIVE_REFS_FILE)) {
            Ok(text) => Ok(Some(ActiveRefs::parse(&text)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarmcore::command::CommandOutput;
    use test_swarm::{
        MockRunner,
        TempRepo,
    };

    fn expect_git(runner: &mut MockRunner, args: &'static [&'static str], output: CommandOutput) {
        runner.expect_run()
            .times(1)
            .withf(move |argv, _, _| argv.iter().skip(1).eq(args.iter()) && argv[0] == "git")
            .return_once(move |_, _, _| Ok(output));
    }

    #[test]
    fn test_not_mirrored() {
        let tmp = TempRepo::new();
        let mut runner = MockRunner::new();
        expect_git(&mut runner, &["config", "--get", "remote.mirror.url"], CommandOutput::new("", 1));
        let repo = Repo::new(tmp.path(), &runner);
        assert_eq!(repo.mirror_target().unwrap(), None);
    }

    #[test]
    fn test_mirror_url_resolves_through_config() {
        let tmp = TempRepo::new();
        let config: MirrorConfig = serde_json::from_str(r#"{
            "entries": {"default": {"url": "http://example.com", "user": "svc"}}
        }"#).unwrap();
        let mut runner = MockRunner::new();
        expect_git(
            &mut runner,
            &["config", "--get", "remote.mirror.url"],
            CommandOutput::new("mirror://default/Talkhouse\n", 0),
        );
        let repo = Repo::new(tmp.path(), &runner).with_config(&config);
        assert_eq!(repo.mirror_url().unwrap().as_deref(), Some("http://svc@example.com/Talkhouse"));
    }

    #[test]
    fn test_disabled_config_is_not_mirrored() {
        let tmp = TempRepo::new();
        let config = MirrorConfig { enabled: false, ..Default::default() };
        let runner = MockRunner::new();
        let repo = Repo::new(tmp.path(), &runner).with_config(&config);
        assert!(!repo.is_mirrored().unwrap());
    }

    #[test]
    fn test_show_ref_empty_repo() {
        let tmp = TempRepo::new();
        let mut runner = MockRunner::new();
        expect_git(&mut runner, &["show-ref"], CommandOutput::new("", 1));
        let repo = Repo::new(tmp.path(), &runner);
        assert!(repo.show_ref().unwrap().is_empty());
    }

    #[test]
    fn test_show_ref_failure() {
        let tmp = TempRepo::new();
        let mut runner = MockRunner::new();
        expect_git(&mut runner, &["show-ref"], CommandOutput::new("fatal: not a git repository\n", 128));
        let repo = Repo::new(tmp.path(), &runner);
        match repo.show_ref() {
            Err(MirrorError::RemoteRun { status, output, .. }) => {
                assert_eq!(status, 128);
                assert_eq!(output, "fatal: not a git repository\n");
            }
            other => panic!("expected RemoteRun, got {other:?}"),
        }
    }

    #[test]
    fn test_set_mirror_url() {
        let tmp = TempRepo::new();
        let mut runner = MockRunner::new();
        expect_git(&mut runner, &["config", "--get", "remote.mirror.url"], CommandOutput::new("", 1));
        expect_git(
            &mut runner,
            &["remote", "add", "mirror", "git@gf-host:repo"],
            CommandOutput::new("", 0),
        );
        let repo = Repo::new(tmp.path(), &runner);
        repo.set_mirror_url("git@gf-host:repo").unwrap();
        assert!(tmp.path().join("mirror_push.lock").exists());
    }

    #[test]
    fn test_set_mirror_url_rejects_invalid() {
        let tmp = TempRepo::new();
        let runner = MockRunner::new();
        let repo = Repo::new(tmp.path(), &runner);
        assert!(matches!(repo.set_mirror_url("darth-vader"), Err(MirrorError::Url(_))));
        assert!(matches!(repo.set_mirror_url("mirror://default/repo"), Err(MirrorError::Config(_))));
    }

    #[test]
    fn test_active_refs() {
        let tmp = TempRepo::new();
        let runner = MockRunner::new();
        let repo = Repo::new(tmp.path(), &runner);
        assert!(repo.active_refs().unwrap().is_none());
        tmp.write(ACTIVE_REFS_FILE, "refs/heads/main\n");
        let active = repo.active_refs().unwrap().unwrap();
        assert_eq!(active.patterns(), &["refs/heads/main"]);
    }
}
