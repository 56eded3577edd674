use std::{
    io::Write,
    path::{
        Path,
        PathBuf,
    },
    process::{
        Command,
        Stdio,
    },
};
use swarmcore::{
    error::SinkError,
    refs::RefChange,
    sink::{
        change_lines,
        ChangeSink,
    },
};

/// Feeds fetched changes to an executable hook on stdin, the way git runs
/// `post-receive`.  A missing hook is not an error.
#[derive(Clone, Debug)]
pub struct HookScript {
    path: PathBuf,
}

impl HookScript {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The repository's own `hooks/post-receive`.
    pub fn post_receive(repo_path: &Path) -> Self {
        Self::new(repo_path.join("hooks").join("post-receive"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ChangeSink for HookScript {
    fn apply(
        &self,
        repo_path: &Path,
        changes: &[RefChange],
    ) -> Result<(), SinkError> {
        if !self.path.is_file() {
            log::debug!("no hook at {}; dropping {} change(s)", self.path.display(), changes.len());
            return Ok(());
        }
        log::debug!("running {} for {} change(s)", self.path.display(), changes.len());
        let mut child = Command::new(&self.path)
            .current_dir(repo_path)
            .env("GIT_DIR", repo_path)
            .stdin(Stdio::piped())
            .spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(change_lines(changes).as_bytes())?;
        }
        let status = child.wait()?;
        if !status.success() {
            return Err(SinkError::Failed(format!(
                "{} exited with status {}",
                self.path.display(),
                status.code().unwrap_or(-1),
            )));
        }
        Ok(())
    }
}
