use swarmcore::{
    command::Runner,
    refs::ActiveRefs,
    target::MirrorTarget,
};

use crate::{
    error::MirrorError,
    lock::{
        LockHandle,
        LockKind,
        LockMode,
    },
    outcome::FetchRecord,
};
use super::*;

impl<'a, R: Runner> Mirror<'a, R> {
    fn run_fetch(&self, target: &MirrorTarget) -> Result<Vec<RefChange>, MirrorError> {
        let active = self.repo.active_refs()?;
        let refspecs = ActiveRefs::fetch_refspecs(active.as_ref());
        if refspecs.is_empty() {
            log::info!("allow-list for {} is empty; nothing to fetch", self.repo.path().display());
            return Ok(Vec::new());
        }

        let before = self.repo.show_ref()?;
        let argv = target.git_command(
            ["fetch".to_string(), target.base_url.clone(), "--".to_string()]
                .into_iter()
                .chain(refspecs)
        );
        let output = self.repo.runner().run(&argv, self.repo.path(), self.echo())?;
        if !output.success() {
            return Err(MirrorError::remote_run(&argv, output));
        }
        let after = self.repo.show_ref()?;

        let changes = before.diff(&after);
        log::debug!("fetch brought in {} ref change(s)", changes.len());
        if let (false, Some(sink)) = (changes.is_empty(), self.sink) {
            sink.apply(self.repo.path(), &changes)?;
        }
        Ok(changes)
    }

    // runs with the fetch lock held exclusively
    fn fetch_locked(
        &self,
        target: &MirrorTarget,
        record: &FetchRecord,
    ) -> Result<FetchOutcome, MirrorError> {
        match self.run_fetch(target) {
            Ok(changes) => {
                record.record_success()?;
                Ok(FetchOutcome::Fetched(changes))
            }
            Err(e) => {
                let detail = e.to_string();
                log::error!("mirror fetch for {} failed: {detail}", self.repo.path().display());
                record.record_failure(&detail)?;
                Ok(FetchOutcome::Failed(detail))
            }
        }
    }

    /// Fetches from the mirror, reusing the result of a concurrent fetch
    /// instead of starting another one.
    ///
    /// Failures of the fetch itself are recorded and reported as
    /// `FetchOutcome::Failed`; only errors reaching the mirror
    /// configuration or the lock files are returned as `Err`.
    pub fn fetch(&self, options: &FetchOptions) -> Result<FetchOutcome, MirrorError> {
        let path = self.repo.path();
        let Some(target) = self.repo.mirror_target()? else {
            return Ok(FetchOutcome::NotMirrored);
        };
        let record = FetchRecord::new(path);
        if let Some(min_outdated) = options.min_outdated {
            if !record.is_outdated(min_outdated)? {
                log::debug!("last fetch of {} is recent enough", path.display());
                return Ok(FetchOutcome::Skipped);
            }
        }

        let push_lock = if options.skip_if_pushing {
            match LockHandle::try_acquire(path, LockKind::Push, LockMode::Shared)? {
                Some(lock) => lock,
                None => {
                    log::info!("push to mirror in progress; skipping fetch of {}", path.display());
                    return Ok(FetchOutcome::Skipped);
                }
            }
        } else {
            LockHandle::acquire(path, LockKind::Push, LockMode::Shared)?
        };

        let outcome = match LockHandle::try_acquire(path, LockKind::Fetch, LockMode::Exclusive)? {
            Some(fetch_lock) => {
                let outcome = self.fetch_locked(&target, &record);
                let released = fetch_lock.release();
                let outcome = outcome?;
                released?;
                outcome
            }
            None if !options.wait_if_busy => {
                log::debug!("another fetch of {} is running; not waiting", path.display());
                FetchOutcome::Skipped
            }
            None => {
                log::info!("another fetch of {} is running; waiting for its result", path.display());
                let shared = LockHandle::acquire(path, LockKind::Fetch, LockMode::Shared)?;
                let last_error = record.last_error()?;
                shared.release()?;
                FetchOutcome::Reused { last_error }
            }
        };
        push_lock.release()?;
        Ok(outcome)
    }

    /// Like `fetch`, but a failed fetch (or a reused failure) is an error
    /// carrying the recorded detail.
    pub fn require_fetch(&self, options: &FetchOptions) -> Result<FetchOutcome, MirrorError> {
        match self.fetch(options)? {
            FetchOutcome::Failed(detail) |
            FetchOutcome::Reused { last_error: Some(detail) } => Err(MirrorError::Fetch(detail)),
            outcome => Ok(outcome),
        }
    }
}
