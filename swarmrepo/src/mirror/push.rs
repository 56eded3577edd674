use regex::Regex;
use swarmcore::{
    command::Runner,
    refs::RefSpec,
    target::MirrorTarget,
};

use crate::{
    error::MirrorError,
    lock::{
        LockHandle,
        LockKind,
        LockMode,
    },
    socket::{
        self,
        LockRequest,
        PushLocking,
    },
    timer::PhaseTimer,
};
use super::*;

/// Extracts the id the remote assigns to an asynchronously processed push.
pub fn push_id(output: &str) -> Result<Option<String>, MirrorError> {
    let marker = Regex::new(r"(?m)^(?:remote: )?Commencing push (\d+) processing\.\.\.")?;
    Ok(marker.captures(output)
        .and_then(|captures| captures.get(1))
        .map(|id| id.as_str().to_string()))
}

impl<'a, R: Runner> Mirror<'a, R> {
    /// Finds the target and narrows the refs to the allow-list; `None`
    /// means there is nothing to push.
    fn prepare_push(&self, op: &mut PushOperation) -> Result<Option<MirrorTarget>, MirrorError> {
        let Some(target) = self.repo.mirror_target()? else {
            log::debug!("{} has no mirror; nothing to push", self.repo.path().display());
            op.status = PushStatus::Succeeded;
            return Ok(None);
        };
        if let Some(active) = self.repo.active_refs()? {
            op.refs = active.filter(&op.refs);
        }
        if op.refs.is_empty() {
            log::debug!("no mirrored refs in push to {}", self.repo.path().display());
            op.status = PushStatus::Succeeded;
            return Ok(None);
        }
        Ok(Some(target))
    }

    fn push_locked(
        &self,
        target: &MirrorTarget,
        op: &mut PushOperation,
        timer: &mut PhaseTimer,
    ) -> Result<(), MirrorError> {
        op.status = PushStatus::InFlight;
        let argv = target.git_command(
            ["push".to_string(), target.base_url.clone(), "--".to_string()]
                .into_iter()
                .chain(op.refs.iter().map(ToString::to_string))
        );
        timer.start("push")?;
        let output = self.repo.runner().run(&argv, self.repo.path(), self.echo());
        timer.stop("push")?;
        let output = output?;
        if !output.success() {
            op.status = PushStatus::Failed;
            return Err(MirrorError::remote_run(&argv, output));
        }

        op.push_id = push_id(&output.output)?;
        let Some(id) = op.push_id.as_deref() else {
            log::debug!("remote completed the push synchronously");
            op.status = PushStatus::Succeeded;
            return Ok(());
        };
        op.status = PushStatus::WaitingRemote;
        timer.start("wait")?;
        let waited = self.wait_for_push(target, id);
        timer.stop("wait")?;
        if let Err(e) = waited {
            op.status = PushStatus::Failed;
            return Err(e);
        }
        op.status = PushStatus::Succeeded;
        Ok(())
    }

    /// Pushes `refs` to the mirror under the given locking convention.
    ///
    /// With `PushLocking::Socket` the lock stays held on success; the
    /// post-receive process is responsible for sending `UNLOCK`.
    pub fn push(
        &self,
        refs: &[RefSpec],
        locking: &PushLocking,
    ) -> Result<PushOperation, MirrorError> {
        match locking {
            PushLocking::Direct => self.push_then(refs, |_| Ok(()))
                .map(|(op, ())| op),
            PushLocking::NotMirrored => {
                log::debug!("receive wrapper reported no mirror; skipping push");
                let mut op = PushOperation::new(self.repo.path(), refs.to_vec());
                op.status = PushStatus::Succeeded;
                Ok(op)
            }
            PushLocking::Socket(path) => self.push_via_socket(refs, path),
        }
    }

    fn push_via_socket(
        &self,
        refs: &[RefSpec],
        socket_path: &std::path::Path,
    ) -> Result<PushOperation, MirrorError> {
        let mut op = PushOperation::new(self.repo.path(), refs.to_vec());
        let Some(target) = self.prepare_push(&mut op)? else {
            return Ok(op);
        };
        let mut timer = PhaseTimer::new();
        timer.start("lock")?;
        socket::request(socket_path, LockRequest::Lock)?;
        timer.stop("lock")?;

        if let Err(e) = self.push_locked(&target, &mut op, &mut timer) {
            if let Err(unlock) = socket::request(socket_path, LockRequest::Unlock) {
                log::warn!("could not release push lock after failure: {unlock}");
            }
            return Err(e);
        }
        log::info!("mirror push for {} done ({timer})", self.repo.path().display());
        Ok(op)
    }

    /// Pushes under the advisory push lock and runs `then` while the lock
    /// is still held.  `then` also runs when there is nothing to mirror.
    pub fn push_then<T, F>(
        &self,
        refs: &[RefSpec],
        then: F,
    ) -> Result<(PushOperation, T), MirrorError>
    where
        F: FnOnce(&PushOperation) -> Result<T, MirrorError>,
    {
        let mut op = PushOperation::new(self.repo.path(), refs.to_vec());
        let Some(target) = self.prepare_push(&mut op)? else {
            let value = then(&op)?;
            return Ok((op, value));
        };
        let mut timer = PhaseTimer::new();
        timer.start("lock")?;
        let lock = LockHandle::acquire(self.repo.path(), LockKind::Push, LockMode::Exclusive)?;
        timer.stop("lock")?;

        let result = self.push_locked(&target, &mut op, &mut timer)
            .and_then(|()| then(&op));
        let released = lock.release();
        let value = result?;
        released?;
        log::info!("mirror push for {} done ({timer})", self.repo.path().display());
        Ok((op, value))
    }

    /// Pushes the updates described by raw pre-receive input.
    pub fn push_change_lines(
        &self,
        input: &str,
        locking: &PushLocking,
    ) -> Result<PushOperation, MirrorError> {
        self.push(&RefSpec::from_change_lines(input)?, locking)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_id() {
        assert_eq!(
            push_id("Counting objects\nremote: Commencing push 42 processing...\n").unwrap(),
            Some("42".to_string()),
        );
        assert_eq!(
            push_id("Commencing push 7 processing...\n").unwrap(),
            Some("7".to_string()),
        );
        assert_eq!(push_id("To gf-host:repo\n * [new branch] main -> main\n").unwrap(), None);
        assert_eq!(push_id("Commencing push processing...\n").unwrap(), None);
    }
}
