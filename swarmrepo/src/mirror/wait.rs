use std::thread;
use regex::Regex;
use tempfile::TempDir;
use swarmcore::{
    command::{
        Echo,
        Runner,
    },
    target::MirrorTarget,
    url::{
        Command,
        ExtendedUrl,
    },
};

use crate::error::MirrorError;
use super::*;

/// Derives the `@wait@<repo>@<push_id>` URL from the mirror URL.
pub fn wait_url(base_url: &str, push_id: &str) -> Result<String, MirrorError> {
    let mut url = ExtendedUrl::parse(base_url)
        .map_err(|_| MirrorError::WaitUrl(base_url.to_string()))?;
    if url.repo().is_none() {
        return Err(MirrorError::WaitUrl(base_url.to_string()));
    }
    url.clear_command();
    let rewritten = url.with_command(Command::Wait)
        .with_extra(push_id)
        .to_string(false)?;
    if rewritten == base_url {
        return Err(MirrorError::WaitUrl(base_url.to_string()));
    }
    Ok(rewritten)
}

fn wait_echo(line: &str) -> bool {
    !(line.starts_with("Cloning into")
        || (line.starts_with("fatal: repository ") && line.ends_with(" not found")))
}

impl<'a, R: Runner> Mirror<'a, R> {
    /// Polls the remote until push `push_id` has landed.
    pub(crate) fn wait_for_push(
        &self,
        target: &MirrorTarget,
        push_id: &str,
    ) -> Result<(), MirrorError> {
        let url = wait_url(&target.base_url, push_id)?;
        let id = regex::escape(push_id);
        let completed = Regex::new(&format!(r"(?m)^(?:remote: )?Push {id} completed successfully"))?;
        let waiting = Regex::new(&format!(r"(?m)^(?:remote: )?Waiting for push {id}\.\.\."))?;
        let argv = target.git_command(["clone", "--", url.as_str()]);
        let echo = if self.echo {
            Echo::Filtered(wait_echo)
        } else {
            Echo::Silent
        };

        let mut attempts = 0;
        loop {
            if let Some(max_attempts) = self.wait_policy.max_attempts {
                if attempts >= max_attempts {
                    log::error!("gave up waiting for push {push_id} after {attempts} attempts");
                    return Err(MirrorError::WaitExhausted {
                        push_id: push_id.to_string(),
                        attempts,
                    });
                }
            }
            attempts += 1;
            // git refuses to clone into an existing working copy
            let scratch = TempDir::new()?;
            let output = self.repo.runner().run(&argv, scratch.path(), echo)?;
            if completed.is_match(&output.output) {
                log::info!("push {push_id} landed after {attempts} wait attempt(s)");
                return Ok(());
            }
            if !waiting.is_match(&output.output) {
                log::error!(
                    "unexpected output while waiting for push {push_id} (status {}):\n{}",
                    output.status,
                    output.output,
                );
                return Err(MirrorError::WaitProtocol {
                    push_id: push_id.to_string(),
                    output: output.output,
                });
            }
            log::debug!("push {push_id} still pending (attempt {attempts})");
            if !self.wait_policy.delay.is_zero() {
                thread::sleep(self.wait_policy.delay);
            }
        }
    }
}
