use std::{
    path::PathBuf,
    time::Duration,
};
use swarmcore::{
    command::Echo,
    refs::{
        RefChange,
        RefSpec,
    },
    sink::ChangeSink,
};

use crate::repo::Repo;

/// Coordinates pushes to and fetches from the mirror of one repository.
pub struct Mirror<'a, R> {
    repo: Repo<'a, R>,
    sink: Option<&'a dyn ChangeSink>,
    wait_policy: WaitPolicy,
    echo: bool,
}

/// Bounds on the wait handshake.  The default keeps polling until the
/// remote reports success or unexpected output.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WaitPolicy {
    pub max_attempts: Option<u32>,
    pub delay: Duration,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PushStatus {
    Pending,
    InFlight,
    WaitingRemote,
    Succeeded,
    Failed,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PushOperation {
    pub repo_path: PathBuf,
    pub refs: Vec<RefSpec>,
    /// Only present when the remote processes the push asynchronously.
    pub push_id: Option<String>,
    pub status: PushStatus,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FetchOptions {
    /// Return `Skipped` instead of blocking while a push holds the lock.
    pub skip_if_pushing: bool,
    /// Wait for a concurrent fetch and report its result; otherwise skip.
    pub wait_if_busy: bool,
    /// Skip when the last attempt is more recent than this.
    pub min_outdated: Option<Duration>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum FetchOutcome {
    NotMirrored,
    Skipped,
    Fetched(Vec<RefChange>),
    /// A concurrent fetch ran instead; carries its recorded error, if any.
    Reused {
        last_error: Option<String>,
    },
    Failed(String),
}

impl<'a, R> Mirror<'a, R> {
    pub fn new(repo: Repo<'a, R>) -> Self {
        Self {
            repo,
            sink: None,
            wait_policy: WaitPolicy::default(),
            echo: false,
        }
    }

    pub fn with_sink(mut self, sink: &'a dyn ChangeSink) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_wait_policy(mut self, wait_policy: WaitPolicy) -> Self {
        self.wait_policy = wait_policy;
        self
    }

    /// Echo remote output to stdout as it arrives.
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    pub fn repo(&self) -> &Repo<'a, R> {
        &self.repo
    }

    fn echo(&self) -> Echo {
        if self.echo {
            Echo::All
        } else {
            Echo::Silent
        }
    }
}

impl PushOperation {
    pub fn new(repo_path: impl Into<PathBuf>, refs: Vec<RefSpec>) -> Self {
        Self {
            repo_path: repo_path.into(),
            refs,
            push_id: None,
            status: PushStatus::Pending,
        }
    }
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            skip_if_pushing: false,
            wait_if_busy: true,
            min_outdated: None,
        }
    }
}

impl FetchOutcome {
    /// Failed fetches, including a reused failure, are not successes.
    pub fn is_success(&self) -> bool {
        !matches!(
            self,
            FetchOutcome::Failed(_) | FetchOutcome::Reused { last_error: Some(_) }
        )
    }
}

mod fetch;
mod push;
mod wait;

pub use push::push_id;
pub use wait::wait_url;
