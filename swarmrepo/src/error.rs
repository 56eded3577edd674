use std::path::PathBuf;
use thiserror::Error;

use swarmcore::{
    command::CommandOutput,
    error::{
        ConfigError,
        RefError,
        SinkError,
        UrlError,
    },
};

use crate::command::describe;

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error(transparent)]
    Url(#[from] UrlError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Ref(#[from] RefError),
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error(transparent)]
    Timer(#[from] TimerError),
    #[error(transparent)]
    Sink(#[from] SinkError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("`{command}` failed with exit status {status}:\n{output}")]
    RemoteRun {
        command: String,
        status: i32,
        output: String,
    },
    #[error("unexpected output while waiting for push {push_id}:\n{output}")]
    WaitProtocol {
        push_id: String,
        output: String,
    },
    #[error("could not derive a wait url from `{0}`")]
    WaitUrl(String),
    #[error("push {push_id} did not complete after {attempts} attempts")]
    WaitExhausted {
        push_id: String,
        attempts: u32,
    },
    #[error("fetch failed: {0}")]
    Fetch(String),
    #[error("invalid mirror configuration file: {0}")]
    ConfigFile(#[from] serde_json::Error),
    #[error(transparent)]
    Pattern(#[from] regex::Error),
}

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum LockError {
    #[error("Expected WRITE_LOCK_SOCKET to point at a lock socket; got `{0}`")]
    MissingSocket(String),
    #[error("timed out talking to lock socket {}", path.display())]
    Timeout {
        path: PathBuf,
    },
    #[error("lock socket replied `{received}`; expected `{expected}`")]
    Protocol {
        expected: String,
        received: String,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[non_exhaustive]
#[derive(Debug, PartialEq, Error)]
pub enum TimerError {
    #[error("timer `{0}` already started")]
    AlreadyStarted(String),
    #[error("timer `{0}` was never started")]
    NotStarted(String),
    #[error("timer `{0}` already stopped")]
    AlreadyStopped(String),
}

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum FusionError {
    #[error("Invalid min_version specified: {0}")]
    InvalidMinVersion(String),
    #[error("could not determine the Git Fusion version from: {0}")]
    UnknownVersion(String),
    #[error(transparent)]
    Url(#[from] UrlError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Pattern(#[from] regex::Error),
}

impl MirrorError {
    /// Logs the full captured output of a failed subprocess and wraps it.
    pub(crate) fn remote_run(argv: &[String], output: CommandOutput) -> Self {
        let command = describe(argv);
        log::error!("`{command}` failed with exit status {}:\n{}", output.status, output.output);
        Self::RemoteRun {
            command,
            status: output.status,
            output: output.output,
        }
    }
}
