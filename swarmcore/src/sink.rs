use std::path::Path;

use crate::{
    error::SinkError,
    refs::RefChange,
};

/// Receives the ref changes a fetch brought in, so downstream hook logic
/// observes them as if they had been pushed locally.
pub trait ChangeSink {
    fn apply(
        &self,
        repo_path: &Path,
        changes: &[RefChange],
    ) -> Result<(), SinkError>;
}

/// Renders changes the way git feeds them to a post-receive hook.
pub fn change_lines(changes: &[RefChange]) -> String {
    changes.iter()
        .map(|change| format!("{change}\n"))
        .collect()
}
