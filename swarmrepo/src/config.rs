use std::{
    fs,
    path::Path,
};
use swarmcore::config::MirrorConfig;

use crate::error::MirrorError;

/// Reads the mirror configuration from a JSON file.
pub fn load(path: &Path) -> Result<MirrorConfig, MirrorError> {
    let text = fs::read_to_string(path)?;
    let config: MirrorConfig = serde_json::from_str(&text)?;
    log::debug!(
        "loaded {} mirror entries from {}",
        config.entries.len(),
        path.display(),
    );
    Ok(config)
}

/// Like `load`, but an absent path yields the default configuration.
pub fn load_or_default(path: Option<&Path>) -> Result<MirrorConfig, MirrorError> {
    match path {
        Some(path) => load(path),
        None => Ok(MirrorConfig::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("mirror.json");
        fs::write(&path, r#"{
            "global": {"user": "svc"},
            "entries": {"gf": {"url": "ssh://gf-host/", "git_args": ["-c", "http.sslVerify=false"]}}
        }"#)?;
        let config = load(&path)?;
        assert!(config.enabled);
        assert_eq!(config.entry_ids().collect::<Vec<_>>(), ["gf"]);
        Ok(())
    }

    #[test]
    fn test_load_failures() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        assert!(matches!(load(&dir.path().join("missing.json")), Err(MirrorError::Io(_))));
        let path = dir.path().join("broken.json");
        fs::write(&path, "{")?;
        assert!(matches!(load(&path), Err(MirrorError::ConfigFile(_))));
        assert!(load_or_default(None)?.entries.is_empty());
        Ok(())
    }
}
