use std::{
    fs,
    io,
    path::{
        Path,
        PathBuf,
    },
    time::Duration,
};
use chrono::{
    DateTime,
    Utc,
};

pub const FETCH_ERROR_FILE: &str = "mirror_fetch.error";
pub const FETCH_LAST_FILE: &str = "mirror_fetch.last";

/// The persisted result of the most recent fetch of one repository.
///
/// A missing error file means the last fetch succeeded (or none ran); a
/// missing timestamp file means no fetch was ever attempted.
#[derive(Clone, Debug)]
pub struct FetchRecord {
    repo_path: PathBuf,
}

fn read_optional(path: &Path) -> io::Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

impl FetchRecord {
    pub fn new(repo_path: &Path) -> Self {
        Self {
            repo_path: repo_path.to_path_buf(),
        }
    }

    fn error_path(&self) -> PathBuf {
        self.repo_path.join(FETCH_ERROR_FILE)
    }

    fn last_path(&self) -> PathBuf {
        self.repo_path.join(FETCH_LAST_FILE)
    }

    fn touch(&self) -> io::Result<()> {
        fs::write(self.last_path(), Utc::now().to_rfc3339())
    }

    pub fn record_success(&self) -> io::Result<()> {
        match fs::remove_file(self.error_path()) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e),
            _ => (),
        }
        self.touch()
    }

    pub fn record_failure(&self, detail: &str) -> io::Result<()> {
        fs::write(self.error_path(), detail)?;
        self.touch()
    }

    pub fn last_error(&self) -> io::Result<Option<String>> {
        read_optional(&self.error_path())
    }

    pub fn last_attempt(&self) -> io::Result<Option<DateTime<Utc>>> {
        let Some(text) = read_optional(&self.last_path())? else {
            return Ok(None);
        };
        match DateTime::parse_from_rfc3339(text.trim()) {
            Ok(ts) => Ok(Some(ts.with_timezone(&Utc))),
            Err(e) => {
                log::warn!("ignoring unreadable {}: {e}", self.last_path().display());
                Ok(None)
            }
        }
    }

    /// Whether the last attempt is older than `min_age`, or never happened.
    pub fn is_outdated(&self, min_age: Duration) -> io::Result<bool> {
        Ok(match self.last_attempt()? {
            Some(ts) => Utc::now()
                .signed_duration_since(ts)
                .to_std()
                .map(|age| age >= min_age)
                // timestamps from the future are treated as fresh
                .unwrap_or(false),
            None => true,
        })
    }
}
