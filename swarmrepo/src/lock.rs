use std::{
    fmt,
    fs::{
        self,
        File,
    },
    io,
    path::{
        Path,
        PathBuf,
    },
};

/// The two advisory locks kept per repository.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockKind {
    /// Exclusive while pushing to the mirror, shared while fetching.
    Push,
    /// Exclusive while fetching, so concurrent callers reuse one fetch.
    Fetch,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

/// A held advisory lock; released on `release` or drop.
#[derive(Debug)]
pub struct LockHandle {
    file: File,
    path: PathBuf,
    mode: LockMode,
}

impl LockKind {
    pub fn file_name(&self) -> &'static str {
        match self {
            LockKind::Push => "mirror_push.lock",
            LockKind::Fetch => "mirror_fetch.lock",
        }
    }

    pub fn path(&self, repo_path: &Path) -> PathBuf {
        repo_path.join(self.file_name())
    }
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            LockMode::Shared => "shared",
            LockMode::Exclusive => "exclusive",
        })
    }
}

fn open(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(path)
}

impl LockHandle {
    /// Blocks until the lock is granted.
    pub fn acquire(
        repo_path: &Path,
        kind: LockKind,
        mode: LockMode,
    ) -> io::Result<Self> {
        let path = kind.path(repo_path);
        let file = open(&path)?;
        log::trace!("waiting for {mode} lock on {}", path.display());
        match mode {
            LockMode::Shared => fs2::FileExt::lock_shared(&file)?,
            LockMode::Exclusive => fs2::FileExt::lock_exclusive(&file)?,
        }
        log::trace!("acquired {mode} lock on {}", path.display());
        Ok(Self { file, path, mode })
    }

    /// Returns `None` instead of blocking when the lock is contended.
    pub fn try_acquire(
        repo_path: &Path,
        kind: LockKind,
        mode: LockMode,
    ) -> io::Result<Option<Self>> {
        let path = kind.path(repo_path);
        let file = open(&path)?;
        let result = match mode {
            LockMode::Shared => fs2::FileExt::try_lock_shared(&file),
            LockMode::Exclusive => fs2::FileExt::try_lock_exclusive(&file),
        };
        match result {
            Ok(()) => {
                log::trace!("acquired {mode} lock on {}", path.display());
                Ok(Some(Self { file, path, mode }))
            }
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                log::trace!("{mode} lock on {} is contended", path.display());
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> LockMode {
        self.mode
    }

    pub fn release(self) -> io::Result<()> {
        let result = fs2::FileExt::unlock(&self.file);
        log::trace!("released {} lock on {}", self.mode, self.path.display());
        // the descriptor closes on drop, which also drops the lock
        result
    }
}
