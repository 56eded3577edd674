use std::{
    env,
    fs,
    io::{
        self,
        BufRead,
        BufReader,
        Write,
    },
    os::unix::{
        fs::FileTypeExt,
        net::{
            UnixListener,
            UnixStream,
        },
    },
    path::{
        Path,
        PathBuf,
    },
    str::FromStr,
    sync::{
        atomic::{
            AtomicBool,
            Ordering,
        },
        Arc,
    },
    thread::{
        self,
        JoinHandle,
    },
    time::Duration,
};

use crate::{
    error::LockError,
    lock::{
        LockHandle,
        LockKind,
        LockMode,
    },
};

/// Environment variable carrying the lock socket path to hook processes.
pub const WRITE_LOCK_SOCKET: &str = "WRITE_LOCK_SOCKET";
/// Value of `WRITE_LOCK_SOCKET` when the repository has no mirror.
pub const NOT_MIRRORED: &str = "NOT_MIRRORED";
/// Bound on every read from either end of the socket.
pub const SOCKET_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockRequest {
    Lock,
    Unlock,
}

/// How a push obtains the exclusive push lock.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PushLocking {
    /// Take the advisory file lock for the duration of the call.
    Direct,
    /// Ask the lock socket server at the path to hold the lock; it stays
    /// held until an `UNLOCK` request arrives.
    Socket(PathBuf),
    /// The process that published the socket found no mirror remote.
    NotMirrored,
}

/// Holds the push lock on behalf of short-lived hook processes.
///
/// Served on a background thread at `<repo>/mirror_push-<pid>.socket`;
/// each connection carries one `LOCK` or `UNLOCK` line.
pub struct LockSocketServer {
    path: PathBuf,
    stopping: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl LockRequest {
    pub fn as_str(&self) -> &'static str {
        match self {
            LockRequest::Lock => "LOCK",
            LockRequest::Unlock => "UNLOCK",
        }
    }

    pub fn expected_reply(&self) -> &'static str {
        match self {
            LockRequest::Lock => "LOCKED",
            LockRequest::Unlock => "UNLOCKED",
        }
    }
}

impl FromStr for LockRequest {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOCK" => Ok(LockRequest::Lock),
            "UNLOCK" => Ok(LockRequest::Unlock),
            s => Err(s.to_string()),
        }
    }
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}

fn is_socket(path: &Path) -> bool {
    fs::metadata(path)
        .map(|metadata| metadata.file_type().is_socket())
        .unwrap_or(false)
}

/// Sends one request to the lock socket and checks the echoed reply.
pub fn request(socket: &Path, request: LockRequest) -> Result<(), LockError> {
    let timeout = || LockError::Timeout { path: socket.to_path_buf() };
    let mut stream = UnixStream::connect(socket)?;
    stream.set_read_timeout(Some(SOCKET_TIMEOUT))?;
    stream.set_write_timeout(Some(SOCKET_TIMEOUT))?;
    log::debug!("sending {} to {}", request.as_str(), socket.display());
    match writeln!(stream, "{}", request.as_str()) {
        Err(e) if is_timeout(&e) => return Err(timeout()),
        result => result?,
    }
    let mut reply = String::new();
    match BufReader::new(&stream).read_line(&mut reply) {
        Err(e) if is_timeout(&e) => return Err(timeout()),
        result => result?,
    };
    let reply = reply.trim();
    if reply != request.expected_reply() {
        return Err(LockError::Protocol {
            expected: request.expected_reply().to_string(),
            received: reply.to_string(),
        });
    }
    Ok(())
}

impl PushLocking {
    /// Reads the convention published by the receive-pack wrapper.
    pub fn from_env() -> Result<Self, LockError> {
        Self::from_value(&env::var(WRITE_LOCK_SOCKET).unwrap_or_default())
    }

    pub fn from_value(value: &str) -> Result<Self, LockError> {
        if value == NOT_MIRRORED {
            return Ok(PushLocking::NotMirrored);
        }
        let path = PathBuf::from(value);
        if value.is_empty() || !is_socket(&path) {
            return Err(LockError::MissingSocket(value.to_string()));
        }
        Ok(PushLocking::Socket(path))
    }
}

fn handle_client(
    stream: UnixStream,
    repo_path: &Path,
    held: &mut Option<LockHandle>,
) -> io::Result<()> {
    stream.set_read_timeout(Some(SOCKET_TIMEOUT))?;
    stream.set_write_timeout(Some(SOCKET_TIMEOUT))?;
    let mut line = String::new();
    let reply = match BufReader::new(&stream).read_line(&mut line) {
        Ok(_) => match line.trim().parse::<LockRequest>() {
            Ok(LockRequest::Lock) => {
                if held.is_none() {
                    *held = Some(LockHandle::acquire(repo_path, LockKind::Push, LockMode::Exclusive)?);
                }
                LockRequest::Lock.expected_reply()
            }
            Ok(LockRequest::Unlock) => {
                if let Some(handle) = held.take() {
                    handle.release()?;
                }
                LockRequest::Unlock.expected_reply()
            }
            Err(command) => {
                log::warn!("unknown lock socket command `{command}`");
                "UNKNOWN"
            }
        },
        Err(e) if is_timeout(&e) => {
            log::warn!("timed out reading lock socket command");
            "TIMEOUT"
        }
        Err(e) => return Err(e),
    };
    writeln!(&stream, "{reply}")
}

fn serve(listener: UnixListener, repo_path: PathBuf, stopping: Arc<AtomicBool>) {
    let mut held = None;
    for stream in listener.incoming() {
        if stopping.load(Ordering::SeqCst) {
            break;
        }
        match stream {
            Ok(stream) => if let Err(e) = handle_client(stream, &repo_path, &mut held) {
                log::warn!("lock socket client error: {e}");
            },
            Err(e) => log::warn!("lock socket accept error: {e}"),
        }
    }
    if let Some(handle) = held.take() {
        if let Err(e) = handle.release() {
            log::warn!("failed to release push lock on shutdown: {e}");
        }
    }
}

impl LockSocketServer {
    pub fn socket_path(repo_path: &Path) -> PathBuf {
        repo_path.join(format!("mirror_push-{}.socket", std::process::id()))
    }

    pub fn bind(repo_path: &Path) -> io::Result<Self> {
        Self::bind_at(repo_path, Self::socket_path(repo_path))
    }

    pub fn bind_at(repo_path: &Path, path: PathBuf) -> io::Result<Self> {
        if path.exists() {
            fs::remove_file(&path)?;
        }
        let listener = UnixListener::bind(&path)?;
        log::debug!("lock socket listening on {}", path.display());
        let stopping = Arc::new(AtomicBool::new(false));
        let thread = thread::Builder::new()
            .name("lock-socket".to_string())
            .spawn({
                let stopping = Arc::clone(&stopping);
                let repo_path = repo_path.to_path_buf();
                move || serve(listener, repo_path, stopping)
            })?;
        Ok(Self {
            path,
            stopping,
            thread: Some(thread),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The value to publish in `WRITE_LOCK_SOCKET`.
    pub fn env_value(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    /// Stops serving, releasing any held lock and removing the socket.
    pub fn stop(&mut self) -> io::Result<()> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        self.stopping.store(true, Ordering::SeqCst);
        // wake the accept loop so it observes the flag
        if let Err(e) = UnixStream::connect(&self.path) {
            log::warn!("could not wake lock socket server: {e}");
        }
        thread.join()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "lock socket thread panicked"))?;
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

impl Drop for LockSocketServer {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::warn!("failed to stop lock socket server: {e}");
        }
    }
}
