use std::{
    fmt,
    io,
    path::Path,
};

/// Captured result of one subprocess call.  A non-zero `status` is a
/// value for the caller to interpret, not an error.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Combined stdout and stderr with line endings normalized to `\n`.
    pub output: String,
    /// Exit status; `-1` when the child was killed by a signal.
    pub status: i32,
}

/// Which output lines are echoed to the caller's stdout while a command
/// is running.
#[derive(Clone, Copy, Default)]
pub enum Echo {
    #[default]
    Silent,
    All,
    /// Echo only the lines the predicate accepts.
    Filtered(fn(&str) -> bool),
}

pub trait Runner {
    /// Runs `argv` (never a shell string) inside `working_dir`.
    fn run(
        &self,
        argv: &[String],
        working_dir: &Path,
        echo: Echo,
    ) -> io::Result<CommandOutput>;
}

impl CommandOutput {
    pub fn new(output: impl Into<String>, status: i32) -> Self {
        Self {
            output: output.into(),
            status,
        }
    }

    pub fn success(&self) -> bool {
        self.status == 0
    }
}

impl Echo {
    pub fn accepts(&self, line: &str) -> bool {
        match self {
            Echo::Silent => false,
            Echo::All => true,
            Echo::Filtered(f) => f(line),
        }
    }
}

impl fmt::Debug for Echo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Echo::Silent => f.write_str("Silent"),
            Echo::All => f.write_str("All"),
            Echo::Filtered(_) => f.write_str("Filtered(..)"),
        }
    }
}

/// Builds an argument vector from anything string-like.
pub fn argv<I, S>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    args.into_iter().map(Into::into).collect()
}

impl<T: Runner + ?Sized> Runner for &T {
    fn run(
        &self,
        argv: &[String],
        working_dir: &Path,
        echo: Echo,
    ) -> io::Result<CommandOutput> {
        (**self).run(argv, working_dir, echo)
    }
}
