use serde::{Deserialize, Serialize};

/// The transports a mirror endpoint may be addressed by.  `Scp` covers
/// the scheme-less `user@host:path` form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Scp,
    Ssh,
    Http,
    Https,
}

/// Out-of-band commands understood by the remote when smuggled through
/// the clone URL path as `@command`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Command {
    Help,
    Info,
    List,
    Status,
    Wait,
}

/// Argument accepted by `ExtendedUrl::with_repo`.
#[derive(Clone, Debug, PartialEq)]
pub enum RepoArg {
    /// Keep the repo already present; its absence is an error.
    Current,
    /// Replace the repo with the given name.
    Named(String),
    /// Drop the repo.
    Cleared,
}

/// A clone URL for the remote mirror, optionally extended with the
/// `@command[@repo[@extra]]` path syntax.
///
/// Instances are parsed from a raw string or composed from a
/// `MirrorTarget`, then rendered straight back into a subprocess
/// argument; they are never persisted.
#[derive(Clone, Debug, PartialEq)]
pub struct ExtendedUrl {
    scheme: Scheme,
    user: Option<String>,
    password: Option<String>,
    host: String,
    port: Option<u16>,
    command: Option<Command>,
    repo: Option<String>,
    extra: Option<String>,
    delimiter: char,
}

mod impls;
