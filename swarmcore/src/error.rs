use thiserror::Error;

#[non_exhaustive]
#[derive(Debug, PartialEq, Error)]
pub enum UrlError {
    #[error("invalid url `{url}`: {msg}")]
    InvalidUrl {
        url: String,
        msg: String,
    },
    #[error("unknown scheme `{0}`; expected one of ssh, http or https")]
    UnknownScheme(String),
    #[error("unknown command `{0}`; expected one of help, info, list, status or wait")]
    UnknownCommand(String),
    #[error("an extra value requires both a command and a repo to be present")]
    ExtraWithoutCommandRepo,
    #[error("no repository found in url")]
    MissingRepo,
}

impl UrlError {
    pub(crate) fn invalid(url: &str, msg: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.to_string(),
            msg: msg.into(),
        }
    }
}

#[non_exhaustive]
#[derive(Debug, PartialEq, Error)]
pub enum RefError {
    #[error("malformed ref update line: `{0}`")]
    InvalidChangeLine(String),
    #[error("malformed refspec: `{0}`")]
    InvalidRefSpec(String),
    #[error("malformed ref listing line: `{0}`")]
    InvalidListing(String),
    #[error("invalid ref pattern `{pattern}`: {msg}")]
    InvalidPattern {
        pattern: String,
        msg: String,
    },
}

#[non_exhaustive]
#[derive(Debug, PartialEq, Error)]
pub enum ConfigError {
    #[error("no mirror entries are configured")]
    NoEntries,
    #[error("mirror config entry `{0}` not found or is missing a URL.")]
    NoSuchEntry(String),
    #[error("mirror config entry `{0}` not found or is missing a URL.")]
    MissingUrl(String),
    #[error("mirror config entry `{id}` has an invalid url: {source}")]
    Url {
        id: String,
        source: UrlError,
    },
}

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to apply incoming changes: {0}")]
    Failed(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
