use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};

use crate::url::ExtendedUrl;

/// Mirror remotes known to this installation.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct MirrorConfig {
    #[serde(default = "enabled_default")]
    pub enabled: bool,
    #[serde(default)]
    pub global: EntrySettings,
    #[serde(default)]
    pub entries: BTreeMap<String, EntrySettings>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct EntrySettings {
    pub url: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    #[serde(default)]
    pub git_args: Vec<String>,
}

/// One place a setting may be found; fields resolve by walking an
/// ordered list of these and taking the first hit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Lookup {
    Entry,
    Url,
    Global,
    Constant(&'static str),
}

/// Prefix of mirror remote values that refer to a configuration entry.
pub const MIRROR_SCHEME: &str = "mirror://";

pub const DEFAULT_USER: &str = "gitswarm";

pub const PASSWORD_LOOKUP: &[Lookup] = &[
    Lookup::Entry,
    Lookup::Url,
    Lookup::Global,
];
pub const USER_LOOKUP: &[Lookup] = &[
    Lookup::Entry,
    Lookup::Url,
    Lookup::Global,
    Lookup::Constant(DEFAULT_USER),
];
pub const PORT_LOOKUP: &[Lookup] = &[
    Lookup::Url,
];

/// A selected configuration entry together with its parsed URL.
#[derive(Clone, Debug)]
pub struct ConfigEntry<'a> {
    id: &'a str,
    settings: &'a EntrySettings,
    global: &'a EntrySettings,
    url: ExtendedUrl,
}

fn enabled_default() -> bool {
    true
}

mod impls;
