use crate::{
    error::ConfigError,
    target::MirrorTarget,
};
use super::*;

#[derive(Clone, Copy)]
enum Field {
    User,
    Password,
    Port,
}

impl Field {
    fn from_settings(&self, settings: &EntrySettings) -> Option<String> {
        let value = match self {
            Field::User => settings.user.as_ref(),
            Field::Password => settings.password.as_ref(),
            Field::Port => None,
        };
        value.filter(|value| !value.is_empty()).cloned()
    }

    fn from_url(&self, url: &ExtendedUrl) -> Option<String> {
        match self {
            Field::User => url.user().map(str::to_string),
            Field::Password => url.password().map(str::to_string),
            Field::Port => url.port().map(|port| port.to_string()),
        }
    }
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            global: EntrySettings::default(),
            entries: BTreeMap::new(),
        }
    }
}

impl MirrorConfig {
    /// Selects the entry named by `id`; without an id the `default` entry
    /// is used, falling back to the first entry.
    pub fn entry(&self, id: Option<&str>) -> Result<ConfigEntry<'_>, ConfigError> {
        let (id, settings) = match id {
            Some(id) => self.entries.get_key_value(id)
                .ok_or_else(|| ConfigError::NoSuchEntry(id.to_string()))?,
            None => self.entries.get_key_value("default")
                .or_else(|| self.entries.iter().next())
                .ok_or(ConfigError::NoEntries)?,
        };
        let raw = settings.url.as_deref()
            .filter(|url| !url.is_empty())
            .ok_or_else(|| ConfigError::MissingUrl(id.clone()))?;
        let url = ExtendedUrl::parse(raw)
            .map_err(|source| ConfigError::Url { id: id.clone(), source })?;
        Ok(ConfigEntry {
            id,
            settings,
            global: &self.global,
            url,
        })
    }

    pub fn entry_ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Turns a mirror remote value into a target; `mirror://<id>/<repo>`
    /// resolves through the named entry, anything else is used verbatim.
    pub fn resolve(&self, remote: &str) -> Result<MirrorTarget, ConfigError> {
        match remote.strip_prefix(MIRROR_SCHEME) {
            Some(rest) => {
                let (id, repo) = rest.split_once('/')
                    .unwrap_or((rest, ""));
                log::trace!("resolving mirror entry `{id}` for repo `{repo}`");
                self.entry(Some(id))?.target_for_repo(repo)
            }
            None => Ok(MirrorTarget::new(remote, "")),
        }
    }
}

impl<'a> ConfigEntry<'a> {
    pub fn id(&self) -> &str {
        self.id
    }

    pub fn settings(&self) -> &EntrySettings {
        self.settings
    }

    fn lookup(&self, field: Field, order: &[Lookup]) -> Option<String> {
        order.iter().find_map(|lookup| match lookup {
            Lookup::Entry => field.from_settings(self.settings),
            Lookup::Url => field.from_url(&self.url),
            Lookup::Global => field.from_settings(self.global),
            Lookup::Constant(value) => Some(value.to_string()),
        })
    }

    pub fn user(&self) -> String {
        self.lookup(Field::User, USER_LOOKUP)
            .unwrap_or_else(|| DEFAULT_USER.to_string())
    }

    pub fn password(&self) -> Option<String> {
        self.lookup(Field::Password, PASSWORD_LOOKUP)
    }

    pub fn port(&self) -> Option<u16> {
        self.lookup(Field::Port, PORT_LOOKUP)
            .and_then(|port| port.parse().ok())
    }

    /// The entry's URL with the resolved credentials and no path.
    pub fn url(&self) -> ExtendedUrl {
        let mut url = self.url.clone()
            .with_user(Some(self.user()))
            .with_password(self.password())
            .with_port(self.port());
        url.clear_path();
        url
    }

    pub fn target(&self) -> Result<MirrorTarget, ConfigError> {
        self.build_target(self.url())
    }

    pub fn target_for_repo(&self, repo: &str) -> Result<MirrorTarget, ConfigError> {
        let url = self.url()
            .with_repo(repo)
            .map_err(|source| ConfigError::Url { id: self.id.to_string(), source })?;
        self.build_target(url)
    }

    fn build_target(&self, url: ExtendedUrl) -> Result<MirrorTarget, ConfigError> {
        let base_url = url.to_string(false)
            .map_err(|source| ConfigError::Url { id: self.id.to_string(), source })?;
        Ok(MirrorTarget::new(base_url, self.id)
            .with_git_args(self.settings.git_args.clone()))
    }
}
