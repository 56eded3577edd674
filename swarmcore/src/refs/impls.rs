use std::{
    collections::BTreeMap,
    fmt,
    str::FromStr,
};
use globset::{
    Glob,
    GlobSetBuilder,
};

use crate::error::RefError;
use super::*;

impl RefSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `git show-ref` output, one `<hash> <ref>` pair per line.
    pub fn from_show_ref(output: &str) -> Result<Self, RefError> {
        output.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| match line.split_once(char::is_whitespace) {
                Some((hash, name)) if !hash.is_empty() && !name.trim().is_empty() =>
                    Ok((name.trim().to_string(), hash.to_string())),
                _ => Err(RefError::InvalidListing(line.to_string())),
            })
            .collect()
    }

    pub fn insert(&mut self, ref_name: impl Into<String>, hash: impl Into<String>) {
        self.0.insert(ref_name.into(), hash.into());
    }

    pub fn get(&self, ref_name: &str) -> Option<&str> {
        self.0.get(ref_name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn diff(&self, new: &RefSnapshot) -> Vec<RefChange> {
        let mut changes: BTreeMap<&str, RefChange> = BTreeMap::new();
        for (name, hash) in self.0.iter() {
            if new.0.get(name) != Some(hash) {
                changes.insert(name, RefChange::new(hash.as_str(), ZERO_HASH, name.as_str()));
            }
        }
        // a ref that moved shows up on both sides; fold it into one edit
        for (name, hash) in new.0.iter() {
            if self.0.get(name) != Some(hash) {
                changes.entry(name)
                    .and_modify(|change| change.new_hash = hash.clone())
                    .or_insert_with(|| RefChange::new(ZERO_HASH, hash.as_str(), name.as_str()));
            }
        }
        changes.into_values().collect()
    }
}

impl FromIterator<(String, String)> for RefSnapshot {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl RefChange {
    pub fn new(
        old_hash: impl Into<String>,
        new_hash: impl Into<String>,
        ref_name: impl Into<String>,
    ) -> Self {
        Self {
            old_hash: old_hash.into(),
            new_hash: new_hash.into(),
            ref_name: ref_name.into(),
        }
    }

    pub fn is_create(&self) -> bool {
        is_zero_hash(&self.old_hash)
    }

    pub fn is_delete(&self) -> bool {
        is_zero_hash(&self.new_hash)
    }

    /// Parses every non-blank line of receive hook input.
    pub fn parse_lines(input: &str) -> Result<Vec<Self>, RefError> {
        input.lines()
            .filter(|line| !line.trim().is_empty())
            .map(Self::from_str)
            .collect()
    }
}

impl FromStr for RefChange {
    type Err = RefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut fields = s.split_whitespace();
        match (fields.next(), fields.next(), fields.next(), fields.next()) {
            (Some(old_hash), Some(new_hash), Some(ref_name), None) =>
                Ok(Self::new(old_hash, new_hash, ref_name)),
            _ => Err(RefError::InvalidChangeLine(s.to_string())),
        }
    }
}

impl fmt::Display for RefChange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {} {}", self.old_hash, self.new_hash, self.ref_name)
    }
}

impl RefSpec {
    pub fn new(src: Option<String>, dst: impl Into<String>) -> Self {
        Self {
            src: src.filter(|src| !src.is_empty() && !is_zero_hash(src)),
            dst: dst.into(),
        }
    }

    pub fn delete(dst: impl Into<String>) -> Self {
        Self::new(None, dst)
    }

    pub fn src(&self) -> Option<&str> {
        self.src.as_deref()
    }

    pub fn dst(&self) -> &str {
        &self.dst
    }

    pub fn is_delete(&self) -> bool {
        self.src.is_none()
    }

    /// Refspecs for the raw pre-receive input, one per update line.
    pub fn from_change_lines(input: &str) -> Result<Vec<Self>, RefError> {
        Ok(RefChange::parse_lines(input)?
            .iter()
            .map(Self::from)
            .collect())
    }
}

impl From<&RefChange> for RefSpec {
    fn from(change: &RefChange) -> Self {
        Self::new(Some(change.new_hash.clone()), change.ref_name.clone())
    }
}

impl FromStr for RefSpec {
    type Err = RefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (src, dst) = s.split_once(':').unwrap_or((s, s));
        if dst.is_empty() || dst.contains(char::is_whitespace) {
            return Err(RefError::InvalidRefSpec(s.to_string()));
        }
        Ok(Self::new(Some(src.to_string()), dst))
    }
}

impl fmt::Display for RefSpec {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.src.as_deref().unwrap_or_default(), self.dst)
    }
}

impl ActiveRefs {
    /// Parses the allow-list; blank lines and `#` comments are skipped.
    pub fn parse(text: &str) -> Result<Self, RefError> {
        let patterns = text.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .collect::<Vec<_>>();
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns.iter() {
            builder.add(Glob::new(pattern).map_err(|e| RefError::InvalidPattern {
                pattern: pattern.clone(),
                msg: e.to_string(),
            })?);
        }
        let matcher = builder.build().map_err(|e| RefError::InvalidPattern {
            pattern: patterns.join(" "),
            msg: e.to_string(),
        })?;
        Ok(Self { patterns, matcher })
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn is_match(&self, ref_name: &str) -> bool {
        self.matcher.is_match(ref_name)
    }

    /// Keeps the refspecs whose destination ref is allowed.
    pub fn filter(&self, specs: &[RefSpec]) -> Vec<RefSpec> {
        specs.iter()
            .filter(|spec| {
                let allowed = self.is_match(spec.dst());
                if !allowed {
                    log::trace!("{} is not an active ref; not mirrored", spec.dst());
                }
                allowed
            })
            .cloned()
            .collect()
    }

    /// Forced fetch refspecs for the allowed patterns; with no allow-list
    /// every ref is fetched.
    pub fn fetch_refspecs(active: Option<&ActiveRefs>) -> Vec<String> {
        match active {
            Some(active) => active.patterns.iter()
                .map(|pattern| format!("+{pattern}:{pattern}"))
                .collect(),
            None => vec![DEFAULT_FETCH_REFSPEC.to_string()],
        }
    }
}

impl FromStr for ActiveRefs {
    type Err = RefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
