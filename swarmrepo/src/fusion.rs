use std::{
    collections::BTreeMap,
    fmt,
    str::FromStr,
};
use regex::Regex;
use tempfile::TempDir;
use swarmcore::{
    command::{
        Echo,
        Runner,
    },
    target::MirrorTarget,
    url::Command,
};

use crate::{
    command::strip_remote_prefix,
    error::FusionError,
};

/// A Git Fusion release, e.g. `2015.2.1128995`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct FusionVersion {
    pub year: u32,
    pub release: u32,
    pub change: u64,
}

/// Result of comparing the remote's version against a minimum.
#[derive(Clone, Debug, PartialEq)]
pub struct VersionCheck {
    pub version: FusionVersion,
    pub outdated: bool,
}

impl fmt::Display for FusionVersion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}.{}", self.year, self.release, self.change)
    }
}

impl FromStr for FusionVersion {
    type Err = FusionError;

    /// Parses `year.release[.change]`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || FusionError::InvalidMinVersion(s.to_string());
        let mut parts = s.trim().split('.');
        let year = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
        let release = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
        let change = match parts.next() {
            Some(p) => p.parse().map_err(|_| invalid())?,
            None => 0,
        };
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(Self { year, release, change })
    }
}

/// Extracts the version from `@info` output such as
/// `Rev. Git Fusion/2015.2/1128995 (2015/06/23)`.
pub fn parse_version(output: &str) -> Result<FusionVersion, FusionError> {
    let rev = Regex::new(r"Rev\. Git Fusion/(\d+)\.(\d+)[^/]*/(\d+)")?;
    let unknown = || FusionError::UnknownVersion(output.trim().to_string());
    let captures = rev.captures(output).ok_or_else(unknown)?;
    let number = |i: usize| captures.get(i).map(|m| m.as_str()).unwrap_or_default();
    Ok(FusionVersion {
        year: number(1).parse().map_err(|_| unknown())?,
        release: number(2).parse().map_err(|_| unknown())?,
        change: number(3).parse().map_err(|_| unknown())?,
    })
}

/// Line the remote ends its `@list` reply with.
const LIST_TERMINATOR: &str = "fatal: Could not read from remote repository.";

/// Parses `@list` output into repository name and description.  The
/// listing sits between the `Cloning into` line and the terminating fatal
/// error; anything else yields an empty map.
pub fn parse_repos(output: &str) -> Result<BTreeMap<String, String>, FusionError> {
    let entry = Regex::new(
        r"^(?P<name>[\w\-]+)\s+(?:push|pull)?\s+[\w\-]+\s+(?P<description>.+?)$"
    )?;
    let lines = output.lines()
        .map(|line| strip_remote_prefix(line.trim_end()))
        .collect::<Vec<_>>();
    let Some(end) = lines.iter().position(|line| *line == LIST_TERMINATOR) else {
        return Ok(BTreeMap::new());
    };
    Ok(lines.get(1..end)
        .unwrap_or_default()
        .iter()
        .filter_map(|line| entry.captures(line))
        .filter_map(|captures| Some((
            captures.name("name")?.as_str().to_string(),
            captures.name("description")?.as_str().to_string(),
        )))
        .collect())
}

/// Runs one administrative command against the target's base URL.
fn run_command<R: Runner>(
    runner: &R,
    target: &MirrorTarget,
    command: Command,
) -> Result<String, FusionError> {
    let mut url = target.url()?;
    url.clear_path();
    let url = url.with_command(command).to_string(false)?;
    let argv = target.git_command(["clone", "--", url.as_str()]);
    // the remote answers with an error exit status, so only the text matters
    let scratch = TempDir::new()?;
    let output = runner.run(&argv, scratch.path(), Echo::Silent)?;
    log::trace!("@{command} returned status {}", output.status);
    Ok(output.output)
}

pub fn list_repos<R: Runner>(
    runner: &R,
    target: &MirrorTarget,
) -> Result<BTreeMap<String, String>, FusionError> {
    parse_repos(&run_command(runner, target, Command::List)?)
}

pub fn version<R: Runner>(
    runner: &R,
    target: &MirrorTarget,
) -> Result<FusionVersion, FusionError> {
    parse_version(&run_command(runner, target, Command::Info)?)
}

/// Compares `version` against `min_version` (`year.release[.change]`).
pub fn check_version(
    version: FusionVersion,
    min_version: &str,
) -> Result<VersionCheck, FusionError> {
    let min: FusionVersion = min_version.parse()?;
    Ok(VersionCheck {
        version,
        outdated: version < min,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use textwrap_macros::dedent;

    #[test]
    fn test_parse_version() {
        let output = dedent!(r#"
            Perforce - The Fast Software Configuration Management System.
            Copyright 2014 Perforce Software.  All rights reserved.
            Rev. Git Fusion/2015.2/1128995 (2015/06/23).
            SHA1: 9b7e5e2d1a
        "#);
        let version = parse_version(output).unwrap();
        assert_eq!(version, FusionVersion { year: 2015, release: 2, change: 1128995 });
        assert_eq!(version.to_string(), "2015.2.1128995");

        let version = parse_version("remote: Rev. Git Fusion/2016.1.SP1/1400259 (2016/04/01)").unwrap();
        assert_eq!(version.to_string(), "2016.1.1400259");

        assert!(matches!(parse_version("fatal: not a fusion server"), Err(FusionError::UnknownVersion(_))));
    }

    #[test]
    fn test_check_version() {
        let version = FusionVersion { year: 2015, release: 2, change: 1128995 };
        assert!(!check_version(version, "2015.2").unwrap().outdated);
        assert!(!check_version(version, "2015.2.1128995").unwrap().outdated);
        assert!(check_version(version, "2015.2.1128996").unwrap().outdated);
        assert!(check_version(version, "2015.3").unwrap().outdated);
        assert!(!check_version(version, "2014.9.9999999").unwrap().outdated);
        for min in ["", "2015", "2015.x", "a.b.c", "2015.2.1.1"] {
            match check_version(version, min) {
                Err(e) => assert_eq!(e.to_string(), format!("Invalid min_version specified: {min}")),
                Ok(_) => panic!("{min} should be rejected"),
            }
        }
    }

    #[test]
    fn test_parse_repos() {
        let output = dedent!(r#"
            Cloning into '@list'...
            remote: Talkhouse   push  utf8  Talkhouse project
            remote: Jam         pull  utf8  Jam/MR, the make replacement
            remote: plain-repo        utf8  no access column
            remote: not-a-repo
            fatal: Could not read from remote repository.

            Please make sure you have the correct access rights
            and the repository exists.
        "#);
        let repos = parse_repos(output).unwrap();
        assert_eq!(repos.len(), 3);
        assert_eq!(repos["Talkhouse"], "Talkhouse project");
        assert_eq!(repos["Jam"], "Jam/MR, the make replacement");
        assert_eq!(repos["plain-repo"], "no access column");
    }

    #[test]
    fn test_parse_repos_invalid() {
        assert!(parse_repos("").unwrap().is_empty());
        assert!(parse_repos("garbage").unwrap().is_empty());
        // no terminator line
        assert!(parse_repos("Cloning into '@list'...\nTalkhouse push utf8 desc\n").unwrap().is_empty());
        let output = "Cloning into '@list'...\n\
            No option 'description' in section: '@repo'\n\
            fatal: Could not read from remote repository.\n\n";
        assert!(parse_repos(output).unwrap().is_empty());
    }
}
