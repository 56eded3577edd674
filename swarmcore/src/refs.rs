use std::collections::BTreeMap;
use globset::GlobSet;

/// The hash git uses to denote a missing side of a ref update.
pub const ZERO_HASH: &str = "0000000000000000000000000000000000000000";

/// Fetch refspec used when no allow-list is present.
pub const DEFAULT_FETCH_REFSPEC: &str = "+refs/*:refs/*";

/// Ordered mapping of fully-qualified ref name to commit hash.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RefSnapshot(BTreeMap<String, String>);

/// One `<old> <new> <ref>` update, as git hands them to receive hooks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefChange {
    pub old_hash: String,
    pub new_hash: String,
    pub ref_name: String,
}

/// A push refspec; a missing source deletes the destination ref.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefSpec {
    src: Option<String>,
    dst: String,
}

/// The per-repository allow-list of ref glob patterns that are mirrored.
#[derive(Clone, Debug)]
pub struct ActiveRefs {
    patterns: Vec<String>,
    matcher: GlobSet,
}

pub fn is_zero_hash(hash: &str) -> bool {
    !hash.is_empty() && hash.bytes().all(|b| b == b'0')
}

/// Computes the changes that turn `old` into `new`.
pub fn diff(old: &RefSnapshot, new: &RefSnapshot) -> Vec<RefChange> {
    old.diff(new)
}

mod impls;
