//! Artifact versions and version-tag arithmetic.
//!
//! Tags look like `v1`, `v2`, ... but the remote store is not strict about
//! it, so ordering only looks at the trailing integer of a tag. Tags with
//! no trailing integer are ignored by the arithmetic.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Tag assumed when no version exists yet.
pub const INITIAL_VERSION: &str = "v1";

/// Trailing integer of a tag: `"v12"` → 12, `"release-3"` → 3.
pub fn trailing_number(tag: &str) -> Option<u64> {
    let digits = tag.len() - tag.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return None;
    }
    tag[tag.len() - digits..].parse().ok()
}

/// Highest tag by trailing integer. Ties keep the first occurrence; an
/// empty (or entirely unnumbered) list yields `v1`.
pub fn highest_version<S: AsRef<str>>(tags: &[S]) -> String {
    let mut best: Option<(u64, &str)> = None;
    for tag in tags {
        let tag = tag.as_ref();
        if let Some(n) = trailing_number(tag) {
            if best.map_or(true, |(current, _)| n > current) {
                best = Some((n, tag));
            }
        }
    }
    best.map(|(_, tag)| tag.to_string())
        .unwrap_or_else(|| INITIAL_VERSION.to_string())
}

/// Tag following the highest existing one: highest integer + 1.
///
/// With no numbered tags the highest is taken to be `v1`, so the result is
/// `v2`; callers that find no versions at all create [`INITIAL_VERSION`]
/// instead. The number saturates at `u64::MAX`; a store already holding
/// that tag reports it as existing, and probing surfaces the lock.
pub fn next_version<S: AsRef<str>>(tags: &[S]) -> String {
    let highest = tags
        .iter()
        .filter_map(|tag| trailing_number(tag.as_ref()))
        .max()
        .unwrap_or(1);
    format!("v{}", highest.saturating_add(1))
}

/// Sort tags from highest to lowest trailing integer. Unnumbered tags go
/// last; the sort is stable.
pub fn sort_descending<S: AsRef<str>>(tags: &mut [S]) {
    tags.sort_by(|a, b| compare_tags(b.as_ref(), a.as_ref()));
}

fn compare_tags(a: &str, b: &str) -> Ordering {
    trailing_number(a).cmp(&trailing_number(b))
}

/// One version of a remote artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactVersion {
    pub artifact_id: String,
    #[serde(alias = "version", alias = "version_id", alias = "versionId")]
    pub tag: String,
    #[serde(default)]
    pub locked: bool,
}

impl ArtifactVersion {
    pub fn new(artifact_id: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            artifact_id: artifact_id.into(),
            tag: tag.into(),
            locked: false,
        }
    }

    pub fn number(&self) -> Option<u64> {
        trailing_number(&self.tag)
    }
}

impl fmt::Display for ArtifactVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.artifact_id, self.tag)
    }
}
