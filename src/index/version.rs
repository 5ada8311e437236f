//! Version descriptors — human labels for commits
//!
//! A commit's descriptor is its nearest-preceding-tag description
//! (`v5.4.6-106-g65b07dd5`). Commits with no reachable tag get a
//! synthesized label of the form `0^YYYYMMDD.<full hash>`, built so that
//! naive string ordering places every synthesized label before every real
//! tag name: untagged history reads as "oldest".

use chrono::{DateTime, FixedOffset};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::vcs::{CommitInfo, GitRepo};
use crate::IdlibResult;

/// Prefix of synthesized descriptors.
const FALLBACK_PREFIX: &str = "0^";

/// Synthesize the untagged-commit fallback descriptor.
pub fn fallback_descriptor(commit_hash: &str, commit_time: &DateTime<FixedOffset>) -> String {
    format!(
        "{FALLBACK_PREFIX}{}.{commit_hash}",
        commit_time.format("%Y%m%d")
    )
}

/// Per-run, memoizing descriptor resolver.
///
/// Sparse indexing walks one path at a time, and the same commit routinely
/// touches several tracked paths; the memo ensures each commit costs at
/// most one `git describe` per run, no matter how many worker threads ask.
pub struct VersionResolver<'r> {
    repo: &'r GitRepo,
    cache: Mutex<HashMap<String, Option<String>>>,
}

impl<'r> VersionResolver<'r> {
    pub fn new(repo: &'r GitRepo) -> Self {
        Self {
            repo,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Descriptor for an enumerated commit. A tag description batched into
    /// the log output is used as-is; otherwise the memoized `describe`
    /// result decides between the real tag label and the fallback.
    pub fn descriptor(&self, info: &CommitInfo) -> IdlibResult<String> {
        if let Some(desc) = &info.describe {
            return Ok(desc.clone());
        }
        let described = self.describe_memoized(&info.commit_hash)?;
        Ok(described
            .unwrap_or_else(|| fallback_descriptor(&info.commit_hash, &info.commit_time)))
    }

    fn describe_memoized(&self, commit: &str) -> IdlibResult<Option<String>> {
        if let Some(hit) = self.cache.lock().unwrap().get(commit) {
            return Ok(hit.clone());
        }
        let described = self.repo.describe(commit)?;
        self.cache
            .lock()
            .unwrap()
            .insert(commit.to_string(), described.clone());
        Ok(described)
    }
}
