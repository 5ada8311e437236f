//! Record building — the hashing workhorse
//!
//! Turns enumerated (commit, path) pairs into provenance records: read the
//! blob's raw bytes, hash them, note the length. No pair depends on any
//! other, so commits fan out across the rayon pool and results are
//! collected as an order-independent set.
//!
//! A blob the enumeration promised but the object store cannot produce is
//! a VCS consistency wrinkle, not a reason to abort a multi-hour run: the
//! record is logged with full coordinates and skipped.

use rayon::prelude::*;

use crate::fingerprint;
use crate::store::ProvenanceRecord;
use crate::vcs::{CommitInfo, GitRepo};
use crate::IdlibError;

use super::version::VersionResolver;

/// Build records for every path of every enumerated commit.
///
/// Each rayon worker clones its own `GitRepo` value, so no process handle
/// is ever shared across threads.
pub fn build_records(
    repo: &GitRepo,
    library: &str,
    commits: &[CommitInfo],
    resolver: &VersionResolver<'_>,
) -> Vec<ProvenanceRecord> {
    commits
        .par_iter()
        .map_with(repo.clone(), |worker_repo, info| {
            commit_records(worker_repo, library, info, resolver)
        })
        .reduce(Vec::new, |mut acc, mut chunk| {
            acc.append(&mut chunk);
            acc
        })
}

/// Records for one commit: descriptor resolved once, then one record per
/// changed path.
fn commit_records(
    repo: &GitRepo,
    library: &str,
    info: &CommitInfo,
    resolver: &VersionResolver<'_>,
) -> Vec<ProvenanceRecord> {
    let version_descriptor = match resolver.descriptor(info) {
        Ok(desc) => desc,
        Err(e) => {
            tracing::warn!(
                "{library}: cannot resolve descriptor for {}: {e}; skipping commit",
                info.commit_hash
            );
            return Vec::new();
        }
    };

    let mut records = Vec::with_capacity(info.paths.len());
    for path in &info.paths {
        let bytes = match repo.file_bytes_at(&info.commit_hash, path) {
            Ok(bytes) => bytes,
            Err(IdlibError::BlobNotFound { commit, path }) => {
                tracing::warn!("{library}: blob not found at {commit}:{path}; record skipped");
                continue;
            }
            Err(e) => {
                tracing::warn!(
                    "{library}: reading {}:{path} failed: {e}; record skipped",
                    info.commit_hash
                );
                continue;
            }
        };
        records.push(ProvenanceRecord {
            content_hash: fingerprint::sha256_hex(&bytes),
            library: library.to_string(),
            commit_hash: info.commit_hash.clone(),
            commit_time: info.commit_time,
            version_descriptor: version_descriptor.clone(),
            path: path.clone(),
            size: bytes.len() as u64,
        });
    }
    records
}
