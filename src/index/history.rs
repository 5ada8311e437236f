//! History walking — which (commit, path) pairs are worth fingerprinting
//!
//! Full mode enumerates every commit reachable from any ref; sparse mode
//! resolves the catalog's file-of-interest patterns against the current
//! tree and follows each resolved path through renames. Either way the
//! output is typed commit metadata; the adapter owns all parsing.

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

use crate::catalog::LibraryDescriptor;
use crate::fingerprint;
use crate::vcs::{CommitInfo, GitRepo};
use crate::{IdlibError, IdlibResult};

/// Entire reachable history, deletions excluded. Tag descriptions arrive
/// batched in the commit metadata, so no per-commit describe calls follow.
pub fn full_history(repo: &GitRepo) -> IdlibResult<Vec<CommitInfo>> {
    repo.commits_with_metadata(None)
}

/// Ordered history of one path, following renames. Each entry carries the
/// path as it was spelled at that commit, so blob reads stay correct.
pub fn path_history(repo: &GitRepo, path: &str) -> IdlibResult<Vec<CommitInfo>> {
    repo.commits_with_metadata(Some(path))
}

/// Resolve a library's file-of-interest patterns to literal tracked paths.
///
/// Patterns match the *current* tree snapshot only: a path that was renamed
/// away or deleted before the present resolves to nothing, even though its
/// history exists. Resolved paths are additionally filtered to recognized
/// source files, and returned sorted and deduplicated.
pub fn resolve_sparse_paths(
    repo: &GitRepo,
    lib: &LibraryDescriptor,
) -> IdlibResult<Vec<String>> {
    let globs = build_globset(lib)?;
    let mut resolved: Vec<String> = repo
        .tracked_files()?
        .into_iter()
        .filter(|path| globs.is_match(path.as_str()))
        .filter(|path| fingerprint::is_indexable_source(path))
        .collect();
    resolved.sort();
    resolved.dedup();
    Ok(resolved)
}

/// File-of-interest patterns as one matcher. `*` and `?` stay within a
/// path component; `**` crosses directories.
fn build_globset(lib: &LibraryDescriptor) -> IdlibResult<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in &lib.files {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|e| {
                IdlibError::Configuration(format!(
                    "{}: bad file pattern {pattern:?}: {e}",
                    lib.name
                ))
            })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| {
        IdlibError::Configuration(format!("{}: cannot build file patterns: {e}", lib.name))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lib(files: &[&str]) -> LibraryDescriptor {
        LibraryDescriptor {
            name: "test".to_string(),
            repo: None,
            full_history: false,
            files: files.iter().map(|s| s.to_string()).collect(),
            git_remote: None,
            summary: None,
        }
    }

    #[test]
    fn test_malformed_pattern_is_a_configuration_error() {
        let err = build_globset(&lib(&["src/[unclosed"])).unwrap_err();
        assert!(matches!(err, IdlibError::Configuration(_)));
    }

    #[test]
    fn test_star_stays_within_one_directory() {
        let set = build_globset(&lib(&["lib/compress/*.c", "deflate.c"])).unwrap();
        assert!(set.is_match("lib/compress/zstd_compress.c"));
        assert!(set.is_match("deflate.c"));
        assert!(!set.is_match("lib/decompress/zstd_decompress.c"));
        assert!(!set.is_match("lib/compress/nested/deep.c"));
        assert!(!set.is_match("sub/deflate.c"));
    }

    #[test]
    fn test_double_star_crosses_directories() {
        let set = build_globset(&lib(&["googletest/**/*.h"])).unwrap();
        assert!(set.is_match("googletest/include/gtest/gtest.h"));
        assert!(!set.is_match("googlemock/include/gmock/gmock.h"));
    }
}
