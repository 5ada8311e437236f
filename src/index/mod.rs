//! Indexing engine — per-library orchestration of walk, hash, and store
//!
//! One library at a time: enumerate history (full or sparse), fan the
//! hashing out over the worker pool, then hand the whole record set to the
//! store in a single transaction. Each library's write is independent, so
//! killing the process between libraries leaves every already-committed
//! library valid and the rest simply unindexed.

pub mod builder;
pub mod history;
pub mod version;

use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, LibraryDescriptor};
use crate::store::{IndexStore, ProvenanceRecord};
use crate::vcs::GitRepo;
use crate::IdlibResult;

use version::VersionResolver;

/// How much of a library's history to fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexMode {
    /// Only the curated files of interest, rename-following.
    Sparse,
    /// Every blob in every commit reachable from any ref.
    Full,
}

impl std::fmt::Display for IndexMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sparse => write!(f, "sparse"),
            Self::Full => write!(f, "full"),
        }
    }
}

/// Per-library indexing outcome, for the run summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryStats {
    pub library: String,
    pub mode: IndexMode,
    pub commits_seen: usize,
    pub records_written: usize,
    pub duration_ms: u64,
}

/// The indexing engine. Owns nothing long-lived; borrows the store and the
/// catalog for the duration of one run.
pub struct Indexer<'a> {
    store: &'a mut IndexStore,
    catalog: &'a Catalog,
}

impl<'a> Indexer<'a> {
    pub fn new(store: &'a mut IndexStore, catalog: &'a Catalog) -> Self {
        Self { store, catalog }
    }

    /// Index every selected library in catalog order.
    ///
    /// Assumes [`Catalog::validate`] already passed; this method starts
    /// mutating the store.
    pub fn run(
        &mut self,
        libs: &[&LibraryDescriptor],
        mode: IndexMode,
    ) -> IdlibResult<Vec<LibraryStats>> {
        let mut stats = Vec::with_capacity(libs.len());
        for lib in libs {
            stats.push(self.index_library(lib, mode)?);
        }
        Ok(stats)
    }

    fn index_library(
        &mut self,
        lib: &LibraryDescriptor,
        mode: IndexMode,
    ) -> IdlibResult<LibraryStats> {
        let start = std::time::Instant::now();
        tracing::info!("→ indexing {} ({mode})", lib.name);

        let repo = GitRepo::open(&self.catalog.repo_path(lib))?;
        // A library flagged full-history is always walked in full, even
        // when the run as a whole is sparse; it has no file list to walk.
        let effective_mode = if lib.full_history { IndexMode::Full } else { mode };

        let (commits_seen, records) = match effective_mode {
            IndexMode::Full => self.collect_full(&repo, lib)?,
            IndexMode::Sparse => self.collect_sparse(&repo, lib)?,
        };

        let records_written = match effective_mode {
            IndexMode::Full => self.store.bulk_replace(&lib.name, &records)?,
            IndexMode::Sparse => self.store.upsert(&records)?,
        };
        self.store.record_library_metadata(
            &lib.name,
            lib.git_remote.as_deref(),
            lib.summary.as_deref(),
        )?;

        let duration_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            "  ✓ {} done in {duration_ms}ms ({commits_seen} commits, {records_written} records)",
            lib.name
        );
        Ok(LibraryStats {
            library: lib.name.clone(),
            mode: effective_mode,
            commits_seen,
            records_written,
            duration_ms,
        })
    }

    fn collect_full(
        &self,
        repo: &GitRepo,
        lib: &LibraryDescriptor,
    ) -> IdlibResult<(usize, Vec<ProvenanceRecord>)> {
        let commits = history::full_history(repo)?;
        let file_count: usize = commits.iter().map(|c| c.paths.len()).sum();
        tracing::info!(
            "  {} commits, {file_count} blobs to fingerprint",
            commits.len()
        );

        let resolver = VersionResolver::new(repo);
        let records = builder::build_records(repo, &lib.name, &commits, &resolver);
        Ok((commits.len(), records))
    }

    fn collect_sparse(
        &self,
        repo: &GitRepo,
        lib: &LibraryDescriptor,
    ) -> IdlibResult<(usize, Vec<ProvenanceRecord>)> {
        let paths = history::resolve_sparse_paths(repo, lib)?;
        if paths.is_empty() {
            tracing::warn!(
                "{}: no files of interest resolved; nothing to index",
                lib.name
            );
            return Ok((0, Vec::new()));
        }

        let resolver = VersionResolver::new(repo);
        let mut commits_seen = 0;
        let mut records = Vec::new();
        for path in &paths {
            let commits = history::path_history(repo, path)?;
            tracing::info!("  {} versions of {path}", commits.len());
            commits_seen += commits.len();
            records.extend(builder::build_records(repo, &lib.name, &commits, &resolver));
        }
        Ok((commits_seen, records))
    }
}
