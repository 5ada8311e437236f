//! Pruning — turning raw multiplicity into unambiguous signal
//!
//! Three ordered passes, each committing independently and each safe to
//! re-run from the top:
//!
//! 1. **Zero-byte elimination.** Empty files are identical everywhere and
//!    would match universally; every size-0 record goes.
//! 2. **Declared-embedding elimination.** For each declared edge
//!    "outer vendors inner", hashes present under both lose their outer
//!    copies and keep the inner ones. Chains resolve only when declared
//!    edge by edge; nothing is closed transitively.
//! 3. **Residual-ambiguity elimination.** A hash still spanning several
//!    libraries is an undeclared duplicate (shared boilerplate, license
//!    headers, generated stubs). Unresolved ambiguous signal is treated as
//!    no signal: the hash is deleted under *all* contenders, and every
//!    deletion is logged for manual audit.
//!
//! A crash between passes leaves the index valid, just less pruned.

use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::store::IndexStore;
use crate::IdlibResult;

/// Why an audited deletion happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditReason {
    /// Removed from the outer library of a declared embedding edge.
    DeclaredEmbedding,
    /// Removed everywhere as an undeclared cross-library duplicate.
    UndeclaredDuplicate,
}

/// One audited deletion: enough coordinates for a human to re-check it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub reason: AuditReason,
    /// Libraries involved; for embedding edges `[outer, inner]`, for
    /// undeclared duplicates every library that claimed the hash.
    pub libraries: Vec<String>,
    pub content_hash: String,
    /// One representative path.
    pub sample_path: String,
}

/// Outcome of one pruning run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PruneReport {
    pub empty_removed: usize,
    pub embedded_removed: usize,
    pub ambiguous_removed: usize,
    pub audit: Vec<AuditEntry>,
}

impl PruneReport {
    pub fn total_removed(&self) -> usize {
        self.empty_removed + self.embedded_removed + self.ambiguous_removed
    }
}

/// Run all three passes in order. Idempotent: a second run on the same
/// index deletes nothing further.
pub fn prune(store: &mut IndexStore, catalog: &Catalog) -> IdlibResult<PruneReport> {
    let mut report = PruneReport::default();

    tracing::info!("pruning: removing empty files");
    report.empty_removed = store.delete_zero_size()?;
    tracing::info!("  {} empty-file records removed", report.empty_removed);

    tracing::info!("pruning: resolving declared embeddings");
    for (outer, inner) in catalog.embedding_edges() {
        let shared = store.hashes_shared_with(outer, inner)?;
        if shared.is_empty() {
            continue;
        }
        tracing::info!("  {outer} -= {inner}: {} shared hashes", shared.len());
        for (hash, sample_path) in &shared {
            tracing::info!("    delete in {outer}: {hash} {sample_path}");
            report.audit.push(AuditEntry {
                reason: AuditReason::DeclaredEmbedding,
                libraries: vec![outer.to_string(), inner.to_string()],
                content_hash: hash.clone(),
                sample_path: sample_path.clone(),
            });
        }
        let hashes: Vec<String> = shared.into_iter().map(|(hash, _)| hash).collect();
        report.embedded_removed += store.delete_hashes_in_library(&hashes, outer)?;
    }

    tracing::info!("pruning: removing undeclared duplicates (audit this list)");
    let ambiguous = store.ambiguous_hashes()?;
    for entry in &ambiguous {
        tracing::warn!(
            "  duplicate across {}: {} {}",
            entry.libraries.join(" <--> "),
            entry.content_hash,
            entry.sample_path
        );
        report.audit.push(AuditEntry {
            reason: AuditReason::UndeclaredDuplicate,
            libraries: entry.libraries.clone(),
            content_hash: entry.content_hash.clone(),
            sample_path: entry.sample_path.clone(),
        });
    }
    let hashes: Vec<String> = ambiguous
        .into_iter()
        .map(|entry| entry.content_hash)
        .collect();
    report.ambiguous_removed = store.delete_hashes_everywhere(&hashes)?;

    tracing::info!(
        "pruning done: {} records removed ({} empty, {} embedded, {} ambiguous)",
        report.total_removed(),
        report.empty_removed,
        report.embedded_removed,
        report.ambiguous_removed
    );
    Ok(report)
}
