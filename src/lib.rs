//! # idlib — Embedded Open-Source Library Identification
//!
//! Content-fingerprinting engine for software composition analysis. Builds a
//! lookup table mapping the SHA-256 of a file's raw bytes to the library,
//! commit, and release version that file came from, then uses that table to
//! detect vendored copies of known libraries inside arbitrary source trees.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         Indexer                              │
//! │  ┌──────────┐ ┌───────────┐ ┌──────────────┐ ┌───────────┐   │
//! │  │ Catalog  │ │ History   │ │ Record       │ │ Version   │   │
//! │  │ (toml)   │ │ Walker    │ │ Builder      │ │ Resolver  │   │
//! │  └────┬─────┘ └─────┬─────┘ │ (rayon)      │ │ (memoized)│   │
//! │       │             │       └──────┬───────┘ └─────┬─────┘   │
//! │  ┌────▼─────────────▼──────────────▼───────────────▼──────┐  │
//! │  │           GitRepo adapter (one subprocess per call)    │  │
//! │  └────────────────────────┬───────────────────────────────┘  │
//! │                           │                                  │
//! │  ┌────────────────────────▼───────────────────────────────┐  │
//! │  │  IndexStore (sqlite)  ⇄  Pruner (3 passes, audited)    │  │
//! │  │            Identifier (read-only queries)              │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Capabilities
//!
//! - **Full-history indexing**: every blob ever added, modified, or renamed
//!   across all refs of a library's repository
//! - **Sparse indexing**: only the curated files of interest, with rename
//!   tracking so blob lookups stay correct across history
//! - **Version labeling**: nearest-tag descriptors with a synthetic
//!   date-based fallback for untagged history
//! - **Principled dedup**: declared embedding relations resolve known
//!   vendoring; whatever ambiguity remains is removed symmetrically and
//!   logged for human audit
//! - **Exact identification**: byte-identical matching only, so a hit is a
//!   fact, not a similarity score

pub mod catalog;
pub mod fingerprint;
pub mod identify;
pub mod index;
pub mod metric;
pub mod prune;
pub mod store;
pub mod vcs;

// Re-exports for convenience
pub use catalog::{Catalog, LibraryDescriptor};
pub use identify::{identify_directory, Finding, IdentifyReport};
pub use index::{IndexMode, Indexer, LibraryStats};
pub use metric::{score_repository, Candidate};
pub use prune::{prune, AuditEntry, PruneReport};
pub use store::{IndexStore, ProvenanceRecord};
pub use vcs::{CommitInfo, GitRepo};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IdlibError {
    /// Pre-flight problem: missing or dirty repository, missing declared
    /// path, malformed catalog. Fatal before any store mutation.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("git invocation failed: {0}")]
    Vcs(String),

    /// A blob the history enumeration promised does not exist. Callers log
    /// the coordinates and skip the record rather than aborting the run.
    #[error("blob not found at {commit}:{path}")]
    BlobNotFound { commit: String, path: String },

    #[error("index store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("catalog parse error: {0}")]
    Catalog(#[from] toml::de::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type IdlibResult<T> = Result<T, IdlibError>;
