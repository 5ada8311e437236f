//! Identification — what known library is this file from?
//!
//! Walks a target directory, hashes every recognized source file, and asks
//! the index for exact matches. Findings are ephemeral query results and
//! are never written back to the store.
//!
//! Output is deterministic for identical inputs: files are visited in
//! sorted relative-path order and matches are sorted within each library,
//! so neither filesystem enumeration order nor anything else can reorder
//! the report.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::fingerprint;
use crate::store::{IndexStore, ProvenanceRecord};
use crate::IdlibResult;

/// One match: a queried file and the provenance record it hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    /// Path relative to the queried directory.
    pub rel_path: PathBuf,
    pub record: ProvenanceRecord,
}

/// Everything identification learned about one directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifyReport {
    pub target: PathBuf,
    pub files_scanned: usize,
    pub files_matched: usize,
    /// Findings grouped by library. A file may appear under several
    /// libraries only if ambiguity survived pruning.
    pub findings: BTreeMap<String, Vec<Finding>>,
}

impl IdentifyReport {
    /// Detailed view: every match, sorted by library then path then
    /// descriptor.
    pub fn detailed(&self) -> impl Iterator<Item = (&str, &Finding)> {
        self.findings
            .iter()
            .flat_map(|(library, findings)| findings.iter().map(move |f| (library.as_str(), f)))
    }

    /// Summarized view: per library, the match with the newest commit
    /// time. The newest observed version is the best lower-bound estimate
    /// of the embedded version.
    pub fn summarized(&self) -> Vec<(&str, &ProvenanceRecord)> {
        self.findings
            .iter()
            .filter_map(|(library, findings)| {
                findings
                    .iter()
                    .map(|f| &f.record)
                    .max_by(|a, b| {
                        a.commit_time
                            .cmp(&b.commit_time)
                            .then_with(|| a.version_descriptor.cmp(&b.version_descriptor))
                            .then_with(|| a.path.cmp(&b.path))
                    })
                    .map(|record| (library.as_str(), record))
            })
            .collect()
    }
}

/// Identify embedded libraries in a source directory.
pub fn identify_directory(store: &IndexStore, directory: &Path) -> IdlibResult<IdentifyReport> {
    // Collect first, then sort: walkdir order is filesystem-dependent.
    let mut files: Vec<PathBuf> = WalkDir::new(directory)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| fingerprint::is_recognized_source(e.path()))
        .map(|e| e.path().to_path_buf())
        .collect();
    files.sort();

    let mut findings: BTreeMap<String, Vec<Finding>> = BTreeMap::new();
    let mut files_matched = 0;

    for path in &files {
        let (hash, _size) = fingerprint::hash_file(path)?;
        let records = store.lookup(&hash)?;
        if records.is_empty() {
            continue;
        }
        files_matched += 1;
        let rel_path = path
            .strip_prefix(directory)
            .unwrap_or(path.as_path())
            .to_path_buf();
        for record in records {
            findings.entry(record.library.clone()).or_default().push(Finding {
                rel_path: rel_path.clone(),
                record,
            });
        }
    }

    for per_library in findings.values_mut() {
        per_library.sort_by(|a, b| {
            a.rel_path
                .cmp(&b.rel_path)
                .then_with(|| a.record.path.cmp(&b.record.path))
                .then_with(|| a.record.version_descriptor.cmp(&b.record.version_descriptor))
        });
    }

    Ok(IdentifyReport {
        target: directory.to_path_buf(),
        files_scanned: files.len(),
        files_matched,
        findings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use std::fs;
    use tempfile::TempDir;

    fn record_at(
        hash: &str,
        library: &str,
        path: &str,
        descriptor: &str,
        time: &str,
    ) -> ProvenanceRecord {
        ProvenanceRecord {
            content_hash: hash.to_string(),
            library: library.to_string(),
            commit_hash: format!("c-{descriptor}"),
            commit_time: DateTime::parse_from_rfc3339(time).unwrap(),
            version_descriptor: descriptor.to_string(),
            path: path.to_string(),
            size: 1,
        }
    }

    fn store_with(records: Vec<ProvenanceRecord>) -> IndexStore {
        let mut store = IndexStore::open_in_memory().unwrap();
        let mut by_lib: BTreeMap<String, Vec<ProvenanceRecord>> = BTreeMap::new();
        for r in records {
            by_lib.entry(r.library.clone()).or_default().push(r);
        }
        for (lib, recs) in by_lib {
            store.bulk_replace(&lib, &recs).unwrap();
        }
        store
    }

    #[test]
    fn test_identify_matches_by_content_not_name() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("renamed_z.c"), "zlib deflate body").unwrap();
        fs::write(dir.path().join("unknown.c"), "something else").unwrap();
        fs::write(dir.path().join("notes.txt"), "zlib deflate body").unwrap();

        let hash = fingerprint::sha256_hex(b"zlib deflate body");
        let store = store_with(vec![record_at(
            &hash,
            "zlib",
            "deflate.c",
            "v1.2.11",
            "2017-01-15T09:00:00+00:00",
        )]);

        let report = identify_directory(&store, dir.path()).unwrap();
        // .txt file is not queried even though its bytes would match
        assert_eq!(report.files_scanned, 2);
        assert_eq!(report.files_matched, 1);
        let matches: Vec<_> = report.detailed().collect();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].0, "zlib");
        assert_eq!(matches[0].1.rel_path, PathBuf::from("renamed_z.c"));
        assert_eq!(matches[0].1.record.path, "deflate.c");
    }

    #[test]
    fn test_zero_matches_is_a_valid_empty_report() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("main.c"), "int main(){}").unwrap();

        let store = store_with(vec![]);
        let report = identify_directory(&store, dir.path()).unwrap();
        assert_eq!(report.files_matched, 0);
        assert!(report.findings.is_empty());
        assert!(report.summarized().is_empty());
    }

    #[test]
    fn test_summarized_reports_newest_commit_per_library() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.c"), "old body").unwrap();
        fs::write(dir.path().join("b.c"), "new body").unwrap();

        let old_hash = fingerprint::sha256_hex(b"old body");
        let new_hash = fingerprint::sha256_hex(b"new body");
        let store = store_with(vec![
            record_at(&old_hash, "curl", "lib/http.c", "v7.50.0", "2016-07-21T08:00:00+00:00"),
            record_at(&new_hash, "curl", "lib/http.c", "v7.88.0", "2023-02-15T08:00:00+00:00"),
        ]);

        let report = identify_directory(&store, dir.path()).unwrap();
        let summary = report.summarized();
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].0, "curl");
        assert_eq!(summary[0].1.version_descriptor, "v7.88.0");
    }

    #[test]
    fn test_detailed_order_is_stable() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("z.c"), "body z").unwrap();
        fs::write(dir.path().join("a.c"), "body a").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/m.c"), "body m").unwrap();

        let store = store_with(vec![
            record_at(&fingerprint::sha256_hex(b"body z"), "zlib", "z.c", "v1", "2020-01-01T00:00:00+00:00"),
            record_at(&fingerprint::sha256_hex(b"body a"), "zlib", "a.c", "v1", "2020-01-01T00:00:00+00:00"),
            record_at(&fingerprint::sha256_hex(b"body m"), "curl", "m.c", "v2", "2020-01-01T00:00:00+00:00"),
        ]);

        let report = identify_directory(&store, dir.path()).unwrap();
        let order: Vec<(String, PathBuf)> = report
            .detailed()
            .map(|(lib, f)| (lib.to_string(), f.rel_path.clone()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("curl".to_string(), PathBuf::from("sub/m.c")),
                ("zlib".to_string(), PathBuf::from("a.c")),
                ("zlib".to_string(), PathBuf::from("z.c")),
            ]
        );
    }
}
