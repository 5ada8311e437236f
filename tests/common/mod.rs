//! Shared fixtures: throwaway git repositories driven by the same `git`
//! binary the adapter shells out to, with pinned commit dates so version
//! descriptors and summaries are reproducible.
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use idlib::{Catalog, LibraryDescriptor};
use tempfile::TempDir;

pub struct GitFixture {
    dir: TempDir,
}

impl GitFixture {
    pub fn new() -> Self {
        let fixture = Self {
            dir: TempDir::new().expect("create temp dir"),
        };
        fixture.git(&["init", "-q"], &[]);
        fixture.git(&["config", "user.email", "dev@example.com"], &[]);
        fixture.git(&["config", "user.name", "Fixture"], &[]);
        fixture.git(&["config", "commit.gpgsign", "false"], &[]);
        fixture
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, rel_path: &str, contents: &str) {
        let path = self.dir.path().join(rel_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent dirs");
        }
        std::fs::write(path, contents).expect("write fixture file");
    }

    /// Stage everything and commit with a pinned author + committer date,
    /// e.g. `"2020-01-01 00:00:00 +0000"`.
    pub fn commit(&self, message: &str, date: &str) {
        self.git(&["add", "-A"], &[]);
        self.git(
            &["commit", "-q", "--allow-empty", "-m", message, "--date", date],
            &[("GIT_COMMITTER_DATE", date), ("GIT_AUTHOR_DATE", date)],
        );
    }

    pub fn tag(&self, name: &str) {
        self.git(&["tag", name], &[]);
    }

    pub fn mv(&self, from: &str, to: &str) {
        self.git(&["mv", from, to], &[]);
    }

    pub fn rm(&self, rel_path: &str) {
        self.git(&["rm", "-q", rel_path], &[]);
    }

    fn git(&self, args: &[&str], env: &[(&str, &str)]) {
        let mut cmd = Command::new("git");
        cmd.arg("-C").arg(self.dir.path()).args(args);
        for (key, value) in env {
            cmd.env(key, value);
        }
        let out = cmd.output().expect("spawn git");
        assert!(
            out.status.success(),
            "git {args:?} failed: {}",
            String::from_utf8_lossy(&out.stderr)
        );
    }
}

/// A catalog entry pointing straight at a fixture repository.
pub fn library(name: &str, repo: &Path, full_history: bool, files: &[&str]) -> LibraryDescriptor {
    LibraryDescriptor {
        name: name.to_string(),
        repo: Some(repo.to_path_buf()),
        full_history,
        files: files.iter().map(|s| s.to_string()).collect(),
        git_remote: None,
        summary: None,
    }
}

/// A catalog from explicit entries plus `(outer, inner)` embedding edges.
pub fn catalog(libraries: Vec<LibraryDescriptor>, embedded: &[(&str, &str)]) -> Catalog {
    let mut edges: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (outer, inner) in embedded {
        edges
            .entry(outer.to_string())
            .or_default()
            .push(inner.to_string());
    }
    Catalog {
        library_root: PathBuf::from("libraries"),
        libraries,
        embedded: edges,
    }
}
