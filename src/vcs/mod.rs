//! Git adapter — read-only access to one repository's history and blobs
//!
//! Every `git` invocation and every scrap of log-output parsing lives here.
//! The rest of the crate only ever consumes typed [`CommitInfo`] values, so
//! delimiter quirks and date formats cannot leak into core logic.
//!
//! The adapter is stateless: a [`GitRepo`] holds nothing but the repository
//! path and spawns one subprocess per call, so values can be cloned freely
//! and used concurrently from a worker pool.

use chrono::{DateTime, FixedOffset};
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::{IdlibError, IdlibResult};

/// Record separator in custom log formats. Chosen over `-z` because git
/// terminates the header line of a `-z --name-only` record inconsistently.
const RECORD_SEP: char = '\u{1e}';
/// Field separator within a log header line.
const FIELD_SEP: char = '\u{1f}';

// ─── Types ─────────────────────────────────────────────────────────

/// One commit of interest, as enumerated by the history walk.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitInfo {
    pub commit_hash: String,
    /// Committer timestamp with its original UTC offset preserved.
    pub commit_time: DateTime<FixedOffset>,
    /// Paths added, modified, or renamed-to in this commit. For a
    /// single-path walk this is the path *at that commit*, which may differ
    /// from the path queried when renames are involved.
    pub paths: Vec<String>,
    /// Nearest-tag description when the enumeration batched it into the log
    /// format; `None` means "resolve separately", not "untagged".
    pub describe: Option<String>,
}

// ─── Adapter ───────────────────────────────────────────────────────

/// Read-only handle on a git repository, backed by the `git` binary.
#[derive(Debug, Clone)]
pub struct GitRepo {
    repo_path: PathBuf,
}

impl GitRepo {
    /// Open a repository, verifying the path actually is a git work tree.
    pub fn open(repo_path: &Path) -> IdlibResult<Self> {
        if !Self::is_repository(repo_path) {
            return Err(IdlibError::Configuration(format!(
                "not a git repository: {}",
                repo_path.display()
            )));
        }
        Ok(Self {
            repo_path: repo_path.to_path_buf(),
        })
    }

    /// Whether `path` is inside a git work tree.
    pub fn is_repository(path: &Path) -> bool {
        path.is_dir()
            && Command::new("git")
                .arg("-C")
                .arg(path)
                .args(["rev-parse", "--is-inside-work-tree"])
                .output()
                .map(|o| o.status.success())
                .unwrap_or(false)
    }

    pub fn path(&self) -> &Path {
        &self.repo_path
    }

    /// Whether the work tree has uncommitted changes.
    pub fn is_modified(&self) -> IdlibResult<bool> {
        let out = self.run(&["status", "--porcelain"])?;
        Ok(!out.trim().is_empty())
    }

    /// Paths currently tracked in the index.
    pub fn tracked_files(&self) -> IdlibResult<Vec<String>> {
        let out = self.run(&["ls-files", "--cached"])?;
        Ok(out.lines().map(str::to_string).collect())
    }

    /// Enumerate commits with their changed paths.
    ///
    /// With no path filter this walks every commit reachable from any ref
    /// and batches nearest-tag descriptions into the log format, so one
    /// subprocess covers the entire history. With a path filter it follows
    /// that single path through renames; tag descriptions are left `None`
    /// because the same commit tends to recur across many tracked paths and
    /// is cheaper to resolve once through the memoizing resolver.
    ///
    /// Deletions are excluded (`--diff-filter=AMR`): a deleted blob has no
    /// content to fingerprint.
    pub fn commits_with_metadata(
        &self,
        path_filter: Option<&str>,
    ) -> IdlibResult<Vec<CommitInfo>> {
        let out = match path_filter {
            None => self.run(&[
                "log",
                "--all",
                "--name-only",
                "--diff-filter=AMR",
                "--ignore-submodules",
                "--format=%x1e%H%x1f%cI%x1f%(describe:tags)",
            ])?,
            Some(path) => self.run(&[
                "log",
                "--all",
                "--follow",
                "--name-only",
                "--diff-filter=AMR",
                "--ignore-submodules",
                "--format=%x1e%H%x1f%cI",
                "--",
                path,
            ])?,
        };
        parse_log_records(&out)
    }

    /// Ordered `(commit_hash, path_at_that_commit)` pairs for one path,
    /// following renames. Newest first, matching log order.
    pub fn commits_affecting_path_following_renames(
        &self,
        path: &str,
    ) -> IdlibResult<Vec<(String, String)>> {
        let out = self.run(&[
            "log",
            "--follow",
            "--name-only",
            "--diff-filter=AMR",
            "--format=%x1e%H",
            "--",
            path,
        ])?;
        let mut pairs = Vec::new();
        for record in out.split(RECORD_SEP).filter(|r| !r.trim().is_empty()) {
            let mut lines = record.lines().filter(|l| !l.is_empty());
            let hash = match lines.next() {
                Some(h) => h.trim().to_string(),
                None => continue,
            };
            if let Some(p) = lines.next() {
                pairs.push((hash, p.to_string()));
            }
        }
        Ok(pairs)
    }

    /// Raw blob bytes for `commit:path`. No decoding is ever attempted:
    /// binary, empty, and non-UTF-8 content all come back verbatim.
    pub fn file_bytes_at(&self, commit: &str, path: &str) -> IdlibResult<Vec<u8>> {
        let output = self
            .git()
            .args(["cat-file", "blob", &format!("{commit}:{path}")])
            .output()?;
        if !output.status.success() {
            return Err(IdlibError::BlobNotFound {
                commit: commit.to_string(),
                path: path.to_string(),
            });
        }
        Ok(output.stdout)
    }

    /// Nearest-tag description for a commit, or `None` when no tag is
    /// reachable from it.
    pub fn describe(&self, commit: &str) -> IdlibResult<Option<String>> {
        let output = self.git().args(["describe", "--tags", commit]).output()?;
        if !output.status.success() {
            return Ok(None);
        }
        let desc = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(if desc.is_empty() { None } else { Some(desc) })
    }

    /// Committer timestamp of a commit, offset preserved.
    pub fn commit_timestamp(&self, commit: &str) -> IdlibResult<DateTime<FixedOffset>> {
        let out = self.run(&["show", "-s", "--format=%cI", commit])?;
        parse_commit_time(out.trim())
    }

    /// The earliest root commit. Histories with several independent roots
    /// (grafted or merged-in unrelated histories) are resolved by minimum
    /// committer time, never by enumeration order.
    pub fn first_commit(&self) -> IdlibResult<String> {
        let out = self.run(&["rev-list", "--max-parents=0", "HEAD"])?;
        let roots: Vec<&str> = out.lines().filter(|l| !l.is_empty()).collect();
        match roots.len() {
            0 => Err(IdlibError::Vcs(format!(
                "no root commit in {}",
                self.repo_path.display()
            ))),
            1 => Ok(roots[0].to_string()),
            _ => {
                let mut earliest = (roots[0].to_string(), self.commit_timestamp(roots[0])?);
                for root in &roots[1..] {
                    let ts = self.commit_timestamp(root)?;
                    if ts < earliest.1 {
                        earliest = (root.to_string(), ts);
                    }
                }
                Ok(earliest.0)
            }
        }
    }

    pub fn current_head(&self) -> IdlibResult<String> {
        Ok(self.run(&["rev-parse", "HEAD"])?.trim().to_string())
    }

    pub fn total_commit_count(&self) -> IdlibResult<usize> {
        let out = self.run(&["rev-list", "--count", "HEAD"])?;
        out.trim()
            .parse()
            .map_err(|_| IdlibError::Vcs(format!("unparseable commit count: {}", out.trim())))
    }

    /// Number of commits whose committer time falls inside `[since, until]`.
    pub fn commit_count_between(
        &self,
        since: &DateTime<FixedOffset>,
        until: &DateTime<FixedOffset>,
    ) -> IdlibResult<usize> {
        let out = self.run(&[
            "rev-list",
            "--count",
            &format!("--since={}", since.to_rfc3339()),
            &format!("--until={}", until.to_rfc3339()),
            "HEAD",
        ])?;
        out.trim()
            .parse()
            .map_err(|_| IdlibError::Vcs(format!("unparseable commit count: {}", out.trim())))
    }

    // ─── Internals ─────────────────────────────────────────────────

    fn git(&self) -> Command {
        let mut cmd = Command::new("git");
        // quotePath off so non-ASCII paths arrive unescaped
        cmd.arg("-C")
            .arg(&self.repo_path)
            .args(["-c", "core.quotePath=false"]);
        cmd
    }

    fn run(&self, args: &[&str]) -> IdlibResult<String> {
        let output = self.git().args(args).output()?;
        if !output.status.success() {
            return Err(IdlibError::Vcs(format!(
                "git {} failed in {}: {}",
                args.first().copied().unwrap_or(""),
                self.repo_path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

// ─── Log parsing ───────────────────────────────────────────────────

/// Parse `--format=%x1e%H%x1f%cI[%x1f%(describe:tags)] --name-only` output.
fn parse_log_records(out: &str) -> IdlibResult<Vec<CommitInfo>> {
    let mut result = Vec::new();
    for record in out.split(RECORD_SEP) {
        if record.trim().is_empty() {
            // leading empty chunk before the first separator, or a
            // diff-filter that matched nothing
            continue;
        }
        let mut lines = record.lines();
        let header = lines.next().unwrap_or("");
        let mut fields = header.split(FIELD_SEP);
        let commit_hash = fields.next().unwrap_or("").trim().to_string();
        if commit_hash.is_empty() {
            return Err(IdlibError::Vcs(format!(
                "unexpected log header line: {header:?}"
            )));
        }
        let commit_time = parse_commit_time(fields.next().unwrap_or("").trim())?;
        let describe = fields
            .next()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string);
        let paths: Vec<String> = lines
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();
        result.push(CommitInfo {
            commit_hash,
            commit_time,
            paths,
            describe,
        });
    }
    Ok(result)
}

fn parse_commit_time(text: &str) -> IdlibResult<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(text)
        .map_err(|e| IdlibError::Vcs(format!("unparseable commit time {text:?}: {e}")))
}
