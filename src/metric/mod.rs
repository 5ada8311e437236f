//! Candidate scoring — which paths make good fingerprints?
//!
//! A development aid for curating a library's file-of-interest list. A
//! good fingerprint file has existed for most of the repository's life
//! (high time coverage) and changed often within that life (high commit
//! coverage), so most released versions of the library produce a distinct
//! hash for it. The score is a ranking hint only; a human reviews and
//! trims the suggestion.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::fingerprint;
use crate::vcs::GitRepo;
use crate::IdlibResult;

/// One scored path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub path: String,
    /// `time_coverage * commit_coverage`, in `[0, 1]`.
    pub score: f64,
    /// Share of the repository's lifetime this path has existed.
    pub time_coverage: f64,
    /// Share of commits inside the path's own lifespan that touched it.
    pub commit_coverage: f64,
    /// Commits that touched the path at all.
    pub touches: usize,
}

/// Fraction `touching / window`, where the window is the path's own
/// lifespan. A window containing zero commits scores 0, never a division
/// fault.
pub fn commit_coverage(touches: usize, commits_in_window: usize) -> f64 {
    if commits_in_window == 0 {
        0.0
    } else {
        touches as f64 / commits_in_window as f64
    }
}

/// Fraction of the repository's lifetime covered by `[first, last]`.
/// Degenerate repository spans (single-commit repos) score 0.
pub fn time_coverage(
    first: &DateTime<FixedOffset>,
    last: &DateTime<FixedOffset>,
    repo_oldest: &DateTime<FixedOffset>,
    repo_newest: &DateTime<FixedOffset>,
) -> f64 {
    let repo_span = (*repo_newest - *repo_oldest).num_seconds();
    if repo_span <= 0 {
        return 0.0;
    }
    let path_span = (*last - *first).num_seconds().max(0);
    path_span as f64 / repo_span as f64
}

/// Score every tracked source path in a repository, best first.
pub fn score_repository(repo: &GitRepo, limit: usize) -> IdlibResult<Vec<Candidate>> {
    let repo_oldest = repo.commit_timestamp(&repo.first_commit()?)?;
    let repo_newest = repo.commit_timestamp(&repo.current_head()?)?;

    let paths: Vec<String> = repo
        .tracked_files()?
        .into_iter()
        .filter(|p| fingerprint::is_indexable_source(p))
        .collect();
    tracing::info!("scoring {} candidate paths; this can take a while", paths.len());

    let mut candidates = Vec::with_capacity(paths.len());
    for path in paths {
        match score_path(repo, &path, &repo_oldest, &repo_newest) {
            Ok(candidate) => candidates.push(candidate),
            Err(e) => tracing::warn!("skipping {path}: {e}"),
        }
    }

    candidates.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.path.cmp(&b.path))
    });
    candidates.truncate(limit);
    Ok(candidates)
}

fn score_path(
    repo: &GitRepo,
    path: &str,
    repo_oldest: &DateTime<FixedOffset>,
    repo_newest: &DateTime<FixedOffset>,
) -> IdlibResult<Candidate> {
    let touching = repo.commits_affecting_path_following_renames(path)?;
    if touching.is_empty() {
        return Ok(Candidate {
            path: path.to_string(),
            score: 0.0,
            time_coverage: 0.0,
            commit_coverage: 0.0,
            touches: 0,
        });
    }

    // log order is newest first
    let newest = &touching.first().unwrap().0;
    let oldest = &touching.last().unwrap().0;
    let last = repo.commit_timestamp(newest)?;
    let first = repo.commit_timestamp(oldest)?;

    let tc = time_coverage(&first, &last, repo_oldest, repo_newest);
    let window = repo.commit_count_between(&first, &last)?;
    let cc = commit_coverage(touching.len(), window);

    Ok(Candidate {
        path: path.to_string(),
        score: tc * cc,
        time_coverage: tc,
        commit_coverage: cc,
        touches: touching.len(),
    })
}
