use std::collections::HashSet;

use crate::model::{Commit, Ledger};

/// Source commits of one tracked repository and author
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceHistory {
    pub repo: String,
    pub email: String,
    /// As returned by the inspector, newest first
    pub commits: Vec<Commit>,
}

/// Unsynced commits of one repository and author, newest first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanEntry {
    pub repo: String,
    pub email: String,
    pub commits: Vec<Commit>,
}

/// Everything a sync run has to mirror
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    pub entries: Vec<PlanEntry>,
    /// Hashes mirrored for any repository or author before this run
    mirrored: HashSet<String>,
}

impl SyncPlan {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn commit_count(&self) -> usize {
        self.entries.iter().map(|entry| entry.commits.len()).sum()
    }

    /// Commits needing a placeholder, oldest first, one per hash.
    ///
    /// A hash already mirrored through another repository or author (two
    /// clones of the same project) gets no second placeholder.
    pub fn placeholders(&self) -> Vec<Commit> {
        let mut seen: HashSet<&str> = self.mirrored.iter().map(String::as_str).collect();
        let mut commits: Vec<Commit> = Vec::new();
        for entry in &self.entries {
            for commit in &entry.commits {
                if seen.insert(commit.hash.as_str()) {
                    commits.push(commit.clone());
                }
            }
        }
        commits.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.hash.cmp(&b.hash)));
        commits
    }

    /// Ledger update recording every entry as mirrored
    pub fn to_ledger(&self) -> Ledger {
        let mut ledger = Ledger::new();
        for entry in &self.entries {
            ledger.insert(&entry.repo, &entry.email, entry.commits.clone());
        }
        ledger
    }
}

/// Source commits whose hash is not in `synced`, in source order
pub fn new_commits(source: &[Commit], synced: &[Commit]) -> Vec<Commit> {
    let synced: HashSet<&str> = synced.iter().map(|commit| commit.hash.as_str()).collect();
    source
        .iter()
        .filter(|commit| !synced.contains(commit.hash.as_str()))
        .cloned()
        .collect()
}

/// Diffs every `(repository, author)` history against the ledger
pub fn compute_plan(sources: Vec<SourceHistory>, ledger: &Ledger) -> SyncPlan {
    let mirrored: HashSet<String> = ledger
        .iter()
        .flat_map(|(_, _, commits)| commits.iter().map(|commit| commit.hash.clone()))
        .collect();

    let entries = sources
        .into_iter()
        .filter_map(|source| {
            let commits = new_commits(&source.commits, ledger.commits(&source.repo, &source.email));
            (!commits.is_empty()).then_some(PlanEntry {
                repo: source.repo,
                email: source.email,
                commits,
            })
        })
        .collect();

    SyncPlan { entries, mirrored }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commits(pairs: &[(&str, i64)]) -> Vec<Commit> {
        pairs.iter().map(|(hash, ts)| Commit::new(hash, *ts)).collect()
    }

    fn source(repo: &str, email: &str, pairs: &[(&str, i64)]) -> SourceHistory {
        SourceHistory {
            repo: repo.to_string(),
            email: email.to_string(),
            commits: commits(pairs),
        }
    }

    #[test]
    fn new_commits_compares_by_hash_only() {
        let source = commits(&[("h3", 300), ("h2", 200), ("h1", 100)]);
        let synced = commits(&[("h2", 999)]);

        assert_eq!(new_commits(&source, &synced), commits(&[("h3", 300), ("h1", 100)]));
    }

    #[test]
    fn plan_is_empty_when_everything_is_mirrored() {
        let mut ledger = Ledger::new();
        ledger.insert("api", "a@x.com", commits(&[("h2", 200), ("h1", 100)]));

        let plan = compute_plan(vec![source("api", "a@x.com", &[("h2", 200), ("h1", 100)])], &ledger);

        assert!(plan.is_empty());
        assert!(plan.placeholders().is_empty());
    }

    #[test]
    fn placeholders_are_oldest_first_across_entries() {
        let plan = compute_plan(
            vec![
                source("api", "a@x.com", &[("h3", 300), ("h1", 100)]),
                source("web", "a@x.com", &[("w2", 200)]),
            ],
            &Ledger::new(),
        );

        assert_eq!(plan.commit_count(), 3);
        assert_eq!(
            plan.placeholders(),
            commits(&[("h1", 100), ("w2", 200), ("h3", 300)])
        );
    }

    #[test]
    fn shared_hash_gets_one_placeholder_but_both_ledger_entries() {
        let mut ledger = Ledger::new();
        ledger.insert("api", "a@x.com", commits(&[("h1", 100)]));

        let plan = compute_plan(
            vec![
                source("api-clone", "a@x.com", &[("h2", 200), ("h1", 100)]),
                source("api-fork", "a@x.com", &[("h2", 200)]),
            ],
            &ledger,
        );

        assert_eq!(plan.placeholders(), commits(&[("h2", 200)]));
        let update = plan.to_ledger();
        assert_eq!(update.commits("api-clone", "a@x.com"), commits(&[("h2", 200), ("h1", 100)]).as_slice());
        assert_eq!(update.commits("api-fork", "a@x.com"), commits(&[("h2", 200)]).as_slice());
    }

    #[test]
    fn merging_the_plan_makes_the_next_plan_empty() {
        let sources = vec![source("api", "a@x.com", &[("h2", 200), ("h1", 100)])];
        let mut ledger = Ledger::new();

        let first = compute_plan(sources.clone(), &ledger);
        ledger.merge(first.to_ledger());
        let second = compute_plan(sources, &ledger);

        assert_eq!(first.commit_count(), 2);
        assert!(second.is_empty());
    }
}
