use std::{
    collections::BTreeMap,
    fmt,
    path::PathBuf,
};

use serde::{Deserialize, Serialize};

use crate::{
    error::AppError,
    validation::{validate_input_email, validate_input_name},
};

/// Identity that authors commits, either read from git or configured for
/// the placeholder commits
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Author {
    /// Author name (user.name)
    pub name: String,
    /// Author email (user.email)
    pub email: String,
}

impl Author {
    pub fn new(name: &str, email: &str) -> Self {
        Self {
            name: name.trim().to_string(),
            email: email.trim().to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        validate_input_name(&self.name)?;
        validate_input_email(&self.email)
    }
}

impl fmt::Display for Author {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}

/// One source commit, identified by hash and authored time only
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Commit {
    pub hash: String,
    /// Unix seconds
    pub timestamp: i64,
}

impl Commit {
    pub fn new(hash: &str, timestamp: i64) -> Self {
        Self {
            hash: hash.to_string(),
            timestamp,
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.hash.trim().is_empty() {
            return Err(AppError::Validation("commit hash cannot be empty".to_string()));
        }
        if self.timestamp <= 0 {
            return Err(AppError::Validation(format!(
                "commit {} has a non-positive timestamp {}",
                self.hash, self.timestamp
            )));
        }
        Ok(())
    }
}

/// Local repository opted into syncing
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TrackedRepository {
    #[serde(alias = "directory")]
    pub dir: PathBuf,
    /// Authors whose commits are mirrored, unique by email
    pub authors: Vec<Author>,
}

impl TrackedRepository {
    /// Overwrites the directory and appends authors not seen yet
    fn merge(&mut self, patch: TrackedRepository) {
        self.dir = patch.dir;
        for author in patch.authors {
            if !self.authors.iter().any(|known| known.email == author.email) {
                self.authors.push(author);
            }
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RepositoryOwner {
    pub id: String,
    pub login: String,
}

/// GitHub repository receiving the placeholder commits
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SyncRepository {
    pub id: String,
    pub name: String,
    pub owner: RepositoryOwner,
}

impl SyncRepository {
    /// `owner/name`, as understood by `gh`
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner.login, self.name)
    }
}

/// Contents of `config.json`. Also used as a partial update: absent
/// fields leave the stored document untouched.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<Author>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_repository: Option<SyncRepository>,
    #[serde(default)]
    pub repos: BTreeMap<String, TrackedRepository>,
}

impl Config {
    pub fn with_author(author: Author) -> Self {
        Self {
            author: Some(author),
            ..Self::default()
        }
    }

    pub fn with_sync_repository(repository: SyncRepository) -> Self {
        Self {
            sync_repository: Some(repository),
            ..Self::default()
        }
    }

    pub fn with_repo(key: &str, repo: TrackedRepository) -> Self {
        let mut config = Self::default();
        config.repos.insert(key.to_string(), repo);
        config
    }

    /// Deep merge: scalars overwrite, repos union by key
    pub fn merge(&mut self, patch: Config) {
        if let Some(author) = patch.author {
            self.author = Some(author);
        }
        if let Some(repository) = patch.sync_repository {
            self.sync_repository = Some(repository);
        }
        for (key, repo) in patch.repos {
            match self.repos.get_mut(&key) {
                Some(existing) => existing.merge(repo),
                None => {
                    self.repos.insert(key, repo);
                }
            }
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if let Some(author) = &self.author {
            author.validate()?;
        }
        if let Some(repository) = &self.sync_repository {
            if repository.name.trim().is_empty() || repository.owner.login.trim().is_empty() {
                return Err(AppError::Validation(
                    "sync repository needs a name and an owner".to_string(),
                ));
            }
        }
        for (key, repo) in &self.repos {
            if repo.dir.as_os_str().is_empty() {
                return Err(AppError::Validation(format!("repository '{key}' has no directory")));
            }
            for author in &repo.authors {
                author.validate()?;
            }
        }
        Ok(())
    }
}

/// Commits already mirrored, per repository name and author email.
/// Every list is unique by `(hash, timestamp)` and sorted newest-first.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct Ledger(BTreeMap<String, BTreeMap<String, Vec<Commit>>>);

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mirrored commits for one repository and author
    pub fn commits(&self, repo: &str, email: &str) -> &[Commit] {
        self.0
            .get(repo)
            .and_then(|authors| authors.get(email))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Adds commits for one repository and author, keeping the list invariant
    pub fn insert(&mut self, repo: &str, email: &str, commits: Vec<Commit>) {
        let list = self
            .0
            .entry(repo.to_string())
            .or_default()
            .entry(email.to_string())
            .or_default();
        list.extend(commits);
        normalize_commits(list);
    }

    /// Union per `(repo, author)`, de-duplicated and re-sorted
    pub fn merge(&mut self, patch: Ledger) {
        for (repo, authors) in patch.0 {
            for (email, commits) in authors {
                self.insert(&repo, &email, commits);
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &[Commit])> {
        self.0.iter().flat_map(|(repo, authors)| {
            authors
                .iter()
                .map(move |(email, commits)| (repo.as_str(), email.as_str(), commits.as_slice()))
        })
    }

    pub fn commit_count(&self) -> usize {
        self.iter().map(|(_, _, commits)| commits.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.commit_count() == 0
    }

    /// Number of mirrored commits recorded for a repository
    pub fn repo_commit_count(&self, repo: &str) -> usize {
        self.0
            .get(repo)
            .map(|authors| authors.values().map(Vec::len).sum())
            .unwrap_or(0)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        for (repo, email, commits) in self.iter() {
            for commit in commits {
                commit.validate().map_err(|err| match err {
                    AppError::Validation(msg) => {
                        AppError::Validation(format!("{repo}/{email}: {msg}"))
                    }
                    other => other,
                })?;
            }
        }
        Ok(())
    }
}

/// Sorts newest-first (hash breaks ties) and drops exact duplicates
fn normalize_commits(commits: &mut Vec<Commit>) {
    commits.sort_by(|a, b| {
        b.timestamp
            .cmp(&a.timestamp)
            .then_with(|| a.hash.cmp(&b.hash))
    });
    commits.dedup();
}
