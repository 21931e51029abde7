use std::path::Path;

use tracing::debug;

use crate::{
    command::{CommandRunner, Invocation},
    error::AppError,
    model::{Author, Commit},
};

/// Branch used when `origin/HEAD` cannot be resolved
const FALLBACK_BRANCH: &str = "main";
/// Field separator in `git log` formats, ASCII unit separator
const FIELD_SEPARATOR: char = '\u{1f}';

/// Read-only queries against local working copies
pub struct Inspector<'a> {
    runner: &'a dyn CommandRunner,
}

impl<'a> Inspector<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self { runner }
    }

    /// Runs git inside `repo` and returns trimmed stdout
    fn git(&self, repo: &Path, args: &[&str]) -> Result<String, AppError> {
        if !repo.is_dir() {
            return Err(AppError::Inspection(format!(
                "'{}' is not a directory",
                repo.display()
            )));
        }

        self.runner
            .run(&Invocation::git().args(args.iter().copied()).cwd(repo))?
            .into_result()
            .map_err(AppError::Inspection)
    }

    /// Checks if `path` is inside a Git working tree
    pub fn is_repository(&self, path: &Path) -> Result<bool, AppError> {
        match self.git(path, &["rev-parse", "--is-inside-work-tree"]) {
            Ok(value) => Ok(value == "true"),
            Err(AppError::Inspection(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Default branch from the remote HEAD, `main` when there is none
    pub fn default_branch(&self, repo: &Path) -> Result<String, AppError> {
        match self.git(repo, &["symbolic-ref", "refs/remotes/origin/HEAD"]) {
            Ok(reference) => Ok(reference
                .strip_prefix("refs/remotes/origin/")
                .filter(|branch| !branch.is_empty())
                .unwrap_or(FALLBACK_BRANCH)
                .to_string()),
            Err(AppError::Inspection(stderr)) => {
                debug!(repo = %repo.display(), %stderr, "no remote HEAD, using fallback branch");
                Ok(FALLBACK_BRANCH.to_string())
            }
            Err(e) => Err(e),
        }
    }

    /// Authors on the default branch, one per email, sorted by `Name <email>`
    pub fn authors(&self, repo: &Path) -> Result<Vec<Author>, AppError> {
        let branch = self.default_branch(repo)?;
        let output = self.git(repo, &["log", branch.as_str(), "--format=%aN%x1f%aE"])?;

        let authors = parse_authors(&output);
        debug!(repo = %repo.display(), %branch, count = authors.len(), "listed authors");
        Ok(authors)
    }

    /// Commits on the default branch authored by `email`, most recent first
    pub fn commits_by_author(&self, repo: &Path, email: &str) -> Result<Vec<Commit>, AppError> {
        let branch = self.default_branch(repo)?;
        let output = self.git(repo, &["log", branch.as_str(), "--format=%H%x1f%at%x1f%aE"])?;

        let commits = parse_commits(&output, email)?;
        debug!(repo = %repo.display(), %email, count = commits.len(), "listed commits");
        Ok(commits)
    }

    /// Global git identity of this machine, if fully configured and valid
    pub fn global_author(&self) -> Result<Option<Author>, AppError> {
        let name = self.global_config("user.name")?;
        let email = self.global_config("user.email")?;

        Ok(match (name, email) {
            (Some(name), Some(email)) => {
                let author = Author::new(&name, &email);
                author.validate().ok().map(|_| author)
            }
            _ => None,
        })
    }

    fn global_config(&self, key: &str) -> Result<Option<String>, AppError> {
        let output = self
            .runner
            .run(&Invocation::git().args(["config", "--global", key]))?;
        Ok(output.into_result().ok().filter(|value| !value.is_empty()))
    }
}

fn parse_authors(output: &str) -> Vec<Author> {
    let mut lines: Vec<&str> = output.lines().filter(|line| !line.trim().is_empty()).collect();
    lines.sort_unstable();

    let mut authors: Vec<Author> = Vec::new();
    for line in lines {
        let Some((name, email)) = line.split_once(FIELD_SEPARATOR) else {
            continue;
        };
        let author = Author::new(name, email);
        if author.name.is_empty() || author.email.is_empty() {
            continue;
        }
        if !authors.iter().any(|known| known.email == author.email) {
            authors.push(author);
        }
    }

    authors.sort_by_key(|author| author.to_string());
    authors
}

fn parse_commits(output: &str, email: &str) -> Result<Vec<Commit>, AppError> {
    let mut commits = Vec::new();
    for line in output.lines().filter(|line| !line.trim().is_empty()) {
        let mut fields = line.split(FIELD_SEPARATOR);
        let (Some(hash), Some(timestamp), Some(author_email)) =
            (fields.next(), fields.next(), fields.next())
        else {
            return Err(AppError::Inspection(format!("unexpected log line: '{line}'")));
        };

        if author_email.trim() != email {
            continue;
        }

        let timestamp: i64 = timestamp.trim().parse().map_err(|_| {
            AppError::Inspection(format!("invalid timestamp '{timestamp}' for commit {hash}"))
        })?;
        let commit = Commit::new(hash.trim(), timestamp);
        commit
            .validate()
            .map_err(|err| AppError::Inspection(err.to_string()))?;
        commits.push(commit);
    }
    Ok(commits)
}
