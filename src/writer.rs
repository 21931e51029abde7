use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::{
    command::{CommandRunner, Invocation},
    error::AppError,
    model::{Author, Commit},
};

/// Creates placeholder commits in the local clone of the sync repository
pub struct PlaceholderWriter<'a> {
    runner: &'a dyn CommandRunner,
    mirror_dir: PathBuf,
}

impl<'a> PlaceholderWriter<'a> {
    pub fn new(runner: &'a dyn CommandRunner, mirror_dir: &Path) -> Self {
        Self {
            runner,
            mirror_dir: mirror_dir.to_path_buf(),
        }
    }

    fn git(&self, args: &[&str]) -> Result<Result<String, String>, AppError> {
        let output = self
            .runner
            .run(&Invocation::git().args(args.iter().copied()).cwd(&self.mirror_dir))?;
        Ok(output.into_result())
    }

    /// One empty commit dated like `commit`, authored by `author`, with the
    /// source hash as its only message
    pub fn write(&self, author: &Author, commit: &Commit) -> Result<(), AppError> {
        let date = format!("@{} +0000", commit.timestamp);
        let invocation = Invocation::git()
            .args([
                "commit",
                "--allow-empty",
                "--no-verify",
                "--no-gpg-sign",
                "--quiet",
                "-m",
                commit.hash.as_str(),
            ])
            .cwd(&self.mirror_dir)
            .env("GIT_AUTHOR_NAME", author.name.as_str())
            .env("GIT_AUTHOR_EMAIL", author.email.as_str())
            .env("GIT_AUTHOR_DATE", date.as_str())
            .env("GIT_COMMITTER_NAME", author.name.as_str())
            .env("GIT_COMMITTER_EMAIL", author.email.as_str())
            .env("GIT_COMMITTER_DATE", date.as_str());

        self.runner
            .run(&invocation)?
            .into_result()
            .map_err(AppError::CommitWrite)?;

        debug!(hash = %commit.hash, timestamp = commit.timestamp, "wrote placeholder commit");
        Ok(())
    }

    /// Writes `commits` in the given order, returns how many were written
    pub fn write_all(&self, author: &Author, commits: &[Commit]) -> Result<usize, AppError> {
        for commit in commits {
            self.write(author, commit)?;
        }
        info!(count = commits.len(), dir = %self.mirror_dir.display(), "wrote placeholder commits");
        Ok(commits.len())
    }

    /// Drops local commits that never reached origin, so an interrupted run
    /// does not leave placeholders that would be written again.
    pub fn discard_unpushed(&self) -> Result<usize, AppError> {
        if self.git(&["rev-parse", "--verify", "--quiet", "HEAD"])?.is_err() {
            return Ok(0);
        }

        if self.git(&["rev-parse", "--verify", "--quiet", "@{upstream}"])?.is_ok() {
            let ahead = self.count(&["rev-list", "--count", "@{upstream}..HEAD"])?;
            if ahead > 0 {
                self.git(&["reset", "--hard", "--quiet", "@{upstream}"])?
                    .map_err(AppError::CommitWrite)?;
                warn!(count = ahead, "discarded unpushed placeholder commits");
            }
            return Ok(ahead);
        }

        let remote_refs = self
            .git(&["for-each-ref", "--format=%(refname)", "refs/remotes/origin"])?
            .map_err(AppError::CommitWrite)?;
        if !remote_refs.is_empty() {
            debug!("local branch has no upstream, leaving it untouched");
            return Ok(0);
        }

        // Nothing was ever pushed, every local commit is a leftover
        let local = self.count(&["rev-list", "--count", "HEAD"])?;
        self.git(&["update-ref", "-d", "HEAD"])?
            .map_err(AppError::CommitWrite)?;
        warn!(count = local, "discarded unpushed placeholder commits");
        Ok(local)
    }

    fn count(&self, args: &[&str]) -> Result<usize, AppError> {
        let value = self.git(args)?.map_err(AppError::CommitWrite)?;
        value
            .parse()
            .map_err(|_| AppError::CommitWrite(format!("unexpected commit count '{value}'")))
    }
}
