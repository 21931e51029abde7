use std::{
    collections::HashMap,
    fs,
    path::Path,
};

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::{
    command::{CommandOutput, CommandRunner, Invocation},
    error::AppError,
    model::{RepositoryOwner, SyncRepository},
};

/// Fields requested from `gh` for every repository record
const REPOSITORY_FIELDS: &str = "id,name,owner,isFork,isPrivate,isInOrganization,isArchived,url";
/// Description of repositories created by `create_repository`
const SYNC_REPOSITORY_DESCRIPTION: &str = "Sync repository for contribution-mate";
/// `gh repo sync` stderr on a repository with no commits yet
const EMPTY_REPOSITORY_SYNC_ERROR: &str = "invalid refspec";
/// `git push` stderr when a ref update races
const REF_LOCK_ERROR: &str = "cannot lock ref";
/// `gh repo view` stderr for unknown repositories
const NOT_FOUND_ERROR: &str = "Could not resolve to a Repository";

/// Repository record as returned by `gh ... --json`
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRepository {
    pub id: String,
    pub name: String,
    pub owner: RepositoryOwner,
    #[serde(default)]
    pub is_fork: bool,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub is_in_organization: bool,
    #[serde(default)]
    pub is_archived: bool,
    #[serde(default)]
    pub url: String,
}

impl RemoteRepository {
    pub fn to_sync_repository(&self) -> SyncRepository {
        SyncRepository {
            id: self.id.clone(),
            name: self.name.clone(),
            owner: self.owner.clone(),
        }
    }
}

/// Repository lookups memoized for one run
#[derive(Debug, Default)]
pub struct RepositoryCache {
    repositories: HashMap<String, RemoteRepository>,
    viewer_login: Option<String>,
}

impl RepositoryCache {
    pub fn get(&self, name: &str) -> Option<&RemoteRepository> {
        self.repositories.get(name)
    }

    pub fn insert(&mut self, name: &str, repository: RemoteRepository) {
        self.repositories.insert(name.to_string(), repository);
    }
}

/// Hosted repositories of the authenticated user, through the `gh` CLI
pub struct GhClient<'a> {
    runner: &'a dyn CommandRunner,
    cache: RepositoryCache,
}

impl<'a> GhClient<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self {
            runner,
            cache: RepositoryCache::default(),
        }
    }

    fn gh(&self, invocation: Invocation) -> Result<CommandOutput, AppError> {
        self.runner.run(&invocation)
    }

    /// Login of the authenticated user
    fn viewer_login(&mut self) -> Result<String, AppError> {
        if let Some(login) = &self.cache.viewer_login {
            return Ok(login.clone());
        }

        let login = self
            .gh(Invocation::gh().args(["api", "user", "--jq", ".login"]))?
            .into_result()
            .map_err(AppError::Registry)?;
        if login.is_empty() {
            return Err(AppError::Registry("could not determine the authenticated user".to_string()));
        }

        self.cache.viewer_login = Some(login.clone());
        Ok(login)
    }

    /// Non-fork, non-archived repositories owned by the authenticated user
    pub fn list_repositories(&self) -> Result<Vec<RemoteRepository>, AppError> {
        let stdout = self
            .gh(Invocation::gh().args([
                "repo",
                "list",
                "--source",
                "--no-archived",
                "--limit",
                "1000",
                "--json",
                REPOSITORY_FIELDS,
            ]))?
            .into_result()
            .map_err(AppError::Registry)?;

        let repositories: Vec<RemoteRepository> = serde_json::from_str(&stdout)?;
        Ok(repositories
            .into_iter()
            .filter(|repo| !repo.is_fork && !repo.is_archived)
            .collect())
    }

    /// Repository metadata, rejecting anything that cannot be a private mirror
    pub fn get_repository(&mut self, name: &str) -> Result<RemoteRepository, AppError> {
        if let Some(repository) = self.cache.get(name) {
            return Ok(repository.clone());
        }

        let output = self.gh(Invocation::gh().args(["repo", "view", name, "--json", REPOSITORY_FIELDS]))?;
        let stdout = match output.into_result() {
            Ok(stdout) => stdout,
            Err(stderr) if stderr.contains(NOT_FOUND_ERROR) => {
                debug!(%name, %stderr, "repository not found");
                return Err(AppError::RepositoryNotFound(name.to_string()));
            }
            Err(stderr) => return Err(AppError::Registry(stderr)),
        };

        let repository: RemoteRepository = serde_json::from_str(&stdout)?;
        let invalid = |reason: String| AppError::RepositoryInvalid {
            name: name.to_string(),
            reason,
        };

        if repository.is_fork {
            return Err(invalid("it is a fork".to_string()));
        }
        if repository.is_in_organization {
            return Err(invalid("it belongs to an organization".to_string()));
        }
        let viewer = self.viewer_login()?;
        if repository.owner.login != viewer {
            return Err(invalid(format!(
                "it is owned by '{}', not by '{}'",
                repository.owner.login, viewer
            )));
        }
        if !repository.is_private {
            debug!(%name, "sync repository is public");
        }

        self.cache.insert(name, repository.clone());
        Ok(repository)
    }

    /// Creates a private repository for syncing and returns its metadata
    pub fn create_repository(&mut self, name: &str) -> Result<RemoteRepository, AppError> {
        self.gh(Invocation::gh().args([
            "repo",
            "create",
            name,
            "--private",
            "--description",
            SYNC_REPOSITORY_DESCRIPTION,
            "--disable-issues",
        ]))?
        .into_result()
        .map_err(AppError::Registry)?;

        info!(%name, "created sync repository");
        self.get_repository(name)
    }

    /// Clones `repository` into `parent_dir/destination_name`
    pub fn clone_repository(
        &self,
        repository: &SyncRepository,
        destination_name: &str,
        parent_dir: &Path,
    ) -> Result<(), AppError> {
        fs::create_dir_all(parent_dir)?;
        let full_name = repository.full_name();
        self.gh(
            Invocation::gh()
                .args(["repo", "clone", full_name.as_str(), destination_name])
                .cwd(parent_dir),
        )?
        .into_result()
        .map_err(AppError::Registry)?;

        info!(repository = %full_name, dir = %parent_dir.join(destination_name).display(), "cloned sync repository");
        Ok(())
    }

    /// Fast-forwards the local clone, a brand new empty repository is fine
    pub fn pull_repository_changes(&self, local_path: &Path) -> Result<(), AppError> {
        match self
            .gh(Invocation::gh().args(["repo", "sync"]).cwd(local_path))?
            .into_result()
        {
            Ok(_) => Ok(()),
            Err(stderr) if stderr.contains(EMPTY_REPOSITORY_SYNC_ERROR) => {
                debug!(dir = %local_path.display(), "nothing to pull yet");
                Ok(())
            }
            Err(stderr) => Err(AppError::Registry(stderr)),
        }
    }

    /// Pushes `HEAD` (or `branch`) to origin. A ref lock failure is retried
    /// once against the branch named in the last commit's decoration.
    pub fn push_repository_changes(&self, local_path: &Path, branch: Option<&str>) -> Result<(), AppError> {
        let stderr = match self.push(local_path, branch.unwrap_or("HEAD"))? {
            Ok(()) => return Ok(()),
            Err(stderr) => stderr,
        };

        if !stderr.contains(REF_LOCK_ERROR) {
            return Err(AppError::Registry(stderr));
        }

        let resolved = self
            .current_branch(local_path)?
            .ok_or_else(|| AppError::PushConflict(stderr.clone()))?;
        warn!(branch = %resolved, "ref lock while pushing, retrying once");

        match self.push(local_path, &resolved)? {
            Ok(()) => Ok(()),
            Err(retry_stderr) => Err(AppError::PushConflict(retry_stderr)),
        }
    }

    fn push(&self, local_path: &Path, refspec: &str) -> Result<Result<(), String>, AppError> {
        let output = self.runner.run(
            &Invocation::git()
                .args(["push", "--set-upstream", "origin", refspec])
                .cwd(local_path),
        )?;
        debug!(dir = %local_path.display(), %refspec, code = output.code, "pushed");
        Ok(output.into_result().map(|_| ()))
    }

    /// Branch name from `git log -1 --format=%D`
    fn current_branch(&self, local_path: &Path) -> Result<Option<String>, AppError> {
        let decoration = self
            .runner
            .run(&Invocation::git().args(["log", "-1", "--format=%D"]).cwd(local_path))?
            .into_result()
            .map_err(AppError::Registry)?;
        Ok(parse_branch_from_decoration(&decoration))
    }
}

fn parse_branch_from_decoration(decoration: &str) -> Option<String> {
    let refs: Vec<&str> = decoration
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .collect();

    refs.iter()
        .find_map(|name| name.strip_prefix("HEAD -> "))
        .or_else(|| {
            refs.iter()
                .copied()
                .find(|name| *name != "HEAD" && !name.starts_with("tag: ") && !name.contains('/'))
        })
        .map(str::to_string)
}
