use std::path::PathBuf;

use colored::Colorize;
use tracing::{debug, info};

use crate::{
    command::CommandRunner,
    differ::{SourceHistory, SyncPlan, compute_plan},
    error::AppError,
    inspector::Inspector,
    model::{Author, Config, Ledger, SyncRepository},
    prompt::Prompter,
    registry::GhClient,
    storage::Store,
    validation::is_noreply_email,
    writer::PlaceholderWriter,
};

/// Suggested name for a new sync repository
pub const DEFAULT_SYNC_REPOSITORY_NAME: &str = "contribution-mate-sync";

/// Steps of a sync run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStage {
    Idle,
    EnsureMirrorRepo,
    EnsureAuthorIdentity,
    ComputeDiff,
    WritePlaceholders,
    Push,
    Done,
    Aborted,
}

/// How a successful run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    NothingToSync,
    Synced {
        /// Placeholder commits written and pushed
        commits: usize,
        pushed: bool,
    },
}

/// Runs one sync: mirror repo, author identity, diff, placeholders, push
pub struct Orchestrator<'a> {
    store: &'a Store,
    runner: &'a dyn CommandRunner,
    prompter: &'a dyn Prompter,
    registry: GhClient<'a>,
    stage: SyncStage,
}

impl<'a> Orchestrator<'a> {
    pub fn new(store: &'a Store, runner: &'a dyn CommandRunner, prompter: &'a dyn Prompter) -> Self {
        Self {
            store,
            runner,
            prompter,
            registry: GhClient::new(runner),
            stage: SyncStage::Idle,
        }
    }

    pub fn stage(&self) -> SyncStage {
        self.stage
    }

    fn enter(&mut self, stage: SyncStage) {
        debug!(from = ?self.stage, to = ?stage, "sync stage");
        self.stage = stage;
    }

    pub fn run(&mut self) -> Result<SyncOutcome, AppError> {
        let result = self.run_stages();
        if let Err(err) = &result {
            info!(stage = ?self.stage, %err, "sync aborted");
            self.stage = SyncStage::Aborted;
        }
        result
    }

    fn run_stages(&mut self) -> Result<SyncOutcome, AppError> {
        self.enter(SyncStage::EnsureMirrorRepo);
        let mirror_dir = self.ensure_mirror_repo()?;

        self.enter(SyncStage::EnsureAuthorIdentity);
        let author = ensure_author_identity(self.store, &Inspector::new(self.runner), self.prompter)?;

        self.enter(SyncStage::ComputeDiff);
        let plan = self.compute_diff()?;

        self.enter(SyncStage::WritePlaceholders);
        if plan.is_empty() {
            info!("nothing to sync");
            self.enter(SyncStage::Done);
            return Ok(SyncOutcome::NothingToSync);
        }
        let placeholders = plan.placeholders();
        let written = PlaceholderWriter::new(self.runner, &mirror_dir).write_all(&author, &placeholders)?;

        self.enter(SyncStage::Push);
        let pushed = written > 0;
        if pushed {
            self.registry.push_repository_changes(&mirror_dir, None)?;
        }
        self.store.save_ledger(plan.to_ledger())?;
        info!(commits = written, "sync finished");

        self.enter(SyncStage::Done);
        Ok(SyncOutcome::Synced {
            commits: written,
            pushed,
        })
    }

    /// Local clone of the sync repository, up to date with origin
    fn ensure_mirror_repo(&mut self) -> Result<PathBuf, AppError> {
        let config = self.store.load_config()?;
        let repository = match config.sync_repository {
            Some(repository) => repository,
            None => {
                let repository = choose_sync_repository(&mut self.registry, self.prompter)?;
                self.store
                    .save_config(Config::with_sync_repository(repository.clone()))?;
                repository
            }
        };

        let mirror_dir = self.store.mirror_clone_dir();
        if mirror_dir.exists() {
            PlaceholderWriter::new(self.runner, &mirror_dir).discard_unpushed()?;
            self.registry.pull_repository_changes(&mirror_dir)?;
        } else {
            self.registry.clone_repository(
                &repository,
                self.store.mirror_clone_name(),
                self.store.dir(),
            )?;
        }
        Ok(mirror_dir)
    }

    fn compute_diff(&self) -> Result<SyncPlan, AppError> {
        let config = self.store.load_config()?;
        let ledger: Ledger = self.store.load_ledger()?;
        let inspector = Inspector::new(self.runner);

        let mut sources = Vec::new();
        for (name, repo) in &config.repos {
            for author in &repo.authors {
                sources.push(SourceHistory {
                    repo: name.clone(),
                    email: author.email.clone(),
                    commits: inspector.commits_by_author(&repo.dir, &author.email)?,
                });
            }
        }

        let plan = compute_plan(sources, &ledger);
        info!(
            repos = config.repos.len(),
            new_commits = plan.commit_count(),
            "computed sync plan"
        );
        Ok(plan)
    }
}

/// Configured mirror author, asking for one on first use
pub fn ensure_author_identity(
    store: &Store,
    inspector: &Inspector<'_>,
    prompter: &dyn Prompter,
) -> Result<Author, AppError> {
    if let Some(author) = store.load_config()?.author {
        return Ok(author);
    }
    let default = inspector.global_author()?;
    prompt_author(store, prompter, default.as_ref())
}

/// Asks for the mirror author, validates and persists it
pub fn prompt_author(
    store: &Store,
    prompter: &dyn Prompter,
    default: Option<&Author>,
) -> Result<Author, AppError> {
    let author = prompter.author_identity(default)?;
    author.validate()?;
    warn_if_not_noreply(&author);
    store.save_config(Config::with_author(author.clone()))?;
    Ok(author)
}

fn warn_if_not_noreply(author: &Author) {
    if is_noreply_email(&author.email) {
        return;
    }
    info!(email = %author.email, "mirror author email is not a GitHub no-reply address");
    println!(
        "{}\n{}\n{}",
        "It looks like you use a personal email address for authoring commits.".yellow(),
        "We encourage you to configure GitHub no-reply for better privacy.".yellow(),
        "Read more: https://docs.github.com/en/account-and-profile/setting-up-and-managing-your-personal-account-on-github/managing-email-preferences/setting-your-commit-email-address".yellow(),
    );
}

/// Lets the user pick an existing repository or create a new one
pub fn choose_sync_repository(
    registry: &mut GhClient<'_>,
    prompter: &dyn Prompter,
) -> Result<SyncRepository, AppError> {
    let existing = registry.list_repositories()?;
    loop {
        let name = prompter.sync_repository_name(&existing, DEFAULT_SYNC_REPOSITORY_NAME)?;
        match registry.get_repository(&name) {
            Ok(repository) if repository.is_private => return Ok(repository.to_sync_repository()),
            Ok(repository) => {
                println!(
                    "{}",
                    format!("\"{name}\" is a public repository, anyone can see the mirrored commits.")
                        .yellow()
                );
                if prompter.confirm(&format!("Use the public repository \"{name}\" anyway?"))? {
                    return Ok(repository.to_sync_repository());
                }
            }
            Err(AppError::RepositoryNotFound(_)) => {
                let create = prompter.confirm(&format!(
                    "You don't have a repository named \"{name}\", create one?"
                ))?;
                if create {
                    let repository = registry.create_repository(&name)?;
                    println!(
                        "{} {}",
                        "your new sync repository is available here:".green(),
                        repository.url
                    );
                    return Ok(repository.to_sync_repository());
                }
            }
            Err(err @ AppError::RepositoryInvalid { .. }) => {
                info!(%name, %err, "repository rejected");
                println!("{}", err.to_string().red());
            }
            Err(err) => return Err(err),
        }
    }
}
