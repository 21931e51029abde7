use std::{fs, path::PathBuf};

use colored::Colorize;
use tracing::info;

use crate::{
    command::CommandRunner,
    error::AppError,
    inspector::Inspector,
    model::{Author, Config, TrackedRepository},
    prompt::Prompter,
    registry::GhClient,
    storage::Store,
    sync::{choose_sync_repository, prompt_author},
};

/// Opts local repositories into syncing, returns the keys they are stored under
pub fn add_repositories(
    store: &Store,
    runner: &dyn CommandRunner,
    prompter: &dyn Prompter,
    paths: &[PathBuf],
    emails: &[String],
) -> Result<Vec<String>, AppError> {
    let inspector = Inspector::new(runner);
    let mut patch = Config::default();

    for path in paths {
        let dir = fs::canonicalize(path).map_err(|err| {
            AppError::Inspection(format!("cannot open '{}': {err}", path.display()))
        })?;
        if !inspector.is_repository(&dir)? {
            return Err(AppError::Inspection(format!(
                "'{}' is not a git repository",
                dir.display()
            )));
        }

        let key = dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| AppError::Validation(format!("'{}' has no name", dir.display())))?;

        let authors = inspector.authors(&dir)?;
        let selected = if emails.is_empty() {
            prompter.select_authors(&key, &trackable_authors(&key, authors))?
        } else {
            select_by_email(&key, &authors, emails)?
        };
        if selected.is_empty() {
            return Err(AppError::Validation(format!("no authors selected for '{key}'")));
        }

        info!(repo = %key, dir = %dir.display(), authors = selected.len(), "tracking repository");
        patch.repos.insert(
            key,
            TrackedRepository {
                dir,
                authors: selected,
            },
        );
    }

    let keys: Vec<String> = patch.repos.keys().cloned().collect();
    store.save_config(patch)?;
    Ok(keys)
}

/// Drops authors that could not be stored, such as bot accounts whose
/// address is not a valid email
fn trackable_authors(key: &str, authors: Vec<Author>) -> Vec<Author> {
    authors
        .into_iter()
        .filter(|author| match author.validate() {
            Ok(()) => true,
            Err(err) => {
                info!(repo = %key, %author, %err, "skipping author");
                println!("{} {} ({})", "skipping author:".yellow(), author, err);
                false
            }
        })
        .collect()
}

fn select_by_email(key: &str, authors: &[Author], emails: &[String]) -> Result<Vec<Author>, AppError> {
    emails
        .iter()
        .map(|email| -> Result<Author, AppError> {
            let author = authors
                .iter()
                .find(|author| author.email == email.trim())
                .cloned()
                .ok_or_else(|| AppError::Validation(format!("no commits by '{email}' in '{key}'")))?;
            author.validate().map_err(|err| {
                AppError::Validation(format!("'{email}' in '{key}' cannot be tracked: {err}"))
            })?;
            Ok(author)
        })
        .collect()
}

/// Asks again for the mirror author and the sync repository
pub fn reconfigure(
    store: &Store,
    runner: &dyn CommandRunner,
    prompter: &dyn Prompter,
) -> Result<Config, AppError> {
    let config = store.load_config()?;
    let default = match config.author {
        Some(author) => Some(author),
        None => Inspector::new(runner).global_author()?,
    };
    prompt_author(store, prompter, default.as_ref())?;

    let repository = choose_sync_repository(&mut GhClient::new(runner), prompter)?;
    if config.sync_repository.as_ref() != Some(&repository) {
        let mirror_dir = store.mirror_clone_dir();
        if mirror_dir.exists() {
            fs::remove_dir_all(&mirror_dir)?;
            info!(dir = %mirror_dir.display(), "removed clone of previous sync repository");
        }
    }

    store.save_config(Config::with_sync_repository(repository))
}

/// Prints the configuration and how many commits each repository has mirrored
pub fn list_tracked(store: &Store) -> Result<(), AppError> {
    let config = store.load_config()?;
    let ledger = store.load_ledger()?;

    match &config.author {
        Some(author) => println!("{} {}", "mirror author:".blue(), author),
        None => println!("{}", "mirror author not configured".yellow()),
    }
    match &config.sync_repository {
        Some(repository) => println!("{} {}", "sync repository:".blue(), repository.full_name()),
        None => println!("{}", "sync repository not configured".yellow()),
    }

    if config.repos.is_empty() {
        println!("{}", "no repositories tracked".red());
        return Ok(());
    }

    for (key, repo) in &config.repos {
        println!(
            "{} {} ({} commits mirrored)",
            key.green(),
            repo.dir.display(),
            ledger.repo_commit_count(key)
        );
        for author in &repo.authors {
            println!("  {}", author);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::{
        command::{CommandOutput, Invocation, SystemRunner},
        model::{RepositoryOwner, SyncRepository},
        test_support::{ScriptedPrompter, ScriptedRunner, commit_as, init_repo, repository_json},
    };

    const BOT_EMAIL: &str = "49699333+dependabot[bot]@users.noreply.github.com";

    fn source_repo(tmp: &TempDir, name: &str) -> PathBuf {
        let dir = tmp.path().join(name);
        fs::create_dir_all(&dir).unwrap();
        init_repo(&dir);
        commit_as(&dir, "Ada", "a@x.com", 100, "one");
        commit_as(&dir, "Bob", "b@x.com", 200, "two");
        dir
    }

    #[test]
    fn add_with_emails_tracks_selected_authors() {
        let tmp = TempDir::new().unwrap();
        let dir = source_repo(&tmp, "api");
        let store = Store::new(tmp.path().join("config"));

        let keys = add_repositories(
            &store,
            &SystemRunner,
            &ScriptedPrompter::new(),
            &[dir.clone()],
            &["b@x.com".to_string()],
        )
        .unwrap();

        assert_eq!(keys, vec!["api".to_string()]);
        let repo = &store.load_config().unwrap().repos["api"];
        assert_eq!(repo.dir, fs::canonicalize(&dir).unwrap());
        assert_eq!(repo.authors, vec![Author::new("Bob", "b@x.com")]);
    }

    #[test]
    fn add_without_emails_asks_the_prompter() {
        let tmp = TempDir::new().unwrap();
        let dir = source_repo(&tmp, "api");
        let store = Store::new(tmp.path().join("config"));
        let prompter = ScriptedPrompter::new();

        add_repositories(&store, &SystemRunner, &prompter, &[dir], &[]).unwrap();

        assert_eq!(store.load_config().unwrap().repos["api"].authors.len(), 2);
        assert_eq!(prompter.questions(), vec!["select_authors api".to_string()]);
    }

    #[test]
    fn readding_merges_authors() {
        let tmp = TempDir::new().unwrap();
        let dir = source_repo(&tmp, "api");
        let store = Store::new(tmp.path().join("config"));
        let prompter = ScriptedPrompter::new();

        add_repositories(&store, &SystemRunner, &prompter, &[dir.clone()], &["a@x.com".to_string()]).unwrap();
        add_repositories(&store, &SystemRunner, &prompter, &[dir], &["b@x.com".to_string()]).unwrap();

        let emails: Vec<String> = store.load_config().unwrap().repos["api"]
            .authors
            .iter()
            .map(|author| author.email.clone())
            .collect();
        assert_eq!(emails, vec!["a@x.com".to_string(), "b@x.com".to_string()]);
    }

    #[test]
    fn unknown_email_is_rejected_and_nothing_saved() {
        let tmp = TempDir::new().unwrap();
        let dir = source_repo(&tmp, "api");
        let store = Store::new(tmp.path().join("config"));

        let err = add_repositories(
            &store,
            &SystemRunner,
            &ScriptedPrompter::new(),
            &[dir],
            &["nobody@x.com".to_string()],
        )
        .unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
        assert!(store.load_config().unwrap().repos.is_empty());
    }

    #[test]
    fn bot_authors_are_skipped_and_config_stays_loadable() {
        let tmp = TempDir::new().unwrap();
        let dir = source_repo(&tmp, "api");
        commit_as(&dir, "dependabot[bot]", BOT_EMAIL, 300, "bump");
        let store = Store::new(tmp.path().join("config"));
        let prompter = ScriptedPrompter::new();

        add_repositories(&store, &SystemRunner, &prompter, &[dir], &[]).unwrap();

        let config = store.load_config().unwrap();
        let emails: Vec<&str> = config.repos["api"]
            .authors
            .iter()
            .map(|author| author.email.as_str())
            .collect();
        assert_eq!(emails, vec!["a@x.com", "b@x.com"]);
    }

    #[test]
    fn repository_with_only_a_bot_author_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("api");
        fs::create_dir_all(&dir).unwrap();
        init_repo(&dir);
        commit_as(&dir, "dependabot[bot]", BOT_EMAIL, 100, "bump");
        let store = Store::new(tmp.path().join("config"));

        let err = add_repositories(&store, &SystemRunner, &ScriptedPrompter::new(), &[dir], &[]).unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
        assert!(store.load_config().unwrap().repos.is_empty());
    }

    #[test]
    fn bot_author_picked_by_email_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let dir = source_repo(&tmp, "api");
        commit_as(&dir, "dependabot[bot]", BOT_EMAIL, 300, "bump");
        let store = Store::new(tmp.path().join("config"));

        let err = add_repositories(
            &store,
            &SystemRunner,
            &ScriptedPrompter::new(),
            &[dir],
            &[BOT_EMAIL.to_string()],
        )
        .unwrap_err();

        assert!(matches!(err, AppError::Validation(msg) if msg.contains("cannot be tracked")));
        assert!(store.load_config().unwrap().repos.is_empty());
    }

    #[test]
    fn plain_directory_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("notes");
        fs::create_dir_all(&dir).unwrap();
        let store = Store::new(tmp.path().join("config"));

        let err = add_repositories(&store, &SystemRunner, &ScriptedPrompter::new(), &[dir], &[]).unwrap_err();

        assert!(matches!(err, AppError::Inspection(_)));
    }

    #[test]
    fn reconfigure_replaces_author_and_repository_and_drops_old_clone() {
        let tmp = TempDir::new().unwrap();
        let store = Store::new(tmp.path().join("config"));
        store
            .save_config(Config {
                author: Some(Author::new("Old", "old@x.com")),
                sync_repository: Some(SyncRepository {
                    id: "R_old".to_string(),
                    name: "old-sync".to_string(),
                    owner: RepositoryOwner {
                        id: "U_1".to_string(),
                        login: "octocat".to_string(),
                    },
                }),
                ..Config::default()
            })
            .unwrap();
        fs::create_dir_all(store.mirror_clone_dir()).unwrap();

        let runner = ScriptedRunner::new(|invocation: &Invocation| {
            let args: Vec<&str> = invocation.args.iter().map(String::as_str).collect();
            match args.as_slice() {
                ["api", "user", ..] => Some(CommandOutput::ok("octocat")),
                ["repo", "list", ..] => Some(CommandOutput::ok("[]")),
                ["repo", "view", name, ..] => Some(CommandOutput::ok(&repository_json(name, "octocat", false, false))),
                _ => None,
            }
        });
        let prompter = ScriptedPrompter::new()
            .with_author(Author::new("New", "1+new@users.noreply.github.com"))
            .with_repository_name("new-sync");

        let config = reconfigure(&store, &runner, &prompter).unwrap();

        assert_eq!(config.author, Some(Author::new("New", "1+new@users.noreply.github.com")));
        assert_eq!(config.sync_repository.unwrap().name, "new-sync");
        assert!(!store.mirror_clone_dir().exists());
    }

    #[test]
    fn list_tracked_handles_empty_config() {
        let tmp = TempDir::new().unwrap();
        let store = Store::new(tmp.path());
        assert!(list_tracked(&store).is_ok());
    }
}
