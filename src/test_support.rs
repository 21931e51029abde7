use std::{
    cell::RefCell,
    collections::VecDeque,
    path::Path,
};

use crate::{
    command::{CommandOutput, CommandRunner, Invocation, SystemRunner},
    error::AppError,
    model::Author,
    prompt::Prompter,
    registry::RemoteRepository,
};

type Handler = Box<dyn Fn(&Invocation) -> Option<CommandOutput>>;

/// Answers invocations the handler recognizes, runs everything else for
/// real, and records every call
pub struct ScriptedRunner {
    handler: Handler,
    calls: RefCell<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new(handler: impl Fn(&Invocation) -> Option<CommandOutput> + 'static) -> Self {
        Self {
            handler: Box::new(handler),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn calls_matching(&self, prefix: &str) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .cloned()
            .collect()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls_matching(prefix).len()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput, AppError> {
        self.calls.borrow_mut().push(invocation.display());
        match (self.handler)(invocation) {
            Some(output) => Ok(output),
            None => SystemRunner.run(invocation),
        }
    }
}

/// Prompter with queued answers; author selection picks every author
#[derive(Default)]
pub struct ScriptedPrompter {
    authors: RefCell<VecDeque<Author>>,
    repository_names: RefCell<VecDeque<String>>,
    confirmations: RefCell<VecDeque<bool>>,
    questions: RefCell<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_author(self, author: Author) -> Self {
        self.authors.borrow_mut().push_back(author);
        self
    }

    pub fn with_repository_name(self, name: &str) -> Self {
        self.repository_names.borrow_mut().push_back(name.to_string());
        self
    }

    pub fn with_confirmation(self, answer: bool) -> Self {
        self.confirmations.borrow_mut().push_back(answer);
        self
    }

    pub fn questions(&self) -> Vec<String> {
        self.questions.borrow().clone()
    }

    fn ask(&self, question: String) {
        self.questions.borrow_mut().push(question);
    }
}

fn unanswered(question: &str) -> AppError {
    AppError::Validation(format!("no scripted answer for {question}"))
}

impl Prompter for ScriptedPrompter {
    fn select_authors(&self, repo_name: &str, authors: &[Author]) -> Result<Vec<Author>, AppError> {
        self.ask(format!("select_authors {repo_name}"));
        Ok(authors.to_vec())
    }

    fn author_identity(&self, _default: Option<&Author>) -> Result<Author, AppError> {
        self.ask("author_identity".to_string());
        self.authors
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| unanswered("author_identity"))
    }

    fn sync_repository_name(
        &self,
        _existing: &[RemoteRepository],
        _default_name: &str,
    ) -> Result<String, AppError> {
        self.ask("sync_repository_name".to_string());
        self.repository_names
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| unanswered("sync_repository_name"))
    }

    fn confirm(&self, message: &str) -> Result<bool, AppError> {
        self.ask(format!("confirm {message}"));
        self.confirmations
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| unanswered(message))
    }
}

/// Runs git in `dir` and returns trimmed stdout, panicking on failure
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = SystemRunner
        .run(&Invocation::git().args(args.iter().copied()).cwd(dir))
        .expect("failed to run git");
    assert!(
        output.success(),
        "git {} failed: {}",
        args.join(" "),
        output.stderr
    );
    output.stdout.trim().to_string()
}

pub fn init_repo(dir: &Path) {
    git(dir, &["init", "--quiet", "-b", "main"]);
}

pub fn init_bare_remote(dir: &Path) {
    std::fs::create_dir_all(dir).expect("failed to create remote dir");
    git(dir, &["init", "--quiet", "--bare", "-b", "main"]);
}

/// Empty commit with fixed author and committer identity and date
pub fn commit_as(dir: &Path, name: &str, email: &str, timestamp: i64, message: &str) {
    let date = format!("@{timestamp} +0000");
    let output = SystemRunner
        .run(
            &Invocation::git()
                .args(["commit", "--quiet", "--allow-empty", "--no-verify", "--no-gpg-sign", "-m", message])
                .cwd(dir)
                .env("GIT_AUTHOR_NAME", name)
                .env("GIT_AUTHOR_EMAIL", email)
                .env("GIT_AUTHOR_DATE", date.as_str())
                .env("GIT_COMMITTER_NAME", name)
                .env("GIT_COMMITTER_EMAIL", email)
                .env("GIT_COMMITTER_DATE", date.as_str()),
        )
        .expect("failed to run git commit");
    assert!(output.success(), "git commit failed: {}", output.stderr);
}

/// `git log` of HEAD in `format`, one entry per line
pub fn log_lines(dir: &Path, format: &str) -> Vec<String> {
    let format = format!("--format={format}");
    git(dir, &["log", format.as_str()])
        .lines()
        .map(str::to_string)
        .collect()
}

/// Repository record shaped like `gh repo view --json` output
pub fn repository_json(name: &str, owner: &str, is_fork: bool, is_in_organization: bool) -> String {
    serde_json::json!({
        "id": format!("R_{name}"),
        "name": name,
        "owner": {"id": format!("U_{owner}"), "login": owner},
        "isFork": is_fork,
        "isPrivate": true,
        "isInOrganization": is_in_organization,
        "isArchived": false,
        "url": format!("https://github.com/{owner}/{name}"),
    })
    .to_string()
}
