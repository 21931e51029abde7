use colored::Colorize;
use inquire::{Confirm, MultiSelect, Select};

use crate::{
    error::AppError,
    model::Author,
    registry::RemoteRepository,
    validation::{prompt_until_valid, validate_input_email, validate_input_name, validate_repository_name},
};

/// Menu entry for creating a new sync repository
pub const CREATE_OPTION: &str = "create a new repository";

/// Questions the workflows ask the user
pub trait Prompter {
    /// Picks which authors of a repository get mirrored, at least one
    fn select_authors(&self, repo_name: &str, authors: &[Author]) -> Result<Vec<Author>, AppError>;
    /// Asks for the identity placeholder commits are authored with
    fn author_identity(&self, default: Option<&Author>) -> Result<Author, AppError>;
    /// Picks an existing repository or names a new one
    fn sync_repository_name(
        &self,
        existing: &[RemoteRepository],
        default_name: &str,
    ) -> Result<String, AppError>;
    fn confirm(&self, message: &str) -> Result<bool, AppError>;
}

/// Terminal prompts using `inquire`
#[derive(Debug, Default, Clone, Copy)]
pub struct InquirePrompter;

impl Prompter for InquirePrompter {
    fn select_authors(&self, repo_name: &str, authors: &[Author]) -> Result<Vec<Author>, AppError> {
        let message = format!(
            "select authors of commits to extract from the \"{}\" repository:",
            repo_name
        );
        loop {
            let selected: Vec<Author> = MultiSelect::new(&format!("{}", message.blue()), authors.to_vec())
                .prompt()?;
            if !selected.is_empty() {
                break Ok(selected);
            }
            println!("{}", "select at least one author".red());
        }
    }

    fn author_identity(&self, default: Option<&Author>) -> Result<Author, AppError> {
        let name: String = prompt_until_valid(
            &format!("{}", "authoring name:".blue()),
            default.map(|author| author.name.as_str()),
            validate_input_name,
        )?;

        let email: String = prompt_until_valid(
            &format!("{}", "authoring email:".blue()),
            default.map(|author| author.email.as_str()),
            validate_input_email,
        )?;

        Ok(Author::new(&name, &email))
    }

    fn sync_repository_name(
        &self,
        existing: &[RemoteRepository],
        default_name: &str,
    ) -> Result<String, AppError> {
        let mut options: Vec<String> = existing.iter().map(|repo| repo.name.clone()).collect();
        options.push(CREATE_OPTION.to_string());

        let selected: String = Select::new(
            &format!("{}", "select repository for synchronization:".blue()),
            options,
        )
        .prompt()?;

        if selected != CREATE_OPTION {
            return Ok(selected);
        }

        prompt_until_valid(
            &format!("{}", "name of the new repository:".blue()),
            Some(default_name),
            validate_repository_name,
        )
    }

    fn confirm(&self, message: &str) -> Result<bool, AppError> {
        Ok(Confirm::new(message).with_default(false).prompt()?)
    }
}
