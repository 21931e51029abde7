use colored::Colorize;
use inquire::Text;
use validator::ValidateEmail;

use crate::error::AppError;

/// Maximum length for an author name
const MAX_NAME_LENGTH: usize = 100;
/// Maximum length for an author email address
const MAX_EMAIL_LENGTH: usize = 100;
/// Maximum length GitHub accepts for a repository name
const MAX_REPOSITORY_NAME_LENGTH: usize = 100;
/// Domain GitHub uses for private commit emails
pub const NOREPLY_EMAIL_DOMAIN: &str = "@users.noreply.github.com";

/// Prompts user for input until valid input is provided
pub fn prompt_until_valid<F>(
    prompt_message: &str,
    default: Option<&str>,
    input_validation: F,
) -> Result<String, AppError>
where
    F: Fn(&str) -> Result<(), AppError>,
{
    loop {
        let mut text = Text::new(prompt_message);
        if let Some(value) = default {
            text = text.with_default(value);
        }
        let input: String = text.prompt()?.trim().to_string();
        match input_validation(&input) {
            Ok(_) => break Ok(input),
            Err(AppError::Validation(msg)) => println!("{}", msg.red()),
            Err(e) => return Err(e),
        }
    }
}

/// Validates author name input
pub fn validate_input_name(name: &str) -> Result<(), AppError> {
    let name = name.trim();
    if name.is_empty() {
        Err(AppError::Validation("Name cannot be empty".to_string()))
    } else if name.len() > MAX_NAME_LENGTH {
        Err(AppError::Validation(format!("name too long, max {} characters", MAX_NAME_LENGTH)))
    } else {
        Ok(())
    }
}

/// Validates email input
pub fn validate_input_email(email: &str) -> Result<(), AppError> {
    let email = email.trim();
    if email.is_empty() {
        Err(AppError::Validation("Email cannot be empty".to_string()))
    } else if email.len() > MAX_EMAIL_LENGTH {
        Err(AppError::Validation(format!("email too long, max {} characters", MAX_EMAIL_LENGTH)))
    } else if !email.validate_email() {
        Err(AppError::Validation(format!("Invalid email format: '{email}'")))
    } else {
        Ok(())
    }
}

/// Validates a GitHub repository name
pub fn validate_repository_name(name: &str) -> Result<(), AppError> {
    if name.is_empty() {
        Err(AppError::Validation("Repository name cannot be empty".to_string()))
    } else if name.len() > MAX_REPOSITORY_NAME_LENGTH {
        Err(AppError::Validation(format!(
            "repository name too long, max {} characters",
            MAX_REPOSITORY_NAME_LENGTH
        )))
    } else if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        Err(AppError::Validation(
            "Repository name may only contain letters, digits, '-', '_' and '.'".to_string(),
        ))
    } else {
        Ok(())
    }
}

/// Whether commits authored with this email keep the address private
pub fn is_noreply_email(email: &str) -> bool {
    email.trim().ends_with(NOREPLY_EMAIL_DOMAIN)
}
