//! Shared helpers for command handlers.

use std::path::Path;

use wgnet_core::{Command, CommandResult, Controller, RequestContext, UserId, UserSummary};

use crate::error::CliError;

/// Run one core command in administrative mode.
pub fn execute(controller: &Controller, command: Command) -> Result<CommandResult, CliError> {
    Ok(controller
        .execute(&RequestContext::administrative(), command)?
        .result)
}

/// Error for a result variant the handler did not ask for.
pub fn unexpected(result: &CommandResult) -> CliError {
    let debug = format!("{result:?}");
    let variant = debug.split([' ', '(', '{']).next().unwrap_or_default();
    CliError::Unexpected {
        command: variant.to_owned(),
    }
}

/// Resolve a user identifier (UUID or exact name) to a UserId.
pub fn resolve_user(controller: &Controller, identifier: &str) -> Result<UserId, CliError> {
    if let Ok(id) = identifier.parse::<UserId>() {
        return Ok(id);
    }

    let users = match execute(controller, Command::ListUsers)? {
        CommandResult::Users(users) => users,
        other => return Err(unexpected(&other)),
    };
    let matches: Vec<&UserSummary> = users.iter().filter(|u| u.name == identifier).collect();
    match matches.as_slice() {
        [user] => Ok(user.id),
        [] => Err(CliError::NotFound {
            resource_type: "user".into(),
            identifier: identifier.into(),
            list_command: "users list".into(),
        }),
        _ => Err(CliError::Validation {
            field: "user".into(),
            reason: format!("several users are named '{identifier}'; pass the ID instead"),
        }),
    }
}

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !std::io::IsTerminal::is_terminal(&std::io::stdin()) {
        return Err(CliError::NonInteractiveRequiresYes {
            action: message.into(),
        });
    }
    dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))
}

/// Read one entry per line, skipping blanks and `#` comments.
pub fn read_lines(path: &Path) -> Result<Vec<String>, CliError> {
    let contents = std::fs::read_to_string(path)?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_owned)
        .collect())
}
