//! User command handlers.

use secrecy::ExposeSecret;
use serde::Serialize;
use tabled::Tabled;

use wgnet_core::{
    Command as CoreCommand, CommandResult, Controller, CreateUserRequest, IssuedSecret,
    UpdateUserRequest, UserSummary,
};

use crate::cli::{GlobalOpts, UsersArgs, UsersCommand};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct UserRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Manager")]
    manager: String,
    #[tabled(rename = "Devices")]
    devices: usize,
}

impl From<&UserSummary> for UserRow {
    fn from(u: &UserSummary) -> Self {
        Self {
            id: u.id.to_string(),
            name: u.name.clone(),
            manager: if u.is_manager { "yes" } else { "" }.into(),
            devices: u.devices.len(),
        }
    }
}

fn detail(u: &UserSummary) -> String {
    let devices = if u.devices.is_empty() {
        "-".to_owned()
    } else {
        u.devices
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    };
    [
        format!("ID:      {}", u.id),
        format!("Name:    {}", u.name),
        format!("Manager: {}", if u.is_manager { "yes" } else { "no" }),
        format!("Devices: {devices}"),
    ]
    .join("\n")
}

/// A user change, plus the one-time view of a freshly issued secret.
#[derive(Serialize)]
struct UserChangeView {
    user: UserSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    otp: Option<OtpView>,
}

#[derive(Serialize)]
struct OtpView {
    secret: String,
    provisioning_uri: String,
}

impl From<IssuedSecret> for OtpView {
    fn from(issued: IssuedSecret) -> Self {
        Self {
            secret: issued.secret.expose_secret().to_owned(),
            provisioning_uri: issued.provisioning_uri,
        }
    }
}

fn change_detail(view: &UserChangeView) -> String {
    let user = detail(&view.user);
    match &view.otp {
        Some(otp) => format!(
            "{user}\n\nSecond-factor secret: {}\nProvisioning URI:     {}",
            otp.secret, otp.provisioning_uri
        ),
        None => user,
    }
}

fn print_change(result: CommandResult, global: &GlobalOpts, verb: &str) -> Result<(), CliError> {
    let CommandResult::UserChanged { user, otp } = result else {
        return Err(CliError::Unexpected {
            command: format!("users {verb}"),
        });
    };
    let issued = otp.is_some();
    let view = UserChangeView {
        user,
        otp: otp.map(OtpView::from),
    };

    let out = output::render_single(global.output, &view, change_detail, |v| {
        v.user.id.to_string()
    });
    output::print_output(&out, global.quiet);
    output::status(global, &format!("user {verb}"));
    if issued {
        output::warn(global, "store the second-factor secret now; it is not shown again");
    }
    Ok(())
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(
    controller: &Controller,
    args: UsersArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        UsersCommand::List => {
            let users = match util::execute(controller, CoreCommand::ListUsers)? {
                CommandResult::Users(users) => users,
                other => return Err(util::unexpected(&other)),
            };
            let out = output::render_list(global.output, &users, |u| UserRow::from(u), |u| {
                u.id.to_string()
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }

        UsersCommand::Get { user } => {
            let id = util::resolve_user(controller, &user)?;
            match util::execute(controller, CoreCommand::GetUser { id })? {
                CommandResult::User(u) => {
                    let out =
                        output::render_single(global.output, &u, detail, |u| u.id.to_string());
                    output::print_output(&out, global.quiet);
                    Ok(())
                }
                other => Err(util::unexpected(&other)),
            }
        }

        UsersCommand::Create { name, manager } => {
            let result = util::execute(
                controller,
                CoreCommand::CreateUser(CreateUserRequest {
                    name,
                    is_manager: manager,
                }),
            )?;
            print_change(result, global, "created")
        }

        UsersCommand::Update {
            user,
            name,
            manager,
        } => {
            if name.is_none() && manager.is_none() {
                return Err(CliError::Validation {
                    field: "update".into(),
                    reason: "nothing to change; pass --name or --manager".into(),
                });
            }
            let id = util::resolve_user(controller, &user)?;
            let result = util::execute(
                controller,
                CoreCommand::UpdateUser {
                    id,
                    update: UpdateUserRequest {
                        name,
                        is_manager: manager,
                    },
                },
            )?;
            print_change(result, global, "updated")
        }

        UsersCommand::Remove { user } => {
            let id = util::resolve_user(controller, &user)?;
            if !util::confirm(
                &format!("Remove user {user} and all of their devices?"),
                global.yes,
            )? {
                return Ok(());
            }
            match util::execute(controller, CoreCommand::RemoveUser { id })? {
                CommandResult::User(removed) => {
                    output::status(
                        global,
                        &format!(
                            "user {} removed with {} device(s)",
                            removed.name,
                            removed.devices.len()
                        ),
                    );
                    Ok(())
                }
                other => Err(util::unexpected(&other)),
            }
        }
    }
}
