//! Command dispatch: bridges CLI args -> core Commands -> output formatting.

pub mod config_cmd;
pub mod devices;
pub mod dns;
pub mod routes;
pub mod server;
pub mod trust;
pub mod users;
pub mod util;

use wgnet_core::Controller;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a database-bound command to the appropriate handler.
pub fn dispatch(
    cmd: Command,
    controller: &Controller,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Users(args) => users::handle(controller, args, global),
        Command::Devices(args) => devices::handle(controller, args, global),
        Command::Dns(args) => dns::handle(controller, args, global),
        Command::Trust(args) => trust::handle(controller, args, global),
        Command::Routes(args) => routes::handle(controller, &args, global),
        Command::Server => server::handle(controller, global),
        Command::Config(_) | Command::Completions(_) => Err(CliError::Unexpected {
            command: "dispatch".into(),
        }),
    }
}
