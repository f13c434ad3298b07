//! Server tunnel parameters.

use wgnet_core::{Command as CoreCommand, CommandResult, Controller, ServerInfo};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

use super::util;

fn detail(info: &ServerInfo) -> String {
    let unset = || "-".to_owned();
    [
        format!("Tunnel:      {}", info.tunnel_inet),
        format!("Listen port: {}", info.listen_port),
        format!("Endpoint:    {}", info.endpoint.clone().unwrap_or_else(unset)),
        format!(
            "Public key:  {}",
            info.public_key.as_ref().map_or_else(unset, ToString::to_string)
        ),
    ]
    .join("\n")
}

pub fn handle(controller: &Controller, global: &GlobalOpts) -> Result<(), CliError> {
    match util::execute(controller, CoreCommand::ServerInfo)? {
        CommandResult::Server(info) => {
            let out = output::render_single(global.output, &info, detail, |i| {
                i.tunnel_inet.to_string()
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }
        other => Err(util::unexpected(&other)),
    }
}
