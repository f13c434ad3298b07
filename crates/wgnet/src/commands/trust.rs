//! Trusted source command handlers.

use std::net::Ipv4Addr;

use tabled::Tabled;

use wgnet_core::{Command as CoreCommand, CommandResult, Controller};

use crate::cli::{GlobalOpts, TrustArgs, TrustCommand};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct TrustedRow {
    #[tabled(rename = "Address")]
    address: Ipv4Addr,
}

fn print_trusted(global: &GlobalOpts, addresses: &[Ipv4Addr]) {
    let out = output::render_list(
        global.output,
        addresses,
        |a| TrustedRow { address: *a },
        ToString::to_string,
    );
    output::print_output(&out, global.quiet);
}

fn parse_addresses(lines: Vec<String>) -> Result<Vec<Ipv4Addr>, CliError> {
    lines
        .into_iter()
        .map(|line| {
            line.parse().map_err(|_| CliError::Validation {
                field: "address".into(),
                reason: format!("'{line}' is not an IPv4 address"),
            })
        })
        .collect()
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(
    controller: &Controller,
    args: TrustArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        TrustCommand::List => match util::execute(controller, CoreCommand::ListTrusted)? {
            CommandResult::Trusted(addresses) => {
                print_trusted(global, &addresses);
                Ok(())
            }
            other => Err(util::unexpected(&other)),
        },

        TrustCommand::Add { address } => {
            match util::execute(controller, CoreCommand::AddTrusted { address })? {
                CommandResult::TrustChanged { changed: true, .. } => {
                    output::status(global, &format!("{address} trusted"));
                }
                CommandResult::TrustChanged { changed: false, .. } => {
                    output::warn(global, &format!("{address} was already trusted"));
                }
                other => return Err(util::unexpected(&other)),
            }
            Ok(())
        }

        TrustCommand::Remove { address } => {
            match util::execute(controller, CoreCommand::RemoveTrusted { address })? {
                CommandResult::TrustChanged { changed: true, .. } => {
                    output::status(global, &format!("{address} no longer trusted"));
                }
                CommandResult::TrustChanged { changed: false, .. } => {
                    output::warn(global, &format!("{address} was not trusted"));
                }
                other => return Err(util::unexpected(&other)),
            }
            Ok(())
        }

        TrustCommand::Bootstrap {
            addresses,
            from_file,
        } => {
            let addresses = match from_file {
                Some(path) => parse_addresses(util::read_lines(&path)?)?,
                None => addresses,
            };
            let prompt = if addresses.is_empty() {
                "Clear every trusted address?".to_owned()
            } else {
                format!("Replace the trusted set with {} address(es)?", addresses.len())
            };
            if !util::confirm(&prompt, global.yes)? {
                return Ok(());
            }
            match util::execute(controller, CoreCommand::ReplaceTrusted { addresses })? {
                CommandResult::Trusted(addresses) => {
                    print_trusted(global, &addresses);
                    output::status(global, "trusted set replaced");
                    Ok(())
                }
                other => Err(util::unexpected(&other)),
            }
        }
    }
}
