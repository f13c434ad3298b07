//! Route expansion inspection.

use ipnet::Ipv4Net;
use tabled::Tabled;

use wgnet_core::Controller;

use crate::cli::{GlobalOpts, RoutesArgs, RoutesCommand};
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct PrefixRow {
    #[tabled(rename = "Prefix")]
    prefix: Ipv4Net,
    #[tabled(rename = "First")]
    first: String,
    #[tabled(rename = "Last")]
    last: String,
}

impl From<&Ipv4Net> for PrefixRow {
    fn from(net: &Ipv4Net) -> Self {
        Self {
            prefix: *net,
            first: net.network().to_string(),
            last: net.broadcast().to_string(),
        }
    }
}

pub fn handle(
    controller: &Controller,
    args: &RoutesArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let prefixes = match args.command {
        RoutesCommand::Full => controller
            .routes()
            .expand(controller.config().tunnel_subnet(), &[Ipv4Net::default()]),
        RoutesCommand::Exclusions => controller.routes().exclusions().to_vec(),
    };
    let out = output::render_list(
        global.output,
        &prefixes,
        |n| PrefixRow::from(n),
        ToString::to_string,
    );
    output::print_output(&out, global.quiet);
    Ok(())
}
