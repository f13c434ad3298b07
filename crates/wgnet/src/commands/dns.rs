//! DNS zone command handlers.

use tabled::Tabled;

use wgnet_core::{
    ARecord, CnameRecord, Command as CoreCommand, CommandResult, Controller, DnsRecord, Domain,
    Resolution,
};

use crate::cli::{DnsArgs, DnsCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct DomainRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    record_type: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "TTL")]
    ttl: String,
}

impl From<&Domain> for DomainRow {
    fn from(d: &Domain) -> Self {
        let (value, ttl) = if let Some(cname) = &d.cname {
            (cname.target.clone(), cname.ttl.to_string())
        } else {
            (
                d.a.iter()
                    .map(|a| a.address.to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
                d.a.iter()
                    .map(|a| a.ttl.to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            )
        };
        Self {
            name: d.name.clone(),
            record_type: d
                .record_kind()
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default(),
            value,
            ttl,
        }
    }
}

fn detail(d: &Domain) -> String {
    let mut lines = vec![format!("Name:  {}", d.name)];
    if let Some(cname) = &d.cname {
        lines.push(format!("CNAME: {} (ttl {})", cname.target, cname.ttl));
    }
    lines.extend(
        d.a.iter()
            .map(|a| format!("A:     {} (ttl {})", a.address, a.ttl)),
    );
    if d.cname.is_none() && d.a.is_empty() {
        lines.push("(no records)".into());
    }
    lines.join("\n")
}

fn resolution_detail(r: &Resolution) -> String {
    let addresses = r
        .addresses
        .iter()
        .map(|a| a.address.to_string())
        .collect::<Vec<_>>();
    [
        format!("Chain:     {}", r.chain.join(" -> ")),
        format!(
            "Addresses: {}",
            if addresses.is_empty() {
                "-".to_owned()
            } else {
                addresses.join(", ")
            }
        ),
    ]
    .join("\n")
}

fn print_domain(global: &GlobalOpts, result: CommandResult, action: &str) -> Result<(), CliError> {
    match result {
        CommandResult::Domain(d) => {
            let out = output::render_single(global.output, &d, detail, |d| d.name.clone());
            output::print_output(&out, global.quiet);
            if !action.is_empty() {
                output::status(global, action);
            }
            Ok(())
        }
        other => Err(util::unexpected(&other)),
    }
}

fn print_removal(
    global: &GlobalOpts,
    result: CommandResult,
    kind: &str,
    value: &str,
) -> Result<(), CliError> {
    match result {
        CommandResult::RecordRemoved { domain, removed } => {
            let out = output::render_single(global.output, &domain, detail, |d| d.name.clone());
            output::print_output(&out, global.quiet);
            if removed {
                output::status(global, &format!("{kind} record removed"));
            } else {
                output::warn(global, &format!("no {kind} record {value} on {}", domain.name));
            }
            Ok(())
        }
        other => Err(util::unexpected(&other)),
    }
}

fn set_record(
    controller: &Controller,
    global: &GlobalOpts,
    name: String,
    record: DnsRecord,
) -> Result<(), CliError> {
    let kind = record.kind();
    let result = util::execute(controller, CoreCommand::SetRecord { name, record })?;
    print_domain(global, result, &format!("{kind} record set"))
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(
    controller: &Controller,
    args: DnsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        DnsCommand::List => {
            let domains = match util::execute(controller, CoreCommand::ListDomains)? {
                CommandResult::Domains(domains) => domains,
                other => return Err(util::unexpected(&other)),
            };
            let out = output::render_list(
                global.output,
                &domains,
                |d| DomainRow::from(d),
                |d| d.name.clone(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        DnsCommand::Get { name } => {
            let result = util::execute(controller, CoreCommand::GetDomain { name })?;
            print_domain(global, result, "")
        }

        DnsCommand::Create { name } => {
            let result = util::execute(controller, CoreCommand::CreateDomain { name })?;
            print_domain(global, result, "domain created")
        }

        DnsCommand::Remove { name } => {
            if !util::confirm(&format!("Remove domain {name} and its records?"), global.yes)? {
                return Ok(());
            }
            util::execute(controller, CoreCommand::RemoveDomain { name: name.clone() })?;
            output::status(global, &format!("domain {name} removed"));
            Ok(())
        }

        DnsCommand::SetA { name, address, ttl } => set_record(
            controller,
            global,
            name,
            DnsRecord::A(ARecord { address, ttl }),
        ),

        DnsCommand::SetCname { name, target, ttl } => set_record(
            controller,
            global,
            name,
            DnsRecord::Cname(CnameRecord { target, ttl }),
        ),

        DnsCommand::RemoveA { name, address } => {
            let result = util::execute(controller, CoreCommand::RemoveARecord { name, address })?;
            print_removal(global, result, "A", &address.to_string())
        }

        DnsCommand::RemoveCname { name, target } => {
            let command = CoreCommand::RemoveCnameRecord {
                name,
                target: target.clone(),
            };
            let result = util::execute(controller, command)?;
            print_removal(global, result, "CNAME", &target)
        }

        DnsCommand::Resolve { name } => {
            match util::execute(controller, CoreCommand::ResolveDomain { name })? {
                CommandResult::Resolution(r) => {
                    let out = output::render_single(global.output, &r, resolution_detail, |r| {
                        r.addresses
                            .iter()
                            .map(|a| a.address.to_string())
                            .collect::<Vec<_>>()
                            .join("\n")
                    });
                    output::print_output(&out, global.quiet);
                    Ok(())
                }
                other => Err(util::unexpected(&other)),
            }
        }
    }
}
