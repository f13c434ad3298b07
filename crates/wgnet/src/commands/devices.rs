//! Device command handlers.

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tabled::Tabled;

use wgnet_core::{
    Command as CoreCommand, CommandResult, Controller, CreateDeviceRequest, DeviceSummary,
    PeerKey, TunnelProfile, UpdateDeviceRequest,
};

use crate::cli::{DevicesArgs, DevicesCommand, GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "Label")]
    label: String,
    #[tabled(rename = "Owner")]
    owner: String,
    #[tabled(rename = "Full tunnel")]
    wan_forward: String,
    #[tabled(rename = "Public key")]
    public_key: String,
}

impl From<&DeviceSummary> for DeviceRow {
    fn from(d: &DeviceSummary) -> Self {
        Self {
            address: d.address.to_string(),
            label: d.label.clone(),
            owner: d.owner.to_string(),
            wan_forward: if d.wan_forward { "yes" } else { "" }.into(),
            public_key: d.public_key.to_string(),
        }
    }
}

fn detail(d: &DeviceSummary) -> String {
    let allowed = d
        .allowed_ips
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    [
        format!("Address:     {}", d.inet),
        format!("Label:       {}", d.label),
        format!("Owner:       {}", d.owner),
        format!("Full tunnel: {}", if d.wan_forward { "yes" } else { "no" }),
        format!("Public key:  {}", d.public_key),
        format!("Allowed IPs: {allowed}"),
    ]
    .join("\n")
}

/// A new device with its tunnel profile. `private_key` is present only
/// when it was generated for this device; it is never stored.
#[derive(Serialize)]
struct CreatedView {
    device: DeviceSummary,
    profile: TunnelProfile,
    #[serde(skip_serializing_if = "Option::is_none")]
    private_key: Option<String>,
}

fn parse_key(value: &str) -> Result<PeerKey, CliError> {
    Ok(value.parse::<PeerKey>()?)
}

fn print_profile(global: &GlobalOpts, profile: &TunnelProfile, private_key: Option<&str>) {
    let out = match global.output {
        OutputFormat::Table | OutputFormat::Plain => profile.render(private_key),
        format => output::render_single(format, profile, |_| String::new(), |_| String::new()),
    };
    output::print_output(out.trim_end(), global.quiet);
}

fn print_created(
    global: &GlobalOpts,
    device: DeviceSummary,
    profile: TunnelProfile,
    private_key: Option<&SecretString>,
) {
    let generated = private_key.is_some();
    match global.output {
        OutputFormat::Table | OutputFormat::Plain => {
            print_profile(global, &profile, private_key.map(SecretString::expose_secret));
        }
        format => {
            let view = CreatedView {
                device,
                profile,
                private_key: private_key.map(|k| k.expose_secret().to_owned()),
            };
            let out = output::render_single(format, &view, |_| String::new(), |_| String::new());
            output::print_output(&out, global.quiet);
        }
    }
    output::status(global, "device created");
    if generated {
        output::warn(global, "the private key above is not stored; save the configuration now");
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(
    controller: &Controller,
    args: DevicesArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        DevicesCommand::List => {
            let devices = match util::execute(controller, CoreCommand::ListDevices)? {
                CommandResult::Devices(devices) => devices,
                other => return Err(util::unexpected(&other)),
            };
            let out = output::render_list(
                global.output,
                &devices,
                |d| DeviceRow::from(d),
                |d| d.address.to_string(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        DevicesCommand::Get { address } => {
            match util::execute(controller, CoreCommand::GetDevice { address })? {
                CommandResult::Device(d) => {
                    let out = output::render_single(global.output, &d, detail, |d| {
                        d.address.to_string()
                    });
                    output::print_output(&out, global.quiet);
                    Ok(())
                }
                other => Err(util::unexpected(&other)),
            }
        }

        DevicesCommand::Create {
            owner,
            label,
            wan_forward,
            public_key,
        } => {
            let owner = util::resolve_user(controller, &owner)?;
            let public_key = public_key.as_deref().map(parse_key).transpose()?;
            let result = util::execute(
                controller,
                CoreCommand::CreateDevice(CreateDeviceRequest {
                    owner,
                    label,
                    wan_forward,
                    public_key,
                }),
            )?;
            match result {
                CommandResult::DeviceCreated {
                    device,
                    profile,
                    private_key,
                } => {
                    print_created(global, device, profile, private_key.as_ref());
                    Ok(())
                }
                other => Err(util::unexpected(&other)),
            }
        }

        DevicesCommand::Update {
            address,
            label,
            wan_forward,
            public_key,
            owner,
        } => {
            let update = UpdateDeviceRequest {
                label,
                wan_forward,
                public_key: public_key.as_deref().map(parse_key).transpose()?,
                owner: owner
                    .as_deref()
                    .map(|o| util::resolve_user(controller, o))
                    .transpose()?,
            };
            if update.is_empty() {
                return Err(CliError::Validation {
                    field: "update".into(),
                    reason: "nothing to change; pass --label, --wan-forward, --public-key or --owner"
                        .into(),
                });
            }
            match util::execute(controller, CoreCommand::UpdateDevice { address, update })? {
                CommandResult::Device(d) => {
                    let out = output::render_single(global.output, &d, detail, |d| {
                        d.address.to_string()
                    });
                    output::print_output(&out, global.quiet);
                    output::status(global, "device updated");
                    Ok(())
                }
                other => Err(util::unexpected(&other)),
            }
        }

        DevicesCommand::Remove { address } => {
            if !util::confirm(&format!("Remove device {address}?"), global.yes)? {
                return Ok(());
            }
            util::execute(controller, CoreCommand::RemoveDevice { address })?;
            output::status(global, &format!("device {address} removed"));
            Ok(())
        }

        DevicesCommand::Config { address } => {
            match util::execute(controller, CoreCommand::DeviceProfile { address })? {
                CommandResult::Profile(profile) => {
                    print_profile(global, &profile, None);
                    Ok(())
                }
                other => Err(util::unexpected(&other)),
            }
        }
    }
}
