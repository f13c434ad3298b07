//! Config subcommand handlers.

use dialoguer::{Input, Password, Select};

use wgnet_config::Config;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config;
use crate::error::CliError;
use crate::output;

use super::util;

const REDACTED: &str = "<redacted>";

// ── Helpers ─────────────────────────────────────────────────────────

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

fn prompt_secret(confirm: bool) -> Result<String, CliError> {
    let mut prompt = Password::new().with_prompt("Session signing secret");
    if confirm {
        prompt = prompt.with_confirmation("Repeat secret", "Secrets do not match");
    }
    let secret = prompt.interact().map_err(prompt_err)?;
    if secret.is_empty() {
        return Err(CliError::Validation {
            field: "session_secret".into(),
            reason: "secret cannot be empty".into(),
        });
    }
    Ok(secret)
}

fn redacted(cfg: &Config) -> Config {
    let mut cfg = cfg.clone();
    if cfg.auth.session_secret.is_some() {
        cfg.auth.session_secret = Some(REDACTED.into());
    }
    cfg
}

fn format_config(cfg: &Config) -> String {
    toml::to_string_pretty(cfg).unwrap_or_else(|e| format!("<unprintable config: {e}>"))
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let path = config::config_path(global);

    match args.command {
        // ── Init: interactive wizard ────────────────────────────────
        ConfigCommand::Init => {
            if path.exists()
                && !util::confirm(
                    &format!("Overwrite existing config at {}?", path.display()),
                    global.yes,
                )?
            {
                return Ok(());
            }
            eprintln!("wgnet configuration wizard");
            eprintln!("   Config path: {}\n", path.display());

            let mut cfg = Config::default();

            // 1. Tunnel network
            cfg.network.tunnel_cidr = Input::new()
                .with_prompt("Server tunnel address (CIDR)")
                .default(cfg.network.tunnel_cidr.clone())
                .interact_text()
                .map_err(prompt_err)?;

            // 2. Public endpoint
            let endpoint: String = Input::new()
                .with_prompt("Public endpoint host (blank to skip)")
                .allow_empty(true)
                .interact_text()
                .map_err(prompt_err)?;
            cfg.network.endpoint = Some(endpoint.trim().to_owned()).filter(|e| !e.is_empty());

            // 3. Session secret
            let secret = prompt_secret(true)?;
            let store_choices = &[
                "Store in system keyring (recommended)",
                "Save to config file (plaintext)",
            ];
            let store_selection = Select::new()
                .with_prompt("Where to store the secret?")
                .items(store_choices)
                .default(0)
                .interact()
                .map_err(prompt_err)?;
            if store_selection == 0 {
                wgnet_config::store_session_secret(&secret)
                    .map_err(|e| CliError::config(e, &path))?;
                eprintln!("   ✓ Secret stored in system keyring");
            } else {
                cfg.auth.session_secret = Some(secret);
            }

            // 4. Validate before writing
            let mut check = cfg.clone();
            check.auth.required = false;
            wgnet_config::to_service_config(&check).map_err(|e| CliError::config(e, &path))?;

            wgnet_config::save_config_to(&cfg, &path).map_err(|e| CliError::config(e, &path))?;
            output::status(global, &format!("configuration written to {}", path.display()));
            Ok(())
        }

        // ── Show ────────────────────────────────────────────────────
        ConfigCommand::Show => {
            let cfg = redacted(&config::load(global)?);
            let out = output::render_single(global.output, &cfg, format_config, |_| {
                path.display().to_string()
            });
            output::print_output(out.trim_end(), global.quiet);
            Ok(())
        }

        // ── Path ────────────────────────────────────────────────────
        ConfigCommand::Path => {
            println!("{}", path.display());
            Ok(())
        }

        // ── SetSecret ───────────────────────────────────────────────
        ConfigCommand::SetSecret => {
            let secret = prompt_secret(true)?;
            wgnet_config::store_session_secret(&secret).map_err(|e| CliError::config(e, &path))?;
            output::status(global, "session secret stored in system keyring");
            Ok(())
        }
    }
}
