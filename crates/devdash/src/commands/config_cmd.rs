//! Config subcommand handlers.

use std::io::IsTerminal;

use dialoguer::{Confirm, Input};
use serde::Serialize;
use tabled::Tabled;

use devdash_config::{self as config, Config, Profile};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

// ── Helpers ─────────────────────────────────────────────────────────

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

#[derive(Serialize)]
struct ProfileEntry {
    name: String,
    backend: String,
    default: bool,
}

#[derive(Tabled)]
struct ProfileRow {
    #[tabled(rename = "")]
    marker: &'static str,
    #[tabled(rename = "Profile")]
    name: String,
    #[tabled(rename = "Backend")]
    backend: String,
}

fn profile_entries(cfg: &Config) -> Vec<ProfileEntry> {
    let default = cfg.active_profile_name(None);
    let mut entries: Vec<_> = cfg
        .profiles
        .iter()
        .map(|(name, p)| ProfileEntry {
            name: name.clone(),
            backend: p.backend.clone(),
            default: name == default,
        })
        .collect();
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    entries
}

fn config_detail(cfg: &Config) -> String {
    let mut lines = vec![
        format!("Config file:     {}", config::config_path().display()),
        format!("Default profile: {}", cfg.active_profile_name(None)),
        format!("Timeout:         {}s", cfg.defaults.timeout),
        format!("Reconnect delay: {}ms", cfg.defaults.reconnect_delay_ms),
        format!("Insecure TLS:    {}", cfg.defaults.insecure),
    ];
    for entry in profile_entries(cfg) {
        lines.push(format!("[{}] {}", entry.name, entry.backend));
    }
    lines.join("\n")
}

/// Ask for the profile fields, seeding answers from flags and any
/// existing profile.
fn prompt_profile(existing: Option<&Profile>, global: &GlobalOpts) -> Result<Profile, CliError> {
    let backend_default = global
        .backend
        .clone()
        .or_else(|| existing.map(|p| p.backend.clone()))
        .unwrap_or_else(|| "http://localhost:8080".into());

    let backend: String = Input::new()
        .with_prompt("Backend URL")
        .default(backend_default)
        .validate_with(|input: &String| {
            config::parse_backend_url(input)
                .map(|_| ())
                .map_err(|e| e.to_string())
        })
        .interact_text()
        .map_err(prompt_err)?;

    let subscriber_id: String = Input::new()
        .with_prompt("Stream subscriber ID")
        .default(
            existing
                .and_then(|p| p.subscriber_id.clone())
                .unwrap_or_else(|| devdash_core::config::DEFAULT_SUBSCRIBER_ID.into()),
        )
        .interact_text()
        .map_err(prompt_err)?;

    let resync = Confirm::new()
        .with_prompt("Re-fetch the device list after each stream reconnect?")
        .default(
            existing
                .and_then(|p| p.resync_on_reconnect)
                .unwrap_or(false),
        )
        .interact()
        .map_err(prompt_err)?;

    Ok(Profile {
        backend,
        subscriber_id: Some(subscriber_id),
        insecure: global.insecure.then_some(true),
        timeout: global.timeout,
        resync_on_reconnect: Some(resync),
        ..Profile::default()
    })
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = config::load_config()?;
            let out = output::render_single(global.output, &cfg, config_detail, |c| {
                c.active_profile_name(None).to_owned()
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Profiles => {
            let cfg = config::load_config()?;
            let entries = profile_entries(&cfg);
            let out = output::render_list(
                global.output,
                &entries,
                |e| ProfileRow {
                    marker: if e.default { "*" } else { "" },
                    name: e.name.clone(),
                    backend: e.backend.clone(),
                },
                |e| e.name.clone(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        // ── Init: wizard, or flags when non-interactive ─────────────
        ConfigCommand::Init { name, set_default } => {
            let mut cfg = config::load_config_or_default();
            let existing = cfg.profiles.get(&name);

            let profile = if std::io::stdin().is_terminal() {
                eprintln!("devdash configuration wizard");
                eprintln!("   Config path: {}\n", config::config_path().display());
                prompt_profile(existing, global)?
            } else {
                let backend = global.backend.clone().ok_or_else(|| CliError::Validation {
                    field: "backend".into(),
                    reason: "pass --backend when running non-interactively".into(),
                })?;
                config::parse_backend_url(&backend)?;
                Profile {
                    backend,
                    insecure: global.insecure.then_some(true),
                    timeout: global.timeout,
                    ..Profile::default()
                }
            };

            let make_default = set_default
                || cfg
                    .default_profile
                    .as_ref()
                    .is_none_or(|d| !cfg.profiles.contains_key(d));
            cfg.profiles.insert(name.clone(), profile);
            if make_default {
                cfg.default_profile = Some(name.clone());
            }

            let path = config::save_config(&cfg)?;
            if !global.quiet {
                eprintln!("Configuration written to {}", path.display());
                eprintln!("  Profile: {name}{}", if make_default { " (default)" } else { "" });
                eprintln!("\n  Test it: devdash devices list --profile {name}");
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(backend: &str) -> Profile {
        Profile {
            backend: backend.into(),
            ..Profile::default()
        }
    }

    #[test]
    fn profile_entries_are_sorted_and_mark_default() {
        let mut cfg = Config::default();
        cfg.profiles.insert("zeta".into(), profile("http://z:1"));
        cfg.profiles.insert("default".into(), profile("http://d:1"));

        let entries = profile_entries(&cfg);
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["default", "zeta"]);
        assert!(entries[0].default);
        assert!(!entries[1].default);
    }

    #[test]
    fn detail_lists_profiles() {
        let mut cfg = Config::default();
        cfg.profiles.insert("lab".into(), profile("http://lab:8080"));
        let text = config_detail(&cfg);
        assert!(text.contains("Default profile: default"));
        assert!(text.contains("[lab] http://lab:8080"));
    }
}
