//! Flag-aware profile resolution.
//!
//! The file/env layering lives in `devdash-config`; this module applies
//! the global CLI flags on top and produces the `DashboardConfig` handed to
//! core.

use devdash_config::{Config, Profile, config_path, profile_to_dashboard_config};
use devdash_core::DashboardConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    config
        .active_profile_name(global.profile.as_deref())
        .to_owned()
}

/// Translate the active profile plus global flags into a `DashboardConfig`.
///
/// Flags win over the profile, the profile wins over `[defaults]`. Without
/// a matching profile, `--backend` alone is enough.
pub fn resolve(global: &GlobalOpts, config: &Config) -> Result<DashboardConfig, CliError> {
    let name = active_profile_name(global, config);

    let resolved = match config.profile(&name) {
        Some(profile) => with_overrides(profile, global),
        None if global.profile.is_some() => {
            let mut available: Vec<_> = config.profiles.keys().cloned().collect();
            available.sort();
            return Err(CliError::ProfileNotFound {
                name,
                available: if available.is_empty() {
                    "(none)".into()
                } else {
                    available.join(", ")
                },
            });
        }
        None => {
            let backend = global.backend.clone().ok_or_else(|| CliError::NoConfig {
                path: config_path().display().to_string(),
            })?;
            with_overrides(
                &Profile {
                    backend,
                    ..Profile::default()
                },
                global,
            )
        }
    };

    tracing::debug!(profile = %name, backend = %resolved.backend, "resolved profile");
    Ok(profile_to_dashboard_config(&resolved, &config.defaults)?)
}

fn with_overrides(profile: &Profile, global: &GlobalOpts) -> Profile {
    Profile {
        backend: global
            .backend
            .clone()
            .unwrap_or_else(|| profile.backend.clone()),
        subscriber_id: profile.subscriber_id.clone(),
        ca_cert: profile.ca_cert.clone(),
        insecure: if global.insecure {
            Some(true)
        } else {
            profile.insecure
        },
        timeout: global.timeout.or(profile.timeout),
        reconnect_delay_ms: profile.reconnect_delay_ms,
        resync_on_reconnect: profile.resync_on_reconnect,
    }
}
