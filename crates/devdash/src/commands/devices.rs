//! Device command handlers.

use std::io::Read;
use std::sync::Arc;

use tabled::Tabled;

use devdash_core::{Dashboard, Device, DeviceFilter, DeviceId, NewDevice};

use crate::cli::{DevicesArgs, DevicesCommand, DevicesListArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    dtype: String,
    #[tabled(rename = "Connection")]
    connection: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Last Seen")]
    last_seen: String,
}

impl DeviceRow {
    fn new(d: &Arc<Device>, color: bool) -> Self {
        Self {
            id: d.id.to_string(),
            name: d.name.clone().unwrap_or_default(),
            dtype: d.device_type.clone().unwrap_or_default(),
            connection: output::connected_label(d.connected, color),
            status: d.status.to_string(),
            last_seen: d
                .last_seen
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_default(),
        }
    }
}

fn detail(d: &Arc<Device>, color: bool) -> String {
    let mut lines = vec![
        format!("ID:         {}", d.id),
        format!("Name:       {}", d.name.as_deref().unwrap_or("-")),
        format!("Type:       {}", d.device_type.as_deref().unwrap_or("-")),
        format!("Connection: {}", output::connected_label(d.connected, color)),
        format!("Status:     {}", d.status),
        format!(
            "Last seen:  {}",
            d.last_seen.map_or_else(|| "-".into(), |t| t.to_rfc3339())
        ),
    ];
    for (key, value) in &d.attributes {
        lines.push(format!("{key}: {value}"));
    }
    lines.join("\n")
}

fn list_filter(args: &DevicesListArgs) -> DeviceFilter {
    match (args.online, args.offline, &args.device_type) {
        (_, _, Some(t)) => {
            let t = t.clone();
            let (online, offline) = (args.online, args.offline);
            DeviceFilter::Custom(Box::new(move |d| {
                d.device_type.as_deref() == Some(t.as_str())
                    && (!online || d.connected)
                    && (!offline || !d.connected)
            }))
        }
        (true, _, None) => DeviceFilter::Online,
        (_, true, None) => DeviceFilter::Offline,
        (false, false, None) => DeviceFilter::All,
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    dashboard: &Dashboard,
    args: DevicesArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let color = output::should_color(global.color);

    match args.command {
        DevicesCommand::List(list) => {
            dashboard.fetch_all().await?;
            let devices = dashboard.query().filter(&list_filter(&list));
            let out = output::render_list(
                global.output,
                &devices,
                |d| DeviceRow::new(d, color),
                |d| d.id.to_string(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        DevicesCommand::Get { id } => {
            dashboard.fetch_one(&DeviceId::new(id.as_str())).await?;
            let device = dashboard
                .selected()
                .ok_or_else(|| CliError::Internal("selection missing after fetch".into()))?;
            let out = output::render_single(
                global.output,
                &device,
                |d| detail(d, color),
                |d| d.id.to_string(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        DevicesCommand::Register(reg) => {
            let id = DeviceId::new(reg.id);
            dashboard
                .register(NewDevice {
                    id: id.clone(),
                    name: reg.name,
                    device_type: reg.device_type,
                })
                .await?;
            if !global.quiet {
                eprintln!("Registered device {id}");
            }
            report_reconcile(dashboard, global);
            Ok(())
        }

        DevicesCommand::Unregister { id } => {
            if !util::confirm(&format!("Unregister device {id}?"), global.yes)? {
                return Ok(());
            }
            dashboard.unregister(&DeviceId::new(id.as_str())).await?;
            if !global.quiet {
                eprintln!("Unregistered device {id}");
            }
            report_reconcile(dashboard, global);
            Ok(())
        }

        DevicesCommand::Push { id, data } => {
            let payload = parse_payload(&data)?;
            dashboard
                .push_data(&DeviceId::new(id.as_str()), &payload)
                .await?;
            if !global.quiet {
                eprintln!("Pushed data to device {id}");
            }
            Ok(())
        }
    }
}

/// Warn when the write landed but the follow-up refresh did not.
fn report_reconcile(dashboard: &Dashboard, global: &GlobalOpts) {
    if let Some(err) = dashboard.sync_status().error {
        if !global.quiet {
            eprintln!("warning: {err}; the device list may be stale");
        }
    }
}

fn parse_payload(raw: &str) -> Result<serde_json::Value, CliError> {
    if raw == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        return Ok(serde_json::from_str(&buf)?);
    }
    Ok(serde_json::from_str(raw)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn args(online: bool, offline: bool, device_type: Option<&str>) -> DevicesListArgs {
        DevicesListArgs {
            online,
            offline,
            device_type: device_type.map(Into::into),
        }
    }

    fn typed(id: &str, connected: bool, device_type: &str) -> Device {
        let mut d = Device::new(id, connected);
        d.device_type = Some(device_type.into());
        d
    }

    #[test]
    fn filter_combines_type_and_connection() {
        let filter = list_filter(&args(true, false, Some("camera")));
        assert!(filter.matches(&typed("a", true, "camera")));
        assert!(!filter.matches(&typed("b", false, "camera")));
        assert!(!filter.matches(&typed("c", true, "thermostat")));
    }

    #[test]
    fn filter_without_flags_matches_everything() {
        let filter = list_filter(&args(false, false, None));
        assert!(filter.matches(&Device::new("a", false)));
        assert!(filter.matches(&Device::new("b", true)));
    }

    #[test]
    fn payload_must_be_json() {
        assert_eq!(
            parse_payload(r#"{"temperature": 21.5}"#).unwrap()["temperature"],
            21.5
        );
        assert!(matches!(parse_payload("not json"), Err(CliError::Json(_))));
    }

    #[test]
    fn detail_lists_attributes() {
        let mut d = Device::new("s1", true).with_name("Boiler");
        d.attributes
            .insert("firmware".into(), serde_json::json!("1.2.0"));
        let text = detail(&Arc::new(d), false);
        assert!(text.contains("Name:       Boiler"));
        assert!(text.contains("Connection: online"));
        assert!(text.contains("firmware: \"1.2.0\""));
    }
}
