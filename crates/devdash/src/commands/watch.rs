//! `devdash watch`: follow the pushed device list until interrupted.

use std::sync::Arc;

use chrono::Local;
use tracing::debug;

use devdash_core::{Dashboard, Device, DeviceSnapshot};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

#[derive(tabled::Tabled)]
struct WatchRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Connection")]
    connection: String,
}

fn render_snapshot(snapshot: &DeviceSnapshot, global: &GlobalOpts, color: bool) -> String {
    let devices: Vec<Arc<Device>> = snapshot.all().cloned().collect();
    // one line per snapshot when following as JSON
    let format = match global.output {
        OutputFormat::Json => OutputFormat::JsonCompact,
        other => other,
    };
    let body = output::render_list(
        format,
        &devices,
        |d| WatchRow {
            id: d.id.to_string(),
            name: d.label().to_owned(),
            connection: output::connected_label(d.connected, color),
        },
        |d| d.id.to_string(),
    );

    if global.output == OutputFormat::Table {
        format!(
            "{} · {} devices, {} online\n{body}",
            Local::now().format("%H:%M:%S"),
            snapshot.len(),
            snapshot.online().len(),
        )
    } else {
        body
    }
}

pub async fn handle(
    dashboard: &Dashboard,
    args: WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let color = output::should_color(global.color);
    let mut devices = dashboard.devices();
    let mut connected = dashboard.repository().watch_stream_connected();
    let mut seen: u64 = 0;

    dashboard.connect_stream();
    if !global.quiet {
        eprintln!("Watching {} (Ctrl-C to stop)", dashboard.stream_client().url());
    }

    // pushes only carry changes; the initial list comes from a pull
    if let Err(err) = dashboard.fetch_all().await {
        if !global.quiet {
            eprintln!("warning: initial fetch failed ({err}); waiting for the stream");
        }
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                debug!("interrupted");
                break;
            }
            changed = connected.changed() => {
                if changed.is_err() {
                    break;
                }
                let up = *connected.borrow_and_update();
                if !global.quiet {
                    if up {
                        eprintln!("stream connected");
                    } else if let Some(err) = dashboard.sync_status().error {
                        eprintln!("stream disconnected ({err}), retrying");
                    } else {
                        eprintln!("stream disconnected, retrying");
                    }
                }
            }
            snapshot = devices.changed() => {
                let Some(snapshot) = snapshot else { break };
                output::print_output(&render_snapshot(&snapshot, global, color), global.quiet);
                seen += 1;
                if args.count > 0 && seen >= args.count {
                    break;
                }
            }
        }
    }

    dashboard.shutdown().await;
    Ok(())
}
