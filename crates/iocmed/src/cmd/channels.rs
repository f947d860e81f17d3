use iocmed_channel::{ChannelId, ChannelTable};
use serde::Serialize;

use crate::cmd::{load_config, ChannelsArgs};
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_json, print_table, OutputFormat};

#[derive(Debug, Serialize)]
struct ChannelRow {
    channel: ChannelId,
    mux: u8,
    path: Option<String>,
    enabled: bool,
    critical: bool,
}

pub fn run(args: ChannelsArgs, format: OutputFormat) -> CliResult<i32> {
    let config = load_config(args.config.as_deref())?;
    let table = ChannelTable::new(&config.channels, &config.virtual_uart);
    let rows = rows(&table);

    match format {
        OutputFormat::Json => print_json(&rows),
        OutputFormat::Table => print_table(
            &["CHANNEL", "MUX", "PATH", "ENABLED", "CRITICAL"],
            rows.iter()
                .map(|row| {
                    vec![
                        row.channel.name().to_string(),
                        row.mux.to_string(),
                        row.path.clone().unwrap_or_else(|| "-".to_string()),
                        yes_no(row.enabled).to_string(),
                        yes_no(row.critical).to_string(),
                    ]
                })
                .collect(),
        ),
        OutputFormat::Pretty => {
            for row in &rows {
                println!(
                    "{:<14} mux={:<3} enabled={:<5} {}",
                    row.channel.name(),
                    row.mux,
                    row.enabled,
                    row.path.as_deref().unwrap_or("-")
                );
            }
        }
        OutputFormat::Raw => {
            for row in rows.iter().filter(|row| row.enabled) {
                println!("{}", row.channel.name());
            }
        }
    }
    Ok(SUCCESS)
}

fn rows(table: &ChannelTable) -> Vec<ChannelRow> {
    ChannelId::ALL
        .into_iter()
        .map(|id| ChannelRow {
            channel: id,
            mux: id.mux(),
            path: table
                .path(id)
                .filter(|path| !path.as_os_str().is_empty())
                .map(|path| path.display().to_string()),
            enabled: table.is_enabled(id),
            critical: id.is_critical(),
        })
        .collect()
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

#[cfg(test)]
mod tests {
    use iocmed_channel::default_channels;

    use super::*;

    #[test]
    fn default_table_rows() {
        let table = ChannelTable::new(&default_channels(), "");
        let rows = rows(&table);
        assert_eq!(rows.len(), ChannelId::COUNT);

        let lifecycle = &rows[ChannelId::Lifecycle.index()];
        assert!(lifecycle.enabled);
        assert!(lifecycle.critical);
        assert_eq!(lifecycle.path.as_deref(), Some("/dev/cbc-lifecycle"));

        let vuart = &rows[ChannelId::VirtualUart.index()];
        assert!(vuart.path.is_none(), "virtual uart path is set at run time");
    }
}
