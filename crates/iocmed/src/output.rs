use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use iocmed_channel::ChannelId;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

pub fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

pub fn print_table(header: &[&str], rows: Vec<Vec<String>>) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header.to_vec());
    for row in rows {
        table.add_row(row);
    }
    println!("{table}");
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

#[derive(Serialize)]
struct ServiceFrameOutput<'a> {
    mux: u8,
    channel: &'a str,
    command: u8,
    payload_size: usize,
    payload: String,
}

/// Print one service frame received from the mediator.
pub fn print_service_frame(service: &[u8], format: OutputFormat) {
    let (mux, command, payload) = match service {
        [mux, command, payload @ ..] => (*mux, *command, payload),
        _ => (0, 0, service),
    };
    let channel = channel_name(mux);

    match format {
        OutputFormat::Json => print_json(&ServiceFrameOutput {
            mux,
            channel,
            command,
            payload_size: payload.len(),
            payload: to_hex(payload),
        }),
        OutputFormat::Table => print_table(
            &["CHANNEL", "MUX", "COMMAND", "SIZE", "PAYLOAD"],
            vec![vec![
                channel.to_string(),
                mux.to_string(),
                format!("0x{command:02x}"),
                payload.len().to_string(),
                to_hex(payload),
            ]],
        ),
        OutputFormat::Pretty => println!(
            "channel={channel} mux={mux} command=0x{command:02x} size={} payload={}",
            payload.len(),
            to_hex(payload)
        ),
        OutputFormat::Raw => print_raw(service),
    }
}

pub fn channel_name(mux: u8) -> &'static str {
    ChannelId::from_mux(mux).map_or("unknown", ChannelId::name)
}

pub fn to_hex(data: &[u8]) -> String {
    data.iter().map(|b| format!("{b:02x}")).collect()
}

/// Parse a hex string such as `"01ff"` or `"01 ff"`.
pub fn parse_hex(input: &str) -> Result<Vec<u8>, String> {
    let digits: Vec<u8> = input
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    if digits.len() % 2 != 0 {
        return Err("hex data must have an even number of digits".to_string());
    }
    digits
        .chunks(2)
        .map(|pair| {
            let text = std::str::from_utf8(pair).map_err(|_| "invalid hex digit".to_string())?;
            u8::from_str_radix(text, 16).map_err(|_| format!("invalid hex byte: {text}"))
        })
        .collect()
}

/// Parse a decimal or `0x`-prefixed hex number.
pub fn parse_number<T>(input: &str) -> Result<T, String>
where
    T: TryFrom<u64>,
{
    let value = match input.strip_prefix("0x").or_else(|| input.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => input.parse::<u64>(),
    }
    .map_err(|err| format!("invalid number {input}: {err}"))?;
    T::try_from(value).map_err(|_| format!("{input} is out of range"))
}
