use std::fmt::Write as _;
use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use h4wire_frame::Packet;
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

#[derive(Serialize)]
struct PacketOutput<'a> {
    source: &'a str,
    index: u64,
    packet_type: &'static str,
    type_byte: u8,
    length: usize,
    header: String,
    payload_size: usize,
    payload: String,
    timestamp: String,
}

pub fn print_packet(packet: &Packet<'_>, source: &str, index: u64, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = PacketOutput {
                source,
                index,
                packet_type: packet.packet_type().name(),
                type_byte: packet.packet_type().as_u8(),
                length: packet.len(),
                header: hex(packet.header()),
                payload_size: packet.payload().len(),
                payload: hex(packet.payload()),
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["#", "TYPE", "LEN", "HEADER", "PAYLOAD"])
                .add_row(vec![
                    index.to_string(),
                    packet.packet_type().name().to_string(),
                    packet.len().to_string(),
                    hex(packet.header()),
                    payload_preview(packet.payload()),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "#{index} {} len={} header=[{}] payload=[{}] source={source}",
                packet.packet_type(),
                packet.len(),
                hex(packet.header()),
                payload_preview(packet.payload()),
            );
        }
        OutputFormat::Raw => {
            let mut out = std::io::stdout();
            let _ = out.write_all(packet.as_bytes());
            let _ = out.flush();
        }
    }
}

/// Space-separated lowercase hex.
pub fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, byte) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Parse hex bytes, accepting spaces, colons and an optional `0x` per byte.
pub fn parse_hex(input: &str) -> Result<Vec<u8>, String> {
    let mut digits = String::with_capacity(input.len());
    for token in input.split(|c: char| c.is_whitespace() || c == ':' || c == ',') {
        let token = token
            .strip_prefix("0x")
            .or_else(|| token.strip_prefix("0X"))
            .unwrap_or(token);
        digits.push_str(token);
    }

    if !digits.is_ascii() {
        return Err(format!("non-hex characters in {input:?}"));
    }
    if digits.len() % 2 != 0 {
        return Err(format!("odd number of hex digits in {input:?}"));
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|_| format!("invalid hex byte {:?}", &digits[i..i + 2]))
        })
        .collect()
}

const PREVIEW_BYTES: usize = 32;

fn payload_preview(payload: &[u8]) -> String {
    if payload.len() <= PREVIEW_BYTES {
        hex(payload)
    } else {
        format!(
            "{} … (+{} bytes)",
            hex(&payload[..PREVIEW_BYTES]),
            payload.len() - PREVIEW_BYTES
        )
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
