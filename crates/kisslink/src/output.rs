use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use kisslink_ax25::{Ax25Frame, FrameKind};
use kisslink_kiss::{command_name, KissFrame};
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
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct FrameOutput<'a> {
    timestamp: String,
    address: u8,
    command: u8,
    command_name: &'a str,
    size: usize,
    data: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    ax25: Option<&'a str>,
}

/// Print one received KISS frame, with an optional AX.25 summary line.
pub fn print_frame(frame: &KissFrame, ax25: Option<&str>, format: OutputFormat) {
    let data = STANDARD.encode(frame.data());
    let timestamp = format_timestamp(frame.timestamp());

    match format {
        OutputFormat::Json => {
            let out = FrameOutput {
                timestamp,
                address: frame.address(),
                command: frame.command(),
                command_name: command_name(frame.command()),
                size: frame.data().len(),
                data,
                ax25,
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
                .set_header(vec!["TIME", "ADDR", "COMMAND", "SIZE", "DATA"])
                .add_row(vec![
                    timestamp,
                    frame.address().to_string(),
                    command_name(frame.command()).to_string(),
                    frame.data().len().to_string(),
                    data,
                ]);
            println!("{table}");
            if let Some(summary) = ax25 {
                println!("{summary}");
            }
        }
        OutputFormat::Pretty => {
            println!(
                "[{timestamp}] C:{}@A:{}> {data}",
                frame.command(),
                frame.address()
            );
            if let Some(summary) = ax25 {
                println!("    {summary}");
            }
        }
        OutputFormat::Raw => print_raw(frame.data()),
    }
}

#[derive(Serialize)]
struct Ax25Output {
    destination: String,
    source: String,
    digipeaters: Vec<String>,
    category: &'static str,
    poll_final: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    send_seq: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    receive_seq: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    supervisory: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    protocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload: Option<String>,
    summary: String,
}

impl Ax25Output {
    fn new(frame: &Ax25Frame) -> Self {
        let (send_seq, receive_seq, supervisory, protocol) = match &frame.kind {
            FrameKind::Information {
                send_seq,
                receive_seq,
                protocol,
                ..
            } => (
                Some(*send_seq),
                Some(*receive_seq),
                None,
                Some(protocol.to_string()),
            ),
            FrameKind::Supervisory {
                receive_seq, kind, ..
            } => (None, Some(*receive_seq), Some(kind.mnemonic()), None),
            FrameKind::Unnumbered { .. } => (None, None, None, None),
        };

        Self {
            destination: frame.destination.to_string(),
            source: frame.source.to_string(),
            digipeaters: frame.digipeaters.iter().map(ToString::to_string).collect(),
            category: frame.category(),
            poll_final: frame.poll_final(),
            send_seq,
            receive_seq,
            supervisory,
            protocol,
            payload: frame.payload().map(|payload| STANDARD.encode(payload)),
            summary: frame.to_string(),
        }
    }
}

/// Print one decoded AX.25 frame.
pub fn print_ax25(frame: &Ax25Frame, format: OutputFormat) {
    let out = Ax25Output::new(frame);
    match format {
        OutputFormat::Json => {
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
                .set_header(vec!["FIELD", "VALUE"]);
            table.add_row(vec!["destination".to_string(), out.destination]);
            table.add_row(vec!["source".to_string(), out.source]);
            table.add_row(vec!["path".to_string(), out.digipeaters.join(",")]);
            table.add_row(vec!["category".to_string(), out.category.to_string()]);
            table.add_row(vec!["poll/final".to_string(), out.poll_final.to_string()]);
            if let Some(protocol) = out.protocol {
                table.add_row(vec!["protocol".to_string(), protocol]);
            }
            if let Some(payload) = out.payload {
                table.add_row(vec!["payload".to_string(), payload]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => println!("{}", out.summary),
        OutputFormat::Raw => {
            if let Some(payload) = frame.payload() {
                print_raw(payload);
            }
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

/// Unix seconds with millisecond precision.
fn format_timestamp(timestamp: SystemTime) -> String {
    timestamp
        .duration_since(UNIX_EPOCH)
        .map(|d| format!("{}.{:03}", d.as_secs(), d.subsec_millis()))
        .unwrap_or_else(|_| "0.000".to_string())
}
