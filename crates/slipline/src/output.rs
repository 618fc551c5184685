use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use slipline_frame::DecoderStats;

const PREVIEW_LIMIT: usize = 64;

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
struct FrameOutput<'a> {
    event: &'static str,
    source: &'a str,
    size: usize,
    payload: String,
    hex: String,
    timestamp: String,
}

#[derive(Serialize)]
struct OverflowOutput<'a> {
    event: &'static str,
    source: &'a str,
    capacity: usize,
    timestamp: String,
}

#[derive(Serialize)]
struct StatsOutput {
    event: &'static str,
    frames: u64,
    overflows: u64,
    protocol_violations: u64,
    noise_bytes: u64,
}

pub fn print_frame(frame: &[u8], source: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&FrameOutput {
            event: "frame",
            source,
            size: frame.len(),
            payload: payload_preview(frame),
            hex: hex::encode(frame),
            timestamp: now_unix_seconds(),
        }),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["EVENT", "SIZE", "SOURCE", "PAYLOAD"])
                .add_row(vec![
                    "frame".to_string(),
                    frame.len().to_string(),
                    source.to_string(),
                    payload_preview(frame),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "frame size={} source={} payload={}",
                frame.len(),
                source,
                payload_preview(frame)
            );
        }
        OutputFormat::Raw => print_raw(frame),
    }
}

pub fn print_overflow(capacity: usize, source: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&OverflowOutput {
            event: "overflow",
            source,
            capacity,
            timestamp: now_unix_seconds(),
        }),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_header(vec!["EVENT", "CAPACITY", "SOURCE"])
                .add_row(vec![
                    "overflow".to_string(),
                    capacity.to_string(),
                    source.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("overflow capacity={capacity} source={source} (frame discarded)");
        }
        // Raw output carries payload bytes only.
        OutputFormat::Raw => {}
    }
}

pub fn print_stats(stats: &DecoderStats, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&StatsOutput {
            event: "stats",
            frames: stats.frames,
            overflows: stats.overflows,
            protocol_violations: stats.protocol_violations,
            noise_bytes: stats.noise_bytes,
        }),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_header(vec!["FRAMES", "OVERFLOWS", "VIOLATIONS", "NOISE BYTES"])
                .add_row(vec![
                    stats.frames.to_string(),
                    stats.overflows.to_string(),
                    stats.protocol_violations.to_string(),
                    stats.noise_bytes.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "frames={} overflows={} violations={} noise_bytes={}",
                stats.frames, stats.overflows, stats.protocol_violations, stats.noise_bytes
            );
        }
        OutputFormat::Raw => {}
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) if text.len() <= PREVIEW_LIMIT => text.to_string(),
        Ok(text) => {
            let cut = (0..=PREVIEW_LIMIT)
                .rev()
                .find(|idx| text.is_char_boundary(*idx))
                .unwrap_or(0);
            format!("{}...", &text[..cut])
        }
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_shows_text_and_summarizes_binary() {
        assert_eq!(payload_preview(b"hello"), "hello");
        assert_eq!(payload_preview(&[0xC0, 0xFF]), "<binary 2 bytes>");
    }

    #[test]
    fn preview_truncates_long_text() {
        let long = "x".repeat(100);
        let preview = payload_preview(long.as_bytes());
        assert_eq!(preview.len(), PREVIEW_LIMIT + 3);
        assert!(preview.ends_with("..."));
    }

    #[test]
    fn preview_truncates_on_char_boundary() {
        let long = "é".repeat(40);
        let preview = payload_preview(long.as_bytes());
        assert!(preview.ends_with("..."));
    }
}
