use serde::Serialize;
use std::error::Error;
use std::io::{self, Write};
use tabled::builder::Builder;
use tabled::settings::Style;

use crate::inventory::EntityKind;
use crate::metrics::{Measurement, RecordBatch, Unit};

/// Receives the finished batch of a collection pass.
pub trait RecordSink {
    fn emit(&mut self, batch: &RecordBatch) -> Result<(), Box<dyn Error>>;
}

/// Prints the batch to stdout as a table, JSON or YAML.
pub struct FormatSink {
    format: String,
}

impl FormatSink {
    pub fn new(format: &str) -> Self {
        FormatSink {
            format: format.to_string(),
        }
    }
}

impl RecordSink for FormatSink {
    fn emit(&mut self, batch: &RecordBatch) -> Result<(), Box<dyn Error>> {
        match self.format.as_str() {
            "json" | "yaml" => output_data(batch, &self.format)?,
            _ => print!("{}", render_tables(batch)),
        }
        io::stdout().flush()?;
        Ok(())
    }
}

pub fn output_data<T: Serialize>(data: &T, format: &str) -> Result<(), Box<dyn Error>> {
    match format {
        "yaml" => {
            print!("{}", serde_yaml::to_string(data)?);
        }
        _ => {
            println!("{}", serde_json::to_string_pretty(data)?);
        }
    }
    Ok(())
}

fn title(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::StorageVolume => "Datastores",
        EntityKind::VirtualMachine => "Virtual machines",
    }
}

/// One aligned table per kind. Absent values show as `-`.
pub fn render_tables(batch: &RecordBatch) -> String {
    let mut out = String::new();
    for (i, group) in batch.kinds.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(&format!("{} in {}:\n", title(group.kind), batch.datacenter));

        let Some(first) = group.records.first() else {
            out.push_str("  (none)\n");
            continue;
        };

        let mut builder = Builder::default();
        let header: Vec<String> = first
            .tags()
            .iter()
            .map(|t| t.name)
            .chain(first.measurements().iter().map(|m| m.name))
            .map(|name| name.to_uppercase())
            .collect();
        builder.push_record(header);

        for record in &group.records {
            let row: Vec<String> = record
                .tags()
                .iter()
                .map(|t| t.value.unwrap_or("-").to_string())
                .chain(record.measurements().iter().map(format_measurement))
                .collect();
            builder.push_record(row);
        }

        let mut table = builder.build();
        table.with(Style::blank());
        out.push_str(&table.to_string());
        out.push('\n');
    }
    out
}

pub fn format_measurement(measurement: &Measurement) -> String {
    let Some(value) = measurement.value else {
        return "-".to_string();
    };
    match measurement.unit {
        Unit::Bytes => humanize_bytes(value),
        Unit::Megabytes => humanize_bytes(value.saturating_mul(1024 * 1024)),
        Unit::Megahertz => format!("{}MHz", value),
        Unit::Seconds => format!("{}s", value),
        Unit::Count => value.to_string(),
    }
}

/// Binary-prefixed size: `1536` -> `1.5KB`.
pub fn humanize_bytes(bytes: i64) -> String {
    const UNITS: [&str; 7] = ["B", "KB", "MB", "GB", "TB", "PB", "EB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value.abs() >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{}B", bytes)
    } else {
        format!("{:.1}{}", value, UNITS[unit])
    }
}

pub fn print_success(message: &str) {
    eprintln!("✅ {}", message);
}

pub fn print_error(message: &str) {
    eprintln!("\x1b[31m❌ Error: {}\x1b[0m", message);
}

pub fn print_warning(message: &str) {
    eprintln!("\x1b[33m⚠️  Warning: {}\x1b[0m", message);
}
