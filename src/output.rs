use std::io::Write;

use serde::Serialize;

use crate::error::SpireError;
use crate::table::Table;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

pub fn write_table<W: Write>(
    table: &Table,
    format: OutputFormat,
    out: &mut W,
) -> Result<(), SpireError> {
    match format {
        OutputFormat::Text => writeln!(out, "{table}").map_err(io_error),
        OutputFormat::Json => write_json(table, out),
    }
}

pub fn write_lines<W: Write, T: Serialize>(
    lines: &[String],
    records: &T,
    format: OutputFormat,
    out: &mut W,
) -> Result<(), SpireError> {
    match format {
        OutputFormat::Text => {
            for line in lines {
                writeln!(out, "{line}").map_err(io_error)?;
            }
            Ok(())
        }
        OutputFormat::Json => write_json(records, out),
    }
}

fn write_json<W: Write, T: Serialize + ?Sized>(value: &T, out: &mut W) -> Result<(), SpireError> {
    serde_json::to_writer_pretty(&mut *out, value)
        .map_err(|err| SpireError::Filesystem(err.to_string()))?;
    out.write_all(b"\n").map_err(io_error)
}

fn io_error(err: std::io::Error) -> SpireError {
    SpireError::Filesystem(err.to_string())
}
