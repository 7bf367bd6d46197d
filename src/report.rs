//! Pluggable reporters for measurement output.

use crate::config::OutputFormat;
use crate::result::MeasurementResult;
use std::io::{self, Write};

/// Trait for measurement result reporters.
pub trait Reporter {
    /// Write `result` to `out`. Called once per run.
    fn report(&self, result: &MeasurementResult, out: &mut dyn Write) -> io::Result<()>;
}

/// Prints the fixed single result line.
#[derive(Debug, Default)]
pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn report(&self, result: &MeasurementResult, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "{}", result.to_line())?;
        out.flush()
    }
}

/// Prints the full result as one line of JSON.
#[derive(Debug, Default)]
pub struct JsonReporter;

impl Reporter for JsonReporter {
    fn report(&self, result: &MeasurementResult, out: &mut dyn Write) -> io::Result<()> {
        let json = serde_json::to_string(result).map_err(io::Error::other)?;
        writeln!(out, "{}", json)?;
        out.flush()
    }
}

/// Reporter for a configured output format.
pub fn for_format(format: OutputFormat) -> Box<dyn Reporter> {
    match format {
        OutputFormat::Text => Box::new(ConsoleReporter),
        OutputFormat::Json => Box::new(JsonReporter),
    }
}
