//! Export of IC tables as CSV, JSON and plain text.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Result, SummaryError};

/// Export format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Comma-separated values format.
    Csv,

    /// Compact JSON format.
    Json,

    /// Pretty-printed JSON format.
    PrettyJson,
}

impl ExportFormat {
    /// Get the file extension for this format.
    pub const fn extension(&self) -> &str {
        match self {
            Self::Csv => "csv",
            Self::Json | Self::PrettyJson => "json",
        }
    }
}

/// IC moments of one factor against one label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IcRecord {
    /// Factor name.
    pub fac: String,

    /// Label column.
    pub label: String,

    /// Mean IC.
    pub ic: Option<f64>,

    /// IC standard deviation.
    pub ic_std: Option<f64>,

    /// Information ratio.
    pub ir: Option<f64>,

    /// IC skewness.
    pub ic_skew: Option<f64>,

    /// IC excess kurtosis.
    pub ic_kurt: Option<f64>,
}

/// Trait for exporting data in various formats.
pub trait Exporter {
    /// Export data to a string in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    fn export_to_string(&self, format: ExportFormat) -> Result<String>;

    /// Export data to a file in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or file writing fails.
    fn export_to_file(&self, path: &Path, format: ExportFormat) -> Result<()> {
        let content = self.export_to_string(format)?;
        let mut file = File::create(path)?;
        file.write_all(content.as_bytes())?;
        Ok(())
    }
}

impl Exporter for Vec<IcRecord> {
    fn export_to_string(&self, format: ExportFormat) -> Result<String> {
        match format {
            ExportFormat::Csv => {
                let mut wtr = csv::Writer::from_writer(vec![]);
                for record in self {
                    wtr.serialize(record)?;
                }
                let bytes = wtr.into_inner().map_err(|e| SummaryError::Io(e.into_error()))?;
                String::from_utf8(bytes).map_err(|e| {
                    SummaryError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
                })
            }
            ExportFormat::Json => Ok(serde_json::to_string(self)?),
            ExportFormat::PrettyJson => Ok(serde_json::to_string_pretty(self)?),
        }
    }
}

fn cell(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.4}"))
}

/// Renders IC records as a fixed-width text table.
pub fn to_ascii_table(records: &[IcRecord]) -> String {
    let mut output = String::new();

    output.push_str("\nIC Summary\n");
    output.push_str(&"=".repeat(84));
    output.push('\n');
    output.push_str(&format!(
        "{:<16} {:<12} {:>10} {:>10} {:>10} {:>10} {:>10}\n",
        "Factor", "Label", "IC", "IC Std", "IR", "Skew", "Kurt"
    ));
    output.push_str(&"-".repeat(84));
    output.push('\n');

    for r in records {
        output.push_str(&format!(
            "{:<16} {:<12} {:>10} {:>10} {:>10} {:>10} {:>10}\n",
            r.fac,
            r.label,
            cell(r.ic),
            cell(r.ic_std),
            cell(r.ir),
            cell(r.ic_skew),
            cell(r.ic_kurt)
        ));
    }

    output.push_str(&"=".repeat(84));
    output.push('\n');
    output
}
