//! Interchange codecs for the two legacy schedule formats.
//!
//! Format A ([`tabular`]) is a tab-delimited record-block file; format B
//! ([`tree`]) is a nested XML business-object document. Both parse into the
//! same [`ParsedSchedule`] and both generate from a fully identified
//! [`Schedule`](crate::model::Schedule). [`ingest`] is the upload entry
//! point: byte recovery, format detection, then the matching parser.

pub mod arena;
pub mod tabular;
pub mod tree;
pub mod xml;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::ExportConfig;
use crate::encoding;
use crate::error::{Error, Result};
use crate::model::Schedule;
use crate::{clog, clog_warn};

/// Hour count of one working day in both interchange formats.
pub const HOURS_PER_DAY: f64 = 8.0;

/// Cutoff for the ambiguous-duration heuristic: a bare duration value whose
/// magnitude exceeds this is taken to be an hour count. Hour-named fields
/// are always hours and never consult the heuristic.
pub const HOUR_HEURISTIC_THRESHOLD: f64 = 100.0;

/// The interchange format a file was recognized as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    /// Tab-delimited record blocks (format A).
    Tabular,
    /// Nested XML business objects (format B).
    Tree,
}

impl std::fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceFormat::Tabular => write!(f, "tabular"),
            SourceFormat::Tree => write!(f, "tree"),
        }
    }
}

/// Best-effort metadata derived during a parse.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseMeta {
    pub format: SourceFormat,
    pub activities: usize,
    pub wbs_nodes: usize,
    pub resources: usize,
    pub total_duration_days: f64,
}

/// The result of parsing an interchange file.
#[derive(Debug, Clone)]
pub struct ParsedSchedule {
    pub schedule: Schedule,
    pub meta: ParseMeta,
}

/// Header identity stamped into generated files.
#[derive(Debug, Clone)]
pub struct FileHeader {
    pub product: String,
    pub version: String,
    pub date: NaiveDate,
    pub project: String,
    pub organization: String,
}

impl FileHeader {
    /// Build a header from the export configuration plus the display names
    /// the caller carries for the project and owning organization.
    pub fn new(
        export: &ExportConfig,
        date: NaiveDate,
        project: impl Into<String>,
        organization: impl Into<String>,
    ) -> Self {
        Self {
            product: export.product.clone(),
            version: export.version.clone(),
            date,
            project: project.into(),
            organization: organization.into(),
        }
    }
}

/// Decide which codec a file belongs to: extension first, then a content
/// sniff for callers that upload with unhelpful names.
pub fn detect_format(filename: &str, text: &str) -> Result<SourceFormat> {
    let ext = filename
        .rsplit('.')
        .next()
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "xer" => return Ok(SourceFormat::Tabular),
        "xml" => return Ok(SourceFormat::Tree),
        _ => {}
    }

    let head = text.trim_start();
    if head.starts_with("ERMHDR") || head.starts_with("%T") {
        Ok(SourceFormat::Tabular)
    } else if head.starts_with('<') {
        Ok(SourceFormat::Tree)
    } else {
        Err(Error::UnknownFormat(filename.to_string()))
    }
}

/// Ingest an uploaded file: recover the bytes into text, detect the format,
/// and parse with the matching codec.
pub fn ingest(bytes: &[u8], filename: &str) -> Result<ParsedSchedule> {
    let text = encoding::recover(bytes, filename);
    let format = detect_format(filename, &text)?;
    let parsed = match format {
        SourceFormat::Tabular => tabular::parse(&text)?,
        SourceFormat::Tree => tree::parse(&text)?,
    };
    clog!(
        "ingested {} as {}: {} activities, {} wbs nodes, {} resources",
        filename,
        format,
        parsed.meta.activities,
        parsed.meta.wbs_nodes,
        parsed.meta.resources
    );
    Ok(parsed)
}

/// Convert an hour count from a file into days.
pub(crate) fn hours_to_days(hours: f64) -> f64 {
    hours / HOURS_PER_DAY
}

/// Interpret a bare duration value of unknown unit. Magnitudes beyond the
/// threshold read as hours, everything else as days already.
pub(crate) fn ambiguous_duration_to_days(value: f64) -> f64 {
    if value.abs() > HOUR_HEURISTIC_THRESHOLD {
        hours_to_days(value)
    } else {
        value
    }
}

/// Parse a date field from either format. Fields may carry a time-of-day
/// suffix; only the leading `YYYY-MM-DD` is significant.
pub(crate) fn parse_file_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.len() < 10 {
        return None;
    }
    match NaiveDate::parse_from_str(&value[..10], "%Y-%m-%d") {
        Ok(date) => Some(date),
        Err(_) => {
            clog_warn!("unparsable date field '{}', treating as absent", value);
            None
        }
    }
}

/// Render a date into the interchange representation.
pub(crate) fn format_file_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
