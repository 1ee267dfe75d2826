//! Compression-shape report and recommendations.

use std::fmt;

use crate::counting_decoder::GzipMember;
use crate::error::ProbeError;
use crate::warc::{self, RecordLengthCheck};

/// Overall compression shape of a probed input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionStatus {
    /// Not gzip at all, or no complete member.
    Uncompressed,
    /// Exactly one valid member covering the whole input.
    SingleCompressed,
    /// Two or more valid members covering the whole input.
    MultiCompressed,
    /// At least one member parsed, then a broken gzip structure.
    FaultyCompressed,
    /// Valid members followed by bytes that do not start a gzip header.
    GarbageAtEnd,
    /// A single member whose decompressed content is itself a
    /// multi-member gzip stream.
    Recompressed,
}

impl CompressionStatus {
    /// Human advice for this status, taking the filename extension into
    /// account where it matters.
    pub fn recommendation(self, filename: Option<&str>) -> String {
        let gz_name = filename
            .map(|f| f.to_lowercase().ends_with(".gz"))
            .unwrap_or(false);
        let named = filename.is_some();
        match self {
            CompressionStatus::Uncompressed => {
                if gz_name {
                    "The WARC file is uncompressed, but the filename ends with '.gz'. \
                     Remove the .gz extension or compress the WARC."
                        .to_string()
                } else {
                    "Consider compressing the WARC".to_string()
                }
            }
            CompressionStatus::SingleCompressed => {
                "The WARC file is a single gzip block, so random access will not work. \
                 Recompress the WARC to consist of independently compressed entries."
                    .to_string()
            }
            CompressionStatus::MultiCompressed => {
                if named && !gz_name {
                    "The WARC file is multi-entry compressed, but the filename does not \
                     end with '.gz'. Add the .gz extension to the filename."
                        .to_string()
                } else {
                    "Everything seems to be in order (multi-entry compressed WARC file)"
                        .to_string()
                }
            }
            CompressionStatus::FaultyCompressed => {
                if named && !gz_name {
                    "The WARC file is compressed but contains compression errors. \
                     Furthermore the filename does not have a .gz extension."
                        .to_string()
                } else {
                    "The WARC file is compressed but contains compression errors.".to_string()
                }
            }
            CompressionStatus::GarbageAtEnd => {
                if named && !gz_name {
                    "The WARC file is compressed but contains extra uncompressed content. \
                     Furthermore the filename does not have a .gz extension."
                        .to_string()
                } else {
                    "The WARC file is compressed but contains extra uncompressed content"
                        .to_string()
                }
            }
            CompressionStatus::Recompressed => {
                "The whole file is a single gzip block, but when uncompressed it contained \
                 multiple compressed blocks. Uncompress the file once and ensure the result \
                 keeps a .gz extension."
                    .to_string()
            }
        }
    }
}

impl fmt::Display for CompressionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CompressionStatus::Uncompressed => "uncompressed",
            CompressionStatus::SingleCompressed => "single-compressed",
            CompressionStatus::MultiCompressed => "multi-compressed",
            CompressionStatus::FaultyCompressed => "faulty-compressed",
            CompressionStatus::GarbageAtEnd => "garbage-at-end",
            CompressionStatus::Recompressed => "recompressed",
        })
    }
}

/// Outcome of probing one input. Immutable once built; the members are
/// owned by the report.
#[derive(Debug)]
pub struct Report {
    filename: Option<String>,
    status: CompressionStatus,
    members: Vec<GzipMember>,
    error: Option<ProbeError>,
}

impl Report {
    pub fn new(
        filename: Option<String>,
        status: CompressionStatus,
        members: Vec<GzipMember>,
        error: Option<ProbeError>,
    ) -> Self {
        Report {
            filename,
            status,
            members,
            error,
        }
    }

    pub fn status(&self) -> CompressionStatus {
        self.status
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    pub fn members(&self) -> &[GzipMember] {
        &self.members
    }

    pub fn into_members(self) -> Vec<GzipMember> {
        self.members
    }

    pub fn error(&self) -> Option<&ProbeError> {
        self.error.as_ref()
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Input bytes covered by fully-validated members.
    pub fn total_compressed_size(&self) -> u64 {
        self.members.iter().map(|m| m.compressed_size).sum()
    }

    /// Sum of every member's uncompressed size.
    pub fn total_uncompressed_size(&self) -> u64 {
        self.members.iter().map(|m| m.uncompressed_size).sum()
    }

    /// The historical figure: last member offset plus its uncompressed
    /// size. It mixes compressed offsets with uncompressed lengths and
    /// is kept only so callers can compare against older tooling.
    pub fn offset_based_uncompressed_size(&self) -> u64 {
        match self.members.last() {
            Some(last) => last.offset + last.uncompressed_size,
            None => 0,
        }
    }

    pub fn recommendation(&self) -> String {
        self.status.recommendation(self.filename.as_deref())
    }

    /// Per-member WARC record-length verification; `None` for members
    /// whose snippet does not look like a WARC record.
    pub fn record_length_checks(&self) -> Vec<Option<RecordLengthCheck>> {
        self.members.iter().map(warc::check_record_length).collect()
    }

    /// Multi-line rendering: summary, advice and per-member entries.
    /// With `snippets`, each entry line carries its escaped content
    /// snippet.
    pub fn render(&self, snippets: bool) -> String {
        let mut out = self.to_string();
        out.push('\n');
        out.push_str("Advice: ");
        out.push_str(&self.recommendation());
        out.push('\n');
        if !self.members.is_empty() {
            out.push_str("\nAll entries:");
            for member in &self.members {
                out.push('\n');
                out.push_str(&member.to_string());
                if snippets {
                    out.push_str(" snippet=");
                    out.push_str(&member.escaped_snippet());
                    if let Some(check) = warc::check_record_length(member) {
                        out.push_str(if check.matches {
                            " warc-record=length-ok"
                        } else {
                            " warc-record=length-mismatch"
                        });
                    }
                }
            }
        }
        out
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let exception = match &self.error {
            Some(e) => e.to_string(),
            None => "none".to_string(),
        };
        write!(
            f,
            "GzipReport(status={}, #entries={}, compressed={} bytes, uncompressed={} bytes, exception={})",
            self.status,
            self.members.len(),
            self.total_compressed_size(),
            self.total_uncompressed_size(),
            exception
        )
    }
}
