//! WARC record sanity check over member snippets.
//!
//! A correctly per-record-gzipped WARC carries one record per member, so
//! a record's declared Content-Length plus its header size must account
//! for the member's whole uncompressed size. The check works on the
//! captured snippet, so it only sees records whose header fits the
//! configured snippet width.

use std::sync::OnceLock;

use regex::Regex;

use crate::counting_decoder::GzipMember;

/// Content-Length accounting for a member that looks like a WARC record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLengthCheck {
    /// Bytes from `WARC/` through the blank line ending the header.
    pub header_size: u64,
    /// Value of the record's Content-Length field.
    pub stated_length: u64,
    /// Header + payload + the closing CRLF pair.
    pub expected_size: u64,
    /// Whether the expectation matches the member's uncompressed size.
    pub matches: bool,
}

fn warc_header_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)^WARC/.*?Content-Length: (\d+).*?\r\n\r\n").unwrap())
}

/// Inspects a member's snippet for a WARC record header and verifies the
/// declared Content-Length against the member's uncompressed size.
/// Returns `None` when the snippet does not look like a WARC record.
pub fn check_record_length(member: &GzipMember) -> Option<RecordLengthCheck> {
    let ascii = member.ascii_snippet();
    let caps = warc_header_pattern().captures(&ascii)?;
    let whole = caps.get(0)?;
    let stated_length: u64 = caps.get(1)?.as_str().parse().ok()?;
    let header_size = (whole.end() - whole.start()) as u64;
    let expected_size = header_size + stated_length + 4;
    Some(RecordLengthCheck {
        header_size,
        stated_length,
        expected_size,
        matches: expected_size == member.uncompressed_size,
    })
}

/// True only when the member is a WARC record whose declared length
/// matches its actual uncompressed size.
pub fn record_length_matches(member: &GzipMember) -> bool {
    check_record_length(member)
        .map(|check| check.matches)
        .unwrap_or(false)
}
