//! Two-pass compression analysis.
//!
//! Pass one walks the raw file with the counting decoder. When that
//! pass sees exactly one member, pass two unwraps the file once with a
//! standard gzip decoder and walks the output again; that is the only
//! way to spot a correctly per-record-compressed WARC that some tool
//! gzipped a second time.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use flate2::read::GzDecoder;
use memmap2::Mmap;

use crate::counting_decoder::{CountingGzDecoder, DEFAULT_SNIPPET_SIZE};
use crate::error::{ProbeError, ProbeResult};
use crate::report::{CompressionStatus, Report};

/// Probes `path` and reports its compression layout.
pub fn analyze(path: &Path) -> ProbeResult<Report> {
    analyze_with_snippet_size(path, DEFAULT_SNIPPET_SIZE)
}

pub fn analyze_with_snippet_size(path: &Path, snippet_size: usize) -> ProbeResult<Report> {
    if !path.exists() {
        return Err(ProbeError::FileNotFound(path.display().to_string()));
    }
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.to_string());

    let file = File::open(path)?;
    let report = analyze_stream(filename.clone(), file, snippet_size)?;

    // A single well-formed member may itself hold a concatenated gzip
    // stream. Unwrap once and walk the payload. The two file handles are
    // sequential, never open at the same time.
    if report.status() == CompressionStatus::SingleCompressed {
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };
        let inner = analyze_stream(filename.clone(), GzDecoder::new(&mmap[..]), snippet_size)?;
        if inner.status() == CompressionStatus::MultiCompressed {
            return Ok(Report::new(
                filename,
                CompressionStatus::Recompressed,
                inner.into_members(),
                None,
            ));
        }
    }
    Ok(report)
}

/// Walks every member of `input` and classifies the outcome. Structural
/// gzip failures are folded into the report; I/O failures propagate.
pub fn analyze_stream<R: Read>(
    filename: Option<String>,
    input: R,
    snippet_size: usize,
) -> ProbeResult<Report> {
    let mut decoder = CountingGzDecoder::with_snippet_size(input, true, snippet_size);
    match decoder.drain() {
        Ok(_) => {
            let members = decoder.into_members();
            let status = match members.len() {
                0 => CompressionStatus::Uncompressed,
                1 => CompressionStatus::SingleCompressed,
                _ => CompressionStatus::MultiCompressed,
            };
            Ok(Report::new(filename, status, members, None))
        }
        Err(err @ ProbeError::NotGzip) => Ok(Report::new(
            filename,
            CompressionStatus::Uncompressed,
            Vec::new(),
            Some(err),
        )),
        Err(err @ ProbeError::GarbageAfterValidStream) => Ok(Report::new(
            filename,
            CompressionStatus::GarbageAtEnd,
            decoder.into_members(),
            Some(err),
        )),
        Err(err) if err.is_structural() => Ok(Report::new(
            filename,
            CompressionStatus::FaultyCompressed,
            decoder.into_members(),
            Some(err),
        )),
        // Real I/O failures are the caller's problem, not a verdict
        // about the file.
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::fs;
    use std::io::Write;
    use std::path::PathBuf;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn multi_member_fixture() -> Vec<u8> {
        let mut file = Vec::new();
        for block in [
            "Compressed content block 1 alabast\n",
            "Compressed content block 2 bentonite\n",
            "Compressed content block 3 circumference\n",
            "Compressed content block 4 delta\n",
        ] {
            file.extend_from_slice(&gzip(block.as_bytes()));
        }
        file
    }

    struct Fixture {
        path: PathBuf,
    }

    impl Fixture {
        fn new(name: &str, bytes: &[u8]) -> Self {
            let path = std::env::temp_dir().join(format!(
                "gzprobe_{}_{}",
                name,
                std::process::id()
            ));
            fs::write(&path, bytes).unwrap();
            Fixture { path }
        }
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            let _ = fs::remove_file(&self.path);
        }
    }

    #[test]
    fn uncompressed_text() {
        let fixture = Fixture::new("uncompressed.txt", b"Uncompressed content\n");
        let report = analyze(&fixture.path).unwrap();
        assert_eq!(report.status(), CompressionStatus::Uncompressed);
        assert_eq!(report.member_count(), 0);
        assert!(report.error().is_some());
    }

    #[test]
    fn single_compressed() {
        let fixture = Fixture::new("compressed.txt.gz", &gzip(b"Compressed content\n"));
        let report = analyze(&fixture.path).unwrap();
        assert_eq!(report.status(), CompressionStatus::SingleCompressed);
        assert_eq!(report.member_count(), 1);
        assert_eq!(report.members()[0].uncompressed_size, 19);
        assert!(report.error().is_none());
    }

    #[test]
    fn multi_compressed() {
        let fixture = Fixture::new("compressed_multi.txt.gz", &multi_member_fixture());
        let report = analyze(&fixture.path).unwrap();
        assert_eq!(report.status(), CompressionStatus::MultiCompressed);
        assert_eq!(report.member_count(), 4);

        let members = report.members();
        for i in 1..members.len() {
            assert!(members[i].offset > members[i - 1].offset);
            assert_eq!(
                members[i].offset,
                members[i - 1].offset + members[i - 1].compressed_size
            );
        }
    }

    #[test]
    fn garbage_after_first_member() {
        let mut bytes = gzip(b"Compressed content block 1 alabast\n");
        bytes.extend_from_slice(b"Uncompressed content\n");
        bytes.extend_from_slice(&gzip(b"Compressed content block 2 bentonite\n"));
        let fixture = Fixture::new("partial_first.txt.gz", &bytes);

        let report = analyze(&fixture.path).unwrap();
        assert_eq!(report.status(), CompressionStatus::GarbageAtEnd);
        assert_eq!(report.member_count(), 1);
        assert!(matches!(
            report.error(),
            Some(ProbeError::GarbageAfterValidStream)
        ));
    }

    #[test]
    fn leading_garbage_is_uncompressed() {
        let mut bytes = b"Uncompressed content\n".to_vec();
        bytes.extend_from_slice(&gzip(b"Compressed content block 1 alabast\n"));
        let fixture = Fixture::new("partial_second.txt.gz", &bytes);

        let report = analyze(&fixture.path).unwrap();
        assert_eq!(report.status(), CompressionStatus::Uncompressed);
        assert_eq!(report.member_count(), 0);
    }

    #[test]
    fn recompressed_multi_member() {
        let rewrapped = gzip(&multi_member_fixture());
        let fixture = Fixture::new("recompressed_compressed_multi.txt.gz.gz", &rewrapped);

        let report = analyze(&fixture.path).unwrap();
        assert_eq!(report.status(), CompressionStatus::Recompressed);
        // The members describe what one unwrap would expose.
        assert_eq!(report.member_count(), 4);
        assert_eq!(
            report.members()[0].snippet,
            b"Compressed content block 1 ala"
        );
    }

    #[test]
    fn single_member_is_not_upgraded_without_inner_members() {
        let fixture = Fixture::new("plain_single.gz", &gzip(b"just text, not gzip inside"));
        let report = analyze(&fixture.path).unwrap();
        assert_eq!(report.status(), CompressionStatus::SingleCompressed);
    }

    #[test]
    fn empty_file() {
        let fixture = Fixture::new("empty", b"");
        let report = analyze(&fixture.path).unwrap();
        assert_eq!(report.status(), CompressionStatus::Uncompressed);
        assert_eq!(report.member_count(), 0);
        assert!(report.error().is_none());
    }

    #[test]
    fn lone_magic_byte() {
        let fixture = Fixture::new("lone_magic", &[0x1f]);
        let report = analyze(&fixture.path).unwrap();
        assert_eq!(report.status(), CompressionStatus::Uncompressed);
        assert_eq!(report.member_count(), 0);
    }

    #[test]
    fn truncated_trailer_is_faulty() {
        let file = gzip(b"Compressed content\n");
        let fixture = Fixture::new("truncated.gz", &file[..file.len() - 1]);

        let report = analyze(&fixture.path).unwrap();
        assert_eq!(report.status(), CompressionStatus::FaultyCompressed);
        assert_eq!(report.member_count(), 0);
        assert!(matches!(report.error(), Some(ProbeError::TruncatedMember)));
    }

    #[test]
    fn missing_file_is_an_error() {
        let path = std::env::temp_dir().join("gzprobe_does_not_exist");
        assert!(matches!(
            analyze(&path),
            Err(ProbeError::FileNotFound(_))
        ));
    }

    #[test]
    fn analysis_is_deterministic() {
        let fixture = Fixture::new("deterministic.gz", &multi_member_fixture());
        let first = analyze(&fixture.path).unwrap();
        let second = analyze(&fixture.path).unwrap();

        assert_eq!(first.status(), second.status());
        assert_eq!(first.member_count(), second.member_count());
        assert_eq!(first.members(), second.members());
        assert_eq!(
            first.total_compressed_size(),
            second.total_compressed_size()
        );
        assert_eq!(
            first.total_uncompressed_size(),
            second.total_uncompressed_size()
        );
    }
}
