//! Counting, member-aware gzip decoder.
//!
//! `flate2::read::GzDecoder` stops after the first member and
//! `MultiGzDecoder` hides member boundaries entirely; neither reports
//! the byte offsets this tool exists to recover. This module therefore
//! decodes the .gz container format itself (RFC 1952) and delegates only
//! the DEFLATE payload to a raw `flate2::Decompress`.
//!
//! The input buffer is deliberately tiny. The inflater buffers input
//! greedily, so when it reports stream end the reader is rewound
//! (mark/reset) and stepped forward by exactly the bytes the inflater
//! consumed, landing on the first trailer byte. A small buffer keeps
//! that rewind, and with it every recovered member offset, exact.

use std::fmt;
use std::io::{self, Read};

use flate2::{Decompress, FlushDecompress, Status};

use crate::error::{ProbeError, ProbeResult};
use crate::position_reader::PositionReader;

// Header flag bits, RFC 1952 section 2.3.1.
const FHCRC: u8 = 0x02;
const FEXTRA: u8 = 0x04;
const FNAME: u8 = 0x08;
const FCOMMENT: u8 = 0x10;
const FRESERVED: u8 = 0xe0;

/// DEFLATE is the only compression method RFC 1952 defines.
const CM_DEFLATE: u8 = 8;

/// Input buffer size. Larger buffers make the mark/reset rewind at each
/// member boundary coarser, not faster.
const INPUT_BUF_SIZE: usize = 100;

/// Leading decompressed bytes captured per member.
pub const DEFAULT_SNIPPET_SIZE: usize = 30;

/// True if `data` starts with the gzip magic bytes.
pub fn is_gzip_magic(data: &[u8]) -> bool {
    data.len() >= 2 && data[0] == 0x1f && data[1] == 0x8b
}

/// One self-contained gzip member: header + DEFLATE payload + trailer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GzipMember {
    /// Dense 0-based index within the input.
    pub id: u64,
    /// Byte offset of the member's magic bytes in the input.
    pub offset: u64,
    /// Header + payload + trailer, in input bytes.
    pub compressed_size: u64,
    /// ISIZE from the trailer, verified against the inflater output.
    pub uncompressed_size: u64,
    /// Leading decompressed bytes, verbatim.
    pub snippet: Vec<u8>,
}

impl GzipMember {
    /// Snippet restricted to ASCII (bytes 1-127); everything else is
    /// dropped.
    pub fn ascii_snippet(&self) -> String {
        self.snippet
            .iter()
            .filter(|&&b| (1..=127).contains(&b))
            .map(|&b| b as char)
            .collect()
    }

    /// Snippet with control and non-ASCII bytes escaped.
    pub fn escaped_snippet(&self) -> String {
        let mut out = String::with_capacity(self.snippet.len() * 3);
        for &b in &self.snippet {
            match b {
                b'\n' => out.push_str("\\n"),
                b'\r' => out.push_str("\\r"),
                b'\t' => out.push_str("\\t"),
                0x20..=0x7f => out.push(b as char),
                _ => {
                    out.push_str(&format!("\\x{:02X}", b));
                }
            }
        }
        out
    }
}

impl fmt::Display for GzipMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Entry #{}: source({}->{}), compressed={} bytes, uncompressed={} bytes",
            self.id,
            self.offset,
            self.offset + self.compressed_size,
            self.compressed_size,
            self.uncompressed_size
        )
    }
}

/// Compression level hint from the XFL header byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelHint {
    BestCompression,
    BestSpeed,
}

/// Metadata parsed from a member's header. Refreshed for each member
/// when decoding concatenated input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GzipHeaderMeta {
    pub mtime: u32,
    pub os: u8,
    pub level_hint: Option<LevelHint>,
    pub filename: Option<String>,
    pub comment: Option<String>,
}

/// Decoder for possibly-concatenated gzip input that records the byte
/// offset, compressed/uncompressed size and a content snippet of every
/// member it walks.
///
/// With `concatenated = false` decoding stops after the first member's
/// trailer, leaving the reader positioned exactly on the byte after it.
pub struct CountingGzDecoder<R: Read> {
    reader: PositionReader<R>,
    concatenated: bool,
    inflater: Decompress,
    crc: crc32fast::Hasher,
    buf: [u8; INPUT_BUF_SIZE],
    buf_used: usize,
    buf_pos: usize,
    members: Vec<GzipMember>,
    header_meta: GzipHeaderMeta,
    current_id: i64,
    current_origin: u64,
    snippet: Vec<u8>,
    snippet_size: usize,
    started: bool,
    end_reached: bool,
    closed: bool,
}

impl<R: Read> CountingGzDecoder<R> {
    pub fn new(inner: R, concatenated: bool) -> Self {
        Self::with_snippet_size(inner, concatenated, DEFAULT_SNIPPET_SIZE)
    }

    pub fn with_snippet_size(inner: R, concatenated: bool, snippet_size: usize) -> Self {
        CountingGzDecoder {
            reader: PositionReader::new(inner),
            concatenated,
            inflater: Decompress::new(false),
            crc: crc32fast::Hasher::new(),
            buf: [0; INPUT_BUF_SIZE],
            buf_used: 0,
            buf_pos: 0,
            members: Vec::new(),
            header_meta: GzipHeaderMeta::default(),
            current_id: -1,
            current_origin: 0,
            snippet: Vec::with_capacity(snippet_size),
            snippet_size,
            started: false,
            end_reached: false,
            closed: false,
        }
    }

    /// Members recovered so far, in input order. A member is recorded
    /// only once its trailer has validated.
    pub fn members(&self) -> &[GzipMember] {
        &self.members
    }

    /// Relinquishes the member list.
    pub fn into_members(self) -> Vec<GzipMember> {
        self.members
    }

    /// Header metadata of the most recently parsed member.
    pub fn header_meta(&self) -> &GzipHeaderMeta {
        &self.header_meta
    }

    /// Input bytes covered by fully-validated members.
    pub fn total_compressed_size(&self) -> u64 {
        self.members.iter().map(|m| m.compressed_size).sum()
    }

    /// Sum of every recorded member's uncompressed size.
    pub fn total_uncompressed_size(&self) -> u64 {
        self.members.iter().map(|m| m.uncompressed_size).sum()
    }

    /// Bytes consumed from the underlying source so far.
    pub fn compressed_position(&self) -> u64 {
        self.reader.position()
    }

    /// Reads and discards decompressed output until end of stream, then
    /// closes. Returns the number of uncompressed bytes delivered.
    pub fn drain(&mut self) -> ProbeResult<u64> {
        let mut scratch = [0u8; 1000];
        let mut total = 0u64;
        loop {
            match self.read_decompressed(&mut scratch) {
                Ok(0) => break,
                Ok(n) => total += n as u64,
                Err(e) => {
                    self.close();
                    return Err(e);
                }
            }
        }
        self.close();
        Ok(total)
    }

    /// Stops decoding. Idempotent; the inflater state is released when
    /// the decoder is dropped.
    pub fn close(&mut self) {
        self.end_reached = true;
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Parses the next member header. Returns false on clean end of
    /// input: after at least one member in concatenated mode, or when
    /// the input is entirely empty.
    fn begin_member(&mut self, first: bool) -> ProbeResult<bool> {
        self.current_id += 1;
        self.current_origin = self.reader.position();
        self.snippet.clear();

        let magic0 = match self.read_byte()? {
            Some(b) => b,
            None => return Ok(false),
        };
        if magic0 != 0x1f || self.read_byte()? != Some(0x8b) {
            return Err(if first {
                ProbeError::NotGzip
            } else {
                ProbeError::GarbageAfterValidStream
            });
        }

        let method = self.require_byte()?;
        if method != CM_DEFLATE {
            return Err(ProbeError::UnsupportedMethod(method));
        }

        let flags = self.require_byte()?;
        if flags & FRESERVED != 0 {
            return Err(ProbeError::ReservedFlags(flags));
        }

        let mut meta = GzipHeaderMeta {
            mtime: self.require_le_u32()?,
            ..GzipHeaderMeta::default()
        };
        meta.level_hint = match self.require_byte()? {
            2 => Some(LevelHint::BestCompression),
            4 => Some(LevelHint::BestSpeed),
            _ => None,
        };
        meta.os = self.require_byte()?;

        if flags & FEXTRA != 0 {
            let xlen = self.require_le_u16()?;
            for _ in 0..xlen {
                self.require_byte()?;
            }
        }
        if flags & FNAME != 0 {
            meta.filename = Some(self.read_latin1_until_nul()?);
        }
        if flags & FCOMMENT != 0 {
            meta.comment = Some(self.read_latin1_until_nul()?);
        }
        if flags & FHCRC != 0 {
            // Truncated CRC32 over the header. Producers rarely emit it;
            // recorded as skipped, not verified.
            self.require_le_u16()?;
        }

        self.header_meta = meta;
        self.inflater.reset(false);
        self.crc = crc32fast::Hasher::new();
        self.buf_used = 0;
        self.buf_pos = 0;
        self.started = true;
        Ok(true)
    }

    /// Re-positions the reader onto the trailer, validates CRC32 and
    /// ISIZE, and records the member.
    fn finish_member(&mut self) -> ProbeResult<()> {
        // The inflater over-read into `buf`. Rewind to the last mark,
        // then step forward by exactly the bytes it consumed from this
        // fill, landing on the first trailer byte.
        self.reader.reset()?;
        let consumed = self.buf_pos as u64;
        if self.reader.skip(consumed)? != consumed {
            return Err(ProbeError::TruncatedMember);
        }
        self.buf_used = 0;
        self.buf_pos = 0;

        let stored_crc = self.require_le_u32()?;
        let computed = self.crc.clone().finalize();
        if stored_crc != computed {
            return Err(ProbeError::CorruptCrc {
                stored: stored_crc,
                computed,
            });
        }

        let stored_isize = self.require_le_u32()?;
        let actual = (self.inflater.total_out() & 0xffff_ffff) as u32;
        if stored_isize != actual {
            return Err(ProbeError::CorruptIsize {
                stored: stored_isize,
                actual,
            });
        }

        self.members.push(GzipMember {
            id: self.current_id as u64,
            offset: self.current_origin,
            compressed_size: self.reader.position() - self.current_origin,
            uncompressed_size: stored_isize as u64,
            snippet: self.snippet.clone(),
        });
        Ok(())
    }

    fn read_decompressed(&mut self, dst: &mut [u8]) -> ProbeResult<usize> {
        if dst.is_empty() || self.end_reached {
            return Ok(0);
        }
        if !self.started && !self.begin_member(true)? {
            // Entirely empty input: no members, clean end.
            self.end_reached = true;
            return Ok(0);
        }

        let mut written = 0usize;
        let mut off = 0usize;

        while off < dst.len() {
            if self.buf_pos == self.buf_used {
                // Remember this spot: when the inflater reports stream
                // end the trailer bytes it over-consumed are recovered
                // by rewinding to here.
                self.reader.mark(INPUT_BUF_SIZE);
                self.buf_used = match self.reader.read(&mut self.buf) {
                    Ok(n) => n,
                    Err(e) => return Err(ProbeError::Io(e)),
                };
                self.buf_pos = 0;
                if self.buf_used == 0 {
                    return Err(ProbeError::TruncatedMember);
                }
            }

            let before_in = self.inflater.total_in();
            let before_out = self.inflater.total_out();
            let status = self
                .inflater
                .decompress(
                    &self.buf[self.buf_pos..self.buf_used],
                    &mut dst[off..],
                    FlushDecompress::None,
                )
                .map_err(ProbeError::deflate)?;
            let consumed = (self.inflater.total_in() - before_in) as usize;
            let produced = (self.inflater.total_out() - before_out) as usize;
            self.buf_pos += consumed;

            if produced > 0 {
                let out = &dst[off..off + produced];
                if self.snippet.len() < self.snippet_size {
                    let take = (self.snippet_size - self.snippet.len()).min(produced);
                    self.snippet.extend_from_slice(&out[..take]);
                }
                self.crc.update(out);
                off += produced;
                written += produced;
            }

            match status {
                Status::StreamEnd => {
                    self.finish_member()?;
                    if !self.concatenated || !self.begin_member(false)? {
                        self.end_reached = true;
                        break;
                    }
                }
                Status::Ok => {}
                Status::BufError if self.buf_pos == self.buf_used => {
                    // Needs more input; the next pass refills.
                }
                Status::BufError => {
                    return Err(ProbeError::deflate("inflater made no progress"));
                }
            }
        }
        Ok(written)
    }

    fn read_byte(&mut self) -> ProbeResult<Option<u8>> {
        let mut one = [0u8; 1];
        loop {
            match self.reader.read(&mut one) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(one[0])),
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(ProbeError::Io(e)),
            }
        }
    }

    fn require_byte(&mut self) -> ProbeResult<u8> {
        self.read_byte()?.ok_or(ProbeError::TruncatedMember)
    }

    fn require_le_u16(&mut self) -> ProbeResult<u16> {
        let lo = self.require_byte()? as u16;
        let hi = self.require_byte()? as u16;
        Ok(lo | hi << 8)
    }

    fn require_le_u32(&mut self) -> ProbeResult<u32> {
        let mut value = 0u32;
        for shift in [0u32, 8, 16, 24] {
            value |= (self.require_byte()? as u32) << shift;
        }
        Ok(value)
    }

    fn read_latin1_until_nul(&mut self) -> ProbeResult<String> {
        let mut out = String::new();
        loop {
            let b = self.require_byte()?;
            if b == 0 {
                return Ok(out);
            }
            out.push(b as char);
        }
    }
}

impl<R: Read> Read for CountingGzDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_decompressed(buf)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }
}
