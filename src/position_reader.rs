//! Byte-exact position tracking over any reader.
//!
//! The counting decoder needs the absolute byte offset of every gzip
//! member boundary, and needs to rewind the over-read left behind by the
//! raw inflater after each member. `Read` has no mark/reset, so this
//! wrapper carries its own bounded replay buffer.

use std::io::{self, Read};

use crate::error::{ProbeError, ProbeResult};

/// Reader wrapper that counts delivered bytes and supports mark/reset
/// within a bounded window.
pub struct PositionReader<R: Read> {
    inner: R,
    position: u64,
    mark: Option<Mark>,
}

struct Mark {
    /// Absolute position when the mark was taken.
    position: u64,
    /// Bytes the mark must survive; exceeding it invalidates the mark.
    readlimit: usize,
    /// Bytes delivered since the mark, in order.
    buffer: Vec<u8>,
    /// Delivery cursor into `buffer`. `replay < buffer.len()` means the
    /// next reads are served from the buffer.
    replay: usize,
}

impl<R: Read> PositionReader<R> {
    pub fn new(inner: R) -> Self {
        PositionReader {
            inner,
            position: 0,
            mark: None,
        }
    }

    /// Count of bytes delivered (or skipped) so far. End of input does
    /// not advance this.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Records the current position. Bytes read from here on are kept
    /// for replay until `readlimit` is exceeded. An un-replayed tail
    /// from a previous mark stays readable under the new mark.
    pub fn mark(&mut self, readlimit: usize) {
        let pending = match self.mark.take() {
            Some(m) if m.replay < m.buffer.len() => m.buffer[m.replay..].to_vec(),
            _ => Vec::new(),
        };
        self.mark = Some(Mark {
            position: self.position,
            readlimit,
            buffer: pending,
            replay: 0,
        });
    }

    /// Rewinds delivery to the most recent mark.
    pub fn reset(&mut self) -> ProbeResult<()> {
        match self.mark.as_mut() {
            Some(m) => {
                self.position = m.position;
                m.replay = 0;
                Ok(())
            }
            None => Err(ProbeError::ResetUnsupported),
        }
    }

    /// Discards up to `n` bytes and returns the amount actually skipped
    /// (less only at end of input).
    pub fn skip(&mut self, n: u64) -> ProbeResult<u64> {
        let mut scratch = [0u8; 512];
        let mut skipped = 0u64;
        while skipped < n {
            let want = ((n - skipped) as usize).min(scratch.len());
            let got = self.read(&mut scratch[..want])?;
            if got == 0 {
                break;
            }
            skipped += got as u64;
        }
        Ok(skipped)
    }
}

impl<R: Read> Read for PositionReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        // Serve the replay tail before touching the inner source.
        if let Some(m) = self.mark.as_mut() {
            if m.replay < m.buffer.len() {
                let n = (m.buffer.len() - m.replay).min(buf.len());
                buf[..n].copy_from_slice(&m.buffer[m.replay..m.replay + n]);
                m.replay += n;
                self.position += n as u64;
                return Ok(n);
            }
        }

        let n = self.inner.read(buf)?;
        if n > 0 {
            self.position += n as u64;
            let mut overrun = false;
            if let Some(m) = self.mark.as_mut() {
                m.buffer.extend_from_slice(&buf[..n]);
                m.replay = m.buffer.len();
                overrun = m.buffer.len() > m.readlimit;
            }
            if overrun {
                self.mark = None;
            }
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_position_across_reads() {
        let mut reader = PositionReader::new(&b"abcdef"[..]);
        let mut buf = [0u8; 4];
        assert_eq!(reader.read(&mut buf).unwrap(), 4);
        assert_eq!(reader.position(), 4);
        assert_eq!(reader.read(&mut buf).unwrap(), 2);
        assert_eq!(reader.position(), 6);
        // End of input does not advance the position.
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
        assert_eq!(reader.position(), 6);
    }

    #[test]
    fn mark_and_reset_restore_position_and_bytes() {
        let mut reader = PositionReader::new(&b"0123456789"[..]);
        let mut buf = [0u8; 3];
        reader.read(&mut buf).unwrap();
        reader.mark(8);
        reader.read(&mut buf).unwrap();
        assert_eq!(&buf, b"345");
        assert_eq!(reader.position(), 6);

        reader.reset().unwrap();
        assert_eq!(reader.position(), 3);
        reader.read(&mut buf).unwrap();
        assert_eq!(&buf, b"345");
        assert_eq!(reader.position(), 6);
    }

    #[test]
    fn reset_without_mark_is_rejected() {
        let mut reader = PositionReader::new(&b"abc"[..]);
        assert!(matches!(reader.reset(), Err(ProbeError::ResetUnsupported)));
    }

    #[test]
    fn reset_after_exceeding_readlimit_is_rejected() {
        let mut reader = PositionReader::new(&b"0123456789"[..]);
        reader.mark(2);
        let mut buf = [0u8; 5];
        reader.read(&mut buf).unwrap();
        assert!(matches!(reader.reset(), Err(ProbeError::ResetUnsupported)));
    }

    #[test]
    fn skip_advances_position() {
        let mut reader = PositionReader::new(&b"0123456789"[..]);
        assert_eq!(reader.skip(4).unwrap(), 4);
        assert_eq!(reader.position(), 4);

        let mut buf = [0u8; 1];
        reader.read(&mut buf).unwrap();
        assert_eq!(&buf, b"4");

        assert_eq!(reader.skip(100).unwrap(), 5);
        assert_eq!(reader.position(), 10);
    }

    #[test]
    fn skip_within_replayed_bytes() {
        let mut reader = PositionReader::new(&b"0123456789"[..]);
        reader.mark(8);
        let mut buf = [0u8; 6];
        reader.read(&mut buf).unwrap();
        reader.reset().unwrap();
        assert_eq!(reader.skip(2).unwrap(), 2);
        let mut one = [0u8; 1];
        reader.read(&mut one).unwrap();
        assert_eq!(&one, b"2");
        assert_eq!(reader.position(), 3);
    }

    #[test]
    fn mark_carries_unreplayed_tail() {
        let mut reader = PositionReader::new(&b"abcdefgh"[..]);
        reader.mark(8);
        let mut buf = [0u8; 4];
        reader.read(&mut buf).unwrap();
        reader.reset().unwrap();

        let mut one = [0u8; 1];
        reader.read(&mut one).unwrap();
        assert_eq!(&one, b"a");

        // The un-replayed bytes bcd stay readable under the new mark.
        reader.mark(8);
        reader.read(&mut buf[..3]).unwrap();
        assert_eq!(&buf[..3], b"bcd");
        reader.reset().unwrap();
        assert_eq!(reader.position(), 1);
        reader.read(&mut buf[..3]).unwrap();
        assert_eq!(&buf[..3], b"bcd");
    }
}
