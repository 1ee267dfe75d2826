use std::fmt;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Walk error: {0}")]
    WalkDir(#[from] walkdir::Error),

    #[error("Input is not in the .gz format")]
    NotGzip,

    #[error("Garbage after a valid .gz stream")]
    GarbageAfterValidStream,

    #[error("Unsupported compression method {0} in the .gz header")]
    UnsupportedMethod(u8),

    #[error("Reserved flags are set in the .gz header (FLG={0:#04x})")]
    ReservedFlags(u8),

    #[error("Unexpected end of input inside a .gz member")]
    TruncatedMember,

    #[error("Gzip-compressed data is corrupt (CRC32 stored {stored:#010x}, computed {computed:#010x})")]
    CorruptCrc { stored: u32, computed: u32 },

    #[error("Gzip-compressed data is corrupt (uncompressed size stored {stored}, actual {actual})")]
    CorruptIsize { stored: u32, actual: u32 },

    #[error("Gzip-compressed data is corrupt: {0}")]
    Deflate(String),

    #[error("Reset is not possible: no mark, or the read limit was exceeded")]
    ResetUnsupported,
}

impl ProbeError {
    pub fn deflate<T: fmt::Display>(msg: T) -> Self {
        ProbeError::Deflate(msg.to_string())
    }

    pub fn invalid_argument<T: fmt::Display>(msg: T) -> Self {
        ProbeError::InvalidArgument(msg.to_string())
    }

    /// True for failures of the gzip structure itself, as opposed to
    /// failures of the underlying byte source or the invocation.
    pub fn is_structural(&self) -> bool {
        !matches!(
            self,
            ProbeError::Io(_)
                | ProbeError::WalkDir(_)
                | ProbeError::FileNotFound(_)
                | ProbeError::InvalidArgument(_)
        )
    }
}

pub type ProbeResult<T> = Result<T, ProbeError>;
