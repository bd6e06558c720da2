use std::io;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    #[error("File {0} does not exist.")]
    FileNotAvailable(String),
    #[error("IO error.")]
    IOError(#[from] io::Error),
    #[error("Unrecognized file type: {0}")]
    UnrecognizedFileType(String),
    #[error("{0}")]
    InvalidHeader(String),
    #[error("Found {0} non-monotonic timestamp pairs.")]
    NonMonotonic(usize),
    #[error("Found {0} anomalously large gaps.")]
    Discontinuity(usize),
    #[error("Too few events to correlate.")]
    InsufficientData,
    #[error("Channel {channel} is not available; this format has channels 0..={max}.")]
    ChannelRange { channel: u32, max: u32 },
    #[error("Streams use different clocks ({a} s/tick vs {b} s/tick).")]
    MismatchedClocks { a: f64, b: f64 },
    #[error("{0}")]
    InvalidParameter(String),
}
