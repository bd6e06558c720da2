pub mod pt2;
pub mod raw;
pub mod timetag;

use std::path::Path;

use crate::errors::Error;
use crate::headers::FileFormat;
use crate::TimestampStream;

/// Knobs for file formats that do not carry full clock metadata.
#[derive(Debug, Copy, Clone)]
pub struct ReadOptions {
    /// Clock frequency of the FPGA timetagger in Hz. `.timetag` files do
    /// not embed it; the acquisition hardware runs at 128 MHz unless
    /// reconfigured.
    pub clockrate: f64,
    /// Seconds per tick to assign to bare `.times` files, which carry no
    /// header at all. Supply the true value of your source.
    pub raw_jiffy: f64,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            clockrate: timetag::DEFAULT_CLOCKRATE,
            raw_jiffy: 1e-9,
        }
    }
}

/// Read the timestamps of one channel out of a timestamp file.
///
/// The format is determined from the file extension. See
/// [`read_timestamps_with`] to override clock defaults.
pub fn read_timestamps(path: &Path, channel: u32) -> Result<TimestampStream, Error> {
    read_timestamps_with(path, channel, &ReadOptions::default())
}

/// Like [`read_timestamps`] but with explicit [`ReadOptions`].
pub fn read_timestamps_with(
    path: &Path,
    channel: u32,
    options: &ReadOptions,
) -> Result<TimestampStream, Error> {
    let format = FileFormat::from_path(path)?;
    if !path.exists() {
        return Err(Error::FileNotAvailable(path.display().to_string()));
    }
    match format {
        FileFormat::Pt2 => pt2::read(path, channel),
        FileFormat::Timetag => timetag::read(path, channel, options.clockrate),
        FileFormat::Raw => raw::read(path, channel, options.raw_jiffy),
    }
}
