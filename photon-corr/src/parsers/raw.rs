//! Bare timestamp (`.times`) decoder: a headerless array of
//! little-endian u64 ticks. Since there is no metadata the caller must
//! supply the clock period, and only channel 0 exists.

use std::fs;
use std::io::{self, BufReader};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::errors::Error;
use crate::TimestampStream;

/// Read a `.times` file, interpreting ticks as `jiffy` seconds each.
pub fn read(path: &Path, channel: u32, jiffy: f64) -> Result<TimestampStream, Error> {
    if channel != 0 {
        return Err(Error::ChannelRange { channel, max: 0 });
    }

    let mut reader = BufReader::new(fs::File::open(path)?);
    let mut times: Vec<u64> = Vec::new();
    loop {
        match reader.read_u64::<LittleEndian>() {
            Ok(t) => times.push(t),
            Err(ref err) if err.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(err) => return Err(err.into()),
        }
    }
    log::info!("{}: {} events", path.display(), times.len());

    Ok(TimestampStream::new(times, jiffy, channel))
}
