//! FPGA timetagger (`.timetag`) strobe-event decoder.
//!
//! Records are 48 bits, big endian:
//!
//! ```text
//! bit 47     record type (0 = strobe, 1 = delta)
//! bit 46     wraparound flag
//! bit 45     lost-sample flag
//! bits 39:36 strobe channel bitmask
//! bits 35:0  time tag
//! ```
//!
//! Only strobe records carry photon arrivals; delta records track the
//! output channels and are skipped. The 36 bit counter wraps every
//! 2^36 ticks and sets the wraparound flag on the first record after
//! the wrap.

use std::fs;
use std::io::{self, BufReader};
use std::path::Path;

use byteorder::{BigEndian, ReadBytesExt};

use crate::errors::Error;
use crate::TimestampStream;

/// Clock frequency of the timetagger, in Hz. The file itself carries no
/// clock metadata.
pub const DEFAULT_CLOCKRATE: f64 = 128e6;

/// The acquisition pipeline emits garbage strobe events while the
/// detector front-end settles; the first 1024 events are dropped.
pub const STROBE_SKIP: usize = 1024;

const TIME_BITS: u32 = 36;
const WRAP_PERIOD: u64 = 1 << TIME_BITS;
const MAX_CHANNEL: u32 = 3;

/// Read the strobe timestamps of `channel` (0..=3) from a `.timetag`
/// file, with the timetagger clock running at `clockrate` Hz.
pub fn read(path: &Path, channel: u32, clockrate: f64) -> Result<TimestampStream, Error> {
    if channel > MAX_CHANNEL {
        return Err(Error::ChannelRange {
            channel,
            max: MAX_CHANNEL,
        });
    }
    let mask: u64 = 1 << channel;

    let mut reader = BufReader::new(fs::File::open(path)?);
    let mut all: Vec<u64> = Vec::new();
    let mut overflow_correction: u64 = 0;
    let mut lost: usize = 0;

    loop {
        let record = match reader.read_u48::<BigEndian>() {
            Ok(record) => record,
            Err(ref err) if err.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(err) => return Err(err.into()),
        };

        if record >> 46 & 1 == 1 {
            overflow_correction += WRAP_PERIOD;
        }
        if record >> 45 & 1 == 1 {
            lost += 1;
        }
        if record >> 47 & 1 == 1 {
            continue; // delta record
        }

        let channels = record >> TIME_BITS & 0xF;
        if channels & mask != 0 {
            all.push(overflow_correction + (record & (WRAP_PERIOD - 1)));
        }
    }

    if lost > 0 {
        log::warn!(
            "{}: {} records flagged lost samples; counts may be unreliable",
            path.display(),
            lost
        );
    }

    let times = if all.len() > STROBE_SKIP {
        all.split_off(STROBE_SKIP)
    } else {
        Vec::new()
    };
    log::info!(
        "{}: {} events on channel {} ({} dropped as startup transient)",
        path.display(),
        times.len(),
        channel,
        all.len().min(STROBE_SKIP)
    );

    Ok(TimestampStream::new(times, 1.0 / clockrate, channel))
}
