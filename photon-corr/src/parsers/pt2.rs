//! PicoQuant PicoHarp 300 T2 mode (`.pt2`) decoder.
//!
//! The file starts with a 328 byte text header, a 208 byte binary
//! header, a 156 byte board header and a T2-mode header that carries the
//! record count, followed by one little-endian u32 per event. Each
//! record packs a 4 bit channel number and a 28 bit time tag; channel
//! 0xF is reserved for overflow and marker records.

use std::fs;
use std::io::{self, BufReader, Read};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};
use num_traits::FromPrimitive;

use crate::errors::Error;
use crate::TimestampStream;

/// The T2 time tag advances at a fixed 4 ps, independent of the binning
/// configured for histogramming modes.
pub const T2_JIFFY: f64 = 4e-12;

/// Time tag span of one overflow record, in ticks.
const T2_WRAPAROUND: u64 = 210_698_240;

const PT2_IDENT: &str = "PicoHarp 300";
const MAX_CHANNEL: u32 = 3;

const TXT_HDR_REMAINDER: u64 = 312; // format version through comment field
const BIN_HDR_REMAINDER: u64 = 184; // sub mode through script name
const BOARD_HDR_SIZE: u64 = 156;
const T2_HDR_PREFIX: u64 = 28; // ext devices through stop reason

#[derive(FromPrimitive, Debug)]
enum MeasurementMode {
    Interactive = 0,
    T2 = 2,
    T3 = 3,
}

fn skip<R: Read>(reader: &mut R, n: u64) -> Result<(), Error> {
    let copied = io::copy(&mut reader.by_ref().take(n), &mut io::sink())?;
    if copied != n {
        return Err(Error::InvalidHeader(String::from("Truncated pt2 header")));
    }
    Ok(())
}

/// Walk the fixed-layout headers and leave the reader at the first
/// event record. Returns the number of records announced by the file.
fn read_header<R: Read>(reader: &mut R) -> Result<usize, Error> {
    let mut ident = [0u8; 16];
    reader.read_exact(&mut ident)?;
    let ident = String::from_utf8_lossy(&ident);
    if !ident.trim_end_matches(char::from(0)).starts_with(PT2_IDENT) {
        return Err(Error::InvalidHeader(format!(
            "Not a PicoHarp 300 file (ident {:?})",
            ident
        )));
    }
    skip(reader, TXT_HDR_REMAINDER)?;

    // Binary header. Only the measurement mode matters to us; T3 and
    // interactive-mode files hold different record layouts.
    for _ in 0..5 {
        reader.read_i32::<LittleEndian>()?;
    }
    let mode = reader.read_i32::<LittleEndian>()?;
    match FromPrimitive::from_i32(mode) {
        Some(MeasurementMode::T2) => {}
        _ => {
            return Err(Error::InvalidHeader(format!(
                "Expected a T2 mode file, found measurement mode {}",
                mode
            )))
        }
    }
    skip(reader, BIN_HDR_REMAINDER)?;
    skip(reader, BOARD_HDR_SIZE)?;

    skip(reader, T2_HDR_PREFIX)?;
    let num_records = reader.read_i32::<LittleEndian>()?;
    if num_records < 0 {
        return Err(Error::InvalidHeader(format!(
            "Negative record count {}",
            num_records
        )));
    }
    let img_hdr_size = reader.read_i32::<LittleEndian>()?;
    if img_hdr_size < 0 {
        return Err(Error::InvalidHeader(format!(
            "Negative image header size {}",
            img_hdr_size
        )));
    }
    skip(reader, img_hdr_size as u64 * 4)?;

    Ok(num_records as usize)
}

/// Read the timestamps of `channel` (0..=3) from a `.pt2` file.
pub fn read(path: &Path, channel: u32) -> Result<TimestampStream, Error> {
    if channel > MAX_CHANNEL {
        return Err(Error::ChannelRange {
            channel,
            max: MAX_CHANNEL,
        });
    }

    let mut reader = BufReader::new(fs::File::open(path)?);
    let num_records = read_header(&mut reader)?;

    let mut times: Vec<u64> = Vec::new();
    let mut overflow_correction: u64 = 0;
    let mut markers: usize = 0;

    for _ in 0..num_records {
        let record = reader.read_u32::<LittleEndian>()?;
        let ch = record >> 28;
        let tm = (record & 0x0FFF_FFFF) as u64;

        if ch == 0xF {
            // Special record. The lowest 4 time bits distinguish an
            // overflow (0) from external markers.
            if tm & 0xF == 0 {
                overflow_correction += T2_WRAPAROUND;
            } else {
                markers += 1;
            }
        } else if ch == channel {
            times.push(overflow_correction + tm);
        }
    }
    if markers > 0 {
        log::debug!("{}: dropped {} marker records", path.display(), markers);
    }
    log::info!(
        "{}: {} events on channel {}",
        path.display(),
        times.len(),
        channel
    );

    Ok(TimestampStream::new(times, T2_JIFFY, channel))
}
