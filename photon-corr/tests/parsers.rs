//! Decoding of synthetic files in each supported format.

use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;

use photon_corr::errors::Error;
use photon_corr::fcs_tools::multi_tau::{correlate, CorrParams};
use photon_corr::parsers::timetag::STROBE_SKIP;
use photon_corr::parsers::{read_timestamps, read_timestamps_with, ReadOptions};

const T2_WRAPAROUND: u64 = 210_698_240;
const TIMETAG_WRAP: u64 = 1 << 36;

fn pt2_record(channel: u32, time: u32) -> u32 {
    (channel << 28) | (time & 0x0FFF_FFFF)
}

fn write_pt2(path: &PathBuf, records: &[u32]) {
    let mut bytes: Vec<u8> = Vec::new();

    // Text header: ident plus padding out to 328 bytes.
    let mut txt = [0u8; 328];
    txt[..12].copy_from_slice(b"PicoHarp 300");
    bytes.extend_from_slice(&txt);

    // Binary header: measurement mode (sixth i32) = 2 for T2.
    let mut bin = [0u8; 208];
    bin[20..24].copy_from_slice(&2i32.to_le_bytes());
    bytes.extend_from_slice(&bin);

    // Board header.
    bytes.extend_from_slice(&[0u8; 156]);

    // T2 header: seven i32s, record count, image header size.
    bytes.extend_from_slice(&[0u8; 28]);
    bytes.extend_from_slice(&(records.len() as i32).to_le_bytes());
    bytes.extend_from_slice(&0i32.to_le_bytes());

    for record in records {
        bytes.extend_from_slice(&record.to_le_bytes());
    }
    fs::write(path, bytes).unwrap();
}

fn timetag_record(delta: bool, wrap: bool, channels: u64, time: u64) -> [u8; 6] {
    let record: u64 =
        ((delta as u64) << 47) | ((wrap as u64) << 46) | (channels << 36) | time;
    let bytes = record.to_be_bytes();
    [bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7]]
}

#[test]
fn pt2_channels_overflow_and_markers() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("run.pt2");
    write_pt2(
        &path,
        &[
            pt2_record(0, 100),
            pt2_record(1, 200),
            pt2_record(0xF, 0), // overflow
            pt2_record(0, 50),
            pt2_record(0xF, 3), // marker, dropped
            pt2_record(0, 60),
        ],
    );

    let donor = read_timestamps(&path, 0).unwrap();
    assert_eq!(
        donor.times(),
        &[100, T2_WRAPAROUND + 50, T2_WRAPAROUND + 60]
    );
    assert!((donor.jiffy() - 4e-12).abs() < 1e-20);

    let acceptor = read_timestamps(&path, 1).unwrap();
    assert_eq!(acceptor.times(), &[200]);

    let err = read_timestamps(&path, 9).unwrap_err();
    assert!(matches!(err, Error::ChannelRange { channel: 9, max: 3 }));
}

#[test]
fn pt2_rejects_wrong_ident_and_mode() {
    let dir = TempDir::new().unwrap();

    let path = dir.path().join("bogus.pt2");
    let mut bytes = vec![0u8; 1000];
    bytes[..5].copy_from_slice(b"nopes");
    fs::write(&path, bytes).unwrap();
    assert!(matches!(
        read_timestamps(&path, 0).unwrap_err(),
        Error::InvalidHeader(_)
    ));

    // Valid ident but T3 measurement mode.
    let path = dir.path().join("t3.pt2");
    let mut bytes = vec![0u8; 1000];
    bytes[..12].copy_from_slice(b"PicoHarp 300");
    bytes[328 + 20..328 + 24].copy_from_slice(&3i32.to_le_bytes());
    fs::write(&path, bytes).unwrap();
    assert!(matches!(
        read_timestamps(&path, 0).unwrap_err(),
        Error::InvalidHeader(_)
    ));
}

#[test]
fn timetag_strobes_wrap_and_startup_skip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("run.timetag");

    let mut bytes: Vec<u8> = Vec::new();
    // Startup transient the reader must drop.
    for i in 0..STROBE_SKIP as u64 {
        bytes.extend_from_slice(&timetag_record(false, false, 0b0001, i + 1));
    }
    bytes.extend_from_slice(&timetag_record(false, false, 0b0001, 2_000));
    bytes.extend_from_slice(&timetag_record(true, false, 0b0000, 2_500)); // delta
    bytes.extend_from_slice(&timetag_record(false, false, 0b0010, 3_000)); // channel 1
    bytes.extend_from_slice(&timetag_record(false, true, 0b0001, 100)); // wrapped
    fs::write(&path, bytes).unwrap();

    let stream = read_timestamps(&path, 0).unwrap();
    assert_eq!(stream.times(), &[2_000, TIMETAG_WRAP + 100]);
    assert!((stream.jiffy() - 1.0 / 128e6).abs() < 1e-15);

    let other = read_timestamps(&path, 1).unwrap();
    // Channel 1 only ever saw one event, inside the skip window.
    assert!(other.times().is_empty());

    let options = ReadOptions {
        clockrate: 64e6,
        ..ReadOptions::default()
    };
    let slow = read_timestamps_with(&path, 0, &options).unwrap();
    assert!((slow.jiffy() - 1.0 / 64e6).abs() < 1e-15);

    assert!(matches!(
        read_timestamps(&path, 4).unwrap_err(),
        Error::ChannelRange { channel: 4, max: 3 }
    ));
}

#[test]
fn raw_times_single_channel() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("run.times");
    let mut bytes: Vec<u8> = Vec::new();
    for t in &[5u64, 10, 15] {
        bytes.extend_from_slice(&t.to_le_bytes());
    }
    fs::write(&path, bytes).unwrap();

    let stream = read_timestamps_with(
        &path,
        0,
        &ReadOptions {
            raw_jiffy: 1e-12,
            ..ReadOptions::default()
        },
    )
    .unwrap();
    assert_eq!(stream.times(), &[5, 10, 15]);
    assert!((stream.jiffy() - 1e-12).abs() < 1e-24);

    assert!(matches!(
        read_timestamps(&path, 1).unwrap_err(),
        Error::ChannelRange { channel: 1, max: 0 }
    ));
}

#[test]
fn unknown_extension_and_missing_file() {
    let dir = TempDir::new().unwrap();

    let path = dir.path().join("run.csv");
    fs::write(&path, b"1,2,3").unwrap();
    assert!(matches!(
        read_timestamps(&path, 0).unwrap_err(),
        Error::UnrecognizedFileType(_)
    ));

    let path = dir.path().join("missing.pt2");
    assert!(matches!(
        read_timestamps(&path, 0).unwrap_err(),
        Error::FileNotAvailable(_)
    ));
}

#[test]
fn pt2_end_to_end_correlation() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pair.pt2");

    let mut records: Vec<u32> = Vec::new();
    for i in 0..400u32 {
        let channel = i % 2;
        records.push(pt2_record(channel, i * 50 + channel * 5));
    }
    write_pt2(&path, &records);

    let donor = read_timestamps(&path, 0).unwrap();
    let acceptor = read_timestamps(&path, 1).unwrap();
    assert_eq!(donor.len(), 200);
    assert_eq!(acceptor.len(), 200);

    let params = CorrParams {
        short_grain: 100.0 * 4e-12,
        ..CorrParams::default()
    };
    let result = correlate(&donor, &acceptor, &params).unwrap();
    assert!(!result.points.is_empty());
    for p in &result.points {
        assert!(p.dotnormed.is_finite());
        assert!(p.bar >= 0.0);
    }
}
