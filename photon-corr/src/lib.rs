//! Correlation analysis of photon arrival timestamps for fluorescence
//! correlation spectroscopy (FCS).
//!
//! The crate reads per-channel photon timestamps out of the supported
//! detector file formats (see [`parsers`]), checks each stream for
//! acquisition problems (see [`fcs_tools::validate`]) and estimates
//! auto- and cross-correlation functions over many decades of lag with
//! a multi-tau correlator (see [`fcs_tools::multi_tau`]).

#[macro_use]
extern crate num_derive;

pub mod errors;
pub mod fcs_tools;
pub mod headers;
pub mod parsers;

/// Photon arrival times for one detector channel.
///
/// Timestamps are integer multiples of the clock period (`jiffy`,
/// seconds per tick) and are strictly increasing. The stream is
/// immutable once constructed; the validator and the correlator only
/// ever read it.
#[derive(Debug, Clone)]
pub struct TimestampStream {
    times: Vec<u64>,
    jiffy: f64,
    channel: u32,
}

impl TimestampStream {
    /// `jiffy` is the duration of one clock tick in seconds and must be
    /// positive.
    pub fn new(times: Vec<u64>, jiffy: f64, channel: u32) -> Self {
        debug_assert!(jiffy > 0.0);
        Self {
            times,
            jiffy,
            channel,
        }
    }

    #[inline]
    pub fn times(&self) -> &[u64] {
        &self.times
    }

    #[inline]
    pub fn jiffy(&self) -> f64 {
        self.jiffy
    }

    #[inline]
    pub fn channel(&self) -> u32 {
        self.channel
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.times.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Wall-clock span between the first and last event, in seconds.
    pub fn duration(&self) -> f64 {
        match (self.times.first(), self.times.last()) {
            (Some(first), Some(last)) => (last - first) as f64 * self.jiffy,
            _ => 0.0,
        }
    }
}
