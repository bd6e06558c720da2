use std::io::{self, Write};

use ndarray::Array2;

use crate::errors::Error;
use crate::TimestampStream;

pub const DEFAULT_SHORT_GRAIN: f64 = 1e-7;
pub const DEFAULT_COARSENING_FACTOR: u64 = 2;
pub const DEFAULT_BINS_PER_OCTAVE: usize = 8;

/// Parameters for the multi-tau correlator
///
/// # Parameters
///    - short_grain: The finest bin width, in seconds. Also the first
///      lag that is evaluated.
///    - max_lag: Largest lag of interest in seconds. Clipped to the
///      overlap of the two streams; `None` means the whole overlap.
///    - coarsening_factor: Factor by which the bin width grows at each
///      scale change. Must be at least 2.
///    - bins_per_octave: Number of lags evaluated at each scale before
///      the bin width is coarsened.
#[derive(Debug, Copy, Clone)]
pub struct CorrParams {
    pub short_grain: f64,
    pub max_lag: Option<f64>,
    pub coarsening_factor: u64,
    pub bins_per_octave: usize,
}

impl Default for CorrParams {
    fn default() -> Self {
        Self {
            short_grain: DEFAULT_SHORT_GRAIN,
            max_lag: None,
            coarsening_factor: DEFAULT_COARSENING_FACTOR,
            bins_per_octave: DEFAULT_BINS_PER_OCTAVE,
        }
    }
}

/// One lag bin of the correlation function.
#[derive(Debug, Copy, Clone)]
pub struct CorrPoint {
    /// Lag in seconds.
    pub lag: f64,
    /// log10 of the lag, for log-spaced plotting.
    pub log_lag: f64,
    /// Width of the bins this point was computed with, in seconds.
    pub grain: f64,
    /// Raw correlation sum: aligned bin-count products at this lag.
    pub dot: u64,
    /// `dot` normalized so uncorrelated Poisson streams give 1.0.
    pub dotnormed: f64,
    /// Standard error of `dotnormed`; never negative.
    pub bar: f64,
    /// Mean count rate of stream a over the overlap window, in Hz.
    pub mean_rate_a: f64,
    /// Mean count rate of stream b over the overlap window, in Hz.
    pub mean_rate_b: f64,
    /// Standard error of [`CorrPoint::mean_rate`].
    pub mean_rate_err: f64,
}

impl CorrPoint {
    /// Geometric mean of the two count rates; what the text table
    /// reports as the mean rate column.
    pub fn mean_rate(&self) -> f64 {
        (self.mean_rate_a * self.mean_rate_b).sqrt()
    }
}

/// Result from the multi-tau correlator: points ordered by increasing
/// lag plus the provenance needed to interpret them.
#[derive(Debug)]
pub struct CorrResult {
    pub points: Vec<CorrPoint>,
    /// Clock period of the input streams, seconds per tick.
    pub jiffy: f64,
    /// Finest bin width actually used, in seconds (the requested
    /// short_grain rounded to a whole number of ticks).
    pub short_grain: f64,
    /// Largest lag actually evaluated, after clipping to the data.
    pub effective_max_lag: f64,
    pub channel_a: u32,
    pub channel_b: u32,
    /// Events of each stream inside the overlap window.
    pub events_a: usize,
    pub events_b: usize,
}

impl CorrResult {
    /// The column layout of [`CorrResult::write_table`], as an `n x 7`
    /// array: `lag, log_lag, dot, dotnormed, bar, mean_rate,
    /// mean_rate_err`.
    pub fn to_array(&self) -> Array2<f64> {
        Array2::from_shape_fn((self.points.len(), 7), |(i, j)| {
            let p = &self.points[i];
            match j {
                0 => p.lag,
                1 => p.log_lag,
                2 => p.dot as f64,
                3 => p.dotnormed,
                4 => p.bar,
                5 => p.mean_rate(),
                _ => p.mean_rate_err,
            }
        })
    }

    /// Write the correlation function as whitespace-separated text, one
    /// row per lag, columns `lag log_lag dot dotnormed bar mean_rate
    /// mean_rate_err`. Downstream plotting relies on this column order.
    pub fn write_table<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        for p in &self.points {
            writeln!(
                writer,
                "{:.18e} {:.18e} {:.18e} {:.18e} {:.18e} {:.18e} {:.18e}",
                p.lag,
                p.log_lag,
                p.dot as f64,
                p.dotnormed,
                p.bar,
                p.mean_rate(),
                p.mean_rate_err,
            )?;
        }
        Ok(())
    }
}

/// Photon counts on a uniform grid of `grain`-tick bins, stored
/// sparsely as parallel (bin index, count) vectors ordered by index.
/// Empty bins are simply absent, which is what keeps multi-tau cheap on
/// point-process data: the vectors never grow beyond the event count.
struct SparseBins {
    idx: Vec<u64>,
    counts: Vec<u64>,
    grain: u64,
}

impl SparseBins {
    fn from_times(times: &[u64], grain: u64) -> Self {
        let mut idx: Vec<u64> = Vec::with_capacity(times.len());
        let mut counts: Vec<u64> = Vec::with_capacity(times.len());
        for &t in times {
            let bin = t / grain;
            if idx.last() == Some(&bin) {
                let last = counts.len() - 1;
                counts[last] += 1;
            } else {
                idx.push(bin);
                counts.push(1);
            }
        }
        Self { idx, counts, grain }
    }

    /// Merge `factor` adjacent bins into one, in place.
    fn coarsen(&mut self, factor: u64) {
        self.grain *= factor;
        let mut write = 0usize;
        for read in 0..self.idx.len() {
            let bin = self.idx[read] / factor;
            if write > 0 && self.idx[write - 1] == bin {
                self.counts[write - 1] += self.counts[read];
            } else {
                self.idx[write] = bin;
                self.counts[write] = self.counts[read];
                write += 1;
            }
        }
        self.idx.truncate(write);
        self.counts.truncate(write);
    }

    /// Sum of aligned count products with `other` shifted `lag_bins`
    /// later: both index vectors are ordered, so a two-pointer merge
    /// join visits each entry once.
    fn dot(&self, other: &SparseBins, lag_bins: u64) -> u64 {
        let mut acc: u64 = 0;
        let (mut i, mut j) = (0usize, 0usize);
        while i < self.idx.len() && j < other.idx.len() {
            let a = self.idx[i] + lag_bins;
            let b = other.idx[j];
            if a == b {
                acc += self.counts[i] * other.counts[j];
                i += 1;
                j += 1;
            } else if a < b {
                i += 1;
            } else {
                j += 1;
            }
        }
        acc
    }
}

struct MultiTau<'a> {
    a: &'a TimestampStream,
    b: &'a TimestampStream,
    params: CorrParams,
}

impl MultiTau<'_> {
    fn compute(self) -> Result<CorrResult, Error> {
        let jiffy = self.a.jiffy();
        let params = &self.params;

        // Restrict both streams to the window where they overlap in
        // time; rates and sample counts outside it would skew the
        // normalization when one stream is much shorter.
        let (a_first, a_last) = match (self.a.times().first(), self.a.times().last()) {
            (Some(&first), Some(&last)) => (first, last),
            _ => return Err(Error::InsufficientData),
        };
        let (b_first, b_last) = match (self.b.times().first(), self.b.times().last()) {
            (Some(&first), Some(&last)) => (first, last),
            _ => return Err(Error::InsufficientData),
        };
        let t0 = a_first.max(b_first);
        let t1 = a_last.min(b_last);
        if t1 <= t0 {
            return Err(Error::InsufficientData);
        }
        let a_times = window(self.a.times(), t0, t1);
        let b_times = window(self.b.times(), t0, t1);
        if a_times.len() < 2 || b_times.len() < 2 {
            return Err(Error::InsufficientData);
        }

        let span_ticks = t1 - t0;
        let span_secs = span_ticks as f64 * jiffy;
        let grain0 = ((params.short_grain / jiffy).round() as u64).max(1);

        let max_lag_ticks = match params.max_lag {
            Some(max_lag) => ((max_lag / jiffy) as u64).min(span_ticks),
            None => span_ticks,
        };

        let rate_a = a_times.len() as f64 / span_secs;
        let rate_b = b_times.len() as f64 / span_secs;
        let mean_rate = (rate_a * rate_b).sqrt();
        let mean_rate_err = mean_rate
            * 0.5
            * (1.0 / a_times.len() as f64 + 1.0 / b_times.len() as f64).sqrt();

        let mut bins_a = SparseBins::from_times(a_times, grain0);
        let mut bins_b = SparseBins::from_times(b_times, grain0);

        let mut points: Vec<CorrPoint> = Vec::new();
        let mut lag_ticks: u64 = 0;
        let mut effective_max_lag: f64 = 0.0;

        'scales: loop {
            for _ in 0..params.bins_per_octave {
                let next_lag = lag_ticks + bins_a.grain;
                if next_lag > max_lag_ticks {
                    break 'scales;
                }
                lag_ticks = next_lag;

                if lag_ticks >= span_ticks {
                    break 'scales;
                }
                // The alignment step keeps lag_ticks a multiple of the
                // current grain.
                let lag_bins = lag_ticks / bins_a.grain;
                let n_samples = (span_ticks - lag_ticks) as f64 / bins_a.grain as f64;

                let dot = bins_a.dot(&bins_b, lag_bins);
                let grain_secs = bins_a.grain as f64 * jiffy;
                let denom = n_samples * (rate_a * grain_secs) * (rate_b * grain_secs);

                let lag = lag_ticks as f64 * jiffy;
                effective_max_lag = lag;
                let dotf = dot as f64;
                // Counting error of the raw sum in quadrature with the
                // sampling error of averaging n_samples bin alignments:
                // relative error sqrt(1/dot + 1/n_samples). The second
                // term dominates near the span, where only a handful of
                // alignments remain.
                let bar = (dotf * (1.0 + dotf / n_samples)).sqrt() / denom;
                points.push(CorrPoint {
                    lag,
                    log_lag: lag.log10(),
                    grain: grain_secs,
                    dot,
                    dotnormed: dotf / denom,
                    bar,
                    mean_rate_a: rate_a,
                    mean_rate_b: rate_b,
                    mean_rate_err,
                });
            }

            let grain = match bins_a.grain.checked_mul(params.coarsening_factor) {
                Some(grain) if grain <= span_ticks => grain,
                _ => break,
            };
            log::debug!(
                "coarsening to {} ticks per bin at lag {} ticks",
                grain,
                lag_ticks
            );
            bins_a.coarsen(params.coarsening_factor);
            bins_b.coarsen(params.coarsening_factor);
            // Keep lags on the coarse grid so the bin offset stays an
            // integer. Alignment moves the cursor back less than one
            // coarse bin, never past an emitted lag.
            lag_ticks -= lag_ticks % grain;
        }

        if points.is_empty() {
            return Err(Error::InsufficientData);
        }

        Ok(CorrResult {
            points,
            jiffy,
            short_grain: grain0 as f64 * jiffy,
            effective_max_lag,
            channel_a: self.a.channel(),
            channel_b: self.b.channel(),
            events_a: a_times.len(),
            events_b: b_times.len(),
        })
    }
}

/// Slice of `times` with `t0 <= t <= t1`.
fn window(times: &[u64], t0: u64, t1: u64) -> &[u64] {
    let lo = times.partition_point(|&t| t < t0);
    let hi = times.partition_point(|&t| t <= t1);
    &times[lo..hi]
}

/// Estimate the correlation function g(tau) between two photon streams
/// over logarithmically spaced lags.
///
/// ## Parameters
///
/// The parameters are passed via a [`CorrParams`] struct; see its
/// documentation. Passing the same stream twice computes the
/// autocorrelation.
///
/// ## Algorithm description
///
/// This is the multi-tau scheme. Each stream is quantized onto a grid
/// of `short_grain`-wide bins held sparsely as (bin index, count)
/// pairs, and the raw correlation at a lag is the dot product of the
/// two count vectors with one of them shifted by the lag. After
/// `bins_per_octave` lags the grid is coarsened by
/// `coarsening_factor` and the lag step grows with it, so both the
/// number of lags and the total work stay logarithmic in
/// `max_lag / short_grain` instead of linear. All bin indices and lags
/// are exact integer tick counts; floating point only enters in the
/// final statistics.
///
/// Each dot product is normalized by the value expected for two
/// uncorrelated Poisson streams of the same rates,
/// `n_samples * rate_a * rate_b * grain^2`, so `dotnormed` converges to
/// 1.0 at lags beyond any physical correlation. The quoted error bar
/// combines the Poisson counting error of the raw sum with the sampling
/// error of the finite number of bin alignments at that lag,
/// `sqrt(dot + dot^2 / n_samples)` propagated through the same
/// normalization; it is zero when the sum is zero and never negative.
/// Rates are measured over the overlap window of the two streams only.
///
/// ## Zero lag
///
/// The lag-zero bin is never evaluated; the first point sits at
/// `short_grain`. For an autocorrelation the zero-lag bin counts each
/// photon against itself and measures shot noise rather than dynamics,
/// so it would dominate the plot while carrying no information.
///
/// ## Errors
///
/// Streams with fewer than two events in the overlap window (or no
/// overlap at all) give [`Error::InsufficientData`]. Streams recorded
/// against different clocks give [`Error::MismatchedClocks`].
pub fn correlate(
    a: &TimestampStream,
    b: &TimestampStream,
    params: &CorrParams,
) -> Result<CorrResult, Error> {
    if a.jiffy() != b.jiffy() {
        return Err(Error::MismatchedClocks {
            a: a.jiffy(),
            b: b.jiffy(),
        });
    }
    if params.coarsening_factor < 2 {
        return Err(Error::InvalidParameter(String::from(
            "coarsening_factor must be at least 2",
        )));
    }
    if params.bins_per_octave == 0 {
        return Err(Error::InvalidParameter(String::from(
            "bins_per_octave must be positive",
        )));
    }
    if !(params.short_grain > 0.0) {
        return Err(Error::InvalidParameter(String::from(
            "short_grain must be positive",
        )));
    }
    if let Some(max_lag) = params.max_lag {
        if !(max_lag > 0.0) {
            return Err(Error::InvalidParameter(String::from(
                "max_lag must be positive",
            )));
        }
    }

    let corr = MultiTau { a, b, params: *params };
    corr.compute()
}
