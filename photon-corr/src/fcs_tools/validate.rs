use crate::errors::Error;
use crate::TimestampStream;

/// Default sensitivity of the continuity check.
pub const DEFAULT_GAP_FACTOR: f64 = 1000.0;

/// Check a timestamp stream for acquisition problems before it reaches
/// the correlator.
///
/// Two conditions are checked in order:
///
/// 1. Monotonicity. Adjacent timestamps must be strictly increasing;
///    any inversion means the file was decoded wrong or the hardware
///    misbehaved, and silently reordering would fabricate correlations.
/// 2. Continuity. Any inter-arrival gap larger than `gap_factor` times
///    the mean inter-arrival interval is flagged. This is a heuristic
///    for detector dropout and missed clock wraps; legitimately sparse
///    data at very low count rates can trip it, which is why the factor
///    is a parameter rather than a constant.
///
/// The scan is read-only, O(n) time and O(1) extra space. Streams with
/// fewer than two events cannot be correlated anyway and fail with
/// [`Error::InsufficientData`].
pub fn validate(stream: &TimestampStream, gap_factor: f64) -> Result<(), Error> {
    let times = stream.times();
    if times.len() < 2 {
        return Err(Error::InsufficientData);
    }

    let inversions = times.windows(2).filter(|pair| pair[1] <= pair[0]).count();
    if inversions > 0 {
        return Err(Error::NonMonotonic(inversions));
    }

    let span = times[times.len() - 1] - times[0];
    let tau = span as f64 / (times.len() - 1) as f64;
    let threshold = gap_factor * tau;
    let gaps = times
        .windows(2)
        .filter(|pair| (pair[1] - pair[0]) as f64 > threshold)
        .count();
    if gaps > 0 {
        return Err(Error::Discontinuity(gaps));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(times: Vec<u64>) -> TimestampStream {
        TimestampStream::new(times, 1e-9, 0)
    }

    #[test]
    fn accepts_monotonic_stream() {
        let s = stream((0..1000u64).map(|i| i * 17).collect());
        assert!(validate(&s, DEFAULT_GAP_FACTOR).is_ok());
    }

    #[test]
    fn counts_a_single_inversion() {
        let mut times: Vec<u64> = (0..1000u64).map(|i| i * 17).collect();
        times.swap(500, 501);
        let err = validate(&stream(times), DEFAULT_GAP_FACTOR).unwrap_err();
        assert!(matches!(err, Error::NonMonotonic(1)));
    }

    #[test]
    fn equal_adjacent_timestamps_are_non_monotonic() {
        let err = validate(&stream(vec![0, 5, 5, 10]), DEFAULT_GAP_FACTOR).unwrap_err();
        assert!(matches!(err, Error::NonMonotonic(1)));
    }

    #[test]
    fn counts_a_single_large_gap() {
        // 10001 events at unit spacing with one 1e9-tick hole in the
        // middle. The hole dominates the mean interval (~1e5 ticks), so
        // with gap_factor 1000 only the hole itself crosses the
        // threshold.
        let gap: u64 = 1_000_000_000;
        let mut times: Vec<u64> = (0..5000u64).collect();
        times.extend((0..5001u64).map(|i| 5000 + gap + i));
        let err = validate(&stream(times), DEFAULT_GAP_FACTOR).unwrap_err();
        assert!(matches!(err, Error::Discontinuity(1)));
    }

    #[test]
    fn gap_factor_is_respected() {
        // One gap of 50x the mean interval: fails at gap_factor 10,
        // passes at the default 1000.
        let mut times: Vec<u64> = (0..1000u64).collect();
        times.extend((0..1000u64).map(|i| 1050 + i));
        let s = stream(times);
        assert!(matches!(
            validate(&s, 10.0).unwrap_err(),
            Error::Discontinuity(1)
        ));
        assert!(validate(&s, DEFAULT_GAP_FACTOR).is_ok());
    }

    #[test]
    fn too_few_events() {
        assert!(matches!(
            validate(&stream(vec![]), DEFAULT_GAP_FACTOR).unwrap_err(),
            Error::InsufficientData
        ));
        assert!(matches!(
            validate(&stream(vec![42]), DEFAULT_GAP_FACTOR).unwrap_err(),
            Error::InsufficientData
        ));
    }
}
