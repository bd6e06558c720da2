use crate::TimestampStream;

/// Count photons into fixed-width bins.
///
/// The grid starts at the first event and uses bins of `width` seconds
/// (rounded to a whole number of clock ticks, at least one). The final
/// partial bin is dropped so that every returned count covers the same
/// amount of time; dividing by `width` turns the counts into an
/// intensity trace.
pub fn bin_photons(stream: &TimestampStream, width: f64) -> Vec<u64> {
    let times = stream.times();
    let first = match times.first() {
        Some(&first) => first,
        None => return Vec::new(),
    };
    let ticks_per_bin = ((width / stream.jiffy()) as u64).max(1);

    let mut counts: Vec<u64> = Vec::new();
    let mut counter: u64 = 0;
    let mut end_of_bin = first + ticks_per_bin;

    for &t in times {
        while t >= end_of_bin {
            counts.push(counter);
            counter = 0;
            end_of_bin += ticks_per_bin;
        }
        counter += 1;
    }
    counts
}
