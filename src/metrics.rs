/// Divide bytes/s by this to get Mbps (8 bits per byte, 2^20 per mega).
pub const BYTES_PER_SEC_PER_MBPS: f64 = (1u64 << 17) as f64;

/// What to do at index 0 when no window width is given and there is no
/// previous sample to pair with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FirstSample {
    #[default]
    Nan,
    /// Pair the first sample with the last timestamp of the series.
    WrapAround,
}

/// Left edge `j` of the window for every sample `i`, where the window covers
/// `bytes_sent[j+1..=i]` over `times[i] - times[j]`. `j` is `-1` at index 0
/// when `interval` is `None`.
///
/// With an interval `j` only ever moves forward, so the whole scan is linear.
pub(crate) fn window_starts(times: &[f64], interval: Option<f64>) -> Vec<isize> {
    let mut starts = Vec::with_capacity(times.len());
    let mut j: usize = 0;
    for (i, &t) in times.iter().enumerate() {
        match interval {
            None => starts.push(i as isize - 1),
            Some(width) => {
                while j + 1 < i && times[j] < t - width {
                    j += 1;
                }
                starts.push(j as isize);
            }
        }
    }
    starts
}

/// Windowed throughput for each sample.
///
/// `bytes_sent[i]` is what was sent in the interval ending at `times[i]`.
/// Results are in bytes per time unit of `times`. Each window is summed on
/// its own, so a non-finite sample only affects the windows that contain it.
/// With an interval, index 0 has an empty window and reports 0.
/// Input is not validated: non-monotonic times or a short `bytes_sent` show
/// up as NaN or inf.
pub fn compute_rates(
    times: &[f64],
    bytes_sent: &[f64],
    interval: Option<f64>,
    first: FirstSample,
) -> Vec<f64> {
    let bytes = |k: usize| bytes_sent.get(k).copied().unwrap_or(f64::NAN);
    let starts = window_starts(times, interval);

    times
        .iter()
        .zip(starts.iter())
        .enumerate()
        .map(|(i, (&t, &j))| {
            if j < 0 {
                return match first {
                    FirstSample::Nan => f64::NAN,
                    FirstSample::WrapAround => match times.last() {
                        Some(&last) => bytes(i) / (t - last),
                        None => f64::NAN,
                    },
                };
            }
            let j = j as usize;
            if j + 1 > i {
                return 0.0;
            }
            let window: f64 = (j + 1..=i).map(bytes).sum();
            window / (t - times[j])
        })
        .collect()
}

/// Jain's fairness index, `(Σx)² / (n·Σx²)`.
pub fn jain_index(xs: &[f64]) -> f64 {
    let (sum, sum_sqr) = xs
        .iter()
        .fold((0.0, 0.0), |(s, sq), &x| (s + x, sq + x * x));
    sum * sum / (xs.len() as f64 * sum_sqr)
}

/// Fairness index per sample index across flows. Stops at the shortest
/// series.
pub fn jain_series(flows: &[Vec<f64>]) -> Vec<f64> {
    let len = flows.iter().map(Vec::len).min().unwrap_or(0);
    (0..len)
        .map(|k| {
            let at: Vec<f64> = flows.iter().map(|f| f[k]).collect();
            jain_index(&at)
        })
        .collect()
}

/// Empirical CDF: sorted values paired with `i / n`.
pub fn ecdf(xs: &[f64]) -> Vec<(f64, f64)> {
    let mut sorted = xs.to_vec();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len() as f64;
    sorted
        .into_iter()
        .enumerate()
        .map(|(i, x)| (x, i as f64 / n))
        .collect()
}
