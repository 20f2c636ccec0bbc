//! Stateless numeric primitives for inertial signal processing.
//!
//! Every function here is pure: no history is retained between calls and
//! degenerate input (empty slices, zero-magnitude vectors, invalid rates)
//! yields a defined default instead of an error.
//!
//! Spectral analysis uses the Goertzel algorithm rather than a full FFT,
//! since only a handful of frequencies in a known band are ever needed.

use statrs::statistics::{Data, Median};
use std::f64::consts::PI;

/// Sampling rate assumed when timestamps cannot support an estimate.
pub const DEFAULT_SAMPLE_RATE_HZ: f64 = 50.0;

/// Minimum signal length for a meaningful Goertzel bin.
pub const GOERTZEL_MIN_SAMPLES: usize = 8;

/// Margin kept below Nyquist when scanning frequencies.
const NYQUIST_MARGIN_HZ: f64 = 1e-6;

/// Arithmetic mean, 0.0 for empty input.
pub fn mean(x: &[f64]) -> f64 {
    if x.is_empty() {
        return 0.0;
    }
    x.iter().sum::<f64>() / x.len() as f64
}

/// Root mean square, 0.0 for empty input.
pub fn rms(x: &[f64]) -> f64 {
    if x.is_empty() {
        return 0.0;
    }
    (x.iter().map(|v| v * v).sum::<f64>() / x.len() as f64).sqrt()
}

/// Per-index Euclidean norm of three sequences.
///
/// The output is truncated to the shortest input.
pub fn mag3(x: &[f64], y: &[f64], z: &[f64]) -> Vec<f64> {
    x.iter()
        .zip(y)
        .zip(z)
        .map(|((a, b), c)| (a * a + b * b + c * c).sqrt())
        .collect()
}

/// Backward finite difference `(x[i] - x[i-1]) / dt`.
///
/// Index 0 repeats index 1 so the output has no leading discontinuity.
/// A non-positive or non-finite `dt` yields all zeros.
pub fn derivative(x: &[f64], dt: f64) -> Vec<f64> {
    if x.is_empty() {
        return Vec::new();
    }
    if !(dt.is_finite() && dt > 0.0) {
        return vec![0.0; x.len()];
    }

    let mut out = vec![0.0; x.len()];
    for i in 1..x.len() {
        out[i] = (x[i] - x[i - 1]) / dt;
    }
    if x.len() > 1 {
        out[0] = out[1];
    }
    out
}

/// Exponential moving-average low-pass filter.
///
/// Approximates the slowly varying gravity component. The smoothing factor is
/// `dt / (rc + dt)` with `rc = 1 / (2π·fc)` and `dt = 1 / fs`, seeded with the
/// first input value. Invalid `fs` or `fc` returns the input unchanged.
pub fn ema_lowpass(x: &[f64], fs: f64, fc: f64) -> Vec<f64> {
    if x.is_empty() {
        return Vec::new();
    }
    if !(fs.is_finite() && fs > 0.0 && fc.is_finite() && fc > 0.0) {
        return x.to_vec();
    }

    let rc = 1.0 / (2.0 * PI * fc);
    let dt = 1.0 / fs;
    let alpha = dt / (rc + dt);

    let mut out = Vec::with_capacity(x.len());
    let mut y = x[0];
    out.push(y);
    for &v in &x[1..] {
        y += alpha * (v - y);
        out.push(y);
    }
    out
}

/// Unit vector of `(x, y, z)`, or the zero vector when the magnitude is at
/// most `eps` or not finite.
pub fn norm3(x: f64, y: f64, z: f64, eps: f64) -> [f64; 3] {
    let m = (x * x + y * y + z * z).sqrt();
    if !m.is_finite() || m <= eps {
        return [0.0; 3];
    }
    [x / m, y / m, z / m]
}

/// Signed scalar projection of a 3-axis sequence onto unit vector `u`.
pub fn project_on_axis(ax: &[f64], ay: &[f64], az: &[f64], u: [f64; 3]) -> Vec<f64> {
    ax.iter()
        .zip(ay)
        .zip(az)
        .map(|((x, y), z)| x * u[0] + y * u[1] + z * u[2])
        .collect()
}

/// Horizontal magnitude from linear acceleration and its vertical component.
///
/// Computes `sqrt(max(0, |lin|² - v²))` per index; the clamp absorbs tiny
/// negative operands from floating point error.
pub fn horiz_from_vert(ax_lin: &[f64], ay_lin: &[f64], az_lin: &[f64], v: &[f64]) -> Vec<f64> {
    ax_lin
        .iter()
        .zip(ay_lin)
        .zip(az_lin)
        .zip(v)
        .map(|(((x, y), z), vert)| {
            let total = x * x + y * y + z * z;
            (total - vert * vert).max(0.0).sqrt()
        })
        .collect()
}

/// Estimate the sampling rate from timestamps in seconds.
///
/// Uses `1 / median(positive consecutive deltas)` so that jitter and the odd
/// duplicated timestamp do not skew the result. Falls back to
/// [`DEFAULT_SAMPLE_RATE_HZ`] with fewer than two usable deltas.
pub fn estimate_fs(timestamps_sec: &[f64]) -> f64 {
    let deltas: Vec<f64> = timestamps_sec
        .windows(2)
        .map(|pair| pair[1] - pair[0])
        .filter(|d| d.is_finite() && *d > 0.0)
        .collect();

    if deltas.len() < 2 {
        return DEFAULT_SAMPLE_RATE_HZ;
    }

    let median = Data::new(deltas).median();
    if median.is_finite() && median > 0.0 {
        1.0 / median
    } else {
        DEFAULT_SAMPLE_RATE_HZ
    }
}

/// Median of arbitrary values, 0.0 for empty input.
pub fn median(x: &[f64]) -> f64 {
    if x.is_empty() {
        return 0.0;
    }
    let m = Data::new(x.to_vec()).median();
    if m.is_finite() {
        m
    } else {
        0.0
    }
}

/// Percentile `p` (0..=100) of already sorted data, linearly interpolated
/// between the two closest ranks. Returns 0.0 for empty input.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = (p.clamp(0.0, 100.0) / 100.0) * (n - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            let frac = rank - lo as f64;
            sorted[lo] + (sorted[hi] - sorted[lo]) * frac
        }
    }
}

/// Spectral power of `x` at a single frequency `f` (Hz).
///
/// The signal is mean-removed and run through the standard two-pole Goertzel
/// recursion for bin `k = round(n·f/fs)`. Returns 0.0 for fewer than
/// [`GOERTZEL_MIN_SAMPLES`] samples or invalid `fs`/`f`.
pub fn goertzel_power(x: &[f64], fs: f64, f: f64) -> f64 {
    let n = x.len();
    if n < GOERTZEL_MIN_SAMPLES || !(fs.is_finite() && fs > 0.0) || !(f.is_finite() && f > 0.0) {
        return 0.0;
    }

    let mu = mean(x);
    let k = (n as f64 * f / fs).round();
    let coeff = 2.0 * (2.0 * PI * k / n as f64).cos();

    let mut s_prev = 0.0;
    let mut s_prev2 = 0.0;
    for &v in x {
        let s = (v - mu) + coeff * s_prev - s_prev2;
        s_prev2 = s_prev;
        s_prev = s;
    }

    let power = s_prev * s_prev + s_prev2 * s_prev2 - coeff * s_prev * s_prev2;
    if power.is_finite() {
        power.max(0.0)
    } else {
        0.0
    }
}

/// Frequencies scanned for band analysis: `bins` points evenly spaced over
/// `[fmin, min(fmax, fs/2 - ε)]`. Empty when the band is unusable.
pub fn scan_frequencies(fs: f64, fmin: f64, fmax: f64, bins: usize) -> Vec<f64> {
    if bins == 0 || !(fs.is_finite() && fs > 0.0) || !fmin.is_finite() || !fmax.is_finite() {
        return Vec::new();
    }

    let hi = fmax.min(fs / 2.0 - NYQUIST_MARGIN_HZ);
    if hi < fmin {
        return Vec::new();
    }
    if bins == 1 {
        return vec![fmin];
    }

    let step = (hi - fmin) / (bins - 1) as f64;
    (0..bins).map(|i| fmin + step * i as f64).collect()
}

fn scan_powers(x: &[f64], fs: f64, freqs: &[f64]) -> Vec<f64> {
    freqs.iter().map(|&f| goertzel_power(x, fs, f)).collect()
}

/// Frequency with the highest Goertzel power across the scan.
///
/// Ties keep the first (lowest) frequency. Returns 0.0 when nothing can be
/// scanned.
pub fn dominant_freq_goertzel(x: &[f64], fs: f64, fmin: f64, fmax: f64, bins: usize) -> f64 {
    let freqs = scan_frequencies(fs, fmin, fmax, bins);
    let powers = scan_powers(x, fs, &freqs);

    let mut best: Option<(f64, f64)> = None;
    for (&f, &p) in freqs.iter().zip(&powers) {
        match best {
            Some((_, best_p)) if p <= best_p => {}
            _ => best = Some((f, p)),
        }
    }
    best.map(|(f, _)| f).unwrap_or(0.0)
}

/// Mean Goertzel power across the scan, normalized by signal length.
pub fn band_energy_goertzel(x: &[f64], fs: f64, fmin: f64, fmax: f64, bins: usize) -> f64 {
    if x.is_empty() {
        return 0.0;
    }
    let freqs = scan_frequencies(fs, fmin, fmax, bins);
    let powers = scan_powers(x, fs, &freqs);
    mean(&powers) / x.len() as f64
}

/// Normalized Shannon entropy of the scanned power distribution.
///
/// 1.0 means power is spread evenly over the band, 0.0 means it sits in a
/// single bin. Returns 0.0 when total power is not positive.
pub fn spectral_entropy_goertzel(x: &[f64], fs: f64, fmin: f64, fmax: f64, bins: usize) -> f64 {
    let freqs = scan_frequencies(fs, fmin, fmax, bins);
    if freqs.len() < 2 {
        return 0.0;
    }
    let powers = scan_powers(x, fs, &freqs);
    let total: f64 = powers.iter().sum();
    if total <= 0.0 || !total.is_finite() {
        return 0.0;
    }

    let h: f64 = powers
        .iter()
        .map(|&p| p / total)
        .filter(|&q| q > 0.0)
        .map(|q| -q * q.ln())
        .sum();

    let normalized = h / (freqs.len() as f64).ln();
    if normalized.is_finite() {
        normalized
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f64, fs: f64, n: usize, amp: f64) -> Vec<f64> {
        (0..n)
            .map(|i| amp * (2.0 * PI * freq * i as f64 / fs).sin())
            .collect()
    }

    #[test]
    fn test_mean_and_rms_empty() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(rms(&[]), 0.0);
    }

    #[test]
    fn test_rms_basic() {
        assert!((rms(&[3.0, -3.0, 3.0, -3.0]) - 3.0).abs() < 1e-12);
        assert!((mean(&[1.0, 2.0, 3.0]) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_mag3_truncates_to_shortest() {
        let m = mag3(&[3.0, 0.0, 1.0], &[4.0, 0.0], &[0.0, 2.0, 5.0]);
        assert_eq!(m.len(), 2);
        assert!((m[0] - 5.0).abs() < 1e-12);
        assert!((m[1] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_derivative_copies_first_slope() {
        let d = derivative(&[0.0, 1.0, 3.0], 0.5);
        assert_eq!(d, vec![2.0, 2.0, 4.0]);
        assert!(derivative(&[], 0.1).is_empty());
        assert_eq!(derivative(&[7.0], 0.1), vec![0.0]);
    }

    #[test]
    fn test_ema_lowpass_converges_on_constant() {
        let x = vec![9.81; 200];
        let y = ema_lowpass(&x, 50.0, 0.5);
        assert_eq!(y.len(), 200);
        assert!(y.iter().all(|v| (v - 9.81).abs() < 1e-12));
    }

    #[test]
    fn test_ema_lowpass_step_response_is_monotonic() {
        let mut x = vec![0.0; 10];
        x.extend(vec![1.0; 200]);
        let y = ema_lowpass(&x, 50.0, 0.5);
        assert!(y.windows(2).all(|p| p[1] >= p[0]));
        assert!(y[y.len() - 1] > 0.9);
        assert!(y[15] < 0.5);
    }

    #[test]
    fn test_ema_lowpass_first_step_uses_rc_alpha() {
        let y = ema_lowpass(&[0.0, 1.0], 50.0, 0.5);
        let rc = 1.0 / PI;
        let expected = 0.02 / (rc + 0.02);
        assert_eq!(y[0], 0.0);
        assert!((y[1] - expected).abs() < 1e-15);
        assert!((y[1] - 0.059_117_397_441_7).abs() < 1e-12);
    }

    #[test]
    fn test_norm3_degenerate() {
        assert_eq!(norm3(0.0, 0.0, 0.0, 1e-9), [0.0, 0.0, 0.0]);
        assert_eq!(norm3(f64::NAN, 1.0, 0.0, 1e-9), [0.0, 0.0, 0.0]);
        let u = norm3(0.0, 3.0, 4.0, 1e-9);
        assert!((u[1] - 0.6).abs() < 1e-12);
        assert!((u[2] - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_projection_and_horizontal() {
        let u = [0.0, 0.0, 1.0];
        let v = project_on_axis(&[3.0, 0.0], &[4.0, 0.0], &[-2.0, 1.0], u);
        assert_eq!(v, vec![-2.0, 1.0]);

        let h = horiz_from_vert(&[3.0, 0.0], &[4.0, 0.0], &[-2.0, 1.0], &v);
        assert!((h[0] - 5.0).abs() < 1e-12);
        assert_eq!(h[1], 0.0);
    }

    #[test]
    fn test_horiz_from_vert_never_negative() {
        // Vertical slightly larger than the total from rounding.
        let h = horiz_from_vert(&[0.0], &[0.0], &[1.0], &[1.0 + 1e-12]);
        assert_eq!(h, vec![0.0]);
    }

    #[test]
    fn test_estimate_fs_20ms() {
        let ts: Vec<f64> = (0..100).map(|i| i as f64 * 0.02).collect();
        assert!((estimate_fs(&ts) - 50.0).abs() < 1e-6);
    }

    #[test]
    fn test_estimate_fs_defaults_on_short_input() {
        assert_eq!(estimate_fs(&[]), DEFAULT_SAMPLE_RATE_HZ);
        assert_eq!(estimate_fs(&[0.0, 0.01]), DEFAULT_SAMPLE_RATE_HZ);
        assert_eq!(estimate_fs(&[1.0, 1.0, 1.0]), DEFAULT_SAMPLE_RATE_HZ);
    }

    #[test]
    fn test_estimate_fs_ignores_jitter() {
        let ts = vec![0.0, 0.01, 0.02, 0.02, 0.03, 0.09, 0.10];
        assert!((estimate_fs(&ts) - 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_percentile_monotonic() {
        let mut data: Vec<f64> = (0..37).map(|i| ((i * 7919) % 101) as f64 / 3.0).collect();
        data.sort_by(|a, b| a.total_cmp(b));

        let mut last = f64::NEG_INFINITY;
        for p in 0..=100 {
            let v = percentile(&data, p as f64);
            assert!(v >= last);
            last = v;
        }
        assert_eq!(percentile(&data, 0.0), data[0]);
        assert_eq!(percentile(&data, 100.0), data[data.len() - 1]);
    }

    #[test]
    fn test_percentile_interpolates() {
        let data = [0.0, 10.0];
        assert!((percentile(&data, 25.0) - 2.5).abs() < 1e-12);
        assert_eq!(percentile(&[], 50.0), 0.0);
    }

    #[test]
    fn test_goertzel_degenerate_input() {
        assert_eq!(goertzel_power(&[1.0; 7], 50.0, 2.0), 0.0);
        assert_eq!(goertzel_power(&[1.0; 64], 0.0, 2.0), 0.0);
        assert_eq!(goertzel_power(&[1.0; 64], 50.0, -1.0), 0.0);
        assert_eq!(goertzel_power(&[1.0; 64], f64::NAN, 2.0), 0.0);
    }

    #[test]
    fn test_goertzel_peaks_at_signal_frequency() {
        let x = sine(2.0, 50.0, 200, 1.0);
        let on = goertzel_power(&x, 50.0, 2.0);
        let off = goertzel_power(&x, 50.0, 3.5);
        assert!(on > 100.0 * off.max(1e-12));
    }

    #[test]
    fn test_dominant_frequency_picks_closest_bin() {
        // 200 samples at 50 Hz: bins 1.0, 1.5, ..., 4.0 are exact DFT bins.
        let x = sine(2.0, 50.0, 200, 1.0);
        let f = dominant_freq_goertzel(&x, 50.0, 1.0, 4.0, 7);
        assert!((f - 2.0).abs() < 1e-9);

        let x = sine(3.5, 50.0, 200, 0.5);
        let f = dominant_freq_goertzel(&x, 50.0, 1.0, 4.0, 7);
        assert!((f - 3.5).abs() < 1e-9);
    }

    #[test]
    fn test_dominant_frequency_tie_breaks_low() {
        // A constant has zero power everywhere.
        let f = dominant_freq_goertzel(&[1.0; 64], 50.0, 1.0, 4.0, 7);
        assert_eq!(f, 1.0);
        assert_eq!(dominant_freq_goertzel(&[1.0; 64], 50.0, 5.0, 4.0, 7), 0.0);
    }

    #[test]
    fn test_scan_respects_nyquist() {
        let freqs = scan_frequencies(8.0, 0.5, 10.0, 5);
        assert_eq!(freqs.len(), 5);
        assert!(freqs.iter().all(|&f| f < 4.0));
        assert!(scan_frequencies(50.0, 1.0, 4.0, 0).is_empty());
    }

    #[test]
    fn test_spectral_entropy_extremes() {
        let freqs = [1.0, 1.5, 2.0, 2.5, 3.0, 3.5, 4.0];

        let single = sine(2.5, 50.0, 200, 1.0);
        let h_single = spectral_entropy_goertzel(&single, 50.0, 1.0, 4.0, 7);
        assert!(h_single < 0.05, "single-bin entropy was {h_single}");

        let mut flat = vec![0.0; 200];
        for f in freqs {
            for (v, s) in flat.iter_mut().zip(sine(f, 50.0, 200, 1.0)) {
                *v += s;
            }
        }
        let h_flat = spectral_entropy_goertzel(&flat, 50.0, 1.0, 4.0, 7);
        assert!(h_flat > 0.95, "flat entropy was {h_flat}");
    }

    #[test]
    fn test_spectral_entropy_zero_power() {
        assert_eq!(spectral_entropy_goertzel(&[0.0; 100], 50.0, 0.5, 5.0, 20), 0.0);
    }

    #[test]
    fn test_band_energy_scales_with_amplitude() {
        let small = band_energy_goertzel(&sine(2.0, 50.0, 200, 1.0), 50.0, 1.0, 4.0, 7);
        let large = band_energy_goertzel(&sine(2.0, 50.0, 200, 2.0), 50.0, 1.0, 4.0, 7);
        assert!((large / small - 4.0).abs() < 1e-6);
        assert_eq!(band_energy_goertzel(&[], 50.0, 1.0, 4.0, 7), 0.0);
    }
}
