//! Loudness (phons) to sound pressure level conversion.
//!
//! Implements the ISO 226:2003 equal-loudness contours. Between tabulated
//! frequencies the level is interpolated linearly on a log-frequency axis;
//! outside the table (infinities included) the nearest tabulated frequency
//! is used. A NaN frequency yields a NaN level.

/// Converts a loudness level at a frequency to dB SPL
pub trait LoudnessModel {
    /// SPL in dB of a tone at `frequency` Hz perceived as `phons` loud
    fn loudness_to_spl(&self, phons: i32, frequency: f64) -> f64;
}

const FREQUENCIES: [f64; 29] = [
    20.0, 25.0, 31.5, 40.0, 50.0, 63.0, 80.0, 100.0, 125.0, 160.0, 200.0, 250.0, 315.0, 400.0,
    500.0, 630.0, 800.0, 1000.0, 1250.0, 1600.0, 2000.0, 2500.0, 3150.0, 4000.0, 5000.0, 6300.0,
    8000.0, 10000.0, 12500.0,
];

// Exponent of loudness perception
const ALPHA_F: [f64; 29] = [
    0.532, 0.506, 0.480, 0.455, 0.432, 0.409, 0.387, 0.367, 0.349, 0.330, 0.315, 0.301, 0.288,
    0.276, 0.267, 0.259, 0.253, 0.250, 0.246, 0.244, 0.243, 0.243, 0.243, 0.242, 0.242, 0.245,
    0.254, 0.271, 0.301,
];

// Magnitude of the linear transfer function normalized at 1 kHz
const L_U: [f64; 29] = [
    -31.6, -27.2, -23.0, -19.1, -15.9, -13.0, -10.3, -8.1, -6.2, -4.5, -3.1, -2.0, -1.1, -0.4,
    0.0, 0.3, 0.5, 0.0, -2.7, -4.1, -1.0, 1.7, 2.5, 1.2, -2.1, -7.1, -11.2, -10.7, -3.1,
];

// Threshold of hearing
const T_F: [f64; 29] = [
    78.5, 68.7, 59.5, 51.1, 44.0, 37.5, 31.5, 26.5, 22.1, 17.9, 14.4, 11.4, 8.6, 6.2, 4.4, 3.0,
    2.2, 2.4, 3.5, 1.7, -1.3, -4.2, -6.0, -5.4, -1.5, 6.0, 12.6, 13.9, 12.3,
];

/// ISO 226:2003 equal-loudness contours
#[derive(Debug, Clone, Copy, Default)]
pub struct Iso226;

impl Iso226 {
    fn level_at_index(index: usize, phons: f64) -> f64 {
        let af = ALPHA_F[index];
        let lu = L_U[index];
        let tf = T_F[index];
        let a_f = 4.47e-3 * (10f64.powf(0.025 * phons) - 1.15)
            + (0.4 * 10f64.powf((tf + lu) / 10.0 - 9.0)).powf(af);
        (10.0 / af) * a_f.log10() - lu + 94.0
    }

    /// Frequencies at which the contours are tabulated
    #[must_use]
    pub fn tabulated_frequencies() -> &'static [f64] {
        &FREQUENCIES
    }
}

impl LoudnessModel for Iso226 {
    fn loudness_to_spl(&self, phons: i32, frequency: f64) -> f64 {
        if frequency.is_nan() {
            return f64::NAN;
        }
        let phons = f64::from(phons);
        let last = FREQUENCIES.len() - 1;
        if frequency <= FREQUENCIES[0] {
            return Self::level_at_index(0, phons);
        }
        if frequency >= FREQUENCIES[last] {
            return Self::level_at_index(last, phons);
        }

        let upper = FREQUENCIES.partition_point(|&f| f <= frequency);
        let lower = upper - 1;
        let low = Self::level_at_index(lower, phons);
        let high = Self::level_at_index(upper, phons);
        let t = (frequency.log10() - FREQUENCIES[lower].log10())
            / (FREQUENCIES[upper].log10() - FREQUENCIES[lower].log10());
        t.mul_add(high - low, low)
    }
}

/// SPL curves for each loudness level over `frequencies`.
///
/// Row `i` holds the levels for `phons_levels[i]`, one per frequency.
#[must_use]
pub fn equal_loudness_contours<M: LoudnessModel>(
    model: &M,
    phons_levels: &[i32],
    frequencies: &[f64],
) -> Vec<Vec<f64>> {
    phons_levels
        .iter()
        .map(|&phons| {
            frequencies
                .iter()
                .map(|&frequency| model.loudness_to_spl(phons, frequency))
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_frequency_is_identity() {
        let model = Iso226;
        for phons in [20, 40, 60, 80] {
            let spl = model.loudness_to_spl(phons, 1000.0);
            assert!((spl - f64::from(phons)).abs() < 0.1, "{phons} phon -> {spl} dB");
        }
    }

    #[test]
    fn test_low_frequencies_need_more_level() {
        let model = Iso226;
        let at_20 = model.loudness_to_spl(40, 20.0);
        assert!((at_20 - 99.85).abs() < 0.1, "got {at_20}");
        assert!(model.loudness_to_spl(40, 100.0) > model.loudness_to_spl(40, 1000.0));
    }

    #[test]
    fn test_ear_canal_resonance_dip() {
        let model = Iso226;
        let at_4k = model.loudness_to_spl(40, 4000.0);
        assert!((at_4k - 36.65).abs() < 0.1, "got {at_4k}");
    }

    #[test]
    fn test_interpolation_is_between_neighbours() {
        let model = Iso226;
        let low = model.loudness_to_spl(60, 100.0);
        let high = model.loudness_to_spl(60, 125.0);
        let mid = model.loudness_to_spl(60, 112.0);
        assert!(mid < low && mid > high, "{high} < {mid} < {low}");
    }

    #[test]
    fn test_clamps_outside_table() {
        let model = Iso226;
        assert!(
            (model.loudness_to_spl(40, 10.0) - model.loudness_to_spl(40, 20.0)).abs()
                < f64::EPSILON
        );
        assert!(
            (model.loudness_to_spl(40, 20000.0) - model.loudness_to_spl(40, 12500.0)).abs()
                < f64::EPSILON
        );
    }

    #[test]
    fn test_contours_shape() {
        let contours = equal_loudness_contours(&Iso226, &[0, 10, 20], &[100.0, 1000.0]);
        assert_eq!(contours.len(), 3);
        assert!(contours.iter().all(|row| row.len() == 2));
        assert!(contours[2][1] > contours[0][1]);
    }

    #[test]
    fn test_non_finite_frequencies() {
        let model = Iso226;
        assert!(model.loudness_to_spl(40, f64::NAN).is_nan());
        assert!(
            (model.loudness_to_spl(40, f64::NEG_INFINITY) - model.loudness_to_spl(40, 20.0)).abs()
                < f64::EPSILON
        );
        assert!(
            (model.loudness_to_spl(40, f64::INFINITY) - model.loudness_to_spl(40, 12500.0)).abs()
                < f64::EPSILON
        );
    }
}
