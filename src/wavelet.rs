//! Discrete wavelet primitives
//!
//! Periodized orthogonal DWT with the least-asymmetric Daubechies wavelet of
//! 16 vanishing moments (symlet-16), plus the modulus-maxima and universal
//! threshold helpers shared by the pupillary activity indices.

use serde::{Deserialize, Serialize};

use crate::config::MaximaBoundary;

/// Symlet-16 reconstruction low-pass filter (sums to sqrt(2), unit energy).
/// Obtained by spectral factorization of the Daubechies polynomial, keeping
/// the root set whose phase is closest to linear.
const SYM16_REC_LO: [f64; 32] = [
    5.359_038_046_268_959e-6,
    -6.387_996_260_198_792e-6,
    -1.001_485_203_696_570_8e-4,
    8.651_115_502_326_690e-5,
    8.745_695_867_130_910e-4,
    -4.449_474_164_188_862e-4,
    -4.539_916_546_908_660_5e-3,
    8.547_749_494_901_028e-4,
    1.470_215_796_027_932_9e-2,
    5.364_340_248_225_064e-4,
    -2.620_964_925_134_758_6e-2,
    7.986_606_099_498_649e-3,
    1.952_133_907_762_910_2e-2,
    -1.167_338_736_422_570_5e-1,
    -1.188_827_319_973_563_1e-1,
    3.231_022_390_642_956_8e-1,
    7.467_880_503_688_456e-1,
    5.367_441_345_860_742e-1,
    2.999_397_311_013_923_9e-2,
    -1.048_631_298_774_843_6e-1,
    4.669_417_556_700_702e-2,
    7.766_352_704_546_800e-2,
    -2.993_448_032_045_679_5e-3,
    -2.297_515_288_816_105_7e-2,
    1.633_824_056_274_031_5e-3,
    6.219_665_992_202_444e-3,
    -4.837_833_239_505_696e-4,
    -1.214_622_299_813_356_2e-3,
    1.179_732_112_114_712_3e-4,
    1.635_552_960_721_369_3e-4,
    -1.496_311_761_917_112_7e-5,
    -1.255_290_600_458_805_8e-5,
];

/// Orthogonal wavelet given by its decomposition filters
#[derive(Debug, Clone, PartialEq)]
pub struct Wavelet {
    name: &'static str,
    dec_lo: Vec<f64>,
    dec_hi: Vec<f64>,
}

impl Default for Wavelet {
    fn default() -> Self {
        Self::sym16()
    }
}

impl Wavelet {
    /// Symlet with 16 vanishing moments (32 taps)
    pub fn sym16() -> Self {
        Self::from_rec_lo("sym16", &SYM16_REC_LO)
    }

    /// Build the decomposition filter pair of an orthogonal wavelet
    fn from_rec_lo(name: &'static str, rec_lo: &[f64]) -> Self {
        let len = rec_lo.len();
        let dec_lo: Vec<f64> = rec_lo.iter().rev().copied().collect();
        let dec_hi = (0..len)
            .map(|k| {
                let sign = if k % 2 == 0 { -1.0 } else { 1.0 };
                sign * dec_lo[len - 1 - k]
            })
            .collect();
        Self {
            name,
            dec_lo,
            dec_hi,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn filter_len(&self) -> usize {
        self.dec_lo.len()
    }

    /// Single-level periodized DWT: `(approximation, detail)`, each of length
    /// `ceil(len / 2)`. Odd inputs are extended by repeating the last sample.
    pub fn dwt(&self, values: &[f64]) -> (Vec<f64>, Vec<f64>) {
        (
            self.convolve_down(values, &self.dec_lo),
            self.convolve_down(values, &self.dec_hi),
        )
    }

    /// Multi-level periodized decomposition
    pub fn wavedec(&self, values: &[f64], levels: usize) -> Decomposition {
        let mut approx = values.to_vec();
        let mut details = Vec::with_capacity(levels);
        for _ in 0..levels {
            let (a, d) = self.dwt(&approx);
            details.push(d);
            approx = a;
        }
        Decomposition { approx, details }
    }

    /// Detail coefficients at `level` only: `level - 1` approximation steps
    /// followed by one detail step
    pub fn detail_at(&self, values: &[f64], level: usize) -> Vec<f64> {
        let mut approx = values.to_vec();
        for _ in 1..level {
            approx = self.convolve_down(&approx, &self.dec_lo);
        }
        self.convolve_down(&approx, &self.dec_hi)
    }

    /// Deepest level at which every coefficient is still free of boundary effects
    pub fn max_level(&self, len: usize) -> usize {
        max_level(len, self.filter_len())
    }

    fn convolve_down(&self, values: &[f64], filter: &[f64]) -> Vec<f64> {
        if values.is_empty() {
            return Vec::new();
        }
        let n = values.len();
        let period = n + n % 2;
        let sample = |i: usize| if i < n { values[i] } else { values[n - 1] };
        let offset = filter.len() / 2;

        (0..period / 2)
            .map(|o| {
                let center = offset + 2 * o;
                filter
                    .iter()
                    .enumerate()
                    .map(|(j, f)| {
                        let idx = (center + period * filter.len() - j) % period;
                        f * sample(idx)
                    })
                    .sum()
            })
            .collect()
    }
}

/// Result of [`Wavelet::wavedec`]
#[derive(Debug, Clone, PartialEq)]
pub struct Decomposition {
    /// Coarsest approximation
    pub approx: Vec<f64>,
    /// Detail bands, `details[0]` is level 1 (finest)
    pub details: Vec<Vec<f64>>,
}

impl Decomposition {
    pub fn levels(&self) -> usize {
        self.details.len()
    }

    /// Detail band at `level` (1-based)
    pub fn detail(&self, level: usize) -> Option<&[f64]> {
        level.checked_sub(1).and_then(|i| self.details.get(i)).map(Vec::as_slice)
    }
}

/// `floor(log2(len / (filter_len - 1)))`, or 0 when the signal is shorter than
/// the filter
pub fn max_level(len: usize, filter_len: usize) -> usize {
    if filter_len < 2 || len < filter_len - 1 {
        return 0;
    }
    let ratio = len / (filter_len - 1);
    (usize::BITS - 1 - ratio.leading_zeros()) as usize
}

/// Thresholding rule applied to modulus maxima
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdMode {
    /// Zero every value with magnitude below the threshold
    Hard,
    /// Zero every value above the threshold
    Less,
}

/// Keep `|d_i|` where the modulus is a local maximum: at least both
/// neighbours and strictly greater than one of them. Missing neighbours
/// compare against the position itself.
pub fn modulus_maxima(coefficients: &[f64], boundary: MaximaBoundary) -> Vec<f64> {
    let n = coefficients.len();
    let modulus: Vec<f64> = coefficients.iter().map(|c| c.abs()).collect();
    let has_right = |i: usize| match boundary {
        MaximaBoundary::Legacy => i + 2 < n,
        MaximaBoundary::Exact => i + 1 < n,
    };

    (0..n)
        .map(|i| {
            let current = modulus[i];
            let left = if i >= 1 { modulus[i - 1] } else { current };
            let right = if has_right(i) { modulus[i + 1] } else { current };
            let is_peak = left <= current
                && current >= right
                && (left < current || current > right);
            if is_peak {
                current
            } else {
                0.0
            }
        })
        .collect()
}

/// Donoho-Johnstone universal threshold `sigma * sqrt(2 * log2(n))`, with the
/// population standard deviation of `values`
pub fn universal_threshold(values: &[f64]) -> f64 {
    let n = values.len();
    if n == 0 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
    variance.sqrt() * (2.0 * (n as f64).log2()).sqrt()
}

/// Apply a threshold rule, zeroing rejected values
pub fn threshold(values: &[f64], lambda: f64, mode: ThresholdMode) -> Vec<f64> {
    values
        .iter()
        .map(|&v| {
            let rejected = match mode {
                ThresholdMode::Hard => v.abs() < lambda,
                ThresholdMode::Less => v > lambda,
            };
            if rejected {
                0.0
            } else {
                v
            }
        })
        .collect()
}
