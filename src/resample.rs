//! Resampling onto canonical lengths
//!
//! - [`resample_fft`]: band-limited resampling to an exact sample count
//! - [`interpolate_linear`]: linear re-indexing of irregularly emitted values

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

use crate::error::ComputeError;
use crate::normalizer::is_constant;

/// Minimum input length accepted by both operations
pub const MIN_RESAMPLE_LENGTH: usize = 2;

/// Resample `values` to exactly `num` samples in the Fourier domain.
///
/// The spectrum is truncated (downsampling) or zero-padded (upsampling); an
/// even-length Nyquist bin is folded or split so the result stays real, and
/// the output is scaled by `num / len`.
pub fn resample_fft(values: &[f64], num: usize) -> Result<Vec<f64>, ComputeError> {
    let nx = values.len();
    if nx < MIN_RESAMPLE_LENGTH {
        return Err(ComputeError::too_short(MIN_RESAMPLE_LENGTH, nx));
    }
    if num == 0 {
        return Err(ComputeError::InvalidParameter(
            "resample target length must be positive".to_string(),
        ));
    }
    if num == nx {
        return Ok(values.to_vec());
    }
    if is_constant(values) {
        return Ok(vec![values[0]; num]);
    }

    let mut planner = FftPlanner::<f64>::new();

    let mut spectrum: Vec<Complex<f64>> = values.iter().map(|&v| Complex::new(v, 0.0)).collect();
    planner.plan_fft_forward(nx).process(&mut spectrum);

    // One-sided spectrum of the output
    let half = num / 2 + 1;
    let n = num.min(nx);
    let nyq = n / 2 + 1;
    let mut one_sided = vec![Complex::new(0.0, 0.0); half];
    one_sided[..nyq].copy_from_slice(&spectrum[..nyq]);

    if n % 2 == 0 {
        if num < nx {
            one_sided[n / 2] *= 2.0;
        } else if nx < num {
            one_sided[n / 2] *= 0.5;
        }
    }

    // Hermitian extension back to a full spectrum
    let mut full = vec![Complex::new(0.0, 0.0); num];
    full[..half].copy_from_slice(&one_sided);
    for k in 1..half {
        let mirror = num - k;
        if mirror >= half {
            full[mirror] = one_sided[k].conj();
        }
    }
    if num % 2 == 0 {
        full[num / 2] = Complex::new(full[num / 2].re, 0.0);
    }

    planner.plan_fft_inverse(num).process(&mut full);

    // rustfft leaves the inverse unnormalized: 1/num, then the num/nx gain
    let scale = 1.0 / nx as f64;
    Ok(full.iter().map(|c| c.re * scale).collect())
}

/// Linearly interpolate `values` (indexed `0..n`) onto `count` evenly spaced
/// positions spanning the same index range.
pub fn interpolate_linear(values: &[f64], count: usize) -> Result<Vec<f64>, ComputeError> {
    let n = values.len();
    if n < MIN_RESAMPLE_LENGTH {
        return Err(ComputeError::too_short(MIN_RESAMPLE_LENGTH, n));
    }
    if count == 0 {
        return Err(ComputeError::InvalidParameter(
            "interpolation count must be positive".to_string(),
        ));
    }
    if count == 1 {
        return Ok(vec![values[0]]);
    }

    let last = (n - 1) as f64;
    let result = (0..count)
        .map(|j| {
            let x = j as f64 * last / (count - 1) as f64;
            let i = x.floor() as usize;
            if i >= n - 1 {
                return values[n - 1];
            }
            let frac = x - i as f64;
            values[i] + frac * (values[i + 1] - values[i])
        })
        .collect();

    Ok(result)
}
