//! Savitzky-Golay smoothing
//!
//! Local least-squares polynomial fits over a sliding window. Interior samples
//! use the window centred on them (for even windows, the fit is read at the
//! window's fractional centre, as scipy's `savgol_filter` does); the first and
//! last half-windows are evaluated from a single fit over the first/last full
//! window.

use nalgebra::DMatrix;

use crate::error::ComputeError;

/// Savitzky-Golay filter parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavitzkyGolay {
    pub window: usize,
    pub polyorder: usize,
}

impl SavitzkyGolay {
    pub fn new(window: usize, polyorder: usize) -> Result<Self, ComputeError> {
        if window == 0 {
            return Err(ComputeError::InvalidParameter(
                "window length must be positive".to_string(),
            ));
        }
        if polyorder >= window {
            return Err(ComputeError::InvalidParameter(format!(
                "polyorder ({polyorder}) must be less than window length ({window})"
            )));
        }
        Ok(Self { window, polyorder })
    }

    /// Smoothed series, same length as the input
    pub fn smooth(&self, values: &[f64]) -> Result<Vec<f64>, ComputeError> {
        self.apply(values, 0)
    }

    /// First derivative (per sample) of the local fits
    pub fn derivative(&self, values: &[f64]) -> Result<Vec<f64>, ComputeError> {
        self.apply(values, 1)
    }

    /// Evaluate the `deriv`-th derivative of the local polynomial fits
    pub fn apply(&self, values: &[f64], deriv: usize) -> Result<Vec<f64>, ComputeError> {
        let n = values.len();
        if self.window > n {
            return Err(ComputeError::too_short(self.window, n));
        }
        if deriv > self.polyorder {
            return Ok(vec![0.0; n]);
        }

        let half = self.window / 2;
        let projection = self.projection()?;
        let fit = |start: usize| -> Vec<f64> {
            let window = &values[start..start + self.window];
            (0..=self.polyorder)
                .map(|j| {
                    (0..self.window)
                        .map(|i| projection[(j, i)] * window[i])
                        .sum()
                })
                .collect()
        };

        let mut output = vec![0.0; n];

        let head = fit(0);
        for (i, out) in output.iter_mut().enumerate().take(half.min(n)) {
            *out = evaluate(&head, i as f64 - half as f64, deriv);
        }

        let tail_start = n - self.window;
        let tail = fit(tail_start);
        for (i, out) in output.iter_mut().enumerate().skip(n - half) {
            *out = evaluate(&tail, (i - tail_start) as f64 - half as f64, deriv);
        }

        // Even windows have no middle sample: sample `i` reads the window
        // starting at `i - half + 1` at its fractional centre
        let (lead, offset) = if self.window % 2 == 0 {
            (half - 1, -0.5)
        } else {
            (half, 0.0)
        };
        for i in half..n - half {
            let coefficients = fit(i - lead);
            output[i] = evaluate(&coefficients, offset, deriv);
        }

        Ok(output)
    }

    /// Least-squares projection onto polynomial coefficients, with local
    /// coordinates centred on the window's middle sample
    fn projection(&self) -> Result<DMatrix<f64>, ComputeError> {
        let half = (self.window / 2) as f64;
        let vandermonde = DMatrix::from_fn(self.window, self.polyorder + 1, |i, j| {
            (i as f64 - half).powi(j as i32)
        });
        vandermonde
            .pseudo_inverse(1e-12)
            .map_err(|e| ComputeError::InvalidParameter(format!("Savitzky-Golay fit failed: {e}")))
    }
}

/// Evaluate the `deriv`-th derivative of `sum c_j t^j` at `t`
fn evaluate(coefficients: &[f64], t: f64, deriv: usize) -> f64 {
    coefficients
        .iter()
        .enumerate()
        .skip(deriv)
        .map(|(j, c)| {
            let falling: f64 = ((j - deriv + 1)..=j).map(|k| k as f64).product();
            c * falling * t.powi((j - deriv) as i32)
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_preserves_polynomials_up_to_order() {
        let filter = SavitzkyGolay::new(7, 2).unwrap();
        let values: Vec<f64> = (0..30).map(|i| 0.5 * (i as f64).powi(2) - 3.0 * i as f64 + 1.0).collect();

        let smoothed = filter.smooth(&values).unwrap();
        let derivative = filter.derivative(&values).unwrap();

        for (i, (s, d)) in smoothed.iter().zip(derivative.iter()).enumerate() {
            assert_relative_eq!(*s, values[i], epsilon = 1e-8);
            assert_relative_eq!(*d, i as f64 - 3.0, epsilon = 1e-8);
        }
    }

    #[test]
    fn test_order_one_interior_is_moving_average() {
        let filter = SavitzkyGolay::new(5, 1).unwrap();
        let values = [1.0, 4.0, 2.0, 8.0, 5.0, 7.0, 3.0, 6.0];
        let smoothed = filter.smooth(&values).unwrap();

        assert_eq!(smoothed.len(), values.len());
        for i in 2..values.len() - 2 {
            let expected: f64 = values[i - 2..=i + 2].iter().sum::<f64>() / 5.0;
            assert_relative_eq!(smoothed[i], expected, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_even_window_reads_fractional_centre() {
        let filter = SavitzkyGolay::new(60, 1).unwrap();
        let line = |t: f64| 3.0 + 0.001 * t;
        let values: Vec<f64> = (0..300).map(|i| line(i as f64)).collect();
        let smoothed = filter.smooth(&values).unwrap();
        let slope = filter.derivative(&values).unwrap();
        assert_eq!(smoothed.len(), 300);

        for i in (0..30).chain(270..300) {
            assert_relative_eq!(smoothed[i], line(i as f64), epsilon = 1e-9);
        }
        for i in 30..270 {
            assert_relative_eq!(smoothed[i], line(i as f64 + 0.5), epsilon = 1e-9);
        }
        for d in slope {
            assert_relative_eq!(d, 0.001, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_even_window_interior_is_shifted_moving_average() {
        let filter = SavitzkyGolay::new(4, 1).unwrap();
        let values = [1.0, 4.0, 2.0, 8.0, 5.0, 7.0, 3.0, 6.0];
        let smoothed = filter.smooth(&values).unwrap();

        for i in 2..values.len() - 2 {
            let expected: f64 = values[i - 1..=i + 2].iter().sum::<f64>() / 4.0;
            assert_relative_eq!(smoothed[i], expected, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_rejects_window_longer_than_input() {
        let filter = SavitzkyGolay::new(7, 2).unwrap();
        assert!(matches!(
            filter.smooth(&[1.0, 2.0, 3.0]),
            Err(ComputeError::InsufficientSignalLength { required: 7, actual: 3 })
        ));
    }

    #[test]
    fn test_rejects_order_not_below_window() {
        assert!(SavitzkyGolay::new(3, 3).is_err());
        assert!(SavitzkyGolay::new(0, 0).is_err());
    }
}
