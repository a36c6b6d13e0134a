// Shapiro-Wilk W test, Royston (1995) approximation (algorithm AS R94).
use crate::model::StatsError;
use statrs::distribution::{ContinuousCDF, Normal};

const MIN_SAMPLE: usize = 3;
const MAX_SAMPLE: usize = 5000;
const RANGE_EPSILON: f64 = 1e-19;

const C1: [f64; 6] = [0.0, 0.221157, -0.147981, -2.071190, 4.434685, -2.706056];
const C2: [f64; 6] = [0.0, 0.042981, -0.293762, -1.752461, 5.682633, -3.582633];
const C3: [f64; 4] = [0.544, -0.39978, 0.025054, -6.714e-4];
const C4: [f64; 4] = [1.3822, -0.77857, 0.062767, -0.0020322];
const C5: [f64; 4] = [-1.5861, -0.31082, -0.083751, 0.0038915];
const C6: [f64; 3] = [-0.4803, -0.082676, 0.0030302];
const G: [f64; 2] = [-2.273, 0.459];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapiroWilk {
    pub w: f64,
    pub p_value: f64,
}

/// Outcome of the normality diagnostic for one window.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalityCheck {
    Tested(ShapiroWilk),
    Indeterminate(String),
}

impl NormalityCheck {
    pub fn run(values: &[f64]) -> Self {
        match shapiro_wilk(values) {
            Ok(result) => NormalityCheck::Tested(result),
            Err(e) => NormalityCheck::Indeterminate(e.to_string()),
        }
    }

    /// True when normality is not rejected at `alpha`.
    pub fn passes(&self, alpha: f64) -> bool {
        match self {
            NormalityCheck::Tested(sw) => sw.p_value > alpha,
            NormalityCheck::Indeterminate(_) => false,
        }
    }
}

fn poly(coefficients: &[f64], x: f64) -> f64 {
    coefficients.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

/// Half of the antisymmetric coefficient vector (largest weight first).
fn coefficients(n: usize, normal: &Normal) -> Vec<f64> {
    let half = n / 2;
    if n == 3 {
        return vec![std::f64::consts::FRAC_1_SQRT_2];
    }

    let an25 = n as f64 + 0.25;
    let m: Vec<f64> = (1..=half)
        .map(|i| normal.inverse_cdf((i as f64 - 0.375) / an25))
        .collect();
    let summ2 = 2.0 * m.iter().map(|v| v * v).sum::<f64>();
    let ssumm2 = summ2.sqrt();
    let rsn = 1.0 / (n as f64).sqrt();
    let a1 = poly(&C1, rsn) - m[0] / ssumm2;

    let mut a = vec![0.0; half];
    let (first_free, fac) = if n > 5 {
        let a2 = -m[1] / ssumm2 + poly(&C2, rsn);
        let fac = ((summ2 - 2.0 * m[0].powi(2) - 2.0 * m[1].powi(2))
            / (1.0 - 2.0 * a1.powi(2) - 2.0 * a2.powi(2)))
        .sqrt();
        a[1] = a2;
        (2, fac)
    } else {
        let fac = ((summ2 - 2.0 * m[0].powi(2)) / (1.0 - 2.0 * a1.powi(2))).sqrt();
        (1, fac)
    };
    a[0] = a1;
    for i in first_free..half {
        a[i] = -m[i] / fac;
    }
    a
}

pub fn shapiro_wilk(values: &[f64]) -> Result<ShapiroWilk, StatsError> {
    let n = values.len();
    if n < MIN_SAMPLE {
        return Err(StatsError::InsufficientSample {
            needed: MIN_SAMPLE,
            got: n,
        });
    }
    if n > MAX_SAMPLE {
        return Err(StatsError::Distribution(format!(
            "Shapiro-Wilk supports at most {} observations, got {}",
            MAX_SAMPLE, n
        )));
    }

    let mut x = values.to_vec();
    x.sort_by(|a, b| a.total_cmp(b));
    if x[n - 1] - x[0] < RANGE_EPSILON {
        return Err(StatsError::ZeroVariance);
    }

    let normal = Normal::new(0.0, 1.0).map_err(|e| StatsError::Distribution(e.to_string()))?;
    let a = coefficients(n, &normal);

    let mean = x.iter().sum::<f64>() / n as f64;
    let ssq = x.iter().map(|v| (v - mean).powi(2)).sum::<f64>();
    let numerator: f64 = a
        .iter()
        .enumerate()
        .map(|(i, ai)| ai * (x[n - 1 - i] - x[i]))
        .sum();
    let w = (numerator * numerator / ssq).min(1.0);

    if n == 3 {
        let p = 6.0 / std::f64::consts::PI * (w.sqrt().asin() - std::f64::consts::FRAC_PI_3);
        return Ok(ShapiroWilk {
            w,
            p_value: p.max(0.0),
        });
    }

    let mut y = (1.0 - w).ln();
    let an = n as f64;
    let (m, s) = if n <= 11 {
        let gamma = poly(&G, an);
        if y >= gamma {
            return Ok(ShapiroWilk { w, p_value: 0.0 });
        }
        y = -(gamma - y).ln();
        (poly(&C3, an), poly(&C4, an).exp())
    } else {
        let ln_n = an.ln();
        (poly(&C5, ln_n), poly(&C6, ln_n).exp())
    };

    Ok(ShapiroWilk {
        w,
        p_value: normal.sf((y - m) / s),
    })
}
