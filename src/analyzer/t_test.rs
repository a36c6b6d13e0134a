// Student two-sample t-test (pooled variance), one-sided: after > before.
use crate::analyzer::descriptive::{mean, sample_variance};
use crate::model::StatsError;
use statrs::distribution::{ContinuousCDF, StudentsT};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TTestResult {
    pub t: f64,
    pub degrees_of_freedom: f64,
    pub p_value: f64,
}

pub fn student_t_greater(after: &[f64], before: &[f64]) -> Result<TTestResult, StatsError> {
    let n1 = after.len();
    let n2 = before.len();
    let (Some(var1), Some(var2)) = (sample_variance(after), sample_variance(before)) else {
        return Err(StatsError::InsufficientSample {
            needed: 2,
            got: n1.min(n2),
        });
    };

    let df = (n1 + n2 - 2) as f64;
    let pooled = ((n1 - 1) as f64 * var1 + (n2 - 1) as f64 * var2) / df;
    if pooled <= 0.0 {
        return Err(StatsError::ZeroVariance);
    }
    let standard_error = (pooled * (1.0 / n1 as f64 + 1.0 / n2 as f64)).sqrt();
    let t = (mean(after) - mean(before)) / standard_error;

    let dist = StudentsT::new(0.0, 1.0, df).map_err(|e| StatsError::Distribution(e.to_string()))?;
    Ok(TTestResult {
        t,
        degrees_of_freedom: df,
        p_value: dist.sf(t),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clear_increase() {
        let before = [100.0, 102.0, 98.0, 101.0, 99.0, 100.0, 103.0, 97.0];
        let after = [120.0, 118.0, 122.0, 119.0, 121.0, 120.0, 117.0, 123.0];
        let result = student_t_greater(&after, &before).unwrap();
        assert_eq!(result.degrees_of_freedom, 14.0);
        assert!(result.t > 10.0);
        assert!(result.p_value < 1e-6);
    }

    #[test]
    fn test_identical_means_give_half() {
        let a = [1.0, 2.0, 3.0, 4.0];
        let result = student_t_greater(&a, &a).unwrap();
        assert!(result.t.abs() < 1e-12);
        assert!((result.p_value - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_degenerate_samples() {
        assert!(matches!(
            student_t_greater(&[1.0], &[1.0, 2.0]),
            Err(StatsError::InsufficientSample { .. })
        ));
        assert_eq!(
            student_t_greater(&[2.0, 2.0], &[1.0, 1.0]).unwrap_err(),
            StatsError::ZeroVariance
        );
    }
}
