// Chooses between the rank test and the t-test from the normality diagnostic.
use crate::analyzer::normality::NormalityCheck;
use serde::Deserialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct TestPolicy {
    /// Shapiro-Wilk level below which a window is treated as non-normal.
    pub normality_alpha: f64,
    /// Smallest group size for which a passed normality check is trusted.
    pub min_parametric_n: usize,
}

impl Default for TestPolicy {
    fn default() -> Self {
        Self {
            normality_alpha: 0.05,
            min_parametric_n: 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestChoice {
    MannWhitneyU,
    StudentT,
}

impl fmt::Display for TestChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestChoice::MannWhitneyU => write!(f, "Mann-Whitney U"),
            TestChoice::StudentT => write!(f, "Student two-sample t-test"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionReason {
    SmallSample { smallest: usize, required: usize },
    NormalityIndeterminate,
    NotNormal,
    NormalAndLargeEnough,
}

impl fmt::Display for SelectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionReason::SmallSample { smallest, required } => write!(
                f,
                "sample of {} per group is below {}, normality cannot be established",
                smallest, required
            ),
            SelectionReason::NormalityIndeterminate => write!(f, "normality could not be assessed"),
            SelectionReason::NotNormal => write!(f, "normality rejected for at least one window"),
            SelectionReason::NormalAndLargeEnough => write!(f, "both windows consistent with normality"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestSelection {
    pub choice: TestChoice,
    pub reason: SelectionReason,
}

pub fn select_test(
    before: &NormalityCheck,
    after: &NormalityCheck,
    n_before: usize,
    n_after: usize,
    policy: &TestPolicy,
) -> TestSelection {
    let rank_test = |reason| TestSelection {
        choice: TestChoice::MannWhitneyU,
        reason,
    };

    let smallest = n_before.min(n_after);
    if smallest < policy.min_parametric_n {
        return rank_test(SelectionReason::SmallSample {
            smallest,
            required: policy.min_parametric_n,
        });
    }
    if matches!(before, NormalityCheck::Indeterminate(_)) || matches!(after, NormalityCheck::Indeterminate(_)) {
        return rank_test(SelectionReason::NormalityIndeterminate);
    }
    if !before.passes(policy.normality_alpha) || !after.passes(policy.normality_alpha) {
        return rank_test(SelectionReason::NotNormal);
    }
    TestSelection {
        choice: TestChoice::StudentT,
        reason: SelectionReason::NormalAndLargeEnough,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::normality::ShapiroWilk;

    fn tested(p_value: f64) -> NormalityCheck {
        NormalityCheck::Tested(ShapiroWilk { w: 0.95, p_value })
    }

    #[test]
    fn test_six_per_group_defaults_to_rank_test() {
        let selection = select_test(&tested(0.9), &tested(0.9), 6, 6, &TestPolicy::default());
        assert_eq!(selection.choice, TestChoice::MannWhitneyU);
        assert_eq!(
            selection.reason,
            SelectionReason::SmallSample { smallest: 6, required: 8 }
        );
    }

    #[test]
    fn test_normal_and_large_enough_picks_t_test() {
        let selection = select_test(&tested(0.4), &tested(0.7), 12, 10, &TestPolicy::default());
        assert_eq!(selection.choice, TestChoice::StudentT);
    }

    #[test]
    fn test_rejected_normality_picks_rank_test() {
        let selection = select_test(&tested(0.4), &tested(0.01), 12, 12, &TestPolicy::default());
        assert_eq!(selection.choice, TestChoice::MannWhitneyU);
        assert_eq!(selection.reason, SelectionReason::NotNormal);
    }

    #[test]
    fn test_indeterminate_normality_picks_rank_test() {
        let indeterminate = NormalityCheck::Indeterminate("zero variance".into());
        let selection = select_test(&indeterminate, &tested(0.5), 12, 12, &TestPolicy::default());
        assert_eq!(selection.reason, SelectionReason::NormalityIndeterminate);
    }

    #[test]
    fn test_lowered_threshold_allows_t_test_at_six() {
        let policy = TestPolicy {
            min_parametric_n: 6,
            ..TestPolicy::default()
        };
        let selection = select_test(&tested(0.5), &tested(0.5), 6, 6, &policy);
        assert_eq!(selection.choice, TestChoice::StudentT);
    }
}
