// One-sided Mann-Whitney U test: is `after` stochastically greater than `before`?
use crate::model::StatsError;
use statrs::distribution::{ContinuousCDF, Normal};

/// Largest group size for which the exact null distribution is used.
const EXACT_MAX_GROUP: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PValueMethod {
    Exact,
    Asymptotic,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankTestResult {
    /// U statistic of the `after` sample.
    pub u: f64,
    pub p_value: f64,
    pub method: PValueMethod,
}

/// Average ranks (1-based) of `values` plus the size of every tie group.
fn rank_with_ties(values: &[f64]) -> (Vec<f64>, Vec<usize>) {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut ties = Vec::new();
    let mut start = 0;
    while start < order.len() {
        let mut end = start;
        while end + 1 < order.len() && values[order[end + 1]] == values[order[start]] {
            end += 1;
        }
        let avg_rank = (start + end) as f64 / 2.0 + 1.0;
        for &idx in &order[start..=end] {
            ranks[idx] = avg_rank;
        }
        ties.push(end - start + 1);
        start = end + 1;
    }
    (ranks, ties)
}

/// Frequencies of every U value (0..=m*n) under the null for group sizes `m` and `n`.
fn exact_u_frequencies(m: usize, n: usize) -> Vec<f64> {
    // table[i][j] holds the frequencies for sizes (i, j)
    let mut table: Vec<Vec<Vec<f64>>> = vec![vec![Vec::new(); n + 1]; m + 1];
    for i in 0..=m {
        for j in 0..=n {
            if i == 0 || j == 0 {
                table[i][j] = vec![1.0];
                continue;
            }
            let mut freq = vec![0.0; i * j + 1];
            for (u, count) in table[i - 1][j].iter().enumerate() {
                freq[u + j] += count;
            }
            for (u, count) in table[i][j - 1].iter().enumerate() {
                freq[u] += count;
            }
            table[i][j] = freq;
        }
    }
    std::mem::take(&mut table[m][n])
}

pub fn mann_whitney_greater(after: &[f64], before: &[f64]) -> Result<RankTestResult, StatsError> {
    let n1 = after.len();
    let n2 = before.len();
    if n1 == 0 || n2 == 0 {
        return Err(StatsError::InsufficientSample {
            needed: 1,
            got: n1.min(n2),
        });
    }

    let combined: Vec<f64> = after.iter().chain(before).copied().collect();
    let (ranks, ties) = rank_with_ties(&combined);
    let rank_sum_after: f64 = ranks[..n1].iter().sum();
    let u = rank_sum_after - (n1 * (n1 + 1)) as f64 / 2.0;

    let has_ties = ties.iter().any(|&t| t > 1);
    if !has_ties && n1 <= EXACT_MAX_GROUP && n2 <= EXACT_MAX_GROUP {
        let freq = exact_u_frequencies(n1, n2);
        let total: f64 = freq.iter().sum();
        let u_index = u.round() as usize;
        let upper: f64 = freq[u_index..].iter().sum();
        return Ok(RankTestResult {
            u,
            p_value: upper / total,
            method: PValueMethod::Exact,
        });
    }

    let n = (n1 + n2) as f64;
    let tie_term: f64 = ties.iter().map(|&t| (t.pow(3) - t) as f64).sum();
    let variance = (n1 * n2) as f64 / 12.0 * ((n + 1.0) - tie_term / (n * (n - 1.0)));
    if variance <= 0.0 {
        // Every value tied: no evidence either way.
        return Ok(RankTestResult {
            u,
            p_value: 1.0,
            method: PValueMethod::Asymptotic,
        });
    }
    let mu = (n1 * n2) as f64 / 2.0;
    let z = (u - mu - 0.5) / variance.sqrt();
    let normal = Normal::new(0.0, 1.0).map_err(|e| StatsError::Distribution(e.to_string()))?;

    Ok(RankTestResult {
        u,
        p_value: normal.sf(z),
        method: PValueMethod::Asymptotic,
    })
}
