use crate::types::ArmStats;

pub fn mean(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    Some(samples.iter().sum::<f64>() / samples.len() as f64)
}

/// Sample standard deviation (n - 1 denominator). A single sample has no
/// spread, so it reports 0.0.
pub fn sample_stdev(samples: &[f64]) -> Option<f64> {
    let m = mean(samples)?;
    if samples.len() < 2 {
        return Some(0.0);
    }
    let sum_sq: f64 = samples.iter().map(|x| (x - m) * (x - m)).sum();
    Some((sum_sq / (samples.len() - 1) as f64).sqrt())
}

impl ArmStats {
    /// `None` for an empty sample list.
    pub fn from_samples(samples: &[f64]) -> Option<ArmStats> {
        Some(ArmStats {
            mean: mean(samples)?,
            stdev: sample_stdev(samples)?,
        })
    }
}

/// Percentage change of `exp` relative to `control`. Positive means the
/// experiment is slower.
pub fn percent_delta(control_mean: f64, exp_mean: f64) -> Option<f64> {
    if control_mean == 0.0 {
        return None;
    }
    Some(100.0 * (exp_mean - control_mean) / control_mean)
}
