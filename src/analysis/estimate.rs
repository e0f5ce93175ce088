//! Shrinkage estimate of citations per paper.
//!
//! The group's mean log-citation is combined with the corpus prior by a
//! precision-weighted conjugate-normal update:
//!
//! ```text
//! posterior = (mu0 / var0 + mean / var * n) / (1 / var0 + n / var)
//! estimate  = exp(posterior) - 1
//! ```
//!
//! Small groups regress toward the corpus mean; large groups are dominated by
//! their own observed mean. A group with no papers, or whose papers all share
//! one log-citation value, gets the prior mean unchanged.

use crate::analysis::utility::{inverse_log_citation, is_degenerate_variance, mean_variance};
use crate::stats::{CorpusStatistics, LogCitationSums};

/// Observed log-citation totals of one group.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ObservedStats {
    pub total_papers: u64,
    pub sum_log_citation: f64,
    pub sum_squared_log_citation: f64,
}

impl From<&LogCitationSums> for ObservedStats {
    fn from(sums: &LogCitationSums) -> Self {
        Self {
            total_papers: sums.papers,
            sum_log_citation: sums.sum_log,
            sum_squared_log_citation: sums.sum_squared_log,
        }
    }
}

/// Posterior mean of the log-citation value.
pub fn posterior_mean(group: &ObservedStats, prior: &CorpusStatistics) -> f64 {
    let prior_mean = prior.mean_log_citation;
    let prior_precision = 1.0 / prior.variance_log_citation;

    let Some((observed_mean, observed_variance)) = mean_variance(
        group.sum_log_citation,
        group.sum_squared_log_citation,
        group.total_papers,
    ) else {
        return prior_mean;
    };
    if is_degenerate_variance(observed_variance, observed_mean) {
        return prior_mean;
    }

    let n = group.total_papers as f64;
    let posterior = (prior_mean * prior_precision + observed_mean / observed_variance * n)
        / (prior_precision + n / observed_variance);

    if posterior.is_finite() {
        posterior
    } else {
        prior_mean
    }
}

/// Estimated citations per paper for a group.
pub fn estimate(group: &ObservedStats, prior: &CorpusStatistics) -> f64 {
    inverse_log_citation(posterior_mean(group, prior)).max(0.0)
}
