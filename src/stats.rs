//! Citation statistics over papers.
//!
//! [`LogCitationSums`] is the running accumulator every aggregate carries;
//! [`CorpusStatistics`] is the prior derived from the sums over a whole corpus.

use serde::Serialize;
use std::ops::AddAssign;

use crate::analysis::utility::{is_degenerate_variance, log_citation, mean_variance};
use crate::error::EngineError;
use crate::records::{GrantRecord, Product};

/// Running paper, citation and log-citation totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LogCitationSums {
    pub papers: u64,
    pub papers_with_citations: u64,
    pub citations: f64,
    pub sum_log: f64,
    pub sum_squared_log: f64,
}

impl LogCitationSums {
    pub fn from_products(products: &[Product]) -> Self {
        let mut s = Self::default();
        for p in products {
            s.add_product(p);
        }
        s
    }

    pub fn add_product(&mut self, product: &Product) {
        let citations = product.citations();
        let log = log_citation(citations);

        self.papers += 1;
        if product.citation_count.is_some() {
            self.papers_with_citations += 1;
        }
        self.citations += citations;
        self.sum_log += log;
        self.sum_squared_log += log * log;
    }

    /// Mean and population variance of the log-citation values.
    pub fn mean_variance(&self) -> Option<(f64, f64)> {
        mean_variance(self.sum_log, self.sum_squared_log, self.papers)
    }
}

impl AddAssign for LogCitationSums {
    fn add_assign(&mut self, rhs: Self) {
        self.papers += rhs.papers;
        self.papers_with_citations += rhs.papers_with_citations;
        self.citations += rhs.citations;
        self.sum_log += rhs.sum_log;
        self.sum_squared_log += rhs.sum_squared_log;
    }
}

/// Prior for the citation estimator, computed once over every paper of the
/// full corpus. It goes stale as soon as the corpus changes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CorpusStatistics {
    pub mean_log_citation: f64,
    pub variance_log_citation: f64,
    pub papers: u64,
    pub papers_with_citations: u64,
}

impl CorpusStatistics {
    /// Builds a prior from known values, e.g. one computed by an earlier run.
    pub fn new(mean_log_citation: f64, variance_log_citation: f64) -> Result<Self, EngineError> {
        if !mean_log_citation.is_finite()
            || !variance_log_citation.is_finite()
            || variance_log_citation <= 0.0
        {
            return Err(EngineError::InsufficientCorpusData {
                papers_with_citations: 0,
                variance: variance_log_citation,
            });
        }
        Ok(Self {
            mean_log_citation,
            variance_log_citation,
            papers: 0,
            papers_with_citations: 0,
        })
    }

    /// Computes the prior over every paper of every valid record.
    pub fn from_records<'a, I>(records: I) -> Result<Self, EngineError>
    where
        I: IntoIterator<Item = &'a GrantRecord>,
    {
        let mut sums = LogCitationSums::default();
        for record in records {
            if record.validate().is_ok() {
                sums += LogCitationSums::from_products(&record.products);
            }
        }
        Self::from_sums(&sums)
    }

    pub fn from_sums(sums: &LogCitationSums) -> Result<Self, EngineError> {
        let insufficient = |variance: f64| EngineError::InsufficientCorpusData {
            papers_with_citations: sums.papers_with_citations,
            variance,
        };

        if sums.papers_with_citations < 2 {
            return Err(insufficient(0.0));
        }
        let (mean, variance) = sums.mean_variance().ok_or_else(|| insufficient(0.0))?;
        if is_degenerate_variance(variance, mean) {
            return Err(insufficient(variance));
        }

        Ok(Self {
            mean_log_citation: mean,
            variance_log_citation: variance,
            papers: sums.papers,
            papers_with_citations: sums.papers_with_citations,
        })
    }
}
