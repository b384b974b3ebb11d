//! Statistical outlier filter over a bucket.
//!
//! Each creator is compared with the mean and standard deviation of the other
//! members of the bucket, so a single extreme value cannot inflate the spread
//! it is measured against.

use crate::ranking::aggregate::BucketEntry;
use crate::ranking::weights::Metric;

/// Smallest bucket the filter applies to.
pub const MIN_BUCKET_SIZE: usize = 3;
/// Minimum creators with a non-zero value for a metric to be tested.
pub const MIN_NONZERO: usize = 5;

/// Remove creators whose value for any metric exceeds
/// `mean + sigma * stddev` of the other creators.
///
/// Never returns an empty set for non-empty input.
#[must_use]
pub fn filter_outliers(entries: Vec<BucketEntry>, sigma: f64) -> Vec<BucketEntry> {
    if entries.len() < MIN_BUCKET_SIZE || !sigma.is_finite() {
        return entries;
    }

    let mut excluded = vec![false; entries.len()];
    for metric in Metric::ALL {
        let values: Vec<f64> = entries
            .iter()
            .map(|e| e.stats.metric(metric) as f64)
            .collect();
        if values.iter().filter(|v| **v > 0.0).count() < MIN_NONZERO {
            continue;
        }
        for (i, value) in values.iter().enumerate() {
            if excluded[i] {
                continue;
            }
            let Some((mean, std)) = mean_std_excluding(&values, i) else {
                continue;
            };
            // No spread among the others means there is nothing to measure against.
            if std > 0.0 && *value > mean + sigma * std {
                tracing::debug!(
                    "Excluding {} as outlier on {:?}: {} > {:.1} + {}x{:.1}",
                    entries[i].display_name,
                    metric,
                    value,
                    mean,
                    sigma,
                    std
                );
                excluded[i] = true;
            }
        }
    }

    if excluded.iter().all(|x| *x) {
        tracing::warn!("Outlier filter would exclude every creator; keeping the bucket as is");
        return entries;
    }

    let removed = excluded.iter().filter(|x| **x).count();
    if removed > 0 {
        tracing::info!("Outlier filter removed {removed} of {} creators", entries.len());
    }
    entries
        .into_iter()
        .zip(excluded)
        .filter_map(|(e, x)| (!x).then_some(e))
        .collect()
}

/// Population mean and standard deviation of `values` without index `skip`.
fn mean_std_excluding(values: &[f64], skip: usize) -> Option<(f64, f64)> {
    let n = values.len().checked_sub(1).filter(|n| *n > 0)? as f64;
    let others = || {
        values
            .iter()
            .enumerate()
            .filter(move |(i, _)| *i != skip)
            .map(|(_, v)| *v)
    };
    let mean = others().sum::<f64>() / n;
    let variance = others().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    Some((mean, variance.sqrt()))
}
