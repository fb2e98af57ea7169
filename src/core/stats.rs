//! Summary statistics over latency samples.

use serde::{Deserialize, Serialize};

/// Summary of a set of latency samples, all in milliseconds.
///
/// Percentiles interpolate linearly between the nearest ranks. The standard
/// deviation is the sample deviation and needs at least two samples.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingStat {
    pub samples: usize,
    pub mean_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub median_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stddev_ms: Option<f64>,
    pub min_ms: f64,
    pub max_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p95_ms: Option<f64>,
}

impl TimingStat {
    pub fn from_samples(samples: &[f64]) -> Self {
        let mut sorted = samples.to_vec();
        sorted.sort_by(f64::total_cmp);
        let (Some(&min_ms), Some(&max_ms)) = (sorted.first(), sorted.last()) else {
            return TimingStat {
                samples: 0,
                mean_ms: 0.0,
                median_ms: None,
                stddev_ms: None,
                min_ms: 0.0,
                max_ms: 0.0,
                p95_ms: None,
            };
        };

        let n = sorted.len() as f64;
        let mean_ms = sorted.iter().sum::<f64>() / n;
        let stddev_ms = (sorted.len() > 1).then(|| {
            let squares: f64 = sorted.iter().map(|x| (x - mean_ms).powi(2)).sum();
            (squares / (n - 1.0)).sqrt()
        });

        TimingStat {
            samples: sorted.len(),
            mean_ms,
            median_ms: Some(percentile(&sorted, 50.0)),
            stddev_ms,
            min_ms,
            max_ms,
            p95_ms: Some(percentile(&sorted, 95.0)),
        }
    }
}

/// `pct`-th percentile of non-empty, ascending `sorted`.
fn percentile(sorted: &[f64], pct: f64) -> f64 {
    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = (lower + 1).min(sorted.len() - 1);
    sorted[lower] + (rank - lower as f64) * (sorted[upper] - sorted[lower])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_of_five() {
        let stat = TimingStat::from_samples(&[100.0, 110.0, 105.0, 115.0, 120.0]);
        assert_eq!(stat.samples, 5);
        assert!((stat.mean_ms - 110.0).abs() < 1e-9);
        assert_eq!((stat.min_ms, stat.max_ms), (100.0, 120.0));
        assert_eq!(stat.median_ms, Some(110.0));
        // sqrt(250 / 4)
        assert!((stat.stddev_ms.unwrap() - 7.9057).abs() < 1e-3);
        assert!((stat.p95_ms.unwrap() - 119.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_and_single() {
        let empty = TimingStat::from_samples(&[]);
        assert_eq!(empty.samples, 0);
        assert!(empty.median_ms.is_none() && empty.p95_ms.is_none());

        let one = TimingStat::from_samples(&[3.5]);
        assert_eq!(one.median_ms, Some(3.5));
        assert_eq!(one.p95_ms, Some(3.5));
        assert!(one.stddev_ms.is_none());
    }

    #[test]
    fn test_even_count_median() {
        let stat = TimingStat::from_samples(&[4.0, 1.0, 3.0, 2.0]);
        assert_eq!(stat.median_ms, Some(2.5));
    }
}
