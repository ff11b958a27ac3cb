//! Summary statistics for point-to-node mapping distances.

use serde::{Deserialize, Serialize};

/// Max / mean / standard deviation of a set of distances.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DistanceStats {
    pub count: usize,
    pub max: f64,
    pub mean: f64,
    /// Population standard deviation.
    pub std_dev: f64,
}

impl DistanceStats {
    /// Summarize `distances`. An empty slice yields all-zero stats.
    pub fn from_distances(distances: &[f64]) -> Self {
        if distances.is_empty() {
            return Self::default();
        }

        let n = distances.len() as f64;
        let max = distances.iter().copied().fold(f64::MIN, f64::max);
        let mean = distances.iter().sum::<f64>() / n;
        let variance = distances.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n;

        Self {
            count: distances.len(),
            max,
            mean,
            std_dev: variance.sqrt(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_distances() {
        let stats = DistanceStats::from_distances(&[]);
        assert_eq!(stats.count, 0);
        assert_eq!(stats.max, 0.0);
        assert_eq!(stats.mean, 0.0);
    }

    #[test]
    fn test_distance_stats() {
        let stats = DistanceStats::from_distances(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_eq!(stats.count, 8);
        assert_eq!(stats.max, 9.0);
        assert!((stats.mean - 5.0).abs() < 1e-12);
        assert!((stats.std_dev - 2.0).abs() < 1e-12);
    }
}
