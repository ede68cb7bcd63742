//! Aggregation of a sample log into per-(variant, operation) statistics.

use std::collections::{BTreeMap, BTreeSet};

use crate::harness::Sample;

/// Latency statistics for one (variant, operation) group, in milliseconds.
#[derive(Clone, Debug, PartialEq)]
pub struct GroupStats {
    pub count: usize,
    pub mean_ms: f64,
    pub median_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    /// Population standard deviation.
    pub std_dev_ms: f64,
}

impl GroupStats {
    fn from_times(times: &mut [f64]) -> Option<Self> {
        if times.is_empty() {
            return None;
        }
        times.sort_by(f64::total_cmp);

        let count = times.len();
        let n = count as f64;
        let mean_ms = times.iter().sum::<f64>() / n;
        let median_ms = if count % 2 == 1 {
            times[count / 2]
        } else {
            (times[count / 2 - 1] + times[count / 2]) / 2.0
        };
        let variance = times.iter().map(|t| (t - mean_ms).powi(2)).sum::<f64>() / n;

        Some(Self {
            count,
            mean_ms,
            median_ms,
            min_ms: times[0],
            max_ms: times[count - 1],
            std_dev_ms: variance.sqrt(),
        })
    }
}

/// Grouped view of a sample log. Built fresh from the samples each time.
#[derive(Clone, Debug, Default)]
pub struct Summary {
    groups: BTreeMap<(String, String), GroupStats>,
}

impl Summary {
    pub fn from_samples<'a>(samples: impl IntoIterator<Item = &'a Sample>) -> Self {
        let mut times: BTreeMap<(String, String), Vec<f64>> = BTreeMap::new();
        for s in samples {
            times
                .entry((s.variant.clone(), s.operation.clone()))
                .or_default()
                .push(s.elapsed_ms);
        }

        let groups = times
            .into_iter()
            .filter_map(|(key, mut t)| GroupStats::from_times(&mut t).map(|stats| (key, stats)))
            .collect();
        Self { groups }
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn get(&self, variant: &str, operation: &str) -> Option<&GroupStats> {
        self.groups
            .get(&(variant.to_string(), operation.to_string()))
    }

    pub fn mean(&self, variant: &str, operation: &str) -> Option<f64> {
        self.get(variant, operation).map(|g| g.mean_ms)
    }

    /// Iterate `(variant, operation, stats)` in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &GroupStats)> {
        self.groups
            .iter()
            .map(|((v, o), g)| (v.as_str(), o.as_str(), g))
    }

    /// Operations as rows, variants as columns, mean latency in each cell.
    pub fn pivot(&self) -> Pivot {
        let variants: BTreeSet<&str> = self.groups.keys().map(|(v, _)| v.as_str()).collect();
        let operations: BTreeSet<&str> = self.groups.keys().map(|(_, o)| o.as_str()).collect();

        let rows = operations
            .iter()
            .map(|op| {
                let cells = variants.iter().map(|v| self.mean(v, op)).collect();
                (op.to_string(), cells)
            })
            .collect();

        Pivot {
            variants: variants.into_iter().map(str::to_string).collect(),
            rows,
        }
    }
}

/// Side-by-side comparison table.
#[derive(Clone, Debug, PartialEq)]
pub struct Pivot {
    pub variants: Vec<String>,
    /// One row per operation; cells are aligned with `variants`.
    pub rows: Vec<(String, Vec<Option<f64>>)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(variant: &str, operation: &str, rep: u32, ms: f64) -> Sample {
        Sample {
            dataset: "N/A".to_string(),
            variant: variant.to_string(),
            operation: operation.to_string(),
            repetition: rep,
            elapsed_ms: ms,
        }
    }

    #[test]
    fn mean_of_group() {
        let samples = vec![
            sample("v1", "op", 0, 10.0),
            sample("v1", "op", 1, 20.0),
            sample("v1", "op", 2, 30.0),
        ];
        let summary = Summary::from_samples(&samples);

        assert_eq!(summary.mean("v1", "op"), Some(20.0));
        let stats = summary.get("v1", "op").unwrap();
        assert_eq!(stats.count, 3);
        assert_eq!(stats.median_ms, 20.0);
        assert_eq!(stats.min_ms, 10.0);
        assert_eq!(stats.max_ms, 30.0);
        assert!((stats.std_dev_ms - (200.0f64 / 3.0).sqrt()).abs() < 1e-9);
    }

    #[test]
    fn groups_span_datasets() {
        let mut samples = vec![sample("v1", "op", 0, 4.0)];
        let mut other = sample("v1", "op", 0, 8.0);
        other.dataset = "dsB".to_string();
        samples.push(other);

        let summary = Summary::from_samples(&samples);
        assert_eq!(summary.mean("v1", "op"), Some(6.0));
        assert_eq!(summary.get("v1", "op").unwrap().median_ms, 6.0);
    }

    #[test]
    fn pivot_rows_are_operations_columns_are_variants() {
        let samples = vec![
            sample("refactor", "tasks", 0, 2.0),
            sample("legacy", "tasks", 0, 4.0),
            sample("legacy", "subjects", 0, 1.0),
            sample("legacy", "subjects", 1, 3.0),
        ];
        let pivot = Summary::from_samples(&samples).pivot();

        assert_eq!(pivot.variants, vec!["legacy", "refactor"]);
        assert_eq!(
            pivot.rows,
            vec![
                ("subjects".to_string(), vec![Some(2.0), None]),
                ("tasks".to_string(), vec![Some(4.0), Some(2.0)]),
            ]
        );
    }

    #[test]
    fn empty_log_gives_empty_summary() {
        let summary = Summary::from_samples(&Vec::<Sample>::new());
        assert!(summary.is_empty());
        let pivot = summary.pivot();
        assert!(pivot.variants.is_empty());
        assert!(pivot.rows.is_empty());
    }
}
