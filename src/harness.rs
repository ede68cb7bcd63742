//! Repetition timing and the sample log.
//!
//! A [`Timing`] wraps one named operation with a loop count. Every repetition
//! is timed with wall-clock [`Instant`]s and appended to a caller-owned
//! [`ResultLog`] as a [`Sample`]; aggregation is deferred to
//! [`crate::summary`], so the raw log can be re-analysed without rerunning.
//!
//! Two entry points exist:
//!
//! - [`Timing::run_once`] runs the operation directly and tags samples with
//!   the dataset label [`NO_DATASET`].
//! - [`Timing::run_fanout`] / [`Timing::run_fanout_with`] run the operation
//!   once per entry of a [`DatasetMap`] and return a map of the same keys.
//!
//! Operation failures are never caught. The first `Err` aborts the loop and
//! is handed back to the caller; samples recorded before it stay in the log.

use std::hint::black_box;
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Variant label used when the caller does not supply one.
pub const UNKNOWN_VARIANT: &str = "unknown";

/// Dataset label for samples recorded outside fan-out mode.
pub const NO_DATASET: &str = "N/A";

/// Repetitions per query in the quick profile.
pub const DEFAULT_LOOPS: u32 = 5;

/// Insertion-ordered mapping from dataset label to a per-dataset value.
pub type DatasetMap<T> = IndexMap<String, T>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Profile {
    Quick,
    Full,
}

impl Profile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Quick => "quick",
            Profile::Full => "full",
        }
    }

    pub fn default_loops(&self) -> u32 {
        match self {
            Profile::Quick => DEFAULT_LOOPS,
            Profile::Full => 10,
        }
    }
}

#[derive(Clone, Debug)]
pub struct BenchConfig {
    pub profile: Profile,
    /// Explicit override of the per-query loop count.
    pub loops: Option<u32>,
}

impl BenchConfig {
    /// Loop count for layout construction, which is dominated by a one-time
    /// directory scan and is only run once regardless of profile.
    pub const LOAD_LOOPS: u32 = 1;

    /// Loop count for query operations.
    pub fn loops(&self) -> u32 {
        self.loops
            .unwrap_or_else(|| self.profile.default_loops())
            .max(1)
    }
}

/// One timed repetition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub dataset: String,
    pub variant: String,
    pub operation: String,
    pub repetition: u32,
    pub elapsed_ms: f64,
}

/// Append-only, ordered log of samples owned by one benchmark run.
#[derive(Clone, Debug, Default)]
pub struct ResultLog {
    samples: Vec<Sample>,
}

impl ResultLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&mut self, sample: Sample) {
        self.samples.push(sample);
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Sample> {
        self.samples.iter()
    }

    /// Drop every recorded sample so the log can back an independent run.
    pub fn reset(&mut self) {
        self.samples.clear();
    }

    pub fn into_samples(self) -> Vec<Sample> {
        self.samples
    }
}

impl<'a> IntoIterator for &'a ResultLog {
    type Item = &'a Sample;
    type IntoIter = std::slice::Iter<'a, Sample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.iter()
    }
}

fn round_ms(elapsed: Duration) -> f64 {
    (elapsed.as_secs_f64() * 100_000.0).round() / 100.0
}

/// A named operation timed `loops` times per invocation.
#[derive(Clone, Debug)]
pub struct Timing {
    operation: String,
    loops: u32,
}

impl Timing {
    /// A loop count of zero is treated as one: every invocation must produce a result.
    pub fn new(operation: impl Into<String>, loops: u32) -> Self {
        Self {
            operation: operation.into(),
            loops: loops.max(1),
        }
    }

    pub fn loops(&self) -> u32 {
        self.loops
    }

    /// Run `op` `loops` times and return the final repetition's value.
    pub fn run_once<T, E>(
        &self,
        log: &mut ResultLog,
        variant: Option<&str>,
        op: impl FnMut() -> Result<T, E>,
    ) -> Result<T, E> {
        let variant = variant.unwrap_or(UNKNOWN_VARIANT);
        self.series(log, variant, NO_DATASET, op)
    }

    /// Run `op` `loops` times for every dataset in `contexts`.
    ///
    /// Only the last repetition's value is kept per dataset. The returned map
    /// has exactly the keys of `contexts`, in the same order.
    pub fn run_fanout<C, T, E>(
        &self,
        log: &mut ResultLog,
        variant: Option<&str>,
        contexts: &DatasetMap<C>,
        mut op: impl FnMut(&str, &C) -> Result<T, E>,
    ) -> Result<DatasetMap<T>, E> {
        let variant = variant.unwrap_or(UNKNOWN_VARIANT);
        let mut results = DatasetMap::with_capacity(contexts.len());
        for (dataset, context) in contexts {
            let value =
                self.series(log, variant, dataset, || op(dataset.as_str(), context))?;
            results.insert(dataset.clone(), value);
        }
        Ok(results)
    }

    /// Fan-out where each dataset also receives its own argument from `per_dataset`.
    ///
    /// Arguments shared by every dataset are captured by `op` itself. A dataset
    /// without an entry in `per_dataset` fails with
    /// [`Error::MissingDatasetArgument`] before any of its repetitions run.
    pub fn run_fanout_with<C, A, T, E>(
        &self,
        log: &mut ResultLog,
        variant: Option<&str>,
        contexts: &DatasetMap<C>,
        per_dataset: &DatasetMap<A>,
        mut op: impl FnMut(&C, &A) -> Result<T, E>,
    ) -> Result<DatasetMap<T>, E>
    where
        E: From<Error>,
    {
        let variant = variant.unwrap_or(UNKNOWN_VARIANT);
        let mut results = DatasetMap::with_capacity(contexts.len());
        for (dataset, context) in contexts {
            let arg = per_dataset
                .get(dataset)
                .ok_or_else(|| Error::MissingDatasetArgument {
                    operation: self.operation.clone(),
                    dataset: dataset.clone(),
                })?;
            let value = self.series(log, variant, dataset, || op(context, arg))?;
            results.insert(dataset.clone(), value);
        }
        Ok(results)
    }

    fn series<T, E>(
        &self,
        log: &mut ResultLog,
        variant: &str,
        dataset: &str,
        mut op: impl FnMut() -> Result<T, E>,
    ) -> Result<T, E> {
        let mut last = self.repetition(log, variant, dataset, 0, &mut op)?;
        for rep in 1..self.loops {
            last = self.repetition(log, variant, dataset, rep, &mut op)?;
        }
        tracing::trace!(
            operation = %self.operation,
            variant,
            dataset,
            loops = self.loops,
            "series complete"
        );
        Ok(last)
    }

    fn repetition<T, E>(
        &self,
        log: &mut ResultLog,
        variant: &str,
        dataset: &str,
        repetition: u32,
        op: &mut impl FnMut() -> Result<T, E>,
    ) -> Result<T, E> {
        let start = Instant::now();
        let value = black_box(op()?);
        let elapsed_ms = round_ms(start.elapsed());

        tracing::debug!(
            operation = %self.operation,
            variant,
            dataset,
            repetition,
            elapsed_ms,
            "sample"
        );
        log.record(Sample {
            dataset: dataset.to_string(),
            variant: variant.to_string(),
            operation: self.operation.clone(),
            repetition,
            elapsed_ms,
        });
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    fn counter() -> impl FnMut() -> Result<u32, Infallible> {
        let mut calls = 0;
        move || {
            let n = calls;
            calls += 1;
            Ok(n)
        }
    }

    fn datasets<T: Clone>(entries: &[(&str, T)]) -> DatasetMap<T> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn run_once_records_contiguous_repetitions() {
        for loops in [1u32, 2, 5, 10] {
            let mut log = ResultLog::new();
            let timing = Timing::new("op", loops);
            let result = timing.run_once(&mut log, Some("v1"), counter()).unwrap();

            assert_eq!(result, loops - 1);
            assert_eq!(log.len(), loops as usize);
            let reps: Vec<u32> = log.iter().map(|s| s.repetition).collect();
            assert_eq!(reps, (0..loops).collect::<Vec<_>>());
            for s in &log {
                assert_eq!(s.dataset, NO_DATASET);
                assert_eq!(s.variant, "v1");
                assert_eq!(s.operation, "op");
                assert!(s.elapsed_ms >= 0.0);
            }
        }
    }

    #[test]
    fn missing_variant_defaults_to_unknown() {
        let mut log = ResultLog::new();
        Timing::new("op", 3)
            .run_once(&mut log, None, counter())
            .unwrap();
        Timing::new("fan", 2)
            .run_fanout(&mut log, None, &datasets(&[("a", ())]), |_, _| {
                Ok::<_, Infallible>(())
            })
            .unwrap();

        assert_eq!(log.len(), 5);
        assert!(log.iter().all(|s| s.variant == UNKNOWN_VARIANT));
    }

    #[test]
    fn zero_loops_runs_once() {
        let timing = Timing::new("op", 0);
        assert_eq!(timing.loops(), 1);

        let mut log = ResultLog::new();
        timing.run_once(&mut log, None, counter()).unwrap();
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn fanout_records_k_times_l_samples() {
        let contexts = datasets(&[("dsA", 10), ("dsB", 20), ("dsC", 30)]);
        let mut log = ResultLog::new();
        let results = Timing::new("query", 4)
            .run_fanout(&mut log, Some("v"), &contexts, |_, ctx| {
                Ok::<_, Infallible>(*ctx * 2)
            })
            .unwrap();

        assert_eq!(log.len(), 12);
        assert_eq!(
            results.keys().collect::<Vec<_>>(),
            contexts.keys().collect::<Vec<_>>()
        );
        assert_eq!(results["dsB"], 40);

        for ds in ["dsA", "dsB", "dsC"] {
            let reps: Vec<u32> = log
                .iter()
                .filter(|s| s.dataset == ds)
                .map(|s| s.repetition)
                .collect();
            assert_eq!(reps, vec![0, 1, 2, 3]);
        }
    }

    #[test]
    fn fanout_keeps_last_repetition_value() {
        let contexts = datasets(&[("a", ()), ("b", ())]);
        let mut next = counter();
        let mut log = ResultLog::new();
        let results = Timing::new("query", 3)
            .run_fanout(&mut log, None, &contexts, |_, _| next())
            .unwrap();

        assert_eq!(results["a"], 2);
        assert_eq!(results["b"], 5);
    }

    #[test]
    fn fanout_over_empty_map_is_empty() {
        let contexts: DatasetMap<()> = DatasetMap::new();
        let mut log = ResultLog::new();
        let results = Timing::new("query", 3)
            .run_fanout(&mut log, None, &contexts, |_, _| Ok::<_, Infallible>(1))
            .unwrap();

        assert!(results.is_empty());
        assert!(log.is_empty());
    }

    #[test]
    fn load_scenario_records_one_sample_per_dataset() {
        let contexts = datasets(&[("dsA", 1), ("dsB", 2)]);
        let mut log = ResultLog::new();
        let results = Timing::new("load", 1)
            .run_fanout(&mut log, Some("legacy"), &contexts, |_, ctx| {
                Ok::<_, Infallible>(*ctx)
            })
            .unwrap();

        assert_eq!(log.len(), 2);
        assert_eq!(results, datasets(&[("dsA", 1), ("dsB", 2)]));
        assert_eq!(log.samples()[0].dataset, "dsA");
        assert_eq!(log.samples()[1].dataset, "dsB");
    }

    #[test]
    fn failure_on_second_repetition_keeps_first_sample() {
        let mut calls = 0;
        let mut log = ResultLog::new();
        let err = Timing::new("flaky", 3)
            .run_once(&mut log, Some("v"), || {
                calls += 1;
                if calls == 2 {
                    Err("boom")
                } else {
                    Ok(calls)
                }
            })
            .unwrap_err();

        assert_eq!(err, "boom");
        assert_eq!(calls, 2);
        assert_eq!(log.len(), 1);
        assert_eq!(log.samples()[0].repetition, 0);
    }

    #[test]
    fn fanout_failure_aborts_remaining_datasets() {
        let contexts = datasets(&[("a", false), ("b", true), ("c", false)]);
        let mut log = ResultLog::new();
        let err = Timing::new("query", 2)
            .run_fanout(&mut log, None, &contexts, |ds, fail| {
                if *fail {
                    Err(format!("{ds} failed"))
                } else {
                    Ok(())
                }
            })
            .unwrap_err();

        assert_eq!(err, "b failed");
        assert_eq!(log.len(), 2);
        assert!(log.iter().all(|s| s.dataset == "a"));
    }

    #[test]
    fn fanout_with_looks_up_per_dataset_argument() {
        let contexts = datasets(&[("a", 1), ("b", 2)]);
        let args = datasets(&[("b", 200), ("a", 100)]);
        let mut log = ResultLog::new();
        let results = Timing::new("sum", 2)
            .run_fanout_with(&mut log, None, &contexts, &args, |ctx, arg| {
                Ok::<_, Error>(ctx + arg)
            })
            .unwrap();

        assert_eq!(results, datasets(&[("a", 101), ("b", 202)]));
        assert_eq!(log.len(), 4);
    }

    #[test]
    fn fanout_with_missing_argument_errors() {
        let contexts = datasets(&[("a", 1), ("b", 2)]);
        let args = datasets(&[("a", 100)]);
        let mut log = ResultLog::new();
        let err = Timing::new("sum", 2)
            .run_fanout_with(&mut log, None, &contexts, &args, |ctx, arg| {
                Ok::<_, Error>(ctx + arg)
            })
            .unwrap_err();

        match err {
            Error::MissingDatasetArgument { operation, dataset } => {
                assert_eq!(operation, "sum");
                assert_eq!(dataset, "b");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn into_samples_keeps_log_order() {
        let mut log = ResultLog::new();
        Timing::new("first", 1)
            .run_once(&mut log, None, counter())
            .unwrap();
        Timing::new("second", 1)
            .run_once(&mut log, None, counter())
            .unwrap();

        let ops: Vec<String> = log.into_samples().into_iter().map(|s| s.operation).collect();
        assert_eq!(ops, vec!["first", "second"]);
    }

    #[test]
    fn reset_clears_log() {
        let mut log = ResultLog::new();
        Timing::new("op", 3)
            .run_once(&mut log, None, counter())
            .unwrap();
        assert_eq!(log.len(), 3);
        log.reset();
        assert!(log.is_empty());
    }

    #[test]
    fn elapsed_is_rounded_to_two_decimals() {
        assert_eq!(round_ms(Duration::from_micros(12_346)), 12.35);
        assert_eq!(round_ms(Duration::from_nanos(4_999)), 0.0);
        assert_eq!(round_ms(Duration::from_millis(7)), 7.0);
    }

    #[test]
    fn config_loops_follow_profile_unless_overridden() {
        let quick = BenchConfig {
            profile: Profile::Quick,
            loops: None,
        };
        assert_eq!(quick.loops(), DEFAULT_LOOPS);

        let full = BenchConfig {
            profile: Profile::Full,
            loops: None,
        };
        assert_eq!(full.loops(), 10);

        let custom = BenchConfig {
            profile: Profile::Full,
            loops: Some(0),
        };
        assert_eq!(custom.loops(), 1);

        let many = BenchConfig {
            profile: Profile::Quick,
            loops: Some(7),
        };
        assert_eq!(many.loops(), 7);
    }
}
