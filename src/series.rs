//! Key rank evolution over increasing numbers of traces.
use rayon::prelude::{IntoParallelIterator, ParallelIterator};
use serde::{Deserialize, Serialize};
use std::{fs::File, path::Path};

use crate::{
    Error,
    rank::{KeyRankEstimator, RankBounds},
    scores::ScoreSource,
};

/// Trace counts at which the key rank is evaluated: `step_size`, `2 * step_size`, ... up to
/// `num_traces` included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Steps {
    step_size: usize,
    num_traces: usize,
}

impl Steps {
    /// # Panics
    /// Panic if `step_size` is 0.
    pub fn new(step_size: usize, num_traces: usize) -> Self {
        assert!(step_size > 0);

        Self {
            step_size,
            num_traces,
        }
    }

    /// Return the number of steps.
    pub fn len(&self) -> usize {
        self.num_traces / self.step_size
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + use<> {
        (self.step_size..=self.num_traces).step_by(self.step_size)
    }
}

/// Key rank bounds after a given number of traces.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeyRankRecord {
    /// Number of traces
    pub traces: usize,
    #[serde(rename = "upperBound")]
    pub upper_bound: f64,
    #[serde(rename = "lowerBound")]
    pub lower_bound: f64,
}

impl KeyRankRecord {
    pub fn new(traces: usize, bounds: RankBounds) -> Self {
        Self {
            traces,
            upper_bound: bounds.upper,
            lower_bound: bounds.lower,
        }
    }
}

/// Key rank bounds for each step, ordered by increasing number of traces.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyRankSeries {
    records: Vec<KeyRankRecord>,
}

impl KeyRankSeries {
    /// Return the records.
    pub fn records(&self) -> &[KeyRankRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Write the series as CSV, with a `traces,upperBound,lowerBound` header.
    pub fn save_csv<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let mut writer = csv::Writer::from_path(path)?;
        for record in &self.records {
            writer.serialize(record)?;
        }
        writer.flush()?;

        Ok(())
    }

    /// Save the series as JSON.
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;

        Ok(())
    }

    /// Load a series saved with [`KeyRankSeries::save_json`].
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let file = File::open(path)?;
        let series: KeyRankSeries = serde_json::from_reader(file)?;

        Ok(series)
    }
}

impl FromIterator<KeyRankRecord> for KeyRankSeries {
    fn from_iter<I: IntoIterator<Item = KeyRankRecord>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

/// Estimate the key rank bounds of a single step.
///
/// Errors are tagged with the step and the location of its scores.
pub fn step_key_rank<S>(
    estimator: &KeyRankEstimator,
    source: &S,
    step: usize,
) -> Result<KeyRankRecord, Error>
where
    S: ScoreSource + ?Sized,
{
    source
        .scores(step)
        .and_then(|scores| estimator.estimate(scores.view()))
        .map(|bounds| KeyRankRecord::new(step, bounds))
        .map_err(|err| err.at_step(step, source.location(step)))
}

/// Estimate the key rank bounds at every step, in order.
///
/// `on_step` is called with each record as soon as it is computed. The first failing step aborts
/// the whole series.
pub fn key_rank_series<S, F>(
    estimator: &KeyRankEstimator,
    source: &S,
    steps: Steps,
    mut on_step: F,
) -> Result<KeyRankSeries, Error>
where
    S: ScoreSource + ?Sized,
    F: FnMut(&KeyRankRecord),
{
    steps
        .iter()
        .map(|step| {
            let record = step_key_rank(estimator, source, step)?;
            on_step(&record);
            Ok(record)
        })
        .collect()
}

/// Same as [`key_rank_series`], with steps processed in parallel.
///
/// Steps do not depend on each other, so the resulting series is identical. `on_step` is called
/// in completion order.
pub fn par_key_rank_series<S, F>(
    estimator: &KeyRankEstimator,
    source: &S,
    steps: Steps,
    on_step: F,
) -> Result<KeyRankSeries, Error>
where
    S: ScoreSource + Sync + ?Sized,
    F: Fn(&KeyRankRecord) + Sync,
{
    let records: Vec<KeyRankRecord> = steps
        .iter()
        .collect::<Vec<_>>()
        .into_par_iter()
        .map(|step| {
            let record = step_key_rank(estimator, source, step)?;
            on_step(&record);
            Ok(record)
        })
        .collect::<Result<_, Error>>()?;

    Ok(records.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::{KeyRankRecord, KeyRankSeries, Steps, key_rank_series, par_key_rank_series};
    use crate::{Error, rank::KeyRankEstimator};
    use ndarray::{Array2, array};
    use std::collections::BTreeMap;

    fn source() -> BTreeMap<usize, Array2<f64>> {
        BTreeMap::from([
            (10, array![[4., 1.], [1., 1.], [2., 2.], [1., 4.]]),
            (20, array![[1., 1.], [4., 1.], [2., 2.], [1., 4.]]),
            (30, array![[1., 4.], [1., 1.], [4., 2.], [2., 1.]]),
        ])
    }

    #[test]
    fn test_steps() {
        assert_eq!(Steps::new(1000, 2500).iter().collect::<Vec<_>>(), [1000, 2000]);
        assert_eq!(
            Steps::new(1000, 3000).iter().collect::<Vec<_>>(),
            [1000, 2000, 3000]
        );
        assert_eq!(Steps::new(1000, 3000).len(), 3);
        assert_eq!(Steps::new(500, 500).iter().collect::<Vec<_>>(), [500]);
        assert!(Steps::new(1000, 999).is_empty());
        assert_eq!(Steps::new(1000, 999).iter().count(), 0);
    }

    #[test]
    fn test_key_rank_series() {
        let estimator = KeyRankEstimator::new(&[2, 3], 4);
        let mut reported = Vec::new();
        let series = key_rank_series(&estimator, &source(), Steps::new(10, 30), |record| {
            reported.push(record.traces)
        })
        .unwrap();

        assert_eq!(reported, [10, 20, 30]);
        assert_eq!(series.len(), 3);
        assert_eq!(
            series.records()[0],
            KeyRankRecord {
                traces: 10,
                upper_bound: 5f64.log2(),
                lower_bound: 0.
            }
        );
        for record in series.records() {
            assert!(record.lower_bound <= record.upper_bound);
        }
    }

    #[test]
    fn test_single_step() {
        let estimator = KeyRankEstimator::new(&[2, 3], 4);
        let series = key_rank_series(&estimator, &source(), Steps::new(20, 20), |_| {}).unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series.records()[0].traces, 20);
    }

    #[test]
    fn test_series_is_reproducible() {
        let estimator = KeyRankEstimator::new(&[2, 3], 4);
        let steps = Steps::new(10, 30);

        let first = key_rank_series(&estimator, &source(), steps, |_| {}).unwrap();
        let second = key_rank_series(&estimator, &source(), steps, |_| {}).unwrap();
        let parallel = par_key_rank_series(&estimator, &source(), steps, |_| {}).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, parallel);
    }

    #[test]
    fn test_failing_step_aborts() {
        let estimator = KeyRankEstimator::new(&[2, 3], 4);
        let mut scores = source();
        scores.insert(20, array![[1., 0.], [1., 0.], [1., 0.], [1., 0.]]);

        let mut reported = Vec::new();
        let result = key_rank_series(&estimator, &scores, Steps::new(10, 30), |record| {
            reported.push(record.traces)
        });
        assert_eq!(reported, [10]);
        match result {
            Err(Error::Step {
                step,
                location,
                source,
            }) => {
                assert_eq!(step, 20);
                assert_eq!(location, "memory:20");
                assert!(matches!(*source, Error::DegenerateColumn { column: 1, .. }));
            }
            other => panic!("unexpected result {other:?}"),
        }

        // Missing step
        let result = key_rank_series(&estimator, &source(), Steps::new(10, 40), |_| {});
        match result {
            Err(Error::Step { step, source, .. }) => {
                assert_eq!(step, 40);
                assert!(matches!(*source, Error::MissingStepData { .. }));
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let series: KeyRankSeries = [
            KeyRankRecord {
                traces: 1000,
                upper_bound: 100.5,
                lower_bound: 90.25,
            },
            KeyRankRecord {
                traces: 2000,
                upper_bound: 2.,
                lower_bound: 0.,
            },
        ]
        .into_iter()
        .collect();

        let csv_path = dir.path().join("keyrank_results.csv");
        series.save_csv(&csv_path).unwrap();
        assert_eq!(
            std::fs::read_to_string(&csv_path).unwrap(),
            "traces,upperBound,lowerBound\n1000,100.5,90.25\n2000,2.0,0.0\n"
        );

        let json_path = dir.path().join("keyrank_results.json");
        series.save_json(&json_path).unwrap();
        assert_eq!(KeyRankSeries::load_json(&json_path).unwrap(), series);
    }
}
