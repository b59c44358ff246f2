//! Load per-step score matrices produced by an attack.
use csv::{ReaderBuilder, Trim};
use ndarray::Array2;
use std::path::{Path, PathBuf};

use crate::Error;

/// Name of the sub-directory holding one score file per step.
pub const SCORES_DIR: &str = "final_kr";

/// Provides the score matrix of each step.
pub trait ScoreSource {
    /// Return the score matrix after `step` traces.
    fn scores(&self, step: usize) -> Result<Array2<f64>, Error>;

    /// Describe where the scores of `step` come from, for error reports.
    fn location(&self, step: usize) -> String;
}

/// Score matrices stored as comma separated text files, `<root>/final_kr/<step>.txt`.
#[derive(Debug, Clone)]
pub struct ScoreDirectory {
    root: PathBuf,
}

impl ScoreDirectory {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Return the path of the score file of `step`.
    pub fn path(&self, step: usize) -> PathBuf {
        self.root.join(SCORES_DIR).join(format!("{step}.txt"))
    }
}

impl ScoreSource for ScoreDirectory {
    fn scores(&self, step: usize) -> Result<Array2<f64>, Error> {
        read_score_matrix(self.path(step))
    }

    fn location(&self, step: usize) -> String {
        self.path(step).display().to_string()
    }
}

/// In-memory score matrices, one per step.
impl ScoreSource for std::collections::BTreeMap<usize, Array2<f64>> {
    fn scores(&self, step: usize) -> Result<Array2<f64>, Error> {
        self.get(&step)
            .cloned()
            .ok_or_else(|| Error::MissingStepData {
                path: PathBuf::from(self.location(step)),
                source: "no scores for this step".into(),
            })
    }

    fn location(&self, step: usize) -> String {
        format!("memory:{step}")
    }
}

/// Read a comma separated score matrix, one row per candidate value and one column per key byte.
///
/// # Errors
/// - [`Error::MissingStepData`] if the file cannot be opened or read.
/// - [`Error::MalformedScoreMatrix`] if it is empty or ragged, or if a field is not a finite
///   number.
pub fn read_score_matrix<P: AsRef<Path>>(path: P) -> Result<Array2<f64>, Error> {
    let path = path.as_ref();
    let missing = |source: csv::Error| Error::MissingStepData {
        path: path.to_path_buf(),
        source: Box::new(source),
    };
    let malformed = |reason: String| Error::MalformedScoreMatrix {
        path: path.to_path_buf(),
        reason,
    };

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_path(path)
        .map_err(missing)?;

    let mut num_columns = None;
    let mut values = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.map_err(|err| {
            if matches!(err.kind(), csv::ErrorKind::Io(_)) {
                missing(err)
            } else {
                malformed(err.to_string())
            }
        })?;
        match num_columns {
            None => num_columns = Some(record.len()),
            Some(n) if n != record.len() => {
                return Err(malformed(format!(
                    "row {row} has {} fields, expected {n}",
                    record.len()
                )));
            }
            Some(_) => {}
        }
        for (column, field) in record.iter().enumerate() {
            let value = field
                .parse::<f64>()
                .ok()
                .filter(|value| value.is_finite())
                .ok_or_else(|| {
                    malformed(format!("invalid number {field:?} at row {row}, column {column}"))
                })?;
            values.push(value);
        }
    }

    let num_columns = num_columns
        .filter(|&n| n > 0)
        .ok_or_else(|| malformed("no scores".to_string()))?;
    let num_rows = values.len() / num_columns;

    Array2::from_shape_vec((num_rows, num_columns), values)
        .map_err(|err| malformed(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::{ScoreDirectory, ScoreSource, read_score_matrix};
    use crate::Error;
    use ndarray::{Array2, array};
    use std::{collections::BTreeMap, fs, path::PathBuf};

    #[test]
    fn test_read_score_matrix() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("1000.txt");
        fs::write(&path, "0.5,1.0e-2,3\n 2.25 , 0, 1\n").unwrap();

        assert_eq!(
            read_score_matrix(&path).unwrap(),
            array![[0.5, 0.01, 3.], [2.25, 0., 1.]]
        );
    }

    #[test]
    fn test_malformed_score_matrix() {
        let dir = tempfile::tempdir().unwrap();

        let path = dir.path().join("ragged.txt");
        fs::write(&path, "1,2,3\n4,5\n").unwrap();
        assert!(matches!(
            read_score_matrix(&path),
            Err(Error::MalformedScoreMatrix { .. })
        ));

        let path = dir.path().join("nan.txt");
        fs::write(&path, "1,2\n4,abc\n").unwrap();
        assert!(matches!(
            read_score_matrix(&path),
            Err(Error::MalformedScoreMatrix { .. })
        ));

        for (name, text) in [("inf.txt", "1,inf\n4,5\n"), ("nan_literal.txt", "1,2\nNaN,5\n")] {
            let path = dir.path().join(name);
            fs::write(&path, text).unwrap();
            assert!(matches!(
                read_score_matrix(&path),
                Err(Error::MalformedScoreMatrix { .. })
            ));
        }

        let path = dir.path().join("empty.txt");
        fs::write(&path, "").unwrap();
        assert!(matches!(
            read_score_matrix(&path),
            Err(Error::MalformedScoreMatrix { .. })
        ));
    }

    #[test]
    fn test_missing_score_file() {
        let dir = tempfile::tempdir().unwrap();
        let scores = ScoreDirectory::new(dir.path());

        assert_eq!(
            scores.path(500),
            dir.path().join("final_kr").join("500.txt")
        );
        match scores.scores(500) {
            Err(Error::MissingStepData { path, .. }) => assert_eq!(path, scores.path(500)),
            other => panic!("unexpected result {other:?}"),
        }
        assert_eq!(
            PathBuf::from(scores.location(500)),
            dir.path().join("final_kr/500.txt")
        );
    }

    #[test]
    fn test_missing_step_in_memory() {
        let scores = BTreeMap::from([(10, Array2::<f64>::ones((4, 2)))]);

        assert_eq!(scores.scores(10).unwrap(), Array2::<f64>::ones((4, 2)));
        match scores.scores(20) {
            Err(Error::MissingStepData { path, .. }) => {
                assert_eq!(path, PathBuf::from(scores.location(20)))
            }
            other => panic!("unexpected result {other:?}"),
        }
    }
}
