//! Turns attack scores into per-byte log2 probability distributions.
use ndarray::{Array2, ArrayView2, Axis};

use crate::Error;

/// Normalize each column of a score matrix into a distribution and return its base 2 logarithm.
///
/// Rows index the candidate values of a key byte, columns index the key bytes. Each entry of the
/// result is `log2(score / column_sum)`. Null scores produce `-inf`, which is kept as is: the
/// histogram stage routes such values into the lowest bin.
///
/// # Errors
/// Returns [`Error::DegenerateColumn`] if a column does not sum to a strictly positive value.
pub fn log_probabilities(scores: ArrayView2<f64>) -> Result<Array2<f64>, Error> {
    let mut log_probs = scores.to_owned();

    for (column, mut col) in log_probs.axis_iter_mut(Axis(1)).enumerate() {
        let sum = col.sum();
        if sum.is_nan() || sum <= 0.0 {
            return Err(Error::DegenerateColumn { column, sum });
        }

        col.mapv_inplace(|score| (score / sum).log2());
    }

    Ok(log_probs)
}

#[cfg(test)]
mod tests {
    use super::log_probabilities;
    use crate::Error;
    use ndarray::array;

    #[test]
    fn test_log_probabilities() {
        let scores = array![[4., 1.], [2., 1.], [1., 2.], [1., 4.]];
        assert_eq!(
            log_probabilities(scores.view()).unwrap(),
            array![[-1., -3.], [-2., -3.], [-3., -2.], [-3., -1.]]
        );
    }

    #[test]
    fn test_null_score_is_negative_infinity() {
        let scores = array![[1.], [0.]];
        let log_probs = log_probabilities(scores.view()).unwrap();
        assert_eq!(log_probs[[0, 0]], 0.);
        assert_eq!(log_probs[[1, 0]], f64::NEG_INFINITY);
    }

    #[test]
    fn test_degenerate_column() {
        let scores = array![[1., 0.], [2., 0.]];
        assert!(matches!(
            log_probabilities(scores.view()),
            Err(Error::DegenerateColumn { column: 1, .. })
        ));

        let scores = array![[1., -3.], [2., 1.]];
        assert!(matches!(
            log_probabilities(scores.view()),
            Err(Error::DegenerateColumn { column: 1, .. })
        ));
    }
}
