//! Linear trainer and RMSE evaluation
//!
//! A deliberately small collaborator: ordinary least squares via the normal
//! equations with a tiny ridge term (keeps the system well-conditioned on
//! degenerate micro-batches). The registry and promotion engine treat the
//! model as opaque bytes; only training and serving look inside.

use serde::{Deserialize, Serialize};

use crate::events::EventLog;
use crate::prepare::FeatureSplit;
use crate::registry::{Metrics, RMSE};
use crate::{Error, Result};

/// Ridge term added to the normal-equation diagonal.
const RIDGE: f64 = 1e-8;

/// Fitted linear regression model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    intercept: f64,
    coefficients: Vec<f64>,
}

impl LinearModel {
    /// Fit by least squares on the given feature matrix and target vector.
    ///
    /// # Errors
    ///
    /// Returns error if rows are ragged or the system cannot be solved.
    pub fn fit(x: &[Vec<f64>], y: &[f64]) -> Result<Self> {
        let rows = x.len();
        if rows == 0 || rows != y.len() {
            return Err(Error::Other(
                "cannot fit model: empty or mismatched training data".to_string(),
            ));
        }
        let cols = x[0].len();
        if x.iter().any(|row| row.len() != cols) {
            return Err(Error::Other("cannot fit model: ragged feature rows".to_string()));
        }

        // Augmented design: intercept column of ones first.
        let p = cols + 1;
        let mut ata = vec![vec![0.0; p]; p];
        let mut atb = vec![0.0; p];

        for (row, &target) in x.iter().zip(y) {
            let mut design = Vec::with_capacity(p);
            design.push(1.0);
            design.extend_from_slice(row);

            for i in 0..p {
                atb[i] += design[i] * target;
                for j in 0..p {
                    ata[i][j] += design[i] * design[j];
                }
            }
        }

        for (i, row) in ata.iter_mut().enumerate() {
            row[i] += RIDGE;
        }

        let solution = solve(ata, atb)
            .ok_or_else(|| Error::Other("cannot fit model: singular system".to_string()))?;

        Ok(Self {
            intercept: solution[0],
            coefficients: solution[1..].to_vec(),
        })
    }

    /// Predict a single target value from one feature row.
    #[must_use]
    pub fn predict(&self, features: &[f64]) -> f64 {
        self.intercept
            + self
                .coefficients
                .iter()
                .zip(features)
                .map(|(c, f)| c * f)
                .sum::<f64>()
    }

    /// Number of feature coefficients.
    #[must_use]
    pub fn num_features(&self) -> usize {
        self.coefficients.len()
    }

    /// Serialize to the durable artifact form.
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Deserialize from the durable artifact form.
    ///
    /// # Errors
    ///
    /// Returns error if the bytes are not a serialized model.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Gaussian elimination with partial pivoting.
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();

    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| {
            a[i][col]
                .abs()
                .partial_cmp(&a[j][col].abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })?;
        if a[pivot][col].abs() < f64::EPSILON {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in (col + 1)..n {
            let factor = a[row][col] / a[col][col];
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let mut acc = b[row];
        for col in (row + 1)..n {
            acc -= a[row][col] * x[col];
        }
        x[row] = acc / a[row][row];
    }
    Some(x)
}

/// A fitted model plus the held-out test split it was not trained on.
#[derive(Debug, Clone)]
pub struct TrainOutput {
    /// The fitted model.
    pub model: LinearModel,
    /// Held-out feature rows.
    pub x_test: Vec<Vec<f64>>,
    /// Held-out target values.
    pub y_test: Vec<f64>,
}

/// Train a model on the split, holding out the tail ~20% (at least one row)
/// for evaluation.
///
/// Returns `Ok(None)` when there are too few rows to both train and hold
/// out (skip, not a failure).
///
/// # Errors
///
/// Returns error if fitting fails on well-formed input.
pub fn train(split: &FeatureSplit, events: &EventLog) -> Result<Option<TrainOutput>> {
    let rows = split.x.len();
    if rows < 2 {
        tracing::info!(rows, "training skipped: not enough rows");
        events.record(
            "training_skipped",
            serde_json::json!({"reason": "not_enough_rows", "rows": rows}),
        );
        return Ok(None);
    }

    let holdout = (rows / 5).max(1);
    let cut = rows - holdout;

    let model = LinearModel::fit(&split.x[..cut], &split.y[..cut])?;

    tracing::info!(train_rows = cut, test_rows = holdout, "training completed");
    events.record(
        "training_completed",
        serde_json::json!({"train_rows": cut, "test_rows": holdout}),
    );

    Ok(Some(TrainOutput {
        model,
        x_test: split.x[cut..].to_vec(),
        y_test: split.y[cut..].to_vec(),
    }))
}

/// Evaluate a trained model on the held-out split.
///
/// Returns an empty metrics map when there is no model or no test data
/// (skip); otherwise a map carrying non-negative `rmse`.
#[must_use]
pub fn evaluate(
    model: Option<&LinearModel>,
    x_test: &[Vec<f64>],
    y_test: &[f64],
    events: &EventLog,
) -> Metrics {
    let Some(model) = model else {
        tracing::info!("evaluation skipped: no trained model");
        events.record(
            "evaluation_skipped",
            serde_json::json!({"reason": "no_model"}),
        );
        return Metrics::new();
    };

    if x_test.is_empty() {
        tracing::info!("evaluation skipped: no test data");
        events.record(
            "evaluation_skipped",
            serde_json::json!({"reason": "no_test_data"}),
        );
        return Metrics::new();
    }

    let mse = x_test
        .iter()
        .zip(y_test)
        .map(|(features, &target)| {
            let err = model.predict(features) - target;
            err * err
        })
        .sum::<f64>()
        / x_test.len() as f64;
    let rmse = mse.sqrt();

    let mut metrics = Metrics::new();
    metrics.insert(RMSE, rmse);

    tracing::info!(rmse, "evaluation completed");
    events.record("evaluation_completed", serde_json::json!({"rmse": rmse}));

    metrics
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_split(n: usize) -> FeatureSplit {
        // y = 3x + 7, exactly linear
        let x: Vec<Vec<f64>> = (0..n).map(|i| vec![i as f64]).collect();
        let y: Vec<f64> = (0..n).map(|i| 3.0 * i as f64 + 7.0).collect();
        FeatureSplit { x, y }
    }

    #[test]
    fn test_fit_recovers_exact_line() {
        let split = line_split(20);
        let model = LinearModel::fit(&split.x, &split.y).unwrap();

        assert!((model.predict(&[0.0]) - 7.0).abs() < 1e-4);
        assert!((model.predict(&[10.0]) - 37.0).abs() < 1e-4);
    }

    #[test]
    fn test_fit_two_features() {
        // y = 2a - b + 1
        let x = vec![
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            vec![1.0, 1.0],
            vec![2.0, 3.0],
            vec![4.0, 1.0],
        ];
        let y: Vec<f64> = x.iter().map(|r| 2.0 * r[0] - r[1] + 1.0).collect();

        let model = LinearModel::fit(&x, &y).unwrap();
        assert!((model.predict(&[3.0, 2.0]) - 5.0).abs() < 1e-4);
    }

    #[test]
    fn test_fit_on_noisy_line_keeps_rmse_bounded() {
        use rand::{Rng, SeedableRng};

        let mut rng = rand::rngs::StdRng::seed_from_u64(42);
        let x: Vec<Vec<f64>> = (0..200).map(|i| vec![f64::from(i)]).collect();
        let y: Vec<f64> = x
            .iter()
            .map(|r| 3.0 * r[0] + 7.0 + rng.gen_range(-5.0..5.0))
            .collect();

        let events = EventLog::null();
        let split = FeatureSplit { x, y };
        let output = train(&split, &events).unwrap().unwrap();
        let metrics = evaluate(Some(&output.model), &output.x_test, &output.y_test, &events);

        // Noise is bounded by 5, so the holdout rmse must be too (roughly).
        let rmse = metrics.rmse().unwrap();
        assert!(rmse >= 0.0);
        assert!(rmse < 10.0);
    }

    #[test]
    fn test_fit_rejects_empty_input() {
        assert!(LinearModel::fit(&[], &[]).is_err());
    }

    #[test]
    fn test_model_bytes_round_trip() {
        let split = line_split(10);
        let model = LinearModel::fit(&split.x, &split.y).unwrap();

        let bytes = model.to_bytes().unwrap();
        let back = LinearModel::from_bytes(&bytes).unwrap();
        assert_eq!(model, back);
    }

    #[test]
    fn test_train_skips_on_tiny_split() {
        let events = EventLog::null();
        assert!(train(&line_split(1), &events).unwrap().is_none());
        assert!(train(&FeatureSplit::default(), &events).unwrap().is_none());
    }

    #[test]
    fn test_train_holds_out_tail() {
        let events = EventLog::null();
        let output = train(&line_split(10), &events).unwrap().unwrap();
        assert_eq!(output.x_test.len(), 2);
        assert_eq!(output.y_test.len(), 2);
    }

    #[test]
    fn test_evaluate_perfect_fit_has_near_zero_rmse() {
        let events = EventLog::null();
        let output = train(&line_split(20), &events).unwrap().unwrap();
        let metrics = evaluate(Some(&output.model), &output.x_test, &output.y_test, &events);

        let rmse = metrics.rmse().unwrap();
        assert!(rmse >= 0.0);
        assert!(rmse < 1e-3);
    }

    #[test]
    fn test_evaluate_without_model_is_empty() {
        let events = EventLog::null();
        let metrics = evaluate(None, &[vec![1.0]], &[1.0], &events);
        assert!(metrics.is_empty());
    }

    #[test]
    fn test_evaluate_without_test_data_is_empty() {
        let events = EventLog::null();
        let split = line_split(10);
        let model = LinearModel::fit(&split.x, &split.y).unwrap();
        let metrics = evaluate(Some(&model), &[], &[], &events);
        assert!(metrics.is_empty());
    }
}
