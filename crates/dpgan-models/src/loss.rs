//! Scalar loss functions shared by the players.

use crate::error::{ModelError, ModelResult};
use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

/// Numerically stable logistic sigmoid.
#[must_use]
pub fn sigmoid(x: f32) -> f32 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Mean binary cross-entropy of `logits` against a constant `target`.
///
/// Uses `max(x, 0) - x*t + ln(1 + exp(-|x|))`.
#[must_use]
pub fn bce_with_logits(logits: ArrayView1<'_, f32>, target: f32) -> f32 {
    if logits.is_empty() {
        return 0.0;
    }
    let total: f32 = logits
        .iter()
        .map(|&x| x.max(0.0) - x * target + (-x.abs()).exp().ln_1p())
        .sum();
    total / logits.len() as f32
}

/// One-hot encoding of `labels` as a `[batch, n_classes]` matrix.
pub fn one_hot(labels: &[usize], n_classes: usize) -> ModelResult<Array2<f32>> {
    let mut encoded = Array2::zeros((labels.len(), n_classes));
    for (row, &label) in labels.iter().enumerate() {
        if label >= n_classes {
            return Err(ModelError::LabelOutOfRange { label, n_classes });
        }
        encoded[[row, label]] = 1.0;
    }
    Ok(encoded)
}

/// Multi-class cross-entropy over logits, averaged across the batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrossEntropyLoss;

impl CrossEntropyLoss {
    pub fn forward(&self, logits: ArrayView2<'_, f32>, labels: &[usize]) -> ModelResult<f32> {
        if logits.nrows() == 0 {
            return Err(ModelError::Shape("cross-entropy over an empty batch".to_string()));
        }
        if logits.nrows() != labels.len() {
            return Err(ModelError::Shape(format!(
                "{} logit rows for {} labels",
                logits.nrows(),
                labels.len()
            )));
        }

        let n_classes = logits.ncols();
        let mut total = 0.0_f32;
        for (row, &label) in logits.axis_iter(Axis(0)).zip(labels) {
            if label >= n_classes {
                return Err(ModelError::LabelOutOfRange { label, n_classes });
            }
            let max = row.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
            let log_sum_exp = row.iter().map(|&v| (v - max).exp()).sum::<f32>().ln() + max;
            total += log_sum_exp - row[label];
        }
        Ok(total / labels.len() as f32)
    }
}
