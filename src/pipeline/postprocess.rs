use serde::Serialize;

use crate::{
    error::InferenceError,
    model::ClassLabel,
    pipeline::{Probabilities, RawScores, TensorLedger},
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassProbability {
    pub class: ClassLabel,
    /// Percentage, two decimals, in `[0, 100]`.
    pub probability: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    #[serde(rename = "class")]
    pub top_class: ClassLabel,
    #[serde(rename = "confidence")]
    pub top_confidence: f64,
    pub probabilities: Vec<ClassProbability>,
}

/// Checks the model output against the label set before anything is derived from it.
pub fn validate_scores(raw: Vec<f32>, ledger: &TensorLedger) -> Result<RawScores, InferenceError> {
    if raw.len() != ClassLabel::COUNT {
        return Err(InferenceError::OutputLength {
            expected: ClassLabel::COUNT,
            actual: raw.len(),
        });
    }
    if let Some(idx) = raw.iter().position(|v| !v.is_finite()) {
        return Err(InferenceError::NonFinite(idx));
    }
    Ok(RawScores::new(raw, ledger))
}

/// Numerically stable softmax: the maximum is subtracted before exponentiation.
pub fn softmax(values: &[f32]) -> Vec<f32> {
    if values.is_empty() {
        return Vec::new();
    }
    let max_val = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mut exps = Vec::with_capacity(values.len());
    let mut sum = 0.0;
    for v in values {
        let e = (v - max_val).exp();
        exps.push(e);
        sum += e;
    }
    exps.iter().map(|e| e / sum).collect()
}

pub fn probabilities(scores: &RawScores, ledger: &TensorLedger) -> Probabilities {
    Probabilities::new(softmax(scores.as_slice()), ledger)
}

/// Index of the largest value; the first one wins on ties.
pub fn argmax(values: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (idx, &value) in values.iter().enumerate() {
        match best {
            Some((_, current)) if value <= current => {}
            _ => best = Some((idx, value)),
        }
    }
    best.map(|(idx, _)| idx)
}

/// Probability to percentage, rounded to two decimals and clamped to `[0, 100]`.
pub fn normalize_confidence(probability: f32) -> f64 {
    let percent = (probability as f64 * 100.0 * 100.0).round() / 100.0;
    percent.clamp(0.0, 100.0)
}

pub fn assemble(probs: &Probabilities) -> Result<PredictionResult, InferenceError> {
    let values = probs.as_slice();
    let top = argmax(values)
        .and_then(ClassLabel::from_index)
        .ok_or(InferenceError::OutputLength {
            expected: ClassLabel::COUNT,
            actual: values.len(),
        })?;

    let probabilities: Vec<ClassProbability> = ClassLabel::ALL
        .iter()
        .zip(values)
        .map(|(&class, &p)| ClassProbability {
            class,
            probability: normalize_confidence(p),
        })
        .collect();

    Ok(PredictionResult {
        top_class: top,
        top_confidence: probabilities[top.index()].probability,
        probabilities,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 0.011
    }

    #[test]
    fn softmax_matches_reference_values() {
        let probs = softmax(&[2.0, 0.5, 0.1, 0.0, 0.2, 0.1, 0.05]);
        let expected = [0.5089, 0.1135, 0.0761, 0.0689, 0.0841, 0.0761, 0.0724];
        for (p, e) in probs.iter().zip(expected) {
            assert!((p - e).abs() < 1e-3, "{p} vs {e}");
        }
        let sum: f32 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
    }

    #[test]
    fn softmax_survives_huge_logits() {
        let probs = softmax(&[1000.0, 999.0, -1000.0]);
        assert!(probs.iter().all(|p| p.is_finite()));
        assert!(probs[0] > probs[1]);
        assert_eq!(probs[2], 0.0);
    }

    #[test]
    fn argmax_prefers_first_on_ties() {
        assert_eq!(argmax(&[0.1, 0.4, 0.4, 0.1]), Some(1));
        assert_eq!(argmax(&[0.5, 0.5]), Some(0));
        assert_eq!(argmax(&[-3.0, -1.0, -2.0]), Some(1));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn confidence_is_rounded_and_clamped() {
        assert_eq!(normalize_confidence(0.50886), 50.89);
        assert_eq!(normalize_confidence(0.0), 0.0);
        assert_eq!(normalize_confidence(1.0), 100.0);
        assert_eq!(normalize_confidence(1.00001), 100.0);
        assert_eq!(normalize_confidence(-0.00001), 0.0);
    }

    #[test]
    fn rejects_wrong_output_length() {
        let ledger = TensorLedger::new();
        let err = validate_scores(vec![0.0; 5], &ledger).unwrap_err();
        assert!(matches!(
            err,
            InferenceError::OutputLength {
                expected: 7,
                actual: 5
            }
        ));
        assert_eq!(ledger.live(), 0);
    }

    #[test]
    fn rejects_non_finite_scores() {
        let ledger = TensorLedger::new();
        let mut raw = vec![0.0; 7];
        raw[3] = f32::NAN;
        let err = validate_scores(raw, &ledger).unwrap_err();
        assert!(matches!(err, InferenceError::NonFinite(3)));
    }

    #[test]
    fn assembles_result_in_label_order() {
        let ledger = TensorLedger::new();
        let scores = validate_scores(vec![2.0, 0.5, 0.1, 0.0, 0.2, 0.1, 0.05], &ledger).unwrap();
        let probs = probabilities(&scores, &ledger);
        let result = assemble(&probs).unwrap();

        assert_eq!(result.top_class, ClassLabel::Bags);
        assert!(close(result.top_confidence, 50.89));
        assert_eq!(result.probabilities.len(), 7);
        for (entry, label) in result.probabilities.iter().zip(ClassLabel::ALL) {
            assert_eq!(entry.class, label);
        }
        let total: f64 = result.probabilities.iter().map(|p| p.probability).sum();
        assert!((total - 100.0).abs() <= 0.1);
    }

    #[test]
    fn serializes_to_wire_shape() {
        let result = PredictionResult {
            top_class: ClassLabel::Shoes,
            top_confidence: 99.5,
            probabilities: vec![ClassProbability {
                class: ClassLabel::Shoes,
                probability: 99.5,
            }],
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["class"], "Shoes");
        assert_eq!(json["confidence"], 99.5);
        assert_eq!(json["probabilities"][0]["class"], "Shoes");
        assert_eq!(json["probabilities"][0]["probability"], 99.5);
    }
}
