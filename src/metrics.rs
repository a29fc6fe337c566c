//! Head-size-normalized keypoint accuracy (PCKh).
//!
//! A predicted keypoint counts as correct when its Euclidean distance to the
//! ground-truth keypoint is below `threshold * head_size`, where the head
//! size is the distance between the head and beak-tip keypoints of the
//! ground-truth annotation. Metric arithmetic runs on host buffers pulled
//! from the framework tensors.

use anyhow::{anyhow, Result};
use burn::tensor::backend::Backend;
use serde::Serialize;

use crate::color_utils::progress::{create_batch_progress_bar, finish_batch_progress_bar};
use crate::dataset::PoseDataset;
use crate::keypoints::{BEAK_TIP_INDEX, HEAD_INDEX};
use crate::model::PoseModel;

/// Per-sample head size for a batch of flattened keypoints.
///
/// `keypoints` is row-major `[batch, num_keypoints * 2]`; the result has one
/// Euclidean head-to-beak-tip distance per sample.
pub fn head_sizes(keypoints: &[f32], num_keypoints: usize) -> Result<Vec<f32>> {
    let stride = num_keypoints * 2;
    if stride == 0 || keypoints.len() % stride != 0 {
        return Err(anyhow!(
            "Keypoint buffer of length {} is not a multiple of {stride}",
            keypoints.len()
        ));
    }
    if num_keypoints <= BEAK_TIP_INDEX {
        return Err(anyhow!(
            "Head size needs at least {} keypoints, got {num_keypoints}",
            BEAK_TIP_INDEX + 1
        ));
    }

    Ok(keypoints
        .chunks_exact(stride)
        .map(|row| {
            let hx = row[HEAD_INDEX * 2];
            let hy = row[HEAD_INDEX * 2 + 1];
            let bx = row[BEAK_TIP_INDEX * 2];
            let by = row[BEAK_TIP_INDEX * 2 + 1];
            ((hx - bx).powi(2) + (hy - by).powi(2)).sqrt()
        })
        .collect())
}

/// PCKh over one batch, as a percentage of correct keypoints.
///
/// Keypoints of a sample with zero head size count as incorrect rather than
/// producing NaN. An empty batch yields 0.0.
pub fn pckh(
    predictions: &[f32],
    ground_truth: &[f32],
    head_sizes: &[f32],
    num_keypoints: usize,
    threshold: f32,
) -> Result<f32> {
    let stride = num_keypoints * 2;
    if predictions.len() != ground_truth.len() {
        return Err(anyhow!(
            "Prediction buffer ({}) and ground truth buffer ({}) differ in length",
            predictions.len(),
            ground_truth.len()
        ));
    }
    if stride == 0 || predictions.len() % stride != 0 {
        return Err(anyhow!(
            "Keypoint buffer of length {} is not a multiple of {stride}",
            predictions.len()
        ));
    }
    let batch = predictions.len() / stride;
    if head_sizes.len() != batch {
        return Err(anyhow!(
            "Got {} head sizes for a batch of {batch}",
            head_sizes.len()
        ));
    }
    if batch == 0 {
        return Ok(0.0);
    }

    let mut correct = 0usize;
    for (sample, (pred_row, gt_row)) in predictions
        .chunks_exact(stride)
        .zip(ground_truth.chunks_exact(stride))
        .enumerate()
    {
        let head_size = head_sizes[sample];
        if head_size <= 0.0 {
            continue;
        }
        for k in 0..num_keypoints {
            let dx = pred_row[k * 2] - gt_row[k * 2];
            let dy = pred_row[k * 2 + 1] - gt_row[k * 2 + 1];
            let distance = (dx * dx + dy * dy).sqrt();
            if distance / head_size < threshold {
                correct += 1;
            }
        }
    }

    Ok(correct as f32 / (batch * num_keypoints) as f32 * 100.0)
}

/// Dataset-level evaluation results.
#[derive(Debug, Clone, Serialize)]
pub struct EvalSummary {
    /// Sample-weighted average PCKh over the dataset, as a percentage
    pub average_pckh: f64,
    pub threshold: f32,
    pub num_samples: usize,
    pub num_batches: usize,
    pub num_keypoints: usize,
}

/// Run the model over the whole dataset in batches and average PCKh,
/// weighting each batch by its sample count.
pub fn evaluate_dataset<B: Backend>(
    model: &PoseModel<B>,
    dataset: &PoseDataset,
    batch_size: usize,
    threshold: f32,
    device: &B::Device,
) -> Result<EvalSummary> {
    let ranges = dataset.batch_ranges(batch_size);
    let num_keypoints = dataset.num_keypoints();
    let progress = create_batch_progress_bar(ranges.len());

    let mut total_pckh = 0.0f64;
    let mut total_samples = 0usize;

    for (index, range) in ranges.iter().enumerate() {
        let batch = dataset.load_batch::<B>(range.clone(), device)?;
        let batch_len = batch.paths.len();

        let ground_truth = batch
            .keypoints
            .to_data()
            .to_vec::<f32>()
            .map_err(|e| anyhow!("Failed to read ground truth tensor: {e:?}"))?;
        let sizes = head_sizes(&ground_truth, num_keypoints)?;

        let outputs = model.forward(batch.images);
        let predictions = outputs
            .to_data()
            .to_vec::<f32>()
            .map_err(|e| anyhow!("Failed to read prediction tensor: {e:?}"))?;

        let batch_pckh = pckh(&predictions, &ground_truth, &sizes, num_keypoints, threshold)?;
        log::debug!(
            "📊 Batch {}/{}: PCKh@{threshold} = {batch_pckh:.2}% over {batch_len} sample(s)",
            index + 1,
            ranges.len()
        );

        total_pckh += batch_pckh as f64 * batch_len as f64;
        total_samples += batch_len;

        if let Some(pb) = &progress {
            pb.inc(1);
        }
    }

    if let Some(pb) = progress {
        finish_batch_progress_bar(pb);
    }

    if total_samples == 0 {
        return Err(anyhow!("No samples to evaluate"));
    }

    Ok(EvalSummary {
        average_pckh: total_pckh / total_samples as f64,
        threshold,
        num_samples: total_samples,
        num_batches: ranges.len(),
        num_keypoints,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_head_sizes_single_sample() {
        // head at (0, 0), beak tip at (3, 4): distance 5
        let keypoints = vec![0.0, 0.0, 9.0, 9.0, 3.0, 4.0];
        let sizes = head_sizes(&keypoints, 3).unwrap();
        assert_eq!(sizes.len(), 1);
        assert!((sizes[0] - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_head_sizes_batch() {
        let keypoints = vec![
            0.0, 0.0, 9.0, 9.0, 3.0, 4.0, // head size 5
            1.0, 1.0, 0.0, 0.0, 1.0, 2.0, // head size 1
        ];
        let sizes = head_sizes(&keypoints, 3).unwrap();
        assert_eq!(sizes.len(), 2);
        assert!((sizes[0] - 5.0).abs() < 1e-6);
        assert!((sizes[1] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_head_sizes_rejects_short_rows() {
        // Two keypoints per sample cannot contain a beak tip at index 2
        assert!(head_sizes(&[0.0, 0.0, 1.0, 1.0], 2).is_err());
        // Ragged buffer
        assert!(head_sizes(&[0.0; 7], 3).is_err());
    }

    #[test]
    fn test_pckh_perfect_predictions() {
        let gt = vec![0.0, 0.0, 9.0, 9.0, 3.0, 4.0];
        let sizes = head_sizes(&gt, 3).unwrap();
        let score = pckh(&gt, &gt, &sizes, 3, 0.2).unwrap();
        assert!((score - 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_pckh_threshold_is_strict() {
        // head size 10, threshold 0.2 -> correct below distance 2.0
        let gt = vec![0.0, 0.0, 5.0, 5.0, 10.0, 0.0];
        let sizes = head_sizes(&gt, 3).unwrap();
        assert!((sizes[0] - 10.0).abs() < 1e-6);

        // First keypoint off by 1.9 (correct), second by exactly 2.0
        // (incorrect: strict inequality), third perfect (correct)
        let pred = vec![1.9, 0.0, 5.0, 7.0, 10.0, 0.0];
        let score = pckh(&pred, &gt, &sizes, 3, 0.2).unwrap();
        assert!((score - 200.0 / 3.0).abs() < 1e-4, "got {score}");
    }

    #[test]
    fn test_pckh_zero_head_size_counts_as_incorrect() {
        // head and beak tip coincide
        let gt = vec![1.0, 1.0, 5.0, 5.0, 1.0, 1.0];
        let sizes = head_sizes(&gt, 3).unwrap();
        assert_eq!(sizes[0], 0.0);

        let score = pckh(&gt, &gt, &sizes, 3, 0.2).unwrap();
        assert_eq!(score, 0.0);
        assert!(!score.is_nan());
    }

    #[test]
    fn test_pckh_empty_batch() {
        let score = pckh(&[], &[], &[], 3, 0.2).unwrap();
        assert_eq!(score, 0.0);
    }

    #[test]
    fn test_pckh_length_mismatch() {
        assert!(pckh(&[0.0; 6], &[0.0; 12], &[1.0], 3, 0.2).is_err());
        assert!(pckh(&[0.0; 6], &[0.0; 6], &[1.0, 1.0], 3, 0.2).is_err());
    }
}
