//! Batch inference collection.
//!
//! Runs the model over the whole dataset, denormalizes the predicted
//! keypoints into pixel space of the resized model input, and concatenates
//! everything into a single prediction table that can be persisted as CSV.

use anyhow::{anyhow, Context, Result};
use burn::tensor::backend::Backend;
use std::path::{Path, PathBuf};

use crate::color_utils::progress::{create_batch_progress_bar, finish_batch_progress_bar};
use crate::dataset::PoseDataset;
use crate::model::PoseModel;

/// One predicted sample: source image and flattened pixel-space keypoints.
#[derive(Debug, Clone)]
pub struct PredictionRow {
    pub image: PathBuf,
    pub keypoints: Vec<f32>,
}

/// Concatenated predictions for a whole dataset.
#[derive(Debug, Clone)]
pub struct PredictionTable {
    pub keypoint_names: Vec<String>,
    pub rows: Vec<PredictionRow>,
}

impl PredictionTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Write the table as CSV: `image` column followed by `<name>_x`/`<name>_y`
    /// columns matching the annotation header.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("Failed to create predictions file: {}", path.display()))?;

        let mut header = vec!["image".to_string()];
        for name in &self.keypoint_names {
            header.push(format!("{name}_x"));
            header.push(format!("{name}_y"));
        }
        writer.write_record(&header)?;

        for row in &self.rows {
            let mut record = vec![row.image.display().to_string()];
            record.extend(row.keypoints.iter().map(|v| v.to_string()));
            writer.write_record(&record)?;
        }

        writer.flush()?;
        Ok(())
    }
}

/// Run the model over every sample and collect denormalized predictions.
pub fn collect_predictions<B: Backend>(
    model: &PoseModel<B>,
    dataset: &PoseDataset,
    batch_size: usize,
    device: &B::Device,
) -> Result<PredictionTable> {
    let ranges = dataset.batch_ranges(batch_size);
    let scaler = dataset.scaler();
    let num_coords = dataset.num_keypoints() * 2;
    let progress = create_batch_progress_bar(ranges.len());

    let mut rows = Vec::with_capacity(dataset.len());

    for range in ranges {
        let batch = dataset.load_batch::<B>(range, device)?;

        let outputs = model.forward(batch.images);
        let predictions = outputs
            .to_data()
            .to_vec::<f32>()
            .map_err(|e| anyhow!("Failed to read prediction tensor: {e:?}"))?;

        for (path, pred_row) in batch.paths.into_iter().zip(predictions.chunks_exact(num_coords)) {
            rows.push(PredictionRow {
                image: path,
                keypoints: scaler.denormalize(pred_row),
            });
        }

        if let Some(pb) = &progress {
            pb.inc(1);
        }
    }

    if let Some(pb) = progress {
        finish_batch_progress_bar(pb);
    }

    Ok(PredictionTable {
        keypoint_names: dataset.keypoint_names().to_vec(),
        rows,
    })
}
