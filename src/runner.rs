//! Command drivers shared by the CLI.
//!
//! Each driver follows the same shape: load the annotated dataset, build the
//! requested model (optionally loading a weight record), run the batch loop,
//! log a summary, and persist a report when asked to.

use anyhow::{anyhow, Result};
use burn::tensor::backend::Backend;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::color_utils::{colors, symbols};
use crate::config::{BaseRunConfig, EvalConfig, InferConfig, VisualizeConfig};
use crate::dataset::PoseDataset;
use crate::inference::{collect_predictions, PredictionTable};
use crate::keypoints::as_points;
use crate::metrics::{evaluate_dataset, EvalSummary};
use crate::model::PoseModel;
use crate::report::{report_path, ExecutionContext, RunReport};
use crate::visualization::{render_overlay, save_overlay};

/// CPU tensor backend used by all commands.
pub type PoseBackend = burn::backend::NdArray<f32>;

/// Device for the CPU backend.
pub fn device() -> <PoseBackend as Backend>::Device {
    Default::default()
}

/// Load the annotations table and wrap it as a dataset.
fn load_dataset(base: &BaseRunConfig) -> Result<PoseDataset> {
    let annotations =
        crate::dataset::PoseAnnotations::load(Path::new(&base.annotations), base.strict)?;
    let dataset = PoseDataset::new(annotations, &base.data_root, base.image_size);

    if dataset.is_empty() {
        return Err(anyhow!(
            "No annotated samples found in {}",
            base.annotations
        ));
    }

    log::info!(
        "{} Found {} annotated sample(s) with {} keypoint(s)",
        symbols::resources_found(),
        dataset.len(),
        dataset.num_keypoints()
    );

    Ok(dataset)
}

/// Build the configured model and load its weight record if one is given.
fn build_model(
    base: &BaseRunConfig,
    num_keypoints: usize,
    device: &<PoseBackend as Backend>::Device,
) -> Result<PoseModel<PoseBackend>> {
    let build_start = Instant::now();
    let mut model = PoseModel::<PoseBackend>::build(base.arch, num_keypoints, device);

    match &base.weights {
        Some(weights) => {
            model = model.load_weights(Path::new(weights), device)?;
            log::info!(
                "{} Loaded {} weights from {} in {:.1}ms",
                symbols::completed_successfully(),
                model.name(),
                weights,
                build_start.elapsed().as_secs_f64() * 1000.0
            );
        }
        None => {
            log::warn!(
                "{}No --weights given; {} runs randomly initialized",
                symbols::warning(),
                model.name()
            );
        }
    }

    Ok(model)
}

/// Evaluate PCKh over the dataset.
pub fn run_eval(config: EvalConfig) -> Result<EvalSummary> {
    let run_start = Instant::now();
    let device = device();

    let dataset = load_dataset(&config.base)?;
    let model = build_model(&config.base, dataset.num_keypoints(), &device)?;

    let summary = evaluate_dataset(&model, &dataset, config.base.batch_size, config.threshold, &device)?;
    let elapsed_ms = run_start.elapsed().as_secs_f64() * 1000.0;

    log::info!(
        "{} Average PCKh@{}: {} over {} sample(s) in {:.1}s",
        symbols::completed_successfully(),
        summary.threshold,
        colors::metric_value(&format!("{:.2}%", summary.average_pckh)),
        summary.num_samples,
        elapsed_ms / 1000.0
    );

    if config.base.save_report {
        let path = report_path(
            config.base.output_dir.as_deref(),
            Path::new(&config.base.annotations),
            "eval",
        );
        let report = RunReport::new(ExecutionContext::new(
            model.name(),
            config.base.weights.as_deref(),
            elapsed_ms,
        ))
        .with_config(&config)?
        .with_results(&summary)?;
        report.save(&path)?;
        log::info!(
            "{} Report saved to: {}",
            symbols::completed_successfully(),
            path.display()
        );
    }

    Ok(summary)
}

/// Collect predictions over the dataset and write them as CSV.
pub fn run_infer(config: InferConfig) -> Result<PredictionTable> {
    let run_start = Instant::now();
    let device = device();

    let dataset = load_dataset(&config.base)?;
    let model = build_model(&config.base, dataset.num_keypoints(), &device)?;

    let table = collect_predictions(&model, &dataset, config.base.batch_size, &device)?;
    let elapsed_ms = run_start.elapsed().as_secs_f64() * 1000.0;

    let output = match &config.output {
        Some(path) => PathBuf::from(path),
        None => report_path(
            config.base.output_dir.as_deref(),
            Path::new(&config.base.annotations),
            "infer",
        )
        .with_file_name("predictions.csv"),
    };
    table.write_csv(&output)?;

    log::info!(
        "{} Collected {} prediction(s) in {:.1}s → {}",
        symbols::completed_successfully(),
        table.len(),
        elapsed_ms / 1000.0,
        output.display()
    );

    if config.base.save_report {
        let path = report_path(
            config.base.output_dir.as_deref(),
            Path::new(&config.base.annotations),
            "infer",
        );
        let report = RunReport::new(ExecutionContext::new(
            model.name(),
            config.base.weights.as_deref(),
            elapsed_ms,
        ))
        .with_config(&config)?;
        report.save(&path)?;
        log::info!(
            "{} Report saved to: {}",
            symbols::completed_successfully(),
            path.display()
        );
    }

    Ok(table)
}

/// Overlay output path for a sample image.
///
/// With an output directory the image id is folded into the name to keep
/// samples from different recordings apart; otherwise the overlay lands next
/// to the input with a `_pose` suffix.
fn overlay_path(image_path: &Path, output_dir: Option<&str>) -> PathBuf {
    let stem = image_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("overlay");

    match output_dir {
        Some(dir) => {
            let image_id = image_path
                .parent()
                .and_then(|p| p.file_name())
                .and_then(|s| s.to_str())
                .unwrap_or("unknown");
            Path::new(dir).join(format!("{image_id}_{stem}_pose.png"))
        }
        None => image_path
            .parent()
            .unwrap_or(Path::new("."))
            .join(format!("{stem}_pose.png")),
    }
}

/// Render prediction overlays for a bounded number of batches.
/// Returns the number of overlay images written.
pub fn run_visualize(config: VisualizeConfig) -> Result<usize> {
    let run_start = Instant::now();
    let device = device();

    let dataset = load_dataset(&config.base)?;
    let model = build_model(&config.base, dataset.num_keypoints(), &device)?;

    let scaler = dataset.scaler();
    let size = dataset.image_size();
    let num_coords = dataset.num_keypoints() * 2;
    let mut written = 0;

    for range in dataset
        .batch_ranges(config.base.batch_size)
        .into_iter()
        .take(config.num_batches)
    {
        let batch = dataset.load_batch::<PoseBackend>(range, &device)?;

        let ground_truth = batch
            .keypoints
            .to_data()
            .to_vec::<f32>()
            .map_err(|e| anyhow!("Failed to read ground truth tensor: {e:?}"))?;
        let predictions = model
            .forward(batch.images)
            .to_data()
            .to_vec::<f32>()
            .map_err(|e| anyhow!("Failed to read prediction tensor: {e:?}"))?;

        for (i, path) in batch.paths.iter().enumerate() {
            let img = image::open(path)?;
            let resized = image::DynamicImage::ImageRgb8(image::imageops::resize(
                &img.to_rgb8(),
                size,
                size,
                image::imageops::FilterType::Lanczos3,
            ));

            let gt_row = &ground_truth[i * num_coords..(i + 1) * num_coords];
            let pred_row = &predictions[i * num_coords..(i + 1) * num_coords];

            let overlay = render_overlay(
                &resized,
                &as_points(&scaler.denormalize(gt_row)),
                &as_points(&scaler.denormalize(pred_row)),
            );

            let output = overlay_path(path, config.base.output_dir.as_deref());
            save_overlay(&overlay, &output)?;
            log::debug!(
                "{} Overlay saved to: {}",
                symbols::completed_successfully(),
                output.display()
            );
            written += 1;
        }
    }

    let elapsed_ms = run_start.elapsed().as_secs_f64() * 1000.0;
    log::info!(
        "{} Rendered {written} overlay(s) in {:.1}s",
        symbols::completed_successfully(),
        elapsed_ms / 1000.0
    );

    if config.base.save_report {
        let path = report_path(
            config.base.output_dir.as_deref(),
            Path::new(&config.base.annotations),
            "visualize",
        );
        let report = RunReport::new(ExecutionContext::new(
            model.name(),
            config.base.weights.as_deref(),
            elapsed_ms,
        ))
        .with_config(&config)?;
        report.save(&path)?;
        log::info!(
            "{} Report saved to: {}",
            symbols::completed_successfully(),
            path.display()
        );
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlay_path_next_to_input() {
        let path = overlay_path(Path::new("/data/nesting/img001/frame_0.jpg"), None);
        assert_eq!(path, PathBuf::from("/data/nesting/img001/frame_0_pose.png"));
    }

    #[test]
    fn test_overlay_path_in_output_dir_includes_image_id() {
        let path = overlay_path(
            Path::new("/data/nesting/img001/frame_0.jpg"),
            Some("/tmp/overlays"),
        );
        assert_eq!(
            path,
            PathBuf::from("/tmp/overlays/img001_frame_0_pose.png")
        );
    }
}
