//! Dataset adapter over keypoint-annotated bird images.
//!
//! Annotations live in a CSV table with columns `behavior`, `image_id`,
//! `image_file` followed by interleaved keypoint coordinate columns
//! (`head_x`, `head_y`, ..., `body2_x`, `body2_y`). Each image resolves to
//! `<root>/<behavior-label>/<image_id>/<image_file>`.
//!
//! Samples are returned resized to the square model input size with
//! keypoints rescaled accordingly and normalized to `[0, 1]`.

use anyhow::{anyhow, Context, Result};
use burn::tensor::{backend::Backend, Tensor};
use std::ops::Range;
use std::path::{Path, PathBuf};

use crate::color_utils::symbols;
use crate::keypoints::{behavior_label, KeypointScaler};
use crate::preprocessing::{preprocess_image, rescale_keypoints};

/// One row of the annotations table.
#[derive(Debug, Clone)]
pub struct AnnotationRow {
    pub behavior: usize,
    pub image_id: String,
    pub image_file: String,
    /// Keypoints in original pixel space, flattened `[x0, y0, x1, y1, ...]`
    pub keypoints: Vec<f32>,
}

/// Parsed annotations table with the keypoint column names from the header.
#[derive(Debug, Clone)]
pub struct PoseAnnotations {
    pub keypoint_names: Vec<String>,
    pub rows: Vec<AnnotationRow>,
}

impl PoseAnnotations {
    /// Load annotations from a CSV file.
    ///
    /// In strict mode an unparseable row is a hard error; in permissive mode
    /// it is skipped with a warning.
    pub fn load(path: &Path, strict: bool) -> Result<Self> {
        // Flexible so ragged rows reach parse_row, where strict/permissive
        // handling decides their fate instead of the reader aborting the load.
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)
            .with_context(|| format!("Failed to open annotations file: {}", path.display()))?;

        let headers = reader.headers()?.clone();
        if headers.len() < 5 {
            return Err(anyhow!(
                "Annotations header needs behavior, image_id, image_file and keypoint columns, got {} columns",
                headers.len()
            ));
        }

        let coord_columns = headers.len() - 3;
        if coord_columns % 2 != 0 {
            return Err(anyhow!(
                "Annotations have {} coordinate columns; expected an even number (x/y pairs)",
                coord_columns
            ));
        }

        // Keypoint names come from the x columns of the header ("head_x" -> "head")
        let keypoint_names: Vec<String> = headers
            .iter()
            .skip(3)
            .step_by(2)
            .map(|name| name.trim_end_matches("_x").to_string())
            .collect();

        let mut rows = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record = record?;
            match parse_row(&record, coord_columns) {
                Ok(row) => rows.push(row),
                Err(e) => {
                    if strict {
                        return Err(e.context(format!(
                            "Invalid annotation row {} in {}",
                            line + 2,
                            path.display()
                        )));
                    }
                    log::warn!(
                        "{}Skipping annotation row {} in {}: {e}",
                        symbols::warning(),
                        line + 2,
                        path.display()
                    );
                }
            }
        }

        Ok(Self {
            keypoint_names,
            rows,
        })
    }

    pub fn num_keypoints(&self) -> usize {
        self.keypoint_names.len()
    }
}

fn parse_row(record: &csv::StringRecord, coord_columns: usize) -> Result<AnnotationRow> {
    if record.len() != coord_columns + 3 {
        return Err(anyhow!(
            "Row has {} fields, expected {}",
            record.len(),
            coord_columns + 3
        ));
    }

    let behavior: usize = record[0]
        .trim()
        .parse()
        .map_err(|_| anyhow!("Invalid behavior index: '{}'", &record[0]))?;
    if behavior_label(behavior).is_none() {
        return Err(anyhow!("Behavior index out of range: {behavior}"));
    }

    let keypoints = record
        .iter()
        .skip(3)
        .map(|field| {
            field
                .trim()
                .parse::<f32>()
                .map_err(|_| anyhow!("Invalid keypoint coordinate: '{field}'"))
        })
        .collect::<Result<Vec<f32>>>()?;

    Ok(AnnotationRow {
        behavior,
        image_id: record[1].to_string(),
        image_file: record[2].to_string(),
        keypoints,
    })
}

/// A single loaded sample: preprocessed image buffer plus normalized keypoints.
#[derive(Debug, Clone)]
pub struct PoseSample {
    /// CHW float buffer of length `3 * image_size * image_size`
    pub image_data: Vec<f32>,
    /// Keypoints normalized to `[0, 1]`, flattened
    pub keypoints: Vec<f32>,
    pub path: PathBuf,
}

/// A batch of samples as framework tensors.
pub struct PoseBatch<B: Backend> {
    /// Shape `[batch, 3, image_size, image_size]`
    pub images: Tensor<B, 4>,
    /// Shape `[batch, num_keypoints * 2]`, normalized
    pub keypoints: Tensor<B, 2>,
    pub paths: Vec<PathBuf>,
}

/// Dataset adapter reading annotated images and keypoint coordinates.
pub struct PoseDataset {
    annotations: PoseAnnotations,
    root: PathBuf,
    image_size: u32,
}

impl PoseDataset {
    pub fn new(annotations: PoseAnnotations, root: impl Into<PathBuf>, image_size: u32) -> Self {
        Self {
            annotations,
            root: root.into(),
            image_size,
        }
    }

    pub fn len(&self) -> usize {
        self.annotations.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.rows.is_empty()
    }

    pub fn num_keypoints(&self) -> usize {
        self.annotations.num_keypoints()
    }

    pub fn keypoint_names(&self) -> &[String] {
        &self.annotations.keypoint_names
    }

    pub fn image_size(&self) -> u32 {
        self.image_size
    }

    /// Scaler between the model's normalized space and resized pixel space.
    pub fn scaler(&self) -> KeypointScaler {
        KeypointScaler::new(self.image_size, self.image_size)
    }

    /// Resolve the image path for a sample:
    /// `<root>/<behavior-label>/<image_id>/<image_file>`
    pub fn image_path(&self, index: usize) -> Result<PathBuf> {
        let row = self
            .annotations
            .rows
            .get(index)
            .ok_or_else(|| anyhow!("Sample index {index} out of range ({} rows)", self.len()))?;
        let label = behavior_label(row.behavior)
            .ok_or_else(|| anyhow!("Behavior index out of range: {}", row.behavior))?;
        Ok(self
            .root
            .join(label)
            .join(&row.image_id)
            .join(&row.image_file))
    }

    /// Load and preprocess a single sample.
    pub fn load_sample(&self, index: usize) -> Result<PoseSample> {
        let path = self.image_path(index)?;
        let row = &self.annotations.rows[index];

        let img = image::open(&path)
            .with_context(|| format!("Failed to load image: {}", path.display()))?;
        let (orig_width, orig_height) = (img.width(), img.height());

        let image_data = preprocess_image(&img, self.image_size);

        let rescaled =
            rescale_keypoints(&row.keypoints, orig_width, orig_height, self.image_size);
        let keypoints = self.scaler().normalize(&rescaled);

        Ok(PoseSample {
            image_data,
            keypoints,
            path,
        })
    }

    /// Split the dataset into consecutive index ranges of `batch_size`.
    /// The trailing partial batch is kept.
    pub fn batch_ranges(&self, batch_size: usize) -> Vec<Range<usize>> {
        (0..self.len())
            .step_by(batch_size.max(1))
            .map(|start| start..(start + batch_size).min(self.len()))
            .collect()
    }

    /// Load a batch of samples into framework tensors.
    pub fn load_batch<B: Backend>(
        &self,
        range: Range<usize>,
        device: &B::Device,
    ) -> Result<PoseBatch<B>> {
        let batch = range.len();
        if batch == 0 {
            return Err(anyhow!("Cannot load an empty batch"));
        }

        let size = self.image_size as usize;
        let num_coords = self.num_keypoints() * 2;

        let mut image_data = Vec::with_capacity(batch * 3 * size * size);
        let mut keypoint_data = Vec::with_capacity(batch * num_coords);
        let mut paths = Vec::with_capacity(batch);

        for index in range {
            let sample = self.load_sample(index)?;
            if sample.keypoints.len() != num_coords {
                return Err(anyhow!(
                    "Sample {index} has {} coordinates, expected {num_coords}",
                    sample.keypoints.len()
                ));
            }
            image_data.extend_from_slice(&sample.image_data);
            keypoint_data.extend_from_slice(&sample.keypoints);
            paths.push(sample.path);
        }

        let images = Tensor::<B, 1>::from_floats(image_data.as_slice(), device)
            .reshape([batch, 3, size, size]);
        let keypoints = Tensor::<B, 1>::from_floats(keypoint_data.as_slice(), device)
            .reshape([batch, num_coords]);

        Ok(PoseBatch {
            images,
            keypoints,
            paths,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn annotations_fixture() -> PoseAnnotations {
        PoseAnnotations {
            keypoint_names: vec!["head".into(), "eye".into(), "beak_tip".into()],
            rows: vec![
                AnnotationRow {
                    behavior: 0,
                    image_id: "img001".into(),
                    image_file: "frame_0.jpg".into(),
                    keypoints: vec![10.0, 10.0, 20.0, 20.0, 30.0, 30.0],
                },
                AnnotationRow {
                    behavior: 1,
                    image_id: "img002".into(),
                    image_file: "frame_4.jpg".into(),
                    keypoints: vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
                },
            ],
        }
    }

    #[test]
    fn test_image_path_resolution() {
        let dataset = PoseDataset::new(annotations_fixture(), "/data/birds", 224);

        let path = dataset.image_path(0).unwrap();
        assert_eq!(path, PathBuf::from("/data/birds/nesting/img001/frame_0.jpg"));

        let path = dataset.image_path(1).unwrap();
        assert_eq!(
            path,
            PathBuf::from("/data/birds/preening/img002/frame_4.jpg")
        );

        assert!(dataset.image_path(2).is_err());
    }

    #[test]
    fn test_batch_ranges_keep_trailing_partial_batch() {
        let dataset = PoseDataset::new(annotations_fixture(), "/data/birds", 224);
        let ranges = dataset.batch_ranges(1);
        assert_eq!(ranges, vec![0..1, 1..2]);

        // batch_size larger than the dataset yields one partial batch
        let ranges = dataset.batch_ranges(16);
        assert_eq!(ranges, vec![0..2]);
    }

    #[test]
    fn test_parse_row_rejects_bad_behavior() {
        let record = csv::StringRecord::from(vec!["7", "img", "f.jpg", "1.0", "2.0"]);
        let err = parse_row(&record, 2).unwrap_err();
        assert!(err.to_string().contains("Behavior index out of range"));
    }

    #[test]
    fn test_parse_row_rejects_bad_coordinate() {
        let record = csv::StringRecord::from(vec!["0", "img", "f.jpg", "1.0", "oops"]);
        let err = parse_row(&record, 2).unwrap_err();
        assert!(err.to_string().contains("Invalid keypoint coordinate"));
    }
}
