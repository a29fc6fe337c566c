//! Keypoint coordinate transforms and dataset naming conventions.
//!
//! Keypoints travel through the pipeline as flattened `[x0, y0, x1, y1, ...]`
//! buffers: even indices are x coordinates, odd indices are y coordinates.
//! The model regresses coordinates normalized to `[0, 1]`; the scaler in this
//! module converts between normalized and pixel space.

/// Behavior labels indexed by the `behavior` column of the annotations table.
pub const BEHAVIOR_LABELS: [&str; 2] = ["nesting", "preening"];

/// Index of the head keypoint in annotation order.
pub const HEAD_INDEX: usize = 0;

/// Index of the beak-tip keypoint in annotation order.
pub const BEAK_TIP_INDEX: usize = 2;

/// Resolve a behavior index to its label.
pub fn behavior_label(behavior: usize) -> Option<&'static str> {
    BEHAVIOR_LABELS.get(behavior).copied()
}

/// Converts keypoint buffers between pixel space and normalized space.
///
/// x coordinates are scaled by the image width, y coordinates by the image
/// height. Both directions return a new buffer and leave the input untouched.
#[derive(Debug, Clone, Copy)]
pub struct KeypointScaler {
    pub image_width: f32,
    pub image_height: f32,
}

impl KeypointScaler {
    pub fn new(image_width: u32, image_height: u32) -> Self {
        Self {
            image_width: image_width as f32,
            image_height: image_height as f32,
        }
    }

    /// Map pixel coordinates into `[0, 1]` normalized space.
    pub fn normalize(&self, keypoints: &[f32]) -> Vec<f32> {
        keypoints
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                if i % 2 == 0 {
                    v / self.image_width
                } else {
                    v / self.image_height
                }
            })
            .collect()
    }

    /// Map normalized coordinates back into pixel space.
    pub fn denormalize(&self, keypoints: &[f32]) -> Vec<f32> {
        keypoints
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                if i % 2 == 0 {
                    v * self.image_width
                } else {
                    v * self.image_height
                }
            })
            .collect()
    }
}

/// View a flattened keypoint buffer as `(x, y)` pairs.
pub fn as_points(keypoints: &[f32]) -> Vec<(f32, f32)> {
    keypoints.chunks_exact(2).map(|c| (c[0], c[1])).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_behavior_labels() {
        assert_eq!(behavior_label(0), Some("nesting"));
        assert_eq!(behavior_label(1), Some("preening"));
        assert_eq!(behavior_label(2), None);
    }

    #[test]
    fn test_normalize_scales_axes_independently() {
        let scaler = KeypointScaler::new(200, 100);
        let pixels = vec![100.0, 50.0, 200.0, 100.0];

        let normalized = scaler.normalize(&pixels);
        assert_eq!(normalized, vec![0.5, 0.5, 1.0, 1.0]);
        // Input buffer is untouched
        assert_eq!(pixels, vec![100.0, 50.0, 200.0, 100.0]);
    }

    #[test]
    fn test_denormalize_inverts_normalize() {
        let scaler = KeypointScaler::new(640, 480);
        let pixels = vec![320.0, 240.0, 64.0, 48.0, 0.0, 480.0];

        let restored = scaler.denormalize(&scaler.normalize(&pixels));
        for (a, b) in restored.iter().zip(pixels.iter()) {
            assert!((a - b).abs() < 1e-3, "expected {b}, got {a}");
        }
    }

    #[test]
    fn test_as_points() {
        let points = as_points(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(points, vec![(1.0, 2.0), (3.0, 4.0)]);
    }
}
