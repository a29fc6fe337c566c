//! Image preprocessing for the pose regression models.
//!
//! Images are resized to a square model input size and converted to a CHW
//! float buffer normalized with the ImageNet statistics the pretrained
//! ResNet-50 backbone expects. Keypoints annotated in original pixel space
//! are rescaled with the same per-axis factors so they stay attached to the
//! resized image.

use image::DynamicImage;

/// Per-channel mean used by the pretrained backbone.
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// Per-channel standard deviation used by the pretrained backbone.
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Resize an image to `target_size` x `target_size` and convert it to a CHW
/// float buffer of length `3 * target_size * target_size`, scaled to [0, 1]
/// and standardized with the ImageNet mean and std.
pub fn preprocess_image(img: &DynamicImage, target_size: u32) -> Vec<f32> {
    let rgb_img = img.to_rgb8();

    let resized = image::imageops::resize(
        &rgb_img,
        target_size,
        target_size,
        image::imageops::FilterType::Lanczos3,
    );

    // Fill in CHW order: channel, height, width
    let mut input_data = Vec::with_capacity((3 * target_size * target_size) as usize);
    for c in 0..3 {
        for y in 0..target_size {
            for x in 0..target_size {
                let pixel = resized.get_pixel(x, y);
                let value = pixel[c] as f32 / 255.0;
                input_data.push((value - IMAGENET_MEAN[c as usize]) / IMAGENET_STD[c as usize]);
            }
        }
    }

    input_data
}

/// Rescale keypoints annotated on an `orig_width` x `orig_height` image to
/// the coordinates of the resized `target_size` x `target_size` image.
pub fn rescale_keypoints(
    keypoints: &[f32],
    orig_width: u32,
    orig_height: u32,
    target_size: u32,
) -> Vec<f32> {
    let scale_x = target_size as f32 / orig_width as f32;
    let scale_y = target_size as f32 / orig_height as f32;

    keypoints
        .iter()
        .enumerate()
        .map(|(i, &v)| if i % 2 == 0 { v * scale_x } else { v * scale_y })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    #[test]
    fn test_preprocess_buffer_shape() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(100, 60));
        let buffer = preprocess_image(&img, 32);
        assert_eq!(buffer.len(), 3 * 32 * 32);
    }

    #[test]
    fn test_preprocess_standardizes_channels() {
        // A uniform gray image maps each channel to (0.5 - mean) / std
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(
            16,
            16,
            image::Rgb([128, 128, 128]),
        ));
        let buffer = preprocess_image(&img, 8);

        let per_channel = 8 * 8;
        for c in 0..3 {
            let expected = (128.0 / 255.0 - IMAGENET_MEAN[c]) / IMAGENET_STD[c];
            let got = buffer[c * per_channel];
            assert!(
                (got - expected).abs() < 1e-4,
                "channel {c}: expected {expected}, got {got}"
            );
        }
    }

    #[test]
    fn test_rescale_keypoints() {
        // 200x100 image resized to 50x50: x shrinks by 4, y by 2
        let rescaled = rescale_keypoints(&[200.0, 100.0, 100.0, 50.0], 200, 100, 50);
        assert_eq!(rescaled, vec![50.0, 50.0, 25.0, 25.0]);
    }
}
