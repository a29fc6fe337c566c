use image::RgbImage;
use plume::dataset::{PoseAnnotations, PoseDataset};
use plume::runner::PoseBackend;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

/// Write a small gradient PNG so decoded fixtures are valid images.
fn write_image(path: &Path, width: u32, height: u32) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x * 5 % 256) as u8, (y * 5 % 256) as u8, 128])
    });
    img.save(path).unwrap();
}

/// Build a two-sample dataset with three keypoints (head, eye, beak_tip).
fn write_fixture_dataset(root: &Path) -> std::path::PathBuf {
    write_image(&root.join("nesting/img001/frame_0.png"), 40, 30);
    write_image(&root.join("preening/img002/frame_4.png"), 64, 64);

    let annotations = root.join("annotations.csv");
    fs::write(
        &annotations,
        "behavior,image_id,image_file,head_x,head_y,eye_x,eye_y,beak_tip_x,beak_tip_y\n\
         0,img001,frame_0.png,10.0,10.0,20.0,15.0,30.0,20.0\n\
         1,img002,frame_4.png,32.0,32.0,16.0,16.0,48.0,48.0\n",
    )
    .unwrap();
    annotations
}

#[test]
fn test_load_annotations_header_and_rows() {
    let dir = tempdir().unwrap();
    let annotations_path = write_fixture_dataset(dir.path());

    let annotations = PoseAnnotations::load(&annotations_path, true).unwrap();

    assert_eq!(annotations.num_keypoints(), 3);
    assert_eq!(
        annotations.keypoint_names,
        vec!["head".to_string(), "eye".to_string(), "beak_tip".to_string()]
    );
    assert_eq!(annotations.rows.len(), 2);
    assert_eq!(annotations.rows[0].behavior, 0);
    assert_eq!(annotations.rows[1].image_id, "img002");
    assert_eq!(annotations.rows[0].keypoints.len(), 6);
}

#[test]
fn test_strict_mode_rejects_bad_rows() {
    let dir = tempdir().unwrap();
    let annotations = dir.path().join("annotations.csv");
    fs::write(
        &annotations,
        "behavior,image_id,image_file,head_x,head_y,eye_x,eye_y,beak_tip_x,beak_tip_y\n\
         0,img001,frame_0.png,10.0,10.0,20.0,15.0,30.0,oops\n",
    )
    .unwrap();

    let result = PoseAnnotations::load(&annotations, true);
    assert!(result.is_err());
    let err = format!("{:#}", result.unwrap_err());
    assert!(err.contains("Invalid annotation row 2"), "got: {err}");
}

#[test]
fn test_permissive_mode_skips_bad_rows() {
    let dir = tempdir().unwrap();
    let annotations = dir.path().join("annotations.csv");
    fs::write(
        &annotations,
        "behavior,image_id,image_file,head_x,head_y,eye_x,eye_y,beak_tip_x,beak_tip_y\n\
         0,img001,frame_0.png,10.0,10.0,20.0,15.0,30.0,oops\n\
         1,img002,frame_4.png,32.0,32.0,16.0,16.0,48.0,48.0\n",
    )
    .unwrap();

    let parsed = PoseAnnotations::load(&annotations, false).unwrap();
    assert_eq!(parsed.rows.len(), 1);
    assert_eq!(parsed.rows[0].image_id, "img002");
}

#[test]
fn test_ragged_rows_skip_or_fail_by_mode() {
    // Second row is missing its last two coordinate fields
    let dir = tempdir().unwrap();
    let annotations = dir.path().join("annotations.csv");
    fs::write(
        &annotations,
        "behavior,image_id,image_file,head_x,head_y,eye_x,eye_y,beak_tip_x,beak_tip_y\n\
         0,img001,frame_0.png,10.0,10.0,20.0,15.0,30.0,20.0\n\
         1,img002,frame_4.png,32.0,32.0,16.0,16.0\n",
    )
    .unwrap();

    // Permissive: the ragged row is skipped, the valid one survives
    let parsed = PoseAnnotations::load(&annotations, false).unwrap();
    assert_eq!(parsed.rows.len(), 1);
    assert_eq!(parsed.rows[0].image_id, "img001");

    // Strict: the ragged row is a hard error
    let result = PoseAnnotations::load(&annotations, true);
    assert!(result.is_err());
    let err = format!("{:#}", result.unwrap_err());
    assert!(err.contains("Invalid annotation row 3"), "got: {err}");
    assert!(err.contains("fields"), "got: {err}");
}

#[test]
fn test_odd_coordinate_columns_rejected() {
    let dir = tempdir().unwrap();
    let annotations = dir.path().join("annotations.csv");
    fs::write(
        &annotations,
        "behavior,image_id,image_file,head_x,head_y,eye_x\n0,img001,f.png,1.0,2.0,3.0\n",
    )
    .unwrap();

    let result = PoseAnnotations::load(&annotations, true);
    assert!(result.is_err());
    assert!(result
        .unwrap_err()
        .to_string()
        .contains("even number"));
}

#[test]
fn test_load_sample_normalizes_keypoints() {
    let dir = tempdir().unwrap();
    let annotations_path = write_fixture_dataset(dir.path());
    let annotations = PoseAnnotations::load(&annotations_path, true).unwrap();
    let dataset = PoseDataset::new(annotations, dir.path(), 64);

    // Sample 1 is already 64x64, so normalization is direct division by 64
    let sample = dataset.load_sample(1).unwrap();
    assert_eq!(sample.image_data.len(), 3 * 64 * 64);
    let expected = [0.5, 0.5, 0.25, 0.25, 0.75, 0.75];
    for (got, want) in sample.keypoints.iter().zip(expected.iter()) {
        assert!((got - want).abs() < 1e-5, "expected {want}, got {got}");
    }

    // Sample 0 is 40x30: keypoints rescale with the resize before normalizing,
    // which collapses to dividing by the original dimensions
    let sample = dataset.load_sample(0).unwrap();
    let expected = [10.0 / 40.0, 10.0 / 30.0, 20.0 / 40.0, 15.0 / 30.0, 30.0 / 40.0, 20.0 / 30.0];
    for (got, want) in sample.keypoints.iter().zip(expected.iter()) {
        assert!((got - want).abs() < 1e-5, "expected {want}, got {got}");
    }
}

#[test]
fn test_load_batch_tensor_shapes() {
    let dir = tempdir().unwrap();
    let annotations_path = write_fixture_dataset(dir.path());
    let annotations = PoseAnnotations::load(&annotations_path, true).unwrap();
    let dataset = PoseDataset::new(annotations, dir.path(), 32);

    let batch = dataset
        .load_batch::<PoseBackend>(0..2, &Default::default())
        .unwrap();

    assert_eq!(batch.images.dims(), [2, 3, 32, 32]);
    assert_eq!(batch.keypoints.dims(), [2, 6]);
    assert_eq!(batch.paths.len(), 2);
    assert!(batch.paths[0].ends_with("nesting/img001/frame_0.png"));
}

#[test]
fn test_missing_image_is_an_error() {
    let dir = tempdir().unwrap();
    let annotations = dir.path().join("annotations.csv");
    fs::write(
        &annotations,
        "behavior,image_id,image_file,head_x,head_y,eye_x,eye_y,beak_tip_x,beak_tip_y\n\
         0,img404,missing.png,1.0,1.0,2.0,2.0,3.0,3.0\n",
    )
    .unwrap();

    let parsed = PoseAnnotations::load(&annotations, true).unwrap();
    let dataset = PoseDataset::new(parsed, dir.path(), 32);

    let result = dataset.load_sample(0);
    assert!(result.is_err());
    assert!(format!("{:#}", result.unwrap_err()).contains("Failed to load image"));
}
