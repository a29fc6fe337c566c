use burn::tensor::Tensor;
use plume::config::ModelArch;
use plume::model::PoseModel;
use plume::runner::PoseBackend;

/// Both architectures must regress `num_keypoints * 2` values per sample.
/// Small input keeps the ResNet-50 forward pass cheap enough for CI.
#[test]
fn test_base_model_output_shape() {
    let device = Default::default();
    let model = PoseModel::<PoseBackend>::build(ModelArch::Base, 3, &device);
    assert_eq!(model.name(), "resnet50_relu");
    assert_eq!(model.num_keypoints(), 3);

    let input = Tensor::<PoseBackend, 4>::zeros([1, 3, 64, 64], &device);
    let output = model.forward(input);
    assert_eq!(output.dims(), [1, 6]);
}

#[test]
fn test_x_model_output_shape() {
    let device = Default::default();
    let model = PoseModel::<PoseBackend>::build(ModelArch::X, 5, &device);
    assert_eq!(model.name(), "resnet50_batch_norm2d_swish_dropout");
    assert_eq!(model.num_keypoints(), 5);

    let input = Tensor::<PoseBackend, 4>::zeros([2, 3, 64, 64], &device);
    let output = model.forward(input);
    assert_eq!(output.dims(), [2, 10]);
}

#[test]
fn test_forward_outputs_are_finite() {
    let device = Default::default();
    let model = PoseModel::<PoseBackend>::build(ModelArch::Base, 2, &device);

    let input = Tensor::<PoseBackend, 4>::ones([1, 3, 64, 64], &device);
    let output = model
        .forward(input)
        .to_data()
        .to_vec::<f32>()
        .unwrap();

    assert_eq!(output.len(), 4);
    assert!(output.iter().all(|v| v.is_finite()), "got {output:?}");
}

#[test]
fn test_missing_weight_record_is_an_error() {
    let device = Default::default();
    let model = PoseModel::<PoseBackend>::build(ModelArch::Base, 2, &device);

    let result = model.load_weights(std::path::Path::new("/nonexistent/pose.mpk"), &device);
    assert!(result.is_err());
    assert!(result
        .unwrap_err()
        .to_string()
        .contains("Failed to load weight record"));
}
