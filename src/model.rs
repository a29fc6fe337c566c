//! Keypoint regression model architectures.
//!
//! Both models share the ResNet-50 backbone and regress `num_keypoints * 2`
//! normalized coordinates from an RGB image:
//!
//! - [`BirdPoseModel`]: channel-reduction stack of Conv2d + BatchNorm + ReLU
//! - [`BirdPoseModelX`]: the same stack with SiLU activations and Dropout
//!
//! Weights load from a named-MessagePack burn record; without a record the
//! model runs randomly initialized.

use anyhow::{anyhow, Result};
use burn::module::Module;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig};
use burn::nn::{BatchNorm, BatchNormConfig, Dropout, DropoutConfig, Linear, LinearConfig, PaddingConfig2d};
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder};
use burn::tensor::backend::Backend;
use burn::tensor::{activation, Tensor};
use std::path::Path;

use crate::backbone::{ResNet50, BACKBONE_CHANNELS};
use crate::config::ModelArch;

/// Channel widths of the regression head, ending at the pooled feature width.
const HEAD_CHANNELS: [usize; 5] = [BACKBONE_CHANNELS, 1024, 512, 256, 64];

/// Dropout probability in the X variant.
const DROPOUT_PROB: f64 = 0.3;

/// Conv2d(3x3, pad 1) + BatchNorm2d, activation applied by the caller.
#[derive(Module, Debug)]
struct HeadBlock<B: Backend> {
    conv: Conv2d<B>,
    bn: BatchNorm<B>,
}

impl<B: Backend> HeadBlock<B> {
    fn new(c_in: usize, c_out: usize, device: &B::Device) -> Self {
        let conv = Conv2dConfig::new([c_in, c_out], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);
        let bn = BatchNormConfig::new(c_out).init(device);
        Self { conv, bn }
    }

    fn forward(&self, xs: Tensor<B, 4>) -> Tensor<B, 4> {
        self.bn.forward(self.conv.forward(xs))
    }
}

fn make_head_blocks<B: Backend>(device: &B::Device) -> Vec<HeadBlock<B>> {
    HEAD_CHANNELS
        .windows(2)
        .map(|pair| HeadBlock::new(pair[0], pair[1], device))
        .collect()
}

/// ResNet-50 backbone with a ReLU channel-reduction head.
#[derive(Module, Debug)]
pub struct BirdPoseModel<B: Backend> {
    backbone: ResNet50<B>,
    blocks: Vec<HeadBlock<B>>,
    pool: AdaptiveAvgPool2d,
    fc: Linear<B>,
    num_keypoints: usize,
}

impl<B: Backend> BirdPoseModel<B> {
    pub const NAME: &'static str = "resnet50_relu";

    pub fn new(num_keypoints: usize, device: &B::Device) -> Self {
        Self {
            backbone: ResNet50::new(device),
            blocks: make_head_blocks(device),
            pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            fc: LinearConfig::new(HEAD_CHANNELS[4], num_keypoints * 2).init(device),
            num_keypoints,
        }
    }

    /// Regress normalized keypoints: `[batch, 3, h, w]` -> `[batch, num_keypoints * 2]`
    pub fn forward(&self, xs: Tensor<B, 4>) -> Tensor<B, 2> {
        let mut xs = self.backbone.forward(xs);
        for block in &self.blocks {
            xs = activation::relu(block.forward(xs));
        }
        let xs = self.pool.forward(xs);
        let xs: Tensor<B, 2> = xs.flatten(1, 3);
        self.fc.forward(xs)
    }
}

/// ResNet-50 backbone with a SiLU + Dropout channel-reduction head.
#[derive(Module, Debug)]
pub struct BirdPoseModelX<B: Backend> {
    backbone: ResNet50<B>,
    blocks: Vec<HeadBlock<B>>,
    dropout: Dropout,
    pool: AdaptiveAvgPool2d,
    fc: Linear<B>,
    num_keypoints: usize,
}

impl<B: Backend> BirdPoseModelX<B> {
    pub const NAME: &'static str = "resnet50_batch_norm2d_swish_dropout";

    pub fn new(num_keypoints: usize, device: &B::Device) -> Self {
        Self {
            backbone: ResNet50::new(device),
            blocks: make_head_blocks(device),
            dropout: DropoutConfig::new(DROPOUT_PROB).init(),
            pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            fc: LinearConfig::new(HEAD_CHANNELS[4], num_keypoints * 2).init(device),
            num_keypoints,
        }
    }

    /// Regress normalized keypoints: `[batch, 3, h, w]` -> `[batch, num_keypoints * 2]`
    pub fn forward(&self, xs: Tensor<B, 4>) -> Tensor<B, 2> {
        let mut xs = self.backbone.forward(xs);
        for block in &self.blocks {
            xs = self.dropout.forward(activation::silu(block.forward(xs)));
        }
        let xs = self.pool.forward(xs);
        let xs: Tensor<B, 2> = xs.flatten(1, 3);
        self.fc.forward(xs)
    }
}

/// Architecture-erased pose model used by the command drivers.
#[derive(Debug)]
pub enum PoseModel<B: Backend> {
    Base(BirdPoseModel<B>),
    X(BirdPoseModelX<B>),
}

impl<B: Backend> PoseModel<B> {
    /// Build a randomly initialized model for the requested architecture.
    pub fn build(arch: ModelArch, num_keypoints: usize, device: &B::Device) -> Self {
        match arch {
            ModelArch::Base => PoseModel::Base(BirdPoseModel::new(num_keypoints, device)),
            ModelArch::X => PoseModel::X(BirdPoseModelX::new(num_keypoints, device)),
        }
    }

    /// Load weights from a named-MessagePack record file.
    pub fn load_weights(self, path: &Path, device: &B::Device) -> Result<Self> {
        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::default();
        match self {
            PoseModel::Base(model) => {
                let record = recorder.load(path.to_path_buf(), device).map_err(|e| {
                    anyhow!("Failed to load weight record {}: {e}", path.display())
                })?;
                Ok(PoseModel::Base(model.load_record(record)))
            }
            PoseModel::X(model) => {
                let record = recorder.load(path.to_path_buf(), device).map_err(|e| {
                    anyhow!("Failed to load weight record {}: {e}", path.display())
                })?;
                Ok(PoseModel::X(model.load_record(record)))
            }
        }
    }

    pub fn forward(&self, xs: Tensor<B, 4>) -> Tensor<B, 2> {
        match self {
            PoseModel::Base(model) => model.forward(xs),
            PoseModel::X(model) => model.forward(xs),
        }
    }

    /// Architecture name string, as recorded in reports.
    pub fn name(&self) -> &'static str {
        match self {
            PoseModel::Base(_) => BirdPoseModel::<B>::NAME,
            PoseModel::X(_) => BirdPoseModelX::<B>::NAME,
        }
    }

    pub fn num_keypoints(&self) -> usize {
        match self {
            PoseModel::Base(model) => model.num_keypoints,
            PoseModel::X(model) => model.num_keypoints,
        }
    }
}
