//! ResNet-50 feature extraction backbone.
//!
//! This is the standard bottleneck ResNet with the classification head
//! (global pool + fully connected layer) removed: the forward pass stops at
//! the 2048-channel feature map, which the regression heads in
//! [`crate::model`] consume. Pretrained weights load as part of the full
//! model record.

use burn::module::Module;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::{BatchNorm, BatchNormConfig, PaddingConfig2d};
use burn::tensor::backend::Backend;
use burn::tensor::module::max_pool2d;
use burn::tensor::{activation, Tensor};

/// Channel count of the backbone output feature map.
pub const BACKBONE_CHANNELS: usize = 2048;

/// Bottleneck counts per stage for the 50-layer variant.
const STAGE_BLOCKS: [usize; 4] = [3, 4, 6, 3];

/// Convolution followed by batch normalization, no activation.
#[derive(Module, Debug)]
struct ConvNorm<B: Backend> {
    conv: Conv2d<B>,
    bn: BatchNorm<B>,
}

impl<B: Backend> ConvNorm<B> {
    fn new(
        c_in: usize,
        c_out: usize,
        kernel: usize,
        stride: usize,
        padding: usize,
        device: &B::Device,
    ) -> Self {
        let conv = Conv2dConfig::new([c_in, c_out], [kernel, kernel])
            .with_stride([stride, stride])
            .with_padding(PaddingConfig2d::Explicit(padding, padding))
            .with_bias(false)
            .init(device);
        let bn = BatchNormConfig::new(c_out).init(device);

        Self { conv, bn }
    }

    fn forward(&self, xs: Tensor<B, 4>) -> Tensor<B, 4> {
        self.bn.forward(self.conv.forward(xs))
    }
}

/// Bottleneck residual block: 1x1 reduce, 3x3 spatial, 1x1 expand.
#[derive(Module, Debug)]
struct Bottleneck<B: Backend> {
    reduce: ConvNorm<B>,
    spatial: ConvNorm<B>,
    expand: ConvNorm<B>,
    downsample: Option<ConvNorm<B>>,
}

impl<B: Backend> Bottleneck<B> {
    fn new(c_in: usize, width: usize, stride: usize, device: &B::Device) -> Self {
        let c_out = width * 4;
        let downsample = if stride != 1 || c_in != c_out {
            Some(ConvNorm::new(c_in, c_out, 1, stride, 0, device))
        } else {
            None
        };

        Self {
            reduce: ConvNorm::new(c_in, width, 1, 1, 0, device),
            spatial: ConvNorm::new(width, width, 3, stride, 1, device),
            expand: ConvNorm::new(width, c_out, 1, 1, 0, device),
            downsample,
        }
    }

    fn forward(&self, xs: Tensor<B, 4>) -> Tensor<B, 4> {
        let identity = match &self.downsample {
            Some(down) => down.forward(xs.clone()),
            None => xs.clone(),
        };

        let ys = activation::relu(self.reduce.forward(xs));
        let ys = activation::relu(self.spatial.forward(ys));
        let ys = self.expand.forward(ys);

        activation::relu(ys + identity)
    }
}

/// ResNet-50 backbone producing a `[batch, 2048, h/32, w/32]` feature map.
#[derive(Module, Debug)]
pub struct ResNet50<B: Backend> {
    stem: ConvNorm<B>,
    stage1: Vec<Bottleneck<B>>,
    stage2: Vec<Bottleneck<B>>,
    stage3: Vec<Bottleneck<B>>,
    stage4: Vec<Bottleneck<B>>,
}

impl<B: Backend> ResNet50<B> {
    pub fn new(device: &B::Device) -> Self {
        Self {
            stem: ConvNorm::new(3, 64, 7, 2, 3, device),
            stage1: make_stage(64, 64, STAGE_BLOCKS[0], 1, device),
            stage2: make_stage(256, 128, STAGE_BLOCKS[1], 2, device),
            stage3: make_stage(512, 256, STAGE_BLOCKS[2], 2, device),
            stage4: make_stage(1024, 512, STAGE_BLOCKS[3], 2, device),
        }
    }

    pub fn forward(&self, xs: Tensor<B, 4>) -> Tensor<B, 4> {
        let xs = activation::relu(self.stem.forward(xs));
        let mut xs = max_pool2d(xs, [3, 3], [2, 2], [1, 1], [1, 1], false);

        for block in &self.stage1 {
            xs = block.forward(xs);
        }
        for block in &self.stage2 {
            xs = block.forward(xs);
        }
        for block in &self.stage3 {
            xs = block.forward(xs);
        }
        for block in &self.stage4 {
            xs = block.forward(xs);
        }

        xs
    }
}

fn make_stage<B: Backend>(
    c_in: usize,
    width: usize,
    blocks: usize,
    stride: usize,
    device: &B::Device,
) -> Vec<Bottleneck<B>> {
    let mut stage = Vec::with_capacity(blocks);
    stage.push(Bottleneck::new(c_in, width, stride, device));
    for _ in 1..blocks {
        stage.push(Bottleneck::new(width * 4, width, 1, device));
    }
    stage
}
