//! ConvNeXt image classifier.
//!
//! Tensor names match timm's `convnext_*` models so trained checkpoints load
//! directly. The network can be split at any block's depthwise convolution:
//! [`ConvNeXt::forward_to`] runs up to that layer and [`ConvNeXt::forward_from`]
//! finishes the pass, which is what GradCAM needs to get gradients with
//! respect to an intermediate activation.

use std::fmt;
use std::str::FromStr;

use candle_core::{Module, Result, Tensor, D};
use candle_nn::{conv2d, linear, Conv2d, Conv2dConfig, Init, Linear, VarBuilder};

use crate::error::{VisionError, VisionResult};

const LAYER_NORM_EPS: f64 = 1e-6;
const LAYER_SCALE_INIT: f64 = 1e-6;

/// Stage depths and widths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvNextConfig {
    pub in_channels: usize,
    pub depths: Vec<usize>,
    pub dims: Vec<usize>,
}

impl ConvNextConfig {
    /// `convnext_small` with a single input channel.
    pub fn small() -> Self {
        Self {
            in_channels: 1,
            depths: vec![3, 3, 27, 3],
            dims: vec![96, 192, 384, 768],
        }
    }

    /// `convnext_tiny` with a single input channel.
    pub fn tiny() -> Self {
        Self {
            in_channels: 1,
            depths: vec![3, 3, 9, 3],
            dims: vec![96, 192, 384, 768],
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "small" | "convnext_small" => Some(Self::small()),
            "tiny" | "convnext_tiny" => Some(Self::tiny()),
            _ => None,
        }
    }

    pub fn validate(&self) -> VisionResult<()> {
        if self.depths.is_empty() || self.depths.len() != self.dims.len() {
            return Err(VisionError::invalid_config(format!(
                "depths {:?} and dims {:?} must be non-empty and the same length",
                self.depths, self.dims
            )));
        }
        if self.in_channels == 0 || self.dims.iter().any(|d| *d == 0) {
            return Err(VisionError::invalid_config("channel counts must be positive"));
        }
        Ok(())
    }

    /// Ensure `layer` names a block that exists in this architecture.
    pub fn check_layer(&self, layer: LayerPath) -> VisionResult<()> {
        match self.depths.get(layer.stage) {
            Some(depth) if layer.block < *depth => Ok(()),
            _ => Err(VisionError::unsupported_layer(format!(
                "{} is outside an architecture with depths {:?}",
                layer, self.depths
            ))),
        }
    }
}

/// Depthwise convolution of one block, written `stages.<s>.blocks.<b>.conv_dw`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerPath {
    pub stage: usize,
    pub block: usize,
}

impl FromStr for LayerPath {
    type Err = VisionError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('.').collect();
        match parts.as_slice() {
            ["stages", stage, "blocks", block, "conv_dw"] => {
                let stage = stage
                    .parse()
                    .map_err(|_| VisionError::unsupported_layer(s.to_string()))?;
                let block = block
                    .parse()
                    .map_err(|_| VisionError::unsupported_layer(s.to_string()))?;
                Ok(LayerPath { stage, block })
            }
            _ => Err(VisionError::unsupported_layer(format!(
                "'{}' (expected stages.<s>.blocks.<b>.conv_dw)",
                s
            ))),
        }
    }
}

impl fmt::Display for LayerPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stages.{}.blocks.{}.conv_dw", self.stage, self.block)
    }
}

/// LayerNorm over the last axis.
///
/// Built from primitive ops: candle's fused layer-norm kernel has no backward
/// pass, and GradCAM differentiates through every norm after the split point.
#[derive(Debug, Clone)]
struct LayerNorm {
    weight: Tensor,
    bias: Tensor,
}

impl LayerNorm {
    fn load(dim: usize, vb: VarBuilder) -> Result<Self> {
        Ok(Self {
            weight: vb.get_with_hints(dim, "weight", Init::Const(1.0))?,
            bias: vb.get_with_hints(dim, "bias", Init::Const(0.0))?,
        })
    }
}

impl Module for LayerNorm {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let centered = xs.broadcast_sub(&xs.mean_keepdim(D::Minus1)?)?;
        let variance = centered.sqr()?.mean_keepdim(D::Minus1)?;
        let std = (variance + LAYER_NORM_EPS)?.sqrt()?;
        centered
            .broadcast_div(&std)?
            .broadcast_mul(&self.weight)?
            .broadcast_add(&self.bias)
    }
}

/// LayerNorm over the channel axis of an NCHW tensor.
#[derive(Debug, Clone)]
struct LayerNorm2d(LayerNorm);

impl LayerNorm2d {
    fn load(dim: usize, vb: VarBuilder) -> Result<Self> {
        Ok(Self(LayerNorm::load(dim, vb)?))
    }
}

impl Module for LayerNorm2d {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        xs.permute((0, 2, 3, 1))?
            .contiguous()?
            .apply(&self.0)?
            .permute((0, 3, 1, 2))
    }
}

#[derive(Debug, Clone)]
struct Block {
    conv_dw: Conv2d,
    norm: LayerNorm,
    fc1: Linear,
    fc2: Linear,
    gamma: Tensor,
}

impl Block {
    fn load(dim: usize, vb: VarBuilder) -> Result<Self> {
        let dw_config = Conv2dConfig {
            padding: 3,
            groups: dim,
            ..Default::default()
        };
        Ok(Self {
            conv_dw: conv2d(dim, dim, 7, dw_config, vb.pp("conv_dw"))?,
            norm: LayerNorm::load(dim, vb.pp("norm"))?,
            fc1: linear(dim, 4 * dim, vb.pp("mlp.fc1"))?,
            fc2: linear(4 * dim, dim, vb.pp("mlp.fc2"))?,
            gamma: vb.get_with_hints(dim, "gamma", Init::Const(LAYER_SCALE_INIT))?,
        })
    }

    /// Everything after the depthwise convolution, plus the residual.
    fn finish(&self, acti: &Tensor, shortcut: &Tensor) -> Result<Tensor> {
        let xs = acti.permute((0, 2, 3, 1))?.contiguous()?;
        let xs = self.norm.forward(&xs)?;
        let xs = self.fc1.forward(&xs)?.gelu_erf()?;
        let xs = self.fc2.forward(&xs)?;
        let xs = xs.broadcast_mul(&self.gamma)?;
        xs.permute((0, 3, 1, 2))?.broadcast_add(shortcut)
    }
}

impl Module for Block {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let acti = self.conv_dw.forward(xs)?;
        self.finish(&acti, xs)
    }
}

#[derive(Debug, Clone)]
struct Stage {
    downsample: Option<(LayerNorm2d, Conv2d)>,
    blocks: Vec<Block>,
}

impl Stage {
    fn load(in_dim: usize, dim: usize, depth: usize, first: bool, vb: VarBuilder) -> Result<Self> {
        let downsample = if first {
            None
        } else {
            let conv_config = Conv2dConfig {
                stride: 2,
                ..Default::default()
            };
            Some((
                LayerNorm2d::load(in_dim, vb.pp("downsample.0"))?,
                conv2d(in_dim, dim, 2, conv_config, vb.pp("downsample.1"))?,
            ))
        };
        let blocks = (0..depth)
            .map(|b| Block::load(dim, vb.pp(format!("blocks.{}", b))))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { downsample, blocks })
    }

    fn downsample(&self, xs: &Tensor) -> Result<Tensor> {
        match &self.downsample {
            Some((norm, conv)) => xs.apply(norm)?.apply(conv),
            None => Ok(xs.clone()),
        }
    }
}

/// ConvNeXt backbone with a norm + linear classification head.
#[derive(Debug, Clone)]
pub struct ConvNeXt {
    stem_conv: Conv2d,
    stem_norm: LayerNorm2d,
    stages: Vec<Stage>,
    head_norm: LayerNorm,
    head_fc: Linear,
    config: ConvNextConfig,
    num_classes: usize,
}

impl ConvNeXt {
    pub fn load(config: &ConvNextConfig, num_classes: usize, vb: VarBuilder) -> VisionResult<Self> {
        config.validate()?;

        let stem_config = Conv2dConfig {
            stride: 4,
            ..Default::default()
        };
        let stem_conv = conv2d(config.in_channels, config.dims[0], 4, stem_config, vb.pp("stem.0"))?;
        let stem_norm = LayerNorm2d::load(config.dims[0], vb.pp("stem.1"))?;

        let mut stages = Vec::with_capacity(config.depths.len());
        let mut in_dim = config.dims[0];
        for (s, (&depth, &dim)) in config.depths.iter().zip(config.dims.iter()).enumerate() {
            stages.push(Stage::load(in_dim, dim, depth, s == 0, vb.pp(format!("stages.{}", s)))?);
            in_dim = dim;
        }

        let head_norm = LayerNorm::load(in_dim, vb.pp("head.norm"))?;
        let head_fc = linear(in_dim, num_classes, vb.pp("head.fc"))?;

        Ok(Self {
            stem_conv,
            stem_norm,
            stages,
            head_norm,
            head_fc,
            config: config.clone(),
            num_classes,
        })
    }

    pub fn config(&self) -> &ConvNextConfig {
        &self.config
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Run up to `layer`, returning its activation and the residual input of
    /// the enclosing block.
    pub fn forward_to(&self, xs: &Tensor, layer: LayerPath) -> VisionResult<(Tensor, Tensor)> {
        self.config.check_layer(layer)?;

        let mut xs = xs.apply(&self.stem_conv)?.apply(&self.stem_norm)?;
        for stage in &self.stages[..layer.stage] {
            xs = stage.downsample(&xs)?;
            for block in &stage.blocks {
                xs = block.forward(&xs)?;
            }
        }

        let stage = &self.stages[layer.stage];
        xs = stage.downsample(&xs)?;
        for block in &stage.blocks[..layer.block] {
            xs = block.forward(&xs)?;
        }
        let acti = stage.blocks[layer.block].conv_dw.forward(&xs)?;
        Ok((acti, xs))
    }

    /// Finish a pass started by [`ConvNeXt::forward_to`], returning logits.
    pub fn forward_from(
        &self,
        layer: LayerPath,
        acti: &Tensor,
        shortcut: &Tensor,
    ) -> VisionResult<Tensor> {
        self.config.check_layer(layer)?;

        let stage = &self.stages[layer.stage];
        let mut xs = stage.blocks[layer.block].finish(acti, shortcut)?;
        for block in &stage.blocks[layer.block + 1..] {
            xs = block.forward(&xs)?;
        }
        for stage in &self.stages[layer.stage + 1..] {
            xs = stage.downsample(&xs)?;
            for block in &stage.blocks {
                xs = block.forward(&xs)?;
            }
        }
        Ok(self.head(&xs)?)
    }

    fn head(&self, xs: &Tensor) -> Result<Tensor> {
        // global average pool -> (batch, channels)
        let pooled = xs.mean(D::Minus1)?.mean(D::Minus1)?;
        pooled.apply(&self.head_norm)?.apply(&self.head_fc)
    }
}

impl Module for ConvNeXt {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let mut xs = xs.apply(&self.stem_conv)?.apply(&self.stem_norm)?;
        for stage in &self.stages {
            xs = stage.downsample(&xs)?;
            for block in &stage.blocks {
                xs = block.forward(&xs)?;
            }
        }
        self.head(&xs)
    }
}
