//! # `ResNet` Core Model
//!
//! [`ResNet`] is the CIFAR-style residual network: a 3x3 stem, three stages
//! of residual blocks at widths ``16, 32, 64`` and strides ``1, 2, 2``,
//! and an average-pool / linear classifier head.
//!
//! [`ResNetContractConfig`] implements [`Config`], and provides
//! a high-level configuration interface (depths, block type, reduction).
//! It provides [`ResNetContractConfig::to_structure`] to convert
//! to a [`ResNetStructureConfig`].
//!
//! [`ResNetStructureConfig`] implements [`Config`], and provides
//! [`ResNetStructureConfig::init`] to initialize a [`ResNet`].
//!
//! [`ResNet`] implements [`Module`], and provides
//! [`ResNet::forward`].

use crate::layers::blocks::conv_norm::{ConvNorm2d, ConvNorm2dConfig, ConvNorm2dMeta};
use crate::models::resnet::basic_block::BasicBlockConfig;
use crate::models::resnet::layer_block::{LayerBlock, LayerBlockConfig, LayerBlockMeta};
use crate::models::resnet::residual_block::{BlockKind, ResidualBlockConfig, ResidualBlockMeta};
use crate::models::resnet::shift_block::ShiftBlockConfig;
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::module::Module;
use burn::nn::pool::{AvgPool2d, AvgPool2dConfig};
use burn::nn::{Linear, LinearConfig};
use burn::prelude::{Backend, Config, Tensor};
use burn::tensor::activation::relu;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Base stage widths, before reduction.
pub const RESNET_STAGE_PLANES: [usize; 3] = [16, 32, 64];

/// Stage strides.
pub const RESNET_STAGE_STRIDES: [usize; 3] = [1, 2, 2];

/// Where the channel reduction of a [`ResNetContractConfig`] is applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReductionMode {
    /// Every width in the network is divided by ``sqrt(reduction)``.
    #[default]
    Net,

    /// Only the inner width of each block is reduced.
    Block,
}

/// Error parsing a [`ReductionMode`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown reduction mode \"{0}\"; expected \"net\" or \"block\"")]
pub struct ParseReductionModeError(pub String);

impl FromStr for ReductionMode {
    type Err = ParseReductionModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "net" => Ok(Self::Net),
            "block" => Ok(Self::Block),
            _ => Err(ParseReductionModeError(s.to_string())),
        }
    }
}

impl Display for ReductionMode {
    fn fmt(
        &self,
        f: &mut Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            Self::Net => write!(f, "net"),
            Self::Block => write!(f, "block"),
        }
    }
}

/// [`ResNet`] Meta API.
pub trait ResNetMeta {
    /// The number of input image channels.
    fn in_channels(&self) -> usize;

    /// The number of feature planes entering the classifier.
    fn head_planes(&self) -> usize;

    /// The number of classification classes.
    fn num_classes(&self) -> usize;

    /// The total downsampling of the feature extractor.
    fn stride(&self) -> usize;

    /// Size of the final average pool window.
    fn pool_size(&self) -> usize;

    /// The input resolution which pools down to a single pixel.
    ///
    /// ``[pool_size * stride, pool_size * stride]``
    fn input_resolution(&self) -> [usize; 2] {
        let size = self.pool_size() * self.stride();
        [size, size]
    }
}

/// High-level [`ResNet`] model configuration.
#[derive(Config, Debug)]
pub struct ResNetContractConfig {
    /// Blocks per stage.
    pub layers: [usize; 3],

    /// Number of classification classes.
    #[config(default = 10)]
    pub num_classes: usize,

    /// Number of input image channels.
    #[config(default = 3)]
    pub in_channels: usize,

    /// Residual block type.
    #[config(default = "BlockKind::Basic")]
    pub block: BlockKind,

    /// Channel reduction factor.
    #[config(default = "1.0")]
    pub reduction: f64,

    /// Where `reduction` is applied.
    #[config(default = "ReductionMode::Net")]
    pub reduction_mode: ReductionMode,

    /// Shift block inner-width expansion.
    #[config(default = "1.0")]
    pub expansion: f64,

    /// Size of the final average pool.
    #[config(default = 8)]
    pub pool_size: usize,
}

impl ResNetContractConfig {
    /// The number of weighted layers; ``2 * sum(layers) + 2``.
    pub fn depth(&self) -> usize {
        2 * self.layers.iter().sum::<usize>() + 2
    }

    /// The network-wide width divisor.
    ///
    /// ``sqrt(reduction)`` in [`ReductionMode::Net`], else ``1``.
    pub fn width_factor(&self) -> f64 {
        match self.reduction_mode {
            ReductionMode::Net => self.reduction.sqrt(),
            ReductionMode::Block => 1.0,
        }
    }

    /// The output width of each stage.
    pub fn stage_planes(&self) -> [usize; 3] {
        let factor = self.width_factor();
        RESNET_STAGE_PLANES.map(|planes| (planes as f64 / factor) as usize)
    }

    /// The reduction passed to each [`BasicBlockConfig`].
    pub fn block_reduction(&self) -> f64 {
        match self.reduction_mode {
            ReductionMode::Net => 1.0,
            ReductionMode::Block => self.reduction,
        }
    }

    /// The expansion passed to each [`ShiftBlockConfig`].
    pub fn block_expansion(&self) -> f64 {
        match self.reduction_mode {
            ReductionMode::Net => self.expansion,
            ReductionMode::Block => self.expansion / self.reduction,
        }
    }

    /// Check if the config is valid.
    pub fn try_validate(&self) -> Result<(), String> {
        if !(self.reduction > 0.0) {
            return Err(format!("reduction must be positive: {}", self.reduction));
        }
        if !(self.expansion > 0.0) {
            return Err(format!("expansion must be positive: {}", self.expansion));
        }
        if self.layers.contains(&0) {
            return Err(format!("every stage needs at least one block: {:?}", self.layers));
        }
        if self.in_channels == 0 || self.num_classes == 0 || self.pool_size == 0 {
            return Err(format!(
                "in_channels({}), num_classes({}), and pool_size({}) must be positive",
                self.in_channels, self.num_classes, self.pool_size
            ));
        }
        let planes = self.stage_planes();
        if planes.contains(&0) {
            return Err(format!(
                "reduction {} ({}) leaves a zero-width stage: {:?}",
                self.reduction, self.reduction_mode, planes
            ));
        }
        let mids = planes.map(|p| self.block_config(p, p, 1).mid_planes());
        if mids.contains(&0) {
            return Err(format!(
                "reduction {} ({}), expansion {} leaves a zero-width block: {:?}",
                self.reduction, self.reduction_mode, self.expansion, mids
            ));
        }
        Ok(())
    }

    /// The total spatial stride of the network.
    pub fn stride(&self) -> usize {
        RESNET_STAGE_STRIDES.iter().product()
    }

    /// Set `pool_size` so the network accepts a square `resolution` input.
    ///
    /// # Returns
    ///
    /// An error if `resolution` is not a positive multiple of [`Self::stride`].
    pub fn with_input_resolution(
        self,
        resolution: usize,
    ) -> Result<Self, String> {
        let stride = self.stride();
        if resolution == 0 || resolution % stride != 0 {
            return Err(format!(
                "input resolution {resolution} is not a positive multiple of the network stride {stride}"
            ));
        }
        Ok(self.with_pool_size(resolution / stride))
    }

    /// Panic if `try_validate` returns an error.
    pub fn expect_valid(&self) {
        if let Err(err) = self.try_validate() {
            panic!("{}", err);
        }
    }

    /// Build the config of one residual block.
    fn block_config(
        &self,
        in_planes: usize,
        planes: usize,
        stride: usize,
    ) -> ResidualBlockConfig {
        match self.block {
            BlockKind::Basic => BasicBlockConfig::new(in_planes, planes)
                .with_stride(stride)
                .with_reduction(self.block_reduction())
                .into(),
            BlockKind::Shift => ShiftBlockConfig::new(in_planes, planes)
                .with_stride(stride)
                .with_expansion(self.block_expansion())
                .into(),
        }
    }

    /// Convert to a [`ResNetStructureConfig`].
    ///
    /// # Panics
    ///
    /// If the config is invalid.
    pub fn to_structure(self) -> ResNetStructureConfig {
        self.into()
    }
}

impl From<ResNetContractConfig> for ResNetStructureConfig {
    fn from(config: ResNetContractConfig) -> Self {
        config.expect_valid();

        let planes = config.stage_planes();
        tracing::debug!(
            depth = config.depth(),
            block = ?config.block,
            reduction = config.reduction,
            reduction_mode = %config.reduction_mode,
            stage_planes = ?planes,
            "building resnet structure"
        );

        let stem = ConvNorm2dConfig::square(config.in_channels, planes[0], 3, 1);

        let mut in_planes = planes[0];
        let layers = (0..3)
            .map(|idx| {
                let layer = LayerBlockConfig::build(
                    config.layers[idx],
                    in_planes,
                    planes[idx],
                    RESNET_STAGE_STRIDES[idx],
                    |in_planes, planes, stride| config.block_config(in_planes, planes, stride),
                );
                in_planes = planes[idx];
                layer
            })
            .collect();

        ResNetStructureConfig::new(stem, layers)
            .with_num_classes(config.num_classes)
            .with_pool_size(config.pool_size)
    }
}

/// [`ResNet`] Structure Config.
///
/// This config defines the explicit structure of a `ResNet` model;
/// every stage and block is spelled out.
#[derive(Config, Debug)]
pub struct ResNetStructureConfig {
    /// The stem Conv/Norm block configuration.
    pub stem: ConvNorm2dConfig,

    /// The stage configurations.
    pub layers: Vec<LayerBlockConfig>,

    /// The number of classes.
    #[config(default = 10)]
    pub num_classes: usize,

    /// Size (and stride) of the final average pool.
    #[config(default = 8)]
    pub pool_size: usize,
}

impl ResNetMeta for ResNetStructureConfig {
    fn in_channels(&self) -> usize {
        self.stem.in_channels()
    }

    fn head_planes(&self) -> usize {
        self.layers
            .last()
            .map_or(self.stem.out_channels(), |layer| layer.out_planes())
    }

    fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn stride(&self) -> usize {
        self.layers
            .iter()
            .fold(self.stem.stride()[0], |acc, layer| acc * layer.stride())
    }

    fn pool_size(&self) -> usize {
        self.pool_size
    }
}

impl ResNetStructureConfig {
    /// Check if the config is valid.
    pub fn try_validate(&self) -> Result<(), String> {
        if self.layers.is_empty() {
            return Err("layers is empty".to_string());
        }
        if self.num_classes == 0 || self.pool_size == 0 {
            return Err(format!(
                "num_classes({}) and pool_size({}) must be positive",
                self.num_classes, self.pool_size
            ));
        }

        let mut planes = self.stem.out_channels();
        for (idx, layer) in self.layers.iter().enumerate() {
            layer
                .try_validate()
                .map_err(|err| format!("layers[{idx}]: {err}"))?;
            if layer.in_planes() != planes {
                return Err(format!(
                    "layers[{}].in_planes({}) != previous out_planes({})",
                    idx,
                    layer.in_planes(),
                    planes
                ));
            }
            planes = layer.out_planes();
        }
        Ok(())
    }

    /// Panic if `try_validate` returns an error.
    pub fn expect_valid(&self) {
        if let Err(err) = self.try_validate() {
            panic!("{}", err);
        }
    }

    /// Initialize a [`ResNet`] model.
    ///
    /// # Panics
    ///
    /// If the config is invalid.
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> ResNet<B> {
        self.expect_valid();

        let head_planes = self.head_planes();
        tracing::debug!(
            stages = self.layers.len(),
            blocks = self.layers.iter().map(|layer| layer.len()).sum::<usize>(),
            head_planes,
            num_classes = self.num_classes,
            "initializing resnet"
        );

        ResNet {
            stem: self.stem.init(device),
            layers: self
                .layers
                .into_iter()
                .map(|layer| layer.init(device))
                .collect(),
            pool: AvgPool2dConfig::new([self.pool_size, self.pool_size])
                .with_strides([self.pool_size, self.pool_size])
                .init(),
            fc: LinearConfig::new(head_planes, self.num_classes).init(device),
        }
    }
}

/// `ResNet` model.
#[derive(Module, Debug)]
pub struct ResNet<B: Backend> {
    /// Stem conv/norm.
    pub stem: ConvNorm2d<B>,

    /// Residual stages.
    pub layers: Vec<LayerBlock<B>>,

    /// Head pooling.
    pub pool: AvgPool2d,

    /// Head classifier.
    pub fc: Linear<B>,
}

impl<B: Backend> ResNetMeta for ResNet<B> {
    fn in_channels(&self) -> usize {
        self.stem.in_channels()
    }

    fn head_planes(&self) -> usize {
        let [d_input, _d_output] = self.fc.weight.dims();
        d_input
    }

    fn num_classes(&self) -> usize {
        let [_d_input, d_output] = self.fc.weight.dims();
        d_output
    }

    fn stride(&self) -> usize {
        self.layers
            .iter()
            .fold(self.stem.stride()[0], |acc, layer| acc * layer.stride())
    }

    fn pool_size(&self) -> usize {
        self.pool.kernel_size[0]
    }
}

impl<B: Backend> ResNet<B> {
    /// `ResNet` forward pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_channels, height, width]``, where the feature
    ///   map after the stages is ``[pool_size, pool_size]``.
    ///
    /// # Panics
    ///
    /// If `height` or `width` is not an exact multiple of [`ResNetMeta::stride`].
    /// Strided convolutions here do not round odd sizes up, so e.g. a 30px input
    /// is rejected rather than pooled from a ``[8, 8]`` map; see
    /// [`ResNetContractConfig::with_input_resolution`] for other resolutions.
    /// Also if the final map is not ``[pool_size, pool_size]``.
    ///
    /// # Returns
    ///
    /// A ``[batch, num_classes]`` tensor of logits.
    #[tracing::instrument(level = "trace", skip_all)]
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 2> {
        let pool_size = self.pool_size();
        let [batch, out_height, out_width] = unpack_shape_contract!(
            [
                "batch",
                "in_channels",
                "in_height" = "out_height" * "stride",
                "in_width" = "out_width" * "stride"
            ],
            &input,
            &["batch", "out_height", "out_width"],
            &[
                ("in_channels", self.in_channels()),
                ("stride", self.stride())
            ],
        );
        assert!(
            out_height == pool_size && out_width == pool_size,
            "ResNet final feature map is [{out_height}, {out_width}], expected [{pool_size}, {pool_size}]; \
             input resolution should be {:?}",
            self.input_resolution()
        );

        let x = relu(self.stem.forward(input));

        let x = self.layers.iter().fold(x, |x, layer| layer.forward(x));

        // Head
        let x = self.pool.forward(x);
        // Reshape [B, C, 1, 1] -> [B, C]
        let x = x.flatten(1, 3);
        let x = self.fc.forward(x);

        assert_shape_contract_periodically!(
            ["batch", "num_classes"],
            &x,
            &[("batch", batch), ("num_classes", self.num_classes())],
        );

        x
    }

    /// Re-initialize the last layer with the specified number of output classes.
    pub fn with_classes(
        mut self,
        num_classes: usize,
    ) -> Self {
        let [d_input, _d_output] = self.fc.weight.dims();
        self.fc = LinearConfig::new(d_input, num_classes).init(&self.fc.weight.device());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bimm_contracts::assert_shape_contract;
    use burn::backend::{Autodiff, NdArray};
    use burn::tensor::Distribution;

    #[test]
    fn test_reduction_mode_parse() {
        assert_eq!("net".parse::<ReductionMode>(), Ok(ReductionMode::Net));
        assert_eq!("Block".parse::<ReductionMode>(), Ok(ReductionMode::Block));
        assert_eq!(ReductionMode::Block.to_string(), "block");

        let err = "channel".parse::<ReductionMode>().unwrap_err();
        assert_eq!(err, ParseReductionModeError("channel".to_string()));
        assert_eq!(
            err.to_string(),
            "unknown reduction mode \"channel\"; expected \"net\" or \"block\""
        );
    }

    #[test]
    fn test_contract_config_defaults() {
        let config = ResNetContractConfig::new([3, 3, 3]);
        assert_eq!(config.num_classes, 10);
        assert_eq!(config.in_channels, 3);
        assert_eq!(config.block, BlockKind::Basic);
        assert_eq!(config.reduction_mode, ReductionMode::Net);
        assert_eq!(config.pool_size, 8);
        assert_eq!(config.depth(), 20);
        assert_eq!(config.stage_planes(), [16, 32, 64]);
        assert_eq!(config.block_reduction(), 1.0);
        assert_eq!(config.block_expansion(), 1.0);
        assert!(config.try_validate().is_ok());
    }

    #[test]
    fn test_net_reduction_widths() {
        let config = ResNetContractConfig::new([3, 3, 3]).with_reduction(2.0);
        assert_eq!(config.stage_planes(), [11, 22, 45]);
        assert_eq!(config.block_reduction(), 1.0);

        let config = config.with_reduction(4.0);
        assert_eq!(config.stage_planes(), [8, 16, 32]);

        let structure = config.to_structure();
        assert_eq!(structure.stem.out_channels(), 8);
        let block = &structure.layers[0].blocks[0];
        assert_eq!(block.mid_planes(), 8);
    }

    #[test]
    fn test_block_reduction() {
        let config = ResNetContractConfig::new([3, 3, 3])
            .with_reduction(4.0)
            .with_reduction_mode(ReductionMode::Block);
        assert_eq!(config.stage_planes(), [16, 32, 64]);
        assert_eq!(config.block_reduction(), 4.0);

        let structure = config.to_structure();
        let mids: Vec<usize> = structure
            .layers
            .iter()
            .map(|layer| layer.blocks[0].mid_planes())
            .collect();
        assert_eq!(mids, vec![4, 8, 16]);

        let config = ResNetContractConfig::new([3, 3, 3])
            .with_block(BlockKind::Shift)
            .with_expansion(6.0)
            .with_reduction(2.0)
            .with_reduction_mode(ReductionMode::Block);
        assert_eq!(config.block_expansion(), 3.0);
        let structure = config.to_structure();
        assert_eq!(structure.layers[0].blocks[0].mid_planes(), 48);
    }

    #[test]
    fn test_contract_config_validation() {
        let base = ResNetContractConfig::new([3, 3, 3]);
        assert!(base.clone().with_reduction(0.0).try_validate().is_err());
        assert!(base.clone().with_reduction(f64::NAN).try_validate().is_err());
        assert!(base.clone().with_expansion(-1.0).try_validate().is_err());
        assert!(ResNetContractConfig::new([3, 0, 3]).try_validate().is_err());
        assert!(base.clone().with_num_classes(0).try_validate().is_err());

        let err = base.clone().with_reduction(1024.0).try_validate().unwrap_err();
        assert!(err.contains("zero-width"), "{err}");

        // Block mode keeps the stage widths, but 16 / 64 truncates the block width.
        let block_mode = base
            .clone()
            .with_reduction(64.0)
            .with_reduction_mode(ReductionMode::Block);
        assert_eq!(block_mode.stage_planes(), [16, 32, 64]);
        let err = block_mode.try_validate().unwrap_err();
        assert!(err.contains("zero-width block"), "{err}");
        assert!(err.contains("[0, 0, 1]"), "{err}");

        let shift_block_mode = base
            .clone()
            .with_block(BlockKind::Shift)
            .with_reduction(64.0)
            .with_reduction_mode(ReductionMode::Block);
        let err = shift_block_mode.try_validate().unwrap_err();
        assert!(err.contains("zero-width block"), "{err}");

        let err = base
            .with_block(BlockKind::Shift)
            .with_expansion(0.05)
            .try_validate()
            .unwrap_err();
        assert!(err.contains("zero-width block"), "{err}");
    }

    #[test]
    #[should_panic(expected = "zero-width block")]
    fn test_to_structure_rejects_zero_width_block() {
        ResNetContractConfig::new([3, 3, 3])
            .with_reduction(64.0)
            .with_reduction_mode(ReductionMode::Block)
            .to_structure();
    }

    #[test]
    fn test_with_input_resolution() {
        let config = ResNetContractConfig::new([3, 3, 3]);
        assert_eq!(config.stride(), 4);
        assert_eq!(config.clone().to_structure().stride(), config.stride());

        let config = config.with_input_resolution(24).unwrap();
        assert_eq!(config.pool_size, 6);
        assert_eq!(config.clone().to_structure().input_resolution(), [24, 24]);

        let base = ResNetContractConfig::new([3, 3, 3]);
        assert!(base.clone().with_input_resolution(30).is_err());
        assert!(base.clone().with_input_resolution(0).is_err());
        assert!(base.clone().with_input_resolution(2).is_err());
        assert_eq!(base.with_input_resolution(4).unwrap().pool_size, 1);
    }

    #[test]
    fn test_resnet_forward_input_resolution() {
        type B = NdArray<f32>;
        let device = Default::default();

        let model: ResNet<B> = ResNetContractConfig::new([1, 1, 1])
            .with_input_resolution(16)
            .unwrap()
            .to_structure()
            .init(&device);

        let input = Tensor::random([2, 3, 16, 16], Distribution::Default, &device);
        let output = model.forward(input);
        assert_eq!(output.dims(), [2, 10]);
    }

    #[test]
    #[should_panic]
    fn test_resnet_forward_non_multiple_of_stride() {
        type B = NdArray<f32>;
        let device = Default::default();

        let model: ResNet<B> = ResNetContractConfig::new([1, 1, 1])
            .to_structure()
            .init(&device);

        let input = Tensor::random([1, 3, 30, 30], Distribution::Default, &device);
        let _ = model.forward(input);
    }

    #[test]
    fn test_to_structure() {
        let structure = ResNetContractConfig::new([2, 3, 4])
            .with_num_classes(7)
            .to_structure();

        assert_eq!(structure.num_classes, 7);
        assert_eq!(structure.pool_size, 8);
        assert_eq!(structure.in_channels(), 3);
        assert_eq!(structure.head_planes(), 64);
        assert_eq!(structure.stride(), 4);
        assert_eq!(structure.input_resolution(), [32, 32]);

        assert_eq!(structure.stem.kernel_size(), 3);
        assert_eq!(structure.stem.stride(), [1, 1]);

        let lens: Vec<usize> = structure.layers.iter().map(|l| l.len()).collect();
        assert_eq!(lens, vec![2, 3, 4]);

        let strides: Vec<usize> = structure.layers.iter().map(|l| l.stride()).collect();
        assert_eq!(strides, vec![1, 2, 2]);

        let planes: Vec<[usize; 2]> = structure
            .layers
            .iter()
            .map(|l| [l.in_planes(), l.out_planes()])
            .collect();
        assert_eq!(planes, vec![[16, 16], [16, 32], [32, 64]]);

        let block = &structure.layers[0].blocks[0];
        assert_eq!(block.kind(), BlockKind::Basic);
        assert_eq!(block.stride(), 1);
    }

    #[test]
    fn test_structure_config_validation() {
        let mut structure = ResNetContractConfig::new([1, 1, 1]).to_structure();
        assert!(structure.try_validate().is_ok());

        structure.layers.swap(1, 2);
        let err = structure.try_validate().unwrap_err();
        assert!(err.starts_with("layers[1].in_planes(32)"), "{err}");

        structure.layers.clear();
        assert_eq!(structure.try_validate(), Err("layers is empty".to_string()));
    }

    #[test]
    fn test_config_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resnet.json");

        let config = ResNetContractConfig::new([3, 3, 3])
            .with_block(BlockKind::Shift)
            .with_reduction(2.0)
            .with_reduction_mode(ReductionMode::Block)
            .with_expansion(3.0);
        config.save(&path).unwrap();

        let loaded = ResNetContractConfig::load(&path).unwrap();
        assert_eq!(loaded.layers, config.layers);
        assert_eq!(loaded.block, BlockKind::Shift);
        assert_eq!(loaded.reduction, 2.0);
        assert_eq!(loaded.reduction_mode, ReductionMode::Block);
        assert_eq!(loaded.expansion, 3.0);

        let structure = loaded.to_structure();
        let path = dir.path().join("structure.json");
        structure.save(&path).unwrap();
        let reloaded = ResNetStructureConfig::load(&path).unwrap();
        assert_eq!(reloaded.layers.len(), 3);
        assert_eq!(reloaded.layers[2].blocks[0].kind(), BlockKind::Shift);
        assert_eq!(reloaded.layers[2].blocks[0].mid_planes(), 96);
    }

    #[test]
    fn test_resnet_forward() {
        type B = NdArray<f32>;
        let device = Default::default();

        for block in [BlockKind::Basic, BlockKind::Shift] {
            let model: ResNet<B> = ResNetContractConfig::new([1, 1, 1])
                .with_block(block)
                .to_structure()
                .init(&device);

            assert_eq!(model.in_channels(), 3);
            assert_eq!(model.head_planes(), 64);
            assert_eq!(model.num_classes(), 10);
            assert_eq!(model.stride(), 4);
            assert_eq!(model.pool_size(), 8);

            let input = Tensor::random([2, 3, 32, 32], Distribution::Default, &device);
            let output = model.forward(input);

            assert_shape_contract!(
                ["batch", "num_classes"],
                &output,
                &[("batch", 2), ("num_classes", 10)],
            );
        }
    }

    #[test]
    fn test_resnet_forward_custom_channels_and_pool() {
        type B = NdArray<f32>;
        let device = Default::default();

        let model: ResNet<B> = ResNetContractConfig::new([1, 1, 1])
            .with_in_channels(1)
            .with_pool_size(4)
            .to_structure()
            .init(&device);
        assert_eq!(model.input_resolution(), [16, 16]);

        let output = model.forward(Tensor::ones([1, 1, 16, 16], &device));
        assert_eq!(output.dims(), [1, 10]);
    }

    #[test]
    #[should_panic(expected = "ResNet final feature map is [16, 16]")]
    fn test_resnet_forward_wrong_resolution() {
        type B = NdArray<f32>;
        let device = Default::default();

        let model: ResNet<B> = ResNetContractConfig::new([1, 1, 1])
            .to_structure()
            .init(&device);

        model.forward(Tensor::ones([1, 3, 64, 64], &device));
    }

    #[test]
    #[should_panic]
    fn test_resnet_forward_wrong_channels() {
        type B = NdArray<f32>;
        let device = Default::default();

        let model: ResNet<B> = ResNetContractConfig::new([1, 1, 1])
            .to_structure()
            .init(&device);

        model.forward(Tensor::ones([1, 1, 32, 32], &device));
    }

    #[test]
    fn test_with_classes() {
        type B = NdArray<f32>;
        let device = Default::default();

        let model: ResNet<B> = ResNetContractConfig::new([1, 1, 1])
            .to_structure()
            .init(&device)
            .with_classes(3);
        assert_eq!(model.num_classes(), 3);

        let output = model.forward(Tensor::ones([2, 3, 32, 32], &device));
        assert_eq!(output.dims(), [2, 3]);
    }

    #[test]
    fn test_num_params() {
        type B = NdArray<f32>;
        let device = Default::default();

        let params = |config: ResNetContractConfig| -> usize {
            let model: ResNet<B> = config.to_structure().init(&device);
            model.num_params()
        };

        let base = ResNetContractConfig::new([3, 3, 3]);

        let resnet20 = params(base.clone());
        let resnet32 = params(ResNetContractConfig::new([5, 5, 5]));
        assert!(resnet20 < resnet32);

        let net_reduced = params(base.clone().with_reduction(4.0));
        let block_reduced = params(
            base.clone()
                .with_reduction(4.0)
                .with_reduction_mode(ReductionMode::Block),
        );
        assert!(net_reduced < resnet20);
        assert!(block_reduced < resnet20);

        let shift20 = params(base.clone().with_block(BlockKind::Shift));
        let shift20_wide = params(base.with_block(BlockKind::Shift).with_expansion(6.0));
        assert!(shift20 < resnet20);
        assert!(shift20 < shift20_wide);
    }

    #[test]
    fn test_resnet_autodiff() {
        type B = Autodiff<NdArray<f32>>;
        let device = Default::default();

        let model: ResNet<B> = ResNetContractConfig::new([1, 1, 1])
            .with_block(BlockKind::Shift)
            .to_structure()
            .init(&device);

        let input = Tensor::random([1, 3, 32, 32], Distribution::Default, &device);
        let grads = model.forward(input).sum().backward();

        assert!(model.stem.conv.weight.grad(&grads).is_some());
        assert!(model.fc.weight.grad(&grads).is_some());
    }
}
