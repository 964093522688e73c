//! # Residual Block Wrapper

use crate::models::resnet::basic_block::{BasicBlock, BasicBlockConfig, BasicBlockMeta};
use crate::models::resnet::shift_block::{ShiftBlock, ShiftBlockConfig, ShiftBlockMeta};
use crate::models::resnet::util::stride_div_output_resolution;
use burn::config::Config;
use burn::prelude::{Backend, Module, Tensor};
use serde::{Deserialize, Serialize};

/// Selects the residual block type of a network.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockKind {
    /// Two 3x3 convolutions; see [`BasicBlock`].
    #[default]
    Basic,

    /// ``1x1 conv -> shift -> 1x1 conv``; see [`ShiftBlock`].
    Shift,
}

/// [`ResidualBlock`] Meta API.
pub trait ResidualBlockMeta {
    /// The number of input feature planes.
    fn in_planes(&self) -> usize;

    /// The number of inner feature planes.
    fn mid_planes(&self) -> usize;

    /// The number of output feature planes.
    fn out_planes(&self) -> usize;

    /// The stride of the block.
    ///
    /// Affects downsample behavior.
    fn stride(&self) -> usize;

    /// The block type.
    fn kind(&self) -> BlockKind;

    /// Get the output resolution for a given input resolution.
    ///
    /// The input must be a multiple of the stride.
    ///
    /// # Arguments
    ///
    /// - `input_resolution`: ``[in_height=out_height*stride, in_width=out_width*stride]``.
    ///
    /// # Returns
    ///
    /// ``[out_height, out_width]``
    ///
    /// # Panics
    ///
    /// If the input resolution is not a multiple of the stride.
    fn output_resolution(
        &self,
        input_resolution: [usize; 2],
    ) -> [usize; 2] {
        stride_div_output_resolution(input_resolution, self.stride())
    }
}

/// [`ResidualBlock`] Config.
#[derive(Config, Debug)]
pub enum ResidualBlockConfig {
    /// A `ResNet` [`BasicBlock`].
    Basic(BasicBlockConfig),

    /// A `ShiftResNet` [`ShiftBlock`].
    Shift(ShiftBlockConfig),
}

impl ResidualBlockMeta for ResidualBlockConfig {
    fn in_planes(&self) -> usize {
        match self {
            Self::Basic(config) => config.in_planes(),
            Self::Shift(config) => config.in_planes(),
        }
    }

    fn mid_planes(&self) -> usize {
        match self {
            Self::Basic(config) => config.mid_planes(),
            Self::Shift(config) => config.mid_planes(),
        }
    }

    fn out_planes(&self) -> usize {
        match self {
            Self::Basic(config) => config.out_planes(),
            Self::Shift(config) => config.out_planes(),
        }
    }

    fn stride(&self) -> usize {
        match self {
            Self::Basic(config) => config.stride(),
            Self::Shift(config) => config.stride(),
        }
    }

    fn kind(&self) -> BlockKind {
        match self {
            Self::Basic(_) => BlockKind::Basic,
            Self::Shift(_) => BlockKind::Shift,
        }
    }
}

impl From<BasicBlockConfig> for ResidualBlockConfig {
    fn from(config: BasicBlockConfig) -> Self {
        Self::Basic(config)
    }
}

impl From<ShiftBlockConfig> for ResidualBlockConfig {
    fn from(config: ShiftBlockConfig) -> Self {
        Self::Shift(config)
    }
}

impl ResidualBlockConfig {
    /// Check if the config is valid.
    pub fn try_validate(&self) -> Result<(), String> {
        match self {
            Self::Basic(config) => config.try_validate(),
            Self::Shift(config) => config.try_validate(),
        }
    }

    /// Initialize a [`ResidualBlock`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> ResidualBlock<B> {
        match self {
            Self::Basic(config) => ResidualBlock::Basic(config.clone().init(device)),
            Self::Shift(config) => ResidualBlock::Shift(config.clone().init(device)),
        }
    }
}

/// A `ResNet` [`BasicBlock`] or [`ShiftBlock`] wrapper.
#[derive(Module, Debug)]
#[allow(clippy::large_enum_variant)]
pub enum ResidualBlock<B: Backend> {
    /// A `ResNet` [`BasicBlock`].
    Basic(BasicBlock<B>),

    /// A `ShiftResNet` [`ShiftBlock`].
    Shift(ShiftBlock<B>),
}

impl<B: Backend> From<BasicBlock<B>> for ResidualBlock<B> {
    fn from(block: BasicBlock<B>) -> Self {
        Self::Basic(block)
    }
}

impl<B: Backend> From<ShiftBlock<B>> for ResidualBlock<B> {
    fn from(block: ShiftBlock<B>) -> Self {
        Self::Shift(block)
    }
}

impl<B: Backend> ResidualBlockMeta for ResidualBlock<B> {
    fn in_planes(&self) -> usize {
        match self {
            Self::Basic(block) => block.in_planes(),
            Self::Shift(block) => block.in_planes(),
        }
    }

    fn mid_planes(&self) -> usize {
        match self {
            Self::Basic(block) => block.mid_planes(),
            Self::Shift(block) => block.mid_planes(),
        }
    }

    fn out_planes(&self) -> usize {
        match self {
            Self::Basic(block) => block.out_planes(),
            Self::Shift(block) => block.out_planes(),
        }
    }

    fn stride(&self) -> usize {
        match self {
            Self::Basic(block) => block.stride(),
            Self::Shift(block) => block.stride(),
        }
    }

    fn kind(&self) -> BlockKind {
        match self {
            Self::Basic(_) => BlockKind::Basic,
            Self::Shift(_) => BlockKind::Shift,
        }
    }
}

impl<B: Backend> ResidualBlock<B> {
    /// Apply the wrapped block to the input.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_planes, in_height=out_height*stride, in_width=out_width*stride]``.
    ///
    /// # Returns
    ///
    /// A ``[batch, out_planes, out_height, out_width]`` tensor.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        match self {
            Self::Basic(block) => block.forward(input),
            Self::Shift(block) => block.forward(input),
        }
    }
}
