//! # CIFAR `ResNet` and `ShiftResNet`
//!
//! * [`basic_block`] - the two 3x3 conv residual block.
//! * [`shift_block`] - the ``1x1 conv -> shift -> 1x1 conv`` residual block.
//! * [`residual_block`] - the block type selector.
//! * [`layer_block`] - a stage of residual blocks.
//! * [`resnet_model`] - the network assembler.
//! * [`prefabs`] - named depths and configs.

pub mod basic_block;
pub mod downsample;
pub mod layer_block;
pub mod prefabs;
pub mod residual_block;
pub mod resnet_model;
pub mod shift_block;
pub mod util;

pub use prefabs::*;
pub use residual_block::BlockKind;
pub use resnet_model::*;
