//! # Well-Known `ResNet` and `ShiftResNet` Configs
//!
//! The CIFAR `ResNet` family has ``depth = 6n + 2`` for ``n`` blocks per stage.
//!
//! * [`ResNetDepth`] - the supported depths.
//! * [`resnet20`] .. [`resnet110`] - basic block factories.
//! * [`shift_resnet20`] .. [`shift_resnet110`] - shift block factories.
//! * [`PREFAB_RESNET_MAP`] - the named registry.

use crate::models::resnet::residual_block::BlockKind;
use crate::models::resnet::resnet_model::{ReductionMode, ResNetContractConfig};
use crate::prefabs::{StaticPreFabConfig, StaticPreFabMap};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// `ResNet-20` block depths.
pub const RESNET20_BLOCKS: [usize; 3] = [3, 3, 3];
/// `ResNet-32` block depths.
pub const RESNET32_BLOCKS: [usize; 3] = [5, 5, 5];
/// `ResNet-44` block depths.
pub const RESNET44_BLOCKS: [usize; 3] = [7, 7, 7];
/// `ResNet-56` block depths.
pub const RESNET56_BLOCKS: [usize; 3] = [9, 9, 9];
/// `ResNet-110` block depths.
pub const RESNET110_BLOCKS: [usize; 3] = [18, 18, 18];

/// A supported CIFAR `ResNet` depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResNetDepth {
    /// 20 layers; ``[3, 3, 3]``.
    D20,
    /// 32 layers; ``[5, 5, 5]``.
    D32,
    /// 44 layers; ``[7, 7, 7]``.
    D44,
    /// 56 layers; ``[9, 9, 9]``.
    D56,
    /// 110 layers; ``[18, 18, 18]``.
    D110,
}

/// Error resolving a [`ResNetDepth`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResNetDepthError {
    /// The depth is a number, but not a supported one.
    #[error("unsupported resnet depth {0}; expected one of 20, 32, 44, 56, 110")]
    Unsupported(usize),

    /// The name is not a depth.
    #[error("unrecognized resnet depth \"{0}\"")]
    Unrecognized(String),
}

impl ResNetDepth {
    /// All supported depths, shallowest first.
    pub const ALL: [ResNetDepth; 5] = [Self::D20, Self::D32, Self::D44, Self::D56, Self::D110];

    /// The number of weighted layers.
    pub fn depth(self) -> usize {
        match self {
            Self::D20 => 20,
            Self::D32 => 32,
            Self::D44 => 44,
            Self::D56 => 56,
            Self::D110 => 110,
        }
    }

    /// Blocks per stage.
    pub fn blocks(self) -> [usize; 3] {
        match self {
            Self::D20 => RESNET20_BLOCKS,
            Self::D32 => RESNET32_BLOCKS,
            Self::D44 => RESNET44_BLOCKS,
            Self::D56 => RESNET56_BLOCKS,
            Self::D110 => RESNET110_BLOCKS,
        }
    }
}

impl TryFrom<usize> for ResNetDepth {
    type Error = ResNetDepthError;

    fn try_from(depth: usize) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|d| d.depth() == depth)
            .ok_or(ResNetDepthError::Unsupported(depth))
    }
}

impl FromStr for ResNetDepth {
    type Err = ResNetDepthError;

    /// Accepts ``"20"``, ``"resnet20"``, ``"ResNet-20"``, ``"shiftresnet20"``.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let digits = lower
            .strip_prefix("shift")
            .unwrap_or(lower.as_str())
            .trim_start_matches('_')
            .trim_start_matches("resnet")
            .trim_start_matches('-');

        let depth: usize = digits
            .parse()
            .map_err(|_| ResNetDepthError::Unrecognized(s.to_string()))?;
        depth.try_into()
    }
}

impl Display for ResNetDepth {
    fn fmt(
        &self,
        f: &mut Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "{}", self.depth())
    }
}

impl ResNetContractConfig {
    /// A basic-block `ResNet` of the given depth.
    pub fn resnet(
        depth: ResNetDepth,
        num_classes: usize,
    ) -> Self {
        Self::new(depth.blocks()).with_num_classes(num_classes)
    }

    /// A shift-block `ShiftResNet` of the given depth.
    pub fn shift_resnet(
        depth: ResNetDepth,
        num_classes: usize,
    ) -> Self {
        Self::resnet(depth, num_classes).with_block(BlockKind::Shift)
    }
}

fn reduced_resnet(
    depth: ResNetDepth,
    reduction: f64,
    reduction_mode: ReductionMode,
    num_classes: usize,
) -> ResNetContractConfig {
    ResNetContractConfig::resnet(depth, num_classes)
        .with_reduction(reduction)
        .with_reduction_mode(reduction_mode)
}

fn expanded_shift_resnet(
    depth: ResNetDepth,
    expansion: f64,
    num_classes: usize,
) -> ResNetContractConfig {
    ResNetContractConfig::shift_resnet(depth, num_classes).with_expansion(expansion)
}

/// `ResNet-20`.
pub fn resnet20(
    reduction: f64,
    reduction_mode: ReductionMode,
    num_classes: usize,
) -> ResNetContractConfig {
    reduced_resnet(ResNetDepth::D20, reduction, reduction_mode, num_classes)
}

/// `ResNet-32`.
pub fn resnet32(
    reduction: f64,
    reduction_mode: ReductionMode,
    num_classes: usize,
) -> ResNetContractConfig {
    reduced_resnet(ResNetDepth::D32, reduction, reduction_mode, num_classes)
}

/// `ResNet-44`.
pub fn resnet44(
    reduction: f64,
    reduction_mode: ReductionMode,
    num_classes: usize,
) -> ResNetContractConfig {
    reduced_resnet(ResNetDepth::D44, reduction, reduction_mode, num_classes)
}

/// `ResNet-56`.
pub fn resnet56(
    reduction: f64,
    reduction_mode: ReductionMode,
    num_classes: usize,
) -> ResNetContractConfig {
    reduced_resnet(ResNetDepth::D56, reduction, reduction_mode, num_classes)
}

/// `ResNet-110`.
pub fn resnet110(
    reduction: f64,
    reduction_mode: ReductionMode,
    num_classes: usize,
) -> ResNetContractConfig {
    reduced_resnet(ResNetDepth::D110, reduction, reduction_mode, num_classes)
}

/// `ShiftResNet-20`.
pub fn shift_resnet20(
    expansion: f64,
    num_classes: usize,
) -> ResNetContractConfig {
    expanded_shift_resnet(ResNetDepth::D20, expansion, num_classes)
}

/// `ShiftResNet-32`.
pub fn shift_resnet32(
    expansion: f64,
    num_classes: usize,
) -> ResNetContractConfig {
    expanded_shift_resnet(ResNetDepth::D32, expansion, num_classes)
}

/// `ShiftResNet-44`.
pub fn shift_resnet44(
    expansion: f64,
    num_classes: usize,
) -> ResNetContractConfig {
    expanded_shift_resnet(ResNetDepth::D44, expansion, num_classes)
}

/// `ShiftResNet-56`.
pub fn shift_resnet56(
    expansion: f64,
    num_classes: usize,
) -> ResNetContractConfig {
    expanded_shift_resnet(ResNetDepth::D56, expansion, num_classes)
}

/// `ShiftResNet-110`.
pub fn shift_resnet110(
    expansion: f64,
    num_classes: usize,
) -> ResNetContractConfig {
    expanded_shift_resnet(ResNetDepth::D110, expansion, num_classes)
}

/// Well-known CIFAR [`super::ResNet`] configs.
pub static PREFAB_RESNET_MAP: StaticPreFabMap<ResNetContractConfig> = StaticPreFabMap {
    name: "resnet",
    description: "Well-Known CIFAR ResNet and ShiftResNet configs",

    items: &[
        &StaticPreFabConfig {
            name: "resnet20",
            description: "ResNet-20 [3, 3, 3] BasicBlocks",
            builder: || resnet20(1.0, ReductionMode::Net, 10),
        },
        &StaticPreFabConfig {
            name: "resnet32",
            description: "ResNet-32 [5, 5, 5] BasicBlocks",
            builder: || resnet32(1.0, ReductionMode::Net, 10),
        },
        &StaticPreFabConfig {
            name: "resnet44",
            description: "ResNet-44 [7, 7, 7] BasicBlocks",
            builder: || resnet44(1.0, ReductionMode::Net, 10),
        },
        &StaticPreFabConfig {
            name: "resnet56",
            description: "ResNet-56 [9, 9, 9] BasicBlocks",
            builder: || resnet56(1.0, ReductionMode::Net, 10),
        },
        &StaticPreFabConfig {
            name: "resnet110",
            description: "ResNet-110 [18, 18, 18] BasicBlocks",
            builder: || resnet110(1.0, ReductionMode::Net, 10),
        },
        &StaticPreFabConfig {
            name: "shiftresnet20",
            description: "ShiftResNet-20 [3, 3, 3] ShiftBlocks",
            builder: || shift_resnet20(1.0, 10),
        },
        &StaticPreFabConfig {
            name: "shiftresnet32",
            description: "ShiftResNet-32 [5, 5, 5] ShiftBlocks",
            builder: || shift_resnet32(1.0, 10),
        },
        &StaticPreFabConfig {
            name: "shiftresnet44",
            description: "ShiftResNet-44 [7, 7, 7] ShiftBlocks",
            builder: || shift_resnet44(1.0, 10),
        },
        &StaticPreFabConfig {
            name: "shiftresnet56",
            description: "ShiftResNet-56 [9, 9, 9] ShiftBlocks",
            builder: || shift_resnet56(1.0, 10),
        },
        &StaticPreFabConfig {
            name: "shiftresnet110",
            description: "ShiftResNet-110 [18, 18, 18] ShiftBlocks",
            builder: || shift_resnet110(1.0, 10),
        },
    ],
};
