//! # `ResNet` Layer Block
//!
//! A [`LayerBlock`] is a sequence of [`ResidualBlock`]s; one network stage.
//!
//! [`LayerBlockMeta`] defines a common meta API for [`LayerBlock`]
//! and [`LayerBlockConfig`].
//!
//! [`LayerBlockConfig`] implements [`Config`], and provides
//! [`LayerBlockConfig::init`] to initialize a [`LayerBlock`].
//!
//! [`LayerBlock`] implements [`Module`], and provides
//! [`LayerBlock::forward`].

use crate::models::resnet::residual_block::{
    ResidualBlock, ResidualBlockConfig, ResidualBlockMeta,
};
use crate::models::resnet::util::stride_div_output_resolution;
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::config::Config;
use burn::prelude::{Backend, Module, Tensor};

/// [`LayerBlock`] Meta API.
pub trait LayerBlockMeta {
    /// The number of blocks.
    fn len(&self) -> usize;

    /// Check if the layer block is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The number of input feature planes.
    fn in_planes(&self) -> usize;

    /// The number of output feature planes.
    fn out_planes(&self) -> usize;

    /// Get the effective stride of the layers.
    fn stride(&self) -> usize;

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

/// [`LayerBlock`] Configuration.
#[derive(Config, Debug)]
pub struct LayerBlockConfig {
    /// The component blocks.
    pub blocks: Vec<ResidualBlockConfig>,
}

impl From<Vec<ResidualBlockConfig>> for LayerBlockConfig {
    fn from(blocks: Vec<ResidualBlockConfig>) -> Self {
        Self { blocks }
    }
}

impl LayerBlockMeta for LayerBlockConfig {
    fn len(&self) -> usize {
        self.blocks.len()
    }

    fn in_planes(&self) -> usize {
        self.blocks[0].in_planes()
    }

    fn out_planes(&self) -> usize {
        self.blocks[self.blocks.len() - 1].out_planes()
    }

    fn stride(&self) -> usize {
        self.blocks
            .iter()
            .fold(1, |acc, block| acc * block.stride())
    }
}

impl LayerBlockConfig {
    /// Build a stage config.
    ///
    /// The first block maps `in_planes -> planes` with the given `stride`;
    /// the remaining blocks map `planes -> planes` with stride 1.
    ///
    /// # Arguments
    ///
    /// - `num_blocks`: the number of blocks.
    /// - `in_planes`: the stage input planes.
    /// - `planes`: the stage output planes.
    /// - `stride`: the stride of the first block.
    /// - `make_block`: ``(in_planes, planes, stride) -> ResidualBlockConfig``.
    pub fn build<F>(
        num_blocks: usize,
        in_planes: usize,
        planes: usize,
        stride: usize,
        make_block: F,
    ) -> Self
    where
        F: Fn(usize, usize, usize) -> ResidualBlockConfig,
    {
        let blocks = (0..num_blocks)
            .map(|b| {
                if b == 0 {
                    make_block(in_planes, planes, stride)
                } else {
                    make_block(planes, planes, 1)
                }
            })
            .collect();

        Self { blocks }
    }

    /// Check if the config is valid.
    ///
    /// # Returns
    ///
    /// A `Result<(), String>`
    pub fn try_validate(&self) -> Result<(), String> {
        if self.is_empty() {
            return Err("blocks is empty".to_string());
        }

        for (idx, block) in self.blocks.iter().enumerate() {
            block
                .try_validate()
                .map_err(|err| format!("block[{idx}]: {err}"))?;
        }

        for idx in 1..self.blocks.len() {
            let prev = &self.blocks[idx - 1];
            let curr = &self.blocks[idx];
            if prev.out_planes() != curr.in_planes() {
                return Err(format!(
                    "block[{}].out_planes({}) != block[{}].in_planes({})\n{:#?}",
                    idx - 1,
                    prev.out_planes(),
                    idx,
                    curr.in_planes(),
                    self,
                ));
            }
        }
        Ok(())
    }

    /// Panic if `try_validate` returns an error.
    pub fn expect_valid(&self) {
        match self.try_validate() {
            Ok(_) => (),
            Err(err) => panic!("{}", err),
        }
    }

    /// Initialize a new [`LayerBlock`].
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> LayerBlock<B> {
        self.expect_valid();

        LayerBlock {
            blocks: self
                .blocks
                .iter()
                .map(|block| block.init(device))
                .collect(),
        }
    }

    /// Apply a mapping over the blocks.
    pub fn map_blocks<F>(
        self,
        f: &mut F,
    ) -> Self
    where
        F: FnMut(usize, ResidualBlockConfig) -> ResidualBlockConfig,
    {
        Self {
            blocks: self
                .blocks
                .into_iter()
                .enumerate()
                .map(|(idx, block)| f(idx, block))
                .collect(),
        }
    }
}

/// Layer block.
#[derive(Module, Debug)]
pub struct LayerBlock<B: Backend> {
    /// Internal blocks.
    pub blocks: Vec<ResidualBlock<B>>,
}

impl<B: Backend> LayerBlockMeta for LayerBlock<B> {
    fn len(&self) -> usize {
        self.blocks.len()
    }

    fn in_planes(&self) -> usize {
        self.blocks[0].in_planes()
    }

    fn out_planes(&self) -> usize {
        self.blocks[self.blocks.len() - 1].out_planes()
    }

    fn stride(&self) -> usize {
        self.blocks
            .iter()
            .fold(1, |acc, block| acc * block.stride())
    }
}

impl<B: Backend> LayerBlock<B> {
    /// Apply the layer block.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let [batch, out_height, out_width] = unpack_shape_contract!(
            [
                "batch",
                "in_planes",
                "in_height" = "out_height" * "stride",
                "in_width" = "out_width" * "stride"
            ],
            &input,
            &["batch", "out_height", "out_width"],
            &[("in_planes", self.in_planes()), ("stride", self.stride())],
        );

        let x = self.blocks.iter().fold(input, |x, block| block.forward(x));

        assert_shape_contract_periodically!(
            ["batch", "out_planes", "out_height", "out_width"],
            &x,
            &[
                ("batch", batch),
                ("out_planes", self.out_planes()),
                ("out_height", out_height),
                ("out_width", out_width)
            ],
        );

        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::resnet::basic_block::BasicBlockConfig;
    use crate::models::resnet::residual_block::BlockKind;
    use crate::models::resnet::shift_block::ShiftBlockConfig;
    use bimm_contracts::assert_shape_contract;
    use burn::backend::NdArray;

    fn basic(
        in_planes: usize,
        planes: usize,
        stride: usize,
    ) -> ResidualBlockConfig {
        BasicBlockConfig::new(in_planes, planes)
            .with_stride(stride)
            .into()
    }

    #[test]
    fn test_layer_block_config_build() {
        let config = LayerBlockConfig::build(3, 16, 32, 2, basic);
        config.expect_valid();
        assert_eq!(config.len(), 3);
        assert_eq!(config.in_planes(), 16);
        assert_eq!(config.out_planes(), 32);
        assert_eq!(config.stride(), 2);
        assert_eq!(config.output_resolution([12, 24]), [6, 12]);

        let strides: Vec<usize> = config.blocks.iter().map(|b| b.stride()).collect();
        assert_eq!(strides, vec![2, 1, 1]);

        let block1 = &config.blocks[0];
        assert_eq!(block1.in_planes(), 16);
        assert_eq!(block1.out_planes(), 32);

        let block2 = &config.blocks[1];
        assert_eq!(block2.in_planes(), 32);
        assert_eq!(block2.out_planes(), 32);
        assert_eq!(block2.output_resolution([12, 24]), [12, 24]);
    }

    #[test]
    fn test_layer_block_validation() {
        let empty = LayerBlockConfig::new(vec![]);
        assert_eq!(empty.try_validate(), Err("blocks is empty".to_string()));

        let mismatched = LayerBlockConfig::from(vec![basic(16, 32, 2), basic(16, 32, 1)]);
        let err = mismatched.try_validate().unwrap_err();
        assert!(err.starts_with("block[0].out_planes(32) != block[1].in_planes(16)"));

        let zero = LayerBlockConfig::from(vec![
            BasicBlockConfig::new(16, 1).with_reduction(2.0).into(),
        ]);
        assert!(zero.try_validate().unwrap_err().starts_with("block[0]: "));
    }

    #[test]
    fn test_map_blocks() {
        let config = LayerBlockConfig::build(2, 8, 8, 1, basic).map_blocks(&mut |_, block| {
            ShiftBlockConfig::new(block.in_planes(), block.out_planes())
                .with_stride(block.stride())
                .into()
        });
        assert!(config.blocks.iter().all(|b| b.kind() == BlockKind::Shift));
    }

    #[test]
    pub fn test_layer_block() {
        type B = NdArray;
        let device = Default::default();

        let config = LayerBlockConfig::from(vec![
            basic(16, 32, 2),
            ShiftBlockConfig::new(32, 64)
                .with_stride(3)
                .into(),
        ]);

        config.expect_valid();

        assert_eq!(config.len(), 2);
        assert_eq!(config.in_planes(), 16);
        assert_eq!(config.out_planes(), 64);
        assert_eq!(config.stride(), 2 * 3);
        assert_eq!(config.output_resolution([12, 24]), [2, 4]);

        let block: LayerBlock<B> = config.init(&device);

        assert_eq!(block.len(), 2);
        assert_eq!(block.in_planes(), 16);
        assert_eq!(block.out_planes(), 64);
        assert_eq!(block.stride(), 2 * 3);

        let batch_size = 2;
        let input = Tensor::ones([batch_size, 16, 12, 24], &device);

        let output = block.forward(input.clone());
        assert_shape_contract!(
            ["batch", "out_planes", "out_height", "out_width"],
            &output,
            &[
                ("batch", batch_size),
                ("out_planes", 64),
                ("out_height", 2),
                ("out_width", 4)
            ],
        );

        let mut expected = input;
        for block in block.blocks.iter() {
            expected = block.forward(expected);
        }
        output.to_data().assert_eq(&expected.to_data(), true);
    }
}
