//! # The `ResNet` Shortcut Projection.
//!
//! [`ResNetDownsample`] is the learned shortcut used by residual blocks
//! whose output shape differs from their input shape.

use crate::layers::blocks::conv_norm::{ConvNorm2d, ConvNorm2dConfig, ConvNorm2dMeta};
use crate::models::resnet::util::stride_div_output_resolution;
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::prelude::{Backend, Config, Module, Tensor};

/// [`ResNetDownsample`] Meta trait.
pub trait ResNetDownsampleMeta {
    /// The size of the in channels dimension.
    fn in_planes(&self) -> usize;

    /// The size of the out channels dimension.
    fn out_planes(&self) -> usize;

    /// The stride of the downsample layer.
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

/// [`ResNetDownsample`] configuration.
///
/// Implements [`ResNetDownsampleMeta`].
#[derive(Config, Debug)]
pub struct ResNetDownsampleConfig {
    /// The size of the in channels dimension.
    pub in_planes: usize,

    /// The size of the out channels dimension.
    pub out_planes: usize,

    /// The stride of the downsample layer.
    #[config(default = 1)]
    pub stride: usize,
}

impl ResNetDownsampleMeta for ResNetDownsampleConfig {
    fn in_planes(&self) -> usize {
        self.in_planes
    }

    fn out_planes(&self) -> usize {
        self.out_planes
    }

    fn stride(&self) -> usize {
        self.stride
    }
}

impl ResNetDownsampleConfig {
    /// Initialize a [`ResNetDownsample`] `Module`.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> ResNetDownsample<B> {
        ResNetDownsample {
            conv_norm: ConvNorm2dConfig::square(self.in_planes, self.out_planes, 1, self.stride)
                .init(device),
        }
    }
}

/// Downsample layer; a strided 1x1 conv and norm.
///
/// Maps ``[batch, in_planes, in_height, in_width]`` to
/// ``[batch, out_planes, out_height, out_width]`` tensors.
///
/// Implements [`ResNetDownsampleMeta`].
#[derive(Module, Debug)]
pub struct ResNetDownsample<B: Backend> {
    /// Embedded conv/norm.
    pub conv_norm: ConvNorm2d<B>,
}

impl<B: Backend> ResNetDownsampleMeta for ResNetDownsample<B> {
    fn in_planes(&self) -> usize {
        self.conv_norm.in_channels()
    }

    fn out_planes(&self) -> usize {
        self.conv_norm.out_channels()
    }

    fn stride(&self) -> usize {
        self.conv_norm.stride()[0]
    }
}

impl<B: Backend> ResNetDownsample<B> {
    /// Forward pass.
    ///
    /// # Arguments
    ///
    /// - `input`: a ``[batch, in_planes, in_height=out_height*stride, in_width=out_width*stride]`` tensor.
    ///
    /// # Returns
    ///
    /// A ``[batch, out_planes, out_height, out_width]`` tensor.
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
            &[("in_planes", self.in_planes()), ("stride", self.stride())]
        );

        let out = self.conv_norm.forward(input);

        assert_shape_contract_periodically!(
            ["batch", "out_planes", "out_height", "out_width"],
            &out,
            &[
                ("batch", batch),
                ("out_planes", self.out_planes()),
                ("out_height", out_height),
                ("out_width", out_width)
            ]
        );

        out
    }
}
