//! # `ConvNorm2d` Module
//!
//! A [`ConvNorm2d`] module is a [`Conv2d`] layer followed by a [`BatchNorm`] layer.
//!
//! This is the convolution unit of every `ResNet` block in this crate;
//! activations are applied by the owning block.

use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::config::Config;
use burn::module::Module;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::{BatchNorm, BatchNormConfig, PaddingConfig2d};
use burn::prelude::{Backend, Tensor};

/// [`ConvNorm2d`] Meta.
pub trait ConvNorm2dMeta {
    /// Number of input channels.
    fn in_channels(&self) -> usize;

    /// Number of output channels.
    fn out_channels(&self) -> usize;

    /// The square kernel size.
    fn kernel_size(&self) -> usize;

    /// Get the stride.
    fn stride(&self) -> [usize; 2];
}

/// [`ConvNorm2d`] Config.
#[derive(Config, Debug)]
pub struct ConvNorm2dConfig {
    /// The [`Conv2d`] config.
    pub conv: Conv2dConfig,
}

impl ConvNorm2dMeta for ConvNorm2dConfig {
    fn in_channels(&self) -> usize {
        self.conv.channels[0]
    }

    fn out_channels(&self) -> usize {
        self.conv.channels[1]
    }

    fn kernel_size(&self) -> usize {
        self.conv.kernel_size[0]
    }

    fn stride(&self) -> [usize; 2] {
        self.conv.stride
    }
}

impl From<Conv2dConfig> for ConvNorm2dConfig {
    fn from(conv: Conv2dConfig) -> Self {
        Self { conv }
    }
}

impl ConvNorm2dConfig {
    /// Bias-free square conv with "same" padding for odd kernels.
    ///
    /// # Arguments
    ///
    /// - `in_channels`: input channels.
    /// - `out_channels`: output channels.
    /// - `kernel_size`: the (odd) square kernel size.
    /// - `stride`: the square stride.
    pub fn square(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        stride: usize,
    ) -> Self {
        let padding = kernel_size / 2;
        Conv2dConfig::new([in_channels, out_channels], [kernel_size, kernel_size])
            .with_stride([stride, stride])
            .with_padding(PaddingConfig2d::Explicit(padding, padding))
            .with_bias(false)
            .into()
    }

    /// Initialize a [`ConvNorm2d`].
    ///
    /// The norm layer is sized to the conv output channels.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> ConvNorm2d<B> {
        ConvNorm2d {
            conv: self.conv.init(device),
            norm: BatchNormConfig::new(self.out_channels()).init(device),
        }
    }
}

/// [`Conv2d`] and [`BatchNorm`] layer.
///
/// Implements [`ConvNorm2dMeta`].
#[derive(Module, Debug)]
pub struct ConvNorm2d<B: Backend> {
    /// Internal Conv2d layer.
    pub conv: Conv2d<B>,

    /// Internal Norm Layer.
    pub norm: BatchNorm<B, 2>,
}

impl<B: Backend> ConvNorm2dMeta for ConvNorm2d<B> {
    fn in_channels(&self) -> usize {
        self.conv.weight.shape().dims[1] * self.conv.groups
    }

    fn out_channels(&self) -> usize {
        self.conv.weight.shape().dims[0]
    }

    fn kernel_size(&self) -> usize {
        self.conv.kernel_size[0]
    }

    fn stride(&self) -> [usize; 2] {
        self.conv.stride
    }
}

impl<B: Backend> ConvNorm2d<B> {
    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: \
    ///   ``[batch, in_channels, in_height=out_height*height_stride, in_width=out_width*width_stride]``.
    ///
    /// # Returns
    ///
    /// ``[batch, out_channels, out_height, out_width]``
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let [batch, out_height, out_width] = unpack_shape_contract!(
            [
                "batch",
                "in_channels",
                "in_height" = "out_height" * "height_stride",
                "in_width" = "out_width" * "width_stride"
            ],
            &input,
            &["batch", "out_height", "out_width"],
            &[
                ("in_channels", self.in_channels()),
                ("height_stride", self.stride()[0]),
                ("width_stride", self.stride()[1]),
            ]
        );

        let x = self.conv.forward(input);
        let x = self.norm.forward(x);

        assert_shape_contract_periodically!(
            ["batch", "out_channels", "out_height", "out_width"],
            &x,
            &[
                ("batch", batch),
                ("out_channels", self.out_channels()),
                ("out_height", out_height),
                ("out_width", out_width)
            ]
        );

        x
    }
}
