//! # Shift Block for `ShiftResNet`
//!
//! [`ShiftBlock`] replaces the 3x3 convolutions of a [`super::basic_block::BasicBlock`]
//! with ``1x1 conv -> shift -> 1x1 conv``.
//!
//! [`ShiftBlockMeta`] defines a common meta API for [`ShiftBlock`]
//! and [`ShiftBlockConfig`].

use crate::layers::blocks::conv_norm::{ConvNorm2d, ConvNorm2dConfig, ConvNorm2dMeta};
use crate::layers::shift::{Shift2d, Shift2dConfig, Shift2dMeta};
use crate::models::resnet::downsample::{ResNetDownsample, ResNetDownsampleConfig};
use crate::models::resnet::util::{scale_planes, stride_div_output_resolution};
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::prelude::{Backend, Config, Module, Tensor};
use burn::tensor::activation::relu;

/// [`ShiftBlock`] Meta trait.
pub trait ShiftBlockMeta {
    /// The size of the in channels dimension.
    fn in_planes(&self) -> usize;

    /// The size of the out channels dimension.
    fn out_planes(&self) -> usize;

    /// Control factor for `mid_planes()`.
    fn expansion(&self) -> f64;

    /// Width of the shifted feature map.
    ///
    /// ``mid_planes = trunc(out_planes * expansion)``
    fn mid_planes(&self) -> usize {
        scale_planes(self.out_planes(), self.expansion())
    }

    /// The stride of the second (1x1) convolution.
    fn stride(&self) -> usize;

    /// Does this block need a projection shortcut?
    fn needs_downsample(&self) -> bool {
        self.stride() != 1 || self.in_planes() != self.out_planes()
    }

    /// Get the output resolution for a given input resolution.
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

/// [`ShiftBlock`] Config.
///
/// Implements [`ShiftBlockMeta`].
#[derive(Config, Debug)]
pub struct ShiftBlockConfig {
    /// The size of the in channels dimension.
    pub in_planes: usize,

    /// The size of the out channels dimension.
    pub out_planes: usize,

    /// The stride of the second conv and the downsample layer.
    #[config(default = 1)]
    pub stride: usize,

    /// Control factor for `mid_planes()`.
    #[config(default = "1.0")]
    pub expansion: f64,

    /// The shift layer config.
    #[config(default = "Shift2dConfig::new()")]
    pub shift: Shift2dConfig,
}

impl ShiftBlockMeta for ShiftBlockConfig {
    fn in_planes(&self) -> usize {
        self.in_planes
    }

    fn out_planes(&self) -> usize {
        self.out_planes
    }

    fn expansion(&self) -> f64 {
        self.expansion
    }

    fn stride(&self) -> usize {
        self.stride
    }
}

impl ShiftBlockConfig {
    /// Check if the config is valid.
    pub fn try_validate(&self) -> Result<(), String> {
        if !(self.expansion > 0.0) {
            return Err(format!("expansion must be positive: {}", self.expansion));
        }
        if self.stride == 0 {
            return Err("stride must be positive".to_string());
        }
        if self.in_planes == 0 || self.mid_planes() == 0 || self.out_planes == 0 {
            return Err(format!(
                "ShiftBlock has a zero width: in_planes={}, mid_planes={}, out_planes={}",
                self.in_planes,
                self.mid_planes(),
                self.out_planes
            ));
        }
        self.shift.try_validate()
    }

    /// Initialize a [`ShiftBlock`].
    ///
    /// # Panics
    ///
    /// If the config is invalid.
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> ShiftBlock<B> {
        if let Err(err) = self.try_validate() {
            panic!("{}", err);
        }

        let mid_planes = self.mid_planes();

        let downsample = if self.needs_downsample() {
            Some(
                ResNetDownsampleConfig::new(self.in_planes, self.out_planes)
                    .with_stride(self.stride)
                    .init(device),
            )
        } else {
            None
        };

        ShiftBlock {
            expansion: self.expansion,
            downsample,
            cn1: ConvNorm2dConfig::square(self.in_planes, mid_planes, 1, 1).init(device),
            shift: self.shift.init(),
            cn2: ConvNorm2dConfig::square(mid_planes, self.out_planes, 1, self.stride)
                .init(device),
        }
    }
}

/// Shift Block for `ShiftResNet`.
///
/// ``out = relu(cn2(shift(relu(cn1(x))))) + shortcut(x)``
///
/// There is no activation after the residual sum.
///
/// Implements [`ShiftBlockMeta`].
#[derive(Module, Debug)]
pub struct ShiftBlock<B: Backend> {
    /// Expansion factor.
    pub expansion: f64,

    /// Optional `DownSample` layer; for the residual connection.
    pub downsample: Option<ResNetDownsample<B>>,

    /// Expanding 1x1 Conv/Norm Block.
    pub cn1: ConvNorm2d<B>,

    /// Spatial shift.
    pub shift: Shift2d,

    /// Projecting (and striding) 1x1 Conv/Norm Block.
    pub cn2: ConvNorm2d<B>,
}

impl<B: Backend> ShiftBlockMeta for ShiftBlock<B> {
    fn in_planes(&self) -> usize {
        self.cn1.in_channels()
    }

    fn out_planes(&self) -> usize {
        self.cn2.out_channels()
    }

    fn expansion(&self) -> f64 {
        self.expansion
    }

    fn mid_planes(&self) -> usize {
        self.cn1.out_channels()
    }

    fn stride(&self) -> usize {
        self.cn2.stride()[0]
    }

    fn needs_downsample(&self) -> bool {
        self.downsample.is_some()
    }
}

impl<B: Backend> ShiftBlock<B> {
    /// Forward Pass.
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

        let shortcut = match &self.downsample {
            Some(downsample) => downsample.forward(input.clone()),
            None => input.clone(),
        };

        let x = relu(self.cn1.forward(input));
        let x = self.shift.forward(x);
        let x = relu(self.cn2.forward(x));

        let x = x + shortcut;

        assert_shape_contract_periodically!(
            ["batch", "out_planes", "out_height", "out_width"],
            &x,
            &[
                ("batch", batch),
                ("out_planes", self.out_planes()),
                ("out_height", out_height),
                ("out_width", out_width),
            ]
        );

        x
    }
}
