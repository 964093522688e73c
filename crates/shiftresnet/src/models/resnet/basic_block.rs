//! # Basic Block for `ResNet`
//!
//! [`BasicBlock`] is the standard two-convolution `ResNet` unit.
//!
//! [`BasicBlockMeta`] defines a common meta API for [`BasicBlock`]
//! and [`BasicBlockConfig`].
//!
//! [`BasicBlockConfig`] implements [`Config`], and provides
//! [`BasicBlockConfig::init`] to initialize a [`BasicBlock`].
//!
//! [`BasicBlock`] implements [`Module`], and provides
//! [`BasicBlock::forward`].

use crate::layers::blocks::conv_norm::{ConvNorm2d, ConvNorm2dConfig, ConvNorm2dMeta};
use crate::models::resnet::downsample::{ResNetDownsample, ResNetDownsampleConfig};
use crate::models::resnet::util::{scale_planes, stride_div_output_resolution};
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::prelude::{Backend, Config, Module, Tensor};
use burn::tensor::activation::relu;

/// [`BasicBlock`] Meta trait.
pub trait BasicBlockMeta {
    /// The size of the in channels dimension.
    fn in_planes(&self) -> usize;

    /// The size of the out channels dimension.
    fn planes(&self) -> usize;

    /// Control factor for `mid_planes()`.
    fn reduction(&self) -> f64;

    /// First conv/norm layer output channels.
    ///
    /// ``mid_planes = trunc(planes * (1 / reduction))``
    fn mid_planes(&self) -> usize {
        scale_planes(self.planes(), 1.0 / self.reduction())
    }

    /// The size of the out channels dimension.
    fn out_planes(&self) -> usize {
        self.planes()
    }

    /// The stride of the first convolution.
    ///
    /// Affects downsample behavior.
    fn stride(&self) -> usize;

    /// Does this block need a projection shortcut?
    ///
    /// True when the stride is not 1, or when either the inner
    /// or the output width differs from the input width.
    fn needs_downsample(&self) -> bool {
        self.stride() != 1
            || self.in_planes() != self.mid_planes()
            || self.in_planes() != self.out_planes()
    }

    /// Get the output resolution for a given input resolution.
    ///
    /// The input must be a multiple of the stride.
    ///
    /// # Arguments
    ///
    /// - `input_resolution`: \
    ///   ``[in_height=out_height*stride, in_width=out_width*stride]``.
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

/// [`BasicBlock`] Config.
///
/// Implements [`BasicBlockMeta`].
#[derive(Config, Debug)]
pub struct BasicBlockConfig {
    /// The size of the in channels dimension.
    pub in_planes: usize,

    /// The size of the out channels dimension.
    pub planes: usize,

    /// The stride of the first conv and the downsample layer.
    #[config(default = 1)]
    pub stride: usize,

    /// Control factor for `mid_planes()`.
    #[config(default = "1.0")]
    pub reduction: f64,
}

impl BasicBlockMeta for BasicBlockConfig {
    fn in_planes(&self) -> usize {
        self.in_planes
    }

    fn planes(&self) -> usize {
        self.planes
    }

    fn reduction(&self) -> f64 {
        self.reduction
    }

    fn stride(&self) -> usize {
        self.stride
    }
}

impl BasicBlockConfig {
    /// Check if the config is valid.
    pub fn try_validate(&self) -> Result<(), String> {
        if !(self.reduction > 0.0) {
            return Err(format!("reduction must be positive: {}", self.reduction));
        }
        if self.stride == 0 {
            return Err("stride must be positive".to_string());
        }
        if self.in_planes == 0 || self.mid_planes() == 0 || self.out_planes() == 0 {
            return Err(format!(
                "BasicBlock has a zero width: in_planes={}, mid_planes={}, out_planes={}",
                self.in_planes,
                self.mid_planes(),
                self.out_planes()
            ));
        }
        Ok(())
    }

    /// Initialize a [`BasicBlock`].
    ///
    /// # Panics
    ///
    /// If the config is invalid.
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> BasicBlock<B> {
        if let Err(err) = self.try_validate() {
            panic!("{}", err);
        }

        let in_planes = self.in_planes();
        let mid_planes = self.mid_planes();
        let out_planes = self.out_planes();
        let stride = self.stride();

        let downsample = if self.needs_downsample() {
            ResNetDownsampleConfig::new(in_planes, out_planes)
                .with_stride(stride)
                .into()
        } else {
            None
        };

        BasicBlock {
            reduction: self.reduction,
            downsample: downsample.as_ref().map(|cfg| cfg.init(device)),
            cn1: ConvNorm2dConfig::square(in_planes, mid_planes, 3, stride).init(device),
            cn2: ConvNorm2dConfig::square(mid_planes, out_planes, 3, 1).init(device),
        }
    }
}

/// Basic Block for `ResNet`.
///
/// ``out = relu(cn2(relu(cn1(x))) + shortcut(x))``
///
/// Implements [`BasicBlockMeta`].
#[derive(Module, Debug)]
pub struct BasicBlock<B: Backend> {
    /// Reduction factor.
    pub reduction: f64,

    /// Optional `DownSample` layer; for the residual connection.
    pub downsample: Option<ResNetDownsample<B>>,

    /// First 3x3 Conv/Norm Block.
    pub cn1: ConvNorm2d<B>,

    /// Second 3x3 Conv/Norm Block.
    pub cn2: ConvNorm2d<B>,
}

impl<B: Backend> BasicBlockMeta for BasicBlock<B> {
    fn in_planes(&self) -> usize {
        self.cn1.in_channels()
    }

    fn planes(&self) -> usize {
        self.cn2.out_channels()
    }

    fn reduction(&self) -> f64 {
        self.reduction
    }

    fn mid_planes(&self) -> usize {
        self.cn1.out_channels()
    }

    fn stride(&self) -> usize {
        self.cn1.stride()[0]
    }

    fn needs_downsample(&self) -> bool {
        self.downsample.is_some()
    }
}

impl<B: Backend> BasicBlock<B> {
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

        let identity = match &self.downsample {
            Some(downsample) => downsample.forward(input.clone()),
            None => input.clone(),
        };

        let x = relu(self.cn1.forward(input));

        assert_shape_contract_periodically!(
            ["batch", "mid_planes", "out_height", "out_width"],
            &x,
            &[
                ("batch", batch),
                ("mid_planes", self.mid_planes()),
                ("out_height", out_height),
                ("out_width", out_width),
            ]
        );

        let x = self.cn2.forward(x);
        let x = relu(x + identity);

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
