//! # Shift2d - parameter-free spatial shift.
//!
//! [`Shift2d`] replaces the spatial mixing of a `kxk` convolution with a fixed
//! per-channel translation; the surrounding `1x1` convolutions supply all the
//! learned parameters.
//!
//! The channels are split into `kernel_size^2` contiguous groups of
//! `group_size = max(1, channels / kernel_size^2)` channels. Group `i` is
//! translated by:
//!
//! ```text
//! dy = (i / kernel_size - kernel_size / 2) * dilation
//! dx = (i % kernel_size - kernel_size / 2) * dilation
//! out[y, x] = in[y - dy, x - dx]     (zero when out of bounds)
//! ```
//!
//! Channels past the last full group are passed through unshifted.

use burn::config::Config;
use burn::module::Module;
use burn::prelude::{Backend, Tensor};

/// A contiguous run of channels sharing one shift offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShiftGroup {
    /// First channel of the group.
    pub start: usize,

    /// One past the last channel of the group.
    pub end: usize,

    /// ``[dy, dx]`` translation applied to the group.
    pub offset: [isize; 2],
}

/// [`Shift2d`] Meta trait.
pub trait Shift2dMeta {
    /// The (odd) size of the shift neighborhood.
    fn kernel_size(&self) -> usize;

    /// Spacing between neighborhood taps.
    fn dilation(&self) -> usize;

    /// The largest translation along either axis.
    fn radius(&self) -> usize {
        (self.kernel_size() / 2) * self.dilation()
    }

    /// Partition `channels` into [`ShiftGroup`]s.
    fn channel_groups(
        &self,
        channels: usize,
    ) -> Vec<ShiftGroup> {
        let k = self.kernel_size();
        let center = (k / 2) as isize;
        let dilation = self.dilation() as isize;

        let num_groups = k * k;
        let group_size = (channels / num_groups).max(1);

        let mut groups: Vec<ShiftGroup> = (0..num_groups)
            .map(|i| (i, i * group_size))
            .take_while(|&(_, start)| start < channels)
            .map(|(i, start)| ShiftGroup {
                start,
                end: (start + group_size).min(channels),
                offset: [
                    ((i / k) as isize - center) * dilation,
                    ((i % k) as isize - center) * dilation,
                ],
            })
            .collect();

        let covered = groups.last().map_or(0, |g| g.end);
        if covered < channels {
            groups.push(ShiftGroup {
                start: covered,
                end: channels,
                offset: [0, 0],
            });
        }

        groups
    }

    /// The ``[dy, dx]`` translation of each channel.
    fn shift_offsets(
        &self,
        channels: usize,
    ) -> Vec<[isize; 2]> {
        self.channel_groups(channels)
            .into_iter()
            .flat_map(|g| std::iter::repeat_n(g.offset, g.end - g.start))
            .collect()
    }
}

/// [`Shift2d`] Config.
#[derive(Config, Debug)]
pub struct Shift2dConfig {
    /// The size of the shift neighborhood; must be odd.
    #[config(default = 3)]
    pub kernel_size: usize,

    /// Spacing between neighborhood taps.
    #[config(default = 1)]
    pub dilation: usize,
}

impl Shift2dMeta for Shift2dConfig {
    fn kernel_size(&self) -> usize {
        self.kernel_size
    }

    fn dilation(&self) -> usize {
        self.dilation
    }
}

impl Shift2dConfig {
    /// Check if the config is valid.
    pub fn try_validate(&self) -> Result<(), String> {
        if self.kernel_size == 0 || self.kernel_size % 2 == 0 {
            return Err(format!(
                "kernel_size must be odd and positive: {}",
                self.kernel_size
            ));
        }
        if self.dilation == 0 {
            return Err("dilation must be positive".to_string());
        }
        Ok(())
    }

    /// Initialize a [`Shift2d`].
    ///
    /// # Panics
    ///
    /// If the config is invalid.
    pub fn init(&self) -> Shift2d {
        if let Err(err) = self.try_validate() {
            panic!("{}", err);
        }
        Shift2d {
            kernel_size: self.kernel_size,
            dilation: self.dilation,
        }
    }
}

/// Parameter-free grouped spatial shift.
///
/// Maps ``[batch, channels, height, width]`` to the same shape.
#[derive(Module, Clone, Debug)]
pub struct Shift2d {
    /// The size of the shift neighborhood.
    pub kernel_size: usize,

    /// Spacing between neighborhood taps.
    pub dilation: usize,
}

impl Shift2dMeta for Shift2d {
    fn kernel_size(&self) -> usize {
        self.kernel_size
    }

    fn dilation(&self) -> usize {
        self.dilation
    }
}

impl Shift2d {
    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, channels, height, width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, channels, height, width]``
    pub fn forward<B: Backend>(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let [batch, channels, height, width] = input.dims();

        let radius = self.radius();
        if radius == 0 {
            return input;
        }

        // Padding by the radius makes every window read in-bounds.
        let padded = input.pad((radius, radius, radius, radius), 0.0);

        let parts = self
            .channel_groups(channels)
            .into_iter()
            .map(|group| {
                let [dy, dx] = group.offset;
                let y0 = (radius as isize - dy) as usize;
                let x0 = (radius as isize - dx) as usize;
                padded.clone().slice([
                    0..batch,
                    group.start..group.end,
                    y0..y0 + height,
                    x0..x0 + width,
                ])
            })
            .collect::<Vec<_>>();

        Tensor::cat(parts, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};
    use burn::tensor::{Distribution, TensorData};

    #[test]
    fn test_config_defaults() {
        let config = Shift2dConfig::new();
        assert_eq!(config.kernel_size(), 3);
        assert_eq!(config.dilation(), 1);
        assert_eq!(config.radius(), 1);

        let config = config.with_kernel_size(5).with_dilation(2);
        assert_eq!(config.radius(), 4);
        assert!(config.try_validate().is_ok());
    }

    #[test]
    #[should_panic(expected = "kernel_size must be odd")]
    fn test_even_kernel_panics() {
        Shift2dConfig::new().with_kernel_size(2).init();
    }

    #[test]
    fn test_channel_groups() {
        let shift = Shift2dConfig::new().init();

        let groups = shift.channel_groups(18);
        assert_eq!(groups.len(), 9);
        assert_eq!(
            groups[0],
            ShiftGroup {
                start: 0,
                end: 2,
                offset: [-1, -1]
            }
        );
        assert_eq!(groups[4].offset, [0, 0]);
        assert_eq!(
            groups[8],
            ShiftGroup {
                start: 16,
                end: 18,
                offset: [1, 1]
            }
        );

        // 20 / 9 = 2 per group; channels 18, 19 are left in place.
        let groups = shift.channel_groups(20);
        assert_eq!(groups.len(), 10);
        assert_eq!(
            groups[9],
            ShiftGroup {
                start: 18,
                end: 20,
                offset: [0, 0]
            }
        );

        // Fewer channels than taps: one channel per group.
        let offsets = shift.shift_offsets(4);
        assert_eq!(offsets, vec![[-1, -1], [-1, 0], [-1, 1], [0, -1]]);
    }

    #[test]
    fn test_shift_moves_each_group() {
        type B = NdArray<f32>;
        let device = Default::default();

        // One hot center pixel in each of 9 channels.
        let mut values = vec![0.0f32; 9 * 9];
        for c in 0..9 {
            values[c * 9 + 4] = 1.0;
        }
        let input: Tensor<B, 4> =
            Tensor::from_data(TensorData::new(values, [1, 9, 3, 3]), &device);

        let output = Shift2dConfig::new().init().forward(input);

        // Channel i lands at (i / 3, i % 3), i.e. flat position i.
        let mut eye = vec![0.0f32; 9 * 9];
        for i in 0..9 {
            eye[i * 9 + i] = 1.0;
        }
        output
            .reshape([9, 9])
            .to_data()
            .assert_eq(&TensorData::new(eye, [9, 9]), true);
    }

    #[test]
    fn test_shift_dilation() {
        type B = NdArray<f32>;
        let device = Default::default();

        let mut values = vec![0.0f32; 25];
        values[2 * 5 + 2] = 1.0;
        let input: Tensor<B, 4> =
            Tensor::from_data(TensorData::new(values, [1, 1, 5, 5]), &device);

        // A single channel lands in group 0: offset [-2, -2].
        let output = Shift2dConfig::new()
            .with_dilation(2)
            .init()
            .forward(input);

        let mut expected = vec![0.0f32; 25];
        expected[0] = 1.0;
        output
            .to_data()
            .assert_eq(&TensorData::new(expected, [1, 1, 5, 5]), true);
    }

    #[test]
    fn test_remainder_and_center_unshifted() {
        type B = NdArray<f32>;
        let device = Default::default();

        let input: Tensor<B, 4> = Tensor::random([2, 10, 4, 4], Distribution::Default, &device);
        let output = Shift2dConfig::new().init().forward(input.clone());
        assert_eq!(output.dims(), [2, 10, 4, 4]);

        for c in [4, 9] {
            output
                .clone()
                .slice([0..2, c..c + 1, 0..4, 0..4])
                .to_data()
                .assert_eq(&input.clone().slice([0..2, c..c + 1, 0..4, 0..4]).to_data(), true);
        }
    }

    #[test]
    fn test_unit_kernel_is_identity() {
        type B = NdArray<f32>;
        let device = Default::default();

        let input: Tensor<B, 4> = Tensor::random([1, 3, 4, 4], Distribution::Default, &device);
        let output = Shift2dConfig::new()
            .with_kernel_size(1)
            .init()
            .forward(input.clone());
        output.to_data().assert_eq(&input.to_data(), true);
    }

    #[test]
    fn test_shift_gradients() {
        type B = Autodiff<NdArray<f32>>;
        let device = Default::default();

        let input: Tensor<B, 4> = Tensor::ones([1, 9, 3, 3], &device).require_grad();
        let output = Shift2dConfig::new().init().forward(input.clone());

        let grads = output.sum().backward();
        let grad = input.grad(&grads).unwrap();
        assert_eq!(grad.dims(), [1, 9, 3, 3]);

        // Offset [-1, -1] reads only the lower-right 2x2 window.
        let corner: f32 = grad.clone().slice([0..1, 0..1, 0..3, 0..3]).sum().into_scalar();
        assert_eq!(corner, 4.0);

        // The center group is the identity.
        let center: f32 = grad.slice([0..1, 4..5, 0..3, 0..3]).sum().into_scalar();
        assert_eq!(center, 9.0);
    }
}
