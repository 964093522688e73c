#![warn(missing_docs)]
//!# shiftresnet - CIFAR `ResNet` and `ShiftResNet` for Burn
//!
//! ## Notable Components
//!
//! * [`layers`] - reusable neural network modules.
//!   * [`layers::shift`] - the parameter-free ``Shift2d`` spatial shift.
//!   * [`layers::blocks::conv_norm`] - ``Conv2d + BatchNorm2d`` block.
//! * [`models`] - complete model families.
//!   * [`models::resnet`] - `ResNet-{20,32,44,56,110}` and `ShiftResNet` variants.
//! * [`prefabs`] - named, well-known config builders.

pub mod layers;
pub mod models;
pub mod prefabs;
