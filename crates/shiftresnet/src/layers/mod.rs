//! Common low-level modules for building models in Burn.
pub mod blocks;
pub mod shift;
