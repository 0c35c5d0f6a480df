//! Kernel configuration.

pub mod kernel;
