//! Console module - Print and logging facilities.

#[macro_use]
pub mod print;

pub mod logger;

pub use logger::init as init_logger;
