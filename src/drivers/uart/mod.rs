//! UART drivers.

pub mod ns16550;

pub use ns16550::{init_early, putchar, write_bytes};
