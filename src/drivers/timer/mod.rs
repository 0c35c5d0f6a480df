//! Timer drivers.
//!
//! The Local APIC timer raises the periodic scheduling interrupt; the PIT is
//! only used as a reference clock while calibrating it.

pub mod lapic;
pub mod pit;

pub use lapic::{Lapic, lapic};

/// Calibrates the Local APIC timer against the PIT and starts the periodic
/// interrupt. Returns the measured LAPIC frequency.
pub fn init() -> anyhow::Result<u64> {
    lapic::init(|| pit::wait_milliseconds(lapic::CALIBRATION_MS))
}
