//! Local APIC timer driver.
//!
//! The timer is calibrated once against an external delay, then programmed
//! in periodic mode to fire [`TIMER_FREQ`] times per second on
//! [`LAPIC_TIMER_VECTOR`].

use core::ptr::NonNull;

use lazyinit::LazyInit;
use tock_registers::interfaces::{Readable, Writeable};
use tock_registers::registers::{ReadOnly, ReadWrite, WriteOnly};
use tock_registers::{register_bitfields, register_structs};

use crate::config::kernel::{LAPIC_BASE, LAPIC_TIMER_VECTOR, TIMER_FREQ};
use crate::error::{TinyError, TinyResult};

register_bitfields! [
    u32,
    LVT_TIMER [
        VECTOR OFFSET(0) NUMBITS(8) [],
        MASK OFFSET(16) NUMBITS(1) [
            Unmasked = 0,
            Masked = 1
        ],
        MODE OFFSET(17) NUMBITS(2) [
            OneShot = 0b00,
            Periodic = 0b01,
            TscDeadline = 0b10
        ]
    ],
    DIVIDE_CONFIG [
        VALUE OFFSET(0) NUMBITS(4) [
            By2 = 0b0000,
            By4 = 0b0001,
            By8 = 0b0010,
            By16 = 0b0011,
            By32 = 0b1000,
            By64 = 0b1001,
            By128 = 0b1010,
            By1 = 0b1011
        ]
    ]
];

register_structs! {
    /// The subset of the Local APIC register page used by the kernel.
    pub LapicRegs {
        (0x000 => _reserved0),
        (0x0b0 => eoi: WriteOnly<u32>),
        (0x0b4 => _reserved1),
        (0x320 => lvt_timer: ReadWrite<u32, LVT_TIMER::Register>),
        (0x324 => _reserved2),
        (0x380 => initial_count: ReadWrite<u32>),
        (0x384 => _reserved3),
        (0x390 => current_count: ReadOnly<u32>),
        (0x394 => _reserved4),
        (0x3e0 => divide_config: ReadWrite<u32, DIVIDE_CONFIG::Register>),
        (0x3e4 => @END),
    }
}

const COUNT_MAX: u32 = u32::MAX;

/// Length of the calibration window.
pub const CALIBRATION_MS: u64 = 100;

/// Local APIC of the boot processor.
pub struct Lapic {
    regs: NonNull<LapicRegs>,
}

// The register page is per-CPU and there is only one CPU.
unsafe impl Send for Lapic {}
unsafe impl Sync for Lapic {}

impl Lapic {
    /// # Safety
    ///
    /// `base` must point to a mapped Local APIC register page (or memory
    /// laid out like one) that outlives the returned value.
    pub const unsafe fn new(base: *mut u8) -> Self {
        Self {
            regs: unsafe { NonNull::new_unchecked(base.cast()) },
        }
    }

    fn regs(&self) -> &LapicRegs {
        unsafe { self.regs.as_ref() }
    }

    /// Starts counting down from the maximum count.
    pub fn start(&self) {
        self.regs().initial_count.set(COUNT_MAX);
    }

    /// Counts elapsed since [`Lapic::start`].
    pub fn elapsed(&self) -> u32 {
        COUNT_MAX - self.regs().current_count.get()
    }

    pub fn stop(&self) {
        self.regs().initial_count.set(0);
    }

    /// Measures the timer frequency in counts per second.
    ///
    /// `wait` must block for [`CALIBRATION_MS`] milliseconds.
    pub fn calibrate(&self, wait: impl FnOnce()) -> TinyResult<u64> {
        let regs = self.regs();
        regs.divide_config.write(DIVIDE_CONFIG::VALUE::By1);
        regs.lvt_timer
            .write(LVT_TIMER::MASK::Masked + LVT_TIMER::MODE::OneShot);

        self.start();
        wait();
        let elapsed = self.elapsed();
        self.stop();

        let freq = elapsed as u64 * (1000 / CALIBRATION_MS);
        if freq == 0 {
            return Err(TinyError::TimerCalibrationFailed);
        }
        Ok(freq)
    }

    /// Fires `vector` `ticks_per_sec` times per second.
    pub fn start_periodic(&self, freq: u64, ticks_per_sec: u64, vector: u8) {
        let regs = self.regs();
        regs.divide_config.write(DIVIDE_CONFIG::VALUE::By1);
        regs.lvt_timer.write(
            LVT_TIMER::MASK::Unmasked
                + LVT_TIMER::MODE::Periodic
                + LVT_TIMER::VECTOR.val(vector as u32),
        );
        let count = (freq / ticks_per_sec).min(COUNT_MAX as u64) as u32;
        regs.initial_count.set(count);
    }

    /// Acknowledges the interrupt being serviced.
    pub fn notify_end_of_interrupt(&self) {
        self.regs().eoi.set(0);
    }
}

static LAPIC: LazyInit<Lapic> = LazyInit::new();

/// Returns the boot processor's Local APIC.
///
/// # Panics
///
/// Panics if [`init`] has not been called.
pub fn lapic() -> &'static Lapic {
    &LAPIC
}

/// Calibrates the Local APIC timer with `wait_100ms` and starts the periodic
/// scheduling interrupt. Returns the measured frequency.
pub fn init(wait_100ms: impl FnOnce()) -> anyhow::Result<u64> {
    anyhow::ensure!(!LAPIC.is_inited(), "{}", TinyError::AlreadyInitialized);
    let lapic = LAPIC.init_once(unsafe { Lapic::new(LAPIC_BASE as *mut u8) });

    let freq = lapic
        .calibrate(wait_100ms)
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    lapic.start_periodic(freq, TIMER_FREQ, LAPIC_TIMER_VECTOR);

    info!(
        "LAPIC timer: {} counts/s, {} Hz on vector {:#x}",
        freq, TIMER_FREQ, LAPIC_TIMER_VECTOR
    );
    Ok(freq)
}
