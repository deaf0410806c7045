//! Boot sequence: report the previous boot's fault, arm the fault traps.
//!
//! Initialization order (MUST be respected):
//!   1. Read and clear the postmortem record, before anything can fault again
//!   2. Enable the divide-by-zero trap (and, optionally, the unaligned trap)
//!   3. Initialise clocks and peripherals (embassy)
//!   4. Arm the independent watchdog
//!   5. Start the heartbeat
//!
//! Step 1 runs first so that a fault during peripheral init cannot
//! overwrite the record before it has been logged.

use postmortem::registers::{CCR_DIV_0_TRP, CCR_UNALIGN_TRP};
use postmortem::{PostmortemRecord, RecordError, RecordMedium, RecordStore};

/// Ordered list of boot sequence steps for documentation and testing.
pub const BOOT_SEQUENCE_STEPS: &[&str] = &[
    "1. Postmortem: report and clear the previous boot's record",
    "2. Fault traps: CCR.DIV_0_TRP (+ CCR.UNALIGN_TRP with `unaligned-trap`)",
    "3. Embassy: clocks and peripherals",
    "4. IWDG: arm watchdog",
    "5. Heartbeat: pet watchdog, publish diagnostic sample",
];

/// Independent watchdog timeout.
///
/// A hung main loop resets the core without a postmortem record; a fault
/// record on the next boot therefore always means a HardFault.
pub const WATCHDOG_TIMEOUT_MS: u32 = 8_000;

/// Watchdog timeout in the unit `IndependentWatchdog::new` takes.
pub const fn watchdog_timeout_us() -> u32 {
    WATCHDOG_TIMEOUT_MS.saturating_mul(1_000)
}

/// Which configurable faults to trap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultTraps {
    /// CCR.DIV_0_TRP: SDIV/UDIV by zero raises a UsageFault instead of
    /// returning 0.
    pub divide_by_zero: bool,
    /// CCR.UNALIGN_TRP: unaligned LDR/STR raise a UsageFault.
    pub unaligned: bool,
}

impl FaultTraps {
    /// Traps selected by the build: divide-by-zero always, unaligned with
    /// the `unaligned-trap` feature.
    pub const BUILD: Self = Self {
        divide_by_zero: true,
        unaligned: cfg!(feature = "unaligned-trap"),
    };

    /// CCR value with the selected trap bits set. Other bits are preserved
    /// and trap bits are never cleared.
    pub const fn apply(self, ccr: u32) -> u32 {
        let mut value = ccr;
        if self.divide_by_zero {
            value |= CCR_DIV_0_TRP;
        }
        if self.unaligned {
            value |= CCR_UNALIGN_TRP;
        }
        value
    }
}

/// Read, log and clear the record left by the previous boot.
///
/// Returns the record when its key matched. A mismatched key means the
/// previous boot ended without a captured fault (or this is a cold power-on)
/// and nothing is reported.
pub fn report_previous_fault<M: RecordMedium>(
    store: &mut RecordStore<M>,
) -> Option<PostmortemRecord> {
    match store.take() {
        Ok(record) => {
            log_record(&record);
            Some(record)
        }
        Err(RecordError::NoRecord(_) | RecordError::UnknownCause(_)) => {
            #[cfg(feature = "defmt")]
            defmt::info!("no postmortem record");
            None
        }
    }
}

#[cfg(feature = "defmt")]
fn log_record(record: &PostmortemRecord) {
    match record.cause_code() {
        Ok(code) => defmt::warn!(
            "previous boot faulted: {=str} (code {=u32:#x}) at pc={=u32:#010x}",
            code.describe(),
            record.cause,
            record.return_address
        ),
        Err(_) => defmt::warn!(
            "previous boot faulted: unknown cause code {=u32:#x} at pc={=u32:#010x}",
            record.cause,
            record.return_address
        ),
    }
    defmt::warn!(
        "  r0={=u32:#010x} r1={=u32:#010x} r2={=u32:#010x} r3={=u32:#010x} sp={=u32:#010x} diag={=i32}",
        record.r0,
        record.r1,
        record.r2,
        record.r3,
        record.stack_pointer,
        record.diagnostic
    );
}

#[cfg(not(feature = "defmt"))]
fn log_record(_record: &PostmortemRecord) {}

// ── Hardware-only init ────────────────────────────────────────────────────────
//
// Actual register writes using `cortex_m` peripheral types. Host tests
// (cargo test -p firmware) never compile or link this module.

#[cfg(feature = "hardware")]
pub mod hardware {
    //! Register-level boot steps. Only compiled with `--features hardware`.

    use super::FaultTraps;

    /// Report the previous boot's fault from the `.postmortem` region.
    ///
    /// Call as the first statement in `main`.
    pub fn report_previous_fault() -> Option<postmortem::PostmortemRecord> {
        // SAFETY: no fault can be in progress while `main` runs, so this is
        // the only live medium over the region; it is dropped on return.
        let mut store =
            postmortem::RecordStore::new(unsafe { crate::hal::NoinitMedium::region() });
        super::report_previous_fault(&mut store)
    }

    /// Set the trap bits in SCB->CCR.
    ///
    /// # Safety rationale
    ///
    /// `cortex_m::Peripherals::steal()` is sound here: called once at boot,
    /// before `embassy_stm32::init()` takes the peripherals, and the stolen
    /// handle is dropped on return.
    pub fn enable_fault_traps(traps: FaultTraps) {
        // SAFETY: boot context, no other owner of the core peripherals yet.
        let cp = unsafe { cortex_m::Peripherals::steal() };
        // SAFETY: only the DIV_0_TRP/UNALIGN_TRP bits change; both take
        // effect for subsequent instructions.
        unsafe { cp.SCB.ccr.modify(|ccr| traps.apply(ccr)) };
        cortex_m::asm::dsb();
        cortex_m::asm::isb();
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use postmortem::mocks::RamMedium;
    use postmortem::{CauseCode, RegisterFrame, RECORD_KEY};

    fn faulted_store() -> RecordStore<RamMedium> {
        let frame = RegisterFrame::from_words([1, 2, 3, 4, 5, 6, 0x0800_1234, 0x0100_0000]);
        let mut store = RecordStore::new(RamMedium::new());
        store.persist(&PostmortemRecord::capture(
            &frame,
            0x2001_F000,
            CauseCode::DivideByZero,
            0,
        ));
        store
    }

    #[test]
    fn test_report_returns_and_clears_record() {
        let mut store = faulted_store();
        let record = report_previous_fault(&mut store).unwrap();
        assert_eq!(record.key, RECORD_KEY);
        assert_eq!(record.return_address, 0x0800_1234);
        assert_eq!(report_previous_fault(&mut store), None);
    }

    #[test]
    fn test_cold_boot_reports_nothing() {
        let mut store = RecordStore::new(RamMedium::filled(0xDEAD_BEEF));
        assert_eq!(report_previous_fault(&mut store), None);
        // A mismatched key is not cleared: nothing was captured.
        assert_eq!(store.read_raw().key, 0xDEAD_BEEF);
    }

    #[test]
    fn test_record_with_unknown_cause_is_still_reported() {
        let mut words = faulted_store().read_raw().as_words();
        words[1] = 0x7F;
        let mut store = RecordStore::new(RamMedium::from_words(words));
        let record = report_previous_fault(&mut store).unwrap();
        assert_eq!(record.cause_code(), Err(RecordError::UnknownCause(0x7F)));
    }

    #[test]
    fn test_traps_set_bits_and_preserve_others() {
        let traps = FaultTraps {
            divide_by_zero: true,
            unaligned: true,
        };
        assert_eq!(traps.apply(0x0000_0200), 0x0000_0218);
        let div_only = FaultTraps {
            divide_by_zero: true,
            unaligned: false,
        };
        assert_eq!(div_only.apply(0), CCR_DIV_0_TRP);
        // Never clears a bit that is already set.
        assert_eq!(div_only.apply(CCR_UNALIGN_TRP), CCR_UNALIGN_TRP | CCR_DIV_0_TRP);
    }

    #[test]
    fn test_build_traps_divide_by_zero() {
        assert!(FaultTraps::BUILD.divide_by_zero);
        assert_eq!(FaultTraps::BUILD.unaligned, cfg!(feature = "unaligned-trap"));
    }

    #[test]
    fn test_watchdog_timeout_units() {
        assert_eq!(watchdog_timeout_us(), 8_000_000);
    }

    #[test]
    fn test_boot_sequence_reports_before_peripheral_init() {
        let steps = BOOT_SEQUENCE_STEPS;
        let report = steps.iter().position(|s| s.contains("Postmortem")).unwrap();
        let traps = steps.iter().position(|s| s.contains("traps")).unwrap();
        let embassy = steps.iter().position(|s| s.contains("Embassy")).unwrap();
        assert!(report < traps && traps < embassy);
    }
}
