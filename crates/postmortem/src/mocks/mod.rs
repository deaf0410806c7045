//! Mock implementations for testing
//!
//! Host-side stand-ins for the three hardware capabilities the fault path
//! needs: fault registers with injected values, a fixed debugger state and
//! RAM-backed record storage (including one that loses power mid-write).

#![cfg(any(test, feature = "std"))]

use crate::fault_status::FaultRegisters;
use crate::record::{PostmortemRecord, RecordMedium, RecordSlot};
use crate::recovery::DebugMonitor;
use crate::registers::FaultRegisterSource;

/// HFSR.FORCED: every configurable fault reaches HardFault this way when its
/// own handler is disabled.
const HFSR_FORCED: u32 = 0x4000_0000;

/// Fault registers holding injected values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InjectedFaultRegisters {
    regs: FaultRegisters,
}

impl InjectedFaultRegisters {
    /// Inject a full snapshot.
    pub const fn new(regs: FaultRegisters) -> Self {
        Self { regs }
    }

    /// Escalated fault with the given CFSR and address registers.
    pub const fn forced(cfsr: u32, mmfar: u32, bfar: u32) -> Self {
        Self::new(FaultRegisters {
            cfsr,
            hfsr: HFSR_FORCED,
            dfsr: 0,
            afsr: 0,
            mmfar,
            bfar,
        })
    }

    /// UFSR.DIVBYZERO, escalated.
    pub const fn divide_by_zero() -> Self {
        Self::forced(0x0200_0000, 0, 0)
    }

    /// UFSR.UNALIGNED, escalated.
    pub const fn unaligned_access() -> Self {
        Self::forced(0x0100_0000, 0, 0)
    }

    /// UFSR.UNDEFINSTR, escalated.
    pub const fn undefined_instruction() -> Self {
        Self::forced(0x0001_0000, 0, 0)
    }

    /// BFSR.PRECISERR with BFARVALID and `address` in BFAR.
    pub const fn precise_bus_error(address: u32) -> Self {
        Self::forced(0x0000_8200, 0, address)
    }

    /// BFSR.IMPRECISERR. BFAR holds a stale value that must not surface.
    pub const fn imprecise_bus_error() -> Self {
        Self::forced(0x0000_0400, 0, 0xDEAD_BEEF)
    }

    /// MMFSR.DACCVIOL with MMARVALID and `address` in MMFAR.
    pub const fn data_access_violation(address: u32) -> Self {
        Self::forced(0x0000_0082, address, 0)
    }

    /// HFSR.VECTTBL with no configurable status.
    pub const fn vector_table_read() -> Self {
        Self::new(FaultRegisters {
            cfsr: 0,
            hfsr: 0x0000_0002,
            dfsr: 0,
            afsr: 0,
            mmfar: 0,
            bfar: 0,
        })
    }

    /// Injected snapshot.
    pub const fn registers(&self) -> FaultRegisters {
        self.regs
    }
}

impl FaultRegisterSource for InjectedFaultRegisters {
    fn read_fault_registers(&self) -> FaultRegisters {
        self.regs
    }
}

/// Debugger presence fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedMonitor {
    attached: bool,
}

impl FixedMonitor {
    /// A probe is connected.
    pub const fn attached() -> Self {
        Self { attached: true }
    }

    /// Nothing connected.
    pub const fn detached() -> Self {
        Self { attached: false }
    }
}

impl DebugMonitor for FixedMonitor {
    fn debugger_attached(&self) -> bool {
        self.attached
    }
}

/// Capacity of the write log: two full persists plus an invalidate.
pub const WRITE_LOG_CAPACITY: usize = 32;

/// Record storage in an ordinary array, logging every store in order.
#[derive(Debug, Clone)]
pub struct RamMedium {
    words: [u32; PostmortemRecord::WORDS],
    log: heapless::Vec<(RecordSlot, u32), WRITE_LOG_CAPACITY>,
}

impl RamMedium {
    /// Zeroed storage (a clean boot).
    pub const fn new() -> Self {
        Self::filled(0)
    }

    /// Every word set to `pattern` (uninitialised RAM after power-on).
    pub const fn filled(pattern: u32) -> Self {
        Self::from_words([pattern; PostmortemRecord::WORDS])
    }

    /// Storage holding `words`, e.g. a record left by a previous boot.
    pub const fn from_words(words: [u32; PostmortemRecord::WORDS]) -> Self {
        Self {
            words,
            log: heapless::Vec::new(),
        }
    }

    /// Current contents.
    pub const fn words(&self) -> [u32; PostmortemRecord::WORDS] {
        self.words
    }

    /// Stores performed so far, oldest first. Stops growing when full.
    pub fn write_log(&self) -> &[(RecordSlot, u32)] {
        &self.log
    }
}

impl Default for RamMedium {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordMedium for RamMedium {
    fn store(&mut self, slot: RecordSlot, value: u32) {
        if let Some(word) = self.words.get_mut(slot.index()) {
            *word = value;
        }
        let _ = self.log.push((slot, value));
    }

    fn load(&self, slot: RecordSlot) -> u32 {
        self.words.get(slot.index()).copied().unwrap_or(0)
    }
}

/// Storage that loses power after a fixed number of stores.
///
/// Stores past the budget are dropped, as if the core reset between two
/// instructions of the write sequence.
#[derive(Debug, Clone)]
pub struct TornWriteMedium {
    inner: RamMedium,
    remaining: usize,
}

impl TornWriteMedium {
    /// Accept `budget` stores over `initial`, then drop the rest.
    pub const fn new(initial: RamMedium, budget: usize) -> Self {
        Self {
            inner: initial,
            remaining: budget,
        }
    }

    /// Contents as seen after the reset.
    pub const fn words(&self) -> [u32; PostmortemRecord::WORDS] {
        self.inner.words()
    }
}

impl RecordMedium for TornWriteMedium {
    fn store(&mut self, slot: RecordSlot, value: u32) {
        if let Some(remaining) = self.remaining.checked_sub(1) {
            self.remaining = remaining;
            self.inner.store(slot, value);
        }
    }

    fn load(&self, slot: RecordSlot) -> u32 {
        self.inner.load(slot)
    }
}
