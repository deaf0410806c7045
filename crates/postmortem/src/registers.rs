//! Fault register addresses and the capability used to read them.
//!
//! The decoder never dereferences these addresses itself. It asks a
//! [`FaultRegisterSource`] for a [`FaultRegisters`] snapshot, which the
//! firmware satisfies with six volatile loads and tests satisfy with
//! injected values.

use crate::fault_status::{FaultRegisters, FaultStatus};

/// Configurable Fault Status Register (MMFSR | BFSR | UFSR).
pub const CFSR_ADDR: usize = 0xE000_ED28;
/// HardFault Status Register.
pub const HFSR_ADDR: usize = 0xE000_ED2C;
/// Debug Fault Status Register.
pub const DFSR_ADDR: usize = 0xE000_ED30;
/// MemManage Fault Address Register.
pub const MMFAR_ADDR: usize = 0xE000_ED34;
/// BusFault Address Register.
pub const BFAR_ADDR: usize = 0xE000_ED38;
/// Auxiliary Fault Status Register.
pub const AFSR_ADDR: usize = 0xE000_ED3C;

/// Debug Halting Control and Status Register.
pub const DHCSR_ADDR: usize = 0xE000_EDF0;
/// DHCSR.C_DEBUGEN: halting debug enabled, i.e. a probe is attached.
pub const DHCSR_C_DEBUGEN: u32 = 0x0000_0001;

/// Configuration and Control Register.
pub const CCR_ADDR: usize = 0xE000_ED14;
/// CCR.UNALIGN_TRP: trap unaligned word/halfword accesses.
pub const CCR_UNALIGN_TRP: u32 = 0x0000_0008;
/// CCR.DIV_0_TRP: trap SDIV/UDIV by zero.
pub const CCR_DIV_0_TRP: u32 = 0x0000_0010;

/// Source of fault-register snapshots.
///
/// Implementations must perform each read as a single 32-bit load and must
/// not write to any of the registers: reading leaves the latched flags in
/// place for a debugger to inspect.
pub trait FaultRegisterSource {
    /// Read all six fault registers.
    fn read_fault_registers(&self) -> FaultRegisters;

    /// Read and decode.
    fn read_fault_status(&self) -> FaultStatus {
        FaultStatus::decode(self.read_fault_registers())
    }
}

impl<T: FaultRegisterSource + ?Sized> FaultRegisterSource for &T {
    fn read_fault_registers(&self) -> FaultRegisters {
        (**self).read_fault_registers()
    }
}
