//! Fault cause classification.
//!
//! Several CFSR flags can be latched at once (a precise bus error during a
//! divide that also trapped, a stacking error on top of an access
//! violation). [`FaultCause::classify`] picks exactly one cause with a fixed
//! precedence:
//!
//! 1. UsageFault: DIVBYZERO, UNALIGNED, UNDEFINSTR, INVSTATE, INVPC, NOCP
//! 2. BusFault: PRECISERR, IMPRECISERR, IBUSERR, then stacking errors
//! 3. MemManage: DACCVIOL, IACCVIOL, then stacking errors
//! 4. HFSR (VECTTBL, FORCED, DEBUGEVT): [`FaultCause::UnclassifiedHardFault`].
//!    Reserved CFSR bits and the address-valid flags alone land here too.
//! 5. nothing recognisable: [`FaultCause::Unknown`]
//!
//! Usage faults come first because they point straight at a firmware bug at
//! the stacked PC.

use crate::fault_status::{
    BusFaultFlags, FaultAddress, FaultStatus, HardFaultFlags, MemManageFlags, UsageFaultFlags,
};
use crate::record::RecordError;

/// Kind of access that violated the MPU / default memory map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MemoryAccess {
    /// Load or store.
    Data,
    /// Instruction fetch.
    Instruction,
}

/// Sub-system that reported an exception stacking/unstacking error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StackingSource {
    /// BusFault STKERR / UNSTKERR / LSPERR.
    Bus,
    /// MemManage MSTKERR / MUNSTKERR / MLSPERR.
    MemManage,
}

/// Reason recorded in HFSR when no configurable fault status is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HardFaultReason {
    /// Vector table read failed.
    VectorTableRead,
    /// Escalated configurable fault.
    Forced,
    /// Debug event with halting debug disabled.
    DebugEvent,
}

/// Classified cause of a HardFault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FaultCause {
    /// Integer division by zero (CCR.DIV_0_TRP).
    DivideByZero,
    /// Unaligned load/store (CCR.UNALIGN_TRP, or LDM/STRD on any alignment).
    UnalignedAccess,
    /// Undefined instruction.
    UndefinedInstruction,
    /// Invalid execution state, typically a branch to an even address.
    InvalidState,
    /// Invalid EXC_RETURN loaded into the PC.
    InvalidExceptionReturn,
    /// Coprocessor (FPU) instruction while the coprocessor is disabled.
    CoprocessorUnavailable,
    /// Bus error on a data access.
    BusErrorOnData {
        /// PRECISERR (`true`) or IMPRECISERR (`false`).
        precise: bool,
        /// BFAR, when BFARVALID was set.
        address: FaultAddress,
    },
    /// Bus error on instruction prefetch.
    BusErrorOnInstructionFetch,
    /// Stacking or unstacking the exception frame failed, usually a stack
    /// overflow.
    ExceptionStackingFault {
        /// Which status register reported it.
        source: StackingSource,
    },
    /// MPU or default-map violation.
    MemoryAccessViolation {
        /// Data or instruction access.
        access: MemoryAccess,
        /// MMFAR, when MMARVALID was set.
        address: FaultAddress,
    },
    /// HardFault with no configurable fault status.
    UnclassifiedHardFault {
        /// First HFSR reason found.
        reason: HardFaultReason,
    },
    /// No recognised status bit at all.
    Unknown,
}

impl FaultCause {
    /// Classify a decoded fault status. First match wins.
    pub fn classify(status: &FaultStatus) -> Self {
        if let Some(cause) = Self::from_usage(status.usage) {
            return cause;
        }
        if let Some(cause) = Self::from_bus(status) {
            return cause;
        }
        if let Some(cause) = Self::from_mem_manage(status) {
            return cause;
        }
        Self::from_hard_fault(status.hard).unwrap_or(Self::Unknown)
    }

    fn from_usage(usage: UsageFaultFlags) -> Option<Self> {
        const ORDER: [(UsageFaultFlags, FaultCause); 6] = [
            (UsageFaultFlags::DIVBYZERO, FaultCause::DivideByZero),
            (UsageFaultFlags::UNALIGNED, FaultCause::UnalignedAccess),
            (UsageFaultFlags::UNDEFINSTR, FaultCause::UndefinedInstruction),
            (UsageFaultFlags::INVSTATE, FaultCause::InvalidState),
            (UsageFaultFlags::INVPC, FaultCause::InvalidExceptionReturn),
            (UsageFaultFlags::NOCP, FaultCause::CoprocessorUnavailable),
        ];
        ORDER
            .iter()
            .find(|(flag, _)| usage.contains(*flag))
            .map(|(_, cause)| *cause)
    }

    fn from_bus(status: &FaultStatus) -> Option<Self> {
        let bus = status.bus;
        if bus.contains(BusFaultFlags::PRECISERR) {
            Some(Self::BusErrorOnData {
                precise: true,
                address: status.bus_fault_address(),
            })
        } else if bus.contains(BusFaultFlags::IMPRECISERR) {
            Some(Self::BusErrorOnData {
                precise: false,
                address: status.bus_fault_address(),
            })
        } else if bus.contains(BusFaultFlags::IBUSERR) {
            Some(Self::BusErrorOnInstructionFetch)
        } else if bus.intersects(
            BusFaultFlags::STKERR
                .union(BusFaultFlags::UNSTKERR)
                .union(BusFaultFlags::LSPERR),
        ) {
            Some(Self::ExceptionStackingFault {
                source: StackingSource::Bus,
            })
        } else {
            None
        }
    }

    fn from_mem_manage(status: &FaultStatus) -> Option<Self> {
        let mm = status.mem_manage;
        if mm.contains(MemManageFlags::DACCVIOL) {
            Some(Self::MemoryAccessViolation {
                access: MemoryAccess::Data,
                address: status.memory_fault_address(),
            })
        } else if mm.contains(MemManageFlags::IACCVIOL) {
            Some(Self::MemoryAccessViolation {
                access: MemoryAccess::Instruction,
                address: status.memory_fault_address(),
            })
        } else if mm.intersects(
            MemManageFlags::MSTKERR
                .union(MemManageFlags::MUNSTKERR)
                .union(MemManageFlags::MLSPERR),
        ) {
            Some(Self::ExceptionStackingFault {
                source: StackingSource::MemManage,
            })
        } else {
            None
        }
    }

    fn from_hard_fault(hard: HardFaultFlags) -> Option<Self> {
        let reason = if hard.contains(HardFaultFlags::VECTTBL) {
            HardFaultReason::VectorTableRead
        } else if hard.contains(HardFaultFlags::FORCED) {
            HardFaultReason::Forced
        } else if hard.contains(HardFaultFlags::DEBUGEVT) {
            HardFaultReason::DebugEvent
        } else {
            return None;
        };
        Some(Self::UnclassifiedHardFault { reason })
    }

    /// Faulting data address, when the cause carries one and it was valid.
    pub const fn address(&self) -> FaultAddress {
        match self {
            Self::BusErrorOnData { address, .. } | Self::MemoryAccessViolation { address, .. } => {
                *address
            }
            _ => FaultAddress::Unknown,
        }
    }

    /// Stable code persisted in the postmortem record.
    pub const fn code(&self) -> CauseCode {
        match self {
            Self::DivideByZero => CauseCode::DivideByZero,
            Self::UnalignedAccess => CauseCode::UnalignedAccess,
            Self::UndefinedInstruction => CauseCode::UndefinedInstruction,
            Self::InvalidState => CauseCode::InvalidState,
            Self::InvalidExceptionReturn => CauseCode::InvalidExceptionReturn,
            Self::CoprocessorUnavailable => CauseCode::CoprocessorUnavailable,
            Self::BusErrorOnData { precise: true, .. } => CauseCode::PreciseDataBusError,
            Self::BusErrorOnData { precise: false, .. } => CauseCode::ImpreciseDataBusError,
            Self::BusErrorOnInstructionFetch => CauseCode::InstructionBusError,
            Self::ExceptionStackingFault {
                source: StackingSource::Bus,
            } => CauseCode::BusStackingError,
            Self::MemoryAccessViolation {
                access: MemoryAccess::Data,
                ..
            } => CauseCode::DataAccessViolation,
            Self::MemoryAccessViolation {
                access: MemoryAccess::Instruction,
                ..
            } => CauseCode::InstructionAccessViolation,
            Self::ExceptionStackingFault {
                source: StackingSource::MemManage,
            } => CauseCode::MemManageStackingError,
            Self::UnclassifiedHardFault { .. } => CauseCode::UnclassifiedHardFault,
            Self::Unknown => CauseCode::Unknown,
        }
    }

    /// Short name for logs.
    pub const fn name(&self) -> &'static str {
        self.code().describe()
    }
}

/// Cause as stored in word 1 of the postmortem record.
///
/// Values are part of the persisted format; never renumber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum CauseCode {
    /// No recognised status bit.
    Unknown = 0x00,
    /// DIVBYZERO.
    DivideByZero = 0x01,
    /// UNALIGNED.
    UnalignedAccess = 0x02,
    /// UNDEFINSTR.
    UndefinedInstruction = 0x03,
    /// INVSTATE.
    InvalidState = 0x04,
    /// INVPC.
    InvalidExceptionReturn = 0x05,
    /// NOCP.
    CoprocessorUnavailable = 0x06,
    /// PRECISERR.
    PreciseDataBusError = 0x10,
    /// IMPRECISERR.
    ImpreciseDataBusError = 0x11,
    /// IBUSERR.
    InstructionBusError = 0x12,
    /// STKERR / UNSTKERR / LSPERR.
    BusStackingError = 0x13,
    /// DACCVIOL.
    DataAccessViolation = 0x20,
    /// IACCVIOL.
    InstructionAccessViolation = 0x21,
    /// MSTKERR / MUNSTKERR / MLSPERR.
    MemManageStackingError = 0x22,
    /// HFSR reason only.
    UnclassifiedHardFault = 0x30,
}

impl CauseCode {
    /// Every defined code, in numeric order.
    pub const ALL: [CauseCode; 15] = [
        CauseCode::Unknown,
        CauseCode::DivideByZero,
        CauseCode::UnalignedAccess,
        CauseCode::UndefinedInstruction,
        CauseCode::InvalidState,
        CauseCode::InvalidExceptionReturn,
        CauseCode::CoprocessorUnavailable,
        CauseCode::PreciseDataBusError,
        CauseCode::ImpreciseDataBusError,
        CauseCode::InstructionBusError,
        CauseCode::BusStackingError,
        CauseCode::DataAccessViolation,
        CauseCode::InstructionAccessViolation,
        CauseCode::MemManageStackingError,
        CauseCode::UnclassifiedHardFault,
    ];

    /// Raw persisted value.
    pub const fn raw(self) -> u32 {
        self as u32
    }

    /// Decode a persisted value.
    pub fn from_raw(raw: u32) -> Result<Self, RecordError> {
        Self::ALL
            .iter()
            .copied()
            .find(|code| code.raw() == raw)
            .ok_or(RecordError::UnknownCause(raw))
    }

    /// Human-readable description.
    pub const fn describe(self) -> &'static str {
        match self {
            Self::Unknown => "unknown fault",
            Self::DivideByZero => "divide by zero",
            Self::UnalignedAccess => "unaligned access",
            Self::UndefinedInstruction => "undefined instruction",
            Self::InvalidState => "invalid execution state",
            Self::InvalidExceptionReturn => "invalid exception return",
            Self::CoprocessorUnavailable => "coprocessor unavailable",
            Self::PreciseDataBusError => "precise data bus error",
            Self::ImpreciseDataBusError => "imprecise data bus error",
            Self::InstructionBusError => "bus error on instruction fetch",
            Self::BusStackingError => "bus error while stacking exception frame",
            Self::DataAccessViolation => "data access violation",
            Self::InstructionAccessViolation => "instruction access violation",
            Self::MemManageStackingError => "access violation while stacking exception frame",
            Self::UnclassifiedHardFault => "hard fault without detail",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fault_status::FaultRegisters;

    fn classify(cfsr: u32, hfsr: u32) -> FaultCause {
        let status = FaultStatus::decode(FaultRegisters {
            cfsr,
            hfsr,
            mmfar: 0x2000_1000,
            bfar: 0x6000_0000,
            ..FaultRegisters::default()
        });
        FaultCause::classify(&status)
    }

    #[test]
    fn test_usage_flags_map_to_their_cause() {
        assert_eq!(classify(0x0200_0000, 0), FaultCause::DivideByZero);
        assert_eq!(classify(0x0100_0000, 0), FaultCause::UnalignedAccess);
        assert_eq!(classify(0x0001_0000, 0), FaultCause::UndefinedInstruction);
        assert_eq!(classify(0x0002_0000, 0), FaultCause::InvalidState);
        assert_eq!(classify(0x0004_0000, 0), FaultCause::InvalidExceptionReturn);
        assert_eq!(classify(0x0008_0000, 0), FaultCause::CoprocessorUnavailable);
    }

    #[test]
    fn test_divide_by_zero_beats_unaligned() {
        assert_eq!(classify(0x0300_0000, 0), FaultCause::DivideByZero);
    }

    #[test]
    fn test_precise_bus_error_with_valid_address() {
        assert_eq!(
            classify(0x0000_8200, 0x4000_0000),
            FaultCause::BusErrorOnData {
                precise: true,
                address: FaultAddress::Valid(0x6000_0000),
            }
        );
    }

    #[test]
    fn test_imprecise_bus_error_address_unknown() {
        assert_eq!(
            classify(0x0000_0400, 0x4000_0000),
            FaultCause::BusErrorOnData {
                precise: false,
                address: FaultAddress::Unknown,
            }
        );
    }

    #[test]
    fn test_instruction_fetch_bus_error() {
        assert_eq!(classify(0x0000_0100, 0), FaultCause::BusErrorOnInstructionFetch);
    }

    #[test]
    fn test_stacking_errors() {
        assert_eq!(
            classify(0x0000_1000, 0),
            FaultCause::ExceptionStackingFault {
                source: StackingSource::Bus
            }
        );
        assert_eq!(
            classify(0x0000_0010, 0),
            FaultCause::ExceptionStackingFault {
                source: StackingSource::MemManage
            }
        );
    }

    #[test]
    fn test_memory_violations() {
        assert_eq!(
            classify(0x0000_0082, 0),
            FaultCause::MemoryAccessViolation {
                access: MemoryAccess::Data,
                address: FaultAddress::Valid(0x2000_1000),
            }
        );
        assert_eq!(
            classify(0x0000_0001, 0),
            FaultCause::MemoryAccessViolation {
                access: MemoryAccess::Instruction,
                address: FaultAddress::Unknown,
            }
        );
    }

    #[test]
    fn test_hfsr_only_fallbacks() {
        assert_eq!(
            classify(0, 0x0000_0002),
            FaultCause::UnclassifiedHardFault {
                reason: HardFaultReason::VectorTableRead
            }
        );
        assert_eq!(
            classify(0, 0x4000_0000),
            FaultCause::UnclassifiedHardFault {
                reason: HardFaultReason::Forced
            }
        );
        assert_eq!(
            classify(0, 0x8000_0000),
            FaultCause::UnclassifiedHardFault {
                reason: HardFaultReason::DebugEvent
            }
        );
        assert_eq!(classify(0, 0), FaultCause::Unknown);
    }

    #[test]
    fn test_valid_bit_alone_falls_through_to_hfsr() {
        assert_eq!(
            classify(0x0000_8080, 0x4000_0000),
            FaultCause::UnclassifiedHardFault {
                reason: HardFaultReason::Forced
            }
        );
    }

    #[test]
    fn test_reserved_cfsr_bits_fall_through_to_hfsr() {
        for cfsr in [0x0010_0000, 0x0000_0004, 0x0000_4000, 0x0010_8084] {
            assert_eq!(
                classify(cfsr, 0x4000_0000),
                FaultCause::UnclassifiedHardFault {
                    reason: HardFaultReason::Forced
                },
                "cfsr {cfsr:#010x}"
            );
        }
        assert_eq!(
            classify(0x0000_0004, 0x0000_0002),
            FaultCause::UnclassifiedHardFault {
                reason: HardFaultReason::VectorTableRead
            }
        );
        assert_eq!(classify(0x0010_0000, 0), FaultCause::Unknown);
    }

    #[test]
    fn test_cause_codes_roundtrip_through_raw() {
        for code in CauseCode::ALL {
            assert_eq!(CauseCode::from_raw(code.raw()), Ok(code));
        }
        assert_eq!(
            CauseCode::from_raw(0xFF),
            Err(RecordError::UnknownCause(0xFF))
        );
    }

    #[test]
    fn test_address_accessor() {
        assert_eq!(
            classify(0x0000_8200, 0).address(),
            FaultAddress::Valid(0x6000_0000)
        );
        assert_eq!(classify(0x0200_0000, 0).address(), FaultAddress::Unknown);
    }
}
