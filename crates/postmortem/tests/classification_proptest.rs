//! Property-based tests for frame extraction, cause classification and the
//! recovery policy.

#![allow(clippy::arithmetic_side_effects)]
#![allow(clippy::indexing_slicing)]

use postmortem::mocks::{FixedMonitor, InjectedFaultRegisters, RamMedium};
use postmortem::{
    capture, CaptureConfig, FaultAddress, FaultCause, FaultRegisters, FaultStatus,
    RecordStore, RegisterFrame, Terminal,
};
use proptest::prelude::*;

/// Every recognised CFSR bit with the cause it alone must produce.
const CFSR_SINGLE_FLAGS: [(u32, &str); 17] = [
    (1 << 25, "divide by zero"),
    (1 << 24, "unaligned access"),
    (1 << 16, "undefined instruction"),
    (1 << 17, "invalid execution state"),
    (1 << 18, "invalid exception return"),
    (1 << 19, "coprocessor unavailable"),
    (1 << 9, "precise data bus error"),
    (1 << 10, "imprecise data bus error"),
    (1 << 8, "bus error on instruction fetch"),
    (1 << 11, "bus error while stacking exception frame"),
    (1 << 12, "bus error while stacking exception frame"),
    (1 << 13, "bus error while stacking exception frame"),
    (1 << 1, "data access violation"),
    (1 << 0, "instruction access violation"),
    (1 << 3, "access violation while stacking exception frame"),
    (1 << 4, "access violation while stacking exception frame"),
    (1 << 5, "access violation while stacking exception frame"),
];

const USAGE_MASK: u32 = 0x030F_0000;
const BUS_MASK: u32 = 0x0000_3F00;
const MEM_MASK: u32 = 0x0000_003B;

fn classify(cfsr: u32, hfsr: u32, mmfar: u32, bfar: u32) -> FaultCause {
    FaultCause::classify(&FaultStatus::decode(FaultRegisters {
        cfsr,
        hfsr,
        mmfar,
        bfar,
        ..FaultRegisters::default()
    }))
}

fn is_usage(cause: FaultCause) -> bool {
    matches!(
        cause,
        FaultCause::DivideByZero
            | FaultCause::UnalignedAccess
            | FaultCause::UndefinedInstruction
            | FaultCause::InvalidState
            | FaultCause::InvalidExceptionReturn
            | FaultCause::CoprocessorUnavailable
    )
}

fn is_bus(cause: FaultCause) -> bool {
    matches!(
        cause,
        FaultCause::BusErrorOnData { .. }
            | FaultCause::BusErrorOnInstructionFetch
            | FaultCause::ExceptionStackingFault {
                source: postmortem::StackingSource::Bus
            }
    )
}

proptest! {
    /// The extractor returns the stacked words unchanged, position by position.
    #[test]
    fn frame_extraction_is_positional(words in proptest::array::uniform8(any::<u32>())) {
        // SAFETY: `words` is eight readable u32s.
        let frame = unsafe { RegisterFrame::read_from(words.as_ptr()) };
        prop_assert_eq!(frame.as_words(), words);
        prop_assert_eq!(frame.return_address, words[RegisterFrame::RETURN_ADDRESS_OFFSET]);
    }

    /// A single recognised flag classifies to its own cause, whatever HFSR says.
    #[test]
    fn single_flag_maps_to_its_cause(
        index in 0..CFSR_SINGLE_FLAGS.len(),
        hfsr in any::<u32>(),
        mmfar in any::<u32>(),
        bfar in any::<u32>(),
    ) {
        let (bit, expected) = CFSR_SINGLE_FLAGS[index];
        prop_assert_eq!(classify(bit, hfsr, mmfar, bfar).name(), expected);
    }

    /// Usage beats bus beats memory management.
    #[test]
    fn precedence_is_usage_bus_memory(
        usage in any::<u32>(),
        bus in any::<u32>(),
        mem in any::<u32>(),
    ) {
        let usage = usage & USAGE_MASK;
        let bus = bus & BUS_MASK;
        let mem = mem & MEM_MASK;
        let cause = classify(usage | bus | mem, 0x4000_0000, 0, 0);

        if usage != 0 {
            prop_assert!(is_usage(cause));
            prop_assert_eq!(cause, classify(usage, 0x4000_0000, 0, 0));
        } else if bus != 0 {
            prop_assert!(is_bus(cause));
            prop_assert_eq!(cause, classify(bus, 0x4000_0000, 0, 0));
        } else if mem != 0 {
            prop_assert_eq!(cause, classify(mem, 0x4000_0000, 0, 0));
        } else {
            prop_assert!(matches!(cause, FaultCause::UnclassifiedHardFault { .. }), "expected UnclassifiedHardFault");
        }
    }

    /// Without BFARVALID/MMARVALID the address is never the raw register.
    #[test]
    fn invalid_address_registers_never_surface(
        cfsr in any::<u32>(),
        mmfar in any::<u32>(),
        bfar in any::<u32>(),
    ) {
        // Clear MMARVALID (bit 7) and BFARVALID (bit 15).
        let cfsr = cfsr & !0x0000_8080;
        let status = FaultStatus::decode(FaultRegisters { cfsr, mmfar, bfar, ..FaultRegisters::default() });
        prop_assert_eq!(status.memory_fault_address(), FaultAddress::Unknown);
        prop_assert_eq!(status.bus_fault_address(), FaultAddress::Unknown);
        prop_assert_eq!(FaultCause::classify(&status).address(), FaultAddress::Unknown);
    }

    /// Halt with a debugger, reset without, whatever the cause.
    #[test]
    fn terminal_depends_only_on_debugger(
        cfsr in any::<u32>(),
        hfsr in any::<u32>(),
        attached in any::<bool>(),
        persist in any::<bool>(),
    ) {
        let stack = [0u32, 1, 2, 3, 12, 0x0800_0001, 0x0800_1000, 0x0100_0000];
        let regs = InjectedFaultRegisters::new(FaultRegisters { cfsr, hfsr, ..FaultRegisters::default() });
        let monitor = if attached { FixedMonitor::attached() } else { FixedMonitor::detached() };
        let mut store = RecordStore::new(RamMedium::new());
        // SAFETY: `stack` is eight readable u32s.
        let outcome = unsafe {
            capture(stack.as_ptr(), 0xFFFF_FFF1, &regs, &monitor, &mut store, 0, CaptureConfig { persist })
        };
        let expected = if attached { Terminal::Halted } else { Terminal::Reset };
        prop_assert_eq!(outcome.terminal, expected);
        prop_assert_eq!(store.load().is_ok(), persist);
    }
}
