//! HardFault entry for the STM32H743 firmware.
//!
//! Every fault ends up here. The configurable fault handlers (MemManage,
//! BusFault, UsageFault) stay disabled in SHCSR, so the processor escalates
//! them to HardFault with HFSR.FORCED set and the original reason latched
//! in CFSR.
//!
//! # Entry sequence
//!
//! ```text
//! HardFault (asm, no stack use)
//!   tst lr, #4            EXC_RETURN.SPSEL
//!   mrseq r0, msp         frame on the main stack
//!   mrsne r0, psp         frame on the process stack
//!   mov r1, lr            EXC_RETURN
//!   b postmortem_capture
//!       ↓
//! postmortem_capture(sp, exc_return) -> !
//!   postmortem::capture   frame, status, cause, record
//!   exit(terminal)        bkpt loop (debugger) or SYSRESETREQ
//! ```
//!
//! The stack pointer is selected before any Rust code runs: a compiled
//! prologue would move SP before the frame address is taken.
//!
//! # Faults this path cannot record
//!
//! The capture code runs on the stack that faulted. Two cases therefore end
//! in lockup instead of a record, and the core comes back only through the
//! independent watchdog reset, with no postmortem record on the next boot:
//!
//! - A fault inside the fault path itself (HardFault while in HardFault).
//! - A main stack overflow caught by flip-link. The frame push on exception
//!   entry runs off the bottom of RAM (BFSR.STKERR), so the MSP handed to the
//!   capture code points at unmapped memory, and the first stacked-frame load
//!   or prologue push faults again.
//!
//! # Hardware-only handler
//!
//! The trampoline and the capture entry need ARM target intrinsics and are
//! gated behind `#[cfg(feature = "hardware")]`. The module itself (and
//! `HARDFAULT_DEFINED`) compiles unconditionally so host tests can verify
//! the module exists without needing an ARM toolchain.

/// Marker constant, checked by the architecture tests.
pub const HARDFAULT_DEFINED: bool = true;

/// Symbol the trampoline branches to.
pub const CAPTURE_SYMBOL: &str = "postmortem_capture";

/// Sample stored in the record's diagnostic word.
///
/// The application publishes here during normal operation; the fault path
/// only reads it.
pub static DIAGNOSTIC: postmortem::DiagnosticCell = postmortem::DiagnosticCell::new();

/// Capture behaviour selected at build time by the `persist` feature.
pub const CAPTURE_CONFIG: postmortem::CaptureConfig = if cfg!(feature = "persist") {
    postmortem::CaptureConfig::DEFAULT
} else {
    postmortem::CaptureConfig::NO_PERSIST
};

#[cfg(feature = "hardware")]
core::arch::global_asm!(
    ".section .HardFault.user, \"ax\"",
    ".global HardFault",
    ".type HardFault,%function",
    ".thumb_func",
    "HardFault:",
    "    tst lr, #4",
    "    ite eq",
    "    mrseq r0, msp",
    "    mrsne r0, psp",
    "    mov r1, lr",
    "    b postmortem_capture",
    ".size HardFault, . - HardFault",
);

/// Fault path proper. Entered only from the `HardFault` trampoline.
///
/// # Safety
///
/// `sp` must be the stack pointer that was active when the fault was taken
/// (eight stacked words) and `exc_return` the EXC_RETURN value from LR.
#[cfg(feature = "hardware")]
#[no_mangle]
unsafe extern "C" fn postmortem_capture(sp: *const u32, exc_return: u32) -> ! {
    use crate::hal::{DcbMonitor, NoinitMedium, ScbFaultRegisters};

    // SAFETY: the fault path is the only code running; boot code has
    // released its medium long before any fault can be taken.
    let mut store = postmortem::RecordStore::new(unsafe { NoinitMedium::region() });
    // SAFETY: the trampoline passes the stack pointer the frame was pushed to.
    let outcome = unsafe {
        postmortem::capture(
            sp,
            exc_return,
            &ScbFaultRegisters,
            &DcbMonitor,
            &mut store,
            DIAGNOSTIC.sample(),
            CAPTURE_CONFIG,
        )
    };
    exit(outcome.terminal)
}

/// Leave the fault path.
///
/// `Halted`: stop at a breakpoint. Resuming from the debugger hits the next
/// one, never the faulting code. `Reset`: request a system reset.
#[cfg(feature = "hardware")]
pub fn exit(terminal: postmortem::Terminal) -> ! {
    match terminal {
        postmortem::Terminal::Halted => loop {
            cortex_m::asm::bkpt();
        },
        postmortem::Terminal::Reset => cortex_m::peripheral::SCB::sys_reset(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_config_follows_persist_feature() {
        assert_eq!(CAPTURE_CONFIG.persist, cfg!(feature = "persist"));
    }

    #[test]
    fn test_diagnostic_cell_is_shared() {
        DIAGNOSTIC.publish(4_100);
        assert_eq!(DIAGNOSTIC.sample(), 4_100);
    }
}
