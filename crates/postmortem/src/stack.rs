//! Active stack selection for the trap entry.
//!
//! On exception entry an ARMv7-M core pushes the register frame onto
//! whichever stack was in use (MSP in handler/privileged thread mode, PSP for
//! an RTOS task) and loads LR with an `EXC_RETURN` value. Bit 2 of that value
//! (`SPSEL`) records which stack received the frame:
//!
//! | EXC_RETURN   | Return to     | Frame on |
//! |--------------|---------------|----------|
//! | `0xFFFF_FFF1` | Handler mode  | MSP      |
//! | `0xFFFF_FFF9` | Thread mode   | MSP      |
//! | `0xFFFF_FFFD` | Thread mode   | PSP      |
//! | `0xFFFF_FFE1/E9/ED` | same, FPU frame | same |
//!
//! The firmware trampoline performs this exact test in four instructions
//! without touching memory; [`select_stack_pointer`] is the same decision as a
//! pure function so it can be exercised on the host.
//!
//! Reference: ARMv7-M Architecture Reference Manual (DDI0403E) §B1.5.8.

/// `EXC_RETURN` bit 2: frame was stacked on the process stack.
pub const SPSEL_BIT: u32 = 0x0000_0004;

/// `EXC_RETURN` bit 4: clear when the frame includes FP state.
pub const FTYPE_BIT: u32 = 0x0000_0010;

/// Stack pointer that holds the exception frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ActiveStack {
    /// Main stack pointer (MSP).
    Main,
    /// Process stack pointer (PSP).
    Process,
}

/// The `EXC_RETURN` value found in LR on exception entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct ExcReturn(u32);

impl ExcReturn {
    /// Wrap a raw LR value.
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw LR value.
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Stack the hardware pushed the frame onto.
    pub const fn active_stack(self) -> ActiveStack {
        if self.0 & SPSEL_BIT == 0 {
            ActiveStack::Main
        } else {
            ActiveStack::Process
        }
    }

    /// `true` when the stacked frame is the extended (FPU) frame.
    ///
    /// The first eight words are laid out identically in both frame types,
    /// so this only matters to readers that want `s0..s15`.
    pub const fn has_fp_frame(self) -> bool {
        self.0 & FTYPE_BIT == 0
    }
}

/// Choose the stack pointer holding the exception frame.
///
/// Mirrors the trampoline's `tst lr, #4; ite eq; mrseq r0, msp; mrsne r0, psp`.
pub const fn select_stack_pointer(exc_return: ExcReturn, msp: u32, psp: u32) -> u32 {
    match exc_return.active_stack() {
        ActiveStack::Main => msp,
        ActiveStack::Process => psp,
    }
}
