//! The register frame stacked by hardware on exception entry.
//!
//! ARMv7-M pushes eight words onto the active stack before vectoring to
//! HardFault, lowest address first:
//!
//! | Offset (words) | Register |
//! |----------------|----------|
//! | 0 | r0 |
//! | 1 | r1 |
//! | 2 | r2 |
//! | 3 | r3 |
//! | 4 | r12 |
//! | 5 | lr (caller's link register) |
//! | 6 | return address (faulting PC) |
//! | 7 | xPSR |
//!
//! An FPU-extended frame appends `s0..s15`, FPSCR and a reserved word after
//! these eight; the basic part is identical.

/// Snapshot of the eight stacked registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(C)]
pub struct RegisterFrame {
    /// Stacked r0.
    pub r0: u32,
    /// Stacked r1.
    pub r1: u32,
    /// Stacked r2.
    pub r2: u32,
    /// Stacked r3.
    pub r3: u32,
    /// Stacked r12.
    pub r12: u32,
    /// Link register of the interrupted code.
    pub lr: u32,
    /// Address of the instruction that was executing when the fault hit.
    pub return_address: u32,
    /// Program status register at the time of the fault.
    pub xpsr: u32,
}

static_assertions::assert_eq_size!(RegisterFrame, [u32; RegisterFrame::FRAME_WORDS]);

impl RegisterFrame {
    /// Number of words in the basic exception frame.
    pub const FRAME_WORDS: usize = 8;

    /// Word offset of the stacked PC.
    pub const RETURN_ADDRESS_OFFSET: usize = 6;

    /// Build a frame from words in stacking order.
    pub const fn from_words(words: [u32; Self::FRAME_WORDS]) -> Self {
        let [r0, r1, r2, r3, r12, lr, return_address, xpsr] = words;
        Self {
            r0,
            r1,
            r2,
            r3,
            r12,
            lr,
            return_address,
            xpsr,
        }
    }

    /// Words in stacking order.
    pub const fn as_words(&self) -> [u32; Self::FRAME_WORDS] {
        [
            self.r0,
            self.r1,
            self.r2,
            self.r3,
            self.r12,
            self.lr,
            self.return_address,
            self.xpsr,
        ]
    }

    /// Read the frame the hardware stacked at `sp`.
    ///
    /// Eight volatile word loads, nothing else: no logging, no calls, no
    /// writes. The loads are volatile so the compiler cannot merge or elide
    /// them when the caller only needs part of the frame.
    ///
    /// # Safety
    ///
    /// `sp` must be word-aligned and point at eight readable words. The
    /// value the trampoline hands over satisfies this by construction: it is
    /// the stack pointer the hardware itself just pushed the frame through.
    pub unsafe fn read_from(sp: *const u32) -> Self {
        // SAFETY: caller guarantees sp..sp+8 words are readable and aligned.
        unsafe {
            Self {
                r0: sp.read_volatile(),
                r1: sp.add(1).read_volatile(),
                r2: sp.add(2).read_volatile(),
                r3: sp.add(3).read_volatile(),
                r12: sp.add(4).read_volatile(),
                lr: sp.add(5).read_volatile(),
                return_address: sp.add(6).read_volatile(),
                xpsr: sp.add(7).read_volatile(),
            }
        }
    }

    /// Active exception number from xPSR (`IPSR` field, bits 8:0).
    ///
    /// Zero when the fault interrupted thread mode.
    pub const fn exception_number(&self) -> u16 {
        (self.xpsr & 0x1FF) as u16
    }

    /// `true` when the Thumb bit (xPSR bit 24) was set.
    ///
    /// A clear T bit in the stacked xPSR is itself the reason for an
    /// `INVSTATE` usage fault.
    pub const fn thumb_state(&self) -> bool {
        self.xpsr & 0x0100_0000 != 0
    }
}
