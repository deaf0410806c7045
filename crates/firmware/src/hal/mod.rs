//! Register- and RAM-backed implementations of the postmortem capabilities.
//!
//! | Capability            | Implementation       | Backing                         |
//! |-----------------------|----------------------|---------------------------------|
//! | `FaultRegisterSource` | [`ScbFaultRegisters`] | SCB 0xE000_ED28..=0xE000_ED3C   |
//! | `DebugMonitor`        | [`DcbMonitor`]        | DHCSR.C_DEBUGEN                 |
//! | `RecordMedium`        | [`NoinitMedium`]      | `.postmortem` (NOLOAD) in DTCM  |
//!
//! The two register-backed types only exist with `hardware`; dereferencing
//! the System Control Space on the host faults. `NoinitMedium` is plain
//! volatile word access and is tested on the host over an ordinary buffer.

use core::sync::atomic::{compiler_fence, Ordering};
use postmortem::config::RECORD_REGION_BYTES;
use postmortem::{RecordMedium, RecordSlot};

/// Words reserved for the record region.
pub const RECORD_REGION_WORDS: usize = RECORD_REGION_BYTES / 4;

/// The record region itself. Never read or written except through
/// [`NoinitMedium::region`].
#[cfg(feature = "hardware")]
#[link_section = ".postmortem"]
static mut POSTMORTEM_REGION: core::mem::MaybeUninit<[u32; RECORD_REGION_WORDS]> =
    core::mem::MaybeUninit::uninit();

/// Volatile word storage at a fixed location.
///
/// Every access is a single 32-bit volatile load or store, issued in program
/// order. [`barrier`](RecordMedium::barrier) adds a DSB on hardware so the
/// key store cannot complete ahead of the payload.
#[derive(Debug)]
pub struct NoinitMedium {
    base: *mut u32,
}

impl NoinitMedium {
    /// Medium over `base`.
    ///
    /// # Safety
    ///
    /// `base` must be word-aligned and valid for reads and writes of
    /// [`PostmortemRecord::WORDS`](postmortem::PostmortemRecord::WORDS)
    /// words for the life of the medium, with no other live access.
    pub const unsafe fn new(base: *mut u32) -> Self {
        Self { base }
    }

    /// Medium over the linker-placed `.postmortem` region.
    ///
    /// # Safety
    ///
    /// At most one `NoinitMedium` over the region may be live. Boot code and
    /// the fault path never overlap: the fault path runs at HardFault
    /// priority and never returns.
    #[cfg(feature = "hardware")]
    pub unsafe fn region() -> Self {
        // SAFETY: the static is word-aligned, RECORD_REGION_WORDS long and
        // exclusive per the caller's contract. No reference is formed.
        unsafe { Self::new(core::ptr::addr_of_mut!(POSTMORTEM_REGION).cast::<u32>()) }
    }

    /// Base address.
    pub fn base(&self) -> *const u32 {
        self.base
    }
}

impl RecordMedium for NoinitMedium {
    fn store(&mut self, slot: RecordSlot, value: u32) {
        // SAFETY: slot.index() < PostmortemRecord::WORDS, within the region
        // guaranteed by `new`.
        unsafe { self.base.add(slot.index()).write_volatile(value) }
    }

    fn load(&self, slot: RecordSlot) -> u32 {
        // SAFETY: as in `store`.
        unsafe { self.base.add(slot.index()).read_volatile() }
    }

    fn barrier(&mut self) {
        compiler_fence(Ordering::SeqCst);
        #[cfg(feature = "hardware")]
        cortex_m::asm::dsb();
    }
}

/// Fault status registers read straight from the System Control Block.
#[cfg(feature = "hardware")]
#[derive(Debug, Clone, Copy, Default)]
pub struct ScbFaultRegisters;

#[cfg(feature = "hardware")]
impl ScbFaultRegisters {
    fn read(addr: usize) -> u32 {
        // SAFETY: `addr` is one of the architecturally defined, always
        // readable SCB fault registers. Reading has no side effects.
        unsafe { (addr as *const u32).read_volatile() }
    }
}

#[cfg(feature = "hardware")]
impl postmortem::FaultRegisterSource for ScbFaultRegisters {
    fn read_fault_registers(&self) -> postmortem::FaultRegisters {
        use postmortem::registers::{
            AFSR_ADDR, BFAR_ADDR, CFSR_ADDR, DFSR_ADDR, HFSR_ADDR, MMFAR_ADDR,
        };
        postmortem::FaultRegisters {
            cfsr: Self::read(CFSR_ADDR),
            hfsr: Self::read(HFSR_ADDR),
            dfsr: Self::read(DFSR_ADDR),
            afsr: Self::read(AFSR_ADDR),
            mmfar: Self::read(MMFAR_ADDR),
            bfar: Self::read(BFAR_ADDR),
        }
    }
}

/// Debugger presence from DHCSR.C_DEBUGEN.
#[cfg(feature = "hardware")]
#[derive(Debug, Clone, Copy, Default)]
pub struct DcbMonitor;

#[cfg(feature = "hardware")]
impl postmortem::DebugMonitor for DcbMonitor {
    fn debugger_attached(&self) -> bool {
        cortex_m::peripheral::DCB::is_debugger_attached()
    }
}
