//! Decoded view of the System Control Block fault-status registers.
//!
//! # Register map (ARMv7-M, DDI0403E §B3.2.15–§B3.2.18)
//!
//! | Register | Address       | Contents |
//! |----------|---------------|----------|
//! | CFSR     | `0xE000_ED28` | MMFSR [7:0], BFSR [15:8], UFSR [31:16] |
//! | HFSR     | `0xE000_ED2C` | why the fault reached HardFault |
//! | DFSR     | `0xE000_ED30` | debug event cause |
//! | MMFAR    | `0xE000_ED34` | data address of a MemManage fault |
//! | BFAR     | `0xE000_ED38` | data address of a BusFault |
//! | AFSR     | `0xE000_ED3C` | implementation defined |
//!
//! MMFAR and BFAR hold a meaningful value only while MMARVALID / BFARVALID
//! is set. On several cores the two registers share storage, so a stale
//! value is the norm rather than the exception. [`FaultStatus`] therefore
//! never exposes them directly, only through [`FaultAddress`].

use bitflags::bitflags;

bitflags! {
    /// MemManage fault status (CFSR bits 7:0).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MemManageFlags: u8 {
        /// Instruction fetch from a location that does not permit execution.
        const IACCVIOL = 0x01;
        /// Data access to a location that does not permit the operation.
        const DACCVIOL = 0x02;
        /// Unstacking on exception return caused an access violation.
        const MUNSTKERR = 0x08;
        /// Stacking on exception entry caused an access violation.
        const MSTKERR = 0x10;
        /// Lazy floating-point state preservation caused an access violation.
        const MLSPERR = 0x20;
        /// MMFAR holds the faulting address.
        const MMARVALID = 0x80;
    }
}

bitflags! {
    /// BusFault status (CFSR bits 15:8).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BusFaultFlags: u8 {
        /// Bus error on instruction prefetch.
        const IBUSERR = 0x01;
        /// Precise data bus error; the stacked PC is the faulting instruction.
        const PRECISERR = 0x02;
        /// Imprecise data bus error; the stacked PC is somewhere after it.
        const IMPRECISERR = 0x04;
        /// Unstacking on exception return caused a bus error.
        const UNSTKERR = 0x08;
        /// Stacking on exception entry caused a bus error.
        const STKERR = 0x10;
        /// Lazy floating-point state preservation caused a bus error.
        const LSPERR = 0x20;
        /// BFAR holds the faulting address.
        const BFARVALID = 0x80;
    }
}

bitflags! {
    /// UsageFault status (CFSR bits 31:16).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct UsageFaultFlags: u16 {
        /// Undefined instruction.
        const UNDEFINSTR = 0x0001;
        /// Invalid execution state (EPSR.T clear, or bad IT bits).
        const INVSTATE = 0x0002;
        /// Invalid EXC_RETURN value loaded into the PC.
        const INVPC = 0x0004;
        /// Coprocessor instruction with the coprocessor disabled or absent.
        const NOCP = 0x0008;
        /// Unaligned access trapped (CCR.UNALIGN_TRP set).
        const UNALIGNED = 0x0100;
        /// Integer divide by zero trapped (CCR.DIV_0_TRP set).
        const DIVBYZERO = 0x0200;
    }
}

bitflags! {
    /// HardFault status (HFSR).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct HardFaultFlags: u32 {
        /// Bus error while reading the vector table.
        const VECTTBL = 0x0000_0002;
        /// A configurable fault escalated because its handler was disabled
        /// or could not run.
        const FORCED = 0x4000_0000;
        /// Debug event while halting debug was disabled.
        const DEBUGEVT = 0x8000_0000;
    }
}

bitflags! {
    /// Debug fault status (DFSR).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DebugFaultFlags: u32 {
        /// Halt request.
        const HALTED = 0x01;
        /// BKPT instruction or breakpoint match.
        const BKPT = 0x02;
        /// DWT watchpoint match.
        const DWTTRAP = 0x04;
        /// Vector catch.
        const VCATCH = 0x08;
        /// External debug request.
        const EXTERNAL = 0x10;
    }
}

/// BusFault flags that name a reason (everything but BFARVALID).
const BUS_REASONS: BusFaultFlags = BusFaultFlags::all().difference(BusFaultFlags::BFARVALID);

/// MemManage flags that name a reason (everything but MMARVALID).
const MEM_MANAGE_REASONS: MemManageFlags =
    MemManageFlags::all().difference(MemManageFlags::MMARVALID);

/// Fault address qualified by its validity flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FaultAddress {
    /// The address register held a value latched for this fault.
    Valid(u32),
    /// The validity flag was clear; the register content is undefined.
    Unknown,
}

impl FaultAddress {
    /// Qualify `raw` by `valid`.
    pub const fn qualified(valid: bool, raw: u32) -> Self {
        if valid {
            Self::Valid(raw)
        } else {
            Self::Unknown
        }
    }

    /// The address, if known.
    pub const fn get(self) -> Option<u32> {
        match self {
            Self::Valid(addr) => Some(addr),
            Self::Unknown => None,
        }
    }

    /// `true` when the address is known.
    pub const fn is_valid(self) -> bool {
        matches!(self, Self::Valid(_))
    }
}

/// Raw contents of the six fault registers, exactly as read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FaultRegisters {
    /// Configurable Fault Status Register.
    pub cfsr: u32,
    /// HardFault Status Register.
    pub hfsr: u32,
    /// Debug Fault Status Register.
    pub dfsr: u32,
    /// Auxiliary Fault Status Register.
    pub afsr: u32,
    /// MemManage Fault Address Register.
    pub mmfar: u32,
    /// BusFault Address Register.
    pub bfar: u32,
}

/// Decoded fault status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultStatus {
    /// MemManage sub-status.
    pub mem_manage: MemManageFlags,
    /// BusFault sub-status.
    pub bus: BusFaultFlags,
    /// UsageFault sub-status.
    pub usage: UsageFaultFlags,
    /// HardFault summary.
    pub hard: HardFaultFlags,
    /// Debug fault summary.
    pub debug: DebugFaultFlags,
    /// AFSR, carried verbatim.
    pub auxiliary: u32,
    mmfar: u32,
    bfar: u32,
}

impl FaultStatus {
    /// Split the raw registers into their flag sets.
    ///
    /// Unknown bits are retained so [`FaultStatus::cfsr`] re-packs to the
    /// value that was read.
    pub const fn decode(regs: FaultRegisters) -> Self {
        Self {
            mem_manage: MemManageFlags::from_bits_retain((regs.cfsr & 0xFF) as u8),
            bus: BusFaultFlags::from_bits_retain(((regs.cfsr >> 8) & 0xFF) as u8),
            usage: UsageFaultFlags::from_bits_retain((regs.cfsr >> 16) as u16),
            hard: HardFaultFlags::from_bits_retain(regs.hfsr),
            debug: DebugFaultFlags::from_bits_retain(regs.dfsr),
            auxiliary: regs.afsr,
            mmfar: regs.mmfar,
            bfar: regs.bfar,
        }
    }

    /// MemManage fault address, qualified by MMARVALID.
    pub const fn memory_fault_address(&self) -> FaultAddress {
        FaultAddress::qualified(
            self.mem_manage.contains(MemManageFlags::MMARVALID),
            self.mmfar,
        )
    }

    /// BusFault address, qualified by BFARVALID.
    pub const fn bus_fault_address(&self) -> FaultAddress {
        FaultAddress::qualified(self.bus.contains(BusFaultFlags::BFARVALID), self.bfar)
    }

    /// `true` when any CFSR sub-status reports a recognised fault reason.
    ///
    /// The two address-valid flags do not count: they qualify an address
    /// but say nothing about what went wrong. Reserved bits do not count
    /// either.
    pub const fn has_sub_status(&self) -> bool {
        self.usage.intersects(UsageFaultFlags::all())
            || self.bus.intersects(BUS_REASONS)
            || self.mem_manage.intersects(MEM_MANAGE_REASONS)
    }

    /// Re-packed CFSR value.
    pub const fn cfsr(&self) -> u32 {
        ((self.usage.bits() as u32) << 16)
            | ((self.bus.bits() as u32) << 8)
            | (self.mem_manage.bits() as u32)
    }
}

impl From<FaultRegisters> for FaultStatus {
    fn from(regs: FaultRegisters) -> Self {
        Self::decode(regs)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for FaultStatus {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "FaultStatus {{ cfsr: {=u32:#010x}, hfsr: {=u32:#010x}, dfsr: {=u32:#010x}, afsr: {=u32:#010x}, mmfar: {}, bfar: {} }}",
            self.cfsr(),
            self.hard.bits(),
            self.debug.bits(),
            self.auxiliary,
            self.memory_fault_address(),
            self.bus_fault_address(),
        );
    }
}
