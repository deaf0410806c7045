//! Fault capture and postmortem records for ARMv7-M processors.
//!
//! This crate holds everything about a HardFault that can be expressed
//! without touching real hardware: the stacked register frame, the decoded
//! System Control Block fault-status registers, the cause classification,
//! the persisted postmortem record and the recovery state machine.
//!
//! # Pipeline
//!
//! ```text
//! Trap entry (firmware, asm)        selects MSP/PSP from EXC_RETURN
//!         ↓
//! RegisterFrame::read_from          eight stacked words
//!         ↓
//! FaultRegisterSource               CFSR/HFSR/DFSR/AFSR/MMFAR/BFAR → FaultStatus
//!         ↓
//! FaultCause::classify              usage > bus > memory management
//!         ↓
//! RecordStore::persist              sentinel key written last
//!         ↓
//! RecoveryState                     Capturing → Finalized → Halted | Reset
//! ```
//!
//! Hardware access is isolated behind three capability traits
//! ([`FaultRegisterSource`], [`DebugMonitor`], [`RecordMedium`]) so the whole
//! pipeline runs on the host against injected values. The `firmware` crate
//! provides the register-backed implementations.
//!
//! # Features
//!
//! - `std`: link `std` and build `mocks` (host tests and tooling)
//! - `defmt`: derive `defmt::Format` on all public types
//!
//! # Example
//!
//! ```
//! use postmortem::mocks::{FixedMonitor, InjectedFaultRegisters, RamMedium};
//! use postmortem::{capture, CaptureConfig, RecordStore, Terminal};
//!
//! let stack = [0u32, 1, 2, 3, 12, 0x0800_0101, 0x0800_1234, 0x0100_0000];
//! let regs = InjectedFaultRegisters::divide_by_zero();
//! let mut store = RecordStore::new(RamMedium::new());
//!
//! // SAFETY: `stack` holds eight readable words.
//! let outcome = unsafe {
//!     capture(
//!         stack.as_ptr(),
//!         0xFFFF_FFF9,
//!         &regs,
//!         &FixedMonitor::detached(),
//!         &mut store,
//!         0,
//!         CaptureConfig::DEFAULT,
//!     )
//! };
//! assert_eq!(outcome.terminal, Terminal::Reset);
//! assert_eq!(store.load().map(|r| r.return_address), Ok(0x0800_1234));
//! ```

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // the fault path must not panic
#![deny(clippy::unreachable)]
#![deny(unused_must_use)]
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::print_stdout)]
#![allow(clippy::doc_markdown)] // register names (CFSR, MMFAR, EXC_RETURN) in docs
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod capture;
pub mod cause;
pub mod config;
pub mod diagnostic;
pub mod fault_status;
pub mod frame;
pub mod mocks;
pub mod record;
pub mod recovery;
pub mod registers;
pub mod stack;

pub use capture::{capture, Outcome};
pub use cause::{CauseCode, FaultCause, HardFaultReason, MemoryAccess, StackingSource};
pub use config::{CaptureConfig, RECORD_KEY};
pub use diagnostic::DiagnosticCell;
pub use fault_status::{
    BusFaultFlags, DebugFaultFlags, FaultAddress, FaultRegisters, FaultStatus, HardFaultFlags,
    MemManageFlags, UsageFaultFlags,
};
pub use frame::RegisterFrame;
pub use record::{PostmortemRecord, RecordError, RecordMedium, RecordSlot, RecordStore};
pub use recovery::{DebugMonitor, RecoveryPolicy, RecoveryState, Terminal, TransitionError};
pub use registers::FaultRegisterSource;
pub use stack::{select_stack_pointer, ActiveStack, ExcReturn};
