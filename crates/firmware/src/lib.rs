//! Fault capture firmware for the STM32H743ZI.
//!
//! Binds the hardware-independent [`postmortem`] pipeline to the board:
//!
//! ```text
//! HardFault trampoline (exception_handlers)
//!         ↓
//! postmortem::capture       ScbFaultRegisters, DcbMonitor, NoinitMedium (hal)
//!         ↓
//! bkpt loop | SYSRESETREQ   (exception_handlers::exit)
//!         ↓  (after reset)
//! boot::report_previous_fault
//! ```
//!
//! # Features
//!
//! - `hardware` - Build for STM32H7 target (embassy, cortex-m, defmt)
//! - `persist` - Write the postmortem record on HardFault (default)
//! - `unaligned-trap` - Also trap unaligned accesses
//! - `std` - Enable standard library (host testing)
//!
//! # Hardware Target
//!
//! ```bash
//! cargo build --release --target thumbv7em-none-eabihf --features hardware
//! ```

#![cfg_attr(all(not(test), not(feature = "std")), no_std)]
// Upgrade relevant warns to deny; keep pedantic as warn (too noisy for firmware)
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(unsafe_op_in_unsafe_fn)]
// unsafe fn body is not implicitly unsafe block
// Logging discipline
#![warn(clippy::print_stdout)] // prefer defmt over println! in lib code
#![warn(clippy::dbg_macro)] // dbg! should not be left in committed code
// Intentional allows for this codebase:
#![allow(clippy::module_name_repetitions)] // common in Rust crates; not a real issue
#![allow(clippy::missing_errors_doc)] // most errors are self-explanatory
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)] // register names (HardFault, SHCSR, DHCSR) in docs

pub mod boot;
pub mod exception_handlers;
pub mod hal;

pub use exception_handlers::{CAPTURE_CONFIG, DIAGNOSTIC, HARDFAULT_DEFINED};
pub use hal::NoinitMedium;

#[cfg(feature = "hardware")]
pub use hal::{DcbMonitor, ScbFaultRegisters};
