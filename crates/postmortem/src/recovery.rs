//! What the core does once the record is written.
//!
//! There is no way back to normal execution. After a fault the core either
//! stops at a breakpoint (a debugger is attached and can inspect the live
//! state) or requests a system reset (unattended, the device should come
//! back up and report the record on the next boot).
//!
//! ```text
//! Capturing ──finalize──▶ Finalized ──resolve(attached)──▶ Halted
//!                                   └─resolve(detached)──▶ Reset
//! ```

use thiserror_no_std::Error;

/// Whether a debugger is watching the core.
pub trait DebugMonitor {
    /// `true` when halting debug is enabled (DHCSR.C_DEBUGEN on hardware).
    fn debugger_attached(&self) -> bool;
}

impl<T: DebugMonitor + ?Sized> DebugMonitor for &T {
    fn debugger_attached(&self) -> bool {
        (**self).debugger_attached()
    }
}

/// Rejected state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransitionError {
    /// `finalize` called on a state other than `Capturing`.
    #[error("finalize requires the capturing state")]
    NotCapturing,
    /// `resolve` called on a state other than `Finalized`.
    #[error("resolve requires the finalized state")]
    NotFinalized,
}

/// Where the fault path ends up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Terminal {
    /// Stopped at a breakpoint for the attached debugger.
    Halted,
    /// System reset requested.
    Reset,
}

impl Terminal {
    /// Short name for logs and host output.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Halted => "halted",
            Self::Reset => "reset",
        }
    }
}

/// Maps the debugger check to a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecoveryPolicy;

impl RecoveryPolicy {
    /// `Halted` with a debugger, `Reset` without.
    pub const fn terminal_for(debugger_attached: bool) -> Terminal {
        if debugger_attached {
            Terminal::Halted
        } else {
            Terminal::Reset
        }
    }
}

/// Fault-path lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RecoveryState {
    /// Frame and status are being read and the record written.
    Capturing,
    /// Record complete (or skipped by configuration).
    Finalized,
    /// Stopped for a debugger. Terminal.
    Halted,
    /// Reset requested. Terminal.
    Reset,
}

impl RecoveryState {
    /// Initial state on fault entry.
    pub const fn new() -> Self {
        Self::Capturing
    }

    /// `Capturing` → `Finalized`.
    pub const fn finalize(self) -> Result<Self, TransitionError> {
        match self {
            Self::Capturing => Ok(Self::Finalized),
            _ => Err(TransitionError::NotCapturing),
        }
    }

    /// `Finalized` → `Halted` or `Reset`.
    pub const fn resolve(self, debugger_attached: bool) -> Result<Self, TransitionError> {
        match self {
            Self::Finalized => Ok(match RecoveryPolicy::terminal_for(debugger_attached) {
                Terminal::Halted => Self::Halted,
                Terminal::Reset => Self::Reset,
            }),
            _ => Err(TransitionError::NotFinalized),
        }
    }

    /// The terminal reached, if any.
    pub const fn terminal(self) -> Option<Terminal> {
        match self {
            Self::Halted => Some(Terminal::Halted),
            Self::Reset => Some(Terminal::Reset),
            Self::Capturing | Self::Finalized => None,
        }
    }
}

impl Default for RecoveryState {
    fn default() -> Self {
        Self::new()
    }
}
