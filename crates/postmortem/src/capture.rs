//! The fault path, start to finish.
//!
//! [`capture`] is what the HardFault trampoline hands control to. It reads
//! the stacked frame, snapshots and classifies the fault registers, writes
//! the record and picks the terminal state. It does not halt or reset
//! itself; the caller acts on [`Outcome::terminal`] so the whole sequence
//! stays testable on the host.
//!
//! Nothing here allocates, logs, blocks or returns an error.

use crate::cause::FaultCause;
use crate::config::CaptureConfig;
use crate::fault_status::FaultStatus;
use crate::frame::RegisterFrame;
use crate::record::{PostmortemRecord, RecordMedium, RecordStore};
use crate::recovery::{DebugMonitor, RecoveryState, Terminal};
use crate::registers::FaultRegisterSource;
use crate::stack::{ActiveStack, ExcReturn};

/// Everything learned about one fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Outcome {
    /// Stack the frame was read from.
    pub active_stack: ActiveStack,
    /// Address of the frame (the selected MSP or PSP).
    pub stack_pointer: u32,
    /// Stacked registers.
    pub frame: RegisterFrame,
    /// Decoded fault registers.
    pub status: FaultStatus,
    /// Classified cause.
    pub cause: FaultCause,
    /// Record as written, or `None` when persistence is disabled.
    pub record: Option<PostmortemRecord>,
    /// Final state of the recovery machine.
    pub state: RecoveryState,
    /// Halt or reset.
    pub terminal: Terminal,
}

/// Run the fault pipeline.
///
/// `sp` is the stack pointer selected by the trap entry from `exc_return`
/// bit 2 (MSP when clear, PSP when set). `diagnostic` is stored verbatim in
/// the record; see [`DiagnosticCell`](crate::diagnostic::DiagnosticCell).
///
/// # Safety
///
/// `sp` must point to eight readable, word-aligned `u32`s: the frame the
/// processor stacked on exception entry.
#[allow(clippy::cast_possible_truncation)] // addresses are 32-bit on target
pub unsafe fn capture<M, R, D>(
    sp: *const u32,
    exc_return: u32,
    regs: &R,
    monitor: &D,
    store: &mut RecordStore<M>,
    diagnostic: i32,
    config: CaptureConfig,
) -> Outcome
where
    M: RecordMedium,
    R: FaultRegisterSource + ?Sized,
    D: DebugMonitor + ?Sized,
{
    let state = RecoveryState::new();
    let active_stack = ExcReturn::new(exc_return).active_stack();
    let stack_pointer = sp as usize as u32;

    // SAFETY: caller guarantees `sp` addresses the stacked frame.
    let frame = unsafe { RegisterFrame::read_from(sp) };
    let status = regs.read_fault_status();
    let cause = FaultCause::classify(&status);

    let record = if config.persist {
        let record = PostmortemRecord::capture(&frame, stack_pointer, cause.code(), diagnostic);
        store.persist(&record);
        Some(record)
    } else {
        None
    };

    let state = state
        .finalize()
        .and_then(|s| s.resolve(monitor.debugger_attached()))
        .unwrap_or(RecoveryState::Reset);
    let terminal = state.terminal().unwrap_or(Terminal::Reset);

    Outcome {
        active_stack,
        stack_pointer,
        frame,
        status,
        cause,
        record,
        state,
        terminal,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cause::CauseCode;
    use crate::config::RECORD_KEY;
    use crate::mocks::{FixedMonitor, InjectedFaultRegisters, RamMedium};

    const FRAME: [u32; 8] = [0xA0, 0xA1, 0xA2, 0xA3, 0xC12, 0x0800_0101, 0x0800_2468, 0x0100_0003];

    fn run(
        regs: &InjectedFaultRegisters,
        monitor: &FixedMonitor,
        config: CaptureConfig,
    ) -> (Outcome, RecordStore<RamMedium>) {
        let mut store = RecordStore::new(RamMedium::new());
        // SAFETY: FRAME is eight readable words.
        let outcome = unsafe {
            capture(FRAME.as_ptr(), 0xFFFF_FFFD, regs, monitor, &mut store, -7, config)
        };
        (outcome, store)
    }

    #[test]
    fn test_full_pipeline_detached() {
        let (outcome, store) = run(
            &InjectedFaultRegisters::divide_by_zero(),
            &FixedMonitor::detached(),
            CaptureConfig::DEFAULT,
        );
        assert_eq!(outcome.active_stack, ActiveStack::Process);
        assert_eq!(outcome.frame.as_words(), FRAME);
        assert_eq!(outcome.cause, FaultCause::DivideByZero);
        assert_eq!(outcome.state, RecoveryState::Reset);
        assert_eq!(outcome.terminal, Terminal::Reset);

        let record = store.load().unwrap();
        assert_eq!(record.key, RECORD_KEY);
        assert_eq!(record.cause_code(), Ok(CauseCode::DivideByZero));
        assert_eq!(record.return_address, 0x0800_2468);
        assert_eq!(record.stack_pointer, outcome.stack_pointer);
        assert_eq!(record.diagnostic, -7);
        assert_eq!(outcome.record, Some(record));
    }

    #[test]
    fn test_attached_debugger_halts() {
        let (outcome, _) = run(
            &InjectedFaultRegisters::divide_by_zero(),
            &FixedMonitor::attached(),
            CaptureConfig::DEFAULT,
        );
        assert_eq!(outcome.terminal, Terminal::Halted);
    }

    #[test]
    fn test_no_persist_leaves_store_untouched() {
        let (outcome, store) = run(
            &InjectedFaultRegisters::divide_by_zero(),
            &FixedMonitor::detached(),
            CaptureConfig::NO_PERSIST,
        );
        assert_eq!(outcome.record, None);
        assert_eq!(outcome.cause, FaultCause::DivideByZero);
        assert_eq!(outcome.terminal, Terminal::Reset);
        assert!(store.medium().write_log().is_empty());
    }
}
