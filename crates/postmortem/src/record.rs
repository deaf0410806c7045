//! Postmortem record: layout, placement contract and crash-consistent writes.
//!
//! # Layout
//!
//! Nine little-endian words, no padding. The layout is read by code running
//! after the next reset and by host tools reading RAM through a probe, so it
//! must not change.
//!
//! | Word | Offset | Field            |
//! |------|--------|------------------|
//! | 0    | 0x00   | key              |
//! | 1    | 0x04   | cause code       |
//! | 2    | 0x08   | r0               |
//! | 3    | 0x0C   | r1               |
//! | 4    | 0x10   | r2               |
//! | 5    | 0x14   | r3               |
//! | 6    | 0x18   | return address   |
//! | 7    | 0x1C   | stack pointer    |
//! | 8    | 0x20   | diagnostic (i32) |
//!
//! # Placement
//!
//! The medium must live in RAM that the startup code does not zero or
//! initialise, otherwise the record is wiped before anyone can read it. On
//! the reference board this is the `.postmortem (NOLOAD)` section at
//! [`RECORD_ADDRESS`](crate::config::RECORD_ADDRESS).
//!
//! # Write ordering
//!
//! [`RecordStore::persist`] clears the key, writes every other field, issues
//! a barrier and writes the key last. A reset at any point before the final
//! store leaves a record whose key does not match, which readers treat as
//! "no fault captured".

use crate::cause::CauseCode;
use crate::config::RECORD_KEY;
use crate::frame::RegisterFrame;
use core::sync::atomic::{compiler_fence, Ordering};
use thiserror_no_std::Error;

/// Errors reading a persisted record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RecordError {
    /// Key word does not match [`RECORD_KEY`]: nothing was captured, or the
    /// capture was cut short. The other words are undefined.
    #[error("no postmortem record (key {0:#010x})")]
    NoRecord(u32),
    /// Key matched but the cause word is not a known [`CauseCode`].
    #[error("unknown cause code {0:#x}")]
    UnknownCause(u32),
}

/// Word positions inside the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RecordSlot {
    /// Sentinel.
    Key,
    /// Cause code.
    Cause,
    /// Stacked r0.
    R0,
    /// Stacked r1.
    R1,
    /// Stacked r2.
    R2,
    /// Stacked r3.
    R3,
    /// Stacked PC.
    ReturnAddress,
    /// Stack pointer the frame was read from.
    StackPointer,
    /// Caller-supplied diagnostic sample.
    Diagnostic,
}

impl RecordSlot {
    /// All slots in layout order.
    pub const ALL: [RecordSlot; PostmortemRecord::WORDS] = [
        RecordSlot::Key,
        RecordSlot::Cause,
        RecordSlot::R0,
        RecordSlot::R1,
        RecordSlot::R2,
        RecordSlot::R3,
        RecordSlot::ReturnAddress,
        RecordSlot::StackPointer,
        RecordSlot::Diagnostic,
    ];

    /// Word index within the record.
    pub const fn index(self) -> usize {
        match self {
            Self::Key => 0,
            Self::Cause => 1,
            Self::R0 => 2,
            Self::R1 => 3,
            Self::R2 => 4,
            Self::R3 => 5,
            Self::ReturnAddress => 6,
            Self::StackPointer => 7,
            Self::Diagnostic => 8,
        }
    }

    /// Byte offset within the record.
    #[allow(clippy::arithmetic_side_effects)] // index() <= 8
    pub const fn byte_offset(self) -> usize {
        self.index() * 4
    }
}

/// The persisted record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(C)]
pub struct PostmortemRecord {
    /// [`RECORD_KEY`] when the record is complete.
    pub key: u32,
    /// Raw [`CauseCode`].
    pub cause: u32,
    /// Stacked r0.
    pub r0: u32,
    /// Stacked r1.
    pub r1: u32,
    /// Stacked r2.
    pub r2: u32,
    /// Stacked r3.
    pub r3: u32,
    /// Stacked PC.
    pub return_address: u32,
    /// MSP or PSP value the frame was read from.
    pub stack_pointer: u32,
    /// Caller-supplied diagnostic sample.
    pub diagnostic: i32,
}

static_assertions::assert_eq_size!(PostmortemRecord, [u32; PostmortemRecord::WORDS]);
static_assertions::assert_eq_align!(PostmortemRecord, u32);

impl PostmortemRecord {
    /// Number of words in the record.
    pub const WORDS: usize = 9;

    /// Complete record for a capture, key included.
    pub const fn capture(
        frame: &RegisterFrame,
        stack_pointer: u32,
        cause: CauseCode,
        diagnostic: i32,
    ) -> Self {
        Self {
            key: RECORD_KEY,
            cause: cause.raw(),
            r0: frame.r0,
            r1: frame.r1,
            r2: frame.r2,
            r3: frame.r3,
            return_address: frame.return_address,
            stack_pointer,
            diagnostic,
        }
    }

    /// Rebuild from words in layout order (e.g. a probe memory dump).
    #[allow(clippy::cast_possible_wrap)] // diagnostic is stored as its bit pattern
    pub const fn from_words(words: [u32; Self::WORDS]) -> Self {
        let [key, cause, r0, r1, r2, r3, return_address, stack_pointer, diagnostic] = words;
        Self {
            key,
            cause,
            r0,
            r1,
            r2,
            r3,
            return_address,
            stack_pointer,
            diagnostic: diagnostic as i32,
        }
    }

    /// Words in layout order.
    #[allow(clippy::cast_sign_loss)]
    pub const fn as_words(&self) -> [u32; Self::WORDS] {
        [
            self.key,
            self.cause,
            self.r0,
            self.r1,
            self.r2,
            self.r3,
            self.return_address,
            self.stack_pointer,
            self.diagnostic as u32,
        ]
    }

    /// Value of one slot.
    #[allow(clippy::cast_sign_loss)]
    pub const fn word(&self, slot: RecordSlot) -> u32 {
        match slot {
            RecordSlot::Key => self.key,
            RecordSlot::Cause => self.cause,
            RecordSlot::R0 => self.r0,
            RecordSlot::R1 => self.r1,
            RecordSlot::R2 => self.r2,
            RecordSlot::R3 => self.r3,
            RecordSlot::ReturnAddress => self.return_address,
            RecordSlot::StackPointer => self.stack_pointer,
            RecordSlot::Diagnostic => self.diagnostic as u32,
        }
    }

    /// `true` when the key matches. Nothing else in the record may be
    /// trusted otherwise.
    pub const fn is_valid(&self) -> bool {
        self.key == RECORD_KEY
    }

    /// Check the key, then return the record.
    pub const fn validate(self) -> Result<Self, RecordError> {
        if self.is_valid() {
            Ok(self)
        } else {
            Err(RecordError::NoRecord(self.key))
        }
    }

    /// Decoded cause code.
    pub fn cause_code(&self) -> Result<CauseCode, RecordError> {
        CauseCode::from_raw(self.cause)
    }
}

/// Word-addressable storage that survives a reset.
///
/// Implementations must perform each `store` as a single 32-bit write in
/// program order (volatile on hardware) and must be backed by memory the
/// startup code leaves alone.
pub trait RecordMedium {
    /// Write one word.
    fn store(&mut self, slot: RecordSlot, value: u32);

    /// Read one word.
    fn load(&self, slot: RecordSlot) -> u32;

    /// Order every preceding `store` before any following one.
    ///
    /// The default is a compiler fence, which is enough when stores are
    /// volatile and the memory is strongly ordered. Hardware media add a
    /// data synchronisation barrier.
    fn barrier(&mut self) {
        compiler_fence(Ordering::SeqCst);
    }
}

/// Reads and writes [`PostmortemRecord`]s on a [`RecordMedium`].
#[derive(Debug)]
pub struct RecordStore<M> {
    medium: M,
}

impl<M: RecordMedium> RecordStore<M> {
    /// Wrap a medium.
    pub const fn new(medium: M) -> Self {
        Self { medium }
    }

    /// Write `record` so that it only validates once fully written.
    ///
    /// Order: key cleared, payload words, barrier, key.
    pub fn persist(&mut self, record: &PostmortemRecord) {
        self.medium.store(RecordSlot::Key, 0);
        self.medium.barrier();
        for slot in RecordSlot::ALL {
            if slot != RecordSlot::Key {
                self.medium.store(slot, record.word(slot));
            }
        }
        self.medium.barrier();
        self.medium.store(RecordSlot::Key, record.key);
        self.medium.barrier();
    }

    /// Raw words, valid or not.
    #[allow(clippy::cast_possible_wrap)]
    pub fn read_raw(&self) -> PostmortemRecord {
        PostmortemRecord {
            key: self.medium.load(RecordSlot::Key),
            cause: self.medium.load(RecordSlot::Cause),
            r0: self.medium.load(RecordSlot::R0),
            r1: self.medium.load(RecordSlot::R1),
            r2: self.medium.load(RecordSlot::R2),
            r3: self.medium.load(RecordSlot::R3),
            return_address: self.medium.load(RecordSlot::ReturnAddress),
            stack_pointer: self.medium.load(RecordSlot::StackPointer),
            diagnostic: self.medium.load(RecordSlot::Diagnostic) as i32,
        }
    }

    /// The stored record, if its key matches.
    pub fn load(&self) -> Result<PostmortemRecord, RecordError> {
        self.read_raw().validate()
    }

    /// [`load`](Self::load), then clear the key so the record is reported
    /// on one boot only.
    pub fn take(&mut self) -> Result<PostmortemRecord, RecordError> {
        let record = self.load();
        if record.is_ok() {
            self.invalidate();
        }
        record
    }

    /// Clear the key.
    pub fn invalidate(&mut self) {
        self.medium.store(RecordSlot::Key, 0);
        self.medium.barrier();
    }

    /// Underlying medium.
    pub fn medium(&self) -> &M {
        &self.medium
    }

    /// Unwrap the medium.
    pub fn into_medium(self) -> M {
        self.medium
    }
}
