//! Capture configuration and persisted-format constants.

/// Sentinel written last into a complete postmortem record.
///
/// Any other value in word 0 means "no fault was captured" (cold RAM, a
/// clean previous boot, or a capture interrupted before completion).
pub const RECORD_KEY: u32 = 0x0E0C_2024;

/// Address of the record region on the reference board.
///
/// Last 64 bytes of DTCM, carved out as the `POSTMORTEM` region in
/// `memory.x` and mapped to the `.postmortem (NOLOAD)` section so
/// cortex-m-rt's `.bss`/`.data` init never touches it.
pub const RECORD_ADDRESS: u32 = 0x2001_FFC0;

/// Size of the reserved region. The record uses the first 36 bytes.
pub const RECORD_REGION_BYTES: usize = 64;

/// Behaviour switches for the fault path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CaptureConfig {
    /// Write the postmortem record before halting or resetting.
    ///
    /// With `false` the record region is left untouched; the cause is
    /// still classified and the recovery policy still runs.
    pub persist: bool,
}

impl CaptureConfig {
    /// Persist the record.
    pub const DEFAULT: Self = Self { persist: true };

    /// Classify and halt/reset without touching the record region.
    pub const NO_PERSIST: Self = Self { persist: false };
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::PostmortemRecord;

    #[test]
    fn test_record_fits_region() {
        assert!(core::mem::size_of::<PostmortemRecord>() <= RECORD_REGION_BYTES);
    }

    #[test]
    fn test_record_address_is_word_aligned_and_in_dtcm() {
        assert_eq!(RECORD_ADDRESS % 4, 0);
        assert!((0x2000_0000..0x2002_0000).contains(&RECORD_ADDRESS));
        assert_eq!(
            RECORD_ADDRESS as usize + RECORD_REGION_BYTES,
            0x2002_0000,
            "record region must be the top of DTCM"
        );
    }

    #[test]
    fn test_default_persists() {
        assert!(CaptureConfig::default().persist);
        assert!(!CaptureConfig::NO_PERSIST.persist);
    }

    #[test]
    fn test_key_is_not_a_cold_ram_pattern() {
        for pattern in [0u32, 0xFFFF_FFFF, 0xAAAA_AAAA, 0x5555_5555] {
            assert_ne!(RECORD_KEY, pattern);
        }
    }
}
