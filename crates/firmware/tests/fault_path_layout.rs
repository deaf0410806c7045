//! Architecture tests for the HardFault path and record placement.
// Architecture test file: expect/unwrap/panic are intentional test mechanisms.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects,
)]
//!
//! The trampoline and the linker script cannot run on the host, so these
//! tests inspect their source text: the entry must select the stack pointer
//! using registers only, and the record region must be a NOLOAD section at
//! the address the host decoder reads.

const EXCEPTION_HANDLERS: &str = include_str!("../src/exception_handlers.rs");
const HAL: &str = include_str!("../src/hal/mod.rs");
const MAIN: &str = include_str!("../src/main.rs");
const MEMORY_X: &str = include_str!("../../../memory.x");

/// Trampoline body: from the label to the branch into Rust.
fn trampoline() -> &'static str {
    let start = EXCEPTION_HANDLERS
        .find("\"HardFault:\"")
        .expect("HardFault label must exist in global_asm!");
    let end = EXCEPTION_HANDLERS[start..]
        .find("b postmortem_capture")
        .expect("trampoline must branch to postmortem_capture")
        + start;
    &EXCEPTION_HANDLERS[start..end]
}

#[test]
fn trampoline_selects_stack_from_exc_return_bit_2() {
    let body = trampoline();
    let tst = body.find("tst lr, #4").expect("must test EXC_RETURN.SPSEL");
    let msp = body.find("mrseq r0, msp").expect("SPSEL clear must select MSP");
    let psp = body.find("mrsne r0, psp").expect("SPSEL set must select PSP");
    let lr = body.find("mov r1, lr").expect("EXC_RETURN must be passed in r1");
    assert!(tst < msp && msp < psp && psp < lr);
}

#[test]
fn trampoline_does_not_touch_the_stack() {
    let body = trampoline();
    for forbidden in ["push", "sub sp", "str", "bl "] {
        assert!(
            !body.contains(forbidden),
            "trampoline must not use `{forbidden}` before the handoff"
        );
    }
}

#[test]
fn branch_target_is_the_exported_capture_symbol() {
    assert!(EXCEPTION_HANDLERS.contains(&format!(
        "b {}",
        firmware::exception_handlers::CAPTURE_SYMBOL
    )));
    assert!(EXCEPTION_HANDLERS.contains(&format!(
        "unsafe extern \"C\" fn {}(",
        firmware::exception_handlers::CAPTURE_SYMBOL
    )));
    assert!(EXCEPTION_HANDLERS.contains("#[no_mangle]"));
}

#[test]
fn hardfault_not_defined_through_cortex_m_rt_macro() {
    // The macro's handler has a compiled prologue; the trampoline replaces it.
    assert!(!EXCEPTION_HANDLERS.contains("#[cortex_m_rt::exception]"));
    assert!(firmware::HARDFAULT_DEFINED);
}

#[test]
fn record_region_is_noload_at_record_address() {
    assert!(MEMORY_X.contains(".postmortem (NOLOAD)"));
    assert!(MEMORY_X.contains("> POSTMORTEM"));
    let origin = format!("ORIGIN = 0x{:08X}", postmortem::config::RECORD_ADDRESS);
    assert!(
        MEMORY_X.contains(&origin),
        "memory.x POSTMORTEM region must start at {origin}"
    );
    let length = format!("LENGTH = {}", postmortem::config::RECORD_REGION_BYTES);
    assert!(MEMORY_X.contains(&length));
}

#[test]
fn record_static_is_placed_in_postmortem_section() {
    let section = HAL
        .find(r#"link_section = ".postmortem""#)
        .expect("record static must be placed in .postmortem");
    let decl = HAL
        .find("static mut POSTMORTEM_REGION")
        .expect("record static must exist");
    assert!(decl > section && decl - section < 200);
    // Uninitialised: a NOLOAD section must not carry an initialiser.
    assert!(HAL.contains("MaybeUninit::uninit()"));
}

#[test]
fn main_reports_fault_before_peripheral_init() {
    let report = MAIN
        .find("report_previous_fault()")
        .expect("main must report the previous fault");
    let traps = MAIN.find("enable_fault_traps(").expect("main must arm traps");
    let init = MAIN
        .find("embassy_stm32::init(")
        .expect("main must initialise embassy");
    assert!(report < traps && traps < init);
}

#[test]
fn heartbeat_publishes_diagnostic_sample() {
    assert!(MAIN.contains("DIAGNOSTIC.publish("));
}

#[test]
fn unrecordable_faults_are_documented() {
    let docs: String = EXCEPTION_HANDLERS
        .lines()
        .take_while(|l| l.starts_with("//!"))
        .collect::<Vec<_>>()
        .join("\n");
    // Stack overflow reaches HardFault but cannot be captured on the stack
    // that overflowed.
    assert!(docs.contains("stack overflow"));
    assert!(docs.contains("lockup"));
    assert!(docs.contains("watchdog"));
    assert!(!docs.contains("stack overflow detection also lands here"));
}
