//! STM32H743ZI firmware entry point.
//!
//! Reports the previous boot's fault, arms the fault traps and the
//! watchdog, then runs a heartbeat whose tick count is the diagnostic sample
//! recorded if a HardFault occurs.

#![no_std]
#![no_main]

use embassy_executor::Spawner;
use embassy_stm32::wdg::IndependentWatchdog;
use embassy_time::{Duration, Timer};

use firmware::boot::{self, FaultTraps};
use firmware::exception_handlers::DIAGNOSTIC;

// Logging transport and panic handler
use defmt_rtt as _;
use panic_probe as _;

#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    // Step 1: the record must be read before anything else can fault and
    // overwrite it.
    let previous = boot::hardware::report_previous_fault();

    // Step 2: divide-by-zero (and optionally unaligned access) now fault
    // instead of silently returning 0 / splitting the access.
    boot::hardware::enable_fault_traps(FaultTraps::BUILD);

    defmt::info!("Fault capture firmware v{=str}", env!("CARGO_PKG_VERSION"));
    defmt::info!(
        "persist={=bool} previous_fault={=bool} traps: div0={=bool} unaligned={=bool}",
        firmware::exception_handlers::CAPTURE_CONFIG.persist,
        previous.is_some(),
        FaultTraps::BUILD.divide_by_zero,
        FaultTraps::BUILD.unaligned
    );

    // Step 3
    let p = embassy_stm32::init(embassy_stm32::Config::default());

    // Step 4: once unleashed the IWDG cannot be stopped; the heartbeat
    // below must pet it at least every WATCHDOG_TIMEOUT_MS.
    let mut watchdog = IndependentWatchdog::new(p.IWDG1, boot::watchdog_timeout_us());
    watchdog.unleash();
    defmt::info!(
        "IWDG watchdog armed: timeout={=u32}ms",
        boot::WATCHDOG_TIMEOUT_MS
    );

    // Step 5
    defmt::info!("Entering main loop");
    let mut tick = 0u32;
    loop {
        Timer::after(Duration::from_secs(1)).await;
        tick = tick.wrapping_add(1);
        DIAGNOSTIC.publish(i32::try_from(tick).unwrap_or(i32::MAX));
        defmt::debug!("Heartbeat tick={=u32}", tick);
        watchdog.pet();
    }
}
