#![no_std]
#![no_main]

mod accel_fifo;
mod board;
mod drivers;
mod state;
mod tasks;

use embassy_executor::{InterruptExecutor, Spawner};
use embassy_stm32::dma::NoDma;
use embassy_stm32::gpio::{Level, Output, Pin, Speed};
use embassy_stm32::interrupt;
use embassy_stm32::interrupt::{InterruptExt, Priority};
use embassy_stm32::spi::{Config as SpiConfig, Spi};
use embassy_stm32::time::Hertz as TimeHertz;
use embassy_stm32::wdg::IndependentWatchdog;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Timer};
use {defmt_rtt as _, panic_probe as _};

use crate::accel_fifo::{AccelFifoHandle, SharedAccelFifo};
use crate::board::Board;
use crate::drivers::alarm::{HardwareWatchdog, LedAlarm};
use crate::drivers::icm42688::Icm42688;
use attitude_core::settings::SettingsSnapshot;

// ── Inter-task channels ───────────────────────────────────────────────────
static GYRO_CHAN: Channel<CriticalSectionRawMutex, [f32; 4], 4> = Channel::new();
static ACCEL_FIFO: SharedAccelFifo = SharedAccelFifo::new();
static SETTINGS_SIGNAL: Signal<CriticalSectionRawMutex, SettingsSnapshot> = Signal::new();

// ── Attitude-task executor ────────────────────────────────────────────────
// §5: no executor on this board gives true priority preemption among its own
// tasks, so the attitude task gets its own interrupt-priority executor (a
// free peripheral interrupt line repurposed as a software interrupt) while
// everything else — the IMU feed and the settings stand-in — stays on the
// default thread-mode executor. This is the same clock/peripheral-reservation
// discipline `Board::init` already applies to the PLL, extended to task
// scheduling.
static ATTITUDE_EXECUTOR: InterruptExecutor = InterruptExecutor::new();

#[interrupt]
unsafe fn UART5() {
    ATTITUDE_EXECUTOR.on_interrupt()
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    // 1. Board init (168 MHz PLL).
    let board = Board::init();
    let p = board.p;

    // 2. SPI1 @ 10 MHz — ICM-42688 IMU (SCK=PA5, MOSI=PA7, MISO=PA6, CS=PB12).
    let mut spi_config = SpiConfig::default();
    spi_config.frequency = TimeHertz(10_000_000);
    let spi = Spi::new(p.SPI1, p.PA5, p.PA7, p.PA6, NoDma, NoDma, spi_config);
    let cs_gyro = Output::new(p.PB12.degrade(), Level::High, Speed::VeryHigh);
    let mut imu = Icm42688::new(spi, cs_gyro);

    Timer::after(Duration::from_millis(100)).await;
    let _ = imu.init().await;

    // 3. Status LED (PC13) doubles as the ATTITUDE alarm sink.
    let led = Output::new(p.PC13.degrade(), Level::Low, Speed::Low);
    let alarm = LedAlarm::new(led);

    // 4. Independent watchdog, kicked once per attitude-task cycle.
    let watchdog = HardwareWatchdog::new(IndependentWatchdog::new(p.IWDG, 50_000));

    // 5. `imu`'s peripheral borrows are already 'static (from `Board::init`'s
    //    `Peripherals`), so the feed task can just take ownership of the
    //    driver directly — no StaticCell/leak needed for the value itself.
    spawner
        .spawn(tasks::imu_feed_task::imu_feed_task(imu, GYRO_CHAN.sender(), &ACCEL_FIFO))
        .unwrap();

    spawner
        .spawn(tasks::settings_task::settings_task(&SETTINGS_SIGNAL, state::current_settings))
        .unwrap();

    // 7. Attitude task runs on its own interrupt-priority executor.
    interrupt::UART5.set_priority(Priority::P6);
    let attitude_spawner = ATTITUDE_EXECUTOR.start(interrupt::UART5);
    attitude_spawner
        .spawn(tasks::attitude_task::attitude_task(
            GYRO_CHAN.receiver(),
            AccelFifoHandle(&ACCEL_FIFO),
            &SETTINGS_SIGNAL,
            alarm,
            watchdog,
            state::flight_status,
        ))
        .unwrap();

    // 8. Nothing else runs on the default executor's main task.
    loop {
        Timer::after(Duration::from_secs(3600)).await;
    }
}
