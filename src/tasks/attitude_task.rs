use embassy_executor::task;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Receiver;
use embassy_sync::signal::Signal;
use embassy_time::{with_timeout, Duration, Instant, Timer};

use attitude_core::alarm::AlarmSeverity;
use attitude_core::estimator::{startup_gate_satisfied, AttitudeEstimator, AttitudeRecord, RawRecord};
use attitude_core::settings::{FlightStatus, SettingsSnapshot};
use attitude_core::AttitudeError;

use crate::accel_fifo::AccelFifoHandle;
use crate::drivers::alarm::{HardwareWatchdog, LedAlarm};

/// Fusion-loop period (§5): 2 ms nominal, 500 Hz. The loop itself is driven
/// by the blocking gyro-queue receive, not by this constant directly (§9's
/// "hidden periodic scheduling" note) — it only bounds the receive timeout.
const UPDATE_RATE_MS: u64 = 2;

/// Published records (§6), readable by whatever downstream consumer the
/// real firmware eventually wires up (out of scope here, §1).
pub static ATTITUDE_SIGNAL: Signal<CriticalSectionRawMutex, AttitudeRecord> = Signal::new();
pub static RAW_SIGNAL: Signal<CriticalSectionRawMutex, RawRecord> = Signal::new();

/// The attitude pipeline task: startup gate, then sensor read → fusion →
/// publication every cycle (§4, §5). Grounded on `fast_loop_task`'s
/// Ticker-receive-process-publish shape, adapted to a gyro-queue-driven
/// loop with an explicit timeout instead of a free-running ticker.
#[task]
pub async fn attitude_task(
    gyro_rx: Receiver<'static, CriticalSectionRawMutex, [f32; 4], 4>,
    mut accel_fifo: AccelFifoHandle,
    settings_signal: &'static Signal<CriticalSectionRawMutex, SettingsSnapshot>,
    mut alarm: LedAlarm,
    mut watchdog: HardwareWatchdog,
    flight_status: fn() -> FlightStatus,
) {
    while !startup_gate_satisfied(&accel_fifo, &mut watchdog, &mut alarm) {
        Timer::after(Duration::from_millis(UPDATE_RATE_MS)).await;
    }

    let initial = settings_signal.try_take().map(AttitudeEstimator::new).unwrap_or_default();
    let mut estimator = initial;
    // Consecutive-failure count, used only to promote the alarm from WARN to
    // ERROR once it has persisted past a single cycle (§4.5); it is not a
    // retry counter and never gates behavior.
    let mut consecutive_failures: u32 = 0;

    loop {
        if let Some(snapshot) = settings_signal.try_take() {
            defmt::debug!("settings snapshot applied");
            estimator.apply_settings(snapshot);
        }

        let now_ms = Instant::now().as_millis() as u32;

        let gyro_raw = match with_timeout(
            Duration::from_millis(2 * UPDATE_RATE_MS),
            gyro_rx.receive(),
        )
        .await
        {
            Ok(sample) => sample,
            Err(_) => {
                consecutive_failures += 1;
                if consecutive_failures > 1 {
                    defmt::error!("gyro queue timeout persisting ({} cycles)", consecutive_failures);
                } else {
                    defmt::warn!("gyro queue timeout");
                }
                alarm.set(AlarmSeverity::Error);
                continue;
            }
        };

        match estimator.run_cycle(
            gyro_raw,
            &mut accel_fifo,
            now_ms,
            flight_status(),
            &mut alarm,
            &mut watchdog,
        ) {
            Ok(()) => {
                consecutive_failures = 0;
                ATTITUDE_SIGNAL.signal(estimator.attitude());
                RAW_SIGNAL.signal(estimator.raw());
            }
            Err(AttitudeError::AccelFifoEmpty) => {
                consecutive_failures += 1;
                if consecutive_failures > 1 {
                    defmt::error!("accel fifo empty persisting ({} cycles)", consecutive_failures);
                } else {
                    defmt::warn!("accel fifo empty");
                }
            }
            Err(AttitudeError::GyroTimeout) => {
                // Unreachable: the gyro-timeout path above never calls
                // run_cycle in the first place.
                unreachable!()
            }
        }
    }
}
