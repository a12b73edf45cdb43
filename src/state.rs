//! The flight-status and settings brokers are out-of-scope upstream
//! components (§1); this firmware stands in for both with plain global
//! state the real brokers would eventually replace. Grounded on the
//! `TAB_MOTOR_DSHOT_CMD: AtomicU16` global-state idiom this codebase already
//! uses to hand a value across the task boundary without a full channel.

use core::sync::atomic::{AtomicU32, AtomicU8, Ordering};

use attitude_core::settings::{AttitudeSettings, FlightStatus};

static FLIGHT_STATUS: AtomicU8 = AtomicU8::new(0);

/// Read by `attitude_task` once per cycle (§5's consumed `Armed` field).
pub fn flight_status() -> FlightStatus {
    match FLIGHT_STATUS.load(Ordering::Relaxed) {
        1 => FlightStatus::Arming,
        2 => FlightStatus::Armed,
        _ => FlightStatus::Disarmed,
    }
}

#[allow(dead_code)]
pub fn set_flight_status(status: FlightStatus) {
    let code = match status {
        FlightStatus::Disarmed => 0,
        FlightStatus::Arming => 1,
        FlightStatus::Armed => 2,
    };
    FLIGHT_STATUS.store(code, Ordering::Relaxed);
}

// Packed gyro-gain override, the one field this firmware exposes a live
// knob for; every other `AttitudeSettings` field stays at its default until
// a real settings broker lands. Stored as gain*1000 so an `AtomicU32` can
// hold it without a lock.
static GYRO_GAIN_X1000: AtomicU32 = AtomicU32::new(420);

#[allow(dead_code)]
pub fn set_gyro_gain(gain: f32) {
    GYRO_GAIN_X1000.store((gain * 1000.0) as u32, Ordering::Relaxed);
}

/// Polled by `settings_task` (§4.4's landing zone) to build the snapshot
/// `attitude_task` eventually reads.
pub fn current_settings() -> AttitudeSettings {
    let mut settings = AttitudeSettings::default();
    settings.gyro_gain = GYRO_GAIN_X1000.load(Ordering::Relaxed) as f32 / 1000.0;
    settings
}
