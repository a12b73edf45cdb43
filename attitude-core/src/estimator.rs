//! The estimator task's owned state and per-cycle orchestration (§4, §5):
//! sensor read, fusion update, publication, tied together behind a
//! wrap-safe `dT` and the bootstrap/settings bookkeeping.

use crate::alarm::{Alarm, AlarmSeverity, Watchdog};
use crate::driver::AccelFifo;
use crate::error::AttitudeError;
use crate::fusion::{self, BootstrapTracker, GyroBias};
use crate::quaternion::Quaternion;
use crate::sensor;
use crate::settings::{FlightStatus, SettingsSnapshot};

/// Raw record published each successful cycle (§6): corrected sensor
/// vectors plus the accel-drain diagnostics.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RawRecord {
    pub gyros: [f32; 3],
    pub accels: [f32; 3],
    pub samples_remaining: usize,
    pub samples_consumed: usize,
}

/// Attitude record published each successful cycle (§6): orientation
/// quaternion and its Euler-angle decomposition, degrees, RPY order.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AttitudeRecord {
    pub q0: f32,
    pub q1: f32,
    pub q2: f32,
    pub q3: f32,
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
}

impl Default for AttitudeRecord {
    fn default() -> Self {
        Self { q0: 1.0, q1: 0.0, q2: 0.0, q3: 0.0, roll: 0.0, pitch: 0.0, yaw: 0.0 }
    }
}

impl AttitudeRecord {
    fn from_quaternion(q: Quaternion) -> Self {
        let (roll, pitch, yaw) = q.euler_deg();
        Self { q0: q.q0, q1: q.q1, q2: q.q2, q3: q.q3, roll, pitch, yaw }
    }
}

/// Wrap-safe millisecond tick delta (SPEC_FULL §9): unsigned subtraction
/// that assumes wraparound rather than a signed one that would panic or
/// produce a bogus negative `dT` on overflow. Two invocations on the same
/// tick yield `dT = 1 ms` rather than zero, since a zero `dT` would make
/// the `Kp / dT` proportional term in the fusion stage blow up.
pub fn wrap_safe_dt_ms(now_ms: u32, previous_ms: u32) -> f32 {
    let delta = now_ms.wrapping_sub(previous_ms);
    if delta == 0 {
        1.0
    } else {
        delta as f32
    }
}

/// Owned state of the attitude pipeline: orientation, bias integral,
/// bootstrap tracking, the last-applied settings snapshot, and the tick of
/// the previous successful cycle. Everything the fusion loop needs that
/// isn't handed in fresh each call (§5's "filter state owned by the
/// attitude task").
pub struct AttitudeEstimator {
    q: Quaternion,
    bias: GyroBias,
    bootstrap: BootstrapTracker,
    settings: SettingsSnapshot,
    last_tick_ms: Option<u32>,
    raw: RawRecord,
    attitude: AttitudeRecord,
}

impl Default for AttitudeEstimator {
    fn default() -> Self {
        Self::new(SettingsSnapshot::default())
    }
}

impl AttitudeEstimator {
    pub fn new(settings: SettingsSnapshot) -> Self {
        let bias = {
            let seeded = settings.seeded_gyro_bias();
            GyroBias { x: seeded[0], y: seeded[1], z: seeded[2] }
        };
        Self {
            q: Quaternion::IDENTITY,
            bias,
            bootstrap: BootstrapTracker::default(),
            settings,
            last_tick_ms: None,
            raw: RawRecord::default(),
            attitude: AttitudeRecord::default(),
        }
    }

    pub fn attitude(&self) -> AttitudeRecord {
        self.attitude
    }

    pub fn raw(&self) -> RawRecord {
        self.raw
    }

    /// Apply a newly-received settings snapshot (§4.4): the rotation matrix
    /// and flags swap in immediately, and the bias integral is reseeded
    /// from the persisted gyro-bias value, matching the source's "seed b
    /// from persisted gyro-bias on every settings change" behavior rather
    /// than only on startup.
    pub fn apply_settings(&mut self, settings: SettingsSnapshot) {
        let seeded = settings.seeded_gyro_bias();
        self.bias = GyroBias { x: seeded[0], y: seeded[1], z: seeded[2] };
        self.settings = settings;
    }

    /// Run one pipeline cycle (§4.1-§4.3): sensor read, fusion update,
    /// publication. `gyro_raw` is the sample already popped off the gyro
    /// queue (the timeout wait itself is a firmware/async concern, §5);
    /// `now_ms`/`flight_status` drive the bootstrap schedule and wrap-safe
    /// `dT`. On sensor failure, the alarm is raised and neither `q` nor the
    /// published records change (§7).
    pub fn run_cycle(
        &mut self,
        gyro_raw: [f32; 4],
        accel_fifo: &mut impl AccelFifo,
        now_ms: u32,
        flight_status: FlightStatus,
        alarm: &mut impl Alarm,
        watchdog: &mut impl Watchdog,
    ) -> Result<(), AttitudeError> {
        watchdog.kick();

        let gains = self.bootstrap.gains_for(&self.settings.settings, now_ms as u64, flight_status);

        let reading = match sensor::read(
            gyro_raw,
            accel_fifo,
            &self.settings,
            gains.yaw_bias_rate,
            &mut self.bias,
        ) {
            Ok(reading) => reading,
            Err(err) => {
                alarm.set(err.alarm_severity());
                return Err(err);
            }
        };

        let dt_ms = match self.last_tick_ms {
            Some(prev) => wrap_safe_dt_ms(now_ms, prev),
            None => 1.0,
        };
        self.last_tick_ms = Some(now_ms);

        fusion::update(&mut self.q, &mut self.bias, &gains, reading.accel, reading.gyro, dt_ms);

        self.raw = RawRecord {
            gyros: reading.gyro,
            accels: reading.accel,
            samples_remaining: reading.samples_remaining,
            samples_consumed: reading.samples_consumed,
        };
        self.attitude = AttitudeRecord::from_quaternion(self.q);
        alarm.clear();

        Ok(())
    }
}

/// Busy-wait startup gate (§5): spins with the CRITICAL alarm set and the
/// watchdog kicked until the accel FIFO reports at least one sample.
/// Pure and host-testable; the caller supplies the busy-loop driver (a
/// firmware-level concern since it may yield to an executor).
pub fn startup_gate_satisfied(accel_fifo: &impl AccelFifo, watchdog: &mut impl Watchdog, alarm: &mut impl Alarm) -> bool {
    watchdog.kick();
    if accel_fifo.fifo_elements() > 0 {
        alarm.clear();
        true
    } else {
        alarm.set(AlarmSeverity::Critical);
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::fixtures::VecAccelFifo;
    use crate::sensor::GYRO_NEUTRAL;
    use crate::settings::AttitudeSettings;

    struct RecordingAlarm(Vec<AlarmSeverity>);
    impl Alarm for RecordingAlarm {
        fn set(&mut self, severity: AlarmSeverity) {
            self.0.push(severity);
        }
    }
    struct CountingWatchdog(u32);
    impl Watchdog for CountingWatchdog {
        fn kick(&mut self) {
            self.0 += 1;
        }
    }

    #[test]
    fn wrap_safe_dt_handles_normal_and_wrapped_advance() {
        assert_eq!(wrap_safe_dt_ms(10, 8), 2.0);
        assert_eq!(wrap_safe_dt_ms(1, u32::MAX - 1), 3.0);
        assert_eq!(wrap_safe_dt_ms(5, 5), 1.0);
    }

    #[test]
    fn startup_gate_blocks_until_accel_sample_present() {
        let mut fifo = VecAccelFifo::new();
        let mut alarm = RecordingAlarm(Vec::new());
        let mut wdog = CountingWatchdog(0);
        assert!(!startup_gate_satisfied(&fifo, &mut wdog, &mut alarm));
        assert_eq!(alarm.0.last(), Some(&AlarmSeverity::Critical));
        fifo.push([0, 0, -245]);
        assert!(startup_gate_satisfied(&fifo, &mut wdog, &mut alarm));
        assert_eq!(alarm.0.last(), Some(&AlarmSeverity::Ok));
        assert_eq!(wdog.0, 2);
    }

    #[test]
    fn identity_hold_scenario_matches_spec_scenario_1() {
        let mut est = AttitudeEstimator::default();
        let mut alarm = RecordingAlarm(Vec::new());
        let mut wdog = CountingWatchdog(0);
        let raw = [0.0, GYRO_NEUTRAL, GYRO_NEUTRAL, GYRO_NEUTRAL];
        for tick in 0..1000u32 {
            let mut fifo = VecAccelFifo::new();
            fifo.push([0, 0, -245]);
            est.run_cycle(raw, &mut fifo, tick * 2, FlightStatus::Disarmed, &mut alarm, &mut wdog).unwrap();
        }
        let rec = est.attitude();
        assert!((rec.q0 - 1.0).abs() < 1e-3);
        assert!(rec.roll.abs() < 1e-1);
        assert!(rec.pitch.abs() < 1e-1);
    }

    #[test]
    fn gyro_timeout_scenario_leaves_attitude_unchanged_and_raises_alarm() {
        let mut est = AttitudeEstimator::default();
        let mut alarm = RecordingAlarm(Vec::new());
        let mut wdog = CountingWatchdog(0);
        let before = est.attitude();
        let mut empty_fifo = VecAccelFifo::new();
        let raw = [0.0, GYRO_NEUTRAL, GYRO_NEUTRAL, GYRO_NEUTRAL];
        let err = est.run_cycle(raw, &mut empty_fifo, 2, FlightStatus::Disarmed, &mut alarm, &mut wdog).unwrap_err();
        assert_eq!(err, AttitudeError::AccelFifoEmpty);
        assert_eq!(alarm.0.last(), Some(&AlarmSeverity::Error));
        assert_eq!(est.attitude(), before);
    }

    #[test]
    fn arming_zero_scenario_uses_bootstrap_yaw_bias_rate() {
        let mut settings = AttitudeSettings::default();
        settings.zero_during_arming = true;
        let mut est = AttitudeEstimator::new(SettingsSnapshot::from_settings(settings));
        let mut alarm = RecordingAlarm(Vec::new());
        let mut wdog = CountingWatchdog(0);
        let mut fifo = VecAccelFifo::new();
        fifo.push([0, 0, -245]);
        let raw = [0.0, GYRO_NEUTRAL, GYRO_NEUTRAL, GYRO_NEUTRAL];
        // Uptime far outside the bootstrap window, but ARMING + zeroDuringArming forces override.
        est.run_cycle(raw, &mut fifo, 500_000, FlightStatus::Arming, &mut alarm, &mut wdog).unwrap();
        // Bias integral untouched by PI because accel is exactly gravity-aligned (error ~ 0);
        // assert indirectly by checking the cycle succeeded and cleared the alarm.
        assert_eq!(alarm.0.last(), Some(&AlarmSeverity::Ok));
    }

    #[test]
    fn pure_roll_rate_scenario_matches_spec_scenario_2() {
        let mut settings = AttitudeSettings::default();
        settings.accel_kp = 0.0;
        settings.accel_ki = 0.0;
        let mut est = AttitudeEstimator::new(SettingsSnapshot::from_settings(settings));
        let mut alarm = RecordingAlarm(Vec::new());
        let mut wdog = CountingWatchdog(0);
        let raw_x = GYRO_NEUTRAL - 90.0 / 0.42;
        let raw = [0.0, raw_x, GYRO_NEUTRAL, GYRO_NEUTRAL];
        // 1000ms of accumulated dT at 2ms/cycle -> 500 cycles, starting past
        // the bootstrap window so settings (Kp=Ki=0) are actually in effect.
        for i in 0..500u32 {
            let mut fifo = VecAccelFifo::new();
            fifo.push([0, 0, -245]);
            let tick = 8000 + i * 2;
            est.run_cycle(raw, &mut fifo, tick, FlightStatus::Disarmed, &mut alarm, &mut wdog).unwrap();
        }
        let rec = est.attitude();
        assert!((rec.roll - 90.0).abs() < 1.0, "roll={}", rec.roll);
    }

    #[test]
    fn tilt_recovery_scenario_converges_toward_30_degrees_pitch() {
        let mut est = AttitudeEstimator::default();
        let mut alarm = RecordingAlarm(Vec::new());
        let mut wdog = CountingWatchdog(0);
        let raw = [0.0, GYRO_NEUTRAL, GYRO_NEUTRAL, GYRO_NEUTRAL];
        // accel = (0, 4.905, -8.496) m/s^2 ~= 30 degrees pitch tilt.
        let accel_counts = [0i32, (4.905 / crate::sensor::ACCEL_COUNT_SCALE) as i32, (-8.496 / crate::sensor::ACCEL_COUNT_SCALE) as i32];
        let mut last_pitch = 0.0f32;
        for i in 0..5000u32 {
            let mut fifo = VecAccelFifo::new();
            fifo.push(accel_counts);
            let tick = 8000 + i * 2;
            est.run_cycle(raw, &mut fifo, tick, FlightStatus::Disarmed, &mut alarm, &mut wdog).unwrap();
            let pitch = est.attitude().pitch;
            assert!(pitch >= last_pitch - 1e-3, "pitch regressed: {pitch} < {last_pitch}");
            last_pitch = pitch;
        }
        assert!((last_pitch - 30.0).abs() < 1.0, "pitch={last_pitch}");
    }

    #[test]
    fn apply_settings_reseeds_bias_from_persisted_value() {
        let mut est = AttitudeEstimator::default();
        let mut settings = AttitudeSettings::default();
        settings.gyro_bias = [200, -100, 0];
        est.apply_settings(SettingsSnapshot::from_settings(settings));
        assert_eq!(est.bias.x, 2.0);
        assert_eq!(est.bias.y, -1.0);
    }
}
