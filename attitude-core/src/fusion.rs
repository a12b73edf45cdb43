//! The complementary filter: gravity-error computation, acceleration gating
//! and centripetal rejection, the PI update, bootstrap/arming gain overrides,
//! and quaternion integration (§4.2).

use micromath::F32Ext;

use crate::quaternion::Quaternion;
use crate::settings::{AttitudeSettings, FlightStatus};

/// Gating reference used by §4.2.3's acceleration gate and centripetal
/// rejection — distinct from the 9.81 m/s^2 used in the sensor stage's
/// accel scale factor (SPEC_FULL §9 preserves this as two separate
/// constants, as in the source).
pub const ACCEL_GATE_G: f32 = 9.8;
/// Acceleration-gating band: accept accel magnitudes in `(ACCEL_GATE_G, 1.5*ACCEL_GATE_G]`.
pub const ACCEL_GATE_HIGH_FACTOR: f32 = 1.5;

/// Uptime window (ms) during which gains are snapped to the bootstrap values
/// regardless of settings (§4.2.1).
pub const BOOTSTRAP_START_MS: u64 = 1000;
pub const BOOTSTRAP_END_MS: u64 = 7000;

const BOOTSTRAP_KP: f32 = 1.0;
const BOOTSTRAP_KI: f32 = 0.9;
const BOOTSTRAP_YAW_BIAS_RATE: f32 = 0.23;

/// Gyro bias integral `b = (bx, by, bz)`, deg/s, added back onto corrected
/// gyro rates (§3). `x`/`y` are driven by the PI update (§4.2.4); `z` is
/// driven only by the sensor stage's yaw-bias sink (§4.1) — the Z channel
/// of the PI integrator is intentionally never touched here, preserving the
/// source's (possibly buggy, but specified) behavior.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GyroBias {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// The coefficients actually in effect for one cycle, after the bootstrap/
/// arming override of §4.2.1 has been applied.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EffectiveGains {
    pub kp: f32,
    pub ki: f32,
    pub yaw_bias_rate: f32,
    /// `true` if this cycle is running under the bootstrap/arming override.
    pub overridden: bool,
}

/// Tracks whether the filter most recently ran under the bootstrap/arming
/// override, so the "re-read settings once after the override ends" rule of
/// §4.2.1 can be applied.
#[derive(Clone, Copy, Debug, Default)]
pub struct BootstrapTracker {
    was_overridden: bool,
}

impl BootstrapTracker {
    /// Compute the gains in effect for `uptime_ms` / `flight_status`, and
    /// report whether settings should be (re-)read this cycle: always true
    /// the first time, and once more on the first cycle after an override
    /// window ends.
    pub fn gains_for(
        &mut self,
        settings: &AttitudeSettings,
        uptime_ms: u64,
        flight_status: FlightStatus,
    ) -> EffectiveGains {
        let in_uptime_window = uptime_ms >= BOOTSTRAP_START_MS && uptime_ms < BOOTSTRAP_END_MS;
        let arming_zero = settings.zero_during_arming && flight_status == FlightStatus::Arming;
        let overridden = in_uptime_window || arming_zero;

        let gains = if overridden {
            EffectiveGains {
                kp: BOOTSTRAP_KP,
                ki: BOOTSTRAP_KI,
                yaw_bias_rate: BOOTSTRAP_YAW_BIAS_RATE,
                overridden: true,
            }
        } else {
            EffectiveGains {
                kp: settings.accel_kp,
                ki: settings.accel_ki,
                yaw_bias_rate: settings.yaw_bias_rate,
                overridden: false,
            }
        };

        #[cfg(feature = "defmt")]
        if overridden && !self.was_overridden {
            defmt::debug!("bootstrap/arming gain override engaged at uptime={}ms", uptime_ms);
        } else if !overridden && self.was_overridden {
            defmt::debug!("bootstrap/arming gain override released at uptime={}ms", uptime_ms);
        }

        self.was_overridden = overridden;
        gains
    }

    /// `true` on the first cycle after an override window just ended (the
    /// "init" flag transitioning from clear to set in §4.2.1).
    pub fn just_exited_override(&self, gains: &EffectiveGains) -> bool {
        self.was_overridden && !gains.overridden
    }
}

/// Gravity-error vector `e` (§4.2.2): cross product of measured and
/// model-predicted gravity direction, rescaled so its magnitude is the
/// angle between the two (not the chord length of the cross product).
/// Both inputs are assumed unit vectors; if the cross product degenerates
/// to zero (vectors parallel or anti-parallel), `e` is left at zero.
pub fn gravity_error(accel_unit: [f32; 3], grot: [f32; 3]) -> [f32; 3] {
    let e = [
        accel_unit[1] * grot[2] - accel_unit[2] * grot[1],
        accel_unit[2] * grot[0] - accel_unit[0] * grot[2],
        accel_unit[0] * grot[1] - accel_unit[1] * grot[0],
    ];
    let e_norm = (e[0] * e[0] + e[1] * e[1] + e[2] * e[2]).sqrt();
    if e_norm == 0.0 {
        return [0.0, 0.0, 0.0];
    }

    let dot = accel_unit[0] * grot[0] + accel_unit[1] * grot[1] + accel_unit[2] * grot[2];
    let phi = dot.clamp(-1.0, 1.0).acos();
    let scale = phi / e_norm;
    [e[0] * scale, e[1] * scale, e[2] * scale]
}

/// Acceleration gating and centripetal rejection (§4.2.3). `accel` is the
/// corrected, non-unit accelerometer reading in m/s^2; `e` is the gravity
/// error computed from its unit-length direction. Returns the (possibly
/// zeroed or discounted) error vector to feed the PI update.
pub fn gate_and_reject(accel: [f32; 3], mut e: [f32; 3]) -> [f32; 3] {
    let a = (accel[0] * accel[0] + accel[1] * accel[1] + accel[2] * accel[2]).sqrt();

    if a <= ACCEL_GATE_G || a > ACCEL_GATE_HIGH_FACTOR * ACCEL_GATE_G {
        return [0.0, 0.0, 0.0];
    }

    let delta = (ACCEL_GATE_G / a).clamp(-1.0, 1.0).acos();
    let e_norm = (e[0] * e[0] + e[1] * e[1] + e[2] * e[2]).sqrt();
    if e_norm != 0.0 {
        // Preserved verbatim per SPEC_FULL §9: scales by delta/||e||, not
        // (||e||-delta)/||e||. This is the source's heuristic, not a model.
        let scale = delta / e_norm;
        e[0] -= e[0] * scale;
        e[1] -= e[1] * scale;
        e[2] -= e[2] * scale;
    }
    e
}

/// One fusion-stage cycle (§4.2.2 - §4.2.5): compute the gravity error from
/// `accel` (corrected, m/s^2) and `q`, gate/reject it, apply the PI update
/// to `bias` and to the instantaneous gyro rates `gyro` (deg/s, already
/// sensor-corrected), then integrate `q` forward by `dt_ms` milliseconds.
///
/// `Ki` is applied with no `dt` factor despite the source's claim that it
/// has units of seconds (SPEC_FULL §9); preserved as specified.
pub fn update(
    q: &mut Quaternion,
    bias: &mut GyroBias,
    gains: &EffectiveGains,
    accel: [f32; 3],
    gyro: [f32; 3],
    dt_ms: f32,
) {
    let a = (accel[0] * accel[0] + accel[1] * accel[1] + accel[2] * accel[2]).sqrt();
    let grot = q.body_gravity();

    let e = if a > 0.0 {
        let accel_unit = [accel[0] / a, accel[1] / a, accel[2] / a];
        gate_and_reject(accel, gravity_error(accel_unit, grot))
    } else {
        [0.0, 0.0, 0.0]
    };

    bias.x += e[0] * gains.ki;
    bias.y += e[1] * gains.ki;
    // bias.z intentionally left untouched: see GyroBias doc comment.

    let dt = dt_ms.max(1.0);
    let gx = gyro[0] + e[0] * gains.kp / dt;
    let gy = gyro[1] + e[1] * gains.kp / dt;
    let gz = gyro[2] + e[2] * gains.kp / dt;

    q.integrate(gx, gy, gz, dt_ms);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gains(kp: f32, ki: f32) -> EffectiveGains {
        EffectiveGains { kp, ki, yaw_bias_rate: 0.0, overridden: false }
    }

    #[test]
    fn bootstrap_window_overrides_gains() {
        let mut tracker = BootstrapTracker::default();
        let settings = AttitudeSettings::default();
        for uptime in [1000u64, 3500, 6999] {
            let g = tracker.gains_for(&settings, uptime, FlightStatus::Disarmed);
            assert_eq!(g.kp, 1.0);
            assert_eq!(g.ki, 0.9);
            assert_eq!(g.yaw_bias_rate, 0.23);
            assert!(g.overridden);
        }
    }

    #[test]
    fn outside_bootstrap_window_uses_settings() {
        let mut tracker = BootstrapTracker::default();
        let settings = AttitudeSettings::default();
        let g = tracker.gains_for(&settings, 60_000, FlightStatus::Disarmed);
        assert_eq!(g.kp, settings.accel_kp);
        assert_eq!(g.ki, settings.accel_ki);
        assert!(!g.overridden);
    }

    #[test]
    fn arming_zero_overrides_regardless_of_uptime() {
        let mut tracker = BootstrapTracker::default();
        let mut settings = AttitudeSettings::default();
        settings.zero_during_arming = true;
        let g = tracker.gains_for(&settings, 500_000, FlightStatus::Arming);
        assert_eq!(g.kp, 1.0);
        assert_eq!(g.yaw_bias_rate, 0.23);
    }

    #[test]
    fn init_flag_sets_on_first_cycle_after_override() {
        let mut tracker = BootstrapTracker::default();
        let settings = AttitudeSettings::default();
        let during = tracker.gains_for(&settings, 1500, FlightStatus::Disarmed);
        assert!(!tracker.just_exited_override(&during));
        let after = tracker.gains_for(&settings, 7000, FlightStatus::Disarmed);
        assert!(tracker.just_exited_override(&after));
        let again = tracker.gains_for(&settings, 7002, FlightStatus::Disarmed);
        assert!(!tracker.just_exited_override(&again));
    }

    #[test]
    fn acceleration_rejection_zeroes_error_above_high_g() {
        let accel = [0.0, 0.0, -20.0];
        let a = 20.0f32;
        let grot = [0.0, 0.0, -1.0];
        let e = gravity_error([accel[0] / a, accel[1] / a, accel[2] / a], grot);
        let gated = gate_and_reject(accel, e);
        assert_eq!(gated, [0.0, 0.0, 0.0]);
    }

    #[test]
    fn free_fall_zeroes_error() {
        let accel = [0.0, 0.0, -1.0];
        let gated = gate_and_reject(accel, [1.0, 1.0, 1.0]);
        assert_eq!(gated, [0.0, 0.0, 0.0]);
    }

    #[test]
    fn zero_input_holds_identity_for_10k_cycles() {
        let mut q = Quaternion::IDENTITY;
        let mut bias = GyroBias::default();
        let g = gains(0.05, 0.0001);
        for _ in 0..10_000 {
            update(&mut q, &mut bias, &g, [0.0, 0.0, -9.81], [0.0, 0.0, 0.0], 2.0);
        }
        assert!((q.norm() - 1.0).abs() < 1e-6);
        let (roll, pitch, yaw) = q.euler_deg();
        assert!(roll.abs() < 1e-2, "roll={roll}");
        assert!(pitch.abs() < 1e-2, "pitch={pitch}");
        let _ = yaw; // yaw is unobservable; not asserted.
    }

    #[test]
    fn gravity_alignment_converges_within_5000_cycles() {
        let theta = 20.0f32.to_radians();
        let accel = [0.0, 9.81 * theta.sin(), -9.81 * theta.cos()];
        let mut q = Quaternion::IDENTITY;
        let mut bias = GyroBias::default();
        let g = gains(0.05, 0.0001);
        for _ in 0..5_000 {
            update(&mut q, &mut bias, &g, accel, [0.0, 0.0, 0.0], 2.0);
        }
        let (_, pitch, _) = q.euler_deg();
        assert!((pitch - 20.0).abs() < 1.0, "pitch={pitch}");
    }

    #[test]
    fn renormalization_idempotence_on_doubled_identity() {
        let mut q = Quaternion { q0: 2.0, q1: 0.0, q2: 0.0, q3: 0.0 };
        let mut bias = GyroBias::default();
        let g = gains(0.0, 0.0);
        update(&mut q, &mut bias, &g, [0.0, 0.0, -9.81], [0.0, 0.0, 0.0], 2.0);
        assert!((q.norm() - 1.0).abs() < 1e-6);
    }
}
