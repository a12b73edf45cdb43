//! The one user-facing configuration surface (§4.6): complementary-filter
//! gains, sensor biases, board mount rotation, and the two behavior flags.
//! Persistence and a CLI to edit these live outside this crate (§1); this
//! module only has to be cheap to copy across the settings/attitude task
//! boundary and to derive the rotation matrix from.

use crate::rotation::{rpy_to_matrix, Mat3};

/// Consumed record: `Armed` field of the flight-status broker entry (§6).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlightStatus {
    #[default]
    Disarmed,
    Arming,
    Armed,
}

/// Consumed record: attitude settings (§6), values as stored by the
/// out-of-scope settings broker (gyro bias ×100, angles in degrees).
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AttitudeSettings {
    pub accel_kp: f32,
    pub accel_ki: f32,
    pub yaw_bias_rate: f32,
    pub gyro_gain: f32,
    pub accel_bias: [i32; 3],
    /// Persisted ×100; divide by 100 to seed the bias integral (§4.4).
    pub gyro_bias: [i32; 3],
    pub board_rotation_deg: [f32; 3],
    pub zero_during_arming: bool,
    pub bias_correct_gyro: bool,
}

impl Default for AttitudeSettings {
    fn default() -> Self {
        Self {
            accel_kp: 0.05,
            accel_ki: 0.0001,
            yaw_bias_rate: 0.0,
            gyro_gain: 0.42,
            accel_bias: [0, 0, 0],
            gyro_bias: [0, 0, 0],
            board_rotation_deg: [0.0, 0.0, 0.0],
            zero_during_arming: false,
            bias_correct_gyro: true,
        }
    }
}

/// A snapshot of settings plus the derived rotation matrix — what the §4.4
/// notifier actually hands the attitude task. Rebuilding `rotation`/`rotate`
/// from `board_rotation_deg` on every settings change (rather than on every
/// cycle) keeps the per-cycle sensor stage to a single matrix multiply.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SettingsSnapshot {
    pub settings: AttitudeSettings,
    pub rotation: Mat3,
    pub rotate: bool,
}

impl Default for SettingsSnapshot {
    fn default() -> Self {
        Self::from_settings(AttitudeSettings::default())
    }
}

impl SettingsSnapshot {
    pub fn from_settings(settings: AttitudeSettings) -> Self {
        let rpy = settings.board_rotation_deg;
        let rotate = rpy[0] != 0.0 || rpy[1] != 0.0 || rpy[2] != 0.0;
        let rotation = if rotate { rpy_to_matrix(rpy) } else { Mat3::IDENTITY };
        Self { settings, rotation, rotate }
    }

    /// Seed the gyro-bias integral from `gyro_bias` (stored ×100), per §4.4.
    pub fn seeded_gyro_bias(&self) -> [f32; 3] {
        [
            self.settings.gyro_bias[0] as f32 / 100.0,
            self.settings.gyro_bias[1] as f32 / 100.0,
            self.settings.gyro_bias[2] as f32 / 100.0,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_board_rotation_disables_rotate_and_is_identity() {
        let snap = SettingsSnapshot::from_settings(AttitudeSettings::default());
        assert!(!snap.rotate);
        assert_eq!(snap.rotation, Mat3::IDENTITY);
    }

    #[test]
    fn nonzero_board_rotation_enables_rotate() {
        let mut s = AttitudeSettings::default();
        s.board_rotation_deg = [180.0, 0.0, 0.0];
        let snap = SettingsSnapshot::from_settings(s);
        assert!(snap.rotate);
        assert!(snap.rotation.is_orthonormal(1e-4));
    }

    #[test]
    fn gyro_bias_seed_divides_by_100() {
        let mut s = AttitudeSettings::default();
        s.gyro_bias = [150, -50, 0];
        let snap = SettingsSnapshot::from_settings(s);
        let b = snap.seeded_gyro_bias();
        assert!((b[0] - 1.5).abs() < 1e-6);
        assert!((b[1] - (-0.5)).abs() < 1e-6);
        assert!((b[2]).abs() < 1e-6);
    }
}
