//! Body-to-world orientation quaternion and the integration step used by the
//! fusion stage.

use micromath::F32Ext;

/// Scalar-first unit quaternion, `q0 >= 0` by convention (see [`Quaternion::canonicalize`]).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Quaternion {
    pub q0: f32,
    pub q1: f32,
    pub q2: f32,
    pub q3: f32,
}

/// Quaternion norm below which the state is considered degenerate and reset.
pub const MIN_NORM: f32 = 1e-3;

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Quaternion {
    pub const IDENTITY: Self = Self { q0: 1.0, q1: 0.0, q2: 0.0, q3: 0.0 };

    pub fn norm(&self) -> f32 {
        (self.q0 * self.q0 + self.q1 * self.q1 + self.q2 * self.q2 + self.q3 * self.q3).sqrt()
    }

    /// Negate all four components if `q0 < 0`, so the quaternion always sits
    /// in the `q0 >= 0` hemisphere.
    pub fn canonicalize(&mut self) {
        if self.q0 < 0.0 {
            self.q0 = -self.q0;
            self.q1 = -self.q1;
            self.q2 = -self.q2;
            self.q3 = -self.q3;
        }
    }

    /// Renormalize in place. Returns `false` (and resets to identity) if the
    /// norm is degenerate (`< MIN_NORM`) or NaN.
    pub fn renormalize(&mut self) -> bool {
        let n = self.norm();
        if n < MIN_NORM || n != n {
            #[cfg(feature = "defmt")]
            defmt::trace!("quaternion degenerate (norm={}), reset to identity", n);
            *self = Self::IDENTITY;
            return false;
        }
        let inv_n = n.recip();
        self.q0 *= inv_n;
        self.q1 *= inv_n;
        self.q2 *= inv_n;
        self.q3 *= inv_n;
        true
    }

    /// Integrate forward by body rates `(gx, gy, gz)` in deg/s over `dt_ms`
    /// milliseconds, per §4.2.5: rad and the one-half factor are folded into
    /// the `dt * pi / 360` coefficient.
    pub fn integrate(&mut self, gx: f32, gy: f32, gz: f32, dt_ms: f32) {
        let q0 = self.q0;
        let q1 = self.q1;
        let q2 = self.q2;
        let q3 = self.q3;

        let k = dt_ms * core::f32::consts::PI / 360.0;

        let qdot0 = (-q1 * gx - q2 * gy - q3 * gz) * k;
        let qdot1 = (q0 * gx - q3 * gy + q2 * gz) * k;
        let qdot2 = (q3 * gx + q0 * gy - q1 * gz) * k;
        let qdot3 = (-q2 * gx + q1 * gy + q0 * gz) * k;

        self.q0 = q0 + qdot0;
        self.q1 = q1 + qdot1;
        self.q2 = q2 + qdot2;
        self.q3 = q3 + qdot3;

        self.canonicalize();
        self.renormalize();
    }

    /// Down direction `(0,0,-1)` expressed in body frame via this quaternion,
    /// per §4.2.2.
    pub fn body_gravity(&self) -> [f32; 3] {
        let (q0, q1, q2, q3) = (self.q0, self.q1, self.q2, self.q3);
        [
            -2.0 * (q1 * q3 - q0 * q2),
            -2.0 * (q2 * q3 + q0 * q1),
            -(q0 * q0 - q1 * q1 - q2 * q2 + q3 * q3),
        ]
    }

    /// Roll/pitch/yaw in degrees, RPY order, matching the convention used
    /// elsewhere in this codebase's AHRS/EKF modules.
    pub fn euler_deg(&self) -> (f32, f32, f32) {
        let (q0, q1, q2, q3) = (self.q0, self.q1, self.q2, self.q3);

        let sinr_cosp = 2.0 * (q0 * q1 + q2 * q3);
        let cosr_cosp = 1.0 - 2.0 * (q1 * q1 + q2 * q2);
        let roll = sinr_cosp.atan2(cosr_cosp);

        let sinp = 2.0 * (q0 * q2 - q3 * q1);
        let pitch = if sinp.abs() >= 1.0 {
            core::f32::consts::FRAC_PI_2.copysign(sinp)
        } else {
            sinp.asin()
        };

        let siny_cosp = 2.0 * (q0 * q3 + q1 * q2);
        let cosy_cosp = 1.0 - 2.0 * (q2 * q2 + q3 * q3);
        let yaw = siny_cosp.atan2(cosy_cosp);

        (roll.to_degrees(), pitch.to_degrees(), yaw.to_degrees())
    }
}
