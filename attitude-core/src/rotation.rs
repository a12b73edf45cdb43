//! Board-mount rotation matrix: RPY settings → quaternion → 3×3 matrix,
//! applied to sensor vectors ahead of bias/scale correction.

use micromath::F32Ext;

use crate::quaternion::Quaternion;

/// Row-major 3×3 matrix.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Mat3(pub [[f32; 3]; 3]);

impl Mat3 {
    pub const IDENTITY: Self = Self([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);

    pub fn apply(&self, v: [f32; 3]) -> [f32; 3] {
        let m = &self.0;
        [
            m[0][0] * v[0] + m[0][1] * v[1] + m[0][2] * v[2],
            m[1][0] * v[0] + m[1][1] * v[1] + m[1][2] * v[2],
            m[2][0] * v[0] + m[2][1] * v[1] + m[2][2] * v[2],
        ]
    }

    /// `true` if every row (and column) is unit length and mutually
    /// orthogonal, within a loose tolerance suitable for f32 round trips.
    pub fn is_orthonormal(&self, eps: f32) -> bool {
        let m = &self.0;
        for row in m.iter() {
            let n2 = row[0] * row[0] + row[1] * row[1] + row[2] * row[2];
            if (n2 - 1.0).abs() > eps {
                return false;
            }
        }
        for i in 0..3 {
            for j in (i + 1)..3 {
                let dot = m[i][0] * m[j][0] + m[i][1] * m[j][1] + m[i][2] * m[j][2];
                if dot.abs() > eps {
                    return false;
                }
            }
        }
        true
    }
}

/// Build the board-mount quaternion from roll/pitch/yaw degrees, then the
/// corresponding rotation matrix. `rpy_deg = [roll, pitch, yaw]`.
pub fn rpy_to_matrix(rpy_deg: [f32; 3]) -> Mat3 {
    let q = rpy_to_quaternion(rpy_deg);
    quaternion_to_matrix(&q)
}

fn rpy_to_quaternion(rpy_deg: [f32; 3]) -> Quaternion {
    let half_roll = rpy_deg[0].to_radians() * 0.5;
    let half_pitch = rpy_deg[1].to_radians() * 0.5;
    let half_yaw = rpy_deg[2].to_radians() * 0.5;

    let (sr, cr) = (half_roll.sin(), half_roll.cos());
    let (sp, cp) = (half_pitch.sin(), half_pitch.cos());
    let (sy, cy) = (half_yaw.sin(), half_yaw.cos());

    let mut q = Quaternion {
        q0: cr * cp * cy + sr * sp * sy,
        q1: sr * cp * cy - cr * sp * sy,
        q2: cr * sp * cy + sr * cp * sy,
        q3: cr * cp * sy - sr * sp * cy,
    };
    q.canonicalize();
    q.renormalize();
    q
}

fn quaternion_to_matrix(q: &Quaternion) -> Mat3 {
    let (q0, q1, q2, q3) = (q.q0, q.q1, q.q2, q.q3);
    Mat3([
        [
            q0 * q0 + q1 * q1 - q2 * q2 - q3 * q3,
            2.0 * (q1 * q2 - q0 * q3),
            2.0 * (q1 * q3 + q0 * q2),
        ],
        [
            2.0 * (q1 * q2 + q0 * q3),
            q0 * q0 - q1 * q1 + q2 * q2 - q3 * q3,
            2.0 * (q2 * q3 - q0 * q1),
        ],
        [
            2.0 * (q1 * q3 - q0 * q2),
            2.0 * (q2 * q3 + q0 * q1),
            q0 * q0 - q1 * q1 - q2 * q2 + q3 * q3,
        ],
    ])
}
