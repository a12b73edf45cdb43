//! Sensor stage (§4.1): drain the gyro queue and the accelerometer FIFO,
//! apply axis conventions, board-mount rotation, bias/scale correction, and
//! the yaw-bias sink.

use crate::driver::{AccelFifo, MAX_ACCEL_DRAIN};
use crate::error::AttitudeError;
use crate::fusion::GyroBias;
use crate::settings::SettingsSnapshot;

/// Neutral (zero-rate) ADC reading for the gyro, raw counts (§4.1).
pub const GYRO_NEUTRAL: f32 = 1665.0;
/// Accel raw-count-to-m/s^2 scale: `0.004 g/count * 9.81 m/s^2/g` (§4.1).
pub const ACCEL_COUNT_SCALE: f32 = 0.004 * 9.81;

/// Corrected sensor reading plus the diagnostic counters published in the
/// raw record (§6).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SensorReading {
    /// Corrected gyro rates, deg/s.
    pub gyro: [f32; 3],
    /// Corrected accel, m/s^2.
    pub accel: [f32; 3],
    pub samples_consumed: usize,
    pub samples_remaining: usize,
}

/// Apply the sensor→body sign mapping to one raw gyro sample
/// `[temp, x_raw, y_raw, z_raw]` (§4.1, bit-exact).
pub fn correct_gyro_axes(raw: [f32; 4], gyro_gain: f32) -> [f32; 3] {
    [
        -(raw[1] - GYRO_NEUTRAL) * gyro_gain,
        (raw[2] - GYRO_NEUTRAL) * gyro_gain,
        -(raw[3] - GYRO_NEUTRAL) * gyro_gain,
    ]
}

/// Drain up to `MAX_ACCEL_DRAIN` samples from the FIFO, returning the
/// sensor→body-signed sum, the count consumed, and the count remaining
/// after the drain (§4.1).
fn drain_accel(fifo: &mut impl AccelFifo) -> Option<([f32; 3], usize, usize)> {
    if fifo.fifo_elements() == 0 {
        return None;
    }

    let mut sum = [0i64; 3];
    let mut consumed = 0usize;
    let mut remaining = fifo.fifo_elements();

    while consumed < MAX_ACCEL_DRAIN {
        match fifo.pop() {
            Some((sample, rem)) => {
                sum[0] += sample[0] as i64;
                sum[1] += sample[1] as i64;
                sum[2] += sample[2] as i64;
                consumed += 1;
                remaining = rem;
            }
            None => break,
        }
    }

    // Axis sign convention applied to the sum before averaging (§4.1).
    let signed = [sum[0] as f32, -(sum[1] as f32), -(sum[2] as f32)];
    Some((signed, consumed, remaining))
}

/// Run the sensor stage for one cycle. `gyro_raw` is the sample already
/// popped from the gyro queue by the caller (the blocking receive-with-
/// timeout is firmware's concern, §4.1/§5); `accel_fifo` is drained here.
/// `bias` is the shared gyro-bias integral: read for correction, and its
/// `z` component updated by the yaw-bias sink unconditionally on return.
pub fn read(
    gyro_raw: [f32; 4],
    accel_fifo: &mut impl AccelFifo,
    settings: &SettingsSnapshot,
    yaw_bias_rate: f32,
    bias: &mut GyroBias,
) -> Result<SensorReading, AttitudeError> {
    let (accel_sum, consumed, remaining) =
        drain_accel(accel_fifo).ok_or(AttitudeError::AccelFifoEmpty)?;

    let mut accel = [
        accel_sum[0] / consumed as f32,
        accel_sum[1] / consumed as f32,
        accel_sum[2] / consumed as f32,
    ];
    let mut gyro = correct_gyro_axes(gyro_raw, settings.settings.gyro_gain);

    if settings.rotate {
        accel = settings.rotation.apply(accel);
        gyro = settings.rotation.apply(gyro);
    }

    for i in 0..3 {
        let ab = settings.settings.accel_bias[i] as f32;
        accel[i] = (accel[i] - ab) * ACCEL_COUNT_SCALE;
    }

    if settings.settings.bias_correct_gyro {
        gyro[0] += bias.x;
        gyro[1] += bias.y;
        gyro[2] += bias.z;
    }

    // Yaw-bias sink (§4.1): unconditional, uses the final corrected gyro_z.
    bias.z -= gyro[2] * yaw_bias_rate;

    Ok(SensorReading { gyro, accel, samples_consumed: consumed, samples_remaining: remaining })
}
