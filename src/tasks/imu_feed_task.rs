use embassy_executor::task;
use embassy_stm32::peripherals::SPI1;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Sender;
use embassy_time::{Duration, Ticker};

use crate::accel_fifo::SharedAccelFifo;
use crate::drivers::icm42688::Icm42688;

/// ADC poll rate feeding both queues (§5: "the ADC is configured at
/// `ADC_RATE / 1000 · UPDATE_RATE` samples per period" — at 2 ms/500 Hz
/// update rate this keeps roughly one gyro sample and a handful of accel
/// samples available per attitude-task cycle).
const ADC_RATE_HZ: u64 = 1000;

/// Polls the IMU at ADC rate and feeds the gyro queue and the shared accel
/// FIFO. Grounded on `fast_loop_task`'s own IMU-read-then-publish shape,
/// split out of the fusion loop itself per SPEC_FULL §9 ("hidden periodic
/// scheduling" note: the fusion loop is driven by the gyro queue, not a
/// timer, so the timer-driven polling has to live in its own task).
#[task]
pub async fn imu_feed_task(
    mut imu: Icm42688<'static, SPI1>,
    gyro_tx: Sender<'static, CriticalSectionRawMutex, [f32; 4], 4>,
    accel_fifo: &'static SharedAccelFifo,
) {
    let mut ticker = Ticker::every(Duration::from_hz(ADC_RATE_HZ));
    loop {
        ticker.next().await;

        if let Ok((accel, gyro)) = imu.read_all().await {
            // Gyro queue format is [temp, x, y, z] raw counts (§4.1, §6);
            // this driver has no onboard temperature channel, so temp is
            // reported as zero rather than invented.
            let _ = gyro_tx.try_send([0.0, gyro[0] as f32, gyro[1] as f32, gyro[2] as f32]);
            accel_fifo.push([accel[0] as i32, accel[1] as i32, accel[2] as i32]);
        }
    }
}
