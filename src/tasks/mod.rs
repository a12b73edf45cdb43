pub mod attitude_task;
pub mod imu_feed_task;
pub mod settings_task;
