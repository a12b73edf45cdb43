//! Pure attitude-estimation logic shared by the firmware binary and by
//! plain host-side tests: quaternion algebra, sensor correction, the
//! complementary filter, bootstrap scheduling, settings/rotation handling,
//! and the driver/alarm/watchdog trait boundary the firmware crate wires
//! to real peripherals.
#![cfg_attr(not(test), no_std)]

pub mod alarm;
pub mod driver;
pub mod error;
pub mod estimator;
pub mod fusion;
pub mod quaternion;
pub mod rotation;
pub mod sensor;
pub mod settings;

pub use error::AttitudeError;
pub use estimator::{AttitudeEstimator, AttitudeRecord, RawRecord};
pub use quaternion::Quaternion;
pub use settings::{AttitudeSettings, FlightStatus, SettingsSnapshot};
