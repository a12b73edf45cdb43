//! Hardware-backed `attitude_core::alarm` trait impls: a status LED stands
//! in for the ATTITUDE alarm indicator, and the independent watchdog
//! peripheral backs `Watchdog` (§4.5, §6, §7).

use attitude_core::alarm::{Alarm, AlarmSeverity, Watchdog};
use embassy_stm32::gpio::{AnyPin, Output};
use embassy_stm32::wdg::IndependentWatchdog;

/// Off at OK, solid on at ERROR/CRITICAL. A real alarm bus (distinct
/// severities over CAN/telemetry) is out of scope (§1); the LED is the only
/// indicator this board has.
pub struct LedAlarm {
    led: Output<'static, AnyPin>,
}

impl LedAlarm {
    pub fn new(led: Output<'static, AnyPin>) -> Self {
        Self { led }
    }
}

impl Alarm for LedAlarm {
    fn set(&mut self, severity: AlarmSeverity) {
        match severity {
            AlarmSeverity::Ok => self.led.set_low(),
            AlarmSeverity::Error | AlarmSeverity::Critical => self.led.set_high(),
        }
    }
}

pub struct HardwareWatchdog {
    iwdg: IndependentWatchdog<'static, embassy_stm32::peripherals::IWDG>,
}

impl HardwareWatchdog {
    pub fn new(iwdg: IndependentWatchdog<'static, embassy_stm32::peripherals::IWDG>) -> Self {
        Self { iwdg }
    }
}

impl Watchdog for HardwareWatchdog {
    fn kick(&mut self) {
        self.iwdg.pet();
    }
}
