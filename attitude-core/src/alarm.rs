//! The alarm/watchdog subsystem is an out-of-scope primitive the core merely
//! calls (§1, §6); these traits are the boundary, implemented by firmware
//! over real hardware and by an in-memory recorder in tests.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AlarmSeverity {
    Ok,
    Error,
    Critical,
}

/// Set/clear the ATTITUDE alarm at a given severity (§6, §7).
pub trait Alarm {
    fn set(&mut self, severity: AlarmSeverity);

    fn clear(&mut self) {
        self.set(AlarmSeverity::Ok);
    }
}

/// Kick the hardware watchdog once per cycle (§5). Failing to kick before
/// the wait elapses reboots the board; that behavior lives entirely in the
/// watchdog peripheral and is out of scope here.
pub trait Watchdog {
    fn kick(&mut self);
}

/// No-op implementations, useful for call sites (tests, the startup gate
/// before a real watchdog handle exists) that don't need either facility.
impl Alarm for () {
    fn set(&mut self, _severity: AlarmSeverity) {}
}

impl Watchdog for () {
    fn kick(&mut self) {}
}
