use embassy_executor::task;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Ticker};

use attitude_core::settings::{AttitudeSettings, SettingsSnapshot};

/// Stands in for the out-of-scope settings-broker subscription (§4.4): the
/// broker itself — persistence, a CLI to edit values — is explicitly out of
/// scope (§1). What this task owns is the landing zone: it polls a source
/// function for the current settings and republishes a `SettingsSnapshot`
/// onto the `Signal` whenever it changes, so `attitude_task` always has a
/// snapshot to pick up on the next `try_take` even before any real broker
/// exists.
#[task]
pub async fn settings_task(
    signal: &'static Signal<CriticalSectionRawMutex, SettingsSnapshot>,
    settings_source: fn() -> AttitudeSettings,
) {
    let mut last = settings_source();
    signal.signal(SettingsSnapshot::from_settings(last));

    let mut ticker = Ticker::every(Duration::from_millis(250));
    loop {
        ticker.next().await;
        let current = settings_source();
        if current != last {
            last = current;
            signal.signal(SettingsSnapshot::from_settings(current));
        }
    }
}
