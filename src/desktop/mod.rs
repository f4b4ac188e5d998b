//! Facilities for running the daemon on a desktop session.

mod audio;
mod clock;
mod device;
mod notify;

pub use audio::RodioOutput;
pub use clock::TimerAlarmClock;
pub use device::{DeadlinePowerManager, LogVibrator};
pub use notify::{DesktopHost, DesktopNotifier};
