use std::time::{Duration, Instant};

use log::{debug, info};

use crate::{
    notification::VibrationPattern,
    platform::{PowerManager, Vibrator, WakeLock},
};

/// For machines without a vibration motor.
#[derive(Debug, Default)]
pub struct LogVibrator;

impl Vibrator for LogVibrator {
    fn one_shot(&self, duration: Duration) {
        debug!("vibrate once for {}ms", duration.as_millis());
    }

    fn waveform(&self, pattern: &VibrationPattern) {
        debug!(
            "vibrate {:?}ms, repeat from {:?}",
            pattern.timings_ms, pattern.repeat
        );
    }

    fn cancel(&self) {
        debug!("vibration cancelled");
    }
}

/// Wake locks that only keep their bookkeeping, lapsing at the deadline.
#[derive(Debug, Default)]
pub struct DeadlinePowerManager;

#[derive(Debug)]
struct DeadlineWakeLock {
    tag: String,
    /// `None` when the timeout is too far out to represent
    deadline: Option<Instant>,
    released: bool,
}

impl WakeLock for DeadlineWakeLock {
    fn is_held(&self) -> bool {
        !self.released && self.deadline.map_or(true, |deadline| Instant::now() < deadline)
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            info!("wake lock {} released", self.tag);
        }
    }
}

impl PowerManager for DeadlinePowerManager {
    fn acquire_wake_lock(&self, tag: &str, timeout: Duration) -> Box<dyn WakeLock> {
        info!("wake lock {tag} acquired for {}s", timeout.as_secs());
        Box::new(DeadlineWakeLock {
            tag: tag.to_string(),
            deadline: Instant::now().checked_add(timeout),
            released: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wake_lock_lapses_at_its_deadline() {
        let lock = DeadlinePowerManager.acquire_wake_lock("test", Duration::ZERO);
        assert!(!lock.is_held());
    }

    #[test]
    fn released_wake_lock_is_not_held() {
        let mut lock = DeadlinePowerManager.acquire_wake_lock("test", Duration::from_secs(60));
        assert!(lock.is_held());
        lock.release();
        lock.release();
        assert!(!lock.is_held());
    }
}
