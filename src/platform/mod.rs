//! Seams to the host's alarm, notification, power, vibration and audio
//! services. The daemon never reimplements these; it only calls into them.

use std::{path::Path, sync::Arc, time::Duration};

use crate::{
    alarm::{AlarmId, PendingTrigger},
    error::Result,
    notification::{
        NotificationChannel, NotificationKey, NotificationRecord, VibrationPattern, ALARM_CHANNEL,
        REMINDER_CHANNEL,
    },
};

pub mod memory;

/// Exact, "alarm clock" class wake triggers that may wake a dozing device.
pub trait AlarmClock: Send + Sync {
    /// Whether the user has consented to exact wake-ups.
    fn can_schedule_exact(&self) -> bool;

    /// Asks the user for consent. The answer shows up later through
    /// [`AlarmClock::can_schedule_exact`].
    fn request_exact_permission(&self);

    /// Registers `trigger`, replacing any trigger with the same id.
    ///
    /// # Errors
    /// If the host refuses the registration.
    fn set_alarm_clock(&self, trigger: PendingTrigger) -> Result<()>;

    /// Returns whether a trigger was actually removed.
    fn cancel(&self, id: AlarmId) -> bool;

    fn pending(&self) -> Vec<PendingTrigger>;
}

/// Taps and action presses come back out of band, as
/// [`crate::notification::Interaction`]s resolved against the posted record.
pub trait Notifier: Send + Sync {
    /// Idempotent.
    fn create_channel(&self, channel: &NotificationChannel);

    /// Shows `record`, replacing a shown notification with the same key.
    fn post(&self, record: &NotificationRecord);

    fn cancel(&self, key: NotificationKey);
}

pub trait Vibrator: Send + Sync {
    fn one_shot(&self, duration: Duration);

    /// Replaces whatever is currently vibrating.
    fn waveform(&self, pattern: &VibrationPattern);

    fn cancel(&self);
}

pub trait WakeLock: Send {
    /// False once released or once the timeout has elapsed.
    fn is_held(&self) -> bool;

    /// Releasing twice is a no-op.
    fn release(&mut self);
}

pub trait PowerManager: Send + Sync {
    /// Acquires a lock that lapses on its own after `timeout`.
    fn acquire_wake_lock(&self, tag: &str, timeout: Duration) -> Box<dyn WakeLock>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioUsage {
    Alarm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioContent {
    Sonification,
}

/// Tags playback so the host can route it past media muting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioProfile {
    pub usage: AudioUsage,
    pub content: AudioContent,
}

impl AudioProfile {
    pub const ALARM: Self = Self {
        usage: AudioUsage::Alarm,
        content: AudioContent::Sonification,
    };
}

pub trait Playback: Send {
    fn is_playing(&self) -> bool;

    /// Stops and releases the player. Stopping twice is a no-op.
    fn stop(&mut self);
}

pub trait AudioOutput: Send + Sync {
    /// Starts looping `tone` until the returned handle is stopped.
    ///
    /// # Errors
    /// [`crate::Error::PlaybackFailure`] when the tone can't be played.
    fn play_looping(&self, tone: &Path, profile: AudioProfile) -> Result<Box<dyn Playback>>;
}

/// Keeps the hosting process privileged while a session rings.
pub trait ForegroundHost: Send + Sync {
    fn start_foreground(&self, notification: &NotificationRecord);

    fn stop_foreground(&self);
}

/// All host facilities the daemon uses.
#[derive(Clone)]
pub struct Platform {
    pub clock: Arc<dyn AlarmClock>,
    pub notifier: Arc<dyn Notifier>,
    pub vibrator: Arc<dyn Vibrator>,
    pub power: Arc<dyn PowerManager>,
    pub audio: Arc<dyn AudioOutput>,
    pub host: Arc<dyn ForegroundHost>,
}

impl Platform {
    /// Registers the alarm and reminder channels. Safe to call on every start.
    pub fn create_channels(&self) {
        self.notifier.create_channel(&ALARM_CHANNEL);
        self.notifier.create_channel(&REMINDER_CHANNEL);
    }
}

impl std::fmt::Debug for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Platform").finish_non_exhaustive()
    }
}
