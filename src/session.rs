//! The ringing alarm session.
//!
//! A session is `Idle` until the first alarm-kind delivery and stays
//! `Ringing` until [`AlarmSession::stop`]. Deliveries that arrive while it
//! rings are merged into one presentation: one notification, one player,
//! one vibration and one wake lock, however many alarms went off.
//!
//! Every transition runs under a single mutex so the title bookkeeping and
//! the resource acquisition it drives are observed together.

use std::{
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    alarm::{AlarmKind, Delivery, DEFAULT_BODY},
    config::Tones,
    error::{Error, Result},
    notification::{NotificationKey, NotificationRecord, ALARM_WAVEFORM},
    platform::{AudioProfile, Platform, Playback, WakeLock},
    store::{RingingState, SessionMarker},
};

pub const WAKE_LOCK_TAG: &str = "habit_alarmd:alarm-session";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Idle,
    Ringing,
}

/// Point-in-time view of the session, safe to hand to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub titles: Vec<String>,
    pub combined_title: String,
    pub combined_body: String,
    pub playing: bool,
    pub vibrating: bool,
    pub wake_lock_held: bool,
    pub foreground: bool,
}

#[derive(Default)]
struct SessionState {
    /// distinct titles, first-seen order
    titles: Vec<String>,
    playback: Option<Box<dyn Playback>>,
    vibrating: bool,
    wake_lock: Option<Box<dyn WakeLock>>,
    foreground: bool,
    audio_requested: bool,
    vibrate_requested: bool,
}

impl SessionState {
    fn is_ringing(&self) -> bool {
        !self.titles.is_empty()
    }

    fn is_playing(&self) -> bool {
        self.playback.as_ref().is_some_and(|p| p.is_playing())
    }

    fn holds_wake_lock(&self) -> bool {
        self.wake_lock.as_ref().is_some_and(|l| l.is_held())
    }

    fn combined_title(&self) -> String {
        self.titles.join(", ")
    }

    fn combined_body(&self) -> String {
        if self.titles.is_empty() {
            DEFAULT_BODY.to_string()
        } else {
            format!("Time for: {}", self.combined_title())
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            status: if self.is_ringing() {
                SessionStatus::Ringing
            } else {
                SessionStatus::Idle
            },
            titles: self.titles.clone(),
            combined_title: self.combined_title(),
            combined_body: self.combined_body(),
            playing: self.is_playing(),
            vibrating: self.vibrating,
            wake_lock_held: self.holds_wake_lock(),
            foreground: self.foreground,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub tones: Tones,
    pub wake_lock_timeout: Duration,
    /// where to note what's ringing, `None` keeps it in memory only
    pub marker: Option<SessionMarker>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            tones: Tones::default(),
            wake_lock_timeout: Duration::from_secs(10 * 60),
            marker: None,
        }
    }
}

/// Owns the player, the vibration channel and the wake lock while an alarm
/// rings. Nothing else starts or stops them.
pub struct AlarmSession {
    platform: Platform,
    options: SessionOptions,
    state: Mutex<SessionState>,
}

impl std::fmt::Debug for AlarmSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlarmSession")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl AlarmSession {
    #[must_use]
    pub fn new(platform: Platform, options: SessionOptions) -> Self {
        Self {
            platform,
            options,
            state: Mutex::new(SessionState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        if self.lock().is_ringing() {
            SessionStatus::Ringing
        } else {
            SessionStatus::Idle
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.lock().snapshot()
    }

    /// Starts ringing, or merges `delivery` into the session already ringing.
    ///
    /// Reminder deliveries never reach this point; they are ignored here so
    /// the state machine can't be moved by one.
    pub fn deliver(&self, delivery: &Delivery) -> SessionSnapshot {
        let mut state = self.lock();
        if delivery.kind != AlarmKind::Alarm {
            warn!("alarm {} is a reminder, not starting a session", delivery.id);
            return state.snapshot();
        }
        let was_ringing = state.is_ringing();

        if !state.titles.contains(&delivery.title) {
            state.titles.push(delivery.title.clone());
        }
        let title = state.combined_title();
        let body = state.combined_body();

        if !state.holds_wake_lock() {
            if let Some(mut stale) = state.wake_lock.take() {
                stale.release();
            }
            state.wake_lock = Some(
                self.platform
                    .power
                    .acquire_wake_lock(WAKE_LOCK_TAG, self.options.wake_lock_timeout),
            );
        }

        let record = NotificationRecord::ringing(&title, &body);
        self.platform.notifier.post(&record);

        if delivery.audio {
            state.audio_requested = true;
            if !state.is_playing() {
                if let Some(mut finished) = state.playback.take() {
                    finished.stop();
                }
                match self.start_playback() {
                    Ok(playback) => state.playback = Some(playback),
                    // the session rings on without sound
                    Err(e) => warn!("alarm {}: {e}", delivery.id),
                }
            }
        }

        if delivery.vibrate {
            state.vibrate_requested = true;
            if !state.vibrating {
                self.platform.vibrator.waveform(&ALARM_WAVEFORM);
                state.vibrating = true;
            }
        }

        if !state.foreground {
            self.platform.host.start_foreground(&record);
            state.foreground = true;
        }

        self.write_marker(&state);
        if was_ringing {
            info!("alarm {} merged into ringing session: {title}", delivery.id);
        } else {
            info!("alarm {} started ringing: {title}", delivery.id);
        }
        state.snapshot()
    }

    fn start_playback(&self) -> Result<Box<dyn Playback>> {
        let tone = self
            .options
            .tones
            .resolve()
            .ok_or_else(|| Error::playback("no alarm or notification tone configured"))?;
        debug!("looping {tone}");
        self.platform
            .audio
            .play_looping(&tone.path, AudioProfile::ALARM)
    }

    /// Tears the session down. Returns whether anything was ringing.
    ///
    /// Only resources that are actually held get released, so stopping an
    /// idle session does nothing.
    pub fn stop(&self) -> bool {
        let mut state = self.lock();
        let was_ringing = state.is_ringing();

        if let Some(mut playback) = state.playback.take() {
            playback.stop();
        }
        if state.vibrating {
            self.platform.vibrator.cancel();
            state.vibrating = false;
        }
        state.titles.clear();
        state.audio_requested = false;
        state.vibrate_requested = false;
        if state.foreground {
            self.platform.host.stop_foreground();
            self.platform.notifier.cancel(NotificationKey::RINGING);
            state.foreground = false;
        }
        if let Some(mut wake_lock) = state.wake_lock.take() {
            wake_lock.release();
        }
        if let Some(marker) = &self.options.marker {
            if let Err(e) = marker.clear() {
                error!("couldn't remove ringing marker: {e}");
            }
        }

        if was_ringing {
            info!("alarm session stopped");
        } else {
            debug!("stop requested while idle");
        }
        was_ringing
    }

    /// Resumes a session that was ringing when the previous process died.
    pub fn recover(&self) -> Option<SessionSnapshot> {
        let marker = self.options.marker.as_ref()?;
        let ringing = match marker.load() {
            Ok(Some(ringing)) if !ringing.titles.is_empty() => ringing,
            Ok(_) => return None,
            Err(e) => {
                error!("couldn't read ringing marker: {e}");
                return None;
            }
        };
        info!(
            "resuming {} alarm(s) interrupted by a restart",
            ringing.titles.len()
        );
        let mut snapshot = None;
        for title in ringing.titles {
            snapshot = Some(self.deliver(&Delivery {
                id: 0,
                body: DEFAULT_BODY.to_string(),
                title,
                kind: AlarmKind::Alarm,
                audio: ringing.audio,
                vibrate: ringing.vibrate,
            }));
        }
        snapshot
    }

    fn write_marker(&self, state: &SessionState) {
        let Some(marker) = &self.options.marker else {
            return;
        };
        let ringing = RingingState {
            titles: state.titles.clone(),
            audio: state.audio_requested,
            vibrate: state.vibrate_requested,
        };
        if let Err(e) = marker.save(&ringing) {
            error!("couldn't write ringing marker: {e}");
        }
    }
}
