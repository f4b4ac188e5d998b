//! In-process facilities that record every call. Used by tests and by hosts
//! that have nothing to buzz or play.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    time::Duration,
};

use super::{
    AlarmClock, AudioOutput, AudioProfile, ForegroundHost, Notifier, Platform, Playback,
    PowerManager, Vibrator, WakeLock,
};
use crate::{
    alarm::{AlarmId, PendingTrigger, Wake},
    error::{Error, Result},
    notification::{
        Interaction, LaunchTarget, NotificationChannel, NotificationKey, NotificationRecord,
        VibrationPattern,
    },
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Pending triggers kept in a map; fire them by hand with [`MemoryAlarmClock::fire`].
#[derive(Debug)]
pub struct MemoryAlarmClock {
    exact_allowed: AtomicBool,
    permission_requests: AtomicUsize,
    pending: Mutex<BTreeMap<AlarmId, PendingTrigger>>,
}

impl Default for MemoryAlarmClock {
    fn default() -> Self {
        Self {
            exact_allowed: AtomicBool::new(true),
            permission_requests: AtomicUsize::new(0),
            pending: Mutex::new(BTreeMap::new()),
        }
    }
}

impl MemoryAlarmClock {
    pub fn set_exact_allowed(&self, allowed: bool) {
        self.exact_allowed.store(allowed, Ordering::SeqCst);
    }

    pub fn permission_requests(&self) -> usize {
        self.permission_requests.load(Ordering::SeqCst)
    }

    /// Consumes the trigger for `id` the way the host does when it goes off.
    pub fn fire(&self, id: AlarmId) -> Option<Wake> {
        lock(&self.pending).remove(&id).map(PendingTrigger::into_wake)
    }

    /// Consumes every trigger due at or before `now_ms`, earliest first.
    pub fn fire_due(&self, now_ms: i64) -> Vec<Wake> {
        let mut pending = lock(&self.pending);
        let mut due: Vec<PendingTrigger> = pending
            .values()
            .filter(|trigger| trigger.fire_time_ms <= now_ms)
            .cloned()
            .collect();
        due.sort_by_key(|trigger| (trigger.fire_time_ms, trigger.id));
        for trigger in &due {
            pending.remove(&trigger.id);
        }
        due.into_iter().map(PendingTrigger::into_wake).collect()
    }
}

impl AlarmClock for MemoryAlarmClock {
    fn can_schedule_exact(&self) -> bool {
        self.exact_allowed.load(Ordering::SeqCst)
    }

    fn request_exact_permission(&self) {
        self.permission_requests.fetch_add(1, Ordering::SeqCst);
    }

    fn set_alarm_clock(&self, trigger: PendingTrigger) -> Result<()> {
        lock(&self.pending).insert(trigger.id, trigger);
        Ok(())
    }

    fn cancel(&self, id: AlarmId) -> bool {
        lock(&self.pending).remove(&id).is_some()
    }

    fn pending(&self) -> Vec<PendingTrigger> {
        lock(&self.pending).values().cloned().collect()
    }
}

#[derive(Debug, Default)]
pub struct MemoryNotifier {
    channels: Mutex<Vec<NotificationChannel>>,
    shown: Mutex<BTreeMap<NotificationKey, NotificationRecord>>,
    launches: Mutex<Vec<LaunchTarget>>,
    posts: AtomicUsize,
}

impl MemoryNotifier {
    pub fn channels(&self) -> Vec<NotificationChannel> {
        lock(&self.channels).clone()
    }

    pub fn shown(&self, key: NotificationKey) -> Option<NotificationRecord> {
        lock(&self.shown).get(&key).cloned()
    }

    /// Full-screen launches, in the order they were requested.
    pub fn launches(&self) -> Vec<LaunchTarget> {
        lock(&self.launches).clone()
    }

    pub fn posts(&self) -> usize {
        self.posts.load(Ordering::SeqCst)
    }

    /// Presses `action` on the notification shown under `key`, the way a user
    /// would. Auto-cancelling notifications go away once acted on.
    pub fn press(&self, key: NotificationKey, action: &str) -> Option<Interaction> {
        let mut shown = lock(&self.shown);
        let record = shown.get(&key)?;
        let interaction = record.interaction(action)?;
        if record.auto_cancel {
            shown.remove(&key);
        }
        Some(interaction)
    }
}

impl Notifier for MemoryNotifier {
    fn create_channel(&self, channel: &NotificationChannel) {
        let mut channels = lock(&self.channels);
        if !channels.iter().any(|known| known.id == channel.id) {
            channels.push(channel.clone());
        }
    }

    fn post(&self, record: &NotificationRecord) {
        self.posts.fetch_add(1, Ordering::SeqCst);
        if let Some(target) = &record.full_screen {
            lock(&self.launches).push(target.clone());
        }
        lock(&self.shown).insert(record.key(), record.clone());
    }

    fn cancel(&self, key: NotificationKey) {
        lock(&self.shown).remove(&key);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VibrationEvent {
    OneShot(Duration),
    Waveform(VibrationPattern),
    Cancel,
}

#[derive(Debug, Default)]
pub struct MemoryVibrator {
    events: Mutex<Vec<VibrationEvent>>,
    repeating: AtomicBool,
}

impl MemoryVibrator {
    pub fn events(&self) -> Vec<VibrationEvent> {
        lock(&self.events).clone()
    }

    /// Whether a repeating waveform is running right now.
    pub fn is_repeating(&self) -> bool {
        self.repeating.load(Ordering::SeqCst)
    }
}

impl Vibrator for MemoryVibrator {
    fn one_shot(&self, duration: Duration) {
        lock(&self.events).push(VibrationEvent::OneShot(duration));
    }

    fn waveform(&self, pattern: &VibrationPattern) {
        self.repeating
            .store(pattern.repeat.is_some(), Ordering::SeqCst);
        lock(&self.events).push(VibrationEvent::Waveform(*pattern));
    }

    fn cancel(&self) {
        self.repeating.store(false, Ordering::SeqCst);
        lock(&self.events).push(VibrationEvent::Cancel);
    }
}

#[derive(Debug, Default)]
pub struct MemoryPowerManager {
    acquired: AtomicUsize,
    released: Arc<AtomicUsize>,
    held: Arc<AtomicUsize>,
    /// bumped by [`MemoryPowerManager::lapse`]; locks from older epochs are expired
    epoch: Arc<AtomicUsize>,
    last_timeout: Mutex<Option<Duration>>,
}

impl MemoryPowerManager {
    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    /// Locks acquired and not yet released.
    pub fn held(&self) -> usize {
        self.held.load(Ordering::SeqCst)
    }

    pub fn last_timeout(&self) -> Option<Duration> {
        *lock(&self.last_timeout)
    }

    /// Lets every outstanding lock time out. They still count as held until
    /// someone releases them.
    pub fn lapse(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }
}

struct MemoryWakeLock {
    held: bool,
    epoch: usize,
    current_epoch: Arc<AtomicUsize>,
    held_count: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
}

impl WakeLock for MemoryWakeLock {
    fn is_held(&self) -> bool {
        self.held && self.epoch == self.current_epoch.load(Ordering::SeqCst)
    }

    fn release(&mut self) {
        if self.held {
            self.held = false;
            self.held_count.fetch_sub(1, Ordering::SeqCst);
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl PowerManager for MemoryPowerManager {
    fn acquire_wake_lock(&self, _tag: &str, timeout: Duration) -> Box<dyn WakeLock> {
        self.acquired.fetch_add(1, Ordering::SeqCst);
        self.held.fetch_add(1, Ordering::SeqCst);
        *lock(&self.last_timeout) = Some(timeout);
        Box::new(MemoryWakeLock {
            held: true,
            epoch: self.epoch.load(Ordering::SeqCst),
            current_epoch: Arc::clone(&self.epoch),
            held_count: Arc::clone(&self.held),
            released: Arc::clone(&self.released),
        })
    }
}

#[derive(Debug, Default)]
pub struct MemoryAudio {
    fail: AtomicBool,
    started: AtomicUsize,
    playing: Arc<AtomicUsize>,
    tones: Mutex<Vec<(PathBuf, AudioProfile)>>,
}

impl MemoryAudio {
    /// Makes every following playback attempt fail like a broken decoder.
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    /// Players started and not yet stopped.
    pub fn playing(&self) -> usize {
        self.playing.load(Ordering::SeqCst)
    }

    pub fn tones(&self) -> Vec<(PathBuf, AudioProfile)> {
        lock(&self.tones).clone()
    }
}

struct MemoryPlayback {
    active: bool,
    playing: Arc<AtomicUsize>,
}

impl Playback for MemoryPlayback {
    fn is_playing(&self) -> bool {
        self.active
    }

    fn stop(&mut self) {
        if self.active {
            self.active = false;
            self.playing.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl AudioOutput for MemoryAudio {
    fn play_looping(&self, tone: &Path, profile: AudioProfile) -> Result<Box<dyn Playback>> {
        lock(&self.tones).push((tone.to_path_buf(), profile));
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::playback(format!(
                "couldn't decode {}",
                tone.display()
            )));
        }
        self.started.fetch_add(1, Ordering::SeqCst);
        self.playing.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryPlayback {
            active: true,
            playing: Arc::clone(&self.playing),
        }))
    }
}

#[derive(Debug, Default)]
pub struct MemoryHost {
    foreground: AtomicBool,
    starts: AtomicUsize,
    stops: AtomicUsize,
}

impl MemoryHost {
    pub fn is_foreground(&self) -> bool {
        self.foreground.load(Ordering::SeqCst)
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl ForegroundHost for MemoryHost {
    fn start_foreground(&self, _notification: &NotificationRecord) {
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.foreground.store(true, Ordering::SeqCst);
    }

    fn stop_foreground(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.foreground.store(false, Ordering::SeqCst);
    }
}

/// Every memory facility, with typed handles kept for inspection.
#[derive(Debug, Default, Clone)]
pub struct MemoryPlatform {
    pub clock: Arc<MemoryAlarmClock>,
    pub notifier: Arc<MemoryNotifier>,
    pub vibrator: Arc<MemoryVibrator>,
    pub power: Arc<MemoryPowerManager>,
    pub audio: Arc<MemoryAudio>,
    pub host: Arc<MemoryHost>,
}

impl MemoryPlatform {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn platform(&self) -> Platform {
        Platform {
            clock: self.clock.clone(),
            notifier: self.notifier.clone(),
            vibrator: self.vibrator.clone(),
            power: self.power.clone(),
            audio: self.audio.clone(),
            host: self.host.clone(),
        }
    }
}
