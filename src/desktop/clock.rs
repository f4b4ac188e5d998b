use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Condvar, Mutex, MutexGuard, PoisonError,
    },
    thread,
    time::Duration,
};

use crossbeam_channel::Sender;
use log::{error, info, warn};

use crate::{
    alarm::{AlarmId, PendingTrigger, Wake},
    error::Result,
    platform::AlarmClock,
    store::PendingStore,
};

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[derive(Debug, Default)]
struct ClockState {
    pending: HashMap<AlarmId, PendingTrigger>,
    shutdown: bool,
}

#[derive(Debug)]
struct Shared {
    state: Mutex<ClockState>,
    changed: Condvar,
    store: Option<PendingStore>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, ClockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, state: &ClockState) {
        if let Some(store) = &self.store {
            if let Err(e) = store.save(state.pending.values()) {
                error!("couldn't persist pending alarms to {}: {e}", store.path().display());
            }
        }
    }
}

/// Wall-clock wake triggers backed by one timer thread.
///
/// Fired triggers are sent down a channel as [`Wake`]s; whoever drains it
/// plays the part of the host delivering them one at a time.
#[derive(Debug)]
pub struct TimerAlarmClock {
    shared: Arc<Shared>,
    exact_allowed: AtomicBool,
}

impl TimerAlarmClock {
    /// Starts the timer thread and re-arms whatever `store` still holds.
    /// Triggers whose time passed while nothing was running fire right away.
    ///
    /// # Errors
    /// If the store can't be read or the thread can't be spawned.
    pub fn start(
        store: Option<PendingStore>,
        wakes: Sender<Wake>,
        exact_allowed: bool,
    ) -> Result<Self> {
        let pending = match &store {
            Some(store) => store.load()?.data,
            None => HashMap::new(),
        };
        if !pending.is_empty() {
            info!("re-arming {} pending alarm(s)", pending.len());
        }
        let shared = Arc::new(Shared {
            state: Mutex::new(ClockState {
                pending,
                shutdown: false,
            }),
            changed: Condvar::new(),
            store,
        });
        let worker = Arc::clone(&shared);
        thread::Builder::new()
            .name("alarm-clock".to_string())
            .spawn(move || run(&worker, &wakes))?;
        Ok(Self {
            shared,
            exact_allowed: AtomicBool::new(exact_allowed),
        })
    }

    pub fn shutdown(&self) {
        self.shared.lock().shutdown = true;
        self.shared.changed.notify_all();
    }
}

impl Drop for TimerAlarmClock {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(shared: &Shared, wakes: &Sender<Wake>) {
    let mut state = shared.lock();
    loop {
        if state.shutdown {
            return;
        }
        let next = state
            .pending
            .values()
            .min_by_key(|trigger| (trigger.fire_time_ms, trigger.id))
            .map(|trigger| (trigger.id, trigger.fire_time_ms));
        state = match next {
            None => shared
                .changed
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner),
            Some((id, fire_time_ms)) => {
                let wait = fire_time_ms.saturating_sub(now_ms());
                if wait <= 0 {
                    if let Some(trigger) = state.pending.remove(&id) {
                        shared.persist(&state);
                        if wakes.send(trigger.into_wake()).is_err() {
                            warn!("nobody is handling wakes, alarm clock stopping");
                            return;
                        }
                    }
                    state
                } else {
                    #[allow(clippy::cast_sign_loss)]
                    let timeout = Duration::from_millis(wait as u64);
                    shared
                        .changed
                        .wait_timeout(state, timeout)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            }
        };
    }
}

impl AlarmClock for TimerAlarmClock {
    fn can_schedule_exact(&self) -> bool {
        self.exact_allowed.load(Ordering::SeqCst)
    }

    fn request_exact_permission(&self) {
        // nothing to prompt on a desktop session, consent is granted outright
        info!("exact alarm permission granted");
        self.exact_allowed.store(true, Ordering::SeqCst);
    }

    fn set_alarm_clock(&self, trigger: PendingTrigger) -> Result<()> {
        let mut state = self.shared.lock();
        state.pending.insert(trigger.id, trigger);
        self.shared.persist(&state);
        drop(state);
        self.shared.changed.notify_all();
        Ok(())
    }

    fn cancel(&self, id: AlarmId) -> bool {
        let mut state = self.shared.lock();
        let removed = state.pending.remove(&id).is_some();
        if removed {
            self.shared.persist(&state);
            drop(state);
            self.shared.changed.notify_all();
        }
        removed
    }

    fn pending(&self) -> Vec<PendingTrigger> {
        self.shared.lock().pending.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::alarm::{TriggerPayload, ACTION_ALARM_TRIGGER};

    fn trigger(id: AlarmId, fire_time_ms: i64) -> PendingTrigger {
        PendingTrigger {
            id,
            fire_time_ms,
            payload: TriggerPayload {
                id: Some(id),
                ..TriggerPayload::default()
            },
        }
    }

    #[test]
    fn fires_in_time_order() {
        let (s, r) = crossbeam_channel::unbounded();
        let clock = TimerAlarmClock::start(None, s, true).unwrap();
        let now = now_ms();
        clock.set_alarm_clock(trigger(2, now + 80)).unwrap();
        clock.set_alarm_clock(trigger(1, now + 20)).unwrap();

        let first = r.recv_timeout(Duration::from_secs(5)).unwrap();
        let second = r.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(first.action, ACTION_ALARM_TRIGGER);
        assert_eq!(first.payload.id, Some(1));
        assert_eq!(second.payload.id, Some(2));
        assert!(clock.pending().is_empty());
    }

    #[test]
    fn cancelled_trigger_never_fires() {
        let (s, r) = crossbeam_channel::unbounded();
        let clock = TimerAlarmClock::start(None, s, true).unwrap();
        clock.set_alarm_clock(trigger(1, now_ms() + 50)).unwrap();
        assert!(clock.cancel(1));
        assert!(!clock.cancel(1));
        assert!(r.recv_timeout(Duration::from_millis(200)).is_err());
    }

    #[test]
    fn persisted_triggers_are_rearmed() {
        let dir = tempfile::tempdir().unwrap();
        let store = PendingStore::new(dir.path().join("pending.toml"));
        {
            let (s, _r) = crossbeam_channel::unbounded();
            let clock = TimerAlarmClock::start(Some(store.clone()), s, true).unwrap();
            clock
                .set_alarm_clock(trigger(1, now_ms() + 60 * 60 * 1000))
                .unwrap();
        }
        assert!(store.load().unwrap().data.contains_key(&1));

        let (s, r) = crossbeam_channel::unbounded();
        let clock = TimerAlarmClock::start(Some(store.clone()), s, true).unwrap();
        assert!(clock.pending().iter().any(|t| t.id == 1));
        clock.set_alarm_clock(trigger(3, now_ms() - 1)).unwrap();
        let wake = r.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(wake.payload.id, Some(3));
    }

    #[test]
    fn permission_request_grants_consent() {
        let (s, _r) = crossbeam_channel::unbounded();
        let clock = TimerAlarmClock::start(None, s, false).unwrap();
        assert!(!clock.can_schedule_exact());
        clock.request_exact_permission();
        assert!(clock.can_schedule_exact());
    }
}
