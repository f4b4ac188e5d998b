use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
#[cfg(all(unix, not(target_os = "macos")))]
use std::{collections::HashSet, thread};

use crossbeam_channel::Sender;
use log::{debug, warn};
#[cfg(all(unix, not(target_os = "macos")))]
use notify_rust::{ActionResponse, NotificationHandle, Urgency};
use notify_rust::{Notification, Timeout};

use crate::{
    communication::{EventBus, UiEvent},
    notification::{
        Importance, Interaction, NotificationChannel, NotificationKey, NotificationRecord,
    },
    platform::{ForegroundHost, Notifier},
};
#[cfg(all(unix, not(target_os = "macos")))]
use crate::notification::DEFAULT_ACTION;

const APP_NAME: &str = "habit_alarmd";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct Shown {
    records: HashMap<NotificationKey, NotificationRecord>,
    #[cfg(all(unix, not(target_os = "macos")))]
    handles: HashMap<NotificationKey, NotificationHandle>,
    /// server ids that already have a thread waiting on their actions
    #[cfg(all(unix, not(target_os = "macos")))]
    listening: HashSet<u32>,
}

/// Desktop notifications; full-screen launches go to subscribed UIs.
///
/// On freedesktop hosts the record's actions become notification buttons
/// and presses come back as [`Interaction`]s on the sender given to
/// [`DesktopNotifier::new`]. Elsewhere notifications can't be acted on.
pub struct DesktopNotifier {
    events: EventBus,
    #[cfg_attr(not(all(unix, not(target_os = "macos"))), allow(dead_code))]
    interactions: Sender<Interaction>,
    channels: Mutex<HashMap<&'static str, NotificationChannel>>,
    shown: Arc<Mutex<Shown>>,
}

impl std::fmt::Debug for DesktopNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DesktopNotifier")
            .field("channels", &lock(&self.channels).len())
            .field("shown", &lock(&self.shown).records.len())
            .finish_non_exhaustive()
    }
}

impl DesktopNotifier {
    #[must_use]
    pub fn new(events: EventBus, interactions: Sender<Interaction>) -> Self {
        Self {
            events,
            interactions,
            channels: Mutex::new(HashMap::new()),
            shown: Arc::new(Mutex::new(Shown::default())),
        }
    }

    fn importance(&self, channel: &str) -> Importance {
        lock(&self.channels)
            .get(channel)
            .map_or(Importance::Default, |c| c.importance)
    }

    #[cfg(all(unix, not(target_os = "macos")))]
    fn show(&self, mut notification: Notification, record: &NotificationRecord) {
        let key = record.key();
        for action in &record.actions {
            notification.action(action.key, action.label);
        }
        if record.tap.is_some() || record.full_screen.is_some() {
            notification.action(DEFAULT_ACTION, "Open");
        }
        if self.importance(record.channel) == Importance::High {
            notification.urgency(Urgency::Critical);
        }
        // reposting under the server's id replaces the notification in place
        if let Some(handle) = lock(&self.shown).handles.get(&key) {
            notification.id(handle.id());
        }

        let handle = match notification.show() {
            Ok(handle) => handle,
            Err(e) => {
                warn!("couldn't show notification {}: {e}", record.id);
                return;
            }
        };
        let server_id = handle.id();
        let mut shown = lock(&self.shown);
        shown.handles.insert(key, handle);
        if shown.listening.insert(server_id) {
            drop(shown);
            self.listen(key, server_id);
        }
    }

    #[cfg(not(all(unix, not(target_os = "macos"))))]
    fn show(&self, notification: Notification, record: &NotificationRecord) {
        debug!(
            "notification {} on {:?} channel",
            record.id,
            self.importance(record.channel)
        );
        if let Err(e) = notification.show() {
            warn!("couldn't show notification {}: {e}", record.id);
        }
    }

    /// Waits for the user to act on `server_id`. The record is looked up when
    /// the press arrives, so a repost in between is what gets acted on.
    #[cfg(all(unix, not(target_os = "macos")))]
    fn listen(&self, key: NotificationKey, server_id: u32) {
        let shown = Arc::clone(&self.shown);
        let interactions = self.interactions.clone();
        let spawned = thread::Builder::new()
            .name("notification-actions".to_string())
            .spawn(move || {
                let result = notify_rust::handle_action(server_id, |response: &ActionResponse<'_>| {
                    let ActionResponse::Custom(action) = response else {
                        debug!("notification {} closed", key.id);
                        return;
                    };
                    let record = lock(&shown).records.get(&key).cloned();
                    match record.and_then(|record| record.interaction(action)) {
                        Some(interaction) => {
                            debug!("notification {} action {action}", key.id);
                            if interactions.send(interaction).is_err() {
                                warn!("nobody is handling notification actions");
                            }
                        }
                        None => debug!("notification {} action {action} ignored", key.id),
                    }
                });
                if let Err(e) = result {
                    warn!("stopped listening to notification {}: {e}", key.id);
                }
                lock(&shown).listening.remove(&server_id);
            });
        if let Err(e) = spawned {
            warn!("couldn't listen for notification actions: {e}");
            lock(&self.shown).listening.remove(&server_id);
        }
    }
}

impl Notifier for DesktopNotifier {
    fn create_channel(&self, channel: &NotificationChannel) {
        let mut channels = lock(&self.channels);
        if !channels.contains_key(channel.id) {
            debug!("notification channel {} ({})", channel.id, channel.name);
            channels.insert(channel.id, channel.clone());
        }
    }

    fn post(&self, record: &NotificationRecord) {
        let mut notification = Notification::new();
        notification
            .summary(&record.title)
            .body(&record.body)
            .appname(APP_NAME)
            .icon("alarm-clock");
        if record.ongoing {
            notification.timeout(Timeout::Never);
        }
        lock(&self.shown)
            .records
            .insert(record.key(), record.clone());
        self.show(notification, record);

        if let Some(target) = &record.full_screen {
            self.events.publish(&UiEvent::Launch(target.clone()));
        }
    }

    fn cancel(&self, key: NotificationKey) {
        let mut shown = lock(&self.shown);
        shown.records.remove(&key);
        #[cfg(all(unix, not(target_os = "macos")))]
        {
            let handle = shown.handles.remove(&key);
            drop(shown);
            if let Some(handle) = handle {
                handle.close();
            }
        }
        #[cfg(not(all(unix, not(target_os = "macos"))))]
        debug!("notification {} left for the user to dismiss", key.id);
    }
}

/// A desktop process is never reclaimed for being in the background, so
/// leaving foreground mode only has to be announced to the UI.
#[derive(Debug, Default)]
pub struct DesktopHost {
    events: EventBus,
}

impl DesktopHost {
    #[must_use]
    pub const fn new(events: EventBus) -> Self {
        Self { events }
    }
}

impl ForegroundHost for DesktopHost {
    fn start_foreground(&self, notification: &NotificationRecord) {
        debug!("foreground for notification {}", notification.id);
    }

    fn stop_foreground(&self) {
        debug!("leaving foreground");
        self.events.publish(&UiEvent::SessionEnded);
    }
}
